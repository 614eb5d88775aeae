mod config;

use crate::config::Config;
use dotenv::dotenv;
use log::{debug, info, warn};
use std::thread;
use std::time::Duration;
use time::macros::format_description;
use time::OffsetDateTime;
use tm1637::Tm1637;
use tm1637_gpio::shared::SharedGpio;

const USAGE: &str = "usage: tm1637 [--colon] [--brightness N] [--off] <text>\n       tm1637 [--brightness N] --clock";

#[derive(Debug, PartialEq)]
enum Mode {
    /// Show the text once and exit.
    Text { text: String, colon: bool, off: bool },
    /// Show the local time until killed.
    Clock,
}

#[derive(Debug, PartialEq)]
struct Args {
    brightness: Option<u8>,
    mode: Mode,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> eyre::Result<Args> {
    let mut brightness = None;
    let mut colon = false;
    let mut off = false;
    let mut clock = false;
    let mut text: Option<String> = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--colon" => colon = true,
            "--off" => off = true,
            "--clock" => clock = true,
            "--brightness" => {
                let value = args
                    .next()
                    .ok_or_else(|| eyre::eyre!("--brightness needs a value\n{}", USAGE))?;
                brightness = Some(value.parse()?);
            }
            flag if flag.starts_with("--") => eyre::bail!("unknown option {}\n{}", flag, USAGE),
            _ if text.is_some() => eyre::bail!("only one text argument is allowed\n{}", USAGE),
            other => text = Some(other.to_string()),
        }
    }

    let mode = match (clock, text) {
        (true, None) => Mode::Clock,
        (true, Some(_)) => eyre::bail!("--clock does not take a text\n{}", USAGE),
        (false, Some(text)) => Mode::Text { text, colon, off },
        (false, None) => eyre::bail!("{}", USAGE),
    };

    Ok(Args { brightness, mode })
}

fn run_clock(display: &Tm1637) -> eyre::Result<()> {
    let format = format_description!("[hour][minute]");

    info!("Showing local time, press Ctrl+C to stop");
    loop {
        let now = OffsetDateTime::now_local().unwrap_or_else(|err| {
            warn!("Local time unavailable ({}), using UTC", err);
            OffsetDateTime::now_utc()
        });

        display.set_colon(now.second() % 2 == 0);
        if let Err(err) = display.display_text(&now.format(format)?) {
            warn!("Failed to update display: {}", err);
        }

        let until_next_second = 1_000_000_000 - now.nanosecond();
        thread::sleep(Duration::from_nanos(until_next_second as u64));
    }
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = Config::load()?;
    debug!("{:?}", config);

    info!("TM1637 @ CLK: {}, DIO: {}", config.clock_pin, config.data_pin);

    let gpio = if config.dev_mem {
        SharedGpio::acquire_mem()?
    } else {
        SharedGpio::acquire()?
    };
    debug!("{:?} acquired, {} user(s).", gpio, SharedGpio::users());

    let display = Tm1637::initialize_with(gpio, config.clock_pin, config.data_pin, config.delay())?;
    display.set_brightness(args.brightness.unwrap_or(config.brightness))?;

    match args.mode {
        Mode::Text { text, colon, off } => {
            display.set_colon(colon);
            display.display_text(&text)?;
            info!("Showing {:?}", text);
            if off {
                display.close()?;
                info!("Display switched off.");
            }
        }
        Mode::Clock => run_clock(&display)?,
    }

    Ok(())
}
