use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    InvalidVar { name: &'static str, value: String },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// BCM number of the CLK pin.
    pub clock_pin: usize,
    /// BCM number of the DIO pin.
    pub data_pin: usize,
    pub brightness: u8,
    /// Delay after every pin transition, in microseconds.
    pub delay_us: u64,
    /// Map the registers through `/dev/mem` instead of `/dev/gpiomem`.
    pub dev_mem: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            clock_pin: 23,
            data_pin: 24,
            brightness: tm1637::DEFAULT_BRIGHTNESS,
            delay_us: tm1637::DEFAULT_DELAY.as_micros() as u64,
            dev_mem: false,
        }
    }
}

impl Config {
    fn path() -> PathBuf {
        std::env::var_os("TM1637_CONFIG")
            .unwrap_or_else(|| OsString::from("tm1637.json"))
            .into()
    }

    /// Loads the config file if there is one, then applies `TM1637_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path();
        let mut config = if path.exists() {
            let file = std::fs::File::open(&path)?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader)?
        } else {
            Config::default()
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(
            var: &impl Fn(&str) -> Option<String>,
            name: &'static str,
            target: &mut T,
        ) -> Result<(), ConfigError> {
            if let Some(value) = var(name) {
                *target = value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidVar { name, value })?;
            }
            Ok(())
        }

        parse(&var, "TM1637_PIN_CLK", &mut self.clock_pin)?;
        parse(&var, "TM1637_PIN_DIO", &mut self.data_pin)?;
        parse(&var, "TM1637_BRIGHTNESS", &mut self.brightness)?;
        parse(&var, "TM1637_DELAY_US", &mut self.delay_us)?;
        parse(&var, "TM1637_DEV_MEM", &mut self.dev_mem)?;
        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_micros(self.delay_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_match_the_driver() {
        let config = Config::default();
        assert_eq!(config.brightness, 2);
        assert_eq!(config.delay(), Duration::from_micros(5));
        assert_eq!((config.clock_pin, config.data_pin), (23, 24));
    }

    #[test]
    fn file_fields_are_optional() {
        let config: Config = serde_json::from_str(r#"{ "clock_pin": 5, "brightness": 7 }"#).unwrap();
        assert_eq!(config.clock_pin, 5);
        assert_eq!(config.brightness, 7);
        assert_eq!(config.data_pin, Config::default().data_pin);
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("TM1637_PIN_CLK", "17"),
                ("TM1637_PIN_DIO", " 27 "),
                ("TM1637_DEV_MEM", "true"),
            ]))
            .unwrap();

        assert_eq!(config.clock_pin, 17);
        assert_eq!(config.data_pin, 27);
        assert!(config.dev_mem);
        assert_eq!(config.brightness, Config::default().brightness);
    }

    #[test]
    fn bad_environment_value_is_reported() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("TM1637_BRIGHTNESS", "bright")]))
            .unwrap_err();

        assert_eq!(err.to_string(), r#"invalid value "bright" for TM1637_BRIGHTNESS"#);
    }
}
