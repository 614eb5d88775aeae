//! Seven-segment font.
//!
//! Codes use the TM1637 wire layout, one bit per segment:
//!
//! ```text
//!       A
//!      ---
//!   F |   | B
//!      -G-
//!   E |   | C
//!      ---   . DP
//!       D
//! ```
//!
//! `DP G F E D C B A`, so bit 7 is the decimal point and bit 0 is segment A.
//!
//! Letters are a best effort. Several collapse onto the same shape (`u`/`v`, `s`/`5`, `z`/`2`),
//! which is just what a seven-segment digit can do. Only the hex letters `A`-`F` have uppercase
//! forms; every other uppercase letter is unknown and renders blank.

/// All segments off.
pub const SEG_BLANK: u8 = 0x00;
/// The decimal point segment. On digit 1 this is also the colon.
pub const SEG_DP: u8 = 0x80;

/// Looks up the segment code for a character.
///
/// Returns `None` for characters the font has no shape for.
pub const fn lookup(c: char) -> Option<u8> {
    let code = match c {
        '0' => 0x3f,
        '1' => 0x06,
        '2' => 0x5b,
        '3' => 0x4f,
        '4' => 0x66,
        '5' => 0x6d,
        '6' => 0x7d,
        '7' => 0x07,
        '8' => 0x7f,
        '9' => 0x6f,
        'a' | 'A' => 0x77,
        'b' | 'B' => 0x7c,
        'c' | 'C' => 0x39,
        'd' | 'D' => 0x5e,
        'e' | 'E' => 0x79,
        'f' | 'F' => 0x71,
        'g' => 0x6f,
        'h' => 0x76,
        'i' => 0x04,
        'j' => 0x1e,
        'k' => 0x76,
        'l' => 0x38,
        'm' => 0x37,
        'n' => 0x54,
        'o' => 0x5c,
        'p' => 0x73,
        'q' => 0x67,
        'r' => 0x50,
        's' => 0x6d,
        't' => 0x78,
        'u' => 0x3e,
        'v' => 0x3e,
        'w' => 0x7e,
        'x' => 0x76,
        'y' => 0x6e,
        'z' => 0x5b,
        ' ' => SEG_BLANK,
        '-' => 0x40,
        '_' => 0x08,
        '.' => SEG_DP,
        '°' => 0x63,
        _ => return None,
    };
    Some(code)
}

/// Gets the segment code for a character, falling back to blank for unknown characters.
pub const fn segment_code(c: char) -> u8 {
    match lookup(c) {
        Some(code) => code,
        None => SEG_BLANK,
    }
}
