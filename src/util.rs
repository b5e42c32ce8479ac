// DisplayPort transmitter link tools
//
// Copyright (C) 2025, Intel Corporation

//! Miscellaneous utility functions.

use std::str::FromStr;

use lazy_static::lazy_static;
use num_traits::Num;
use regex::Regex;

/// Similar to kernel's `GENMASK()` macro.
///
/// # Examples
/// ```
/// use dplink::genmask_t;
///
/// const ADJUST_VSWING_LANE0_MASK: u8 = genmask_t!(u8, 1, 0);
/// const ADJUST_PREEMP_LANE0_MASK: u8 = genmask_t!(u8, 3, 2);
/// ```
#[macro_export]
macro_rules! genmask_t {
    ($t:ty, $high:expr, $low:expr) => {{
        <$t>::MAX - (1 << $low) + 1 & (<$t>::MAX >> (<$t>::BITS - 1 - $high))
    }};
}

/// `genmask_t!` for `u8` registers, the common case in the DPCD space.
#[macro_export]
macro_rules! genmask {
    ($high:expr, $low:expr) => {
        $crate::genmask_t!(u8, $high, $low)
    };
}

/// Parse hexadecimal from string.
///
/// Assumes the string is hexadecimal and converts it to a number if possible, or `None` if no such
/// conversion is possible.
///
/// # Examples
/// ```
/// use dplink::util;
///
/// if let Some(address) = util::parse_hex::<u32>("0x202") {
///     assert_eq!(address, 0x202);
/// }
/// ```
pub fn parse_hex<T: Num + FromStr>(s: &str) -> Option<T> {
    let val = match s.strip_prefix("0x") {
        Some(s) => s,
        None => s,
    };

    <T>::from_str_radix(val, 16).ok()
}

/// Parse any number hexadecimal or not.
///
/// Parses numeric string into binary regardless whether it is in hexadecimal format or not. If
/// conversion is not possible returns `None`.
/// # Examples
/// ```
/// use dplink::util;
///
/// if let Some(number) = util::parse_number::<i32>("1234") {
///     assert_eq!(number, 1234);
/// }
/// ```
pub fn parse_number<T: Num + FromStr>(s: &str) -> Option<T> {
    // Try to match decimal digits first and if that matches use standard
    // functions to parse it.
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^\d+$").unwrap();
    }
    if RE.is_match(s) {
        return s.parse::<T>().ok();
    }
    parse_hex(s)
}

/// Define a single bit within a byte register block
///
/// This type provides a compile time representation of how a given bit within
/// a register block is to be parsed. The `get_bit()` and `set_bit()` methods
/// operate on an array slice that represents multiple consecutive bytes, the
/// shape DPCD blocks are read over AUX.
///
/// # Const Parameters
///
/// * `BYTE_OFFSET` - The index of the byte array at which the bit resides
/// * `BIT` - The bit offset within the byte
///
/// # Examples
/// ```
/// use dplink::util;
/// type InterlaneAlignDone = util::Bit<2, 0>; // Byte offset 2, bit offset 0
///
/// let mut raw = [0u8; 6];
/// InterlaneAlignDone::set_bit(&mut raw, true);
/// assert_eq!(raw[2], 1);
/// assert!(InterlaneAlignDone::get_bit(&raw));
/// ```
pub struct Bit<const BYTE_OFFSET: usize, const BIT: u32>;

impl<const BYTE_OFFSET: usize, const BIT: u32> Bit<BYTE_OFFSET, BIT> {
    const MASK: u8 = 1u8 << BIT;

    pub fn get_bit(raw: &[u8]) -> bool {
        raw[BYTE_OFFSET] & Self::MASK != 0
    }

    pub fn set_bit(raw: &mut [u8], value: bool) {
        raw[BYTE_OFFSET] = (!Self::MASK & raw[BYTE_OFFSET]) | if value { Self::MASK } else { 0 };
    }
}

/// Define a field within a byte register block
///
/// See `Bit` documentation for background.
///
/// # Const Parameters
///
/// * `BYTE_OFFSET` - The index of the byte array at which the field resides
/// * `HIGH` - The bit offset of the highest bit of the field
/// * `LOW` - The bit offset of the lowest bit of the field
///
/// # Examples
/// ```
/// use dplink::util;
/// type VoltageSwingLane0 = util::Field<0, 1, 0>;
///
/// let mut raw = [0u8; 2];
/// VoltageSwingLane0::set_field(&mut raw, 2);
/// assert_eq!(raw[0], 2);
/// assert_eq!(VoltageSwingLane0::get_field(&raw), 2);
/// ```
pub struct Field<const BYTE_OFFSET: usize, const HIGH: u32, const LOW: u32>;

impl<const BYTE_OFFSET: usize, const HIGH: u32, const LOW: u32> Field<BYTE_OFFSET, HIGH, LOW> {
    const MASK: u8 = genmask_t!(u8, HIGH, LOW);
    const SHIFT: u32 = LOW;

    pub fn get_field(raw: &[u8]) -> u8 {
        (raw[BYTE_OFFSET] & Self::MASK) >> Self::SHIFT
    }

    pub fn set_field(raw: &mut [u8], value: u8) {
        raw[BYTE_OFFSET] = (!Self::MASK & raw[BYTE_OFFSET]) | (Self::MASK & (value << Self::SHIFT));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn genmask() {
        assert_eq!(genmask_t!(u8, 1, 0), 0x03);
        assert_eq!(genmask_t!(u8, 3, 2), 0x0c);
        assert_eq!(genmask_t!(u8, 7, 0), 0xff);
        assert_eq!(genmask_t!(u32, 19, 0), 0xfffff);
    }

    #[test]
    fn parse_numbers() {
        assert_eq!(parse_hex::<u32>("0x1234"), Some(0x1234));
        assert_eq!(parse_hex::<u32>("ff"), Some(0xff));
        assert_eq!(parse_number::<u32>("256"), Some(256));
        assert_eq!(parse_number::<u32>("0x100"), Some(0x100));
        assert_eq!(parse_number::<u32>("nope"), None);
    }

    #[test]
    fn bits_and_fields() {
        type Done = Bit<1, 4>;
        type Level = Field<0, 3, 2>;

        let mut raw = [0u8; 2];
        Done::set_bit(&mut raw, true);
        assert_eq!(raw[1], 0x10);
        assert!(Done::get_bit(&raw));
        Done::set_bit(&mut raw, false);
        assert!(!Done::get_bit(&raw));

        Level::set_field(&mut raw, 3);
        assert_eq!(raw[0], 0x0c);
        assert_eq!(Level::get_field(&raw), 3);
        Level::set_field(&mut raw, 1);
        assert_eq!(Level::get_field(&raw), 1);
    }
}
