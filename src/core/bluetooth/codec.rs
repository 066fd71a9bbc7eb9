//! Fixed-width encodings of characteristic values.
//!
//! Integers travel little-endian; colors travel as three raw bytes. Bounds are
//! not checked here, that is the job of [`ParameterDescriptor`].
//!
//! [`ParameterDescriptor`]: crate::core::bluetooth::parameters::ParameterDescriptor

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::error::FormatError;

/// Wire encoding of a characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireKind {
    U8,
    U16Le,
    U32Le,
    Rgb24,
}

impl WireKind {
    /// Number of bytes a value of this kind occupies on the wire
    pub const fn width(self) -> usize {
        match self {
            WireKind::U8 => 1,
            WireKind::U16Le => 2,
            WireKind::U32Le => 4,
            WireKind::Rgb24 => 3,
        }
    }
}

/// 24-bit color as sent to the LED characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = String;

    /// Accepts `#rrggbb`, `rrggbb` or `r,g,b`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains(',') {
            let parts: Vec<&str> = s.split(',').map(str::trim).collect();
            if parts.len() != 3 {
                return Err(format!("expected r,g,b but got {:?}", s));
            }
            let channel = |p: &str| p.parse::<u8>().map_err(|e| format!("{}: {}", p, e));
            return Ok(Rgb::new(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?));
        }

        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("expected #rrggbb but got {:?}", s));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|e| format!("{}: {}", s, e))
        };
        Ok(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

/// A decoded characteristic value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireValue {
    U8(u8),
    U16(u16),
    U32(u32),
    Rgb(Rgb),
}

impl WireValue {
    pub fn kind(&self) -> WireKind {
        match self {
            WireValue::U8(_) => WireKind::U8,
            WireValue::U16(_) => WireKind::U16Le,
            WireValue::U32(_) => WireKind::U32Le,
            WireValue::Rgb(_) => WireKind::Rgb24,
        }
    }

    /// Numeric view of integer values; `None` for colors.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            WireValue::U8(v) => Some(v as u32),
            WireValue::U16(v) => Some(v as u32),
            WireValue::U32(v) => Some(v),
            WireValue::Rgb(_) => None,
        }
    }

    pub fn as_rgb(&self) -> Option<Rgb> {
        match *self {
            WireValue::Rgb(rgb) => Some(rgb),
            _ => None,
        }
    }

    /// Parses user input as a value of `kind`.
    pub fn parse(kind: WireKind, input: &str) -> Result<Self, String> {
        let input = input.trim();
        match kind {
            WireKind::U8 => input.parse().map(WireValue::U8).map_err(|e| e.to_string()),
            WireKind::U16Le => input.parse().map(WireValue::U16).map_err(|e| e.to_string()),
            WireKind::U32Le => input.parse().map(WireValue::U32).map_err(|e| e.to_string()),
            WireKind::Rgb24 => input.parse().map(WireValue::Rgb),
        }
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireValue::U8(v) => write!(f, "{}", v),
            WireValue::U16(v) => write!(f, "{}", v),
            WireValue::U32(v) => write!(f, "{}", v),
            WireValue::Rgb(rgb) => write!(f, "{}", rgb),
        }
    }
}

/// Encodes a value into its wire bytes.
pub fn encode(value: WireValue) -> Vec<u8> {
    match value {
        WireValue::U8(v) => vec![v],
        WireValue::U16(v) => v.to_le_bytes().to_vec(),
        WireValue::U32(v) => v.to_le_bytes().to_vec(),
        WireValue::Rgb(rgb) => vec![rgb.r, rgb.g, rgb.b],
    }
}

/// Decodes the leading bytes of `bytes` as a value of `kind`.
/// Trailing bytes are ignored.
pub fn decode(kind: WireKind, bytes: &[u8]) -> Result<WireValue, FormatError> {
    let width = kind.width();
    if bytes.len() < width {
        return Err(FormatError::TooShort {
            kind,
            expected: width,
            actual: bytes.len(),
        });
    }

    Ok(match kind {
        WireKind::U8 => WireValue::U8(bytes[0]),
        WireKind::U16Le => WireValue::U16(u16::from_le_bytes([bytes[0], bytes[1]])),
        WireKind::U32Le => {
            WireValue::U32(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        WireKind::Rgb24 => WireValue::Rgb(Rgb::new(bytes[0], bytes[1], bytes[2])),
    })
}
