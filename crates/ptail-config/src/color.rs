//! Color tokens.
//!
//! A token is either a single foreground color (`cyan`) or a
//! foreground/background pair joined by `_on_` (`grey_on_white`).
//! Names follow the eight classic ANSI colors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between foreground and background in a compound token.
const ON_SEPARATOR: &str = "_on_";

/// Errors produced while parsing color tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("unknown color name: {0}")]
    UnknownName(String),

    #[error("empty color token")]
    Empty,
}

/// One of the eight ANSI colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorName {
    Grey,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl ColorName {
    pub const ALL: [ColorName; 8] = [
        ColorName::Grey,
        ColorName::Red,
        ColorName::Green,
        ColorName::Yellow,
        ColorName::Blue,
        ColorName::Magenta,
        ColorName::Cyan,
        ColorName::White,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorName::Grey => "grey",
            ColorName::Red => "red",
            ColorName::Green => "green",
            ColorName::Yellow => "yellow",
            ColorName::Blue => "blue",
            ColorName::Magenta => "magenta",
            ColorName::Cyan => "cyan",
            ColorName::White => "white",
        }
    }
}

impl FromStr for ColorName {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grey" | "gray" | "black" => Ok(ColorName::Grey),
            "red" => Ok(ColorName::Red),
            "green" => Ok(ColorName::Green),
            "yellow" => Ok(ColorName::Yellow),
            "blue" => Ok(ColorName::Blue),
            "magenta" => Ok(ColorName::Magenta),
            "cyan" => Ok(ColorName::Cyan),
            "white" => Ok(ColorName::White),
            other => Err(ColorError::UnknownName(other.to_string())),
        }
    }
}

impl fmt::Display for ColorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A foreground color with an optional background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColorToken {
    pub fg: ColorName,
    pub bg: Option<ColorName>,
}

impl ColorToken {
    /// Foreground-only token.
    pub const fn solo(fg: ColorName) -> Self {
        Self { fg, bg: None }
    }

    /// Foreground on background token.
    pub const fn on(fg: ColorName, bg: ColorName) -> Self {
        Self { fg, bg: Some(bg) }
    }
}

impl FromStr for ColorToken {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ColorError::Empty);
        }
        match s.split_once(ON_SEPARATOR) {
            Some((fg, bg)) => Ok(ColorToken::on(fg.parse()?, bg.parse()?)),
            None => Ok(ColorToken::solo(s.parse()?)),
        }
    }
}

impl fmt::Display for ColorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bg {
            Some(bg) => write!(f, "{}{}{}", self.fg, ON_SEPARATOR, bg),
            None => write!(f, "{}", self.fg),
        }
    }
}

impl TryFrom<String> for ColorToken {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColorToken> for String {
    fn from(token: ColorToken) -> Self {
        token.to_string()
    }
}
