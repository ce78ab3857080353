//! Conversion options.
//!
//! Options can be given on the command line, or read from a JSON5 file such
//! as:
//! ```text
//! {
//!   // Pad unused space with zeroes instead of 0xff.
//!   fill: 0x00,
//!   strict: true,
//!   metadata: false,
//! }
//! ```
//! Every key is optional; anything missing takes its default value.

use std::convert::TryFrom;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::error;
use crate::isx::Framing;

/// The byte that ROM space no record writes to is filled with.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Deserialize)]
#[serde(try_from = "FillRepr")]
pub enum Fill {
  /// `0x00`.
  Zeroes,
  /// `0xff`, the value of erased flash.
  Ones,
}

impl Fill {
  /// Returns the fill value.
  pub fn byte(self) -> u8 {
    match self {
      Self::Zeroes => 0x00,
      Self::Ones => 0xff,
    }
  }

  /// Returns the `Fill` for `byte`, if it's one of the recognized values.
  pub fn from_byte(byte: u8) -> Option<Self> {
    match byte {
      0x00 => Some(Self::Zeroes),
      0xff => Some(Self::Ones),
      _ => None,
    }
  }
}

impl Default for Fill {
  fn default() -> Self {
    Fill::Ones
  }
}

impl fmt::Display for Fill {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "0x{:02x}", self.byte())
  }
}

/// An error from parsing a [`Fill`].
///
/// [`Fill`]: enum.Fill.html
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FillError(String);

impl fmt::Display for FillError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "invalid fill byte `{}`: expected 0x00 or 0xff", self.0)
  }
}

impl std::error::Error for FillError {}

impl FromStr for Fill {
  type Err = FillError;

  /// Parses a fill byte, either in hex (`ff`, `0xFF`) or decimal (`255`).
  fn from_str(s: &str) -> Result<Self, FillError> {
    lazy_static! {
      static ref BYTE: Regex =
        Regex::new(r"^(?i)(0x)?([0-9a-f]{1,3})$").unwrap();
    }

    let err = || FillError(s.to_string());
    let caps = BYTE.captures(s.trim()).ok_or_else(err)?;
    let digits = &caps[2];
    let hex = caps.get(1).is_some()
      || digits.bytes().any(|b| b.is_ascii_alphabetic());
    let radix = if hex { 16 } else { 10 };

    u8::from_str_radix(digits, radix)
      .ok()
      .and_then(Fill::from_byte)
      .ok_or_else(err)
  }
}

/// A fill byte as it may be written in an options file: a number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum FillRepr {
  Byte(u8),
  Text(String),
}

impl TryFrom<FillRepr> for Fill {
  type Error = FillError;

  fn try_from(repr: FillRepr) -> Result<Self, FillError> {
    match repr {
      FillRepr::Byte(byte) => {
        Fill::from_byte(byte).ok_or_else(|| FillError(byte.to_string()))
      }
      FillRepr::Text(text) => text.parse(),
    }
  }
}

/// Options controlling a conversion.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Options {
  /// The byte to pad unused ROM space with.
  pub fill: Fill,
  /// Whether conflicting overlapping writes stop the conversion.
  pub strict: bool,
  /// How records without ROM data are treated.
  pub framing: Framing,
}

/// The on-disk form of `Options`.
#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct OptionsFile {
  fill: Fill,
  strict: bool,
  metadata: bool,
}

impl From<OptionsFile> for Options {
  fn from(file: OptionsFile) -> Self {
    Options {
      fill: file.fill,
      strict: file.strict,
      framing: if file.metadata {
        Framing::Metadata
      } else {
        Framing::Strict
      },
    }
  }
}

impl Options {
  /// Parses options out of JSON5 text.
  pub fn from_json5(text: &str) -> Result<Self, ConfigError> {
    json5::from_str::<OptionsFile>(text)
      .map(Options::from)
      .map_err(|e| ConfigError {
        path: None,
        inner: ConfigErrorType::Parse(e),
      })
  }

  /// Reads options from the JSON5 file at `path`.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| ConfigError {
      path: Some(path.to_path_buf()),
      inner: ConfigErrorType::Io(e),
    })?;
    Self::from_json5(&text).map_err(|e| ConfigError {
      path: Some(path.to_path_buf()),
      ..e
    })
  }
}

/// The underlying cause of a `ConfigError`.
#[derive(Debug)]
pub enum ConfigErrorType {
  /// The file could not be read.
  Io(io::Error),
  /// The file's contents are not valid options.
  Parse(json5::Error),
}

/// An error from reading an options file.
#[derive(Debug)]
pub struct ConfigError {
  /// The file that was being read, if the options came from a file.
  pub path: Option<PathBuf>,
  /// What went wrong.
  pub inner: ConfigErrorType,
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match &self.inner {
      ConfigErrorType::Io(e) => write!(f, "could not read options: {}", e),
      ConfigErrorType::Parse(e) => write!(f, "bad options: {}", e),
    }
  }
}

impl error::Error for ConfigError {
  fn kind(&self) -> error::Kind {
    error::Kind::BadConfig
  }

  fn cause(&self) -> error::Cause<'_> {
    match &self.path {
      Some(path) => error::Cause::File(path),
      None => error::Cause::File(Path::new("<options>")),
    }
  }

  fn action(&self) -> Option<error::Action> {
    Some(error::Action::Loading)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  macro_rules! assert_fill {
    ($text:literal => Err) => {
      assert!($text.parse::<Fill>().is_err(), "{:?} should not parse", $text);
    };
    ($text:literal => $fill:ident) => {
      assert_eq!($text.parse::<Fill>(), Ok(Fill::$fill));
    };
  }

  #[test]
  fn fill_parsing() {
    assert_fill!("0" => Zeroes);
    assert_fill!("00" => Zeroes);
    assert_fill!("0x00" => Zeroes);
    assert_fill!("ff" => Ones);
    assert_fill!("0xFF" => Ones);
    assert_fill!("0XfF" => Ones);
    assert_fill!("255" => Ones);
    assert_fill!(" 0xff " => Ones);
    assert_fill!("0x100" => Err);
    assert_fill!("0x80" => Err);
    assert_fill!("1" => Err);
    assert_fill!("zero" => Err);
    assert_fill!("" => Err);
  }

  #[test]
  fn defaults() {
    let opts = Options::default();
    assert_eq!(opts.fill.byte(), 0xff);
    assert!(!opts.strict);
    assert_eq!(opts.framing, Framing::Strict);
    assert_eq!(Options::from_json5("{}").unwrap(), opts);
  }

  #[test]
  fn json5_options() {
    let opts = Options::from_json5(
      r#"{
        // Comments are allowed.
        fill: 0x00,
        strict: true,
        metadata: true,
      }"#,
    )
    .unwrap();
    assert_eq!(
      opts,
      Options {
        fill: Fill::Zeroes,
        strict: true,
        framing: Framing::Metadata,
      }
    );

    let opts = Options::from_json5(r#"{ fill: "0xff" }"#).unwrap();
    assert_eq!(opts.fill, Fill::Ones);
  }

  #[test]
  fn json5_rejects_bad_options() {
    assert!(Options::from_json5("{ fill: 1 }").is_err());
    assert!(Options::from_json5("{ fill: 0x100 }").is_err());
    assert!(Options::from_json5("{ colour: 3 }").is_err());
    let err = Options::from_json5("{ strict: ").unwrap_err();
    assert_eq!(error::Error::kind(&err), error::Kind::BadConfig);
  }

  #[test]
  fn load_missing_file() {
    let err = Options::load("/nonexistent/isx2gb.json5").unwrap_err();
    assert!(matches!(err.inner, ConfigErrorType::Io(_)));
    assert!(err.path.is_some());
  }
}
