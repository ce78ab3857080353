//! The ISX object file format.
//!
//! ISX files are produced by the ISAS Game Boy assembler/linker. An ISX file is
//! a 32-byte header followed by a stream of *records*, each of which begins
//! with a one-byte tag:
//! ```text
//! +--------+---------------------------+
//! | "ISX " | build tag (28 bytes)      |  header
//! +--------+---------------------------+
//! | tag | record payload ...           |  body
//! | tag | record payload ...           |
//! | ...                                |
//! +------------------------------------+
//! ```
//! Only `BANK_DATA` records (tag `0x01`) carry ROM contents; see [`Record`]
//! for the rest.
//!
//! [`Record`]: enum.Record.html

use std::fmt;

use crate::error;

mod record;

pub mod dump;

pub use record::*;

/// The length of an ISX header.
pub const HEADER_LEN: usize = 32;

/// The signature every ISX file starts with.
pub const SIGNATURE: &[u8; 4] = b"ISX ";

/// A validated ISX file.
///
/// An `Isx` borrows the file's bytes; records decoded from it borrow their
/// payloads from the same buffer.
#[derive(Copy, Clone, Debug)]
pub struct Isx<'isx> {
  header: &'isx [u8],
  body: &'isx [u8],
}

impl<'isx> Isx<'isx> {
  /// Checks the header of `bytes`, returning an `Isx` view of it.
  pub fn parse(bytes: &'isx [u8]) -> Result<Self, HeaderError> {
    if bytes.len() <= HEADER_LEN {
      return Err(HeaderError::TooShort { len: bytes.len() });
    }

    let (header, body) = bytes.split_at(HEADER_LEN);
    if &header[..SIGNATURE.len()] != SIGNATURE {
      let mut found = [0; 4];
      found.copy_from_slice(&header[..4]);
      return Err(HeaderError::BadSignature { found });
    }

    Ok(Self { header, body })
  }

  /// Returns the raw 28-byte build tag.
  pub fn raw_tag(&self) -> &'isx [u8] {
    &self.header[SIGNATURE.len()..]
  }

  /// Returns the build tag in a form fit for display.
  ///
  /// Trailing NUL and space bytes are trimmed, and anything that isn't
  /// printable ASCII is shown as a `.`.
  pub fn build_tag(&self) -> String {
    let tag = self.raw_tag();
    let end = tag
      .iter()
      .rposition(|&b| b != 0 && b != b' ')
      .map(|i| i + 1)
      .unwrap_or(0);

    tag[..end]
      .iter()
      .map(|&b| if 0x20 <= b && b <= 0x7e { b as char } else { '.' })
      .collect()
  }

  /// Returns the record stream that follows the header.
  pub fn body(&self) -> &'isx [u8] {
    self.body
  }

  /// Returns an iterator over the records in this file.
  pub fn records(&self, framing: Framing) -> Records<'isx> {
    Records::new(self.body, HEADER_LEN, framing)
  }
}

/// An error found while checking an ISX header.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum HeaderError {
  /// Indicates that the file is too short to hold a header and any records.
  TooShort {
    /// The length of the file.
    len: usize,
  },
  /// Indicates that the file does not begin with `"ISX "`.
  BadSignature {
    /// The four bytes found instead.
    found: [u8; 4],
  },
}

impl fmt::Display for HeaderError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::TooShort { len } => {
        write!(f, "file is too short to be an ISX file ({} bytes)", len)
      }
      Self::BadSignature { found } => write!(
        f,
        "bad ISX signature: expected {:02x?}, found {:02x?}",
        SIGNATURE, found
      ),
    }
  }
}

impl error::Error for HeaderError {
  fn kind(&self) -> error::Kind {
    match self {
      Self::TooShort { .. } => error::Kind::FileTooShort,
      Self::BadSignature { .. } => error::Kind::BadSignature,
    }
  }

  fn cause(&self) -> error::Cause<'_> {
    error::Cause::Offset(0)
  }

  fn action(&self) -> Option<error::Action> {
    Some(error::Action::Validating)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn header(tag: &[u8]) -> Vec<u8> {
    let mut bytes = SIGNATURE.to_vec();
    bytes.extend_from_slice(tag);
    bytes.resize(HEADER_LEN, b' ');
    bytes
  }

  #[test]
  fn too_short() {
    assert_eq!(
      Isx::parse(&[]).unwrap_err(),
      HeaderError::TooShort { len: 0 }
    );
    // A header alone, with no records, is still too short.
    let bytes = header(b"1.00");
    assert_eq!(
      Isx::parse(&bytes).unwrap_err(),
      HeaderError::TooShort { len: 32 }
    );
  }

  #[test]
  fn bad_signature() {
    let mut bytes = header(b"1.00");
    bytes[..4].copy_from_slice(b"XXX ");
    bytes.push(0x01);
    assert_eq!(
      Isx::parse(&bytes).unwrap_err(),
      HeaderError::BadSignature { found: *b"XXX " }
    );
    assert_eq!(
      error::Error::kind(&Isx::parse(&bytes).unwrap_err()),
      error::Kind::BadSignature
    );
  }

  #[test]
  fn build_tag_is_trimmed() {
    let mut bytes = header(b"1.00 build test");
    bytes.push(0x01);
    let isx = Isx::parse(&bytes).unwrap();
    assert_eq!(isx.raw_tag().len(), 28);
    assert_eq!(isx.build_tag(), "1.00 build test");
    assert_eq!(isx.body(), &[0x01]);

    let mut bytes = header(b"v2\x01x");
    bytes[8..].iter_mut().for_each(|b| *b = 0);
    bytes.push(0x01);
    assert_eq!(Isx::parse(&bytes).unwrap().build_tag(), "v2.x");
  }
}
