//! ISX records, and the decoder that splits an ISX body into them.

use std::fmt;
use std::iter::FusedIterator;

use crate::addr::BankAddr;
use crate::error;

/// Record tag values.
pub mod tag {
  /// Raw bytes destined for a ROM bank.
  pub const BANK_DATA: u8 = 0x01;
  /// Reserved; framing unknown.
  pub const RESERVED_03: u8 = 0x03;
  /// Reserved; framing unknown.
  pub const RESERVED_04: u8 = 0x04;
  /// Reserved; framing unknown.
  pub const RESERVED_11: u8 = 0x11;
  /// Address range information.
  pub const RANGES: u8 = 0x13;
  /// Symbol information.
  pub const SYMBOLS: u8 = 0x14;

  /// Returns whether `tag` is one that ISAS is known to emit.
  pub fn is_known(tag: u8) -> bool {
    match tag {
      BANK_DATA | RESERVED_03 | RESERVED_04 | RESERVED_11 | RANGES
      | SYMBOLS => true,
      _ => false,
    }
  }
}

/// How the decoder treats records that do not carry ROM data.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Framing {
  /// Every record other than `BANK_DATA` stops decoding.
  Strict,
  /// Range and symbol records are framed and handed out as
  /// [`Record::Metadata`]; the remaining reserved tags still stop decoding.
  ///
  /// [`Record::Metadata`]: enum.Record.html#variant.Metadata
  Metadata,
}

impl Default for Framing {
  fn default() -> Self {
    Framing::Strict
  }
}

/// A single decoded ISX record.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Record<'isx> {
  /// Bytes to be written into a ROM bank.
  BankData(BankData<'isx>),
  /// A record that carries no ROM data.
  Metadata(Metadata),
}

impl Record<'_> {
  /// Returns the file offset of this record's tag byte.
  pub fn offset(&self) -> usize {
    match self {
      Self::BankData(data) => data.offset,
      Self::Metadata(meta) => meta.offset,
    }
  }

  /// Returns this record's tag byte.
  pub fn tag(&self) -> u8 {
    match self {
      Self::BankData(_) => tag::BANK_DATA,
      Self::Metadata(meta) => meta.kind.tag(),
    }
  }
}

/// A `BANK_DATA` record.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BankData<'isx> {
  /// The file offset of the record's tag byte.
  pub offset: usize,
  /// Where the data goes.
  pub at: BankAddr,
  /// The data itself, borrowed from the ISX buffer.
  pub data: &'isx [u8],
}

/// A range or symbol record, framed but not interpreted.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Metadata {
  /// The file offset of the record's tag byte.
  pub offset: usize,
  /// What kind of metadata this is.
  pub kind: MetadataKind,
  /// The number of entries the record declares.
  pub entries: u16,
  /// The length of the whole record, tag byte included.
  pub len: usize,
}

/// The kinds of metadata record the decoder knows how to frame.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MetadataKind {
  /// Address range information (tag `0x13`).
  Ranges,
  /// Symbol information (tag `0x14`).
  Symbols,
}

impl MetadataKind {
  /// Returns the tag byte for this kind of record.
  pub fn tag(self) -> u8 {
    match self {
      Self::Ranges => tag::RANGES,
      Self::Symbols => tag::SYMBOLS,
    }
  }
}

impl fmt::Display for MetadataKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Ranges => write!(f, "range information"),
      Self::Symbols => write!(f, "symbol information"),
    }
  }
}

/// An error found while decoding records.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DecodeError {
  /// Indicates that the input ended partway through a record.
  Truncated {
    /// The file offset of the record's tag byte.
    offset: usize,
    /// How many bytes the failing read wanted.
    needed: usize,
    /// How many bytes were left.
    available: usize,
  },
  /// Indicates a record type that is known to exist, but whose length cannot
  /// be determined.
  Unsupported {
    /// The record's tag byte.
    tag: u8,
    /// The file offset of the record's tag byte.
    offset: usize,
  },
  /// Indicates a tag byte that no known record type uses.
  Unknown {
    /// The record's tag byte.
    tag: u8,
    /// The file offset of the record's tag byte.
    offset: usize,
  },
}

impl fmt::Display for DecodeError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Truncated {
        needed, available, ..
      } => write!(
        f,
        "truncated record: needed {} more bytes, found {}",
        needed, available
      ),
      Self::Unsupported { tag, .. } => {
        write!(f, "unsupported record type 0x{:02x}", tag)
      }
      Self::Unknown { tag, .. } => {
        write!(f, "unknown record type 0x{:02x}", tag)
      }
    }
  }
}

impl error::Error for DecodeError {
  fn kind(&self) -> error::Kind {
    match self {
      Self::Truncated { .. } => error::Kind::TruncatedInput,
      Self::Unsupported { .. } => error::Kind::UnsupportedRecordType,
      Self::Unknown { .. } => error::Kind::UnknownRecordType,
    }
  }

  fn cause(&self) -> error::Cause<'_> {
    match *self {
      Self::Truncated { offset, .. }
      | Self::Unsupported { offset, .. }
      | Self::Unknown { offset, .. } => error::Cause::Offset(offset),
    }
  }

  fn action(&self) -> Option<error::Action> {
    Some(error::Action::Decoding)
  }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum State {
  Ready,
  Done,
  Failed,
}

/// An iterator over the records of an ISX body.
///
/// Records are decoded lazily, one per call to `next()`. Once an error has
/// been returned the iterator yields nothing further: without a length for
/// the bad record there is no way to find the next one.
#[derive(Clone, Debug)]
pub struct Records<'isx> {
  body: &'isx [u8],
  /// The file offset of `body[0]`, for error reporting.
  base: usize,
  pos: usize,
  framing: Framing,
  state: State,
}

impl<'isx> Records<'isx> {
  /// Creates a new `Records` over `body`, which starts at file offset `base`.
  pub fn new(body: &'isx [u8], base: usize, framing: Framing) -> Self {
    Self {
      body,
      base,
      pos: 0,
      framing,
      state: State::Ready,
    }
  }

  /// Returns the file offset of the next record to be decoded.
  pub fn offset(&self) -> usize {
    self.base + self.pos
  }

  /// Returns whether the whole body has been decoded successfully.
  pub fn is_done(&self) -> bool {
    self.state == State::Done
  }

  fn decode(&self) -> Result<(Record<'isx>, usize), DecodeError> {
    let mut r = Reader {
      body: self.body,
      pos: self.pos,
      offset: self.offset(),
    };

    let offset = r.offset;
    let tag = r.u8()?;
    let record = match tag {
      tag::BANK_DATA => {
        let bank = r.u8()?;
        let addr = r.u16()?;
        let len = r.u16()?;
        let data = r.take(len as usize)?;
        Record::BankData(BankData {
          offset,
          at: BankAddr::new(bank, addr),
          data,
        })
      }
      tag::RANGES if self.framing == Framing::Metadata => {
        let entries = r.u16()?;
        r.take(entries as usize * 9)?;
        Record::Metadata(Metadata {
          offset,
          kind: MetadataKind::Ranges,
          entries,
          len: r.pos - self.pos,
        })
      }
      tag::SYMBOLS if self.framing == Framing::Metadata => {
        let entries = r.u16()?;
        for _ in 0..entries {
          // Name, then flags, address, bank, and a padding byte.
          let name_len = r.u8()?;
          r.take(name_len as usize + 6)?;
        }
        Record::Metadata(Metadata {
          offset,
          kind: MetadataKind::Symbols,
          entries,
          len: r.pos - self.pos,
        })
      }
      tag if tag::is_known(tag) => {
        return Err(DecodeError::Unsupported { tag, offset })
      }
      tag => return Err(DecodeError::Unknown { tag, offset }),
    };

    Ok((record, r.pos))
  }
}

impl<'isx> Iterator for Records<'isx> {
  type Item = Result<Record<'isx>, DecodeError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.state != State::Ready {
      return None;
    }
    if self.pos == self.body.len() {
      self.state = State::Done;
      return None;
    }

    match self.decode() {
      Ok((record, next)) => {
        self.pos = next;
        Some(Ok(record))
      }
      Err(e) => {
        self.state = State::Failed;
        Some(Err(e))
      }
    }
  }
}

impl FusedIterator for Records<'_> {}

/// A bounds-checked little-endian cursor over a record.
struct Reader<'isx> {
  body: &'isx [u8],
  pos: usize,
  /// The file offset of the record being read.
  offset: usize,
}

impl<'isx> Reader<'isx> {
  fn take(&mut self, len: usize) -> Result<&'isx [u8], DecodeError> {
    let available = self.body.len() - self.pos;
    if len > available {
      return Err(DecodeError::Truncated {
        offset: self.offset,
        needed: len,
        available,
      });
    }
    let bytes = &self.body[self.pos..self.pos + len];
    self.pos += len;
    Ok(bytes)
  }

  fn u8(&mut self) -> Result<u8, DecodeError> {
    Ok(self.take(1)?[0])
  }

  fn u16(&mut self) -> Result<u16, DecodeError> {
    let bytes = self.take(2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn decode(
    body: &[u8],
    framing: Framing,
  ) -> Vec<Result<Record<'_>, DecodeError>> {
    Records::new(body, 32, framing).collect()
  }

  #[test]
  fn bank_data() {
    let body = [0x01, 0x00, 0x00, 0x01, 0x04, 0x00, 0xde, 0xad, 0xbe, 0xef];
    let records = decode(&body, Framing::Strict);
    assert_eq!(
      records,
      vec![Ok(Record::BankData(BankData {
        offset: 32,
        at: BankAddr::new(0, 0x0100),
        data: &[0xde, 0xad, 0xbe, 0xef],
      }))]
    );
  }

  #[test]
  fn offsets_follow_records() {
    let body = [
      0x01, 0x00, 0x34, 0x12, 0x02, 0x00, 0xaa, 0xbb, //
      0x01, 0x02, 0x00, 0x40, 0x01, 0x00, 0xcc,
    ];
    let mut records = Records::new(&body, 32, Framing::Strict);
    let first = records.next().unwrap().unwrap();
    assert_eq!(first.offset(), 32);
    assert_eq!(records.offset(), 40);
    let second = records.next().unwrap().unwrap();
    assert_eq!(second.offset(), 40);
    assert!(!records.is_done());
    assert!(records.next().is_none());
    assert!(records.is_done());
  }

  #[test]
  fn payload_is_borrowed() {
    let body = [0x01, 0x03, 0x00, 0x40, 0x02, 0x00, 0x11, 0x22];
    let record = Records::new(&body, 0, Framing::Strict)
      .next()
      .unwrap()
      .unwrap();
    match record {
      Record::BankData(data) => {
        assert_eq!(data.data.as_ptr(), body[6..].as_ptr());
      }
      r => panic!("unexpected record: {:?}", r),
    }
  }

  #[test]
  fn zero_length_bank_data() {
    let body = [0x01, 0x01, 0x00, 0x40, 0x00, 0x00];
    let records = decode(&body, Framing::Strict);
    assert_eq!(records.len(), 1);
    assert!(records[0].is_ok());
  }

  #[test]
  fn truncated_payload() {
    let body = [0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x01, 0x02];
    assert_eq!(
      decode(&body, Framing::Strict),
      vec![Err(DecodeError::Truncated {
        offset: 32,
        needed: 16,
        available: 2,
      })]
    );
  }

  #[test]
  fn truncated_header() {
    let body = [0x01, 0x00, 0x00];
    assert_eq!(
      decode(&body, Framing::Strict),
      vec![Err(DecodeError::Truncated {
        offset: 32,
        needed: 2,
        available: 1,
      })]
    );
  }

  #[test]
  fn trailing_garbage_after_record() {
    let body = [0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0xff, 0x01];
    let records = decode(&body, Framing::Strict);
    assert_eq!(records.len(), 2);
    assert!(records[0].is_ok());
    assert_eq!(
      records[1],
      Err(DecodeError::Truncated {
        offset: 39,
        needed: 1,
        available: 0,
      })
    );
  }

  #[test]
  fn reserved_tags_are_unsupported() {
    for &t in &[0x03, 0x04, 0x11, 0x13, 0x14] {
      let body = [t, 0x00, 0x00, 0x00];
      assert_eq!(
        decode(&body, Framing::Strict),
        vec![Err(DecodeError::Unsupported { tag: t, offset: 32 })]
      );
    }
  }

  #[test]
  fn unknown_tags() {
    for &t in &[0x00, 0x02, 0x20, 0xff] {
      let body = [t, 0x00];
      assert_eq!(
        decode(&body, Framing::Metadata),
        vec![Err(DecodeError::Unknown { tag: t, offset: 32 })]
      );
    }
  }

  #[test]
  fn errors_fuse_the_iterator() {
    let body = [0x02, 0x01, 0x00, 0x00, 0x01, 0x00, 0xff];
    let mut records = Records::new(&body, 32, Framing::Strict);
    assert!(records.next().unwrap().is_err());
    assert!(records.next().is_none());
    assert!(records.next().is_none());
    assert!(!records.is_done());
  }

  #[test]
  fn metadata_framing() {
    let body = [
      // Two range entries.
      0x13, 0x02, 0x00, //
      1, 2, 3, 4, 5, 6, 7, 8, 9, //
      1, 2, 3, 4, 5, 6, 7, 8, 9, //
      // One symbol, "go".
      0x14, 0x01, 0x00, //
      0x02, b'g', b'o', 0x00, 0x10, 0x50, 0x01, 0x00, 0x00, //
      0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x42,
    ];
    let records = decode(&body, Framing::Metadata)
      .into_iter()
      .collect::<Result<Vec<_>, _>>()
      .unwrap();
    assert_eq!(
      records,
      vec![
        Record::Metadata(Metadata {
          offset: 32,
          kind: MetadataKind::Ranges,
          entries: 2,
          len: 21,
        }),
        Record::Metadata(Metadata {
          offset: 53,
          kind: MetadataKind::Symbols,
          entries: 1,
          len: 12,
        }),
        Record::BankData(BankData {
          offset: 65,
          at: BankAddr::new(0, 0x0000),
          data: &[0x42],
        }),
      ]
    );
    assert_eq!(records[1].tag(), tag::SYMBOLS);
  }

  #[test]
  fn metadata_framing_still_rejects_reserved() {
    let body = [0x11, 0x00];
    assert_eq!(
      decode(&body, Framing::Metadata),
      vec![Err(DecodeError::Unsupported {
        tag: 0x11,
        offset: 32,
      })]
    );
  }
}
