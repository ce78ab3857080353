//! Objdump-style listings of ISX records, and extraction of record payloads
//! into standalone files.

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::emit;
use crate::emit::FileError;
use crate::error;
use crate::isx::DecodeError;
use crate::isx::Framing;
use crate::isx::Isx;
use crate::isx::Record;

/// Bytes shown per row of a listing.
const ROW_LEN: usize = 16;

/// Writes a listing of every record in `isx` to `w`.
///
/// Records are listed up to the first decoding error, which is then returned.
pub fn list(
  isx: &Isx<'_>,
  framing: Framing,
  mut w: impl io::Write,
) -> Result<(), DumpError> {
  writeln!(w, ".tag \"{}\"", isx.build_tag())?;
  for record in isx.records(framing) {
    match record? {
      Record::BankData(data) => {
        writeln!(
          w,
          "{:08x}: .bank ${:02x} ${:04x}, {} bytes",
          data.offset,
          data.at.bank,
          data.at.addr,
          data.data.len()
        )?;
        hexdump(data.at.addr, data.data, &mut w)?;
      }
      Record::Metadata(meta) => writeln!(
        w,
        "{:08x}: .meta {}, {} entries, {} bytes",
        meta.offset, meta.kind, meta.entries, meta.len
      )?,
    }
  }
  Ok(())
}

/// Writes `data` as rows of hex bytes followed by their ASCII rendering.
fn hexdump(addr: u16, data: &[u8], w: &mut impl io::Write) -> io::Result<()> {
  let mut ascii_str = String::new();
  for (i, chunk) in data.chunks(ROW_LEN).enumerate() {
    write!(w, "  {:04x}:", addr.wrapping_add((i * ROW_LEN) as u16))?;

    ascii_str.clear();
    for &byte in chunk {
      write!(w, " {:02x}", byte)?;

      if 0x20 <= byte && byte <= 0x7e {
        ascii_str.push(byte as char);
      } else {
        ascii_str.push('.');
      }
    }
    for _ in chunk.len()..ROW_LEN {
      write!(w, "   ")?;
    }
    writeln!(w, "  |{}|", ascii_str)?;
  }
  Ok(())
}

/// Writes the payload of every `BANK_DATA` record in `isx` to its own file.
///
/// Files are named after `stem`, plus the record's bank and address: a record
/// for `$01:4000` with a stem of `out/game` goes to `out/game_01_4000.bin`.
/// Should two records share a destination, the later one's file name is
/// suffixed with its file offset.
///
/// Returns the paths written, in record order.
pub fn split(
  isx: &Isx<'_>,
  framing: Framing,
  stem: &Path,
) -> Result<Vec<PathBuf>, DumpError> {
  let stem_name = stem
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();

  let mut seen = HashSet::new();
  let mut paths = Vec::new();
  for record in isx.records(framing) {
    let data = match record? {
      Record::BankData(data) => data,
      Record::Metadata(_) => continue,
    };

    let mut name =
      format!("{}_{:02X}_{:04X}", stem_name, data.at.bank, data.at.addr);
    if !seen.insert(data.at) {
      name.push_str(&format!("_{:X}", data.offset));
    }
    name.push_str(".bin");

    let path = stem.with_file_name(name);
    emit::write_atomic(&path, data.data)?;
    paths.push(path);
  }
  Ok(paths)
}

/// An error produced while dumping records.
#[derive(Debug)]
pub enum DumpError {
  /// The record stream is malformed.
  Decode(DecodeError),
  /// A payload file could not be written.
  File(FileError),
  /// The listing could not be written.
  Io(io::Error),
}

impl From<DecodeError> for DumpError {
  fn from(e: DecodeError) -> Self {
    DumpError::Decode(e)
  }
}

impl From<FileError> for DumpError {
  fn from(e: FileError) -> Self {
    DumpError::File(e)
  }
}

impl From<io::Error> for DumpError {
  fn from(e: io::Error) -> Self {
    DumpError::Io(e)
  }
}

impl fmt::Display for DumpError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Decode(e) => write!(f, "{}", e),
      Self::File(e) => write!(f, "{}", e),
      Self::Io(e) => write!(f, "could not write listing: {}", e),
    }
  }
}

impl error::Error for DumpError {
  fn kind(&self) -> error::Kind {
    match self {
      Self::Decode(e) => e.kind(),
      Self::File(e) => e.kind(),
      Self::Io(_) => error::Kind::OutputWriteFailed,
    }
  }

  fn cause(&self) -> error::Cause<'_> {
    match self {
      Self::Decode(e) => e.cause(),
      Self::File(e) => e.cause(),
      Self::Io(_) => error::Cause::File(Path::new("<stdout>")),
    }
  }

  fn action(&self) -> Option<error::Action> {
    match self {
      Self::Decode(e) => e.action(),
      Self::File(e) => e.action(),
      Self::Io(_) => Some(error::Action::Emitting),
    }
  }
}
