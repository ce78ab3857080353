//! The assembler, which is used to lay the records of an ISX file out into a
//! ROM.

use std::fmt;

use log::debug;
use log::info;
use log::warn;

use crate::config::Options;
use crate::error;
use crate::error::Errors;
use crate::isx::DecodeError;
use crate::isx::Isx;
use crate::isx::Metadata;
use crate::isx::Record;
use crate::layout::Layout;
use crate::rom::Overlap;
use crate::rom::PlaceError;
use crate::rom::Rom;

/// Places every record of `isx` into `rom`.
///
/// Returns a `Summary` of what was done on success, or the first fatal
/// `Error` encountered.
pub fn link(
  rom: &mut dyn Rom,
  isx: &Isx<'_>,
  opts: &Options,
) -> Result<Summary, Error> {
  Linker::new(rom, opts).run(isx)
}

/// A fatal error produced while laying out records.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Error {
  /// Indicates that the record stream is malformed.
  Decode(DecodeError),
  /// Indicates that a record could not be placed.
  Place {
    /// The file offset of the offending record.
    offset: usize,
    /// What was wrong with the placement.
    inner: PlaceError,
  },
  /// Indicates a conflicting overlap while overlaps are fatal.
  Overlap {
    /// The file offset of the record that overwrote earlier data.
    offset: usize,
    /// The overwritten bytes.
    overlap: Overlap,
  },
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Decode(e) => write!(f, "{}", e),
      Self::Place { inner, .. } => write!(f, "{}", inner),
      Self::Overlap { overlap, .. } => describe_overlap(overlap, f),
    }
  }
}

impl error::Error for Error {
  fn kind(&self) -> error::Kind {
    match self {
      Self::Decode(e) => e.kind(),
      Self::Place { .. } => error::Kind::OutOfBankRange,
      Self::Overlap { .. } => error::Kind::OverlapConflict,
    }
  }

  fn cause(&self) -> error::Cause<'_> {
    match self {
      Self::Decode(e) => e.cause(),
      Self::Place { offset, .. } | Self::Overlap { offset, .. } => {
        error::Cause::Offset(*offset)
      }
    }
  }

  fn action(&self) -> Option<error::Action> {
    match self {
      Self::Decode(e) => e.action(),
      _ => Some(error::Action::Placing),
    }
  }

  fn severity(&self) -> error::Severity {
    error::Severity::Error
  }
}

impl From<DecodeError> for Error {
  fn from(e: DecodeError) -> Self {
    Error::Decode(e)
  }
}

fn describe_overlap(
  overlap: &Overlap,
  f: &mut fmt::Formatter,
) -> fmt::Result {
  if overlap.len == 1 {
    write!(f, "overwrote previously placed byte at {}", overlap.at)
  } else {
    write!(
      f,
      "overwrote {} previously placed bytes at {}",
      overlap.len, overlap.at
    )
  }
}

/// A non-fatal diagnostic produced while laying out records.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Diagnostic {
  /// A record overwrote bytes placed by an earlier record with different
  /// values.
  Overlap {
    /// The file offset of the overwriting record.
    offset: usize,
    /// The overwritten bytes.
    overlap: Overlap,
  },
  /// A metadata record was skipped.
  Ignored(Metadata),
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Overlap { overlap, .. } => describe_overlap(overlap, f),
      Self::Ignored(meta) => write!(
        f,
        "skipped {} record ({} entries, {} bytes)",
        meta.kind, meta.entries, meta.len
      ),
    }
  }
}

impl error::Error for Diagnostic {
  fn kind(&self) -> error::Kind {
    match self {
      Self::Overlap { .. } => error::Kind::OverlapConflict,
      Self::Ignored(_) => error::Kind::IgnoredRecord,
    }
  }

  fn cause(&self) -> error::Cause<'_> {
    match self {
      Self::Overlap { offset, .. } => error::Cause::Offset(*offset),
      Self::Ignored(meta) => error::Cause::Offset(meta.offset),
    }
  }

  fn action(&self) -> Option<error::Action> {
    match self {
      Self::Overlap { .. } => Some(error::Action::Placing),
      Self::Ignored(_) => Some(error::Action::Decoding),
    }
  }
}

/// What happened while laying out an ISX file.
#[derive(Debug)]
pub struct Summary {
  /// The ISX file's build tag, trimmed for display.
  pub build_tag: String,
  /// The number of records processed.
  pub records: usize,
  /// Non-fatal diagnostics, in the order they were found.
  pub diagnostics: Errors<Diagnostic>,
  /// Where data was placed.
  pub layout: Layout,
}

struct Linker<'rom, 'opt> {
  rom: &'rom mut dyn Rom,
  opts: &'opt Options,

  records: usize,
  layout: Layout,
  diagnostics: Errors<Diagnostic>,
}

impl<'rom, 'opt> Linker<'rom, 'opt> {
  pub fn new(rom: &'rom mut dyn Rom, opts: &'opt Options) -> Self {
    Self {
      rom,
      opts,
      records: 0,
      layout: Layout::new(),
      diagnostics: Errors::new(),
    }
  }

  pub fn run(mut self, isx: &Isx<'_>) -> Result<Summary, Error> {
    let build_tag = isx.build_tag();
    info!("ISX build tag: {}", build_tag);

    let mut records = isx.records(self.opts.framing);
    for record in &mut records {
      self.commit(record?)?;
    }
    debug_assert!(records.is_done());

    info!(
      "placed {} records, {} bytes",
      self.records,
      self.layout.total()
    );
    Ok(Summary {
      build_tag,
      records: self.records,
      diagnostics: self.diagnostics,
      layout: self.layout,
    })
  }

  fn commit(&mut self, record: Record<'_>) -> Result<(), Error> {
    self.records += 1;
    let data = match record {
      Record::BankData(data) => data,
      Record::Metadata(meta) => {
        debug!("0x{:06x}: skipping {} record", meta.offset, meta.kind);
        self.diagnostics.push(Diagnostic::Ignored(meta));
        return Ok(());
      }
    };

    debug!(
      "0x{:06x}: {} bytes at {}",
      data.offset,
      data.data.len(),
      data.at
    );
    let overlaps = self.rom.place(data.at, data.data).map_err(|inner| {
      Error::Place {
        offset: data.offset,
        inner,
      }
    })?;
    self.layout.push(data.at, data.data.len() as u16);

    for overlap in overlaps {
      if self.opts.strict {
        return Err(Error::Overlap {
          offset: data.offset,
          overlap,
        });
      }
      warn!(
        "0x{:06x}: overwrote {} bytes at {}",
        data.offset, overlap.len, overlap.at
      );
      self.diagnostics.push(Diagnostic::Overlap {
        offset: data.offset,
        overlap,
      });
    }
    Ok(())
  }
}
