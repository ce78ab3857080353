//! Whole conversions, from the bytes of an ISX file to the bytes of a ROM.
//!
//! Nothing in here touches the filesystem; see [`emit`] for that.
//!
//! [`emit`]: ../emit/index.html

use std::fmt;

use log::info;

use crate::config::Options;
use crate::error;
use crate::isx::HeaderError;
use crate::isx::Isx;
use crate::link;
use crate::link::Summary;
use crate::rom::Image;
use crate::rom::Patch;

/// A finished ROM, plus what happened while building it.
#[derive(Debug)]
pub struct Output {
  /// The ROM bytes.
  pub rom: Box<[u8]>,
  /// The input's build tag, trimmed for display.
  pub build_tag: String,
  /// Records processed, non-fatal diagnostics, and the layout.
  pub summary: Summary,
}

/// Converts the ISX file `raw` into a fresh ROM.
pub fn convert(raw: &[u8], opts: &Options) -> Result<Output, Error> {
  let isx = Isx::parse(raw)?;

  let mut image = Image::new();
  let summary = link::link(&mut image, &isx, opts)?;
  info!(
    "emitting {} banks ({} bytes), fill {}",
    image.bank_count(),
    image.len(),
    opts.fill
  );

  Ok(Output {
    rom: image.serialize(opts.fill.byte()),
    build_tag: summary.build_tag.clone(),
    summary,
  })
}

/// Applies the records of the ISX file `raw` on top of an existing ROM.
///
/// The ROM never changes size; records that land outside it are errors.
/// `opts.fill` is unused.
pub fn patch(
  raw: &[u8],
  rom: Vec<u8>,
  opts: &Options,
) -> Result<Output, Error> {
  let isx = Isx::parse(raw)?;

  let mut patch = Patch::new(rom);
  let summary = link::link(&mut patch, &isx, opts)?;
  info!("patched {} byte ROM", patch.len());

  Ok(Output {
    rom: patch.into_bytes(),
    build_tag: summary.build_tag.clone(),
    summary,
  })
}

/// A fatal conversion error.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Error {
  /// The ISX header is unusable.
  Header(HeaderError),
  /// The records could not be laid out.
  Link(link::Error),
}

impl From<HeaderError> for Error {
  fn from(e: HeaderError) -> Self {
    Error::Header(e)
  }
}

impl From<link::Error> for Error {
  fn from(e: link::Error) -> Self {
    Error::Link(e)
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Header(e) => write!(f, "{}", e),
      Self::Link(e) => write!(f, "{}", e),
    }
  }
}

impl error::Error for Error {
  fn kind(&self) -> error::Kind {
    match self {
      Self::Header(e) => e.kind(),
      Self::Link(e) => e.kind(),
    }
  }

  fn cause(&self) -> error::Cause<'_> {
    match self {
      Self::Header(e) => e.cause(),
      Self::Link(e) => e.cause(),
    }
  }

  fn action(&self) -> Option<error::Action> {
    match self {
      Self::Header(e) => e.action(),
      Self::Link(e) => e.action(),
    }
  }

  fn severity(&self) -> error::Severity {
    match self {
      Self::Header(e) => e.severity(),
      Self::Link(e) => e.severity(),
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  use crate::config::Fill;
  use crate::error::Error as _;
  use crate::error::Kind;
  use crate::isx::Framing;

  const HEADER: &[u8; 32] = b"ISX 1.00 build test             ";

  fn isx(records: &[&[u8]]) -> Vec<u8> {
    let mut bytes = HEADER.to_vec();
    for record in records {
      bytes.extend_from_slice(record);
    }
    bytes
  }

  fn record(bank: u8, addr: u16, data: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x01, bank];
    bytes.extend_from_slice(&addr.to_le_bytes());
    bytes.extend_from_slice(&(data.len() as u16).to_le_bytes());
    bytes.extend_from_slice(data);
    bytes
  }

  macro_rules! assert_rejected {
    ($raw:expr => $kind:ident) => {
      let err = convert(&$raw, &Options::default()).unwrap_err();
      assert_eq!(err.kind(), Kind::$kind, "{}", err);
      assert_eq!(err.severity(), error::Severity::Error);
    };
  }

  #[test]
  fn minimal() {
    let raw = isx(&[&[
      0x01, 0x00, 0x00, 0x01, 0x04, 0x00, 0xde, 0xad, 0xbe, 0xef,
    ]]);
    let out = convert(&raw, &Options::default()).unwrap();
    assert_eq!(out.build_tag, "1.00 build test");
    assert_eq!(out.rom.len(), 0x8000);
    assert_eq!(&out.rom[0x100..0x104], &[0xde, 0xad, 0xbe, 0xef]);
    assert!(out.rom[..0x100].iter().all(|&b| b == 0xff));
    assert!(out.rom[0x104..].iter().all(|&b| b == 0xff));
    assert!(out.summary.diagnostics.is_ok());
  }

  #[test]
  fn two_banks() {
    let raw = isx(&[
      &[0x01, 0x00, 0x34, 0x12, 0x02, 0x00, 0xaa, 0xbb],
      &[0x01, 0x02, 0x00, 0x40, 0x01, 0x00, 0xcc],
    ]);
    let out = convert(&raw, &Options::default()).unwrap();
    assert_eq!(out.rom.len(), 0x10000);
    assert_eq!(out.rom[0x1234], 0xaa);
    assert_eq!(out.rom[0x1235], 0xbb);
    assert_eq!(out.rom[0x8000], 0xcc);
    assert_eq!(out.rom[0x4000], 0xff);
    assert_eq!(out.summary.records, 2);
  }

  #[test]
  fn overlap() {
    let raw = isx(&[
      &[0x01, 0x00, 0x00, 0x20, 0x02, 0x00, 0x11, 0x22],
      &[0x01, 0x00, 0x01, 0x20, 0x02, 0x00, 0x33, 0x44],
    ]);
    let out = convert(&raw, &Options::default()).unwrap();
    assert_eq!(out.rom.len(), 0x8000);
    assert_eq!(&out.rom[0x2000..0x2003], &[0x11, 0x33, 0x44]);

    let diags = out.summary.diagnostics.iter().collect::<Vec<_>>();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind(), Kind::OverlapConflict);
    assert_eq!(diags[0].severity(), error::Severity::Warning);
    match diags[0] {
      link::Diagnostic::Overlap { overlap, .. } => {
        assert_eq!(overlap.at.addr, 0x2001)
      }
      d => panic!("unexpected diagnostic: {:?}", d),
    }

    let strict = Options {
      strict: true,
      ..Options::default()
    };
    let err = convert(&raw, &strict).unwrap_err();
    assert_eq!(err.kind(), Kind::OverlapConflict);
  }

  #[test]
  fn identical_rewrite_is_not_an_overlap() {
    let raw = isx(&[&record(0, 0x150, &[1, 2]), &record(0, 0x150, &[1, 2])]);
    let strict = Options {
      strict: true,
      ..Options::default()
    };
    let out = convert(&raw, &strict).unwrap();
    assert!(out.summary.diagnostics.is_ok());
  }

  #[test]
  fn rejections() {
    let out_of_bank: &[u8] = &[0x01, 0x00, 0x00, 0x40, 0x01, 0x00, 0xff];
    assert_rejected!(isx(&[out_of_bank]) => OutOfBankRange);
    let truncated: &[u8] = &[0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x01, 0x02];
    assert_rejected!(isx(&[truncated]) => TruncatedInput);

    let mut bad_sig = isx(&[&record(0, 0, &[0])]);
    bad_sig[..4].copy_from_slice(b"XXX ");
    assert_rejected!(bad_sig => BadSignature);

    assert_rejected!(HEADER.to_vec() => FileTooShort);
    assert_rejected!(HEADER[..10].to_vec() => FileTooShort);
    assert_rejected!(isx(&[&[0x02]]) => UnknownRecordType);
    assert_rejected!(isx(&[&[0xff]]) => UnknownRecordType);
    assert_rejected!(isx(&[&[0x11]]) => UnsupportedRecordType);
    assert_rejected!(isx(&[&record(1, 0x3fff, &[0])]) => OutOfBankRange);
    assert_rejected!(isx(&[&record(1, 0x7fff, &[0, 0])]) => OutOfBankRange);
  }

  #[test]
  fn placement_round_trips() {
    let data = (0..=0xffu8).collect::<Vec<_>>();
    let places = [(0u8, 0u16), (0, 0x3f00), (1, 0x4000), (5, 0x7f00)];
    for &(bank, addr) in &places {
      for &fill in &[Fill::Ones, Fill::Zeroes] {
        let raw = isx(&[&record(bank, addr, &data)]);
        let opts = Options {
          fill,
          ..Options::default()
        };
        let rom = convert(&raw, &opts).unwrap().rom;

        let start = if bank == 0 {
          addr as usize
        } else {
          bank as usize * 0x4000 + (addr as usize - 0x4000)
        };
        assert_eq!(&rom[start..start + data.len()], &data[..]);
        assert!(rom[..start].iter().all(|&b| b == fill.byte()));
        assert!(rom[start + data.len()..].iter().all(|&b| b == fill.byte()));
      }
    }
  }

  #[test]
  fn rom_size_is_minimal_power_of_two() {
    let expected = |highest: usize| {
      (highest + 1).max(2).next_power_of_two() * 0x4000
    };
    for &bank in &[0u8, 1, 2, 3, 4, 7, 8, 9, 100, 128, 255] {
      let addr = if bank == 0 { 0 } else { 0x4000 };
      let raw = isx(&[&record(0, 0, &[1]), &record(bank, addr, &[2])]);
      let rom = convert(&raw, &Options::default()).unwrap().rom;
      assert_eq!(rom.len(), expected(bank as usize), "bank {}", bank);
      assert_eq!(rom.len() % 0x4000, 0);
      assert!((rom.len() / 0x4000).is_power_of_two());
    }
  }

  #[test]
  fn empty_records_count_towards_rom_size() {
    let raw = isx(&[
      &[0x01, 0x00, 0x00, 0x01, 0x01, 0x00, 0xaa],
      &[0x01, 0x09, 0x00, 0x40, 0x00, 0x00],
    ]);
    let out = convert(&raw, &Options::default()).unwrap();
    assert_eq!(out.rom.len() / 0x4000, 16);
    assert_eq!(out.rom[0x100], 0xaa);
    assert!(out.rom[0x24000..0x28000].iter().all(|&b| b == 0xff));
    assert_eq!(out.summary.layout.total(), 1);
  }

  #[test]
  fn deterministic() {
    let raw = isx(&[
      &record(3, 0x4123, &[9, 8, 7]),
      &record(0, 0x0000, &[1; 64]),
      &record(0, 0x0020, &[2; 8]),
    ]);
    let a = convert(&raw, &Options::default()).unwrap();
    let b = convert(&raw, &Options::default()).unwrap();
    assert_eq!(a.rom, b.rom);
  }

  #[test]
  fn metadata_framing() {
    let raw = isx(&[
      &[0x13, 0x01, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0],
      &record(0, 0x150, &[0x42]),
    ]);
    let err = convert(&raw, &Options::default()).unwrap_err();
    assert_eq!(err.kind(), Kind::UnsupportedRecordType);

    let opts = Options {
      framing: Framing::Metadata,
      ..Options::default()
    };
    let out = convert(&raw, &opts).unwrap();
    assert_eq!(out.rom[0x150], 0x42);
    let ignored = out.summary.diagnostics.of_kind(Kind::IgnoredRecord);
    assert_eq!(ignored.count(), 1);
  }

  #[test]
  fn patching() {
    let base = vec![0u8; 0x8000];
    let raw =
      isx(&[&record(0, 0x134, b"PATCHED"), &record(1, 0x7ffe, &[1, 2])]);
    let out = patch(&raw, base, &Options::default()).unwrap();
    assert_eq!(out.rom.len(), 0x8000);
    assert_eq!(&out.rom[0x134..0x13b], b"PATCHED");
    assert_eq!(&out.rom[0x7ffe..], &[1, 2]);
    assert_eq!(out.rom[0x133], 0);

    let raw = isx(&[&record(2, 0x4000, &[1])]);
    let err = patch(&raw, vec![0u8; 0x8000], &Options::default()).unwrap_err();
    assert_eq!(err.kind(), Kind::OutOfBankRange);
  }
}
