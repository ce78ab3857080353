//! Types and functions for building Game Boy ROM binaries.
//!
//! A Game Boy ROM is a sequence of 16 KiB banks. Bank 0 is always visible at
//! `$0000..$4000`; every other bank is switched into `$4000..$8000` by the
//! cartridge's mapper. The `Rom` trait provides a common interface for writing
//! into a ROM through these banked addresses.
//!
//! The following diagram describes how banked addresses land in the ROM
//! image:
//! ```text
//!   CPU $0000..$3fff   CPU $4000..$7fff
//! +------------------+------------------+
//! | $000000..$003fff |                  | bank $00
//! +------------------+------------------+
//! |                  | $004000..$007fff | bank $01
//! +------------------+------------------+
//! |                  | $008000..$00bfff | bank $02
//! +------------------+------------------+
//!  ...
//! +------------------+------------------+
//! |                  | $3fc000..$3fffff | bank $ff
//! +------------------+------------------+
//! ```
//! The empty boxes above are not valid destinations for that bank.

use std::collections::BTreeMap;
use std::fmt;

use crate::addr::rom_banks;
use crate::addr::BankAddr;
use crate::addr::BANK_LEN;

/// A writable ROM, addressed through banked addresses.
pub trait Rom {
  /// Writes `data` starting at `at`.
  ///
  /// Bytes that were already written by an earlier call are overwritten; any
  /// that change value are reported back as `Overlap`s.
  fn place(
    &mut self,
    at: BankAddr,
    data: &[u8],
  ) -> Result<Vec<Overlap>, PlaceError>;
}

/// A run of bytes that were overwritten with different values.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Overlap {
  /// The first overwritten byte.
  pub at: BankAddr,
  /// The number of consecutive overwritten bytes.
  pub len: u16,
}

/// An error produced while placing data into a ROM.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PlaceError {
  /// Indicates that the data does not fit in its bank's address window.
  OutOfBankRange {
    /// The destination of the data.
    at: BankAddr,
    /// The length of the data.
    len: usize,
  },
  /// Indicates that the data lies past the end of a fixed-size ROM.
  BeyondRom {
    /// The destination of the data.
    at: BankAddr,
    /// The length of the data.
    len: usize,
    /// The length of the ROM.
    rom_len: usize,
  },
}

impl fmt::Display for PlaceError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::OutOfBankRange { at, len } => {
        let window = BankAddr::window(at.bank);
        write!(
          f,
          "{} bytes at {} do not fit in bank window ${:04x}..${:04x}",
          len, at, window.start, window.end
        )
      }
      Self::BeyondRom { at, len, rom_len } => write!(
        f,
        "{} bytes at {} lie past the end of the {} byte ROM",
        len, at, rom_len
      ),
    }
  }
}

/// A single bank of an `Image`, with a mask of which bytes have been written.
#[derive(Clone)]
struct Bank {
  bytes: Box<[u8]>,
  written: Box<[bool]>,
}

impl Bank {
  fn new() -> Self {
    Self {
      bytes: vec![0; BANK_LEN].into_boxed_slice(),
      written: vec![false; BANK_LEN].into_boxed_slice(),
    }
  }
}

/// Writes `data` over `bytes` starting at `start`, recording conflicts
/// against the `written` mask.
///
/// `at` is the banked address of `bytes[start]`, and is used only for
/// reporting.
fn write_masked(
  bytes: &mut [u8],
  written: &mut [bool],
  start: usize,
  at: BankAddr,
  data: &[u8],
) -> Vec<Overlap> {
  let mut overlaps = Vec::<Overlap>::new();
  let mut last_conflict: Option<usize> = None;

  for (i, &byte) in data.iter().enumerate() {
    let j = start + i;
    if written[j] && bytes[j] != byte {
      let extends_run = last_conflict.map(|last| last + 1) == Some(i);
      match overlaps.last_mut() {
        Some(run) if extends_run => run.len += 1,
        _ => overlaps.push(Overlap {
          at: at.offset(i as u16),
          len: 1,
        }),
      }
      last_conflict = Some(i);
    }
    bytes[j] = byte;
    written[j] = true;
  }

  overlaps
}

/// A sparse, growable Game Boy ROM image.
///
/// Banks are allocated when first written to. Bytes that are never written are
/// filled in when the image is serialized.
#[derive(Clone, Default)]
pub struct Image {
  banks: BTreeMap<u8, Bank>,
  highest: Option<u8>,
}

impl Image {
  /// Creates a new, empty `Image`.
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the highest bank that has been written to, if any.
  pub fn highest_bank(&self) -> Option<u8> {
    self.highest
  }

  /// Returns the number of banks the serialized ROM will have.
  pub fn bank_count(&self) -> usize {
    rom_banks(self.highest)
  }

  /// Returns the length in bytes of the serialized ROM.
  pub fn len(&self) -> usize {
    self.bank_count() * BANK_LEN
  }

  /// Gets the byte at `at`, if it has been written.
  pub fn get(&self, at: BankAddr) -> Option<u8> {
    let offset = at.bank_offset()?;
    let bank = self.banks.get(&at.bank)?;
    if bank.written[offset] {
      Some(bank.bytes[offset])
    } else {
      None
    }
  }

  /// Serializes this image into a flat ROM, using `fill` for every byte that
  /// was never written.
  pub fn serialize(&self, fill: u8) -> Box<[u8]> {
    let mut rom = vec![fill; self.len()].into_boxed_slice();
    for (&index, bank) in &self.banks {
      let base = index as usize * BANK_LEN;
      let dest = &mut rom[base..base + BANK_LEN];
      for (i, _) in bank.written.iter().enumerate().filter(|(_, w)| **w) {
        dest[i] = bank.bytes[i];
      }
    }
    rom
  }
}

impl Rom for Image {
  fn place(
    &mut self,
    at: BankAddr,
    data: &[u8],
  ) -> Result<Vec<Overlap>, PlaceError> {
    let span = at.span(data.len()).ok_or(PlaceError::OutOfBankRange {
      at,
      len: data.len(),
    })?;
    self.highest = self.highest.max(Some(at.bank));
    if data.is_empty() {
      return Ok(Vec::new());
    }

    let bank = self.banks.entry(at.bank).or_insert_with(Bank::new);
    Ok(write_masked(
      &mut bank.bytes,
      &mut bank.written,
      span.start,
      at,
      data,
    ))
  }
}

impl fmt::Debug for Image {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Image")
      .field("banks", &self.banks.keys().collect::<Vec<_>>())
      .field("highest", &self.highest)
      .finish()
  }
}

/// An existing ROM, being patched in place.
///
/// Unlike an `Image`, a `Patch` never grows: data placed past the end of the
/// original ROM is an error.
#[derive(Clone, Debug)]
pub struct Patch {
  bytes: Vec<u8>,
  written: Vec<bool>,
}

impl Patch {
  /// Creates a new `Patch` over the given ROM bytes.
  pub fn new(bytes: Vec<u8>) -> Self {
    let written = vec![false; bytes.len()];
    Self { bytes, written }
  }

  /// Returns the length of the ROM being patched.
  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  /// Consumes this `Patch`, returning the patched ROM bytes.
  pub fn into_bytes(self) -> Box<[u8]> {
    self.bytes.into_boxed_slice()
  }
}

impl Rom for Patch {
  fn place(
    &mut self,
    at: BankAddr,
    data: &[u8],
  ) -> Result<Vec<Overlap>, PlaceError> {
    let len = data.len();
    let start = match (at.span(len), at.rom_offset()) {
      (Some(_), Some(start)) => start,
      _ => return Err(PlaceError::OutOfBankRange { at, len }),
    };
    if start + len > self.bytes.len() {
      return Err(PlaceError::BeyondRom {
        at,
        len,
        rom_len: self.bytes.len(),
      });
    }

    Ok(write_masked(&mut self.bytes, &mut self.written, start, at, data))
  }
}
