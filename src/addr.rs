//! Banked Game Boy ROM addresses.
//!
//! The Game Boy sees at most 32 KiB of cartridge ROM at once: bank 0 is always
//! mapped at `$0000..$4000`, and one switchable bank is mapped at
//! `$4000..$8000`. ISX records name their destination as a bank byte plus a
//! 16-bit CPU address, which this module turns into an offset within the flat
//! ROM image.

use std::fmt;
use std::ops::Range;

/// The length of a single ROM bank: sixteen kibibytes.
pub const BANK_LEN: usize = 0x4000;

/// The largest number of banks a Game Boy ROM may have (eight mebibytes).
pub const MAX_BANKS: usize = 512;

/// The smallest number of banks an emitted ROM may have.
pub const MIN_BANKS: usize = 2;

/// A banked ROM address, as found in an ISX `BANK_DATA` record.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct BankAddr {
  /// The bank byte.
  pub bank: u8,
  /// The CPU address within the bank's window.
  pub addr: u16,
}

impl BankAddr {
  /// Creates a new `BankAddr`.
  #[inline]
  pub const fn new(bank: u8, addr: u16) -> Self {
    Self { bank, addr }
  }

  /// Returns the CPU address window that `bank` is mapped into.
  ///
  /// ```
  /// # use isx2gb::addr::BankAddr;
  /// assert_eq!(BankAddr::window(0), 0x0000..0x4000);
  /// assert_eq!(BankAddr::window(7), 0x4000..0x8000);
  /// ```
  #[inline]
  pub fn window(bank: u8) -> Range<u32> {
    if bank == 0 {
      0x0000..0x4000
    } else {
      0x4000..0x8000
    }
  }

  /// Returns the offset of this address within its bank, if the address lies
  /// inside the bank's window at all.
  #[inline]
  pub fn bank_offset(self) -> Option<usize> {
    let window = Self::window(self.bank);
    let addr = self.addr as u32;
    if window.contains(&addr) {
      Some((addr - window.start) as usize)
    } else {
      None
    }
  }

  /// Returns the in-bank byte range covered by `len` bytes starting at this
  /// address.
  ///
  /// Returns `None` if the start lies outside the bank's window, or if the
  /// range would run past the end of the bank.
  pub fn span(self, len: usize) -> Option<Range<usize>> {
    let start = self.bank_offset()?;
    let end = start.checked_add(len)?;
    if end > BANK_LEN {
      return None;
    }
    Some(start..end)
  }

  /// Returns the offset of this address within a flat ROM image.
  #[inline]
  pub fn rom_offset(self) -> Option<usize> {
    self
      .bank_offset()
      .map(|offset| self.bank as usize * BANK_LEN + offset)
  }

  /// Offsets this `BankAddr`. Only the `addr` part is affected, always
  /// wrapping around on overflow.
  #[must_use]
  #[inline]
  pub fn offset(self, offset: u16) -> Self {
    Self {
      bank: self.bank,
      addr: self.addr.wrapping_add(offset),
    }
  }
}

impl fmt::Display for BankAddr {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "${:02x}:{:04x}", self.bank, self.addr)
  }
}

/// Returns the number of banks a ROM needs so that bank `highest` exists,
/// following the power-of-two sizes that cartridges come in.
///
/// `None` means no bank has been used at all.
pub fn rom_banks(highest: Option<u8>) -> usize {
  let used = highest.map(|b| b as usize + 1).unwrap_or(0);
  used.max(MIN_BANKS).next_power_of_two().min(MAX_BANKS)
}
