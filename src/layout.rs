//! A summary of where record data ended up in the ROM.

use std::collections::BTreeMap;
use std::fmt;

use crate::addr::BankAddr;

/// A contiguous run of placed bytes.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Span {
  /// The first byte of the run.
  pub at: BankAddr,
  /// The length of the run; never zero.
  pub len: u16,
}

impl Span {
  /// Returns the address one past the end of this span.
  fn end(self) -> u32 {
    self.at.addr as u32 + self.len as u32
  }
}

/// Every placement made while building a ROM, grouped by bank.
#[derive(Clone, Debug, Default)]
pub struct Layout {
  banks: BTreeMap<u8, Vec<Span>>,
}

impl Layout {
  /// Creates an empty `Layout`.
  pub fn new() -> Self {
    Self::default()
  }

  /// Records that `len` bytes were placed at `at`. Empty placements are
  /// ignored.
  pub fn push(&mut self, at: BankAddr, len: u16) {
    if len == 0 {
      return;
    }
    self.banks.entry(at.bank).or_default().push(Span { at, len });
  }

  /// Returns the banks that have data placed in them, in ascending order.
  pub fn banks(&self) -> impl Iterator<Item = u8> + '_ {
    self.banks.keys().copied()
  }

  /// Returns the spans placed in `bank`, sorted by address.
  pub fn spans(&self, bank: u8) -> Vec<Span> {
    let mut spans = self.banks.get(&bank).cloned().unwrap_or_default();
    spans.sort();
    spans
  }

  /// Returns the number of distinct bytes placed in `bank`; bytes written
  /// more than once are only counted once.
  pub fn bank_total(&self, bank: u8) -> usize {
    let mut total = 0;
    let mut covered = 0u32;
    for span in self.spans(bank) {
      let start = (span.at.addr as u32).max(covered);
      let end = span.end();
      if end > start {
        total += (end - start) as usize;
      }
      covered = covered.max(end);
    }
    total
  }

  /// Returns the number of distinct bytes placed in the whole ROM.
  pub fn total(&self) -> usize {
    self.banks().map(|bank| self.bank_total(bank)).sum()
  }
}

impl fmt::Display for Layout {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    for (i, bank) in self.banks().enumerate() {
      if i != 0 {
        writeln!(f)?;
      }
      writeln!(f, "ROM bank ${:02x}:", bank)?;
      for span in self.spans(bank) {
        writeln!(
          f,
          "    ${:04x} - ${:04x}  {:5}",
          span.at.addr,
          span.end() - 1,
          span.len
        )?;
      }
      writeln!(f, "                   -----")?;
      writeln!(f, "                   {:5} bytes", self.bank_total(bank))?;
    }
    Ok(())
  }
}
