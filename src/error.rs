//! Error printing facilities.
//!
//! These functions are used to simplify the display of the various conversion
//! errors and warnings to the user. The [`Error`] trait describes how a Rust
//! error type can be converted into a simple diagnostic.
//!
//! [`Error`]: trait.Error.html

use std::fmt;
use std::io;
use std::path::Path;

/// An error which can be described as a diagnostic.
///
/// Types that implement `Error` must also implement [`std::fmt::Display`]. For
/// the user-displayed error to look right, this implementation should only be
/// one line long.
///
/// [`std::fmt::Display`]: https://doc.rust-lang.org/std/fmt/trait.Display.html
pub trait Error: fmt::Debug + fmt::Display {
  /// Returns the category this diagnostic belongs to.
  fn kind(&self) -> Kind;
  /// Returns a `Cause` describing the input that resulted in the error.
  fn cause(&self) -> Cause<'_>;
  /// Returns an action this error is associated with, if any at all.
  fn action(&self) -> Option<Action>;
  /// Returns how serious this diagnostic is.
  fn severity(&self) -> Severity {
    self.kind().severity()
  }
}

/// The category of a diagnostic.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Kind {
  /// The input is too short to contain a header and any records.
  FileTooShort,
  /// The input does not start with the `ISX ` signature.
  BadSignature,
  /// The input ended in the middle of a record.
  TruncatedInput,
  /// A record tag outside the known set was found.
  UnknownRecordType,
  /// A known record tag whose framing is not understood was found.
  UnsupportedRecordType,
  /// A record tried to write outside its bank's window.
  OutOfBankRange,
  /// Two records wrote different values to the same byte.
  OverlapConflict,
  /// A metadata record was skipped.
  IgnoredRecord,
  /// The input file could not be read.
  InputReadFailed,
  /// The options file could not be read or understood.
  BadConfig,
  /// The output could not be written.
  OutputWriteFailed,
}

impl Kind {
  /// Returns the default severity of diagnostics of this kind.
  pub fn severity(self) -> Severity {
    match self {
      Self::OverlapConflict => Severity::Warning,
      Self::IgnoredRecord => Severity::Note,
      _ => Severity::Error,
    }
  }
}

/// How serious a diagnostic is.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Severity {
  /// Purely informational.
  Note,
  /// Something the user should know about, which did not stop conversion.
  Warning,
  /// Conversion could not continue.
  Error,
}

impl Severity {
  fn describe(self) -> &'static str {
    match self {
      Self::Note => "note",
      Self::Warning => "warning",
      Self::Error => "error",
    }
  }
}

/// A collection of errors that may built up over the course of an action.
///
/// The type parameter `E` should be a type implementing [`Error`].
///
/// [`Error`]: trait.Error.html
#[derive(Debug)]
pub struct Errors<E>(Vec<E>);

impl<E> Errors<E> {
  /// Creates an empty `Errors`.
  pub fn new() -> Self {
    Errors(Vec::new())
  }

  /// Returns true if this `Errors` hasn't had any errors added yet.
  pub fn is_ok(&self) -> bool {
    self.0.is_empty()
  }

  /// Adds a new error to this `Errors`.
  pub fn push(&mut self, error: E) {
    self.0.push(error);
  }

  /// Returns an iterator over the collected errors, in the order they were
  /// added.
  pub fn iter(&self) -> impl Iterator<Item = &E> {
    self.0.iter()
  }
}

impl<E> Default for Errors<E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<E: Error> Errors<E> {
  /// Returns an iterator over the collected errors of the given kind.
  pub fn of_kind(&self, kind: Kind) -> impl Iterator<Item = &E> {
    self.0.iter().filter(move |e| e.kind() == kind)
  }

  /// Dumps this collection of errors as user-displayable text into `sink`.
  ///
  /// `file` names the input that the errors refer to. Returns `Ok(true)` if
  /// anything was written.
  pub fn dump_to(
    &self,
    file: &Path,
    mut sink: impl io::Write,
  ) -> io::Result<bool> {
    if self.0.is_empty() {
      return Ok(false);
    }

    for (i, error) in self.0.iter().enumerate() {
      dump_one(error, file, &mut sink)?;
      if i != self.0.len() - 1 {
        writeln!(sink, "")?;
      }
    }

    Ok(true)
  }
}

/// Dumps a single error as user-displayable text into `sink`.
pub fn dump_one<E: Error + ?Sized>(
  error: &E,
  file: &Path,
  mut sink: impl io::Write,
) -> io::Result<()> {
  writeln!(sink, "{}: {}", error.severity().describe(), error)?;
  let action = error.action().map(Action::describe);
  match (error.cause(), action) {
    (Cause::Offset(offset), Some(action)) => writeln!(
      sink,
      "  while {} {} at offset 0x{:x}",
      action,
      file.display(),
      offset
    ),
    (Cause::Offset(offset), None) => {
      writeln!(sink, "  at {}, offset 0x{:x}", file.display(), offset)
    }
    (Cause::File(path), Some(action)) => {
      writeln!(sink, "  while {} {}", action, path.display())
    }
    (Cause::File(path), None) => writeln!(sink, "  at {}", path.display()),
  }
}

/// The place where an error occured, to varrying degrees of specificity.
#[derive(Copy, Clone, Debug)]
pub enum Cause<'a> {
  /// A byte offset within the ISX file being converted.
  Offset(usize),
  /// A file, for when we don't know much about where the error came from
  /// within.
  File(&'a Path),
}

/// An action that the converter performs, which an error may be associated
/// with.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Action {
  /// Checking the ISX header.
  Validating,
  /// Splitting the ISX body into records.
  Decoding,
  /// Writing record data into the ROM.
  Placing,
  /// Writing the finished ROM out.
  Emitting,
  /// Reading options or input files.
  Loading,
}

impl Action {
  fn describe(self) -> &'static str {
    match self {
      Self::Validating => "validating",
      Self::Decoding => "decoding",
      Self::Placing => "placing",
      Self::Emitting => "emitting",
      Self::Loading => "loading",
    }
  }
}
