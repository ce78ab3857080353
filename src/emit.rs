//! Reading input files and writing finished ROMs out.
//!
//! ROMs are never written in place: the bytes go to a hidden temporary file
//! next to the destination, which is renamed over the destination once it is
//! complete. If anything fails, the temporary file is removed and the
//! destination is left untouched.

use std::fmt;
use std::fs;
use std::fs::File;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use log::debug;

use crate::error;

/// Reads the whole file at `path`.
pub fn read(path: &Path) -> Result<Vec<u8>, FileError> {
  fs::read(path).map_err(|inner| FileError {
    path: path.to_path_buf(),
    action: error::Action::Loading,
    inner,
  })
}

/// Writes `bytes` to `path`, replacing it only once every byte has been
/// written successfully.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FileError> {
  let mut temp = TempFile {
    path: temp_path(path),
    persisted: false,
  };
  debug!("writing {} bytes via {}", bytes.len(), temp.path.display());

  match write_and_rename(&temp.path, path, bytes) {
    Ok(()) => {
      temp.persisted = true;
      Ok(())
    }
    Err(inner) => Err(FileError {
      path: path.to_path_buf(),
      action: error::Action::Emitting,
      inner,
    }),
  }
}

fn write_and_rename(temp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
  let mut file = File::create(temp)?;
  file.write_all(bytes)?;
  file.sync_all()?;
  drop(file);
  fs::rename(temp, path)
}

/// Returns the path of the temporary file used while writing `path`.
fn temp_path(path: &Path) -> PathBuf {
  let name = path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();
  path.with_file_name(format!(".{}.tmp", name))
}

/// A temporary file that is deleted on drop unless it has been persisted.
struct TempFile {
  path: PathBuf,
  persisted: bool,
}

impl Drop for TempFile {
  fn drop(&mut self) {
    if !self.persisted {
      // The file may never have been created.
      let _ = fs::remove_file(&self.path);
    }
  }
}

/// An I/O error while reading or writing a file.
#[derive(Debug)]
pub struct FileError {
  /// The file being read or written.
  pub path: PathBuf,
  /// Whether the file was being read (`Loading`) or written (`Emitting`).
  pub action: error::Action,
  /// The underlying error.
  pub inner: io::Error,
}

impl fmt::Display for FileError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self.action {
      error::Action::Emitting => {
        write!(f, "could not write output: {}", self.inner)
      }
      _ => write!(f, "could not read file: {}", self.inner),
    }
  }
}

impl error::Error for FileError {
  fn kind(&self) -> error::Kind {
    match self.action {
      error::Action::Emitting => error::Kind::OutputWriteFailed,
      _ => error::Kind::InputReadFailed,
    }
  }

  fn cause(&self) -> error::Cause<'_> {
    error::Cause::File(&self.path)
  }

  fn action(&self) -> Option<error::Action> {
    Some(self.action)
  }
}
