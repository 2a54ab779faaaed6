//! Spreadsheet files stored as a JSON array of row objects.
//!
//! Files are opened through `cap_std` directory handles. Writes go to a
//! staging file in the same directory and are renamed into place.

use std::io;
use std::path::{Path, PathBuf};

use cap_std::{ambient_authority, fs::Dir};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::SheetRow;

/// Failures reading or writing a spreadsheet file.
#[derive(Debug, thiserror::Error)]
pub enum SheetFileError {
    /// The file or its directory could not be accessed.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file is not a JSON array of objects.
    #[error("{} is not a spreadsheet export: {message}", path.display())]
    Format {
        /// File being decoded.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },
}

impl SheetFileError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn format(path: &Path, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Read every row from `path`.
///
/// # Errors
///
/// Fails when the file cannot be read or is not an array of JSON objects.
pub fn read_sheet(path: &Path) -> Result<Vec<SheetRow>, SheetFileError> {
    let (directory, file_name) = open_parent(path)?;
    let contents = directory
        .read_to_string(&file_name)
        .map_err(|error| SheetFileError::io(path, error))?;
    let value: Value = serde_json::from_str(&contents)
        .map_err(|error| SheetFileError::format(path, error.to_string()))?;
    let Value::Array(items) = value else {
        return Err(SheetFileError::format(path, "expected a JSON array of rows"));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(row) => Ok(row),
            _ => Err(SheetFileError::format(
                path,
                format!("row {} is not an object", index + 2),
            )),
        })
        .collect()
}

/// Write `rows` to `path`, replacing any existing file.
///
/// # Errors
///
/// Fails when the directory cannot be opened or the file cannot be written.
pub fn write_sheet(path: &Path, rows: &[SheetRow]) -> Result<(), SheetFileError> {
    let (directory, file_name) = open_parent(path)?;
    let mut contents = serde_json::to_vec_pretty(rows)
        .map_err(|error| SheetFileError::format(path, error.to_string()))?;
    contents.push(b'\n');

    let staging = PathBuf::from(format!(".tmp-sheet-{}", Uuid::new_v4().simple()));
    directory
        .write(&staging, &contents)
        .map_err(|error| SheetFileError::io(path, error))?;
    directory
        .rename(&staging, &directory, &file_name)
        .map_err(|error| {
            let _cleanup = directory.remove_file(&staging);
            SheetFileError::io(path, error)
        })
}

fn open_parent(path: &Path) -> Result<(Dir, PathBuf), SheetFileError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| {
        SheetFileError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path must name a file"),
        )
    })?;
    let directory = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|error| SheetFileError::io(path, error))?;
    Ok((directory, PathBuf::from(file_name)))
}
