//! Joins source files into a single text blob. Used for script bundles and
//! for the stylesheet source that is handed to [`crate::style`].

use crate::pathspec;
use std::fmt;
use std::path::{Path, PathBuf};

/// Concatenates the contents of every file named by `entries`, in
/// declaration order. Each entry is first expanded as a glob relative to
/// `root`; if that yields nothing, the entry is looked up as written in each
/// of `include_paths` in turn. An entry that resolves to nothing is an error.
pub fn concat_files(
    entries: &[String],
    root: &Path,
    include_paths: &[PathBuf],
) -> Result<String> {
    let mut contents = String::new();
    for file in resolve(entries, root, include_paths)? {
        contents.push_str(&std::fs::read_to_string(&file).map_err(|err| Error::Io {
            path: file.clone(),
            err,
        })?);
    }
    Ok(contents)
}

/// Resolves `entries` into the ordered list of files [`concat_files`] reads.
pub fn resolve(
    entries: &[String],
    root: &Path,
    include_paths: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in entries {
        let globbed = pathspec::expand(&pathspec::rebase(root, entry))?;
        if !globbed.is_empty() {
            files.extend(globbed);
        } else if !include_paths.is_empty() {
            files.push(search_include_paths(entry, include_paths)?);
        } else {
            return Err(Error::NotFound(entry.clone()));
        }
    }
    Ok(files)
}

/// Returns the first `include_path/name` that is an existing file.
pub fn search_include_paths(name: &str, include_paths: &[PathBuf]) -> Result<PathBuf> {
    include_paths
        .iter()
        .map(|include_path| include_path.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| Error::NotFound(name.to_owned()))
}

/// The result of a fallible concatenation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error concatenating files.
#[derive(Debug)]
pub enum Error {
    /// Returned when an entry matches no file and no include path has it.
    NotFound(String),

    /// Returned when an entry is not a valid glob pattern.
    Resolve(pathspec::Error),

    /// Returned when a resolved file can't be read.
    Io { path: PathBuf, err: std::io::Error },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound(entry) => write!(f, "can't find `{}`", entry),
            Error::Resolve(err) => err.fmt(f),
            Error::Io { path, err } => {
                write!(f, "reading `{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NotFound(_) => None,
            Error::Resolve(err) => Some(err),
            Error::Io { path: _, err } => Some(err),
        }
    }
}

impl From<pathspec::Error> for Error {
    fn from(err: pathspec::Error) -> Error {
        Error::Resolve(err)
    }
}
