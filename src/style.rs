//! Compiles concatenated SCSS into CSS.

use std::fmt;
use std::path::PathBuf;

/// Compiles `source` into CSS. `load_paths` are searched for `@import`s;
/// `compressed` selects the minified output style.
pub fn compile(source: &str, load_paths: &[PathBuf], compressed: bool) -> Result<String> {
    let style = match compressed {
        true => grass::OutputStyle::Compressed,
        false => grass::OutputStyle::Expanded,
    };
    let options = load_paths
        .iter()
        .fold(grass::Options::default().style(style), |options, path| {
            options.load_path(path)
        });
    grass::from_string(source.to_owned(), &options).map_err(|err| Error(err.to_string()))
}

/// The result of a stylesheet compilation.
pub type Result<T> = std::result::Result<T, Error>;

/// A stylesheet compile error, carrying the compiler's message.
#[derive(Debug)]
pub struct Error(pub String);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "compile error: {}", self.0)
    }
}

impl std::error::Error for Error {}
