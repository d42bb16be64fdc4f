//! Resolves declarative path lists into files. A [`PathSpec`] is an ordered
//! list of glob patterns where entries prefixed with `!` exclude files; the
//! resolved set is every positive match minus every negative match,
//! regardless of where the entries appear in the list.
//!
//! The [`Loader`] builds on this to serve template sources by basename.

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const EXCLUDE_PREFIX: char = '!';
const GLOB_CHARS: &[char] = &['*', '?', '[', '{'];

/// An ordered list of glob patterns, each optionally prefixed with `!` to
/// exclude its matches. Deserializes from either a single string or a list
/// of strings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathSpec(Vec<String>);

impl PathSpec {
    pub fn new<I, S>(entries: I) -> PathSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PathSpec(entries.into_iter().map(Into::into).collect())
    }

    /// The raw entries in declaration order.
    pub fn entries(&self) -> &[String] {
        &self.0
    }

    /// Resolves the entries into a sorted, deduplicated list of files.
    pub fn resolve(&self) -> Result<Vec<PathBuf>> {
        let mut include = BTreeSet::new();
        let mut exclude = BTreeSet::new();
        for entry in &self.0 {
            match entry.strip_prefix(EXCLUDE_PREFIX) {
                Some(pattern) => exclude.extend(expand(pattern)?),
                None => include.extend(expand(entry)?),
            }
        }
        Ok(include.difference(&exclude).cloned().collect())
    }

    /// Compiles the entries into a [`Matcher`] that tests individual paths
    /// without touching the filesystem.
    pub fn matcher(&self) -> Result<Matcher> {
        let mut include = GlobSetBuilder::new();
        let mut exclude = GlobSetBuilder::new();
        for entry in &self.0 {
            match entry.strip_prefix(EXCLUDE_PREFIX) {
                Some(pattern) => exclude.add(glob(pattern)?.glob().clone()),
                None => include.add(glob(entry)?.glob().clone()),
            };
        }
        Ok(Matcher {
            include: build_set(include, &self.0)?,
            exclude: build_set(exclude, &self.0)?,
        })
    }

    /// The literal directories under which the positive entries can match.
    /// These are the directories a watcher must observe.
    pub fn roots(&self) -> Vec<PathBuf> {
        self.0
            .iter()
            .filter(|entry| !entry.starts_with(EXCLUDE_PREFIX))
            .map(|entry| {
                let (base, rest) = split_pattern(entry);
                match rest {
                    Some(_) => base,
                    None => base.parent().map(Path::to_owned).unwrap_or_default(),
                }
            })
            .collect()
    }

    /// Returns a copy with every relative pattern joined onto
    /// `root`. Exclusion prefixes are preserved.
    pub fn rebase(&self, root: &Path) -> PathSpec {
        PathSpec(
            self.0
                .iter()
                .map(|entry| match entry.strip_prefix(EXCLUDE_PREFIX) {
                    Some(pattern) => format!("{}{}", EXCLUDE_PREFIX, rebase(root, pattern)),
                    None => rebase(root, entry),
                })
                .collect(),
        )
    }
}

impl From<&str> for PathSpec {
    fn from(entry: &str) -> PathSpec {
        PathSpec(vec![entry.to_owned()])
    }
}

impl<'de> Deserialize<'de> for PathSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<PathSpec, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(String),
            Many(Vec<String>),
        }

        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(entry) => PathSpec(vec![entry]),
            OneOrMany::Many(entries) => PathSpec(entries),
        })
    }
}

/// Tests paths against a compiled [`PathSpec`].
pub struct Matcher {
    include: GlobSet,
    exclude: GlobSet,
}

impl Matcher {
    /// True when `path` matches a positive entry and no exclusion.
    pub fn is_match(&self, path: &Path) -> bool {
        self.include.is_match(path) && !self.exclude.is_match(path)
    }
}

fn build_set(builder: GlobSetBuilder, entries: &[String]) -> Result<GlobSet> {
    builder.build().map_err(|err| Error::Pattern {
        pattern: entries.join(", "),
        err,
    })
}

/// Joins a relative `pattern` onto `root`; absolute patterns are returned
/// unchanged.
pub fn rebase(root: &Path, pattern: &str) -> String {
    if Path::new(pattern).is_absolute() {
        pattern.to_owned()
    } else {
        root.join(pattern).to_string_lossy().into_owned()
    }
}

fn glob(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|err| Error::Pattern {
            pattern: pattern.to_owned(),
            err,
        })
}

// Splits a pattern into its literal leading directory and the remaining
// wildcard portion (`None` when the pattern has no wildcards at all).
fn split_pattern(pattern: &str) -> (PathBuf, Option<String>) {
    let components: Vec<&str> = pattern.split('/').collect();
    match components.iter().position(|c| c.contains(GLOB_CHARS)) {
        None => (PathBuf::from(pattern), None),
        Some(i) => {
            let base = components[..i].join("/");
            let base = if base.is_empty() && pattern.starts_with('/') {
                String::from("/")
            } else {
                base
            };
            (PathBuf::from(base), Some(components[i..].join("/")))
        }
    }
}

/// Expands a single glob pattern into the files it matches, sorted. A
/// pattern without wildcards matches itself if it names an existing file.
/// `**` matches any number of directories; other wildcards never cross a
/// path separator.
pub fn expand(pattern: &str) -> Result<Vec<PathBuf>> {
    let (base, rest) = split_pattern(pattern);
    let rest = match rest {
        None if base.is_file() => return Ok(vec![base]),
        None => return Ok(Vec::new()),
        Some(rest) => rest,
    };

    let relative = base.as_os_str().is_empty();
    let root = if relative { PathBuf::from(".") } else { base };
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let matcher = glob(pattern)?;
    let mut walker = WalkDir::new(&root)
        .min_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()));
    if !rest.contains("**") {
        walker = walker.max_depth(rest.split('/').count());
    }

    let mut files = Vec::new();
    for result in walker {
        let entry = result?;
        let path = if relative {
            entry.path().strip_prefix(".").unwrap_or(entry.path())
        } else {
            entry.path()
        };
        if path.is_file() && matcher.is_match(path) {
            files.push(path.to_owned());
        }
    }
    Ok(files)
}

/// Serves file sources by basename from a fixed set of resolved files. This
/// is the lookup the template renderer uses to find layouts and partials.
pub struct Loader {
    files: Vec<PathBuf>,
}

impl Loader {
    /// Resolves every spec and keeps the union, in resolution order.
    pub fn new<'a>(specs: impl IntoIterator<Item = &'a PathSpec>) -> Result<Loader> {
        let mut seen = BTreeSet::new();
        let mut files = Vec::new();
        for spec in specs {
            for file in spec.resolve()? {
                if seen.insert(file.clone()) {
                    files.push(file);
                }
            }
        }
        Ok(Loader { files })
    }

    /// Loads the first file whose basename equals `name`.
    pub fn get_source(&self, name: &str) -> Result<Source> {
        self.files
            .iter()
            .find(|file| file.file_name().map_or(false, |n| n == name))
            .ok_or_else(|| Error::NotFound(name.to_owned()))
            .and_then(|file| Source::load(file))
    }

    /// Loads every file in the loader.
    pub fn sources(&self) -> Result<Vec<Source>> {
        self.files.iter().map(|file| Source::load(file)).collect()
    }
}

/// The contents of a file served by a [`Loader`].
#[derive(Clone, Debug)]
pub struct Source {
    /// The file's basename, which is also its lookup key.
    pub name: String,
    pub path: PathBuf,
    pub contents: String,
}

impl Source {
    fn load(path: &Path) -> Result<Source> {
        let contents = std::fs::read_to_string(path).map_err(|err| Error::Io {
            path: path.to_owned(),
            err,
        })?;
        Ok(Source {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_owned(),
            contents,
        })
    }
}

/// The result of a fallible path resolution.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error resolving paths.
#[derive(Debug)]
pub enum Error {
    /// Returned when a glob pattern doesn't compile.
    Pattern {
        pattern: String,
        err: globset::Error,
    },

    /// Returned for I/O errors while walking directories.
    Walk(walkdir::Error),

    /// Returned for I/O errors while reading a resolved file.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned when a basename lookup finds nothing.
    NotFound(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Pattern { pattern, err } => {
                write!(f, "invalid pattern `{}`: {}", pattern, err)
            }
            Error::Walk(err) => err.fmt(f),
            Error::Io { path, err } => {
                write!(f, "reading `{}`: {}", path.display(), err)
            }
            Error::NotFound(name) => write!(f, "template not found: `{}`", name),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Pattern { pattern: _, err } => Some(err),
            Error::Walk(err) => Some(err),
            Error::Io { path: _, err } => Some(err),
            Error::NotFound(_) => None,
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator while walking directories.
    fn from(err: walkdir::Error) -> Error {
        Error::Walk(err)
    }
}
