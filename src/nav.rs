//! Builds the navigation list for a page set from page metadata. Every page
//! whose metadata has an `order` key contributes a [`NavEntry`]; pages
//! without one are still built but never listed. A page that fails to load
//! is left out of the list; the render phase reports it against that page.

use crate::config::FileGroup;
use crate::page::PageSource;
use crate::pathspec;
use serde_yaml::{Number, Value};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

/// One navigation-menu record.
#[derive(Clone, Debug, PartialEq)]
pub struct NavEntry {
    /// The page's `title`, or its id when the page has none.
    pub title: String,
    pub subtitle: Option<String>,

    /// The page's output path relative to the destination root.
    pub dest: PathBuf,
    pub order: Number,
}

impl NavEntry {
    /// Extracts a [`NavEntry`] from a page, if the page declares an `order`.
    pub fn from_page(page: &PageSource) -> Result<Option<NavEntry>> {
        let order = match page.get("order") {
            None => return Ok(None),
            Some(Value::Number(order)) => order.clone(),
            Some(_) => return Err(Error::InvalidOrder(page.src.clone())),
        };
        Ok(Some(NavEntry {
            title: page.get_str("title").unwrap_or(&page.id).to_owned(),
            subtitle: page.get_str("subtitle").map(str::to_owned),
            dest: page.dest.clone(),
            order,
        }))
    }

    fn sort_key(&self) -> f64 {
        self.order.as_f64().unwrap_or(0.0)
    }
}

/// Loads every page of every file-group and returns the navigation entries
/// sorted ascending by `order`. Ties keep discovery order.
pub fn build_nav(groups: &[FileGroup], clean_urls: bool) -> Result<Vec<NavEntry>> {
    let mut entries = Vec::new();
    for group in groups {
        for src in group.src.resolve()? {
            let page =
                match PageSource::load(&src, &group.dest, group.template.as_deref(), clean_urls) {
                    Ok(page) => page,
                    Err(err) => {
                        log!("html"; "leaving {} out of the nav: {}", src.display(), err);
                        continue;
                    }
                };
            if let Some(entry) = NavEntry::from_page(&page)? {
                entries.push(entry);
            }
        }
    }
    entries.sort_by(|a, b| {
        a.sort_key()
            .partial_cmp(&b.sort_key())
            .unwrap_or(Ordering::Equal)
    });
    Ok(entries)
}

/// The result of building a navigation list.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error building a navigation list.
#[derive(Debug)]
pub enum Error {
    /// Returned when a file-group's sources can't be resolved.
    Resolve(pathspec::Error),

    /// Returned when a page's `order` is not a number.
    InvalidOrder(PathBuf),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Resolve(err) => err.fmt(f),
            Error::InvalidOrder(path) => {
                write!(f, "`order` in `{}` must be a number", path.display())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Resolve(err) => Some(err),
            Error::InvalidOrder(_) => None,
        }
    }
}

impl From<pathspec::Error> for Error {
    fn from(err: pathspec::Error) -> Error {
        Error::Resolve(err)
    }
}
