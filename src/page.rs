//! Defines [`PageSource`] and the logic for loading page metadata and body
//! content from the file system. A page source is one of three kinds (see
//! [`PageSourceKind`]), resolved once from its file extension:
//!
//! * `.yaml` files are pure data. The whole file is the page's metadata and
//!   it is rendered through an external template.
//! * `.md` files carry a YAML frontmatter block followed by a Markdown body.
//! * `.html` files carry a YAML frontmatter block followed by a template
//!   body.
//!
//! A frontmatter block is structured as follows:
//!
//! ```md
//! ---
//! title: About
//! order: 2
//! ---
//! # Hello
//! ```
//!
//! A file that doesn't open with a fence has no metadata and its whole
//! contents are the body.

use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::{Path, PathBuf};

const FENCE: &str = "---";
const HTML_EXTENSION: &str = "html";

/// The kind of a page source, resolved from its file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSourceKind {
    /// A `.yaml` data file rendered through an external template.
    Data,

    /// A `.md` file whose body is converted from Markdown after templating.
    Markdown,

    /// A `.html` file whose body is itself a template.
    Template,
}

impl PageSourceKind {
    /// Resolves the kind of `path` from its extension.
    pub fn from_path(path: &Path) -> Result<PageSourceKind> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(PageSourceKind::Data),
            Some("md") | Some("markdown") => Ok(PageSourceKind::Markdown),
            Some("html") | Some("htm") => Ok(PageSourceKind::Template),
            _ => Err(Error::UnsupportedFormat(path.to_owned())),
        }
    }
}

/// A page source file together with its metadata and body content.
#[derive(Clone, Debug)]
pub struct PageSource {
    /// The source file.
    pub src: PathBuf,

    /// The output file, relative to the destination root.
    pub dest: PathBuf,

    /// The basename of the source file less its extension.
    pub id: String,

    pub kind: PageSourceKind,

    /// The frontmatter (or, for data pages, the whole file).
    pub metadata: Mapping,

    /// The body content. `None` for data pages.
    pub content: Option<String>,

    /// The template named by the page's file-group, if any.
    pub template: Option<String>,
}

impl PageSource {
    /// Loads a page source. `dest_dir` is the file-group's destination
    /// directory (relative to the destination root); see [`destination`]
    /// for how the output path is derived.
    pub fn load(
        src: &Path,
        dest_dir: &Path,
        template: Option<&str>,
        clean_urls: bool,
    ) -> Result<PageSource> {
        match Self::load_inner(src, dest_dir, template, clean_urls) {
            Ok(page) => Ok(page),
            Err(e) => Err(Error::Annotated(
                format!("loading page `{}`", src.display()),
                Box::new(e),
            )),
        }
    }

    fn load_inner(
        src: &Path,
        dest_dir: &Path,
        template: Option<&str>,
        clean_urls: bool,
    ) -> Result<PageSource> {
        let kind = PageSourceKind::from_path(src)?;
        let input = std::fs::read_to_string(src)?;
        let (metadata, content) = match kind {
            PageSourceKind::Data => (parse_mapping(&input)?, None),
            PageSourceKind::Markdown | PageSourceKind::Template => {
                let (metadata, body) = parse_frontmatter(&input)?;
                (metadata, Some(body.to_owned()))
            }
        };

        Ok(PageSource {
            src: src.to_owned(),
            dest: destination(src, dest_dir, clean_urls)?,
            id: page_id(src)?,
            kind,
            metadata,
            content,
            template: template.map(str::to_owned),
        })
    }

    /// Looks up a metadata key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(&Value::String(key.to_owned()))
    }

    /// Looks up a metadata key that holds a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}

/// Derives the output path of a page: the source's basename with its
/// extension replaced by `.html`, joined onto `dest_dir`. With `clean_urls`
/// the extension is dropped entirely.
///
/// `destination("foo/bar/baz.md", "out/dir", false)` is `out/dir/baz.html`.
pub fn destination(src: &Path, dest_dir: &Path, clean_urls: bool) -> Result<PathBuf> {
    let id = page_id(src)?;
    Ok(match clean_urls {
        true => dest_dir.join(id),
        false => dest_dir.join(format!("{}.{}", id, HTML_EXTENSION)),
    })
}

/// The page's identifier: its basename less the extension.
pub fn page_id(src: &Path) -> Result<String> {
    src.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
        .ok_or_else(|| Error::InvalidFileName(src.to_owned()))
}

/// Splits `input` into its frontmatter mapping and its body. Input without
/// an opening fence has empty metadata and is entirely body.
pub fn parse_frontmatter(input: &str) -> Result<(Mapping, &str)> {
    fn frontmatter_indices(input: &str) -> Result<Option<(usize, usize, usize)>> {
        let first_line_end = input.find('\n').unwrap_or_else(|| input.len());
        if input[..first_line_end].trim_end() != FENCE {
            return Ok(None);
        }
        let yaml_start = (first_line_end + 1).min(input.len());
        let mut offset = yaml_start;
        for line in input[yaml_start..].split_inclusive('\n') {
            if line.trim_end() == FENCE {
                return Ok(Some((
                    yaml_start,          // yaml_start
                    offset,              // yaml_stop
                    offset + line.len(), // body_start
                )));
            }
            offset += line.len();
        }
        Err(Error::FrontmatterMissingEndFence)
    }

    match frontmatter_indices(input)? {
        None => Ok((Mapping::new(), input)),
        Some((yaml_start, yaml_stop, body_start)) => Ok((
            parse_mapping(&input[yaml_start..yaml_stop])?,
            &input[body_start..],
        )),
    }
}

fn parse_mapping(yaml: &str) -> Result<Mapping> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str(yaml)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(Error::NotAMapping),
    }
}

/// Represents the result of a page-load operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading a [`PageSource`].
#[derive(Debug)]
pub enum Error {
    /// Returned when a page source's extension is not `.yaml`, `.md`, or
    /// `.html`.
    UnsupportedFormat(PathBuf),

    /// Returned when a frontmatter block is opened but never closed.
    FrontmatterMissingEndFence,

    /// Returned when the metadata is valid YAML but not a mapping.
    NotAMapping,

    /// Returned when there was an error parsing the metadata as YAML.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when a source file name has no usable UTF-8 stem.
    InvalidFileName(PathBuf),

    /// Returned for I/O errors reading the source.
    Io(std::io::Error),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl Error {
    /// Strips annotations, returning the underlying error.
    pub fn root(&self) -> &Error {
        match self {
            Error::Annotated(_, err) => err.root(),
            err => err,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnsupportedFormat(path) => write!(
                f,
                "`{}` must be in either .yaml, .md or .html format",
                path.display()
            ),
            Error::FrontmatterMissingEndFence => {
                write!(f, "Missing closing `---`")
            }
            Error::NotAMapping => write!(f, "metadata must be a mapping"),
            Error::DeserializeYaml(err) => err.fmt(f),
            Error::InvalidFileName(path) => {
                write!(f, "invalid file name: {:?}", path)
            }
            Error::Io(err) => err.fmt(f),
            Error::Annotated(annotation, err) => {
                write!(f, "{}: {}", &annotation, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::UnsupportedFormat(_) => None,
            Error::FrontmatterMissingEndFence => None,
            Error::NotAMapping => None,
            Error::DeserializeYaml(err) => Some(err),
            Error::InvalidFileName(_) => None,
            Error::Io(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_destination_replaces_extension() -> Result<()> {
        for src in &["foo/bar/baz.md", "foo/bar/baz.yaml", "foo/bar/baz.html"] {
            assert_eq!(
                PathBuf::from("out/dir/baz.html"),
                destination(Path::new(src), Path::new("out/dir"), false)?
            );
        }
        Ok(())
    }

    #[test]
    fn test_destination_clean_urls() -> Result<()> {
        assert_eq!(
            PathBuf::from("out/dir/baz"),
            destination(Path::new("foo/baz.md"), Path::new("out/dir"), true)?
        );
        Ok(())
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(
            PageSourceKind::Data,
            PageSourceKind::from_path(Path::new("a.yaml")).unwrap()
        );
        assert_eq!(
            PageSourceKind::Markdown,
            PageSourceKind::from_path(Path::new("a.md")).unwrap()
        );
        assert_eq!(
            PageSourceKind::Template,
            PageSourceKind::from_path(Path::new("a.html")).unwrap()
        );
        assert!(matches!(
            PageSourceKind::from_path(Path::new("a.txt")),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_parse_frontmatter() -> Result<()> {
        let (metadata, body) = parse_frontmatter("---\ntitle: X\norder: 2\n---\n**hi**\n")?;
        assert_eq!(
            Some("X"),
            metadata
                .get(&Value::String("title".into()))
                .and_then(Value::as_str)
        );
        assert_eq!(
            Some(2),
            metadata
                .get(&Value::String("order".into()))
                .and_then(Value::as_i64)
        );
        assert_eq!("**hi**\n", body);
        Ok(())
    }

    #[test]
    fn test_body_may_contain_fences() -> Result<()> {
        let (_, body) = parse_frontmatter("---\na: 1\n---\nbefore\n---\nafter")?;
        assert_eq!("before\n---\nafter", body);
        Ok(())
    }

    #[test]
    fn test_missing_frontmatter_is_all_body() -> Result<()> {
        let (metadata, body) = parse_frontmatter("<p>plain</p>")?;
        assert!(metadata.is_empty());
        assert_eq!("<p>plain</p>", body);
        Ok(())
    }

    #[test]
    fn test_missing_end_fence() {
        assert!(matches!(
            parse_frontmatter("---\ntitle: X\n"),
            Err(Error::FrontmatterMissingEndFence)
        ));
    }

    #[test]
    fn test_load_markdown_page() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("about.md");
        fs::write(&src, "---\ntitle: About\n---\nbody").unwrap();
        let page = PageSource::load(&src, Path::new("pages"), Some("layout.html"), false)?;
        assert_eq!(PageSourceKind::Markdown, page.kind);
        assert_eq!("about", page.id);
        assert_eq!(PathBuf::from("pages/about.html"), page.dest);
        assert_eq!(Some("About"), page.get_str("title"));
        assert_eq!(Some("body"), page.content.as_deref());
        assert_eq!(Some("layout.html"), page.template.as_deref());
        Ok(())
    }

    #[test]
    fn test_load_data_page_has_no_content() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("pricing.yaml");
        fs::write(&src, "title: Pricing\ntiers: [a, b]\n").unwrap();
        let page = PageSource::load(&src, Path::new(""), None, false)?;
        assert_eq!(PageSourceKind::Data, page.kind);
        assert!(page.content.is_none());
        assert_eq!(Some("Pricing"), page.get_str("title"));
        Ok(())
    }

    #[test]
    fn test_load_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        fs::write(&src, "hello").unwrap();
        let err = PageSource::load(&src, Path::new(""), None, false).unwrap_err();
        assert!(matches!(err.root(), Error::UnsupportedFormat(_)));
    }
}
