//! Builds the pages of one [`PageSet`]. The navigation list and the
//! template renderer are computed once per page set and shared by every
//! page in it.

use crate::config::{FileGroup, Options, PageSet};
use crate::log::{self, timed};
use crate::nav::{self, build_nav, NavEntry};
use crate::page::{self, PageSource};
use crate::pathspec::{self, Loader};
use crate::template::{self, Renderer};
use std::fmt;
use std::path::{Path, PathBuf};

/// Renders and writes the pages of a [`PageSet`].
pub struct PageSetBuilder<'a> {
    options: &'a Options,
    pageset: &'a PageSet,
    renderer: Renderer,
    nav: Option<Vec<NavEntry>>,
}

impl<'a> PageSetBuilder<'a> {
    /// Builds the navigation list (if the page set enables it) and the
    /// template renderer.
    pub fn new(options: &'a Options, pageset: &'a PageSet) -> Result<PageSetBuilder<'a>> {
        let nav = match pageset.options.nav {
            true => Some(build_nav(&pageset.files, options.clean_urls)?),
            false => None,
        };
        let loader = Loader::new(pageset.template_specs())?;
        let renderer = Renderer::new(&loader, options.production, &options.site_globals)?;
        Ok(PageSetBuilder {
            options,
            pageset,
            renderer,
            nav,
        })
    }

    pub fn nav(&self) -> Option<&[NavEntry]> {
        self.nav.as_deref()
    }

    /// Resolves every page source of every file-group, paired with its
    /// group.
    pub fn sources(&self) -> Result<Vec<(&'a FileGroup, PathBuf)>> {
        let pageset: &'a PageSet = self.pageset;
        let mut sources = Vec::new();
        for group in &pageset.files {
            for src in group.src.resolve()? {
                sources.push((group, src));
            }
        }
        Ok(sources)
    }

    /// Builds every page. Each page's outcome is reported to `on_page` as
    /// soon as it's known; with `fail_fast`, building stops at the first
    /// failure.
    pub fn build(
        &self,
        fail_fast: bool,
        mut on_page: impl FnMut(&Path, Result<PathBuf>),
    ) -> Result<()> {
        for (group, src) in self.sources()? {
            let result = self.build_page(group, &src);
            let failed = result.is_err();
            on_page(&src, result);
            if failed && fail_fast {
                break;
            }
        }
        Ok(())
    }

    /// Loads, renders, and writes a single page source belonging to
    /// `group`. Returns the path written.
    pub fn build_page(&self, group: &FileGroup, src: &Path) -> Result<PathBuf> {
        let (result, elapsed) = timed(|| -> Result<PathBuf> {
            let page = PageSource::load(
                src,
                &group.dest,
                group.template.as_deref(),
                self.options.clean_urls,
            )?;
            let mut html = self.renderer.render_page(
                &page,
                self.nav(),
                self.pageset.template.as_deref(),
            )?;
            if self.options.minify() {
                html = minify(&html);
            }
            let output = self.options.dist.join(&page.dest);
            write_file(&output, html.as_bytes())?;
            Ok(output)
        });
        if let Ok(output) = &result {
            log!("html"; "built {} in {}", output.display(), log::seconds(elapsed));
        }
        result
    }
}

fn minify(html: &str) -> String {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    let minified = minify_html::minify(html.as_bytes(), &cfg);
    String::from_utf8_lossy(&minified).into_owned()
}

/// Writes `contents` to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, contents)
}

/// The result of a page-set operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error building a page set or one of its pages.
#[derive(Debug)]
pub enum Error {
    /// Returned when the navigation list can't be built.
    Nav(nav::Error),

    /// Returned when page sources or templates can't be resolved.
    Resolve(pathspec::Error),

    /// Returned when a page fails to load.
    Page(page::Error),

    /// Returned when a page fails to render.
    Template(template::Error),

    /// Returned when writing a page fails.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Nav(err) => write!(f, "building navigation: {}", err),
            Error::Resolve(err) => err.fmt(f),
            Error::Page(err) => err.fmt(f),
            Error::Template(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Nav(err) => Some(err),
            Error::Resolve(err) => Some(err),
            Error::Page(err) => Some(err),
            Error::Template(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<nav::Error> for Error {
    fn from(err: nav::Error) -> Error {
        Error::Nav(err)
    }
}

impl From<pathspec::Error> for Error {
    fn from(err: pathspec::Error) -> Error {
        Error::Resolve(err)
    }
}

impl From<page::Error> for Error {
    fn from(err: page::Error) -> Error {
        Error::Page(err)
    }
}

impl From<template::Error> for Error {
    fn from(err: template::Error) -> Error {
        Error::Template(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use std::fs;

    fn project(production: bool) -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pages")).unwrap();
        fs::create_dir_all(root.join("layouts")).unwrap();
        fs::write(
            root.join("layouts/base.html"),
            "<html><body><ul>{{range .nav_pages}}<li>{{.title}}</li>{{end}}</ul>{{.content}}</body></html>",
        )
        .unwrap();
        fs::write(root.join("pages/one.md"), "---\ntitle: One\norder: 1\n---\n# One\n").unwrap();
        fs::write(root.join("pages/two.md"), "---\ntitle: Two\norder: 2\n---\n# Two\n").unwrap();
        fs::write(root.join("pages/extra.md"), "---\ntitle: Extra\n---\nextra\n").unwrap();
        let yaml = format!(
            r#"
options: {{dist: dist, production: {}}}
html:
  - files: {{src: "pages/*.md", dest: "", template: base.html}}
    options: {{nav: true}}
    layouts: "layouts/*.html"
"#,
            production
        );
        let config = Config::from_yaml(&yaml, root).unwrap();
        (dir, config)
    }

    #[test]
    fn test_build_writes_every_page_with_nav() -> Result<()> {
        let (dir, config) = project(false);
        let pageset = &config.html.as_ref().unwrap()[0];
        let builder = PageSetBuilder::new(&config.options, pageset)?;
        let mut written = Vec::new();
        builder.build(false, |_, result| written.push(result.unwrap()))?;
        assert_eq!(3, written.len());

        let extra = fs::read_to_string(dir.path().join("dist/extra.html")).unwrap();
        assert!(extra.contains("<ul><li>One</li><li>Two</li></ul>"));
        assert!(extra.contains("<p>extra</p>"));
        Ok(())
    }

    #[test]
    fn test_build_page_renders_only_that_page() -> Result<()> {
        let (dir, config) = project(false);
        let pageset = &config.html.as_ref().unwrap()[0];
        let builder = PageSetBuilder::new(&config.options, pageset)?;
        let output = builder.build_page(&pageset.files[0], &dir.path().join("pages/two.md"))?;
        assert_eq!(dir.path().join("dist/two.html"), output);
        assert!(!dir.path().join("dist/one.html").exists());
        Ok(())
    }

    #[test]
    fn test_failures_are_reported_per_page() -> Result<()> {
        let (dir, config) = project(false);
        fs::write(dir.path().join("pages/broken.md"), "---\ntitle: [\n---\n").unwrap();
        let pageset = &config.html.as_ref().unwrap()[0];
        let mut pageset = pageset.clone();
        pageset.options.nav = false;
        let builder = PageSetBuilder::new(&config.options, &pageset)?;

        let mut failures = 0;
        let mut successes = 0;
        builder.build(false, |_, result| match result {
            Ok(_) => successes += 1,
            Err(_) => failures += 1,
        })?;
        assert_eq!((1, 3), (failures, successes));

        let mut attempts = 0;
        builder.build(true, |_, _| attempts += 1)?;
        assert_eq!(1, attempts);
        Ok(())
    }

    #[test]
    fn test_production_minifies() -> Result<()> {
        let (dir, config) = project(true);
        let pageset = &config.html.as_ref().unwrap()[0];
        PageSetBuilder::new(&config.options, pageset)?.build(true, |_, r| {
            r.unwrap();
        })?;
        let one = fs::read_to_string(dir.path().join("dist/one.html")).unwrap();
        assert!(one.contains("<h1>One</h1>"));
        assert!(!one.contains("</h1>\n"));
        Ok(())
    }
}
