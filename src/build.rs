//! Exports the [`build_site`] function which stitches together the phases of
//! a full build: cleaning the destination tree, bundling scripts
//! ([`crate::concat`]), compiling stylesheets ([`crate::style`]), rendering
//! every page set ([`crate::pageset`]), placing image and audio assets,
//! copying loose files, and finally the best-effort misc step.
//!
//! Phases run in that order, one at a time. A phase whose configuration
//! section is absent is skipped, and a failed clean ends the build.
//! Failures are collected per unit (one bundle, one page, one copy group)
//! into a [`Report`] and the build keeps going, unless `fail_fast` is set,
//! in which case nothing runs after the first failure.

use crate::concat;
use crate::config::{AssetDir, BundleSection, Config, PageSet};
use crate::log::{self, banner, timed};
use crate::nav;
use crate::page;
use crate::pageset::{self, write_file, PageSetBuilder};
use crate::pathspec;
use crate::style;
use crate::template;
use std::fmt;
use std::path::{Path, PathBuf};

/// Builds the site described by `config` and reports every unit that
/// failed.
pub fn build_site(config: &Config, fail_fast: bool) -> Report {
    let mut build = Build {
        config,
        fail_fast,
        report: Report::default(),
    };
    let (_, elapsed) = timed(|| build.run());
    log!("build"; "finished in {}", log::seconds(elapsed));
    build.report
}

struct Build<'a> {
    config: &'a Config,
    fail_fast: bool,
    report: Report,
}

impl<'a> Build<'a> {
    fn run(&mut self) {
        let config: &'a Config = self.config;
        let dist = &config.options.dist;
        self.phase("C L E A N", |build| {
            let result = clean(dist);
            build.report.record(dist.display().to_string(), result);
        });
        if !self.report.is_ok() {
            return;
        }
        if let Some(section) = &config.js {
            self.phase("J S", |build| {
                for dest in section.paths.keys() {
                    if build.stopped() {
                        break;
                    }
                    let result = build_script(config, dest);
                    build.report.record(dest.display().to_string(), result);
                }
            });
        }
        if let Some(section) = &config.scss {
            self.phase("C S S", |build| {
                for dest in section.paths.keys() {
                    if build.stopped() {
                        break;
                    }
                    let result = build_style(config, dest);
                    build.report.record(dest.display().to_string(), result);
                }
            });
        }
        if let Some(pagesets) = &config.html {
            self.phase("H T M L", |build| {
                for (i, pageset) in pagesets.iter().enumerate() {
                    if build.stopped() {
                        break;
                    }
                    build.pageset(i, pageset);
                }
            });
        }
        if config.images.is_some() || config.audio.is_some() {
            self.phase("A S S E T S", |build| {
                for assets in config.images.iter().chain(config.audio.iter()) {
                    if build.stopped() {
                        break;
                    }
                    let result = place_assets(config, assets);
                    build.report.record(assets.dest.display().to_string(), result);
                }
            });
        }
        if let Some(copy) = &config.copy {
            self.phase("C O P Y", |build| {
                for (dest, spec) in copy {
                    if build.stopped() {
                        break;
                    }
                    let result = copy_files(config, dest, spec);
                    build.report.record(dest.display().to_string(), result);
                }
            });
        }
        self.phase("M I S C", |_| misc(config));
    }

    fn phase(&mut self, name: &str, f: impl FnOnce(&mut Build<'a>)) {
        if self.stopped() {
            return;
        }
        banner(name);
        let (_, elapsed) = timed(|| f(self));
        log!("build"; "{} took {}", name, log::seconds(elapsed));
    }

    fn pageset(&mut self, i: usize, pageset: &PageSet) {
        let unit = format!("html[{}]", i);
        let builder = match PageSetBuilder::new(&self.config.options, pageset) {
            Ok(builder) => builder,
            Err(err) => {
                self.report.record::<()>(unit, Err(err.into()));
                return;
            }
        };
        let report = &mut self.report;
        let result = builder.build(self.fail_fast, |src, result| {
            report.record(src.display().to_string(), result.map_err(Error::from));
        });
        self.report.record(unit, result.map_err(Error::from));
    }

    fn stopped(&self) -> bool {
        self.fail_fast && !self.report.is_ok()
    }
}

/// The outcome of a full build: every unit that failed, in the order the
/// failures happened.
#[derive(Debug, Default)]
pub struct Report {
    pub failures: Vec<Failure>,
}

/// A unit (bundle destination, page source, copy group) that failed.
#[derive(Debug)]
pub struct Failure {
    pub unit: String,
    pub error: Error,
}

impl Report {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// The process exit status for this build: `0` on success, otherwise
    /// the status of the first failure's [`ErrorKind`].
    pub fn exit_code(&self) -> i32 {
        self.failures
            .first()
            .map_or(0, |failure| failure.error.kind().exit_code())
    }

    /// Records `result` against `unit`, logging it if it's a failure.
    pub fn record<T>(&mut self, unit: String, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                log!("error"; "{}: {}", unit, error);
                self.failures.push(Failure { unit, error });
                None
            }
        }
    }
}

/// Empties `dist`, creating it if it doesn't exist. Symlinks inside it are
/// unlinked, never followed.
pub fn clean(dist: &Path) -> Result<()> {
    let clean_err = |err| Error::Clean {
        path: dist.to_owned(),
        err,
    };
    if !dist.exists() {
        return std::fs::create_dir_all(dist).map_err(clean_err);
    }
    for entry in std::fs::read_dir(dist).map_err(clean_err)? {
        let entry = entry.map_err(clean_err)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(clean_err)?;
        let result = if file_type.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            remove_link_or_file(&path)
        };
        result.map_err(|err| Error::Clean { path, err })?;
    }
    log!("clean"; "emptied {}", dist.display());
    Ok(())
}

#[cfg(windows)]
fn remove_link_or_file(path: &Path) -> std::io::Result<()> {
    std::fs::remove_file(path).or_else(|_| std::fs::remove_dir(path))
}

#[cfg(not(windows))]
fn remove_link_or_file(path: &Path) -> std::io::Result<()> {
    std::fs::remove_file(path)
}

fn bundle<'c>(section: Option<&'c BundleSection>, dest: &Path) -> Result<&'c BundleSection> {
    match section {
        Some(section) if section.paths.contains_key(dest) => Ok(section),
        _ => Err(Error::UnknownBundle(dest.to_owned())),
    }
}

/// Concatenates the inputs of the script bundle `dest` and writes them to
/// `dist/dest`.
pub fn build_script(config: &Config, dest: &Path) -> Result<PathBuf> {
    let section = bundle(config.js.as_ref(), dest)?;
    let (result, elapsed) = timed(|| -> Result<PathBuf> {
        let contents = concat::concat_files(
            section.paths[dest].entries(),
            &config.root,
            &section.search,
        )?;
        let output = config.options.dist.join(dest);
        write_file(&output, contents.as_bytes()).map_err(|err| Error::Io {
            path: output.clone(),
            err,
        })?;
        Ok(output)
    });
    if result.is_ok() {
        log!("js"; "built {} in {}", dest.display(), log::seconds(elapsed));
    }
    result
}

/// Concatenates and compiles the inputs of the stylesheet bundle `dest` and
/// writes the CSS to `dist/dest`. The section's search roots double as
/// `@import` load paths.
pub fn build_style(config: &Config, dest: &Path) -> Result<PathBuf> {
    let section = bundle(config.scss.as_ref(), dest)?;
    let (result, elapsed) = timed(|| -> Result<PathBuf> {
        let source = concat::concat_files(
            section.paths[dest].entries(),
            &config.root,
            &section.search,
        )?;
        let css = style::compile(&source, &section.search, config.options.minify())?;
        let output = config.options.dist.join(dest);
        write_file(&output, css.as_bytes()).map_err(|err| Error::Io {
            path: output.clone(),
            err,
        })?;
        Ok(output)
    });
    if result.is_ok() {
        log!("css"; "built {} in {}", dest.display(), log::seconds(elapsed));
    }
    result
}

/// Copies every file `spec` resolves to into `dist/dest`, flattening
/// directory structure.
pub fn copy_files(config: &Config, dest: &Path, spec: &pathspec::PathSpec) -> Result<()> {
    let dest = config.options.dist.join(dest);
    std::fs::create_dir_all(&dest).map_err(|err| Error::Io {
        path: dest.clone(),
        err,
    })?;
    for file in spec.resolve()? {
        let name = match file.file_name() {
            Some(name) => name,
            None => continue,
        };
        let (result, elapsed) = timed(|| std::fs::copy(&file, dest.join(name)));
        result.map_err(|err| Error::Io {
            path: file.clone(),
            err,
        })?;
        log!("copy"; "copied {} in {}", file.display(), log::seconds(elapsed));
    }
    Ok(())
}

/// Local builds link the asset directory into dist; production builds copy
/// it so the deployment walk sees real files.
fn place_assets(config: &Config, assets: &AssetDir) -> Result<()> {
    let dest = config.options.dist.join(&assets.dest);
    let io_err = |err| Error::Io {
        path: assets.src.clone(),
        err,
    };
    if !assets.src.is_dir() {
        return Err(io_err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "asset directory not found",
        )));
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let (result, elapsed) = timed(|| match config.options.production {
        true => copy_dir(&assets.src, &dest),
        false => symlink_dir(&assets.src, &dest),
    });
    result.map_err(io_err)?;
    log!(
        "assets";
        "{} {} in {}",
        if config.options.production { "copied" } else { "linked" },
        dest.display(),
        log::seconds(elapsed)
    );
    Ok(())
}

fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &dst.join(entry.file_name()))?;
        } else {
            std::fs::copy(entry.path(), dst.join(entry.file_name()))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn symlink_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(src, dst)
}

#[cfg(unix)]
fn symlink_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(src, dst)
}

/// Local conveniences. Failures are logged and never recorded.
fn misc(config: &Config) {
    let htaccess = match &config.options.htaccess {
        Some(htaccess) if !config.options.production => htaccess,
        _ => return,
    };
    let link = config.options.dist.join(".htaccess");
    if !htaccess.is_file() {
        log!("misc"; "skipping {}: {} not found", link.display(), htaccess.display());
        return;
    }
    match symlink_file(htaccess, &link) {
        Ok(()) => log!("misc"; "linked {}", link.display()),
        Err(err) => log!("misc"; "skipping {}: {}", link.display(), err),
    }
}

/// The result of a build operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies an [`Error`] for the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The configuration asks for something that can't be done.
    Configuration,

    /// A declared path matched nothing.
    Resolution,

    /// A stylesheet didn't compile.
    Compile,

    /// A page or template didn't render.
    Render,

    /// Reading or writing the filesystem failed.
    Io,
}

impl ErrorKind {
    /// The process exit status for this kind of failure.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Configuration => 2,
            ErrorKind::Resolution => 3,
            ErrorKind::Compile => 4,
            ErrorKind::Render => 5,
            ErrorKind::Io => 6,
        }
    }
}

/// The error type for building a site.
#[derive(Debug)]
pub enum Error {
    /// Returned when a bundle is rebuilt that isn't declared.
    UnknownBundle(PathBuf),

    /// Returned when bundle inputs can't be resolved or read.
    Concat(concat::Error),

    /// Returned when a stylesheet fails to compile.
    Style(style::Error),

    /// Returned when a page set or one of its pages fails.
    PageSet(pageset::Error),

    /// Returned when copy sources can't be resolved.
    Resolve(pathspec::Error),

    /// Returned for I/O problems while cleaning the destination tree.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for other I/O errors.
    Io { path: PathBuf, err: std::io::Error },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownBundle(_) => ErrorKind::Configuration,
            Error::Concat(concat::Error::NotFound(_)) => ErrorKind::Resolution,
            Error::Concat(concat::Error::Resolve(err)) => pathspec_kind(err),
            Error::Concat(concat::Error::Io { .. }) => ErrorKind::Io,
            Error::Style(_) => ErrorKind::Compile,
            Error::PageSet(err) => pageset_kind(err),
            Error::Resolve(err) => pathspec_kind(err),
            Error::Clean { .. } | Error::Io { .. } => ErrorKind::Io,
        }
    }
}

fn pathspec_kind(err: &pathspec::Error) -> ErrorKind {
    match err {
        pathspec::Error::Pattern { .. } => ErrorKind::Configuration,
        pathspec::Error::NotFound(_) => ErrorKind::Resolution,
        pathspec::Error::Walk(_) | pathspec::Error::Io { .. } => ErrorKind::Io,
    }
}

fn page_kind(err: &page::Error) -> ErrorKind {
    match err.root() {
        page::Error::UnsupportedFormat(_) | page::Error::InvalidFileName(_) => {
            ErrorKind::Configuration
        }
        page::Error::Io(_) => ErrorKind::Io,
        _ => ErrorKind::Render,
    }
}

fn pageset_kind(err: &pageset::Error) -> ErrorKind {
    match err {
        pageset::Error::Nav(nav::Error::Resolve(err)) => pathspec_kind(err),
        pageset::Error::Nav(nav::Error::InvalidOrder(_)) => ErrorKind::Configuration,
        pageset::Error::Resolve(err) => pathspec_kind(err),
        pageset::Error::Page(err) => page_kind(err),
        pageset::Error::Template(template::Error::Load(err)) => pathspec_kind(err),
        pageset::Error::Template(_) => ErrorKind::Render,
        pageset::Error::Io(_) => ErrorKind::Io,
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnknownBundle(dest) => write!(f, "no bundle `{}`", dest.display()),
            Error::Concat(err) => err.fmt(f),
            Error::Style(err) => err.fmt(f),
            Error::PageSet(err) => err.fmt(f),
            Error::Resolve(err) => err.fmt(f),
            Error::Clean { path, err } => {
                write!(f, "Cleaning '{}': {}", path.display(), err)
            }
            Error::Io { path, err } => write!(f, "'{}': {}", path.display(), err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::UnknownBundle(_) => None,
            Error::Concat(err) => Some(err),
            Error::Style(err) => Some(err),
            Error::PageSet(err) => Some(err),
            Error::Resolve(err) => Some(err),
            Error::Clean { path: _, err } => Some(err),
            Error::Io { path: _, err } => Some(err),
        }
    }
}

impl From<concat::Error> for Error {
    fn from(err: concat::Error) -> Error {
        Error::Concat(err)
    }
}

impl From<style::Error> for Error {
    fn from(err: style::Error) -> Error {
        Error::Style(err)
    }
}

impl From<pageset::Error> for Error {
    fn from(err: pageset::Error) -> Error {
        Error::PageSet(err)
    }
}

impl From<pathspec::Error> for Error {
    fn from(err: pathspec::Error) -> Error {
        Error::Resolve(err)
    }
}
