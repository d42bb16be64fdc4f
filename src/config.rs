//! The build configuration, loaded once per invocation from a YAML file and
//! passed by reference into every stage. Relative paths in the file are
//! resolved against the directory containing it; destinations (bundle
//! names, file-group `dest`, copy targets, asset `dest`) stay relative to
//! `options.dist`. Bundle inputs are kept as written, since they double as
//! names searched for under the section's `search` roots; they resolve
//! against [`Config::root`].

use crate::pathspec::PathSpec;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer};
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The file name searched for when no configuration path is given.
pub const CONFIG_FILE_NAME: &str = "site.yaml";

const DEFAULT_CACHE_CONTROL_AGE: u64 = 86400;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The directory containing the configuration file.
    #[serde(skip)]
    pub root: PathBuf,

    pub options: Options,

    #[serde(default)]
    pub js: Option<BundleSection>,

    #[serde(default)]
    pub scss: Option<BundleSection>,

    #[serde(default)]
    pub html: Option<Vec<PageSet>>,

    /// Destination directory (under dist) → files to copy into it.
    #[serde(default)]
    pub copy: Option<BTreeMap<PathBuf, PathSpec>>,

    #[serde(default)]
    pub images: Option<AssetDir>,

    #[serde(default)]
    pub audio: Option<AssetDir>,
}

/// Global settings.
#[derive(Clone, Debug, Deserialize)]
pub struct Options {
    /// The destination root.
    pub dist: PathBuf,

    #[serde(default)]
    pub production: bool,

    /// Drop the `.html` extension from page destinations.
    #[serde(default)]
    pub clean_urls: bool,

    /// Minify HTML and compress CSS. Defaults to `production`.
    #[serde(default)]
    pub minify: Option<bool>,

    /// `max-age` for the `Cache-Control` header of uploaded assets.
    #[serde(default = "default_cache_control_age")]
    pub cache_control_age: u64,

    /// The bucket the deployment tooling uploads into. Only reported.
    #[serde(default)]
    pub asset_bucket: Option<String>,

    /// Values made available to pages that set `site_globals` in their
    /// metadata.
    #[serde(default)]
    pub site_globals: Mapping,

    /// A file linked into dist for local, non-production builds.
    #[serde(default)]
    pub htaccess: Option<PathBuf>,
}

impl Options {
    pub fn minify(&self) -> bool {
        self.minify.unwrap_or(self.production)
    }
}

fn default_cache_control_age() -> u64 {
    DEFAULT_CACHE_CONTROL_AGE
}

/// The `js` and `scss` sections.
#[derive(Clone, Debug, Deserialize)]
pub struct BundleSection {
    /// Bundle destination (under dist) → inputs.
    pub paths: BTreeMap<PathBuf, PathSpec>,

    /// Directories searched for inputs that don't resolve as globs.
    #[serde(default)]
    pub search: Vec<PathBuf>,
}

/// A group of pages sharing templates and navigation.
#[derive(Clone, Debug, Deserialize)]
pub struct PageSet {
    #[serde(deserialize_with = "one_or_many")]
    pub files: Vec<FileGroup>,

    #[serde(default)]
    pub options: PageSetOptions,

    #[serde(default)]
    pub partials: Option<PathSpec>,

    #[serde(default)]
    pub layouts: Option<PathSpec>,

    /// The template for data pages whose file-group names none.
    #[serde(default)]
    pub template: Option<String>,
}

impl PageSet {
    /// The path specs the page set's templates are loaded from.
    pub fn template_specs(&self) -> impl Iterator<Item = &PathSpec> {
        self.partials.iter().chain(self.layouts.iter())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PageSetOptions {
    /// Build a navigation list and hand it to every page as `nav_pages`.
    #[serde(default)]
    pub nav: bool,
}

/// A set of page sources rendered into one destination directory.
#[derive(Clone, Debug, Deserialize)]
pub struct FileGroup {
    pub src: PathSpec,

    /// Destination directory, relative to dist.
    #[serde(default)]
    pub dest: PathBuf,

    #[serde(default)]
    pub template: Option<String>,
}

/// A local asset directory and where it lands under dist.
#[derive(Clone, Debug, Deserialize)]
pub struct AssetDir {
    pub src: PathBuf,
    pub dest: PathBuf,
}

fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(item) => vec![item],
        OneOrMany::Many(items) => items,
    })
}

impl Config {
    /// Searches `dir` and then each of its parents for [`CONFIG_FILE_NAME`]
    /// and loads the first one found.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Config::from_file(&path)
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    CONFIG_FILE_NAME
                )),
            }
        }
    }

    /// Loads a configuration file, resolving its relative paths against the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Config> {
        let path = path
            .canonicalize()
            .with_context(|| format!("Opening configuration file `{}`", path.display()))?;
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Reading configuration file `{}`", path.display()))?;
        let root = path.parent().ok_or_else(|| {
            anyhow!(
                "Can't get parent directory for configuration file '{:?}'",
                path
            )
        })?;
        Config::from_yaml(&text, root)
            .with_context(|| format!("Loading configuration `{}`", path.display()))
    }

    /// Parses a configuration document whose relative paths are relative
    /// to `root`.
    pub fn from_yaml(text: &str, root: &Path) -> Result<Config> {
        let mut config: Config = serde_yaml::from_str(text)?;
        config.root = root.to_owned();
        Ok(config.rebase(root))
    }

    fn rebase(mut self, root: &Path) -> Config {
        let join = |path: &Path| root.join(path);

        self.options.dist = join(&self.options.dist);
        self.options.htaccess = self.options.htaccess.as_deref().map(join);
        for section in self.js.iter_mut().chain(self.scss.iter_mut()) {
            section.search = section.search.iter().map(|p| join(p)).collect();
        }
        for pageset in self.html.iter_mut().flatten() {
            for group in pageset.files.iter_mut() {
                group.src = group.src.rebase(root);
            }
            for spec in pageset.partials.iter_mut().chain(pageset.layouts.iter_mut()) {
                *spec = spec.rebase(root);
            }
        }
        for spec in self.copy.iter_mut().flat_map(|copy| copy.values_mut()) {
            *spec = spec.rebase(root);
        }
        for assets in self.images.iter_mut().chain(self.audio.iter_mut()) {
            assets.src = join(&assets.src);
        }
        self
    }
}
