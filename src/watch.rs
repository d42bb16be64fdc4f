//! Incremental rebuilds on file changes.
//!
//! A [`notify`] watcher is registered on every source root (script and
//! style search roots, bundle inputs, page sources, partials, layouts). Its
//! callback only forwards changed paths into a bounded channel; a single
//! consumer drains the channel, maps each path to at most one [`Unit`] with
//! the [`Dispatcher`], and rebuilds the units one at a time. Rebuilds never
//! overlap. A failed rebuild is logged and the loop keeps going until
//! Ctrl-C.

use crate::build::{self, build_script, build_style, Report};
use crate::config::{BundleSection, Config, PageSet};
use crate::log::{self, timed};
use crate::pageset::PageSetBuilder;
use crate::pathspec::{self, Matcher, PathSpec};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver};

const QUEUE_DEPTH: usize = 256;

/// The smallest piece of the site a change can trigger a rebuild of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Unit {
    /// A script bundle, by destination.
    Script(PathBuf),

    /// A stylesheet bundle, by destination.
    Style(PathBuf),

    /// One page source of one file-group.
    Page {
        pageset: usize,
        group: usize,
        src: PathBuf,
    },

    /// Every page of a page set, after one of its templates changed.
    PageSet(usize),
}

/// Maps changed paths to the [`Unit`] they belong to.
pub struct Dispatcher {
    dist: PathBuf,
    scripts: Vec<(PathBuf, Matcher)>,
    styles: Vec<(PathBuf, Matcher)>,
    pages: Vec<Vec<Matcher>>,
    templates: Vec<Matcher>,
}

impl Dispatcher {
    pub fn new(config: &Config) -> pathspec::Result<Dispatcher> {
        let mut pages = Vec::new();
        let mut templates = Vec::new();
        for pageset in config.html.iter().flatten() {
            let groups = pageset
                .files
                .iter()
                .map(|group| group.src.matcher())
                .collect::<pathspec::Result<Vec<_>>>()?;
            pages.push(groups);
            templates.push(template_spec(pageset).matcher()?);
        }
        Ok(Dispatcher {
            dist: config.options.dist.clone(),
            scripts: bundle_matchers(config, config.js.as_ref())?,
            styles: bundle_matchers(config, config.scss.as_ref())?,
            pages,
            templates,
        })
    }

    /// Scripts are checked first, then styles, page sources, and templates.
    /// The first match wins, so a path triggers at most one unit.
    pub fn dispatch(&self, path: &Path) -> Option<Unit> {
        if path.starts_with(&self.dist) {
            return None;
        }
        if let Some((dest, _)) = self.scripts.iter().find(|(_, m)| m.is_match(path)) {
            return Some(Unit::Script(dest.clone()));
        }
        if let Some((dest, _)) = self.styles.iter().find(|(_, m)| m.is_match(path)) {
            return Some(Unit::Style(dest.clone()));
        }
        for (pageset, groups) in self.pages.iter().enumerate() {
            if let Some(group) = groups.iter().position(|m| m.is_match(path)) {
                return Some(Unit::Page {
                    pageset,
                    group,
                    src: path.to_owned(),
                });
            }
        }
        self.templates
            .iter()
            .position(|m| m.is_match(path))
            .map(Unit::PageSet)
    }

    /// Dispatches every path, dropping unmatched paths and repeated units.
    pub fn units<'p>(&self, paths: impl IntoIterator<Item = &'p PathBuf>) -> Vec<Unit> {
        let mut units = Vec::new();
        for unit in paths.into_iter().filter_map(|path| self.dispatch(path)) {
            if !units.contains(&unit) {
                units.push(unit);
            }
        }
        units
    }
}

// A bundle input matches both as written under the configuration root and
// under each search root.
fn bundle_matchers(
    config: &Config,
    section: Option<&BundleSection>,
) -> pathspec::Result<Vec<(PathBuf, Matcher)>> {
    let section = match section {
        Some(section) => section,
        None => return Ok(Vec::new()),
    };
    section
        .paths
        .iter()
        .map(|(dest, spec)| {
            let matcher = bundle_spec(config, section, spec).matcher()?;
            Ok((dest.clone(), matcher))
        })
        .collect()
}

fn bundle_spec(config: &Config, section: &BundleSection, spec: &PathSpec) -> PathSpec {
    let mut patterns = Vec::new();
    for entry in spec.entries() {
        patterns.push(pathspec::rebase(&config.root, entry));
        for search in &section.search {
            patterns.push(pathspec::rebase(search, entry));
        }
    }
    PathSpec::new(patterns)
}

fn template_spec(pageset: &PageSet) -> PathSpec {
    PathSpec::new(
        pageset
            .template_specs()
            .flat_map(|spec| spec.entries().iter().cloned()),
    )
}

/// The directories to watch: every existing source root, minus those
/// nested inside another root. Bundle inputs only contribute a root when
/// they resolve directly; otherwise the search roots cover them.
pub fn roots(config: &Config) -> Vec<PathBuf> {
    let mut roots = BTreeSet::new();
    for section in config.js.iter().chain(config.scss.iter()) {
        roots.extend(section.search.iter().cloned());
        for spec in section.paths.values() {
            for entry in spec.entries() {
                let pattern = pathspec::rebase(&config.root, entry);
                if !pathspec::expand(&pattern).unwrap_or_default().is_empty() {
                    roots.extend(PathSpec::from(pattern.as_str()).roots());
                }
            }
        }
    }
    for pageset in config.html.iter().flatten() {
        for group in &pageset.files {
            roots.extend(group.src.roots());
        }
        roots.extend(template_spec(pageset).roots());
    }
    let roots: Vec<PathBuf> = roots.into_iter().filter(|root| root.is_dir()).collect();
    roots
        .iter()
        .filter(|root| {
            !roots
                .iter()
                .any(|other| other != *root && root.starts_with(other))
        })
        .cloned()
        .collect()
}

/// Rebuilds a single unit.
pub fn rebuild(config: &Config, unit: &Unit) -> build::Result<()> {
    match unit {
        Unit::Script(dest) => build_script(config, dest).map(drop),
        Unit::Style(dest) => build_style(config, dest).map(drop),
        Unit::Page {
            pageset,
            group,
            src,
        } => match pageset_at(config, *pageset) {
            Some(pageset_config) => {
                let builder = PageSetBuilder::new(&config.options, pageset_config)?;
                builder.build_page(&pageset_config.files[*group], src)?;
                Ok(())
            }
            None => Ok(()),
        },
        Unit::PageSet(i) => match pageset_at(config, *i) {
            Some(pageset_config) => {
                let builder = PageSetBuilder::new(&config.options, pageset_config)?;
                let mut report = Report::default();
                builder.build(false, |src, result| {
                    report.record(src.display().to_string(), result.map_err(build::Error::from));
                })?;
                Ok(())
            }
            None => Ok(()),
        },
    }
}

fn pageset_at(config: &Config, i: usize) -> Option<&PageSet> {
    config.html.as_ref().and_then(|pagesets| pagesets.get(i))
}

enum Message {
    Changed(PathBuf),
    Stop,
}

/// Watches the source roots and rebuilds whatever changes until Ctrl-C.
pub fn watch(config: &Config) -> Result<()> {
    let dispatcher = Dispatcher::new(config).context("Compiling watch patterns")?;
    let (tx, rx) = sync_channel(QUEUE_DEPTH);

    let events = tx.clone();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        match result {
            Ok(event) if is_relevant(&event) => {
                for path in event.paths {
                    // The receiver only goes away once the loop has stopped.
                    let _ = events.send(Message::Changed(path));
                }
            }
            Ok(_) => {}
            Err(err) => log!("watch"; "error: {}", err),
        }
    })
    .context("Failed to create file watcher")?;

    for root in roots(config) {
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;
        log!("watch"; "watching {}", root.display());
    }

    ctrlc::set_handler(move || {
        let _ = tx.send(Message::Stop);
    })
    .context("Failed to set Ctrl+C handler")?;

    run(config, &dispatcher, &rx);
    drop(watcher);
    log!("watch"; "stopped");
    Ok(())
}

fn is_relevant(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn run(config: &Config, dispatcher: &Dispatcher, rx: &Receiver<Message>) {
    while let Ok(first) = rx.recv() {
        let (changed, stop) = drain(first, rx);
        for unit in dispatcher.units(&changed) {
            let (result, elapsed) = timed(|| rebuild(config, &unit));
            match result {
                Ok(()) => log!("watch"; "rebuilt {:?} in {}", unit, log::seconds(elapsed)),
                Err(err) => log!("error"; "{:?}: {}", unit, err),
            }
        }
        // Changes queued ahead of the stop are still rebuilt.
        if stop {
            break;
        }
    }
}

// Collects `first` and everything already queued behind it. Returns the
// distinct changed paths and whether a stop was requested.
fn drain(first: Message, rx: &Receiver<Message>) -> (BTreeSet<PathBuf>, bool) {
    let mut changed = BTreeSet::new();
    let mut stop = false;
    let mut next = Some(first);
    while let Some(message) = next {
        match message {
            Message::Changed(path) => {
                changed.insert(path);
            }
            Message::Stop => stop = true,
        }
        next = rx.try_recv().ok();
    }
    (changed, stop)
}
