//! The library code for the `sitesmith` static site build pipeline. A build
//! is driven entirely by a declarative [`config::Config`] and runs as a fixed
//! sequence of phases ([`build::build_site`]):
//!
//! 1. Cleaning the destination tree
//! 2. Bundling scripts ([`concat`])
//! 3. Compiling stylesheets ([`style`])
//! 4. Rendering page sets ([`pageset`])
//! 5. Placing image and audio assets, and copying loose files
//! 6. Best-effort local conveniences
//!
//! Of these, rendering page sets is the most involved. Each page source is
//! loaded into a [`page::PageSource`] (front-matter metadata plus an
//! optional body), optionally joined with a navigation list built from the
//! metadata of every page in the set ([`nav`]), and rendered through the
//! set's partials and layouts ([`template`]).
//!
//! [`watch`] reuses the same per-unit builders to rebuild only what a file
//! change affects, and [`deploy`] describes the finished tree to the upload
//! tooling.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

#[macro_use]
pub mod log;

pub mod build;
pub mod concat;
pub mod config;
pub mod deploy;
pub mod markdown;
pub mod nav;
pub mod page;
pub mod pageset;
pub mod pathspec;
pub mod style;
pub mod template;
pub mod value;
pub mod watch;
