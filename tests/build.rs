use sitesmith::build::build_site;
use sitesmith::config::Config;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SITE: &str = r#"
options:
  dist: dist
  site_globals:
    company: Acme
js:
  paths:
    js/site.js: [a.js, b.js]
  search: [src/js]
scss:
  paths:
    css/site.css: site.scss
  search: [src/scss]
html:
  - files:
      - src: ["src/pages/*.md", "src/pages/*.html"]
        dest: ""
        template: base.html
      - src: src/pages/*.yaml
        dest: plans
        template: pricing.html
    options:
      nav: true
    partials: src/partials/*.html
    layouts: src/layouts/*.html
copy:
  fonts: src/fonts/*.woff2
"#;

const FILES: &[(&str, &str)] = &[
    ("src/js/a.js", "a();\n"),
    ("src/js/b.js", "b();\n"),
    ("src/scss/_vars.scss", "$accent: red;\n"),
    ("src/scss/site.scss", "@import \"vars\";\n.btn { color: $accent; }\n"),
    (
        "src/pages/index.md",
        "---\ntitle: Welcome\norder: 1\n---\n# Welcome\n\nThe {{.id}} page.\n",
    ),
    (
        "src/pages/about.html",
        "---\ntitle: About\norder: 2\nsite_globals: true\n---\n<p>About {{.site_globals.company}}</p>\n",
    ),
    ("src/pages/pricing.yaml", "title: Plans\norder: 3\ntiers: [Basic, Pro]\n"),
    (
        "src/layouts/base.html",
        "<html><head><title>{{.title}}</title></head><body>{{template \"nav.html\" .}}{{.content}}</body></html>\n",
    ),
    (
        "src/layouts/pricing.html",
        "<html><body>{{template \"nav.html\" .}}<h1>{{.title}}</h1><ul>{{range .tiers}}<li>{{.}}</li>{{end}}</ul></body></html>\n",
    ),
    (
        "src/partials/nav.html",
        "<nav>{{range .nav_pages}}<a href=\"/{{.dest}}\">{{.title}}</a>{{end}}</nav>",
    ),
    ("src/fonts/body.woff2", "font"),
];

fn project() -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in FILES {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    fs::write(dir.path().join("site.yaml"), SITE).unwrap();
    let config = Config::from_file(&dir.path().join("site.yaml")).unwrap();
    (dir, config)
}

fn snapshot(dist: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(dist)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(dist).unwrap().to_owned();
            (relative, fs::read(entry.path()).unwrap())
        })
        .collect()
}

#[test]
fn test_build_site_end_to_end() {
    let (_dir, config) = project();
    let report = build_site(&config, false);
    for failure in &report.failures {
        eprintln!("{}: {}", failure.unit, failure.error);
    }
    assert!(report.is_ok());
    assert_eq!(0, report.exit_code());

    let dist = &config.options.dist;
    let read = |path: &str| fs::read_to_string(dist.join(path)).unwrap();

    assert_eq!("a();\nb();\n", read("js/site.js"));
    assert!(read("css/site.css").contains("color: red"));

    let nav = "<nav><a href=\"/index.html\">Welcome</a><a href=\"/about.html\">About</a><a href=\"/plans/pricing.html\">Plans</a></nav>";
    let index = read("index.html");
    assert!(index.contains("<title>Welcome</title>"));
    assert!(index.contains(nav));
    assert!(index.contains("<h1>Welcome</h1>"));
    assert!(index.contains("The index page."));

    let about = read("about.html");
    assert!(about.contains("<p>About Acme</p>"));

    let pricing = read("plans/pricing.html");
    assert!(pricing.contains(nav));
    assert!(pricing.contains("<ul><li>Basic</li><li>Pro</li></ul>"));

    assert_eq!("font", read("fonts/body.woff2"));
}

#[test]
fn test_rebuild_is_idempotent() {
    let (_dir, config) = project();
    assert!(build_site(&config, true).is_ok());
    let first = snapshot(&config.options.dist);
    assert!(build_site(&config, true).is_ok());
    let second = snapshot(&config.options.dist);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_build_removes_stale_output() {
    let (_dir, config) = project();
    let stale = config.options.dist.join("old/stale.html");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "stale").unwrap();
    assert!(build_site(&config, true).is_ok());
    assert!(!stale.exists());
    assert!(config.options.dist.join("index.html").is_file());
}

#[test]
fn test_production_build_minifies() {
    let (_dir, mut config) = project();
    config.options.production = true;
    assert!(build_site(&config, true).is_ok());
    let css = fs::read_to_string(config.options.dist.join("css/site.css")).unwrap();
    assert_eq!(".btn{color:red}", css.trim());
}
