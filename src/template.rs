//! Renders pages through [`gtmpl`] templates.
//!
//! A [`Renderer`] is built once per page set from the set's `partials` and
//! `layouts`. Every file it loads is registered as a named template under
//! its basename, so templates and page bodies can pull each other in with
//! `{{template "header.html" .}}`. A `markdown` function is available
//! everywhere, e.g. `{{markdown .intro}}` or `{{.intro | markdown}}`.
//!
//! Pages render in one of two modes:
//!
//! 1. Inline: a page with body content has the body itself expanded as a
//!    template (and, for Markdown pages, converted to HTML afterwards). If
//!    the page's file-group names a template, that template is then
//!    rendered with the expanded body available as `.content`.
//! 2. External: a data page renders the named template against its
//!    metadata.
//!
//! A `.md` body is expanded as a template first and converted from Markdown
//! second, so HTML the template emits is Markdown input too: indenting it
//! by four or more spaces after a blank line turns it into a
//! `<pre><code>` block.
//!
//! Every named template is parsed once, when the [`Renderer`] is built.

use crate::markdown;
use crate::nav::NavEntry;
use crate::page::{PageSource, PageSourceKind};
use crate::pathspec::{self, Loader};
use crate::value;
use gtmpl::{Context, Template, Value};
use gtmpl_value::FuncError;
use serde_yaml::Mapping;
use std::collections::HashMap;
use std::fmt;

/// Renders pages against a fixed set of named templates.
pub struct Renderer {
    /// Every loaded source wrapped in a `{{define}}` block.
    library: String,

    /// One parsed template per loaded name, each invoking that name.
    templates: HashMap<String, Template>,
    production: bool,
    site_globals: Value,
}

impl Renderer {
    /// Loads every file from `loader` as a named template. When two files
    /// share a basename the first one wins.
    pub fn new(loader: &Loader, production: bool, site_globals: &Mapping) -> Result<Renderer> {
        let mut library = String::new();
        let mut names = Vec::new();
        for source in loader.sources()? {
            if !names.contains(&source.name) {
                library.push_str(&format!(
                    "{{{{define \"{}\"}}}}{}{{{{end}}}}",
                    source.name, source.contents
                ));
                names.push(source.name);
            }
        }
        let mut templates = HashMap::with_capacity(names.len());
        for name in names {
            let template = parse(format!("{}{{{{template \"{}\" .}}}}", library, name))?;
            templates.insert(name, template);
        }
        Ok(Renderer {
            library,
            templates,
            production,
            site_globals: Value::Object(value::object(site_globals)),
        })
    }

    /// Whether a template named `name` was loaded.
    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Renders a page. `nav` is the page set's navigation list, when
    /// navigation is enabled; `default_template` is used for data pages
    /// whose file-group names no template.
    pub fn render_page(
        &self,
        page: &PageSource,
        nav: Option<&[NavEntry]>,
        default_template: Option<&str>,
    ) -> Result<String> {
        let mut context = self.context(page, nav);
        match &page.content {
            Some(body) => {
                let mut inline = self.render_str(body, &context)?;
                if page.kind == PageSourceKind::Markdown {
                    inline = markdown::to_html(&inline);
                }
                match &page.template {
                    None => Ok(inline),
                    Some(name) => {
                        context.insert("content".to_owned(), Value::String(inline));
                        self.render_named(name, &context)
                    }
                }
            }
            None => {
                let name = page
                    .template
                    .clone()
                    .or_else(|| default_template.map(str::to_owned))
                    .unwrap_or_else(|| format!("{}.html", page.id));
                self.render_named(&name, &context)
            }
        }
    }

    /// Builds the data a page is rendered against: its metadata plus `id`,
    /// `production`, `site_globals` (only if the page asks for it), and
    /// `nav_pages` (only if navigation is enabled).
    pub fn context(&self, page: &PageSource, nav: Option<&[NavEntry]>) -> HashMap<String, Value> {
        let mut context = value::object(&page.metadata);
        context.insert("id".to_owned(), Value::String(page.id.clone()));
        context.insert("production".to_owned(), Value::Bool(self.production));
        if page.get("site_globals").is_some() {
            context.insert("site_globals".to_owned(), self.site_globals.clone());
        }
        if let Some(nav) = nav {
            context.insert(
                "nav_pages".to_owned(),
                Value::Array(nav.iter().map(Value::from).collect()),
            );
        }
        context
    }

    /// Expands `text` as a template against `context`. The named templates
    /// are only parsed alongside `text` when it can refer to them.
    pub fn render_str(&self, text: &str, context: &HashMap<String, Value>) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(text.to_owned());
        }
        let template = if text.contains("template") {
            parse(format!("{}{}", self.library, text))?
        } else {
            parse(text.to_owned())?
        };
        execute(&template, context)
    }

    /// Renders the template named `name` against `context`.
    pub fn render_named(&self, name: &str, context: &HashMap<String, Value>) -> Result<String> {
        match self.templates.get(name) {
            Some(template) => execute(template, context),
            None => Err(Error::NotFound(name.to_owned())),
        }
    }
}

fn parse(text: String) -> Result<Template> {
    let mut template = Template::default();
    template.add_func("markdown", markdown_func);
    template.parse(text).map_err(|e| Error::Parse(e.to_string()))?;
    Ok(template)
}

fn execute(template: &Template, context: &HashMap<String, Value>) -> Result<String> {
    let mut output: Vec<u8> = Vec::new();
    template
        .execute(&mut output, &Context::from(Value::Object(context.clone())))
        .map_err(|e| Error::Render(e.to_string()))?;
    String::from_utf8(output).map_err(|e| Error::Render(e.to_string()))
}

/// The `markdown` template function. Missing values render as nothing and
/// numbers and booleans render as their text.
fn markdown_func(args: &[Value]) -> std::result::Result<Value, FuncError> {
    match args {
        [Value::String(text)] => Ok(Value::String(markdown::to_html(text))),
        [Value::NoValue] | [Value::Nil] => Ok(Value::String(String::new())),
        [scalar @ Value::Number(_)] | [scalar @ Value::Bool(_)] => {
            Ok(Value::String(markdown::to_html(&scalar.to_string())))
        }
        [_] => Err(FuncError::Generic(
            "markdown takes a string, number or boolean".to_owned(),
        )),
        _ => Err(FuncError::Generic(format!(
            "markdown takes exactly one argument, got {}",
            args.len()
        ))),
    }
}

/// The result of a rendering operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error rendering a page.
#[derive(Debug)]
pub enum Error {
    /// Returned when loading template sources fails.
    Load(pathspec::Error),

    /// Returned when a named template was never loaded.
    NotFound(String),

    /// Returned when a template doesn't parse.
    Parse(String),

    /// Returned when executing a template fails.
    Render(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Load(err) => err.fmt(f),
            Error::NotFound(name) => write!(f, "template not found: `{}`", name),
            Error::Parse(err) => write!(f, "parsing template: {}", err),
            Error::Render(err) => write!(f, "rendering template: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Load(err) => Some(err),
            _ => None,
        }
    }
}

impl From<pathspec::Error> for Error {
    fn from(err: pathspec::Error) -> Error {
        Error::Load(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pathspec::PathSpec;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn renderer(files: &[(&str, &str)], site_globals: &str) -> (TempDir, Renderer) {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        let loader = Loader::new(vec![&PathSpec::from("*.html").rebase(dir.path())]).unwrap();
        let globals: Mapping = serde_yaml::from_str(site_globals).unwrap();
        let renderer = Renderer::new(&loader, false, &globals).unwrap();
        (dir, renderer)
    }

    fn page(dir: &Path, name: &str, contents: &str, template: Option<&str>) -> PageSource {
        let src = dir.join(name);
        fs::write(&src, contents).unwrap();
        PageSource::load(&src, Path::new(""), template, false).unwrap()
    }

    #[test]
    fn test_markdown_page_round_trip() -> Result<()> {
        let (dir, renderer) = renderer(&[], "{}");
        let page = page(dir.path(), "a.md", "---\ntitle: X\norder: 2\n---\n**hi**\n", None);
        assert_eq!(Some("X"), page.get_str("title"));
        let html = renderer.render_page(&page, None, None)?;
        assert!(html.contains("<strong>hi</strong>"));
        Ok(())
    }

    #[test]
    fn test_inline_body_sees_metadata_and_id() -> Result<()> {
        let (dir, renderer) = renderer(&[], "{}");
        let page = page(
            dir.path(),
            "home.html",
            "---\ntitle: Home\n---\n<h1>{{.title}}</h1><p>{{.id}} {{.production}}</p>",
            None,
        );
        assert_eq!(
            "<h1>Home</h1><p>home false</p>",
            renderer.render_page(&page, None, None)?
        );
        Ok(())
    }

    #[test]
    fn test_data_page_uses_group_template() -> Result<()> {
        let (dir, renderer) = renderer(
            &[("pricing.html", "<title>{{.title}}</title>{{range .tiers}}[{{.}}]{{end}}")],
            "{}",
        );
        let page = page(dir.path(), "plans.yaml", "title: Plans\ntiers: [a, b]\n", Some("pricing.html"));
        assert_eq!(
            "<title>Plans</title>[a][b]",
            renderer.render_page(&page, None, None)?
        );
        Ok(())
    }

    #[test]
    fn test_data_page_falls_back_to_basename_template() -> Result<()> {
        let (dir, renderer) = renderer(&[("faq.html", "faq:{{.q}}")], "{}");
        let page = page(dir.path(), "faq.yaml", "q: why\n", None);
        assert_eq!("faq:why", renderer.render_page(&page, None, None)?);
        Ok(())
    }

    #[test]
    fn test_layout_wraps_inline_content_and_partials() -> Result<()> {
        let (dir, renderer) = renderer(
            &[
                ("layout.html", "{{template \"nav.html\" .}}<main>{{.content}}</main>"),
                ("nav.html", "<nav>{{range .nav_pages}}<a href=\"{{.dest}}\">{{.title}}</a>{{end}}</nav>"),
            ],
            "{}",
        );
        let page = page(dir.path(), "a.md", "---\ntitle: A\n---\n*a*", Some("layout.html"));
        let nav = vec![NavEntry {
            title: "A".into(),
            subtitle: None,
            dest: "a.html".into(),
            order: serde_yaml::Number::from(1),
        }];
        let html = renderer.render_page(&page, Some(&nav), None)?;
        assert!(html.starts_with("<nav><a href=\"a.html\">A</a></nav><main><p><em>a</em></p>"));
        Ok(())
    }

    #[test]
    fn test_site_globals_only_when_requested() -> Result<()> {
        let (dir, renderer) = renderer(&[], "phone: 555-0100");
        let asks = page(dir.path(), "a.html", "---\nsite_globals: true\n---\n{{.site_globals.phone}}", None);
        let plain = page(dir.path(), "b.html", "body", None);
        assert_eq!("555-0100", renderer.render_page(&asks, None, None)?);
        assert!(!renderer.context(&plain, None).contains_key("site_globals"));
        Ok(())
    }

    #[test]
    fn test_markdown_function() -> Result<()> {
        let (dir, renderer) = renderer(&[], "{}");
        let page = page(dir.path(), "a.html", "---\nintro: \"# Hi\"\n---\n{{markdown .intro}}", None);
        assert_eq!("<h1>Hi</h1>\n", renderer.render_page(&page, None, None)?);
        Ok(())
    }

    #[test]
    fn test_missing_template() {
        let (dir, renderer) = renderer(&[], "{}");
        let page = page(dir.path(), "a.yaml", "a: 1\n", Some("nope.html"));
        match renderer.render_page(&page, None, None) {
            Err(Error::NotFound(name)) => assert_eq!("nope.html", name),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_markdown_function_scalars() -> Result<()> {
        let (dir, renderer) = renderer(&[], "{}");
        let page = page(dir.path(), "a.html", "---\norder: 2\n---\n{{markdown .order}}", None);
        assert_eq!("<p>2</p>\n", renderer.render_page(&page, None, None)?);
        Ok(())
    }

    #[test]
    fn test_markdown_function_args() {
        let rendered = |arg: Value| match markdown_func(&[arg]) {
            Ok(Value::String(text)) => text,
            other => panic!("expected a string, got {:?}", other),
        };
        assert_eq!("", rendered(Value::Nil));
        assert_eq!("", rendered(Value::NoValue));
        assert_eq!("<p>true</p>\n", rendered(Value::Bool(true)));
        assert!(markdown_func(&[Value::Array(vec![])]).is_err());
        assert!(markdown_func(&[]).is_err());
    }

    #[test]
    fn test_named_template_renders_repeatedly() -> Result<()> {
        let (dir, renderer) = renderer(&[("t.html", "<b>{{.title}}</b>")], "{}");
        for title in &["One", "Two"] {
            let source = format!("title: {}\n", title);
            let page = page(dir.path(), "a.yaml", &source, Some("t.html"));
            assert_eq!(
                format!("<b>{}</b>", title),
                renderer.render_page(&page, None, None)?
            );
        }
        Ok(())
    }

    #[test]
    fn test_malformed_layout_fails_at_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.html"), "{{if .x}}unclosed").unwrap();
        let loader = Loader::new(vec![&PathSpec::from("*.html").rebase(dir.path())]).unwrap();
        match Renderer::new(&loader, false, &Mapping::new()) {
            Err(Error::Parse(_)) => {}
            Err(other) => panic!("expected Parse, got {:?}", other),
            Ok(_) => panic!("expected Parse, got a renderer"),
        }
    }
}
