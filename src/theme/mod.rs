//! Template engine
//!
//! HTML rendering with Tera. The portal's templates are compiled into the
//! binary; a template directory may override any of them (or add new ones)
//! by placing a file with the same relative name there.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;

use tera::{Context as TeraContext, Tera};

mod error;

pub use error::ThemeError;

/// Built-in templates as `(name, source)` pairs
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    ("error.html", include_str!("../../templates/error.html")),
    ("posts/items.html", include_str!("../../templates/posts/items.html")),
    ("posts/pagination.html", include_str!("../../templates/posts/pagination.html")),
    ("posts/list.html", include_str!("../../templates/posts/list.html")),
    ("posts/search.html", include_str!("../../templates/posts/search.html")),
    ("posts/detail.html", include_str!("../../templates/posts/detail.html")),
    ("posts/add.html", include_str!("../../templates/posts/add.html")),
    ("posts/edit.html", include_str!("../../templates/posts/edit.html")),
    ("posts/delete.html", include_str!("../../templates/posts/delete.html")),
    ("accounts/login.html", include_str!("../../templates/accounts/login.html")),
    ("accounts/signup.html", include_str!("../../templates/accounts/signup.html")),
];

/// Template engine for rendering pages
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Create an engine with only the built-in templates
    pub fn builtin() -> Result<Self, ThemeError> {
        Self::from_sources(builtin_sources())
    }

    /// Create an engine from the built-in templates, overridden by every
    /// `.html` file found under `overrides`.
    ///
    /// A missing override directory is not an error.
    pub fn new(overrides: &Path) -> Result<Self, ThemeError> {
        let mut sources = builtin_sources();

        let mut found = Vec::new();
        collect_templates_from_dir(overrides, overrides, &mut found)?;
        for (name, content) in found {
            tracing::debug!(template = %name, "Using template override");
            sources.insert(name, content);
        }

        Self::from_sources(sources)
    }

    fn from_sources(sources: BTreeMap<String, String>) -> Result<Self, ThemeError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html"]);
        // add_raw_templates resolves inheritance once every template is known
        tera.add_raw_templates(sources).map_err(|e| {
            ThemeError::TemplateError(format!("Failed to load templates: {}", error_chain(&e)))
        })?;
        Ok(Self { tera })
    }

    /// Check whether a template is loaded
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render a template
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String, ThemeError> {
        if !self.has_template(template) {
            return Err(ThemeError::NotFound(template.to_string()));
        }
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(format!(
                "Failed to render '{}': {}",
                template,
                error_chain(&e)
            ))
        })
    }
}

fn builtin_sources() -> BTreeMap<String, String> {
    BUILTIN_TEMPLATES
        .iter()
        .map(|(name, source)| (name.to_string(), source.to_string()))
        .collect()
}

/// Tera nests the useful message inside its error sources
fn error_chain(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

/// Collect `.html` files below `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<(), ThemeError> {
    if !current_path.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(current_path)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path.strip_prefix(base_path).map_err(|_| {
                ThemeError::TemplateError("Failed to get relative path".to_string())
            })?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)?;
            templates.push((template_name, content));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
