//! Email template system
//!
//! Provides variable substitution for notification templates loaded from disk.
//! Variables are written as `{{variable_name}}`; a leading dot (`{{ .variable_name }}`)
//! is accepted as well.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Template load or execution failure
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("failed to read template: {0}")]
    Io(#[from] std::io::Error),

    #[error("unterminated tag at byte {0}")]
    Unterminated(usize),

    #[error("empty tag at byte {0}")]
    EmptyTag(usize),

    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
}

/// How substituted values are written into the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// Values are HTML-escaped (rich bodies)
    Html,
    /// Values are inserted verbatim (plain bodies)
    None,
}

/// Template rendering engine with variable substitution
#[derive(Debug, Default, Clone)]
pub struct TemplateEngine {
    variables: HashMap<String, String>,
}

impl TemplateEngine {
    /// Create a new template engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Render a template string in a single pass.
    ///
    /// Substituted values are never re-scanned, so a value containing `{{` is
    /// emitted literally.
    pub fn render(&self, template: &str, escape: Escape) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            let end = after_open
                .find("}}")
                .ok_or(TemplateError::Unterminated(offset + start))?;

            let key = after_open[..end].trim();
            let key = key.strip_prefix('.').unwrap_or(key).trim();
            if key.is_empty() {
                return Err(TemplateError::EmptyTag(offset + start));
            }

            let value = self
                .variables
                .get(key)
                .ok_or_else(|| TemplateError::UnknownVariable(key.to_string()))?;
            match escape {
                Escape::Html => push_html_escaped(&mut out, value),
                Escape::None => out.push_str(value),
            }

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        out.push_str(rest);
        Ok(out)
    }

    /// Read a template file and render it. The file is read on every call.
    pub async fn load_and_render(
        &self,
        path: &Path,
        escape: Escape,
    ) -> Result<String, TemplateError> {
        let source = tokio::fs::read_to_string(path).await?;
        self.render(&source, escape)
    }
}

fn push_html_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}
