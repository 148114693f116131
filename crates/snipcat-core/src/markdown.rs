//! Markdown documents with optional YAML front matter.

use crate::error::{CatalogError, Result};
use serde_yaml::{Mapping, Value};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkdownDoc {
    pub front_matter: Mapping,
    pub body: String,
}

impl MarkdownDoc {
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw).map_err(|reason| CatalogError::InvalidSnippet {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Split `raw` into front matter and body.
    ///
    /// Front matter must open on the first line with `---` and close with a
    /// line holding `---` or `...`. Without an opening delimiter the whole
    /// text is body. An unterminated block is an error.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let Some(rest) = strip_delimiter_line(raw) else {
            return Ok(Self {
                front_matter: Mapping::new(),
                body: raw.to_string(),
            });
        };

        let mut offset = 0;
        for line in rest.split_inclusive('\n') {
            let trimmed = line.trim_end();
            if trimmed == "---" || trimmed == "..." {
                let yaml = &rest[..offset];
                let body = &rest[offset + line.len()..];
                return Ok(Self {
                    front_matter: parse_mapping(yaml)?,
                    body: body.to_string(),
                });
            }
            offset += line.len();
        }
        Err("front matter is not terminated".to_string())
    }

    /// First present key among `keys`, ignoring explicit nulls.
    pub fn field(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .filter_map(|k| self.front_matter.get(*k))
            .find(|v| !v.is_null())
    }
}

/// YAML truthiness: null, false, and empty strings or collections are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Sequence(s) => !s.is_empty(),
        Value::Mapping(m) => !m.is_empty(),
        _ => true,
    }
}

/// Render a scalar for error messages: strings as-is, everything else as
/// compact YAML.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn strip_delimiter_line(raw: &str) -> Option<&str> {
    let rest = raw.strip_prefix("---")?;
    rest.strip_prefix('\n')
        .or_else(|| rest.strip_prefix("\r\n"))
}

fn parse_mapping(yaml: &str) -> std::result::Result<Mapping, String> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(map)) => Ok(map),
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(_) => Err("front matter must be a mapping".to_string()),
        Err(e) => Err(format!("front matter is not valid YAML: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_front_matter_and_body() {
        let doc = MarkdownDoc::parse("---\nslug: greet\nscope: context\n---\nHello there.\n").unwrap();
        assert_eq!(
            doc.field(&["slug"]).and_then(Value::as_str),
            Some("greet")
        );
        assert_eq!(doc.body, "Hello there.\n");
    }

    #[test]
    fn no_front_matter_is_all_body() {
        let doc = MarkdownDoc::parse("# Title\n\nText").unwrap();
        assert!(doc.front_matter.is_empty());
        assert_eq!(doc.body, "# Title\n\nText");
    }

    #[test]
    fn crlf_and_bom_are_tolerated() {
        let doc = MarkdownDoc::parse("\u{feff}---\r\nslug: a1\r\n---\r\nbody").unwrap();
        assert_eq!(doc.field(&["slug"]).and_then(Value::as_str), Some("a1"));
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn empty_front_matter_block() {
        let doc = MarkdownDoc::parse("---\n---\nbody").unwrap();
        assert!(doc.front_matter.is_empty());
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn unterminated_front_matter_is_an_error() {
        assert!(MarkdownDoc::parse("---\nslug: a\nbody").is_err());
    }

    #[test]
    fn non_mapping_front_matter_is_an_error() {
        assert!(MarkdownDoc::parse("---\n- a\n- b\n---\nbody").is_err());
    }

    #[test]
    fn field_falls_through_aliases_and_nulls() {
        let doc = MarkdownDoc::parse("---\nscope: null\nrole: batch\n---\nx").unwrap();
        assert_eq!(
            doc.field(&["scope", "role"]).and_then(Value::as_str),
            Some("batch")
        );
    }
}
