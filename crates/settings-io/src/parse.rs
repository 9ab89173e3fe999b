use std::fmt;
use std::path::Path;

use serde_json::Value;
use settings_model::{value_type_name, Document, DocumentError};
use thiserror::Error;

/// Interchange formats understood by the candidate parser.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum DeclaredFormat {
    #[default]
    Json,
    Yaml,
}

impl DeclaredFormat {
    /// Infer the format from a file extension (`json`, `yaml`, `yml`).
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.to_ascii_lowercase().parse().ok())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeclaredFormat::Json => "json",
            DeclaredFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for DeclaredFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeclaredFormat {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "json" => Ok(DeclaredFormat::Json),
            "yaml" | "yml" => Ok(DeclaredFormat::Yaml),
            _ => Err(()),
        }
    }
}

/// Errors raised while decoding or encoding interchange documents.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Shape(#[from] DocumentError),
}

/// Parsed but untrusted document. Nothing about its shape is guaranteed.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDocument {
    value: Value,
}

impl RawDocument {
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Top-level type name, for diagnostics.
    pub fn root_type(&self) -> &'static str {
        value_type_name(&self.value)
    }

    /// Accept the document when its root is a mapping.
    pub fn into_document(self) -> Result<Document, ParseError> {
        Ok(Document::from_value(self.value)?)
    }
}

pub fn parse_candidate(bytes: &[u8], format: DeclaredFormat) -> Result<RawDocument, ParseError> {
    let value = match format {
        DeclaredFormat::Json => serde_json::from_slice(bytes)?,
        DeclaredFormat::Yaml => serde_yaml::from_slice(bytes)?,
    };
    Ok(RawDocument { value })
}

/// Serialise `document` verbatim, passthrough categories and fields included.
pub fn export_document(document: &Document, format: DeclaredFormat) -> Result<String, ParseError> {
    match format {
        DeclaredFormat::Json => {
            let mut rendered = serde_json::to_string_pretty(document)?;
            rendered.push('\n');
            Ok(rendered)
        }
        DeclaredFormat::Yaml => Ok(serde_yaml::to_string(document)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn infers_format_from_extension() {
        assert_eq!(
            DeclaredFormat::from_path(Path::new("backup.JSON")),
            Some(DeclaredFormat::Json)
        );
        assert_eq!(
            DeclaredFormat::from_path(Path::new("team.yml")),
            Some(DeclaredFormat::Yaml)
        );
        assert_eq!(DeclaredFormat::from_path(Path::new("settings.toml")), None);
        assert_eq!(DeclaredFormat::from_path(Path::new("settings")), None);
    }

    #[test]
    fn yaml_and_json_parse_to_the_same_document() {
        let yaml = b"editor:\n  tabSize: 2\n  theme: dark\nai:\n  backends:\n    - id: local\n      model: llama3\n";
        let json = br#"{"editor":{"tabSize":2,"theme":"dark"},"ai":{"backends":[{"id":"local","model":"llama3"}]}}"#;

        let from_yaml = parse_candidate(yaml, DeclaredFormat::Yaml).unwrap();
        let from_json = parse_candidate(json, DeclaredFormat::Json).unwrap();
        assert_eq!(from_yaml, from_json);
        assert_eq!(
            from_yaml.into_document().unwrap().lookup("ai.backends[0].model"),
            Some(&json!("llama3"))
        );
    }

    #[test]
    fn non_mapping_roots_are_rejected() {
        let raw = parse_candidate(b"[1, 2, 3]", DeclaredFormat::Json).unwrap();
        assert_eq!(raw.root_type(), "array");
        assert!(matches!(
            raw.into_document(),
            Err(ParseError::Shape(DocumentError::NotAnObject { found: "array" }))
        ));

        let empty = parse_candidate(b"", DeclaredFormat::Yaml).and_then(RawDocument::into_document);
        assert!(empty.is_err());
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        assert!(matches!(
            parse_candidate(b"{ not json", DeclaredFormat::Json),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(
            parse_candidate(b"a: [unclosed", DeclaredFormat::Yaml),
            Err(ParseError::Yaml(_))
        ));
    }

    #[test]
    fn export_keeps_passthrough_content_in_order() {
        let document = Document::from_value(json!({
            "plugins": { "x": [1, 2] },
            "editor": { "tabSize": 4, "legacy": "keep" }
        }))
        .unwrap();

        let json_text = export_document(&document, DeclaredFormat::Json).unwrap();
        let reparsed = parse_candidate(json_text.as_bytes(), DeclaredFormat::Json)
            .unwrap()
            .into_document()
            .unwrap();
        assert_eq!(reparsed, document);
        assert!(json_text.find("plugins").unwrap() < json_text.find("editor").unwrap());

        let yaml_text = export_document(&document, DeclaredFormat::Yaml).unwrap();
        assert!(yaml_text.contains("legacy: keep"));
    }
}
