//! Shared test harness utilities for the settings engine crates.

use serde_json::json;
use settings_config::Config;
use settings_model::Document;

/// Representative catalog covering every field kind and rule kind.
pub const SAMPLE_CATALOG: &str = r##"
[[categories]]
name = "editor"

[[categories.fields]]
name = "tabSize"
kind = "number"
min = 1
max = 8
default = 4
required = true

[[categories.fields]]
name = "wordWrap"
kind = "boolean"
default = true

[[categories.fields]]
name = "fontFamily"
kind = "string"
default = "Fira Code"

[[categories.fields]]
name = "theme"
kind = "enum"
values = ["light", "dark", "system"]
default = "system"

[[categories]]
name = "git"

[[categories.fields]]
name = "signCommits"
kind = "boolean"
default = false

[[categories.fields]]
name = "gpgKey"
kind = "string"
pattern = "^[0-9A-Fa-f]{8,40}$"
pattern_message = "must be a hex key id"

[categories.fields.dependency]
path = "git.signCommits"
equals = true
severity = "warning"

[[categories.fields]]
name = "userEmail"
kind = "string"
format = "email"

[[categories]]
name = "ai"

[[categories.fields]]
name = "backends"
kind = "array"
key = "id"

[[categories.fields]]
name = "defaultBackend"
kind = "string"

[[categories.fields]]
name = "endpoint"
kind = "string"
format = "url"

[[categories.rules]]
kind = "non-empty"
field = "backends"
item_field = "model"

[[categories.rules]]
kind = "unique"
field = "backends"
item_field = "id"

[[categories.rules]]
kind = "reference"
field = "backends"
item_field = "id"
target = "defaultBackend"

[[categories.rules]]
kind = "at-most-one"
field = "backends"
item_field = "isDefault"

[[categories]]
name = "appearance"

[[categories.fields]]
name = "accentColor"
kind = "string"
format = "hex-color"
default = "#1e90ff"

[[categories.fields]]
name = "density"
kind = "enum"
values = ["compact", "comfortable"]
default = "comfortable"
"##;

/// Returns a baseline configuration with no catalog.
pub fn test_config() -> Config {
    Config::default()
}

/// Returns a configuration carrying [`SAMPLE_CATALOG`].
pub fn sample_config() -> Config {
    Config::from_toml_str(SAMPLE_CATALOG).expect("sample catalog is valid")
}

/// Valid live document for [`SAMPLE_CATALOG`], including a passthrough
/// `plugins` category the catalog does not declare.
pub fn sample_document() -> Document {
    Document::from_value(json!({
        "editor": {
            "tabSize": 4,
            "wordWrap": true,
            "fontFamily": "Fira Code",
            "theme": "dark"
        },
        "git": {
            "signCommits": false,
            "gpgKey": null,
            "userEmail": "dev@example.org"
        },
        "ai": {
            "backends": [
                { "id": "local", "model": "llama3", "isDefault": true },
                { "id": "cloud", "model": "gpt-4o" }
            ],
            "defaultBackend": "local",
            "endpoint": "http://localhost:11434"
        },
        "appearance": {
            "accentColor": "#1e90ff",
            "density": "comfortable"
        },
        "plugins": {
            "experimental": true
        }
    }))
    .expect("sample document is an object")
}

/// Parse a JSON literal into a document, panicking on non-object roots.
pub fn document(value: serde_json::Value) -> Document {
    Document::from_value(value).expect("document root must be an object")
}
