//! Configuration primitives and loader for the settings engine.
//!
//! The loader resolves configuration using a precedence stack:
//! override flag → working directory → git root → built-in defaults.
//! Every layer may declare catalog categories, severity policy, and import
//! defaults. Parsed settings are normalised into typed structures so
//! downstream crates never touch raw TOML.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use settings_model::{FieldPath, IssueCode, MergeMode, Severity, ValueKind};
use thiserror::Error;
use tracing::debug;

const CONFIG_FILE_NAME: &str = ".settings-engine.toml";
const DEFAULT_PREVIEW_CONTEXT: usize = 3;

/// Complete configuration resolved from defaults and on-disk overrides.
#[derive(Clone, Debug)]
pub struct Config {
    pub catalog: CatalogSettings,
    pub validation: ValidationSettings,
    pub import: ImportSettings,
    pub sources: ConfigSources,
}

/// Declared categories in declaration order.
#[derive(Clone, Debug, Default)]
pub struct CatalogSettings {
    pub categories: Vec<CategorySpec>,
}

impl CatalogSettings {
    pub fn category(&self, name: &str) -> Option<&CategorySpec> {
        self.categories
            .iter()
            .find(|category| category.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// One declared category: its fields and its document-level rules.
#[derive(Clone, Debug)]
pub struct CategorySpec {
    pub name: String,
    pub source: ConfigSource,
    pub fields: Vec<FieldSpec>,
    pub rules: Vec<RuleSpec>,
}

impl CategorySpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Declared field: kind, default, and the constraints compiled into its validator.
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub kind: ValueKind,
    pub default: Value,
    pub required: bool,
    pub pattern: Option<FieldPattern>,
    pub format: Option<FormatSpec>,
    pub dependency: Option<DependencySpec>,
    pub source: ConfigSource,
}

impl FieldSpec {
    /// Numeric bounds declared through `min`/`max`.
    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        match &self.kind {
            ValueKind::BoundedNumber { min, max } => (*min, *max),
            _ => (None, None),
        }
    }

    pub fn allowed_values(&self) -> Option<&[Value]> {
        match &self.kind {
            ValueKind::Enum { values } => Some(values),
            _ => None,
        }
    }
}

/// Regular expression plus the message shown on mismatch.
#[derive(Clone, Debug)]
pub struct FieldPattern {
    original: String,
    regex: Regex,
    pub message: Option<String>,
}

impl FieldPattern {
    fn new(
        source: ConfigSource,
        value: String,
        message: Option<String>,
    ) -> Result<Self, ConfigValidationError> {
        match Regex::new(&value) {
            Ok(regex) => Ok(FieldPattern {
                original: value,
                regex,
                message,
            }),
            Err(err) => Err(ConfigValidationError::new(
                Some(source),
                format!("invalid pattern '{value}': {err}"),
            )),
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Syntactic string formats understood by the catalog.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FormatSpec {
    Url,
    Email,
    HexColor,
}

impl FormatSpec {
    pub fn as_str(self) -> &'static str {
        match self {
            FormatSpec::Url => "url",
            FormatSpec::Email => "email",
            FormatSpec::HexColor => "hex-color",
        }
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FormatSpec {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "url" => Ok(FormatSpec::Url),
            "email" => Ok(FormatSpec::Email),
            "hex-color" => Ok(FormatSpec::HexColor),
            _ => Err(()),
        }
    }
}

/// "This field must be set when `path` equals `equals`."
#[derive(Clone, Debug)]
pub struct DependencySpec {
    pub path: FieldPath,
    pub equals: Value,
    pub severity: Severity,
    pub message: Option<String>,
}

/// Document-level rule over an array-of-record field.
#[derive(Clone, Debug)]
pub struct RuleSpec {
    pub kind: RuleKind,
    pub field: String,
    pub item_field: String,
    pub target: Option<String>,
    pub severity: Severity,
    pub message: Option<String>,
    pub source: ConfigSource,
}

/// Supported document-level rules.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RuleKind {
    /// Every entry has a non-empty `item_field`.
    NonEmpty,
    /// `item_field` values are unique across entries.
    Unique,
    /// Scalar field `target` names an existing entry's `item_field`.
    Reference,
    /// At most one entry has a truthy `item_field`.
    AtMostOne,
}

impl RuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::NonEmpty => "non-empty",
            RuleKind::Unique => "unique",
            RuleKind::Reference => "reference",
            RuleKind::AtMostOne => "at-most-one",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "non-empty" => Ok(RuleKind::NonEmpty),
            "unique" => Ok(RuleKind::Unique),
            "reference" => Ok(RuleKind::Reference),
            "at-most-one" => Ok(RuleKind::AtMostOne),
            _ => Err(()),
        }
    }
}

/// Severity policy applied to issues after validators run.
#[derive(Clone, Debug, Default)]
pub struct ValidationSettings {
    pub severity: HashMap<IssueCode, SeverityLevel>,
    pub severity_wildcard: Option<SeverityLevel>,
    pub severity_overrides: Vec<SeverityOverride>,
}

impl ValidationSettings {
    /// Configured level for `code`, or `None` to keep the issue's own severity.
    pub fn severity_for(&self, code: IssueCode) -> Option<SeverityLevel> {
        if code == IssueCode::Internal {
            return None;
        }
        self.severity.get(&code).copied().or(self.severity_wildcard)
    }

    /// Configured level for `code` on the issue at `path`. Later overrides win.
    pub fn severity_for_path(&self, path: &FieldPath, code: IssueCode) -> Option<SeverityLevel> {
        if code == IssueCode::Internal {
            return None;
        }
        let rendered = path.to_string();
        for override_entry in self.severity_overrides.iter().rev() {
            if override_entry.matcher.is_match(Path::new(&rendered)) {
                if let Some(level) = override_entry.codes.get(&code).copied() {
                    return Some(level);
                }
                if let Some(level) = override_entry.wildcard {
                    return Some(level);
                }
            }
        }
        self.severity_for(code)
    }

    pub fn is_empty(&self) -> bool {
        self.severity.is_empty()
            && self.severity_wildcard.is_none()
            && self.severity_overrides.is_empty()
    }
}

/// Path-scoped severity override rules.
#[derive(Clone, Debug)]
pub struct SeverityOverride {
    pub path: Pattern,
    pub matcher: GlobMatcher,
    pub codes: HashMap<IssueCode, SeverityLevel>,
    pub wildcard: Option<SeverityLevel>,
    pub source: ConfigSource,
}

/// Import defaults surfaced to the planner and the CLI.
#[derive(Clone, Debug)]
pub struct ImportSettings {
    pub default_mode: MergeMode,
    pub preview_context: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        ImportSettings {
            default_mode: MergeMode::Merge,
            preview_context: DEFAULT_PREVIEW_CONTEXT,
        }
    }
}

/// Glob pattern plus compiled matcher helper.
#[derive(Clone, Debug)]
pub struct Pattern {
    original: String,
    glob: Glob,
}

impl Pattern {
    fn new(source: ConfigSource, value: String) -> Result<Self, ConfigValidationError> {
        match Glob::new(&value) {
            Ok(glob) => Ok(Pattern {
                original: value,
                glob,
            }),
            Err(err) => Err(ConfigValidationError::new(
                Some(source),
                format!("invalid glob pattern '{value}': {err}"),
            )),
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn glob(&self) -> &Glob {
        &self.glob
    }
}

/// Severity configuration surfaced to the orchestrator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeverityLevel {
    Error,
    Warning,
    Ignore,
}

impl SeverityLevel {
    /// Issue severity for this level; `None` means the issue is dropped.
    pub fn as_severity(self) -> Option<Severity> {
        match self {
            SeverityLevel::Error => Some(Severity::Error),
            SeverityLevel::Warning => Some(Severity::Warning),
            SeverityLevel::Ignore => None,
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SeverityLevel::Error => "error",
            SeverityLevel::Warning => "warning",
            SeverityLevel::Ignore => "ignore",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for SeverityLevel {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "error" => Ok(SeverityLevel::Error),
            "warning" => Ok(SeverityLevel::Warning),
            "ignore" => Ok(SeverityLevel::Ignore),
            _ => Err(()),
        }
    }
}

/// Provenance information for resolved configuration.
#[derive(Clone, Debug)]
pub struct ConfigSources {
    pub working_directory: PathBuf,
    pub layers: Vec<ConfigSource>,
}

/// Specific layer of configuration (default/git/local/override/inline).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: Option<PathBuf>,
    pub base_dir: PathBuf,
}

impl ConfigSource {
    fn default(base_dir: PathBuf) -> Self {
        ConfigSource {
            kind: ConfigSourceKind::Default,
            path: None,
            base_dir,
        }
    }

    fn inline(base_dir: PathBuf) -> Self {
        ConfigSource {
            kind: ConfigSourceKind::Inline,
            path: None,
            base_dir,
        }
    }

    fn for_file(kind: ConfigSourceKind, path: PathBuf) -> Self {
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        ConfigSource {
            kind,
            path: Some(path),
            base_dir,
        }
    }

    fn describe(&self) -> String {
        match (&self.kind, &self.path) {
            (ConfigSourceKind::Default, _) => "built-in defaults".to_owned(),
            (kind, Some(path)) => format!("{} at {}", kind, path.display()),
            (kind, None) => kind.to_string(),
        }
    }
}

/// Kinds of configuration sources, ordered from lowest to highest precedence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSourceKind {
    Default,
    GitRoot,
    Local,
    Override,
    Inline,
}

impl fmt::Display for ConfigSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfigSourceKind::Default => "defaults",
            ConfigSourceKind::GitRoot => "git-root config",
            ConfigSourceKind::Local => "local config",
            ConfigSourceKind::Override => "override config",
            ConfigSourceKind::Inline => "inline config",
        };
        f.write_str(label)
    }
}

/// Loader options, typically supplied by the CLI layer.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub override_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve working directory {attempted}: {source}")]
    WorkingDirectory {
        attempted: PathBuf,
        source: io::Error,
    },
    #[error("override config {path} not found")]
    OverrideNotFound { path: PathBuf },
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to parse inline config: {source}")]
    InlineParse { source: toml::de::Error },
    #[error("configuration validation failed:\n{0}")]
    Validation(ConfigValidationErrors),
}

impl Config {
    /// Loads configuration using the precedence rules and returns typed settings.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = resolve_working_dir(options.working_dir)?;
        let override_path = options
            .override_path
            .map(|path| make_absolute(&path, &working_dir));

        if let Some(path) = &override_path {
            if !path.exists() {
                return Err(ConfigError::OverrideNotFound { path: path.clone() });
            }
        }

        let default_source = ConfigSource::default(working_dir.clone());
        let mut merged = PartialConfig::empty();
        merged.merge(defaults_layer(default_source.clone()));

        let mut source_layers = vec![default_source];

        let git_root = find_git_root(&working_dir);
        let git_config_path = git_root.as_ref().map(|root| root.join(CONFIG_FILE_NAME));
        let local_config_path = working_dir.join(CONFIG_FILE_NAME);

        if let Some(path) = git_config_path.as_ref() {
            if path.exists() && Some(path) != override_path.as_ref() && path != &local_config_path {
                let source = ConfigSource::for_file(ConfigSourceKind::GitRoot, path.clone());
                merged.merge(load_layer(path, source.clone())?);
                source_layers.push(source);
            }
        }

        if local_config_path.exists() && Some(&local_config_path) != override_path.as_ref() {
            let source = ConfigSource::for_file(ConfigSourceKind::Local, local_config_path.clone());
            merged.merge(load_layer(&local_config_path, source.clone())?);
            source_layers.push(source);
        }

        if let Some(path) = override_path {
            let source = ConfigSource::for_file(ConfigSourceKind::Override, path.clone());
            merged.merge(load_layer(&path, source.clone())?);
            source_layers.push(source);
        }

        debug!(layers = source_layers.len(), "resolved settings-engine config layers");

        let config = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(Config {
            catalog: config.catalog,
            validation: config.validation,
            import: config.import,
            sources: ConfigSources {
                working_directory: working_dir,
                layers: source_layers,
            },
        })
    }

    /// Resolve built-in defaults plus a single in-memory TOML layer.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let base_dir = PathBuf::from(".");
        let default_source = ConfigSource::default(base_dir.clone());
        let inline_source = ConfigSource::inline(base_dir.clone());

        let mut merged = PartialConfig::empty();
        merged.merge(defaults_layer(default_source.clone()));
        let layer = parse_layer(contents, inline_source.clone()).map_err(|err| match err {
            LayerParseError::Parse { source } => ConfigError::InlineParse { source },
        })?;
        merged.merge(layer);

        let config = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(Config {
            catalog: config.catalog,
            validation: config.validation,
            import: config.import,
            sources: ConfigSources {
                working_directory: base_dir,
                layers: vec![default_source, inline_source],
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::from_toml_str("").unwrap_or_else(|err| {
            panic!("failed to load settings-engine defaults: {err}");
        })
    }
}

fn resolve_working_dir(override_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(path) => fs::canonicalize(&path).map_err(|source| ConfigError::WorkingDirectory {
            attempted: path,
            source,
        }),
        None => env::current_dir().map_err(|source| ConfigError::WorkingDirectory {
            attempted: PathBuf::from("."),
            source,
        }),
    }
}

fn make_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn load_layer(path: &Path, source: ConfigSource) -> Result<PartialConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.into(),
        source,
    })?;
    parse_layer(&contents, source).map_err(|err| match err {
        LayerParseError::Parse { source } => ConfigError::Parse {
            path: path.into(),
            source,
        },
    })
}

fn parse_layer(contents: &str, source: ConfigSource) -> Result<PartialConfig, LayerParseError> {
    let raw: RawConfig =
        toml::from_str(contents).map_err(|source| LayerParseError::Parse { source })?;
    Ok(raw.into_partial(source))
}

fn defaults_layer(source: ConfigSource) -> PartialConfig {
    PartialConfig {
        catalog: None,
        validation: None,
        import: Some(ImportPartial {
            default_mode: Some(Located::new("merge".into(), source.clone())),
            preview_context: Some(Located::new(DEFAULT_PREVIEW_CONTEXT, source)),
        }),
    }
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

#[derive(Debug)]
enum LayerParseError {
    Parse { source: toml::de::Error },
}

#[derive(Clone, Debug, Default)]
struct PartialConfig {
    catalog: Option<CatalogPartial>,
    validation: Option<ValidationPartial>,
    import: Option<ImportPartial>,
}

impl PartialConfig {
    fn empty() -> Self {
        PartialConfig {
            catalog: None,
            validation: None,
            import: None,
        }
    }

    fn merge(&mut self, mut other: PartialConfig) {
        if let Some(other_catalog) = other.catalog.take() {
            match &mut self.catalog {
                Some(catalog) => catalog.merge(other_catalog),
                None => self.catalog = Some(other_catalog),
            }
        }

        if let Some(other_validation) = other.validation.take() {
            match &mut self.validation {
                Some(validation) => validation.merge(other_validation),
                None => self.validation = Some(other_validation),
            }
        }

        if let Some(other_import) = other.import.take() {
            match &mut self.import {
                Some(import) => import.merge(other_import),
                None => self.import = Some(other_import),
            }
        }
    }

    fn finalize(self) -> Result<ResolvedConfig, ConfigValidationErrors> {
        let mut errors = Vec::new();

        let catalog = finalize_catalog(self.catalog.unwrap_or_default(), &mut errors);

        let validation_partial = self.validation.unwrap_or_default();
        let (severity, severity_wildcard) =
            parse_severity_map(validation_partial.severity, &mut errors);
        let severity_overrides =
            parse_severity_overrides(validation_partial.severity_overrides, &mut errors);

        let import_partial = self.import.unwrap_or_default();
        let default_mode = match import_partial.default_mode {
            Some(located) => match located.value.parse::<MergeMode>() {
                Ok(mode) => mode,
                Err(_) => {
                    errors.push(
                        ConfigValidationError::new(
                            Some(located.source.clone()),
                            format!(
                                "unknown merge mode '{}' (expected 'merge' or 'replace')",
                                located.value
                            ),
                        )
                        .with_context("import.default_mode"),
                    );
                    MergeMode::Merge
                }
            },
            None => MergeMode::Merge,
        };
        let preview_context = import_partial
            .preview_context
            .map(|located| located.value)
            .unwrap_or(DEFAULT_PREVIEW_CONTEXT);

        if !errors.is_empty() {
            return Err(ConfigValidationErrors(errors));
        }

        Ok(ResolvedConfig {
            catalog,
            validation: ValidationSettings {
                severity,
                severity_wildcard,
                severity_overrides,
            },
            import: ImportSettings {
                default_mode,
                preview_context,
            },
        })
    }
}

#[derive(Clone, Debug, Default)]
struct CatalogPartial {
    categories: Vec<CategoryPartial>,
}

impl CatalogPartial {
    fn merge(&mut self, other: CatalogPartial) {
        for category in other.categories {
            match self
                .categories
                .iter_mut()
                .find(|existing| existing.name == category.name)
            {
                Some(existing) => existing.merge(category),
                None => self.categories.push(category),
            }
        }
    }
}

#[derive(Clone, Debug)]
struct CategoryPartial {
    name: String,
    source: ConfigSource,
    fields: Vec<FieldPartial>,
    rules: Option<Located<Vec<RulePartial>>>,
}

impl CategoryPartial {
    fn merge(&mut self, other: CategoryPartial) {
        self.source = other.source;
        for field in other.fields {
            match self
                .fields
                .iter_mut()
                .find(|existing| existing.name == field.name)
            {
                Some(existing) => existing.merge(field),
                None => self.fields.push(field),
            }
        }
        if other.rules.is_some() {
            self.rules = other.rules;
        }
    }
}

#[derive(Clone, Debug)]
struct FieldPartial {
    name: String,
    source: ConfigSource,
    kind: Option<Located<String>>,
    default: Option<Located<Value>>,
    required: Option<Located<bool>>,
    min: Option<Located<f64>>,
    max: Option<Located<f64>>,
    pattern: Option<Located<String>>,
    pattern_message: Option<Located<String>>,
    values: Option<Located<Vec<Value>>>,
    format: Option<Located<String>>,
    key: Option<Located<String>>,
    dependency: Option<Located<DependencyPartial>>,
}

impl FieldPartial {
    fn merge(&mut self, other: FieldPartial) {
        self.source = other.source;
        if other.kind.is_some() {
            self.kind = other.kind;
        }
        if other.default.is_some() {
            self.default = other.default;
        }
        if other.required.is_some() {
            self.required = other.required;
        }
        if other.min.is_some() {
            self.min = other.min;
        }
        if other.max.is_some() {
            self.max = other.max;
        }
        if other.pattern.is_some() {
            self.pattern = other.pattern;
        }
        if other.pattern_message.is_some() {
            self.pattern_message = other.pattern_message;
        }
        if other.values.is_some() {
            self.values = other.values;
        }
        if other.format.is_some() {
            self.format = other.format;
        }
        if other.key.is_some() {
            self.key = other.key;
        }
        if other.dependency.is_some() {
            self.dependency = other.dependency;
        }
    }
}

#[derive(Clone, Debug)]
struct DependencyPartial {
    path: String,
    equals: Option<Value>,
    severity: Option<String>,
    message: Option<String>,
}

#[derive(Clone, Debug)]
struct RulePartial {
    kind: String,
    field: String,
    item_field: Option<String>,
    target: Option<String>,
    severity: Option<String>,
    message: Option<String>,
}

#[derive(Clone, Debug, Default)]
struct ValidationPartial {
    severity: HashMap<String, Located<String>>,
    severity_overrides: Vec<Located<SeverityOverridePartial>>,
}

impl ValidationPartial {
    fn merge(&mut self, other: ValidationPartial) {
        for (key, value) in other.severity {
            self.severity.insert(key, value);
        }
        self.severity_overrides.extend(other.severity_overrides);
    }
}

#[derive(Clone, Debug)]
struct SeverityOverridePartial {
    path: String,
    codes: HashMap<String, String>,
}

#[derive(Clone, Debug, Default)]
struct ImportPartial {
    default_mode: Option<Located<String>>,
    preview_context: Option<Located<usize>>,
}

impl ImportPartial {
    fn merge(&mut self, other: ImportPartial) {
        if other.default_mode.is_some() {
            self.default_mode = other.default_mode;
        }
        if other.preview_context.is_some() {
            self.preview_context = other.preview_context;
        }
    }
}

#[derive(Clone, Debug)]
struct Located<T> {
    value: T,
    source: ConfigSource,
}

impl<T> Located<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Located { value, source }
    }
}

fn finalize_catalog(
    partial: CatalogPartial,
    errors: &mut Vec<ConfigValidationError>,
) -> CatalogSettings {
    let mut categories = Vec::new();

    for category in partial.categories {
        let context = format!("categories.{}", category.name);
        if category.name.trim().is_empty() {
            errors.push(
                ConfigValidationError::new(
                    Some(category.source.clone()),
                    "category name cannot be empty".into(),
                )
                .with_context("categories"),
            );
            continue;
        }

        let mut fields = Vec::new();
        for field in category.fields {
            if let Some(spec) = finalize_field(&category.name, field, errors) {
                fields.push(spec);
            }
        }

        let rules = category
            .rules
            .map(|located| finalize_rules(&category.name, &fields, located, errors))
            .unwrap_or_default();

        if fields.is_empty() {
            errors.push(
                ConfigValidationError::new(
                    Some(category.source.clone()),
                    "category must declare at least one field".into(),
                )
                .with_context(context),
            );
        }

        categories.push(CategorySpec {
            name: category.name,
            source: category.source,
            fields,
            rules,
        });
    }

    CatalogSettings { categories }
}

fn finalize_field(
    category: &str,
    partial: FieldPartial,
    errors: &mut Vec<ConfigValidationError>,
) -> Option<FieldSpec> {
    let FieldPartial {
        name,
        source,
        kind,
        default,
        required,
        min,
        max,
        pattern,
        pattern_message,
        values,
        format,
        key,
        dependency,
    } = partial;

    let context = format!("categories.{category}.fields.{name}");
    if name.trim().is_empty() {
        errors.push(
            ConfigValidationError::new(Some(source), "field name cannot be empty".into())
                .with_context(format!("categories.{category}.fields")),
        );
        return None;
    }

    let Some(kind_loc) = kind else {
        errors.push(
            ConfigValidationError::new(Some(source), "field kind is required".into())
                .with_context(context),
        );
        return None;
    };

    let reject = |errors: &mut Vec<ConfigValidationError>, src: &ConfigSource, what: &str| {
        errors.push(
            ConfigValidationError::new(
                Some(src.clone()),
                format!("{what} is not allowed for kind '{}'", kind_loc.value),
            )
            .with_context(context.clone()),
        );
    };

    let kind = match kind_loc.value.as_str() {
        "boolean" => ValueKind::Boolean,
        "string" => ValueKind::String,
        "number" => {
            let min_value = min.as_ref().map(|located| located.value);
            let max_value = max.as_ref().map(|located| located.value);
            if let (Some(lower), Some(upper)) = (min_value, max_value) {
                if lower > upper {
                    errors.push(
                        ConfigValidationError::new(
                            Some(kind_loc.source.clone()),
                            format!("min ({lower}) must not exceed max ({upper})"),
                        )
                        .with_context(context.clone()),
                    );
                }
            }
            if min_value.is_some() || max_value.is_some() {
                ValueKind::BoundedNumber {
                    min: min_value,
                    max: max_value,
                }
            } else {
                ValueKind::Number
            }
        }
        "enum" => match &values {
            Some(located) if !located.value.is_empty() => ValueKind::Enum {
                values: located.value.clone(),
            },
            _ => {
                errors.push(
                    ConfigValidationError::new(
                        Some(kind_loc.source.clone()),
                        "enum fields must declare a non-empty 'values' list".into(),
                    )
                    .with_context(context.clone()),
                );
                ValueKind::Enum { values: Vec::new() }
            }
        },
        "array" => ValueKind::ArrayOfRecord {
            key: key.as_ref().map(|located| located.value.clone()),
        },
        other => {
            errors.push(
                ConfigValidationError::new(
                    Some(kind_loc.source.clone()),
                    format!("unknown field kind '{other}'"),
                )
                .with_context(context.clone()),
            );
            return None;
        }
    };

    if !matches!(kind, ValueKind::BoundedNumber { .. }) {
        if let Some(located) = min.as_ref().or(max.as_ref()) {
            reject(errors, &located.source, "min/max");
        }
    }
    if !matches!(kind, ValueKind::Enum { .. }) {
        if let Some(located) = &values {
            reject(errors, &located.source, "values");
        }
    }
    if !matches!(kind, ValueKind::ArrayOfRecord { .. }) {
        if let Some(located) = &key {
            reject(errors, &located.source, "key");
        }
    }

    let pattern = match pattern {
        Some(located) if kind == ValueKind::String => {
            let message = pattern_message.map(|message| message.value);
            match FieldPattern::new(located.source.clone(), located.value, message) {
                Ok(compiled) => Some(compiled),
                Err(err) => {
                    errors.push(err.with_context(context.clone()));
                    None
                }
            }
        }
        Some(located) => {
            reject(errors, &located.source, "pattern");
            None
        }
        None => None,
    };

    let format = match format {
        Some(located) if kind == ValueKind::String => match located.value.parse::<FormatSpec>() {
            Ok(format) => Some(format),
            Err(_) => {
                errors.push(
                    ConfigValidationError::new(
                        Some(located.source.clone()),
                        format!(
                            "unknown format '{}' (expected url, email, or hex-color)",
                            located.value
                        ),
                    )
                    .with_context(context.clone()),
                );
                None
            }
        },
        Some(located) => {
            reject(errors, &located.source, "format");
            None
        }
        None => None,
    };

    let default = match default {
        Some(located) => {
            if !kind.accepts(&located.value) {
                errors.push(
                    ConfigValidationError::new(
                        Some(located.source.clone()),
                        format!("default does not match declared kind '{kind}'"),
                    )
                    .with_context(context.clone()),
                );
            }
            located.value
        }
        None if kind.is_collection() => Value::Array(Vec::new()),
        None => Value::Null,
    };

    let dependency = dependency.and_then(|located| {
        let Located { value, source } = located;
        let dep_context = format!("{context}.dependency");
        let path = match FieldPath::parse(&value.path) {
            Ok(path) => path,
            Err(err) => {
                errors.push(
                    ConfigValidationError::new(Some(source), err.to_string())
                        .with_context(dep_context),
                );
                return None;
            }
        };
        let Some(equals) = value.equals else {
            errors.push(
                ConfigValidationError::new(
                    Some(source),
                    "dependency must declare an 'equals' value".into(),
                )
                .with_context(dep_context),
            );
            return None;
        };
        let severity = parse_rule_severity(value.severity, &source, &dep_context, errors);
        Some(DependencySpec {
            path,
            equals,
            severity,
            message: value.message,
        })
    });

    Some(FieldSpec {
        name,
        kind,
        default,
        required: required.map(|located| located.value).unwrap_or(false),
        pattern,
        format,
        dependency,
        source,
    })
}

fn finalize_rules(
    category: &str,
    fields: &[FieldSpec],
    located: Located<Vec<RulePartial>>,
    errors: &mut Vec<ConfigValidationError>,
) -> Vec<RuleSpec> {
    let Located { value, source } = located;
    let context = format!("categories.{category}.rules");
    let mut rules = Vec::new();

    for rule in value {
        let kind = match rule.kind.parse::<RuleKind>() {
            Ok(kind) => kind,
            Err(_) => {
                errors.push(
                    ConfigValidationError::new(
                        Some(source.clone()),
                        format!("unknown rule kind '{}'", rule.kind),
                    )
                    .with_context(context.clone()),
                );
                continue;
            }
        };

        match fields.iter().find(|field| field.name == rule.field) {
            Some(field) if field.kind.is_collection() => {}
            Some(_) => {
                errors.push(
                    ConfigValidationError::new(
                        Some(source.clone()),
                        format!("{kind} rule field '{}' must be an array field", rule.field),
                    )
                    .with_context(context.clone()),
                );
                continue;
            }
            None => {
                errors.push(
                    ConfigValidationError::new(
                        Some(source.clone()),
                        format!("{kind} rule references unknown field '{}'", rule.field),
                    )
                    .with_context(context.clone()),
                );
                continue;
            }
        }

        let Some(item_field) = rule.item_field.filter(|value| !value.trim().is_empty()) else {
            errors.push(
                ConfigValidationError::new(
                    Some(source.clone()),
                    format!("{kind} rule on '{}' must declare 'item_field'", rule.field),
                )
                .with_context(context.clone()),
            );
            continue;
        };

        if kind == RuleKind::Reference {
            match rule.target.as_deref() {
                Some(target) if fields.iter().any(|field| field.name == target) => {}
                Some(target) => {
                    errors.push(
                        ConfigValidationError::new(
                            Some(source.clone()),
                            format!("reference rule target '{target}' is not a declared field"),
                        )
                        .with_context(context.clone()),
                    );
                    continue;
                }
                None => {
                    errors.push(
                        ConfigValidationError::new(
                            Some(source.clone()),
                            format!("reference rule on '{}' must declare 'target'", rule.field),
                        )
                        .with_context(context.clone()),
                    );
                    continue;
                }
            }
        }

        let severity = parse_rule_severity(rule.severity, &source, &context, errors);
        rules.push(RuleSpec {
            kind,
            field: rule.field,
            item_field,
            target: rule.target,
            severity,
            message: rule.message,
            source: source.clone(),
        });
    }

    rules
}

fn parse_rule_severity(
    raw: Option<String>,
    source: &ConfigSource,
    context: &str,
    errors: &mut Vec<ConfigValidationError>,
) -> Severity {
    match raw {
        Some(value) => match value.parse::<Severity>() {
            Ok(severity) => severity,
            Err(_) => {
                errors.push(
                    ConfigValidationError::new(
                        Some(source.clone()),
                        format!("invalid severity '{value}' (expected error or warning)"),
                    )
                    .with_context(context),
                );
                Severity::Error
            }
        },
        None => Severity::Error,
    }
}

fn parse_issue_code(
    name: &str,
    source: &ConfigSource,
    context: &str,
    errors: &mut Vec<ConfigValidationError>,
) -> Option<IssueCode> {
    match name.parse::<IssueCode>() {
        Ok(IssueCode::Internal) => {
            errors.push(
                ConfigValidationError::new(
                    Some(source.clone()),
                    "internal issues cannot be re-tagged".into(),
                )
                .with_context(context),
            );
            None
        }
        Ok(code) => Some(code),
        Err(_) => {
            errors.push(
                ConfigValidationError::new(
                    Some(source.clone()),
                    format!("unknown issue code '{name}'"),
                )
                .with_context(context),
            );
            None
        }
    }
}

fn parse_severity_map(
    raw: HashMap<String, Located<String>>,
    errors: &mut Vec<ConfigValidationError>,
) -> (HashMap<IssueCode, SeverityLevel>, Option<SeverityLevel>) {
    let mut result = HashMap::new();
    let mut wildcard: Option<SeverityLevel> = None;
    for (code_name, located_value) in raw {
        let level = match located_value.value.parse::<SeverityLevel>() {
            Ok(level) => level,
            Err(_) => {
                errors.push(
                    ConfigValidationError::new(
                        Some(located_value.source.clone()),
                        format!(
                            "invalid severity '{}' for '{}'",
                            located_value.value, code_name
                        ),
                    )
                    .with_context("validation.severity"),
                );
                continue;
            }
        };

        if code_name == "*" {
            wildcard = Some(level);
            continue;
        }

        if let Some(code) = parse_issue_code(
            &code_name,
            &located_value.source,
            "validation.severity",
            errors,
        ) {
            result.insert(code, level);
        }
    }
    (result, wildcard)
}

fn parse_severity_overrides(
    entries: Vec<Located<SeverityOverridePartial>>,
    errors: &mut Vec<ConfigValidationError>,
) -> Vec<SeverityOverride> {
    let mut overrides = Vec::new();
    for entry in entries {
        let Located { value, source } = entry;
        let pattern = match Pattern::new(source.clone(), value.path.clone()) {
            Ok(pattern) => pattern,
            Err(err) => {
                errors.push(err.with_context("validation.severity_overrides"));
                continue;
            }
        };

        if value.codes.is_empty() {
            errors.push(
                ConfigValidationError::new(
                    Some(source.clone()),
                    format!(
                        "severity override for pattern '{}' must specify at least one code",
                        pattern.original()
                    ),
                )
                .with_context("validation.severity_overrides"),
            );
            continue;
        }

        let matcher = pattern.glob().compile_matcher();
        let mut codes = HashMap::new();
        let mut wildcard = None;

        for (code_name, severity_value) in value.codes {
            let level = match severity_value.parse::<SeverityLevel>() {
                Ok(level) => level,
                Err(_) => {
                    errors.push(
                        ConfigValidationError::new(
                            Some(source.clone()),
                            format!(
                                "invalid severity '{}' for '{}' in override pattern '{}'",
                                severity_value,
                                code_name,
                                pattern.original()
                            ),
                        )
                        .with_context("validation.severity_overrides"),
                    );
                    continue;
                }
            };

            if code_name == "*" {
                wildcard = Some(level);
                continue;
            }

            if let Some(code) = parse_issue_code(
                &code_name,
                &source,
                "validation.severity_overrides",
                errors,
            ) {
                codes.insert(code, level);
            }
        }

        if codes.is_empty() && wildcard.is_none() {
            continue;
        }

        overrides.push(SeverityOverride {
            path: pattern,
            matcher,
            codes,
            wildcard,
            source,
        });
    }
    overrides
}

#[derive(Clone, Debug)]
struct ResolvedConfig {
    catalog: CatalogSettings,
    validation: ValidationSettings,
    import: ImportSettings,
}

/// Container for validation failures, formatted as a bullet list.
#[derive(Debug)]
pub struct ConfigValidationErrors(pub Vec<ConfigValidationError>);

impl fmt::Display for ConfigValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "- {err}")?;
        }
        Ok(())
    }
}

impl ConfigValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ConfigValidationError> {
        self.0.iter()
    }
}

/// Validation failure with optional provenance.
#[derive(Clone, Debug)]
pub struct ConfigValidationError {
    pub source: Option<ConfigSource>,
    pub message: String,
    pub context: Option<String>,
}

impl ConfigValidationError {
    fn new(source: Option<ConfigSource>, message: String) -> Self {
        ConfigValidationError {
            source,
            message,
            context: None,
        }
    }

    fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{}: {}", context, self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(source) = &self.source {
            write!(f, " ({})", source.describe())?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    categories: Option<Vec<RawCategory>>,
    #[serde(default)]
    validation: Option<RawValidation>,
    #[serde(default)]
    import: Option<RawImport>,
}

impl RawConfig {
    fn into_partial(self, source: ConfigSource) -> PartialConfig {
        PartialConfig {
            catalog: self.categories.map(|categories| CatalogPartial {
                categories: categories
                    .into_iter()
                    .map(|category| category.into_partial(source.clone()))
                    .collect(),
            }),
            validation: self
                .validation
                .map(|validation| validation.into_partial(source.clone())),
            import: self.import.map(|import| import.into_partial(source)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    name: String,
    #[serde(default)]
    fields: Vec<RawField>,
    #[serde(default)]
    rules: Option<Vec<RawRule>>,
}

impl RawCategory {
    fn into_partial(self, source: ConfigSource) -> CategoryPartial {
        CategoryPartial {
            name: self.name,
            fields: self
                .fields
                .into_iter()
                .map(|field| field.into_partial(source.clone()))
                .collect(),
            rules: self.rules.map(|rules| {
                Located::new(
                    rules.into_iter().map(RawRule::into_partial).collect(),
                    source.clone(),
                )
            }),
            source,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    required: Option<bool>,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    pattern_message: Option<String>,
    #[serde(default)]
    values: Option<Vec<Value>>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    dependency: Option<RawDependency>,
}

impl RawField {
    fn into_partial(self, source: ConfigSource) -> FieldPartial {
        FieldPartial {
            name: self.name,
            kind: self.kind.map(|value| Located::new(value, source.clone())),
            default: self.default.map(|value| Located::new(value, source.clone())),
            required: self.required.map(|value| Located::new(value, source.clone())),
            min: self.min.map(|value| Located::new(value, source.clone())),
            max: self.max.map(|value| Located::new(value, source.clone())),
            pattern: self.pattern.map(|value| Located::new(value, source.clone())),
            pattern_message: self
                .pattern_message
                .map(|value| Located::new(value, source.clone())),
            values: self.values.map(|value| Located::new(value, source.clone())),
            format: self.format.map(|value| Located::new(value, source.clone())),
            key: self.key.map(|value| Located::new(value, source.clone())),
            dependency: self.dependency.map(|dependency| {
                Located::new(
                    DependencyPartial {
                        path: dependency.path,
                        equals: dependency.equals,
                        severity: dependency.severity,
                        message: dependency.message,
                    },
                    source.clone(),
                )
            }),
            source,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    path: String,
    #[serde(default)]
    equals: Option<Value>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    kind: String,
    field: String,
    #[serde(default)]
    item_field: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl RawRule {
    fn into_partial(self) -> RulePartial {
        RulePartial {
            kind: self.kind,
            field: self.field,
            item_field: self.item_field,
            target: self.target,
            severity: self.severity,
            message: self.message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawValidation {
    #[serde(default)]
    severity: HashMap<String, String>,
    #[serde(default)]
    severity_overrides: Vec<RawSeverityOverride>,
}

impl RawValidation {
    fn into_partial(self, source: ConfigSource) -> ValidationPartial {
        let severity = self
            .severity
            .into_iter()
            .map(|(key, value)| (key, Located::new(value, source.clone())))
            .collect();

        let severity_overrides = self
            .severity_overrides
            .into_iter()
            .map(|entry| {
                Located::new(
                    SeverityOverridePartial {
                        path: entry.path,
                        codes: entry.codes,
                    },
                    source.clone(),
                )
            })
            .collect();

        ValidationPartial {
            severity,
            severity_overrides,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSeverityOverride {
    path: String,
    #[serde(default)]
    codes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawImport {
    #[serde(default)]
    default_mode: Option<String>,
    #[serde(default)]
    preview_context: Option<usize>,
}

impl RawImport {
    fn into_partial(self, source: ConfigSource) -> ImportPartial {
        ImportPartial {
            default_mode: self
                .default_mode
                .map(|value| Located::new(value, source.clone())),
            preview_context: self
                .preview_context
                .map(|value| Located::new(value, source)),
        }
    }
}
