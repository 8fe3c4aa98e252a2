use crate::stanza::{Condition, DecodeError, Event, Stanza};
use crate::types::Token;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("invalid manifest document: {0}")]
    Document(#[from] serde_json::Error),
    #[error("invalid cask token '{0}': expected lowercase letters, digits, and -@+._")]
    InvalidToken(String),
    #[error("{path}: each entry must have exactly one key, found {keys}")]
    MalformedEntry { path: String, keys: usize },
    #[error("{path}: conditional block must be an array of entries")]
    MalformedConditional { path: String },
    #[error("{token}: {source}")]
    InvalidStanza {
        token: String,
        #[source]
        source: DecodeError,
    },
    #[error("unsupported manifest format '{0}', expected .toml or .json")]
    UnsupportedFormat(String),
}

/// A parsed cask body: the token plus its entries in authoring order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    pub token: Token,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Stanza(Stanza),
    Unknown(String),
    Conditional {
        condition: Condition,
        entries: Vec<Entry>,
    },
}

impl ManifestDocument {
    pub fn new(token: Token, entries: Vec<Entry>) -> Self {
        Self { token, entries }
    }

    /// Flatten the entries into the event stream the evaluator consumes.
    pub fn events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        push_events(&self.entries, &mut events);
        events
    }
}

fn push_events(entries: &[Entry], out: &mut Vec<Event>) {
    for entry in entries {
        match entry {
            Entry::Stanza(stanza) => out.push(Event::Stanza(stanza.clone())),
            Entry::Unknown(name) => out.push(Event::Unknown { name: name.clone() }),
            Entry::Conditional { condition, entries } => {
                out.push(Event::EnterConditional(*condition));
                push_events(entries, out);
                out.push(Event::ExitConditional);
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    token: String,
    #[serde(default)]
    stanza: Vec<Value>,
}

pub fn parse_manifest_str(input: &str) -> Result<ManifestDocument, ManifestError> {
    let value: toml::Value = toml::from_str(input)?;
    from_value(toml_to_json(value))
}

pub fn parse_manifest_json(input: &str) -> Result<ManifestDocument, ManifestError> {
    from_value(serde_json::from_str(input)?)
}

/// Parse a manifest file, choosing the format from its extension.
pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<ManifestDocument, ManifestError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_owned();
    let content = fs::read_to_string(path)?;
    match extension.as_str() {
        "toml" => parse_manifest_str(&content),
        "json" => parse_manifest_json(&content),
        _ => Err(ManifestError::UnsupportedFormat(path.display().to_string())),
    }
}

fn from_value(value: Value) -> Result<ManifestDocument, ManifestError> {
    let raw: RawDocument = serde_json::from_value(value)?;
    if !is_valid_token(&raw.token) {
        return Err(ManifestError::InvalidToken(raw.token));
    }
    let entries = parse_entries(&raw.token, raw.stanza, "stanza")?;
    debug!("parsed manifest {} with {} top-level entries", raw.token, entries.len());
    Ok(ManifestDocument {
        token: Token::new(raw.token),
        entries,
    })
}

fn is_valid_token(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "-@+._".contains(c))
}

fn parse_entries(token: &str, values: Vec<Value>, path: &str) -> Result<Vec<Entry>, ManifestError> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| parse_entry(token, value, &format!("{path}[{i}]")))
        .collect()
}

fn parse_entry(token: &str, value: Value, path: &str) -> Result<Entry, ManifestError> {
    let (key, value) = single_key(value, path)?;

    if let Some(condition) = Condition::from_dsl_key(&key) {
        let Value::Array(nested) = value else {
            return Err(ManifestError::MalformedConditional {
                path: format!("{path}.{key}"),
            });
        };
        let entries = parse_entries(token, nested, &format!("{path}.{key}"))?;
        return Ok(Entry::Conditional { condition, entries });
    }

    match Stanza::decode(&key, value) {
        Ok(Some(stanza)) => Ok(Entry::Stanza(stanza)),
        Ok(None) => Ok(Entry::Unknown(key)),
        Err(source) => Err(ManifestError::InvalidStanza {
            token: token.to_owned(),
            source,
        }),
    }
}

fn single_key(value: Value, path: &str) -> Result<(String, Value), ManifestError> {
    let map: Map<String, Value> = match value {
        Value::Object(map) => map,
        _ => {
            return Err(ManifestError::MalformedEntry {
                path: path.to_owned(),
                keys: 0,
            })
        }
    };
    if map.len() != 1 {
        return Err(ManifestError::MalformedEntry {
            path: path.to_owned(),
            keys: map.len(),
        });
    }
    map.into_iter().next().ok_or_else(|| ManifestError::MalformedEntry {
        path: path.to_owned(),
        keys: 0,
    })
}

/// TOML dates and times become their RFC 3339 text.
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
