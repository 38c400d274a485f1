//! Expansion of structured documents into nested key paths.
//!
//! A document `{"db": {"host": "x", "port": 5432}}` read from `svc/app`
//! becomes `svc/app/db/host = x` and `svc/app/db/port = 5432`.
//! Only objects are descended into; arrays are stored as their JSON text
//! and `null` leaves produce no key.

use crate::error::{SourceError, SourceResult};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

/// Parses a JSON document and checks that its top level is an object.
pub(crate) fn parse_json(path: &str, document: &str) -> SourceResult<JsonValue> {
    let value: JsonValue =
        serde_json::from_str(document).map_err(|e| invalid("JSON", path, e.to_string()))?;
    if !value.is_object() {
        return Err(invalid("JSON", path, "top level must be an object".into()));
    }
    Ok(value)
}

/// Parses a YAML document; an empty document is an empty mapping.
pub(crate) fn parse_yaml(path: &str, document: &str) -> SourceResult<YamlValue> {
    let value: YamlValue =
        serde_yaml::from_str(document).map_err(|e| invalid("YAML", path, e.to_string()))?;
    match value {
        YamlValue::Mapping(_) => Ok(value),
        YamlValue::Null => Ok(YamlValue::Mapping(Default::default())),
        _ => Err(invalid("YAML", path, "top level must be a mapping".into())),
    }
}

/// Flattens a JSON document found at `path` into `(key, raw value)` pairs.
pub fn flatten_json(path: &str, document: &str) -> SourceResult<Vec<(String, String)>> {
    let value = parse_json(path, document)?;
    let mut out = Vec::new();
    if let JsonValue::Object(map) = &value {
        for (key, child) in map {
            walk_json(&join(path, key), child, &mut out)?;
        }
    }
    Ok(out)
}

fn walk_json(path: &str, value: &JsonValue, out: &mut Vec<(String, String)>) -> SourceResult<()> {
    match value {
        JsonValue::Null => {}
        JsonValue::Bool(b) => out.push((path.to_string(), b.to_string())),
        JsonValue::Number(n) => out.push((path.to_string(), n.to_string())),
        JsonValue::String(s) => out.push((path.to_string(), s.clone())),
        JsonValue::Array(_) => {
            let text =
                serde_json::to_string(value).map_err(|e| invalid("JSON", path, e.to_string()))?;
            out.push((path.to_string(), text));
        }
        JsonValue::Object(map) => {
            for (key, child) in map {
                walk_json(&join(path, key), child, out)?;
            }
        }
    }
    Ok(())
}

/// Flattens a YAML document found at `path` into `(key, raw value)` pairs.
///
/// Non-string mapping keys are rendered as text (`1`, `true`).
pub fn flatten_yaml(path: &str, document: &str) -> SourceResult<Vec<(String, String)>> {
    let value = parse_yaml(path, document)?;
    let mut out = Vec::new();
    walk_yaml(path, &value, &mut out)?;
    Ok(out)
}

fn walk_yaml(path: &str, value: &YamlValue, out: &mut Vec<(String, String)>) -> SourceResult<()> {
    match value {
        YamlValue::Null => {}
        YamlValue::Bool(b) => out.push((path.to_string(), b.to_string())),
        YamlValue::Number(n) => out.push((path.to_string(), n.to_string())),
        YamlValue::String(s) => out.push((path.to_string(), s.clone())),
        YamlValue::Sequence(_) => {
            let text =
                serde_json::to_string(value).map_err(|e| invalid("YAML", path, e.to_string()))?;
            out.push((path.to_string(), text));
        }
        YamlValue::Mapping(map) => {
            for (key, child) in map {
                walk_yaml(&join(path, &yaml_key(path, key)?), child, out)?;
            }
        }
        YamlValue::Tagged(tagged) => walk_yaml(path, &tagged.value, out)?,
    }
    Ok(())
}

fn yaml_key(path: &str, key: &YamlValue) -> SourceResult<String> {
    match key {
        YamlValue::String(s) => Ok(s.clone()),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .map_err(|e| invalid("YAML", path, e.to_string())),
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", path, key)
    }
}

fn invalid(format: &'static str, path: &str, message: String) -> SourceError {
    SourceError::InvalidDocument {
        format,
        path: path.to_string(),
        message,
    }
}
