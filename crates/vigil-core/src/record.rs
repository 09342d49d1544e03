//! Record files: a YAML header block plus a free-text body
//!
//! Every job and task is one record file. The header is delimited by `---`
//! lines; a file with no header block is valid and has an empty field set.
//! Writes go through a temp-file-then-rename so a crash never leaves a
//! half-written record, and field updates are read-merge-write over the full
//! current header so unrecognized fields survive.

use chrono::{DateTime, Utc};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// One parsed record: header fields and body text.
#[derive(Debug, Clone, Default)]
pub struct Record {
    /// Header fields, in file order
    pub fields: Mapping,
    /// Body text, untouched by field updates
    pub body: String,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a record from text. Absent or unterminated header delimiters
    /// mean the whole text is body.
    pub fn parse(text: &str) -> Result<Self> {
        let Some(rest) = text.strip_prefix("---") else {
            return Ok(Self {
                fields: Mapping::new(),
                body: text.to_string(),
            });
        };

        let Some(end) = rest.find("\n---") else {
            return Ok(Self {
                fields: Mapping::new(),
                body: text.to_string(),
            });
        };

        let header = rest[..end].trim();
        let fields = if header.is_empty() {
            Mapping::new()
        } else {
            serde_yaml::from_str(header)?
        };
        let body = rest[end + 4..].trim_start_matches('\n').to_string();

        Ok(Self { fields, body })
    }

    /// Serialize header then body. An empty field set renders as body only.
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        if !self.fields.is_empty() {
            out.push_str("---\n");
            out.push_str(&serde_yaml::to_string(&self.fields)?);
            out.push_str("---\n");
        }
        out.push_str(&self.body);
        Ok(out)
    }

    /// Load a record from disk.
    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Write the record to disk atomically (temp file + rename).
    pub fn store(&self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "record".to_string());
        let tmp = path.with_file_name(format!(".{name}.tmp"));
        fs::write(&tmp, self.render()?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Set a header field.
    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(Value::String(key.to_string()), value);
    }
}

/// Read-merge-write: update header fields of the record at `path` without
/// touching the body or any other field.
pub fn update_fields(path: &Path, updates: Mapping) -> Result<()> {
    let mut record = Record::load(path)?;
    for (key, value) in updates {
        record.fields.insert(key, value);
    }
    record.store(path)
}

/// Format a timestamp the way record headers carry them.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

// Typed field extraction. Each helper removes the key from the mapping so
// whatever is left over becomes the record's extras; a value of the wrong
// shape is put back rather than dropped.

pub(crate) fn take_string(fields: &mut Mapping, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(s) => Some(s),
        other => {
            fields.insert(Value::String(key.to_string()), other);
            None
        }
    }
}

pub(crate) fn take_bool(fields: &mut Mapping, key: &str) -> Option<bool> {
    match fields.remove(key)? {
        Value::Bool(b) => Some(b),
        other => {
            fields.insert(Value::String(key.to_string()), other);
            None
        }
    }
}

pub(crate) fn take_i64(fields: &mut Mapping, key: &str) -> Option<i64> {
    match fields.remove(key)? {
        Value::Number(n) => n.as_i64(),
        other => {
            fields.insert(Value::String(key.to_string()), other);
            None
        }
    }
}

pub(crate) fn take_f64(fields: &mut Mapping, key: &str) -> Option<f64> {
    match fields.remove(key)? {
        Value::Number(n) => n.as_f64(),
        other => {
            fields.insert(Value::String(key.to_string()), other);
            None
        }
    }
}

pub(crate) fn take_timestamp(fields: &mut Mapping, key: &str) -> Option<DateTime<Utc>> {
    let raw = take_string(fields, key)?;
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(_) => {
            fields.insert(Value::String(key.to_string()), Value::String(raw));
            None
        }
    }
}

/// `watch` accepts a single path or a list of paths.
pub(crate) fn take_string_list(fields: &mut Mapping, key: &str) -> Vec<String> {
    match fields.remove(key) {
        Some(Value::String(s)) => vec![s],
        Some(Value::Sequence(seq)) => seq
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Some(other) => {
            fields.insert(Value::String(key.to_string()), other);
            Vec::new()
        }
        None => Vec::new(),
    }
}
