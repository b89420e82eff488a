//! Tabular listing results
//!
//! Folder listings are returned column-wise: each field holds one value
//! per row.

use crate::storage::{FileEntry, StorageRoot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Frame {
    fn with_columns(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            fields: columns
                .iter()
                .map(|c| Field {
                    name: c.to_string(),
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    fn push_row(&mut self, row: Vec<Value>) {
        for (field, value) in self.fields.iter_mut().zip(row) {
            field.values.push(value);
        }
    }

    /// Listing of the storage roots at the namespace top
    pub fn from_roots(roots: &[Arc<StorageRoot>]) -> Self {
        let mut frame = Self::with_columns("root", &["name", "title", "read_only", "builtin"]);
        for root in roots {
            frame.push_row(vec![
                Value::from(root.name()),
                Value::from(root.description()),
                Value::from(root.read_only()),
                Value::from(root.builtin()),
            ]);
        }
        frame
    }

    /// Listing of one folder inside a root
    pub fn from_entries(folder: &str, entries: Vec<FileEntry>) -> Self {
        let mut frame = Self::with_columns(
            folder,
            &["name", "is_folder", "size", "mime_type", "modified"],
        );
        for entry in entries {
            frame.push_row(vec![
                Value::from(entry.name),
                Value::from(entry.is_folder),
                Value::from(entry.size),
                Value::from(entry.mime_type),
                entry
                    .modified
                    .map(|m| Value::from(m.to_rfc3339()))
                    .unwrap_or(Value::Null),
            ]);
        }
        frame
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.fields.first().map_or(0, |f| f.values.len())
    }

    /// String values of a column, skipping non-strings
    pub fn strings(&self, name: &str) -> Vec<String> {
        self.field(name)
            .map(|f| {
                f.values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
