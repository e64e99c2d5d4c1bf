//! Table schema (column layout) sources.
//!
//! The attribute decoder only needs an ordered list of
//! [`ColumnDescriptor`]s. A [`SchemaSource`] provides them by table name;
//! a missing table is a normal condition (the relation may have been
//! dropped), reported as `None`.
//!
//! Schema files are JSON:
//!
//! ```json
//! {
//!   "tables": [
//!     {
//!       "name": "public.accounts",
//!       "columns": [
//!         { "name": "id", "type": "int4" },
//!         { "name": "owner", "type": "text" },
//!         { "name": "blob", "length": { "fixed": 12 }, "align": 4 }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! A column needs either a known `type` or explicit `length` and `align`;
//! explicit fields override what the type implies.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::heap::attribute::{Alignment, ColumnDescriptor, ColumnLength};
use crate::PduError;

/// Resolves a table name to its ordered column layout.
pub trait SchemaSource {
    fn resolve_columns(&self, table: &str) -> Option<Vec<ColumnDescriptor>>;

    /// Names of all tables this source knows.
    fn tables(&self) -> Vec<String>;
}

/// Map a type name (or common alias) to its canonical short name.
///
/// Type modifiers such as `varchar(32)` are ignored.
pub fn canonical_type(type_name: &str) -> Option<&'static str> {
    let lowered = type_name.trim().to_ascii_lowercase();
    let base = lowered.split('(').next().unwrap_or("").trim();
    let canonical = match base {
        "bool" | "boolean" => "bool",
        "char" | "\"char\"" => "char",
        "int2" | "smallint" => "int2",
        "int4" | "integer" | "int" => "int4",
        "int8" | "bigint" => "int8",
        "oid" => "oid",
        "xid" => "xid",
        "float4" | "real" => "float4",
        "float8" | "double precision" => "float8",
        "name" => "name",
        "text" => "text",
        "varchar" | "character varying" => "varchar",
        "bpchar" | "character" => "bpchar",
        "bytea" => "bytea",
        "uuid" => "uuid",
        "date" => "date",
        "timestamp" | "timestamp without time zone" => "timestamp",
        "timestamptz" | "timestamp with time zone" => "timestamptz",
        "numeric" | "decimal" => "numeric",
        "json" => "json",
        "jsonb" => "jsonb",
        "cstring" => "cstring",
        _ => return None,
    };
    Some(canonical)
}

impl ColumnDescriptor {
    /// Build a descriptor from a well-known type name.
    ///
    /// Returns None for types whose storage layout is not known.
    pub fn for_type(name: &str, type_name: &str) -> Option<Self> {
        let canonical = canonical_type(type_name)?;
        let desc = match canonical {
            "bool" | "char" => ColumnDescriptor::fixed(name, 1, Alignment::Char, true),
            "int2" => ColumnDescriptor::fixed(name, 2, Alignment::Short, true),
            "int4" | "oid" | "xid" | "float4" | "date" => {
                ColumnDescriptor::fixed(name, 4, Alignment::Int, true)
            }
            "int8" | "float8" | "timestamp" | "timestamptz" => {
                ColumnDescriptor::fixed(name, 8, Alignment::Double, true)
            }
            "name" => ColumnDescriptor::fixed(name, 64, Alignment::Char, false),
            "uuid" => ColumnDescriptor::fixed(name, 16, Alignment::Char, false),
            "cstring" => ColumnDescriptor::cstring(name),
            _ => ColumnDescriptor::varlena(name, Alignment::Int),
        };
        Some(desc.with_type(canonical))
    }
}

/// In-memory table → columns map.
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    tables: BTreeMap<String, Vec<ColumnDescriptor>>,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: &str, columns: Vec<ColumnDescriptor>) {
        self.tables.insert(table.to_string(), columns);
    }

    pub fn with_table(mut self, table: &str, columns: Vec<ColumnDescriptor>) -> Self {
        self.insert(table, columns);
        self
    }
}

impl SchemaSource for StaticSchema {
    /// Exact name first, then a unique match on the unqualified name
    /// (`accounts` finds `public.accounts`).
    fn resolve_columns(&self, table: &str) -> Option<Vec<ColumnDescriptor>> {
        if let Some(cols) = self.tables.get(table) {
            return Some(cols.clone());
        }
        let mut candidates = self
            .tables
            .iter()
            .filter(|(name, _)| name.rsplit('.').next() == Some(table));
        match (candidates.next(), candidates.next()) {
            (Some((_, cols)), None) => Some(cols.clone()),
            _ => None,
        }
    }

    fn tables(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    tables: Vec<TableEntry>,
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    name: String,
    #[serde(default)]
    columns: Vec<ColumnEntry>,
}

#[derive(Debug, Deserialize)]
struct ColumnEntry {
    name: String,
    #[serde(default, rename = "type")]
    type_name: Option<String>,
    #[serde(default)]
    length: Option<ColumnLength>,
    #[serde(default)]
    align: Option<Alignment>,
    #[serde(default)]
    by_value: Option<bool>,
}

impl ColumnEntry {
    fn into_descriptor(self, table: &str) -> Result<ColumnDescriptor, PduError> {
        let from_type = self
            .type_name
            .as_deref()
            .and_then(|t| ColumnDescriptor::for_type(&self.name, t));

        let mut desc = match (from_type, self.length, self.align) {
            (Some(d), _, _) => d,
            (None, Some(length), Some(align)) => ColumnDescriptor {
                name: self.name.clone(),
                length,
                align,
                by_value: false,
                type_name: self.type_name.clone(),
            },
            (None, _, _) => {
                return Err(PduError::Parse(format!(
                    "{}.{}: unknown type {:?} and no explicit length/align",
                    table, self.name, self.type_name
                )))
            }
        };
        if let Some(length) = self.length {
            desc.length = length;
        }
        if let Some(align) = self.align {
            desc.align = align;
        }
        if let Some(by_value) = self.by_value {
            desc.by_value = by_value;
        }
        Ok(desc)
    }
}

/// Schema loaded from a JSON file.
#[derive(Debug, Clone)]
pub struct SchemaFile {
    inner: StaticSchema,
}

impl SchemaFile {
    /// Read and parse a schema file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PduError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PduError::Io(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Parse a schema document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, PduError> {
        let doc: SchemaDocument = serde_json::from_str(json)
            .map_err(|e| PduError::Parse(format!("Failed to parse schema JSON: {}", e)))?;

        let mut inner = StaticSchema::new();
        for table in doc.tables {
            let columns = table
                .columns
                .into_iter()
                .map(|c| c.into_descriptor(&table.name))
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!(table = %table.name, columns = columns.len(), "schema table loaded");
            inner.insert(&table.name, columns);
        }
        Ok(SchemaFile { inner })
    }
}

impl SchemaSource for SchemaFile {
    fn resolve_columns(&self, table: &str) -> Option<Vec<ColumnDescriptor>> {
        self.inner.resolve_columns(table)
    }

    fn tables(&self) -> Vec<String> {
        self.inner.tables()
    }
}
