use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A single value in a tabular frame.
///
/// CSV sources carry no type information, so cells are inferred from text:
/// integers first, then floats, then booleans, with everything else kept as
/// a string. Empty fields become `Null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Cell {
    /// Infer a cell from raw CSV text.
    pub fn parse(text: &str) -> Cell {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Cell::Float(f);
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Cell::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Cell::Bool(false);
        }
        Cell::Str(trimmed.to_string())
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Cell::Null => JsonValue::Null,
            Cell::Bool(b) => JsonValue::Bool(*b),
            Cell::Int(i) => JsonValue::from(*i),
            Cell::Float(f) => JsonValue::from(*f),
            Cell::Str(s) => JsonValue::String(s.clone()),
        }
    }

    /// Canonical key representation used when grouping rows by join key.
    ///
    /// Type-tagged so `Int(1)` and `Str("1")` never collide.
    pub fn key_repr(&self) -> String {
        match self {
            Cell::Null => "n:".to_string(),
            Cell::Bool(b) => format!("b:{}", b),
            Cell::Int(i) => format!("i:{}", i),
            Cell::Float(f) => format!("f:{}", f),
            Cell::Str(s) => format!("s:{}", s),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

/// In-memory tabular result of a node computation: named columns plus rows
/// of cells. Every row has exactly one cell per column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row. The caller guarantees arity; this is the hot path of
    /// every node compute, so the check is a debug assertion only.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// First `limit` rows as JSON objects keyed by column name.
    pub fn head(&self, limit: usize) -> Vec<Map<String, JsonValue>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(col, cell)| (col.clone(), cell.to_json()))
                    .collect()
            })
            .collect()
    }
}
