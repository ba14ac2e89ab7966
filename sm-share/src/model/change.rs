use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Tables that emit change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Messages,
    Friends,
    FriendRequests,
}

impl Table {
    pub const ALL: [Table; 4] = [Table::Profiles, Table::Messages, Table::Friends, Table::FriendRequests];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::Messages => "messages",
            Self::Friends => "friends",
            Self::FriendRequests => "friend_requests",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown table: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single row change. `record` carries the new row, or the old one for deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record: Map<String, Value>,
    pub at: i64,
}

impl ChangeEvent {
    /// Builds an event from any serializable row. Rows that do not serialize to a JSON object
    /// produce an empty record.
    pub fn from_row<T: Serialize>(table: Table, kind: ChangeKind, row: &T) -> Self {
        let record = match serde_json::to_value(row) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self { table, kind, record, at: crate::utils::now_timestamp() }
    }

    pub fn matches(&self, table: Table, filter: Option<&RowFilter>) -> bool {
        self.table == table && filter.is_none_or(|f| f.matches(&self.record))
    }
}

/// Equality filter on one column, written `column=eq.value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self { column: column.into(), value: value.into() }
    }

    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        match record.get(&self.column) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

impl FromStr for RowFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (column, rest) = s.split_once('=').ok_or_else(|| format!("invalid filter: {s}"))?;
        let value = rest.strip_prefix("eq.").ok_or_else(|| format!("unsupported filter operator: {s}"))?;
        if column.is_empty() || value.is_empty() {
            return Err(format!("invalid filter: {s}"));
        }
        Ok(Self::eq(column, value))
    }
}
