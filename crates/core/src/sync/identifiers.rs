//! SQL identifier rules for caller-named tables and columns.
//!
//! Table and column names arrive as data, so they are checked against the unquoted
//! identifier grammar shared by PostgreSQL and SQLite and then always emitted quoted.

use std::collections::HashSet;

use crate::errors::ValidationError;

/// Primary-key column every synced table carries.
pub const ID_COLUMN: &str = "id";

/// PostgreSQL truncates identifiers beyond `NAMEDATALEN - 1` bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

fn invalid(identifier: &str, reason: &'static str) -> ValidationError {
    ValidationError::InvalidIdentifier {
        identifier: identifier.to_string(),
        reason,
    }
}

/// Check a single column or relation name.
pub fn validate_identifier(identifier: &str) -> Result<(), ValidationError> {
    let mut chars = identifier.chars();
    let Some(first) = chars.next() else {
        return Err(invalid(identifier, "identifier is empty"));
    };
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid(identifier, "identifier is longer than 63 bytes"));
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid(
            identifier,
            "identifier must start with a letter or underscore",
        ));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return Err(invalid(
            identifier,
            "identifier may only contain letters, digits, '_' or '$'",
        ));
    }
    Ok(())
}

/// Check a table name, optionally schema-qualified (`schema.table`).
pub fn validate_table_name(table: &str) -> Result<(), ValidationError> {
    if table.is_empty() {
        return Err(ValidationError::MissingTable);
    }
    match table.split_once('.') {
        Some((schema, relation)) => {
            validate_identifier(schema)?;
            validate_identifier(relation)
        }
        None => validate_identifier(table),
    }
}

pub fn quote_identifier(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Quote each part of a possibly schema-qualified table name.
pub fn quote_table_name(table: &str) -> String {
    table
        .split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Optional allow-list of tables that sync writes may touch.
///
/// Identifier validation and quoting always apply; the allow-list narrows the set
/// of reachable relations further when a deployment configures one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablePolicy {
    allowed: Option<HashSet<String>>,
}

impl TablePolicy {
    /// Every well-formed table name is accepted.
    pub fn allow_all() -> Self {
        Self { allowed: None }
    }

    pub fn allow_only<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: Some(tables.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_restricted(&self) -> bool {
        self.allowed.is_some()
    }

    pub fn check(&self, table: &str) -> Result<(), ValidationError> {
        validate_table_name(table)?;
        match &self.allowed {
            Some(allowed) if !allowed.contains(table) => {
                Err(ValidationError::TableNotAllowed(table.to_string()))
            }
            _ => Ok(()),
        }
    }
}
