//! Row-level write operations uploaded by client devices.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Error, Result, ValidationError};

use super::identifiers::{validate_identifier, TablePolicy, ID_COLUMN};

/// Column name to dynamically typed value, in upload order.
pub type FieldMap = serde_json::Map<String, Value>;

/// Supported row mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum OperationKind {
    /// Insert the row, replacing the named columns when the id already exists.
    Put,
    /// Update only the named columns of an existing row.
    Patch,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ValidationError::UnknownKind(value.to_string())),
        }
    }
}

impl TryFrom<String> for OperationKind {
    type Error = ValidationError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Operation as it appears in an upload payload, before the kind is checked.
#[derive(Debug, Clone, Deserialize)]
pub struct WireOperation {
    pub op: String,
    #[serde(default, alias = "type")]
    pub table: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "data")]
    pub fields: Option<FieldMap>,
}

/// One row mutation against a caller-named table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireOperation")]
pub struct Operation {
    #[serde(rename = "op")]
    pub kind: OperationKind,
    pub table: String,
    pub id: String,
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldMap>,
}

impl TryFrom<WireOperation> for Operation {
    type Error = ValidationError;

    fn try_from(wire: WireOperation) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            kind: wire.op.parse()?,
            table: wire.table,
            id: wire.id,
            fields: wire.fields,
        })
    }
}

impl Operation {
    pub fn put(table: impl Into<String>, id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            kind: OperationKind::Put,
            table: table.into(),
            id: id.into(),
            fields: Some(fields),
        }
    }

    pub fn patch(table: impl Into<String>, id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            kind: OperationKind::Patch,
            table: table.into(),
            id: id.into(),
            fields: Some(fields),
        }
    }

    pub fn delete(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Delete,
            table: table.into(),
            id: id.into(),
            fields: None,
        }
    }

    /// Check everything the statement builder will require, plus the table policy.
    pub fn validate(&self, policy: &TablePolicy) -> std::result::Result<(), ValidationError> {
        if self.table.is_empty() {
            return Err(ValidationError::MissingTable);
        }
        policy.check(&self.table)?;
        if self.id.is_empty() {
            return Err(ValidationError::MissingId);
        }

        match self.kind {
            OperationKind::Delete => Ok(()),
            OperationKind::Put | OperationKind::Patch => {
                let fields = self
                    .fields
                    .as_ref()
                    .filter(|fields| !fields.is_empty())
                    .ok_or(ValidationError::MissingFields(self.kind))?;
                for column in fields.keys() {
                    validate_identifier(column)?;
                }
                if self.kind == OperationKind::Patch
                    && !fields.keys().any(|column| column != ID_COLUMN)
                {
                    return Err(ValidationError::NoUpdatableColumns {
                        table: self.table.clone(),
                        id: self.id.clone(),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Ordered, non-empty list of operations applied in one transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Batch {
    operations: Vec<Operation>,
}

impl Batch {
    pub fn new(operations: Vec<Operation>) -> Result<Self> {
        if operations.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        Ok(Self { operations })
    }

    /// Decode an upload payload (a JSON array of operations).
    ///
    /// Unknown kinds are reported as [`ValidationError::UnknownKind`] with the
    /// position of the offending entry.
    pub fn from_json(payload: Value) -> Result<Self> {
        let entries: Vec<WireOperation> = serde_json::from_value(payload)?;
        let operations = entries
            .into_iter()
            .enumerate()
            .map(|(index, wire)| {
                let table = wire.table.clone();
                let id = wire.id.clone();
                Operation::try_from(wire)
                    .map_err(|err| Error::from(err).in_operation(index, &table, &id))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(operations)
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    /// Validate every operation before a connection is checked out.
    pub fn validate(&self, policy: &TablePolicy) -> Result<()> {
        for (index, operation) in self.operations.iter().enumerate() {
            operation.validate(policy).map_err(|err| {
                Error::from(err).in_operation(index, &operation.table, &operation.id)
            })?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

impl TryFrom<Vec<Operation>> for Batch {
    type Error = Error;

    fn try_from(operations: Vec<Operation>) -> Result<Self> {
        Self::new(operations)
    }
}
