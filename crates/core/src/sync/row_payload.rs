//! Backend-neutral half of statement building.
//!
//! A [`RowPayload`] is a validated operation reduced to what a dialect needs to
//! render SQL: the table, the ordered column list, and the JSON document that is
//! bound as the statement's single parameter. Values never enter SQL text; the
//! store coerces the JSON into the destination row type itself.

use serde_json::Value;

use crate::errors::ValidationError;

use super::identifiers::{
    quote_identifier, quote_table_name, validate_identifier, validate_table_name, ID_COLUMN,
};
use super::operation_model::{FieldMap, OperationKind};

#[derive(Debug, Clone, PartialEq)]
pub struct RowPayload {
    table: String,
    columns: Vec<String>,
    payload: String,
}

impl RowPayload {
    /// Full row for an upsert. `id` is forced into the map.
    pub fn for_put(table: &str, id: &str, fields: &FieldMap) -> Result<Self, ValidationError> {
        Self::check_target(table, id)?;
        if fields.is_empty() {
            return Err(ValidationError::MissingFields(OperationKind::Put));
        }
        Self::from_fields(table, id, fields)
    }

    /// Partial row for an update; at least one non-id column is required.
    pub fn for_patch(table: &str, id: &str, fields: &FieldMap) -> Result<Self, ValidationError> {
        Self::check_target(table, id)?;
        if fields.is_empty() {
            return Err(ValidationError::MissingFields(OperationKind::Patch));
        }
        let row = Self::from_fields(table, id, fields)?;
        if row.update_columns().next().is_none() {
            return Err(ValidationError::NoUpdatableColumns {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(row)
    }

    /// Key-only row used to address a delete.
    pub fn for_delete(table: &str, id: &str) -> Result<Self, ValidationError> {
        Self::check_target(table, id)?;
        Self::from_fields(table, id, &FieldMap::new())
    }

    fn check_target(table: &str, id: &str) -> Result<(), ValidationError> {
        validate_table_name(table)?;
        if id.is_empty() {
            return Err(ValidationError::MissingId);
        }
        Ok(())
    }

    fn from_fields(table: &str, id: &str, fields: &FieldMap) -> Result<Self, ValidationError> {
        let mut row = fields.clone();
        row.insert(ID_COLUMN.to_string(), Value::String(id.to_string()));
        for column in row.keys() {
            validate_identifier(column)?;
        }
        let columns = row.keys().cloned().collect();
        Ok(Self {
            table: table.to_string(),
            columns,
            payload: Value::Object(row).to_string(),
        })
    }

    pub fn quoted_table(&self) -> String {
        quote_table_name(&self.table)
    }

    /// Every populated column, `id` included.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Populated columns other than `id`.
    pub fn update_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|column| *column != ID_COLUMN)
    }

    pub fn quoted_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| quote_identifier(c)).collect()
    }

    /// JSON object bound as the statement parameter.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn into_payload(self) -> String {
        self.payload
    }
}
