//! Operation to SQL rendering for SQLite.
//!
//! The payload is bound once as `?1` and each populated column is pulled out
//! with `json_extract`. Column affinity on the destination table converts the
//! extracted values when the row is stored.

use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;

use syncpush_core::errors::Result;
use syncpush_core::sync::{
    quote_identifier, FieldMap, Operation, OperationKind, RowPayload, ID_COLUMN,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    payload: String,
}

impl Statement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn execute(self, conn: &mut SqliteConnection) -> QueryResult<usize> {
        diesel::sql_query(self.sql)
            .bind::<Text, _>(self.payload)
            .execute(conn)
    }
}

fn data_row_cte(row: &RowPayload) -> String {
    let selections = row
        .columns()
        .iter()
        .map(|column| {
            format!(
                "json_extract(?1, '$.\"{column}\"') AS {}",
                quote_identifier(column)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("WITH data_row AS (SELECT {selections})")
}

pub fn build_put(table: &str, id: &str, fields: &FieldMap) -> Result<Statement> {
    let row = RowPayload::for_put(table, id, fields)?;
    let columns = row.quoted_columns().join(", ");
    let updates = row
        .update_columns()
        .map(|column| {
            let quoted = quote_identifier(column);
            format!("{quoted} = excluded.{quoted}")
        })
        .collect::<Vec<_>>();
    let on_conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    // `WHERE true` keeps the parser from reading ON CONFLICT as a join clause.
    let sql = format!(
        "{} INSERT INTO {} ({columns}) SELECT {columns} FROM data_row WHERE true \
         ON CONFLICT ({}) {on_conflict}",
        data_row_cte(&row),
        row.quoted_table(),
        quote_identifier(ID_COLUMN),
    );
    Ok(Statement {
        sql,
        payload: row.into_payload(),
    })
}

pub fn build_patch(table: &str, id: &str, fields: &FieldMap) -> Result<Statement> {
    let row = RowPayload::for_patch(table, id, fields)?;
    let id_column = quote_identifier(ID_COLUMN);
    let assignments = row
        .update_columns()
        .map(|column| {
            let quoted = quote_identifier(column);
            format!("{quoted} = data_row.{quoted}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "{} UPDATE {table} SET {assignments} FROM data_row \
         WHERE {table}.{id_column} = data_row.{id_column}",
        data_row_cte(&row),
        table = row.quoted_table(),
    );
    Ok(Statement {
        sql,
        payload: row.into_payload(),
    })
}

pub fn build_delete(table: &str, id: &str) -> Result<Statement> {
    let row = RowPayload::for_delete(table, id)?;
    let id_column = quote_identifier(ID_COLUMN);
    let sql = format!(
        "{} DELETE FROM {} WHERE {id_column} = (SELECT {id_column} FROM data_row)",
        data_row_cte(&row),
        row.quoted_table(),
    );
    Ok(Statement {
        sql,
        payload: row.into_payload(),
    })
}

pub fn build_statement(operation: &Operation) -> Result<Statement> {
    let empty = FieldMap::new();
    let fields = operation.fields.as_ref().unwrap_or(&empty);
    match operation.kind {
        OperationKind::Put => build_put(&operation.table, &operation.id, fields),
        OperationKind::Patch => build_patch(&operation.table, &operation.id, fields),
        OperationKind::Delete => build_delete(&operation.table, &operation.id),
    }
}
