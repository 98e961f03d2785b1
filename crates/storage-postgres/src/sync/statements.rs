//! Operation to SQL rendering for PostgreSQL.
//!
//! Every statement starts from the same CTE:
//!
//! ```sql
//! WITH data_row AS (SELECT (json_populate_record(NULL::"todos", $1::json)).*)
//! ```
//!
//! `json_populate_record` builds a value of the table's own row type from the JSON
//! payload, so each field is coerced to the destination column's declared type by
//! the server. No schema is cached on this side.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::Text;

use syncpush_core::errors::Result;
use syncpush_core::sync::{
    quote_identifier, FieldMap, Operation, OperationKind, RowPayload, ID_COLUMN,
};

/// A rendered statement and the JSON document bound as `$1`.
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

    /// Run the statement, returning the number of affected rows.
    pub fn execute(self, conn: &mut PgConnection) -> QueryResult<usize> {
        diesel::sql_query(self.sql)
            .bind::<Text, _>(self.payload)
            .execute(conn)
    }
}

fn data_row_cte(row: &RowPayload) -> String {
    format!(
        "WITH data_row AS (SELECT (json_populate_record(NULL::{}, $1::json)).*)",
        row.quoted_table()
    )
}

fn row_match(row: &RowPayload) -> String {
    let id = quote_identifier(ID_COLUMN);
    format!("{}.{id} = data_row.{id}", row.quoted_table())
}

/// Upsert keyed by `id`; named non-id columns are overwritten on conflict.
pub fn build_put(table: &str, id: &str, fields: &FieldMap) -> Result<Statement> {
    let row = RowPayload::for_put(table, id, fields)?;
    let columns = row.quoted_columns().join(", ");
    let updates = row
        .update_columns()
        .map(|column| {
            let quoted = quote_identifier(column);
            format!("{quoted} = EXCLUDED.{quoted}")
        })
        .collect::<Vec<_>>();
    let on_conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    let sql = format!(
        "{} INSERT INTO {} ({columns}) SELECT {columns} FROM data_row \
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

/// Update only the named columns of the row matching `id`.
pub fn build_patch(table: &str, id: &str, fields: &FieldMap) -> Result<Statement> {
    let row = RowPayload::for_patch(table, id, fields)?;
    let assignments = row
        .update_columns()
        .map(|column| {
            let quoted = quote_identifier(column);
            format!("{quoted} = data_row.{quoted}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "{} UPDATE {} SET {assignments} FROM data_row WHERE {}",
        data_row_cte(&row),
        row.quoted_table(),
        row_match(&row),
    );
    Ok(Statement {
        sql,
        payload: row.into_payload(),
    })
}

pub fn build_delete(table: &str, id: &str) -> Result<Statement> {
    let row = RowPayload::for_delete(table, id)?;
    let sql = format!(
        "{} DELETE FROM {} USING data_row WHERE {}",
        data_row_cte(&row),
        row.quoted_table(),
        row_match(&row),
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
