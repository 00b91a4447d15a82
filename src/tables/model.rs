use super::ident::{quote_identifier, sanitize_identifier};
use super::infer::{ColumnSpec, ColumnType};
use crate::error_handler::CustomError;
use crate::files::extract::Record;
use diesel::pg::Pg;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{Bool, Json, Nullable, Text};
use diesel::{sql_query, Connection, PgConnection, QueryableByName, RunQueryDsl};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Name of the generated row-identifier column present on every dynamic
/// table. Rows are addressed by it for update/delete.
pub const ID_COLUMN: &str = "UUID";

/// Fixed tables that must never show up in the dynamic table listing.
const RESERVED_TABLES: [&str; 3] = ["users", "uploaded_files", "__diesel_schema_migrations"];

const INSERT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, QueryableByName)]
struct NameRow {
    #[diesel(sql_type = Text)]
    name: String,
}

#[derive(Debug, QueryableByName)]
struct ColumnRow {
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Text)]
    data_type: String,
}

#[derive(Debug, QueryableByName)]
struct ExistsRow {
    #[diesel(sql_type = Bool)]
    present: bool,
}

#[derive(Debug, QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = Nullable<Json>)]
    value: Option<Value>,
}

/// A runtime-defined relation, addressed by its sanitized name. All SQL
/// against it is assembled from quoted sanitized identifiers with values
/// passed as bound parameters.
pub struct DynamicTable {
    name: String,
}

impl DynamicTable {
    pub fn new(raw_name: &str) -> DynamicTable {
        DynamicTable {
            name: sanitize_identifier(raw_name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn quoted(&self) -> String {
        quote_identifier(&self.name)
    }

    /// Live catalog check, never a cached flag.
    pub fn exists(&self, conn: &mut PgConnection) -> Result<bool, CustomError> {
        let row: ExistsRow = sql_query(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_name = $1) AS \"present\"",
        )
        .bind::<Text, _>(self.name.as_str())
        .get_result(conn)?;
        Ok(row.present)
    }

    /// Creates the table with the identifier column plus the inferred
    /// columns when it does not exist yet; no-op otherwise. Creation uses
    /// IF NOT EXISTS so two concurrent uploads racing on the same name
    /// cannot both fail.
    pub fn ensure(
        &self,
        conn: &mut PgConnection,
        columns: &[ColumnSpec],
    ) -> Result<bool, CustomError> {
        if self.exists(conn)? {
            log::debug!("Table {} already exists, keeping its shape", self.name);
            return Ok(false);
        }
        let ddl = build_create_table(&self.name, columns);
        log::info!("Creating table {}", self.name);
        sql_query(ddl).execute(conn)?;
        Ok(true)
    }

    /// Bulk-inserts extracted records, one generated identifier per row,
    /// in bounded chunks inside a single transaction. Values are coerced
    /// to the inferred column type; values that do not fit become NULL and
    /// missing fields become NULL (the pinned upload policy).
    pub fn insert_records(
        &self,
        conn: &mut PgConnection,
        columns: &[ColumnSpec],
        records: &[Record],
    ) -> Result<usize, CustomError> {
        let columns = dedup_columns(columns);
        let mut column_names = vec![ID_COLUMN.to_string()];
        column_names.extend(columns.iter().map(|c| c.name.clone()));

        conn.transaction::<_, CustomError, _>(|conn| {
            let mut inserted = 0;
            for chunk in records.chunks(INSERT_CHUNK_SIZE) {
                let rows: Vec<Vec<BoundValue>> = chunk
                    .iter()
                    .map(|record| {
                        let mut row = vec![BoundValue::Text(Uuid::new_v4().to_string())];
                        for column in &columns {
                            let value = record_value(record, &column.name)
                                .and_then(|v| coerce(v, column.column_type))
                                .unwrap_or(BoundValue::Null);
                            row.push(value);
                        }
                        row
                    })
                    .collect();
                let statement = build_insert(&self.name, &column_names, &rows);
                inserted += execute(conn, statement)?;
            }
            log::debug!("Inserted {} rows into {}", inserted, self.name);
            Ok(inserted)
        })
    }

    /// Lists dynamic tables from the catalog, excluding the fixed ones.
    pub fn list(conn: &mut PgConnection) -> Result<Vec<String>, CustomError> {
        let rows: Vec<NameRow> = sql_query(
            "SELECT table_name::text AS \"name\" FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
        )
        .load(conn)?;
        Ok(rows
            .into_iter()
            .map(|row| row.name)
            .filter(|name| !RESERVED_TABLES.contains(&name.as_str()))
            .collect())
    }

    /// Column names and types in ordinal order, from a live catalog read.
    /// Errors with not-found when the table does not exist.
    pub fn columns(&self, conn: &mut PgConnection) -> Result<Vec<ColumnInfo>, CustomError> {
        let rows: Vec<ColumnRow> = sql_query(
            "SELECT column_name::text AS \"name\", data_type::text AS \"data_type\" \
             FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind::<Text, _>(self.name.as_str())
        .load(conn)?;
        if rows.is_empty() {
            return Err(CustomError::not_found(format!(
                "Table {} does not exist",
                self.name
            )));
        }
        Ok(rows
            .into_iter()
            .map(|row| ColumnInfo {
                column_type: column_type_from_pg(&row.data_type),
                name: row.name,
            })
            .collect())
    }

    pub fn column_names(&self, conn: &mut PgConnection) -> Result<Vec<String>, CustomError> {
        Ok(self.columns(conn)?.into_iter().map(|c| c.name).collect())
    }

    /// Full-table read as JSON objects, one per row, in column order.
    pub fn read_all(&self, conn: &mut PgConnection) -> Result<Vec<Value>, CustomError> {
        self.columns(conn)?;
        let rows: Vec<JsonRow> = sql_query(format!(
            "SELECT row_to_json(t) AS \"value\" FROM {} t",
            self.quoted()
        ))
        .load(conn)?;
        Ok(rows
            .into_iter()
            .map(|row| row.value.unwrap_or(Value::Null))
            .collect())
    }

    /// Single-column read; empty table yields an empty list, a missing
    /// column is not-found.
    pub fn read_column(
        &self,
        conn: &mut PgConnection,
        raw_column: &str,
    ) -> Result<Vec<Value>, CustomError> {
        let column = sanitize_identifier(raw_column);
        let columns = self.columns(conn)?;
        if !columns.iter().any(|c| c.name == column) {
            return Err(CustomError::not_found(format!(
                "Column {} does not exist in table {}",
                column, self.name
            )));
        }
        let rows: Vec<JsonRow> = sql_query(format!(
            "SELECT to_json({}) AS \"value\" FROM {}",
            quote_identifier(&column),
            self.quoted()
        ))
        .load(conn)?;
        Ok(rows
            .into_iter()
            .map(|row| row.value.unwrap_or(Value::Null))
            .collect())
    }

    /// Updates one row by identifier. Unknown columns and values that do
    /// not fit the column type are validation errors (the strict API
    /// policy); zero affected rows is not-found.
    pub fn update_row(
        &self,
        conn: &mut PgConnection,
        row_id: &str,
        updates: &Map<String, Value>,
    ) -> Result<(), CustomError> {
        if updates.is_empty() {
            return Err(CustomError::validation("No updates provided"));
        }
        let columns = self.columns(conn)?;
        let mut assignments = Vec::with_capacity(updates.len());
        for (field, value) in updates {
            let name = sanitize_identifier(field);
            if name == ID_COLUMN {
                return Err(CustomError::validation(
                    "The row identifier column cannot be updated",
                ));
            }
            let column = columns
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| unknown_column(&name, &self.name))?;
            let bound = coerce(value, column.column_type)
                .ok_or_else(|| bad_value(&name, column.column_type))?;
            assignments.push((name, bound));
        }
        let statement = build_update(&self.name, &assignments, row_id);
        conn.transaction::<_, CustomError, _>(|conn| {
            let affected = execute(conn, statement)?;
            if affected == 0 {
                return Err(row_not_found(row_id, &self.name));
            }
            Ok(())
        })
    }

    pub fn delete_row(&self, conn: &mut PgConnection, row_id: &str) -> Result<(), CustomError> {
        let statement = build_delete(&self.name, row_id);
        conn.transaction::<_, CustomError, _>(|conn| {
            let affected = execute(conn, statement)?;
            if affected == 0 {
                return Err(row_not_found(row_id, &self.name));
            }
            Ok(())
        })
    }

    /// Inserts one row from a JSON object, returning the generated
    /// identifier. Columns absent from the payload are left NULL; unknown
    /// columns and ill-typed values are rejected.
    pub fn add_row(
        &self,
        conn: &mut PgConnection,
        row_data: &Map<String, Value>,
    ) -> Result<String, CustomError> {
        if row_data.is_empty() {
            return Err(CustomError::validation("No row data provided"));
        }
        let columns = self.columns(conn)?;
        let row_id = Uuid::new_v4().to_string();
        let mut column_names = vec![ID_COLUMN.to_string()];
        let mut row = vec![BoundValue::Text(row_id.clone())];
        for (field, value) in row_data {
            let name = sanitize_identifier(field);
            if name == ID_COLUMN {
                return Err(CustomError::validation(
                    "The row identifier column is generated and cannot be supplied",
                ));
            }
            let column = columns
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| unknown_column(&name, &self.name))?;
            let bound = coerce(value, column.column_type)
                .ok_or_else(|| bad_value(&name, column.column_type))?;
            column_names.push(name);
            row.push(bound);
        }
        let statement = build_insert(&self.name, &column_names, &[row]);
        conn.transaction::<_, CustomError, _>(|conn| {
            execute(conn, statement)?;
            Ok(row_id)
        })
    }

    /// Adds a column of the given type, returning the sanitized name.
    pub fn add_column(
        &self,
        conn: &mut PgConnection,
        raw_column: &str,
        column_type: ColumnType,
    ) -> Result<String, CustomError> {
        let column = sanitize_identifier(raw_column);
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            self.quoted(),
            quote_identifier(&column),
            column_type.sql_type()
        );
        conn.transaction::<_, CustomError, _>(|conn| {
            sql_query(sql).execute(conn)?;
            Ok(column)
        })
    }

    pub fn delete_column(
        &self,
        conn: &mut PgConnection,
        raw_column: &str,
    ) -> Result<(), CustomError> {
        let column = sanitize_identifier(raw_column);
        if column == ID_COLUMN {
            return Err(CustomError::validation(
                "The row identifier column cannot be dropped",
            ));
        }
        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quoted(),
            quote_identifier(&column)
        );
        conn.transaction::<_, CustomError, _>(|conn| {
            sql_query(sql).execute(conn)?;
            Ok(())
        })
    }

    pub fn rename_column(
        &self,
        conn: &mut PgConnection,
        raw_old: &str,
        raw_new: &str,
    ) -> Result<String, CustomError> {
        let old = sanitize_identifier(raw_old);
        let new = sanitize_identifier(raw_new);
        if old == ID_COLUMN {
            return Err(CustomError::validation(
                "The row identifier column cannot be renamed",
            ));
        }
        let sql = format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quoted(),
            quote_identifier(&old),
            quote_identifier(&new)
        );
        conn.transaction::<_, CustomError, _>(|conn| {
            sql_query(sql).execute(conn)?;
            Ok(new)
        })
    }
}

fn unknown_column(column: &str, table: &str) -> CustomError {
    CustomError::validation(format!(
        "Column {} does not exist in table {}",
        column, table
    ))
}

fn bad_value(column: &str, column_type: ColumnType) -> CustomError {
    CustomError::validation(format!(
        "Value for column {} is not a valid {}",
        column,
        column_type.sql_type()
    ))
}

fn row_not_found(row_id: &str, table: &str) -> CustomError {
    CustomError::not_found(format!("No row with identifier {} in {}", row_id, table))
}

/// Looks a sanitized column up in a record whose keys still carry the
/// original field spelling.
fn record_value<'a>(record: &'a Record, column: &str) -> Option<&'a Value> {
    record
        .iter()
        .find(|(field, _)| sanitize_identifier(field) == column)
        .map(|(_, value)| value)
}

/// Coerces a JSON scalar into a bound value of the column's type. Returns
/// None when the value cannot represent the type; null always passes
/// through as NULL.
fn coerce(value: &Value, column_type: ColumnType) -> Option<BoundValue> {
    if value.is_null() {
        return Some(BoundValue::Null);
    }
    match column_type {
        ColumnType::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(BoundValue::Integer),
            Value::String(s) => s.trim().parse::<i64>().ok().map(BoundValue::Integer),
            _ => None,
        },
        ColumnType::Float => match value {
            Value::Number(n) => n.as_f64().map(BoundValue::Float),
            Value::String(s) => s.trim().parse::<f64>().ok().map(BoundValue::Float),
            _ => None,
        },
        ColumnType::Text => match value {
            Value::String(s) => Some(BoundValue::Text(s.clone())),
            Value::Number(n) => Some(BoundValue::Text(n.to_string())),
            Value::Bool(b) => Some(BoundValue::Text(b.to_string())),
            _ => None,
        },
    }
}

fn column_type_from_pg(data_type: &str) -> ColumnType {
    match data_type {
        "integer" | "bigint" | "smallint" => ColumnType::Integer,
        "double precision" | "real" | "numeric" => ColumnType::Float,
        _ => ColumnType::Text,
    }
}

/// Drops inferred columns colliding with the identifier column or with an
/// earlier column (sanitization can map distinct field names to the same
/// identifier).
fn dedup_columns(columns: &[ColumnSpec]) -> Vec<ColumnSpec> {
    let mut seen = vec![ID_COLUMN.to_string()];
    let mut out = Vec::with_capacity(columns.len());
    for column in columns {
        if seen.contains(&column.name) {
            log::warn!("Dropping duplicate inferred column {}", column.name);
            continue;
        }
        seen.push(column.name.clone());
        out.push(column.clone());
    }
    out
}

/// A SQL statement plus its bound values, in placeholder order. NULLs are
/// rendered as literals because a bare null parameter carries no type for
/// the server to cast.
#[derive(Debug, PartialEq)]
struct Statement {
    sql: String,
    binds: Vec<BoundValue>,
}

struct Placeholders {
    binds: Vec<BoundValue>,
}

impl Placeholders {
    fn new() -> Placeholders {
        Placeholders { binds: Vec::new() }
    }

    fn push(&mut self, value: BoundValue) -> String {
        match value {
            BoundValue::Null => "NULL".to_string(),
            value => {
                self.binds.push(value);
                format!("${}", self.binds.len())
            }
        }
    }
}

fn build_create_table(table: &str, columns: &[ColumnSpec]) -> String {
    let mut defs = vec![format!(
        "{} VARCHAR(36) NOT NULL",
        quote_identifier(ID_COLUMN)
    )];
    for column in dedup_columns(columns) {
        defs.push(format!(
            "{} {}",
            quote_identifier(&column.name),
            column.column_type.sql_type()
        ));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(table),
        defs.join(", ")
    )
}

fn build_insert(table: &str, column_names: &[String], rows: &[Vec<BoundValue>]) -> Statement {
    let mut placeholders = Placeholders::new();
    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let rendered: Vec<String> = row
                .iter()
                .map(|value| placeholders.push(value.clone()))
                .collect();
            format!("({})", rendered.join(", "))
        })
        .collect();
    let columns: Vec<String> = column_names
        .iter()
        .map(|name| quote_identifier(name))
        .collect();
    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_identifier(table),
            columns.join(", "),
            tuples.join(", ")
        ),
        binds: placeholders.binds,
    }
}

fn build_update(table: &str, assignments: &[(String, BoundValue)], row_id: &str) -> Statement {
    let mut placeholders = Placeholders::new();
    let sets: Vec<String> = assignments
        .iter()
        .map(|(name, value)| {
            format!(
                "{} = {}",
                quote_identifier(name),
                placeholders.push(value.clone())
            )
        })
        .collect();
    let id_placeholder = placeholders.push(BoundValue::Text(row_id.to_string()));
    Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = {}",
            quote_identifier(table),
            sets.join(", "),
            quote_identifier(ID_COLUMN),
            id_placeholder
        ),
        binds: placeholders.binds,
    }
}

fn build_delete(table: &str, row_id: &str) -> Statement {
    let mut placeholders = Placeholders::new();
    let id_placeholder = placeholders.push(BoundValue::Text(row_id.to_string()));
    Statement {
        sql: format!(
            "DELETE FROM {} WHERE {} = {}",
            quote_identifier(table),
            quote_identifier(ID_COLUMN),
            id_placeholder
        ),
        binds: placeholders.binds,
    }
}

fn execute(conn: &mut PgConnection, statement: Statement) -> Result<usize, CustomError> {
    let mut query: BoxedSqlQuery<'static, Pg, SqlQuery> = sql_query(statement.sql).into_boxed();
    for bind in statement.binds {
        query = apply_bind(query, bind);
    }
    Ok(query.execute(conn)?)
}

fn apply_bind(
    query: BoxedSqlQuery<'static, Pg, SqlQuery>,
    bind: BoundValue,
) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
    match bind {
        BoundValue::Text(s) => query.bind::<Text, _>(s),
        BoundValue::Integer(i) => query.bind::<diesel::sql_types::BigInt, _>(i),
        BoundValue::Float(f) => query.bind::<diesel::sql_types::Double, _>(f),
        // never reaches the bind list; rendered as a literal
        BoundValue::Null => query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: &str, column_type: ColumnType) -> ColumnSpec {
        ColumnSpec {
            name: name.into(),
            column_type,
        }
    }

    #[test]
    fn create_table_lists_identifier_column_first() {
        let ddl = build_create_table(
            "PEOPLE",
            &[
                spec("NAME", ColumnType::Text),
                spec("AGE", ColumnType::Integer),
            ],
        );
        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS \"PEOPLE\" (\"UUID\" VARCHAR(36) NOT NULL, \
             \"NAME\" VARCHAR(255), \"AGE\" INTEGER)"
        );
    }

    #[test]
    fn create_table_drops_colliding_columns() {
        let ddl = build_create_table(
            "T",
            &[
                spec("UUID", ColumnType::Text),
                spec("A_B", ColumnType::Text),
                spec("A_B", ColumnType::Integer),
            ],
        );
        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS \"T\" (\"UUID\" VARCHAR(36) NOT NULL, \"A_B\" VARCHAR(255))"
        );
    }

    #[test]
    fn insert_numbers_placeholders_and_renders_null_literal() {
        let statement = build_insert(
            "PEOPLE",
            &["UUID".into(), "NAME".into(), "AGE".into()],
            &[
                vec![
                    BoundValue::Text("id-1".into()),
                    BoundValue::Text("Alice".into()),
                    BoundValue::Integer(30),
                ],
                vec![
                    BoundValue::Text("id-2".into()),
                    BoundValue::Null,
                    BoundValue::Integer(41),
                ],
            ],
        );
        assert_eq!(
            statement.sql,
            "INSERT INTO \"PEOPLE\" (\"UUID\", \"NAME\", \"AGE\") \
             VALUES ($1, $2, $3), ($4, NULL, $5)"
        );
        assert_eq!(statement.binds.len(), 5);
        assert_eq!(statement.binds[4], BoundValue::Integer(41));
    }

    #[test]
    fn update_binds_identifier_last() {
        let statement = build_update(
            "PEOPLE",
            &[
                ("NAME".into(), BoundValue::Text("Bob".into())),
                ("AGE".into(), BoundValue::Null),
            ],
            "id-1",
        );
        assert_eq!(
            statement.sql,
            "UPDATE \"PEOPLE\" SET \"NAME\" = $1, \"AGE\" = NULL WHERE \"UUID\" = $2"
        );
        assert_eq!(statement.binds[1], BoundValue::Text("id-1".into()));
    }

    #[test]
    fn delete_targets_the_identifier_column() {
        let statement = build_delete("PEOPLE", "id-9");
        assert_eq!(
            statement.sql,
            "DELETE FROM \"PEOPLE\" WHERE \"UUID\" = $1"
        );
        assert_eq!(statement.binds, vec![BoundValue::Text("id-9".into())]);
    }

    #[test]
    fn coercion_follows_the_column_type() {
        assert_eq!(
            coerce(&json!("30"), ColumnType::Integer),
            Some(BoundValue::Integer(30))
        );
        assert_eq!(
            coerce(&json!(30.0), ColumnType::Integer),
            Some(BoundValue::Integer(30))
        );
        assert_eq!(coerce(&json!("abc"), ColumnType::Integer), None);
        assert_eq!(
            coerce(&json!("2.5"), ColumnType::Float),
            Some(BoundValue::Float(2.5))
        );
        assert_eq!(
            coerce(&json!(7), ColumnType::Text),
            Some(BoundValue::Text("7".into()))
        );
        assert_eq!(coerce(&Value::Null, ColumnType::Integer), Some(BoundValue::Null));
        assert_eq!(coerce(&json!([1, 2]), ColumnType::Text), None);
    }

    #[test]
    fn pg_catalog_types_round_trip() {
        assert_eq!(column_type_from_pg("integer"), ColumnType::Integer);
        assert_eq!(column_type_from_pg("double precision"), ColumnType::Float);
        assert_eq!(column_type_from_pg("character varying"), ColumnType::Text);
        assert_eq!(column_type_from_pg("timestamp without time zone"), ColumnType::Text);
    }

    #[test]
    fn record_lookup_goes_through_sanitization() {
        let record = match json!({"first name": "Ada", "Age": 36}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(record_value(&record, "FIRST_NAME"), Some(&json!("Ada")));
        assert_eq!(record_value(&record, "AGE"), Some(&json!(36)));
        assert_eq!(record_value(&record, "MISSING"), None);
    }
}
