use crate::error_handler::CustomError;
use crate::schema::uploaded_files;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per successful upload, pointing at the dynamic table the file
/// was materialized into.
#[derive(Debug, Clone, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = uploaded_files)]
pub struct UploadedFile {
    pub id: i32,
    pub filename: String,
    pub table_name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Insertable)]
#[diesel(table_name = uploaded_files)]
pub struct NewUploadedFile {
    pub filename: String,
    pub table_name: String,
}

impl UploadedFile {
    pub fn list(conn: &mut PgConnection) -> Result<Vec<UploadedFile>, CustomError> {
        let files = uploaded_files::table
            .order(uploaded_files::id.asc())
            .load(conn)?;
        Ok(files)
    }

    pub fn create(
        conn: &mut PgConnection,
        new_file: NewUploadedFile,
    ) -> Result<UploadedFile, CustomError> {
        let file = diesel::insert_into(uploaded_files::table)
            .values(new_file)
            .get_result(conn)?;
        Ok(file)
    }
}
