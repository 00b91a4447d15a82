use super::extract::{self, FileFormat};
use super::model::{NewUploadedFile, UploadedFile};
use crate::db::{self, Pool};
use crate::error_handler::CustomError;
use crate::tables::{infer, DynamicTable};
use crate::AppData;
use actix_multipart::Multipart;
use actix_web::{get, post, web, HttpResponse};
use futures_util::TryStreamExt;
use serde_json::json;
use std::path::Path;

#[post("/api/upload")]
async fn upload(
    pool: web::Data<Pool>,
    app_data: web::Data<AppData>,
    mut payload: Multipart,
) -> Result<HttpResponse, CustomError> {
    log::debug!("POST /api/upload");

    let mut filename: Option<String> = None;
    let mut data: Vec<u8> = Vec::new();
    while let Some(mut field) = payload.try_next().await? {
        if field.name() != "file" {
            continue;
        }
        filename = field
            .content_disposition()
            .get_filename()
            .map(sanitize_filename::sanitize);
        while let Some(chunk) = field.try_next().await? {
            data.extend_from_slice(&chunk);
        }
    }
    let filename = filename
        .filter(|name| !name.is_empty())
        .ok_or_else(|| CustomError::validation("No file part in the request"))?;
    let format = FileFormat::from_path(Path::new(&filename))?;
    log::debug!("Received {} ({} bytes)", filename, data.len());

    let upload_dir = app_data.upload_dir.clone();
    let pool = pool.clone();
    let table_name =
        web::block(move || save_and_ingest(&pool, &upload_dir, &filename, &data, format))
            .await??;

    Ok(HttpResponse::Created().json(json!({
        "message": "File uploaded and data inserted successfully",
        "table_name": table_name,
    })))
}

/// The upload pipeline: persist the file, extract records, infer the
/// schema from the first record, create the table if absent, bulk-insert,
/// and remember the upload. Table creation and row insertion are separate
/// transactions; a failed insert can leave an empty table behind.
fn save_and_ingest(
    pool: &Pool,
    upload_dir: &Path,
    filename: &str,
    data: &[u8],
    format: FileFormat,
) -> Result<String, CustomError> {
    std::fs::create_dir_all(upload_dir)?;
    let file_path = upload_dir.join(filename);
    std::fs::write(&file_path, data)?;
    log::debug!("Saved upload at {}", file_path.display());

    let records = extract::extract_records(&file_path, format)?;
    if records.is_empty() {
        return Err(CustomError::validation("No data extracted from the file"));
    }
    let schema = infer::infer_schema(&records[0]);
    let stem = file_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("dynamic_table");
    let table = DynamicTable::new(stem);

    let mut conn = db::connection(pool)?;
    table.ensure(&mut conn, &schema)?;
    let inserted = table.insert_records(&mut conn, &schema, &records)?;
    UploadedFile::create(
        &mut conn,
        NewUploadedFile {
            filename: filename.to_string(),
            table_name: table.name().to_string(),
        },
    )?;
    log::info!(
        "Upload {} -> table {} ({} rows)",
        filename,
        table.name(),
        inserted
    );
    Ok(table.name().to_string())
}

#[get("/api/files")]
async fn list(pool: web::Data<Pool>) -> Result<HttpResponse, CustomError> {
    log::debug!("GET /api/files");
    let mut conn = db::connection(&pool)?;
    let files: Vec<_> = UploadedFile::list(&mut conn)?
        .into_iter()
        .map(|file| {
            json!({
                "filename": file.filename,
                "table_name": file.table_name,
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(json!({ "files": files })))
}

pub fn init_routes(config: &mut web::ServiceConfig) {
    config.service(upload);
    config.service(list);
}
