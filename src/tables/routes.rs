use super::infer::ColumnType;
use super::DynamicTable;
use crate::db::{self, Pool};
use crate::error_handler::CustomError;
use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize)]
pub struct TableQuery {
    pub table_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ColumnQuery {
    pub table_name: String,
    pub column_name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTableRequest {
    pub table_name: String,
    #[serde(rename = "UUID")]
    pub row_id: String,
    pub updates: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRowRequest {
    pub table_name: String,
    #[serde(rename = "UUID")]
    pub row_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AddRowRequest {
    pub table_name: String,
    pub row_data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct AddColumnRequest {
    pub table_name: String,
    pub column_name: String,
    pub column_type: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteColumnRequest {
    pub table_name: String,
    pub column_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameColumnRequest {
    pub table_name: String,
    pub old_column_name: String,
    pub new_column_name: String,
}

#[get("/api/get_table_names")]
async fn get_table_names(pool: web::Data<Pool>) -> Result<HttpResponse, CustomError> {
    log::debug!("GET /api/get_table_names");
    let mut conn = db::connection(&pool)?;
    let tables = DynamicTable::list(&mut conn)?;
    Ok(HttpResponse::Ok().json(json!({ "tables": tables })))
}

#[get("/api/get_column_names")]
async fn get_column_names(
    pool: web::Data<Pool>,
    query: web::Query<TableQuery>,
) -> Result<HttpResponse, CustomError> {
    log::debug!("GET /api/get_column_names?table_name={}", query.table_name);
    let mut conn = db::connection(&pool)?;
    let columns = DynamicTable::new(&query.table_name).column_names(&mut conn)?;
    Ok(HttpResponse::Ok().json(json!({ "columns": columns })))
}

#[get("/api/get_column_data")]
async fn get_column_data(
    pool: web::Data<Pool>,
    query: web::Query<ColumnQuery>,
) -> Result<HttpResponse, CustomError> {
    log::debug!(
        "GET /api/get_column_data?table_name={}&column_name={}",
        query.table_name,
        query.column_name
    );
    let mut conn = db::connection(&pool)?;
    let values = DynamicTable::new(&query.table_name).read_column(&mut conn, &query.column_name)?;
    Ok(HttpResponse::Ok().json(values))
}

#[get("/api/get_table_data")]
async fn get_table_data(
    pool: web::Data<Pool>,
    query: web::Query<TableQuery>,
) -> Result<HttpResponse, CustomError> {
    log::debug!("GET /api/get_table_data?table_name={}", query.table_name);
    let mut conn = db::connection(&pool)?;
    let rows = DynamicTable::new(&query.table_name).read_all(&mut conn)?;
    Ok(HttpResponse::Ok().json(rows))
}

#[post("/api/update_table")]
async fn update_table(
    pool: web::Data<Pool>,
    request: web::Json<UpdateTableRequest>,
) -> Result<HttpResponse, CustomError> {
    let request = request.into_inner();
    log::debug!(
        "POST /api/update_table {} row {}",
        request.table_name,
        request.row_id
    );
    let mut conn = db::connection(&pool)?;
    DynamicTable::new(&request.table_name).update_row(
        &mut conn,
        &request.row_id,
        &request.updates,
    )?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Row updated successfully" })))
}

#[post("/api/delete_row")]
async fn delete_row(
    pool: web::Data<Pool>,
    request: web::Json<DeleteRowRequest>,
) -> Result<HttpResponse, CustomError> {
    let request = request.into_inner();
    log::debug!(
        "POST /api/delete_row {} row {}",
        request.table_name,
        request.row_id
    );
    let mut conn = db::connection(&pool)?;
    DynamicTable::new(&request.table_name).delete_row(&mut conn, &request.row_id)?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Row deleted successfully" })))
}

#[post("/api/add_row")]
async fn add_row(
    pool: web::Data<Pool>,
    request: web::Json<AddRowRequest>,
) -> Result<HttpResponse, CustomError> {
    let request = request.into_inner();
    log::debug!("POST /api/add_row {}", request.table_name);
    let mut conn = db::connection(&pool)?;
    let row_id = DynamicTable::new(&request.table_name).add_row(&mut conn, &request.row_data)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Row added successfully",
        "UUID": row_id,
    })))
}

#[post("/api/add_column")]
async fn add_column(
    pool: web::Data<Pool>,
    request: web::Json<AddColumnRequest>,
) -> Result<HttpResponse, CustomError> {
    let request = request.into_inner();
    log::debug!(
        "POST /api/add_column {} {} {}",
        request.table_name,
        request.column_name,
        request.column_type
    );
    let column_type = ColumnType::from_name(&request.column_type)?;
    let mut conn = db::connection(&pool)?;
    let column =
        DynamicTable::new(&request.table_name).add_column(&mut conn, &request.column_name, column_type)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Column added successfully",
        "column_name": column,
    })))
}

#[post("/api/delete_column")]
async fn delete_column(
    pool: web::Data<Pool>,
    request: web::Json<DeleteColumnRequest>,
) -> Result<HttpResponse, CustomError> {
    let request = request.into_inner();
    log::debug!(
        "POST /api/delete_column {} {}",
        request.table_name,
        request.column_name
    );
    let mut conn = db::connection(&pool)?;
    DynamicTable::new(&request.table_name).delete_column(&mut conn, &request.column_name)?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Column deleted successfully" })))
}

#[post("/api/rename_column")]
async fn rename_column(
    pool: web::Data<Pool>,
    request: web::Json<RenameColumnRequest>,
) -> Result<HttpResponse, CustomError> {
    let request = request.into_inner();
    log::debug!(
        "POST /api/rename_column {} {} -> {}",
        request.table_name,
        request.old_column_name,
        request.new_column_name
    );
    let mut conn = db::connection(&pool)?;
    let column = DynamicTable::new(&request.table_name).rename_column(
        &mut conn,
        &request.old_column_name,
        &request.new_column_name,
    )?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Column renamed successfully",
        "column_name": column,
    })))
}

pub fn init_routes(config: &mut web::ServiceConfig) {
    config.service(get_table_names);
    config.service(get_column_names);
    config.service(get_column_data);
    config.service(get_table_data);
    config.service(update_table);
    config.service(delete_row);
    config.service(add_row);
    config.service(add_column);
    config.service(delete_column);
    config.service(rename_column);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_uses_the_uuid_key() {
        let request: UpdateTableRequest = serde_json::from_value(json!({
            "table_name": "people",
            "UUID": "id-1",
            "updates": {"NAME": "Bob"}
        }))
        .unwrap();
        assert_eq!(request.row_id, "id-1");
        assert_eq!(request.updates.len(), 1);
    }

    #[test]
    fn delete_request_requires_the_uuid_key() {
        let request: Result<DeleteRowRequest, _> = serde_json::from_value(json!({
            "table_name": "people",
            "uuid": "id-1"
        }));
        assert!(request.is_err());
    }
}
