use crate::error_handler::CustomError;
use actix_web::{get, web, HttpResponse};
use serde_json::json;

#[get("/health")]
async fn ping() -> Result<HttpResponse, CustomError> {
    Ok(HttpResponse::Ok().json(json!({})))
}

pub fn init_routes(config: &mut web::ServiceConfig) {
    config.service(ping);
}
