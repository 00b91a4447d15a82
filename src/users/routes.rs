use super::model::{User, UserPayload};
use crate::db::{self, Pool};
use crate::error_handler::CustomError;
use actix_web::{get, post, web, HttpResponse};
use serde_json::json;

#[get("/api/users")]
async fn find_all(pool: web::Data<Pool>) -> Result<HttpResponse, CustomError> {
    log::debug!("GET /api/users");
    let mut conn = db::connection(&pool)?;
    let users = User::list(&mut conn)?;
    Ok(HttpResponse::Ok().json(json!({ "users": users })))
}

#[post("/api/users")]
async fn create(
    pool: web::Data<Pool>,
    payload: web::Json<UserPayload>,
) -> Result<HttpResponse, CustomError> {
    log::debug!("POST /api/users");
    let new_user = payload.into_inner().validate()?;
    let mut conn = db::connection(&pool)?;
    let user = User::create(&mut conn, new_user)?;
    Ok(HttpResponse::Created().json(json!({
        "message": format!("Added user {}", user.email),
    })))
}

pub fn init_routes(config: &mut web::ServiceConfig) {
    config.service(find_all);
    config.service(create);
}
