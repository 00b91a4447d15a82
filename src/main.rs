use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use listenfd::ListenFd;
use std::env;
use std::path::PathBuf;

mod db;
mod error_handler;
mod files;
mod health;
mod schema;
mod tables;
mod users;

#[derive(Clone)]
pub struct AppData {
    pub upload_dir: PathBuf,
}

macro_rules! AppFactory {
    ($pool:expr, $app_data:expr) => {
        move || {
            let cors = match env::var("CORS_ORIGIN") {
                Ok(origin) => Cors::default()
                    .allowed_origin(&origin)
                    .allow_any_method()
                    .allow_any_header(),
                Err(_) => Cors::permissive(),
            };
            App::new()
                .wrap(Logger::default())
                .wrap(cors)
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::new($app_data.clone()))
                .configure(health::init_routes)
                .configure(users::init_routes)
                .configure(files::init_routes)
                .configure(tables::init_routes)
        }
    };
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let database_url = env::var("DATABASE_URL").expect("Please set DATABASE_URL in .env");
    let pool = db::init_pool(&database_url).expect("Failed to create the database pool");
    db::run_migrations(&pool).expect("Failed to run database migrations");

    let app_data = AppData {
        upload_dir: PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into())),
    };

    let mut listenfd = ListenFd::from_env();
    let mut server = HttpServer::new(AppFactory!(pool, app_data));

    server = match listenfd.take_tcp_listener(0)? {
        Some(listener) => server.listen(listener)?,
        None => {
            let host = env::var("HOST").expect("Please set host in .env");
            let port = env::var("PORT").expect("Please set port in .env");
            server.bind(format!("{}:{}", host, port))?
        }
    };

    server.run().await
}
