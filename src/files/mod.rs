pub mod extract;
mod model;
mod routes;

pub use model::{NewUploadedFile, UploadedFile};
pub use routes::init_routes;
