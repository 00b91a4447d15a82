pub mod ident;
pub mod infer;
mod model;
mod routes;

pub use model::DynamicTable;
pub use routes::init_routes;
