mod model;
mod routes;

pub use model::{NewUser, User, UserPayload};
pub use routes::init_routes;
