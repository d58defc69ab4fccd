pub mod authority;
pub mod handlers;
pub mod pretty;
pub mod routes;
pub mod state;
pub mod validation;

pub use pretty::Pretty;
pub use routes::build_router;
pub use state::AppState;
