pub mod auth;
pub mod consultations;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod wallet;
pub mod wizard;

pub use middleware::{require_auth, resolve_owner};
pub use rest::ApiDoc;
pub use state::AppState;
