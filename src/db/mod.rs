pub mod models;
pub mod queries;
pub mod schema;

pub use models::*;
pub use queries::*;
