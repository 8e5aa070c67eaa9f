pub mod pool;
pub mod queries;

pub use pool::{create_pool, run_migrations};
pub use queries::*;
