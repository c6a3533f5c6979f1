pub mod config;
pub mod error;
pub mod export;
pub mod fs;
pub mod human;
pub mod logging;
pub mod model;
pub mod repository;

pub use config::*;
pub use error::*;
pub use fs::*;
pub use model::*;
pub use repository::*;
