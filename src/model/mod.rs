pub mod project;
pub mod user;
pub mod config;

pub use project::*;
pub use user::*;
pub use config::*;
