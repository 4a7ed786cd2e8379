pub mod config;
pub mod error;
pub mod estimation;
pub mod geometry;
pub mod inference;
pub mod io;
pub mod system;

pub use error::GravityError;
