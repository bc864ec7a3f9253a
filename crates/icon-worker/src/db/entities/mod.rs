//! Database entities.

pub mod file;

pub use file::Entity as File;
