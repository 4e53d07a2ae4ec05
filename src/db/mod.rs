pub mod brands;
pub mod campaigns;
pub mod content;
pub mod database;
pub mod models;
pub mod references;

pub use database::Database;
