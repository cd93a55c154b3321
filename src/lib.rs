pub mod bootstrap;
pub mod conf;
pub mod index;
pub mod models;
pub mod utils;
