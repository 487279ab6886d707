#![doc = "The `boardforge` library crate."]
#![doc = ""]
#![doc = "Domain models, the PostgreSQL session layer, the credential store, JWT"]
#![doc = "authentication, routing configuration and error handling for the BoardForge"]
#![doc = "service. The binary (`main.rs`) wires these together and runs the server."]

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;

pub use crate::error::AppError;
