pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod keygen;
pub mod lifecycle;
pub mod middleware;
pub mod models;
pub mod status;
