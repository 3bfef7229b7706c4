pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod render;
pub mod routes;
pub mod services;
pub mod smtp;
pub mod state;
