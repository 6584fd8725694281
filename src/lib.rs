pub mod app_state;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod graphql;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod repositories;
pub mod services;
