//! API request handlers

pub mod admin;
pub mod apps;
pub mod health;
pub mod routes;
pub mod session;
