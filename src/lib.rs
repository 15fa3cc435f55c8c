pub mod admin;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod notify;
pub mod session;
pub mod sheet;
pub mod stats;
#[cfg(test)]
pub mod test_helpers;
