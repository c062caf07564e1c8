//! Catalog backend for brands, products, stores and the people who curate
//! them. `api::handle` is the single entry point; everything under it is
//! plain synchronous code over one SQLite connection.

pub mod access;
pub mod api;
pub mod audit;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod media;
mod migrations;
pub mod scheduler;
pub mod services;
pub mod session_meta;
pub mod sms;
pub mod state;
pub mod status;
pub mod types;
pub mod validation;
