//! Harassment-check gateway.
//!
//! A single-endpoint HTTP service: `POST /check_harassment` accepts a
//! conversation transcript plus up to three images, forwards them to Gemini
//! with a fixed response schema, and relays the structured scores back.
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
