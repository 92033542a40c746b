//! Agroww Kavach API service
//!
//! Farmer profiles, the post feed and crop timelines over PostgreSQL (or
//! memory), with images kept in object storage.

pub mod config;
pub mod error;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod uploads;

pub use state::AppState;
