// src/lib.rs

pub mod config;
pub mod error;
pub mod grading;
pub mod handlers;
pub mod locator;
pub mod models;
pub mod routes;
pub mod state;
pub mod stats;
pub mod store;
pub mod supabase;
pub mod utils;

pub use routes::create_router;
