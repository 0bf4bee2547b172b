// src/models/mod.rs

pub mod question;
pub mod result;
pub mod stats;
pub mod user;
