//! Infrastructure layer: DB, Redis, config.

pub mod config;
pub mod db;
pub mod repository;
pub mod session_store;
