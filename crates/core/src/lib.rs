//! `sessiongate-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod catalog;
pub mod data;
pub mod error;
pub mod id;
pub mod identity;

pub use catalog::CatalogItem;
pub use data::DataEntry;
pub use error::{DomainError, DomainResult};
pub use id::{CatalogItemId, UserId};
pub use identity::Identity;
