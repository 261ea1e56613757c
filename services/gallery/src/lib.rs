//! services/gallery/src/lib.rs

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod gallery;
pub mod guard;
