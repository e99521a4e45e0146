//! services/api/src/lib.rs
//!
//! The hosting service for the smart cart core: adapters, configuration, and
//! the HTTP / WebSocket surface shared by the `api` and `openapi` binaries.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
