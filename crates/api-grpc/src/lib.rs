//! # API gRPC
//!
//! gRPC server implementation for EZ Narratives.
//!
//! Handles:
//! - gRPC service setup and API-key authentication
//! - Service implementations using `ezn-core` for every operation
//! - gRPC-specific concerns (interceptors, tonic integration)
//!
//! Uses `api-shared` for common types and utilities.

#![warn(rust_2018_idioms)]

pub use service::{pb, ApiKeyInterceptor, NarrativesService};

pub mod service;
