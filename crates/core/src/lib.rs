//! # EZN Core
//!
//! Core business logic for EZ Narratives.
//!
//! This crate turns structured incident data into narrative text and keeps track of it:
//! - EMS and fire incident forms with defaults, validation and prefill
//! - Prompt construction and an OpenAI-compatible completion client
//! - Supabase auth, table and RPC access behind storage traits
//! - Chat sessions, knowledge-base search and user settings
//! - A per-user offline cache replayed when the database is reachable again
//!
//! **No API concerns**: HTTP/gRPC servers and request authentication belong in `api-grpc`,
//! `api-rest` or `api-shared`.

pub mod account;
pub mod chat;
pub mod config;
pub mod constants;
pub mod error;
pub mod forms;
pub mod knowledge;
pub mod llm;
pub mod narrative;
pub mod offline;
pub mod prompt;
pub mod repositories;
pub mod services;
pub mod session;
pub mod settings;
pub mod supabase;
pub mod user;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

// Use the shared api-shared crate for generated protobuf types.
pub use api_shared::pb;

pub use config::{ConfigInputs, CoreConfig, LlmConfig, LlmProvider, SupabaseConfig};
pub use error::{NarrativeError, NarrativeResult};
pub use ezn_types::NarrativeKind;
pub use services::{Backends, Services};
pub use user::UserContext;
