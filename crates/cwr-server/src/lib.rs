//! HTTP server for the CWR front end.
//!
//! Binds the pipeline operations to routes: dataset listing and export
//! (object JSON, crate metadata, streamed crate archive) and the workflow
//! submission API.
//!
//! # Key Types
//!
//! - [`CwrServer`] -- binds the router to a socket
//! - [`AppConfig`] -- TOML configuration for every backend
//! - [`AppState`] -- shared clients, caches and the orchestrator
//! - [`DatasetExporter`] -- resolve, flatten, project and package a dataset
//! - [`ServerError`] -- maps error classes to HTTP status codes

pub mod auth;
pub mod config;
pub mod error;
pub mod export;
pub mod handler;
pub mod router;
pub mod scheme;
pub mod server;
pub mod state;

pub use auth::{ApiKeyAuth, AuthProvider, Credentials, API_KEY_HEADER};
pub use config::{AppConfig, JsonLdConfig, ResolverConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use export::{DatasetExporter, ExportFormat};
pub use router::build_router;
pub use scheme::StoreUrlScheme;
pub use server::CwrServer;
pub use state::{AppState, Backends};
