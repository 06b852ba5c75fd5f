//! Object store access for the CWR front end.
//!
//! Objects live in a Cordra-style digital-object repository and are addressed
//! by persistent identifier. This crate wraps the handful of remote calls the
//! rest of the pipeline needs behind the [`ObjectStore`] trait.
//!
//! # Backends
//!
//! - [`CordraStore`] -- HTTP client for a live repository
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Rules
//!
//! 1. 401 and 404 answers both mean "not found". Access control is opaque.
//! 2. Every other non-success answer is a transport failure.
//! 3. Batch lookups never exceed [`MAX_BATCH_SIZE`] identifiers per call.

pub mod config;
pub mod cordra;
pub mod error;
pub mod memory;
pub mod traits;

pub use config::{StoreConfig, MAX_BATCH_SIZE};
pub use cordra::CordraStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use traits::{ByteStream, GraphMethod, ObjectStore, ObjectSummary, SearchPage};
