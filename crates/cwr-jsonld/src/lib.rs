//! JSON-LD flattening for linked objects read from the repository.
//!
//! Objects come out of the store with their own contexts and type coercions.
//! Packaging them needs one flat node list under the RO-Crate vocabulary,
//! which is what [`Flattener::flatten`] produces: expansion, a node map over
//! the default graph, then compaction against the target contexts.
//!
//! # Key Types
//!
//! - [`Flattener`] -- the flatten pipeline
//! - [`DocumentLoader`] -- dereferences remote context documents
//! - [`CachingDocumentLoader`] -- 24 hour context cache around any loader
//! - [`HttpDocumentLoader`] -- loader that follows `alternate` Link headers
//! - [`ActiveContext`] -- processed term definitions
//!
//! Only the subset of JSON-LD 1.1 needed for flattening store objects is
//! implemented: reverse properties, language maps and index maps are
//! skipped.

pub mod compact;
pub mod context;
pub mod error;
pub mod expand;
pub mod flatten;
pub mod http;
pub mod loader;
pub mod node_map;

pub use compact::Compactor;
pub use context::{ActiveContext, Documents, TermDefinition};
pub use error::{JsonLdError, JsonLdResult};
pub use expand::expand;
pub use flatten::{
    rewrite_secure_vocab, FlattenOptions, FlattenedGraph, Flattener, RO_CRATE_CONTEXT,
    WORKFLOW_RUN_CONTEXT,
};
pub use http::{parse_link_header, HttpDocumentLoader, LinkValue};
pub use loader::{CachingDocumentLoader, DocumentLoader, RemoteDocument, StaticDocumentLoader};
pub use node_map::NodeMap;
