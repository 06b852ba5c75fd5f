//! Identity and reference resolution.
//!
//! Given a root identifier, the [`Resolver`] collects the transitive closure
//! of linked objects reachable from it. The repository expands the first
//! levels of the graph server-side; the resolver then walks whatever
//! references the expansion left behind, in batched searches, for at most
//! `max_depth` rounds.
//!
//! # Key Types
//!
//! - [`Resolver`] -- the resolution engine
//! - [`ResolveOptions`] -- depth bound, nesting and workflow-only axes
//! - [`ResolvedGraph`] -- identifier-keyed arena of resolved objects
//! - [`GraphCache`] -- time-bounded cache of resolved graphs
//!
//! A resolution either returns the complete graph or fails. Exhausting the
//! depth bound with references still outstanding is an internal error, not a
//! partial result.

pub mod cache;
pub mod error;
pub mod graph;
pub mod options;
pub mod resolver;
pub mod scan;

pub use cache::{CacheKey, GraphCache};
pub use error::{ResolveError, ResolveResult};
pub use graph::ResolvedGraph;
pub use options::{ResolveOptions, ResolveStrategy};
pub use resolver::Resolver;
pub use scan::{collect_references, references_of};
