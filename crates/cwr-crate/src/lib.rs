//! RO-Crate projection of resolved dataset graphs.
//!
//! A dataset in the repository is a graph of linked objects with
//! repository-internal identifiers. [`project`] turns the flattened form of
//! that graph into an [`RoCrate`]: files and persons get crate-local or
//! remote identifiers, every reference is rewritten to match, and the crate
//! declares the workflow profiles its content calls for.
//!
//! # Key Types
//!
//! - [`RoCrate`] -- entity arena plus profiles and the identifier map
//! - [`Entity`] / [`EntityKind`] -- one node of the crate graph
//! - [`FileSource`] -- where a file entity's bytes come from
//! - [`UrlScheme`] -- builds the public URLs of repository objects
//!
//! # Modes
//!
//! An *attached* crate is rooted at `./` and packages its files by path.
//! A *detached* crate is rooted at the dataset's remote URL and only
//! references its files remotely; it is served as metadata alone.

pub mod entity;
pub mod error;
pub mod model;
mod preview;
pub mod profile;
pub mod project;
mod prune;
pub mod remote;

pub use entity::{Entity, EntityKind, FileSource, PayloadReader, ReaderSource};
pub use error::{CrateError, CrateResult};
pub use model::{RoCrate, ATTACHED_ROOT, METADATA_FILE, PREVIEW_FILE};
pub use profile::Profiles;
pub use project::{project, ProjectOptions};
pub use remote::{derive_remote_urls, RemoteUrls, UrlScheme};
