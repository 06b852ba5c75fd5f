//! Streaming zip packaging of RO-Crates.
//!
//! An attached crate is written as a zip archive while it is being read:
//! the metadata document, the optional preview, then every file entity
//! whose payload is packaged. Payloads come from local paths, in-memory
//! readers, or remote HTTP(S) locations, and pass through in bounded
//! chunks so the archive size never shows up in process memory.
//!
//! # Key Types
//!
//! - [`CrateStreamer`] -- turns an [`cwr_crate::RoCrate`] into an [`ArchiveStream`]
//! - [`ZipStreamWriter`] -- incremental zip writer with data descriptors
//! - [`StreamStats`] -- chunk and byte counters of one archive

pub mod error;
pub mod source;
pub mod stream;
pub mod writer;

pub use error::{PackError, PackResult};
pub use source::ChunkStream;
pub use stream::{ArchiveStream, CrateStreamer, PackOptions, StreamStats, CHUNK_SIZE};
pub use writer::ZipStreamWriter;
