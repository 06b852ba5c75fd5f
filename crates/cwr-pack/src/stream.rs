use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDateTime;
use cwr_crate::{EntityKind, FileSource, RoCrate, METADATA_FILE, PREVIEW_FILE};
use futures::{stream, Stream, StreamExt};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};
use url::Url;

use crate::error::{PackError, PackResult};
use crate::source::{self, ChunkStream};
use crate::writer::ZipStreamWriter;

/// Default payload chunk size.
pub const CHUNK_SIZE: usize = 1024;

/// The archive as a lazy sequence of byte chunks.
pub type ArchiveStream = Pin<Box<dyn Stream<Item = PackResult<Bytes>> + Send>>;

#[derive(Clone, Debug)]
pub struct PackOptions {
    /// Upper bound for payload chunks read from any source.
    pub chunk_size: usize,
    /// Modification time stamped on every entry. `None` uses the DOS epoch,
    /// which keeps the archive bytes a function of the crate alone.
    pub modified: Option<NaiveDateTime>,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            modified: None,
        }
    }
}

/// Counters collected while an archive is streamed.
#[derive(Debug, Default)]
pub struct StreamStats {
    entries: AtomicU64,
    chunks: AtomicU64,
    payload_bytes: AtomicU64,
    largest_payload_chunk: AtomicU64,
    archive_bytes: AtomicU64,
}

impl StreamStats {
    /// Entries opened so far.
    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }

    /// Chunks handed to the consumer.
    pub fn chunks(&self) -> u64 {
        self.chunks.load(Ordering::Relaxed)
    }

    pub fn payload_bytes(&self) -> u64 {
        self.payload_bytes.load(Ordering::Relaxed)
    }

    /// Largest payload chunk held at once.
    pub fn largest_payload_chunk(&self) -> u64 {
        self.largest_payload_chunk.load(Ordering::Relaxed)
    }

    pub fn archive_bytes(&self) -> u64 {
        self.archive_bytes.load(Ordering::Relaxed)
    }

    fn record_payload(&self, len: usize) {
        let len = len as u64;
        self.payload_bytes.fetch_add(len, Ordering::Relaxed);
        self.largest_payload_chunk.fetch_max(len, Ordering::Relaxed);
    }

    fn emit(&self, chunk: Bytes) -> Bytes {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.archive_bytes
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        chunk
    }
}

enum Body {
    Inline(Bytes),
    Source(FileSource),
}

struct PlannedEntry {
    name: String,
    entity: String,
    body: Body,
}

/// Streams an attached crate as a zip archive.
#[derive(Clone, Debug)]
pub struct CrateStreamer {
    client: reqwest::Client,
    options: PackOptions,
}

impl CrateStreamer {
    /// Remote payloads are fetched with `client`.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            options: PackOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PackOptions {
        &self.options
    }

    /// Stream `krate` as a zip archive.
    ///
    /// The metadata document comes first, then the preview if the crate has
    /// one, then one entry per packaged file in declaration order. Nothing
    /// is read until the stream is polled, and the first error ends it.
    pub fn stream(&self, krate: &RoCrate) -> PackResult<ArchiveStream> {
        self.stream_with_stats(krate, Arc::new(StreamStats::default()))
    }

    pub fn stream_with_stats(
        &self,
        krate: &RoCrate,
        stats: Arc<StreamStats>,
    ) -> PackResult<ArchiveStream> {
        let pending = plan(krate)?;
        info!(
            crate_root = krate.root_id(),
            entries = pending.len(),
            "streaming crate archive"
        );
        let mut writer = ZipStreamWriter::new();
        if let Some(modified) = self.options.modified {
            writer = writer.with_modified(modified);
        }
        let state = State {
            writer: Some(writer),
            pending,
            current: None,
            client: self.client.clone(),
            chunk_size: self.options.chunk_size.max(1),
            stats,
        };
        let chunks = stream::try_unfold(state, |mut state| async move {
            match state.next_chunk().await {
                Ok(Some(chunk)) => Ok(Some((chunk, state))),
                Ok(None) => Ok(None),
                Err(e) => {
                    let entry = state.current.as_ref().map(|(name, _)| name.as_str());
                    error!(error = %e, entry, "aborting crate archive");
                    Err(e)
                }
            }
        });
        Ok(Box::pin(chunks))
    }

    /// Stream `krate` into `sink`, returning the archive size.
    pub async fn write_to<W>(&self, krate: &RoCrate, sink: &mut W) -> PackResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut chunks = self.stream(krate)?;
        let mut written = 0u64;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        sink.flush().await?;
        Ok(written)
    }
}

/// `ro-crate-metadata.json`, indented by four spaces.
fn metadata_bytes(krate: &RoCrate) -> PackResult<Bytes> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    krate.metadata_document().serialize(&mut serializer)?;
    Ok(Bytes::from(out))
}

/// Decide the archive entries up front. Payloads are only opened while
/// streaming.
fn plan(krate: &RoCrate) -> PackResult<VecDeque<PlannedEntry>> {
    let mut entries = VecDeque::new();
    entries.push_back(PlannedEntry {
        name: METADATA_FILE.to_string(),
        entity: METADATA_FILE.to_string(),
        body: Body::Inline(metadata_bytes(krate)?),
    });
    if let Some(html) = krate.preview_html()? {
        entries.push_back(PlannedEntry {
            name: PREVIEW_FILE.to_string(),
            entity: PREVIEW_FILE.to_string(),
            body: Body::Inline(Bytes::from(html)),
        });
    }

    for entity in krate.files() {
        let EntityKind::File {
            source,
            fetch_remote,
        } = &entity.kind
        else {
            continue;
        };
        let source = match source {
            None => {
                debug!(entity = %entity.id, "file has no payload source, metadata only");
                continue;
            }
            Some(FileSource::Remote(_)) if !fetch_remote => {
                debug!(entity = %entity.id, "remote file is reference-only");
                continue;
            }
            Some(source) => source.clone(),
        };
        if Url::parse(&entity.id).is_ok() {
            error!(entity = %entity.id, "packaged file has no path inside the crate");
            return Err(PackError::NoArchivePath(entity.id.clone()));
        }
        entries.push_back(PlannedEntry {
            name: entity.id.trim_start_matches("./").to_string(),
            entity: entity.id.clone(),
            body: Body::Source(source),
        });
    }
    Ok(entries)
}

struct State {
    writer: Option<ZipStreamWriter>,
    pending: VecDeque<PlannedEntry>,
    current: Option<(String, ChunkStream)>,
    client: reqwest::Client,
    chunk_size: usize,
    stats: Arc<StreamStats>,
}

impl State {
    /// Produce the next non-empty output chunk, or `None` once the central
    /// directory has been written.
    async fn next_chunk(&mut self) -> PackResult<Option<Bytes>> {
        loop {
            let Some(writer) = self.writer.as_mut() else {
                return Ok(None);
            };

            if let Some((name, chunks)) = self.current.as_mut() {
                match chunks.next().await {
                    Some(chunk) => {
                        let chunk = chunk?;
                        self.stats.record_payload(chunk.len());
                        writer.write(&chunk)?;
                        return Ok(Some(self.stats.emit(writer.take_output())));
                    }
                    None => {
                        let size = writer.finish_entry()?;
                        debug!(entry = %name, size, "packaged entry");
                        self.current = None;
                        continue;
                    }
                }
            }

            if let Some(entry) = self.pending.pop_front() {
                writer.start_entry(&entry.name)?;
                self.stats.entries.fetch_add(1, Ordering::Relaxed);
                let chunks = match entry.body {
                    Body::Inline(data) => source::inline(data, self.chunk_size),
                    Body::Source(source) => {
                        source::open(&entry.entity, &source, &self.client, self.chunk_size)
                            .await?
                    }
                };
                self.current = Some((entry.name, chunks));
                return Ok(Some(self.stats.emit(writer.take_output())));
            }

            let Some(writer) = self.writer.take() else {
                return Ok(None);
            };
            let entries = writer.entry_count();
            let tail = writer.finish()?;
            let tail = self.stats.emit(tail);
            info!(
                entries,
                bytes = self.stats.archive_bytes(),
                chunks = self.stats.chunks(),
                "crate archive complete"
            );
            return Ok(Some(tail));
        }
    }
}
