use std::io::ErrorKind;
use std::path::Path;
use std::pin::Pin;

use bytes::Bytes;
use cwr_crate::FileSource;
use futures::{stream, Stream, TryStreamExt};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

use crate::error::{PackError, PackResult};

/// Payload bytes of one entry, in chunks of at most the configured size.
pub type ChunkStream = Pin<Box<dyn Stream<Item = PackResult<Bytes>> + Send>>;

/// Split an in-memory buffer into chunks.
pub(crate) fn inline(data: Bytes, chunk_size: usize) -> ChunkStream {
    Box::pin(stream::iter(split(data, chunk_size).into_iter().map(Ok)))
}

fn split(mut data: Bytes, chunk_size: usize) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(data.len() / chunk_size + 1);
    while data.len() > chunk_size {
        chunks.push(data.split_to(chunk_size));
    }
    if !data.is_empty() {
        chunks.push(data);
    }
    chunks
}

/// Re-slice a stream so that no chunk exceeds `chunk_size`.
fn rechunk(chunks: ChunkStream, chunk_size: usize) -> ChunkStream {
    Box::pin(
        chunks
            .map_ok(move |frame| stream::iter(split(frame, chunk_size).into_iter().map(Ok)))
            .try_flatten(),
    )
}

/// Open the payload of file entity `entity`.
pub(crate) async fn open(
    entity: &str,
    source: &FileSource,
    client: &reqwest::Client,
    chunk_size: usize,
) -> PackResult<ChunkStream> {
    let chunks: ChunkStream = match source {
        FileSource::Path(path) => open_path(path, chunk_size).await?,
        FileSource::Reader(reader) => {
            let reader = reader
                .take()
                .ok_or_else(|| PackError::ReaderConsumed(entity.to_string()))?;
            Box::pin(ReaderStream::with_capacity(reader, chunk_size).map_err(PackError::Io))
        }
        FileSource::Remote(url) => open_remote(entity, url, client).await?,
    };
    Ok(rechunk(chunks, chunk_size))
}

async fn open_path(path: &Path, chunk_size: usize) -> PackResult<ChunkStream> {
    let file = File::open(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            PackError::FileNotFound(path.to_path_buf())
        } else {
            PackError::Io(e)
        }
    })?;
    let chunks = ReaderStream::with_capacity(file, chunk_size).map_err(PackError::Io);
    Ok(Box::pin(chunks))
}

async fn open_remote(entity: &str, url: &Url, client: &reqwest::Client) -> PackResult<ChunkStream> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PackError::UnsupportedSource {
            entity: entity.to_string(),
            reason: format!("scheme {} is not fetchable", url.scheme()),
        });
    }
    debug!(%url, "fetching remote payload");
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(PackError::RemoteStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(Box::pin(response.bytes_stream().map_err(PackError::Http)))
}
