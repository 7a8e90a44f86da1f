//service/mod.rs
pub mod storage_service;

use bytes::{Bytes, BytesMut};
use futures::channel::mpsc;
use futures::{join, SinkExt, Stream, StreamExt};
use log::{debug, info, warn};
use std::convert::Infallible;
use std::fmt::Display;

use crate::error::ApiError;
use crate::storage::DEFAULT_MIME_TYPE;

/// One file part taken from a multipart upload
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingFile {
    pub original_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

/// Limits applied while reading an upload
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_payload_size: u64,
    pub max_files: usize,
    pub max_file_size: u64,
}

/// Chunks buffered between the request body and the multipart parser
const BODY_CHANNEL_CAPACITY: usize = 8;

/// Parse a streamed `multipart/form-data` body into its file parts.
///
/// The body is forwarded chunk by chunk to the parser, refusing bodies larger
/// than `limits.max_payload_size`. Parts without a file name are plain form
/// fields and are skipped.
pub async fn parse_multipart<S, E>(
    content_type: Option<&str>,
    body: S,
    limits: &UploadLimits,
) -> Result<Vec<IncomingFile>, ApiError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let content_type = content_type
        .ok_or_else(|| ApiError::InvalidRequest("Missing Content-Type header".to_string()))?;
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| ApiError::InvalidRequest(format!("Expected multipart/form-data: {}", e)))?;

    // The request body is not Send, so it is pumped through a channel on this task
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(BODY_CHANNEL_CAPACITY);
    let (forwarded, parsed) = join!(
        forward_body(body, tx, limits.max_payload_size),
        collect_files(multer::Multipart::new(rx, boundary), limits),
    );
    // A body error explains any parse failure it caused
    forwarded?;
    parsed
}

async fn forward_body<S, E>(
    mut body: S,
    mut tx: mpsc::Sender<Result<Bytes, Infallible>>,
    limit: u64,
) -> Result<(), ApiError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut total: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| {
            warn!("Error reading payload chunk: {}", e);
            ApiError::InvalidRequest(format!("Error reading request body: {}", e))
        })?;
        total += chunk.len() as u64;
        if total > limit {
            return Err(ApiError::InvalidRequest(format!(
                "Request body exceeds {} bytes",
                limit
            )));
        }
        if tx.send(Ok(chunk)).await.is_err() {
            // Parser finished or gave up; the rest of the body is not needed
            break;
        }
    }
    debug!("Forwarded {} bytes of request body", total);
    Ok(())
}

async fn collect_files(
    mut multipart: multer::Multipart<'_>,
    limits: &UploadLimits,
) -> Result<Vec<IncomingFile>, ApiError> {
    let mut files = Vec::new();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        let original_name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                debug!("Skipping non-file field {:?}", field_name);
                continue;
            }
        };
        if files.len() >= limits.max_files {
            return Err(ApiError::InvalidRequest(format!(
                "Too many files: at most {} per upload",
                limits.max_files
            )));
        }
        let mime_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        let mut data = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed reading file {}: {}", original_name, e)))?
        {
            if (data.len() + chunk.len()) as u64 > limits.max_file_size {
                return Err(ApiError::InvalidRequest(format!(
                    "File {} exceeds {} bytes",
                    original_name, limits.max_file_size
                )));
            }
            data.extend_from_slice(&chunk);
        }
        debug!(
            "Parsed file part {:?} from field {:?}: {} bytes, {}",
            original_name,
            field_name,
            data.len(),
            mime_type
        );
        files.push(IncomingFile {
            original_name,
            mime_type,
            data: data.freeze(),
        });
    }

    info!("Parsed {} file(s) from multipart body", files.len());
    Ok(files)
}
