//! HTTP transport used by the request gateway.
//!
//! The gateway only needs "send this, give me status and body", plus a
//! multipart upload that reports progress. [`ReqwestTransport`] is the
//! production implementation; tests and embedders can supply their own.

use crate::config::PartApiConfig;
use crate::error::{PartApiError, Result};
use crate::types::{ProgressCallback, UploadFile, UploadProgress};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Body, Client, Method, StatusCode, Url};

/// Size of the pieces an upload body is streamed in. Progress is reported once per piece.
pub const UPLOAD_CHUNK_SIZE: usize = 8 * 1024;

/// Multipart field every upload uses.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl TransportRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body and the matching content type.
    pub fn json_body(self, body: Vec<u8>) -> Self {
        let mut request = self.header(CONTENT_TYPE.as_str(), "application/json");
        request.body = Some(Bytes::from(body));
        request
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub url: String,
    pub file: UploadFile,
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Canonical reason phrase for the status, e.g. `"Unauthorized"`.
    pub fn reason(&self) -> &'static str {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Unknown Status")
    }
}

/// Perform HTTP exchanges on behalf of the gateway.
///
/// Implementations report a response for every status code; only failures
/// to obtain a response at all become errors (`Connection`, or `Input` for
/// unusable URLs).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;

    /// POST `request.file` as multipart form data under [`UPLOAD_FIELD`],
    /// calling `progress` as the body is written.
    async fn upload(
        &self,
        request: UploadRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<TransportResponse>;
}

/// [`Transport`] backed by a `reqwest::Client` with a cookie store, so the
/// server's session cookie rides along on every later call.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new(config: &PartApiConfig) -> Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|err| PartApiError::Input(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { http })
    }

    /// Use a preconfigured client (proxies, TLS roots, timeouts).
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    async fn finish(response: reqwest::Response) -> Result<TransportResponse> {
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let url = parse_url(&request.url)?;
        let mut builder = self.http.request(request.method, url);
        for (name, value) in &request.headers {
            let value = HeaderValue::from_str(value)
                .map_err(|_| PartApiError::Input(format!("invalid value for header {name}")))?;
            builder = builder.header(name.as_str(), value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await?;
        Self::finish(response).await
    }

    async fn upload(
        &self,
        request: UploadRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<TransportResponse> {
        let url = parse_url(&request.url)?;
        let UploadFile {
            file_name,
            bytes,
            mime,
        } = request.file;
        let total = bytes.len() as u64;

        let mut part = reqwest::multipart::Part::stream_with_length(progress_body(bytes, progress), total)
            .file_name(file_name);
        if let Some(mime) = mime {
            part = part
                .mime_str(&mime)
                .map_err(|_| PartApiError::Input(format!("invalid mime type {mime:?}")))?;
        }
        let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self.http.post(url).multipart(form).send().await?;
        Self::finish(response).await
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|err| PartApiError::Input(format!("cannot resolve request URL {raw:?}: {err}")))
}

/// Split `bytes` into [`UPLOAD_CHUNK_SIZE`] pieces without copying.
pub fn upload_chunks(bytes: &Bytes) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(bytes.len().div_ceil(UPLOAD_CHUNK_SIZE));
    let mut offset = 0;
    while offset < bytes.len() {
        let end = (offset + UPLOAD_CHUNK_SIZE).min(bytes.len());
        chunks.push(bytes.slice(offset..end));
        offset = end;
    }
    chunks
}

/// Streaming body that reports cumulative progress as each chunk is pulled.
fn progress_body(bytes: Bytes, progress: Option<ProgressCallback>) -> Body {
    Body::wrap_stream(futures::stream::iter(progress_chunks(bytes, progress)))
}

/// Chunks of `bytes`, calling `progress` as each one is taken. An empty body
/// yields a single empty chunk so completion is still reported.
fn progress_chunks(
    bytes: Bytes,
    progress: Option<ProgressCallback>,
) -> impl Iterator<Item = std::io::Result<Bytes>> {
    let total = bytes.len() as u64;
    let mut chunks = upload_chunks(&bytes);
    if chunks.is_empty() {
        chunks.push(Bytes::new());
    }
    let mut sent = 0u64;
    chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(progress) = &progress {
            progress(UploadProgress { sent, total });
        }
        Ok(chunk)
    })
}
