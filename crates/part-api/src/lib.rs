//! Rust client for the PART survey and evaluation API.
//!
//! All endpoint methods on [`PartClient`] go through one request gateway that
//! unwraps the `{ data, message }` envelope, turns error statuses into
//! [`PartApiError`], and watches for `401 Unauthorized`. When one shows up
//! the client re-checks the session in the background (at most once per
//! second) and tells subscribers about the result.
//!
//! ```no_run
//! use part_api::{ClientEvent, PartApiConfig, PartClient, listener};
//!
//! # async fn run() -> part_api::Result<()> {
//! let client = PartClient::new(PartApiConfig::new().base_endpoint("http://localhost:8080/api"))?;
//! client.subscribe(
//!     ClientEvent::Authenticated,
//!     listener(|authenticated: bool| println!("authenticated: {authenticated}")),
//! );
//! client.authenticate("admin", "secret").await?;
//! let questions = client.get_questions().await?;
//! println!("{questions}");
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod endpoints;
mod error;
mod events;
mod session;
mod transport;
mod types;

pub use client::{PartClient, Revalidation};
pub use config::{ENDPOINT_ENV, PartApiConfig, USER_AGENT_ENV};
pub use endpoints::DATA_TYPE_SAMPLE_BYTES;
pub use error::{PartApiError, Result};
pub use events::{ClientEvent, EventRegistry, Listener, listener};
pub use session::{AuthStatus, DEFAULT_REVALIDATE_INTERVAL, Session};
pub use transport::{
    ReqwestTransport, Transport, TransportRequest, TransportResponse, UPLOAD_CHUNK_SIZE,
    UPLOAD_FIELD, UploadRequest,
};
pub use types::{Credentials, Envelope, ProgressCallback, ResourceId, UploadFile, UploadProgress};

pub use reqwest::Method;
