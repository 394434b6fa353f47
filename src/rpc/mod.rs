//! Remote-procedure access to the download engine
//!
//! [`EngineClient`] is the transport seam: one untyped `call`. [`Engine`]
//! wraps a client with the typed calls the task state machine needs.
//! [`Aria2Client`] is the JSON-RPC implementation used in production.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, RpcError};

mod aria2;
mod reply;

pub use aria2::Aria2Client;
pub use reply::{BitTorrentInfo, BitTorrentReport, FileReport, GidReply, SessionInfo, StatusReport};

/// Engine method names
pub mod methods {
    /// Add plain URIs
    pub const ADD_URI: &str = "aria2.addUri";
    /// Add a torrent metafile
    pub const ADD_TORRENT: &str = "aria2.addTorrent";
    /// Add a metalink document
    pub const ADD_METALINK: &str = "aria2.addMetalink";
    /// Pause a download
    pub const PAUSE: &str = "aria2.pause";
    /// Resume a paused download
    pub const UNPAUSE: &str = "aria2.unpause";
    /// Remove a download
    pub const REMOVE: &str = "aria2.remove";
    /// Query a download's status
    pub const TELL_STATUS: &str = "aria2.tellStatus";
    /// Query the engine session
    pub const GET_SESSION_INFO: &str = "aria2.getSessionInfo";
}

/// Request/response transport to the download engine
///
/// Implementations must be safe to share between all tasks of a pool; each
/// call is an independent request.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Invoke `method` with positional `params` and return the raw result
    ///
    /// # Errors
    ///
    /// Transport failures, engine faults and malformed replies.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value>;
}

/// Submission of a new download, built per task kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddRequest {
    /// `aria2.addUri(uris, options)`
    Uri {
        /// Source URIs of one download
        uris: Vec<String>,
        /// Engine options
        options: BTreeMap<String, String>,
    },
    /// `aria2.addTorrent(torrent, uris, options)`
    Torrent {
        /// Raw `.torrent` content
        metafile: Vec<u8>,
        /// Web seeds
        uris: Vec<String>,
        /// Engine options
        options: BTreeMap<String, String>,
    },
    /// `aria2.addMetalink(metalink, options)`
    Metalink {
        /// Raw metalink document
        metafile: Vec<u8>,
        /// Engine options
        options: BTreeMap<String, String>,
    },
}

impl AddRequest {
    /// Remote method this request is sent to
    pub fn method(&self) -> &'static str {
        match self {
            AddRequest::Uri { .. } => methods::ADD_URI,
            AddRequest::Torrent { .. } => methods::ADD_TORRENT,
            AddRequest::Metalink { .. } => methods::ADD_METALINK,
        }
    }

    /// Positional parameters; metafiles travel base64-encoded
    pub fn into_params(self) -> Vec<Value> {
        match self {
            AddRequest::Uri { uris, options } => vec![json!(uris), json!(options)],
            AddRequest::Torrent {
                metafile,
                uris,
                options,
            } => vec![json!(STANDARD.encode(metafile)), json!(uris), json!(options)],
            AddRequest::Metalink { metafile, options } => {
                vec![json!(STANDARD.encode(metafile)), json!(options)]
            }
        }
    }
}

/// Typed engine calls over a shared [`EngineClient`]
#[derive(Clone)]
pub struct Engine {
    client: Arc<dyn EngineClient>,
}

impl Engine {
    /// Wrap a client
    pub fn new(client: Arc<dyn EngineClient>) -> Self {
        Self { client }
    }

    /// Submit a download and return the identifier to track
    ///
    /// When the engine answers with several identifiers (a metalink can
    /// describe more than one download) the last one is tracked.
    pub async fn add(&self, request: AddRequest) -> Result<String> {
        let method = request.method();
        let value = self.client.call(method, request.into_params()).await?;
        let reply: GidReply = decode(method, value)?;
        reply.into_tracked().ok_or_else(|| {
            RpcError::InvalidResponse {
                method: method.to_string(),
                reason: "no identifier returned".to_string(),
            }
            .into()
        })
    }

    /// Pause a download
    pub async fn pause(&self, gid: &str) -> Result<()> {
        self.client.call(methods::PAUSE, vec![json!(gid)]).await?;
        Ok(())
    }

    /// Resume a paused download
    pub async fn unpause(&self, gid: &str) -> Result<()> {
        self.client.call(methods::UNPAUSE, vec![json!(gid)]).await?;
        Ok(())
    }

    /// Remove a download from the engine
    pub async fn remove(&self, gid: &str) -> Result<()> {
        self.client.call(methods::REMOVE, vec![json!(gid)]).await?;
        Ok(())
    }

    /// Fetch the status of a download
    pub async fn tell_status(&self, gid: &str) -> Result<StatusReport> {
        let value = self
            .client
            .call(methods::TELL_STATUS, vec![json!(gid)])
            .await?;
        decode(methods::TELL_STATUS, value)
    }

    /// Fetch the session the download belongs to
    pub async fn session_info(&self, gid: &str) -> Result<SessionInfo> {
        let value = self
            .client
            .call(methods::GET_SESSION_INFO, vec![json!(gid)])
            .await?;
        decode(methods::GET_SESSION_INFO, value)
    }
}

fn decode<T: serde::de::DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        RpcError::InvalidResponse {
            method: method.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}
