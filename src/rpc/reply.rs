//! Typed replies of the engine
//!
//! The engine encodes most integers as decimal strings; the numeric fields
//! below accept either form.

use serde::{Deserialize, Deserializer};

/// Reply of an add call: one identifier, or several for a metalink
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GidReply {
    /// Single download
    One(String),
    /// Several downloads
    Many(Vec<String>),
}

impl GidReply {
    /// Identifier to track: the only one, or the last of the list
    pub fn into_tracked(self) -> Option<String> {
        match self {
            GidReply::One(gid) => Some(gid),
            GidReply::Many(gids) => gids.into_iter().last(),
        }
    }
}

/// Reply of `tellStatus`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Engine identifier
    #[serde(default)]
    pub gid: Option<String>,
    /// One of active, waiting, paused, error, complete, removed
    pub status: String,
    /// Total length in bytes
    #[serde(default, deserialize_with = "number")]
    pub total_length: u64,
    /// Completed length in bytes
    #[serde(default, deserialize_with = "number")]
    pub completed_length: u64,
    /// Download speed in bytes per second
    #[serde(default, deserialize_with = "number")]
    pub download_speed: u64,
    /// Upload speed in bytes per second
    #[serde(default, deserialize_with = "number")]
    pub upload_speed: u64,
    /// Number of peers/servers connected
    #[serde(default, deserialize_with = "number")]
    pub connections: u64,
    /// Files of the download
    #[serde(default)]
    pub files: Vec<FileReport>,
    /// BitTorrent details, present for torrent downloads
    #[serde(default)]
    pub bittorrent: Option<BitTorrentReport>,
    /// Last error message, present when status is error
    #[serde(default)]
    pub error_message: Option<String>,
}

/// One file of a download
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileReport {
    /// Local path of the file
    #[serde(default)]
    pub path: String,
}

/// `bittorrent` member of a status reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BitTorrentReport {
    /// `info` dictionary; absent for magnet links without metadata yet
    #[serde(default)]
    pub info: Option<BitTorrentInfo>,
}

/// `info` dictionary of a torrent
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BitTorrentInfo {
    /// Torrent name
    #[serde(default)]
    pub name: String,
}

/// Reply of `getSessionInfo`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Identifier of the engine session
    pub session_id: String,
}

fn number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(u64),
        Text(String),
    }

    match Number::deserialize(deserializer)? {
        Number::Int(n) => Ok(n),
        Number::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
