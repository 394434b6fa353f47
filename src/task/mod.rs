//! Download tasks
//!
//! A [`Task`] is the local record of one engine download. Its behaviour
//! differs per [`TaskKind`] only in how it is submitted and how it names
//! itself from the first status reports; both are looked up in a static
//! capability table (see [`kind`]).

use std::collections::BTreeMap;

use crate::error::{Result, TaskError};
use crate::rpc::{AddRequest, StatusReport};
use crate::types::{CategoryKey, GroupKey, Status, TaskKey, TaskKind};

pub(crate) mod kind;
mod table;

pub use table::TaskTable;

/// One download as tracked by a pool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub(crate) key: TaskKey,
    pub(crate) name: String,
    pub(crate) kind: TaskKind,
    pub(crate) status: Status,
    pub(crate) uris: Vec<String>,
    pub(crate) completed_length: u64,
    pub(crate) total_length: u64,
    pub(crate) download_speed: u64,
    pub(crate) upload_speed: u64,
    pub(crate) connections: u64,
    pub(crate) gid: Option<String>,
    pub(crate) metafile: Option<Vec<u8>>,
    pub(crate) options: BTreeMap<String, String>,
    pub(crate) session_id: Option<String>,
    pub(crate) category: CategoryKey,
    pub(crate) renamed: bool,
    /// Bumped whenever the status or engine identifier changes; not stored
    pub(crate) revision: u64,
}

impl Task {
    /// Fresh, inactive task for a validated creation request
    pub(crate) fn create(key: TaskKey, new: NewTask, category: CategoryKey) -> Self {
        let name = new.display_name();
        Self {
            key,
            name,
            kind: new.kind,
            status: Status::Inactive,
            uris: new.uris,
            completed_length: 0,
            total_length: 0,
            download_speed: 0,
            upload_speed: 0,
            connections: 0,
            gid: None,
            metafile: new.metafile,
            options: new.options,
            session_id: None,
            category,
            renamed: false,
            revision: 0,
        }
    }

    /// Stable key
    pub fn key(&self) -> TaskKey {
        self.key
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Download kind
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Current status
    pub fn status(&self) -> Status {
        self.status
    }

    /// Source URIs (web seeds for torrents)
    pub fn uris(&self) -> &[String] {
        &self.uris
    }

    /// Bytes downloaded so far
    pub fn completed_length(&self) -> u64 {
        self.completed_length
    }

    /// Total size in bytes, 0 while unknown
    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Download speed in bytes per second
    pub fn download_speed(&self) -> u64 {
        self.download_speed
    }

    /// Upload speed in bytes per second
    pub fn upload_speed(&self) -> u64 {
        self.upload_speed
    }

    /// Connected peers or servers
    pub fn connections(&self) -> u64 {
        self.connections
    }

    /// Engine identifier; `None` until the task has been submitted
    pub fn gid(&self) -> Option<&str> {
        self.gid.as_deref()
    }

    /// Torrent or metalink content
    pub fn metafile(&self) -> Option<&[u8]> {
        self.metafile.as_deref()
    }

    /// Engine options passed on submission
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Engine session the download was added in
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Owning category
    pub fn category(&self) -> CategoryKey {
        self.category
    }

    /// Whether the display name has been taken from a status report
    pub fn is_renamed(&self) -> bool {
        self.renamed
    }

    /// Every byte of a known total has been downloaded
    pub fn is_complete(&self) -> bool {
        self.total_length > 0 && self.completed_length == self.total_length
    }

    /// Fraction downloaded (0.0 while the size is unknown)
    pub fn progress(&self) -> f64 {
        if self.total_length == 0 {
            0.0
        } else {
            self.completed_length as f64 / self.total_length as f64
        }
    }

    /// Grouping the task belongs in for its current status
    pub fn group(&self) -> GroupKey {
        GroupKey::for_status(self.status, self.category)
    }

    /// Build the engine submission for this task's kind
    pub(crate) fn add_request(&self) -> Result<AddRequest> {
        (kind::capabilities(self.kind).add)(self)
    }

    /// Apply a `tellStatus` reply
    ///
    /// Updates counters, takes the display name from the reply the first
    /// time the kind can derive one, and returns the reported status
    /// (`None` for a status string outside the engine's vocabulary).
    pub(crate) fn apply_report(&mut self, report: &StatusReport) -> Option<Status> {
        if !self.renamed
            && let Some(extract) = kind::capabilities(self.kind).extract_name
            && let Some(name) = extract(report)
        {
            tracing::debug!(task = %self.key, name = %name, "task renamed from engine report");
            self.name = name;
            self.renamed = true;
        }

        self.total_length = report.total_length;
        self.completed_length = if report.total_length > 0 {
            report.completed_length.min(report.total_length)
        } else {
            report.completed_length
        };
        self.download_speed = report.download_speed;
        self.upload_speed = report.upload_speed;
        self.connections = report.connections;

        Status::from_engine(&report.status)
    }

    /// Zero the live transfer figures once the engine stops working on it
    pub(crate) fn clear_rates(&mut self) {
        self.download_speed = 0;
        self.upload_speed = 0;
        self.connections = 0;
    }

    /// Forget the engine download so the task can be submitted again
    pub(crate) fn detach(&mut self) {
        self.gid = None;
        self.session_id = None;
        self.clear_rates();
    }
}

/// Request to create a task
///
/// Build with [`NewTask::uri`], [`NewTask::torrent`] or [`NewTask::metalink`]
/// and refine with the `with_*` methods.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewTask {
    /// Display name; derived from the first URI when not given
    pub name: Option<String>,
    /// Download kind
    pub kind: TaskKind,
    /// Source URIs (web seeds for torrents)
    pub uris: Vec<String>,
    /// Torrent or metalink content
    pub metafile: Option<Vec<u8>>,
    /// Engine options
    pub options: BTreeMap<String, String>,
    /// Owning category (default: the pool's first category)
    pub category: Option<CategoryKey>,
}

impl NewTask {
    /// Plain download of one file from one or more mirrors
    pub fn uri<I, S>(uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: TaskKind::Plain,
            uris: uris.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// BitTorrent download from a `.torrent` file's content
    pub fn torrent(metafile: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: TaskKind::BitTorrent,
            metafile: Some(metafile.into()),
            ..Default::default()
        }
    }

    /// Metalink download from a metalink document
    pub fn metalink(metafile: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: TaskKind::Metalink,
            metafile: Some(metafile.into()),
            ..Default::default()
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add web seeds to a torrent
    pub fn with_uris<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uris.extend(uris.into_iter().map(Into::into));
        self
    }

    /// Set one engine option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// File the task under a category
    pub fn in_category(mut self, category: CategoryKey) -> Self {
        self.category = Some(category);
        self
    }

    /// Reject requests the engine could never accept
    pub fn validate(&self) -> std::result::Result<(), TaskError> {
        if self.uris.iter().any(|uri| uri.trim().is_empty()) {
            return Err(TaskError::InvalidInput("empty URI".to_string()));
        }
        match self.kind {
            TaskKind::Plain if self.uris.is_empty() => Err(TaskError::InvalidInput(
                "a plain download needs at least one URI".to_string(),
            )),
            TaskKind::BitTorrent | TaskKind::Metalink
                if self.metafile.as_ref().is_none_or(Vec::is_empty) =>
            {
                Err(TaskError::InvalidInput(format!(
                    "a {:?} download needs a metafile",
                    self.kind
                )))
            }
            _ => Ok(()),
        }
    }

    fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        let from_uri = self
            .uris
            .first()
            .map(|uri| kind::basename(uri.split(['?', '#']).next().unwrap_or(uri)))
            // "magnet:" and bare schemes are not names
            .filter(|name| !name.is_empty() && !name.ends_with(':'));
        match (from_uri, self.kind) {
            (Some(name), _) => name,
            (None, TaskKind::Plain) => "Untitled".to_string(),
            (None, TaskKind::BitTorrent) => "New torrent".to_string(),
            (None, TaskKind::Metalink) => "New metalink".to_string(),
        }
    }
}
