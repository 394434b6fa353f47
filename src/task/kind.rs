//! Per-kind task behaviour

use crate::error::{Result, TaskError};
use crate::rpc::{AddRequest, StatusReport};
use crate::types::TaskKind;

use super::Task;

/// What differs between task kinds
pub(crate) struct Capabilities {
    /// Build the engine submission
    pub add: fn(&Task) -> Result<AddRequest>,
    /// Derive a display name from a status report, if this kind renames
    pub extract_name: Option<fn(&StatusReport) -> Option<String>>,
}

static PLAIN: Capabilities = Capabilities {
    add: add_uri,
    extract_name: Some(name_from_single_file),
};

static BIT_TORRENT: Capabilities = Capabilities {
    add: add_torrent,
    extract_name: Some(name_from_torrent_info),
};

// Metalink documents already carry canonical file names
static METALINK: Capabilities = Capabilities {
    add: add_metalink,
    extract_name: None,
};

pub(crate) fn capabilities(kind: TaskKind) -> &'static Capabilities {
    match kind {
        TaskKind::Plain => &PLAIN,
        TaskKind::BitTorrent => &BIT_TORRENT,
        TaskKind::Metalink => &METALINK,
    }
}

fn add_uri(task: &Task) -> Result<AddRequest> {
    Ok(AddRequest::Uri {
        uris: task.uris.clone(),
        options: task.options.clone(),
    })
}

fn add_torrent(task: &Task) -> Result<AddRequest> {
    Ok(AddRequest::Torrent {
        metafile: metafile(task)?,
        uris: task.uris.clone(),
        options: task.options.clone(),
    })
}

fn add_metalink(task: &Task) -> Result<AddRequest> {
    Ok(AddRequest::Metalink {
        metafile: metafile(task)?,
        options: task.options.clone(),
    })
}

fn metafile(task: &Task) -> Result<Vec<u8>> {
    task.metafile
        .clone()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| TaskError::MissingMetafile { key: task.key }.into())
}

fn name_from_single_file(report: &StatusReport) -> Option<String> {
    match report.files.as_slice() {
        [file] => Some(basename(&file.path)).filter(|name| !name.is_empty()),
        _ => None,
    }
}

fn name_from_torrent_info(report: &StatusReport) -> Option<String> {
    let info = report.bittorrent.as_ref()?.info.as_ref()?;
    Some(unquote(&info.name)).filter(|name| !name.is_empty())
}

/// Percent-decoded last path segment of a path or URI
pub(crate) fn basename(path: &str) -> String {
    let segment = path
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    unquote(segment)
}

fn unquote(text: &str) -> String {
    urlencoding::decode(text)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| text.to_string())
}
