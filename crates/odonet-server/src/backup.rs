//! On-disk event store.
//!
//! Relays keep events here when the parent is unreachable; the root keeps
//! every event it receives. Layout:
//!
//! ```text
//! <dir>/<node>/<YYYY-mm-dd-HH-MM-SS>_<node>_<score>_<images>[-<n>].event.cbor
//! ```
//!
//! `<node>` is the node's file token (`-` when unset). The file name carries
//! enough metadata to list events without decoding them. Events that would
//! share a name get a `-<n>` suffix instead of overwriting each other.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use odonet_proto::{Event, NodeId, payloads::EVENT_TIME_FORMAT};
use tracing::{debug, info};

use crate::error::ServerError;

const EXTENSION: &str = ".event.cbor";

/// Listing entry for one stored event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    /// Base name without extension
    pub name: String,
    /// Directory the event is filed under
    pub node: String,
    /// When the event started
    pub started_at: DateTime<Utc>,
    /// Integer part of the score
    pub score: i64,
    /// Number of images
    pub images: usize,
    /// Full path of the event file
    pub path: PathBuf,
}

impl StoredEvent {
    fn parse(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let name = file_name.strip_suffix(EXTENSION)?;

        let mut parts = name.split('_');
        let (Some(date), Some(node), Some(score), Some(images), None) =
            (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };

        let images = images.split_once('-').map_or(images, |(count, _)| count);

        Some(Self {
            name: name.to_string(),
            node: node.to_string(),
            started_at: NaiveDateTime::parse_from_str(date, EVENT_TIME_FORMAT).ok()?.and_utc(),
            score: score.parse().ok()?,
            images: images.parse().ok()?,
            path: path.to_path_buf(),
        })
    }
}

/// Event files under one directory.
#[derive(Debug, Clone)]
pub struct EventStore {
    dir: PathBuf,
}

impl EventStore {
    /// Open (creating if needed) the store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ServerError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `event` and return the path of the new file.
    ///
    /// Never replaces an existing file.
    pub fn save(&self, event: &Event) -> Result<PathBuf, ServerError> {
        let node = event.node.map_or_else(|| "-".to_string(), NodeId::file_token);
        let node_dir = self.dir.join(node);
        fs::create_dir_all(&node_dir)?;

        let mut buf = Vec::new();
        ciborium::ser::into_writer(event, &mut buf).map_err(|e| ServerError::EventEncode(e.to_string()))?;

        let stem = event.file_stem();
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 { stem.clone() } else { format!("{stem}-{attempt}") };
            let path = node_dir.join(format!("{name}{EXTENSION}"));

            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&buf)?;
                    info!(path = %path.display(), "Event saved");
                    return Ok(path);
                },
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// [`Self::save`] on the blocking thread pool.
    pub async fn save_async(&self, event: Event) -> Result<PathBuf, ServerError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save(&event)).await?
    }

    /// All stored events, newest first.
    ///
    /// Files whose names do not follow the layout are skipped.
    pub fn list(&self) -> Result<Vec<StoredEvent>, ServerError> {
        let mut events = Vec::new();

        for node_dir in fs::read_dir(&self.dir)? {
            let node_dir = node_dir?;
            let filed_under = node_dir.file_name();
            let known = filed_under
                .to_str()
                .is_some_and(|name| name == "-" || NodeId::from_file_token(name).is_some());
            if !node_dir.file_type()?.is_dir() || !known {
                continue;
            }

            for file in fs::read_dir(node_dir.path())? {
                let path = file?.path();
                match StoredEvent::parse(&path) {
                    Some(event) => events.push(event),
                    None => debug!(path = %path.display(), "Skipping unrecognized file"),
                }
            }
        }

        events.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| b.name.cmp(&a.name)));
        Ok(events)
    }

    /// Number of stored events
    pub fn count(&self) -> Result<usize, ServerError> {
        Ok(self.list()?.len())
    }

    /// [`Self::count`] on the blocking thread pool.
    pub async fn count_async(&self) -> Result<usize, ServerError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.count()).await?
    }

    /// Read a stored event back.
    pub fn load(&self, stored: &StoredEvent) -> Result<Event, ServerError> {
        let bytes = fs::read(&stored.path)?;
        ciborium::de::from_reader(bytes.as_slice())
            .map_err(|e| ServerError::EventDecode { path: stored.path.clone(), reason: e.to_string() })
    }
}
