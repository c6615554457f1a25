//! Motion/detection events produced by camera devices.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::NodeId;

/// Timestamp layout used in event names.
pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Object detected in an event image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventObject {
    /// Detector class label (`"person"`, `"car"`, ...)
    pub name: String,
    /// Bounding box as `[x, y, width, height]`, if the detector reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[i32; 4]>,
}

/// One frame captured while an event was open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventImage {
    /// Capture time
    pub captured_at: DateTime<Utc>,
    /// Encoded JPEG
    pub jpeg: Bytes,
    /// Motion score relative to the previous frame
    pub motion: f64,
    /// Objects detected in this frame
    #[serde(default)]
    pub objects: Vec<EventObject>,
}

/// A sequence of images a camera grouped together.
///
/// The producing node stamps `node` before sending; the root files events
/// by that identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the first image was captured
    pub started_at: DateTime<Utc>,
    /// Node that produced the event
    #[serde(default)]
    pub node: Option<NodeId>,
    /// Cached [`Event::compute_score`] result, `-1.0` until scored
    pub score: f64,
    /// Captured frames in order
    pub images: Vec<EventImage>,
}

impl Event {
    /// Score added for every detected object
    pub const OBJECT_WEIGHT: f64 = 50.0;

    /// Extra score added for every detected person
    pub const PERSON_WEIGHT: f64 = 5000.0;

    /// Open an empty event.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, node: Option<NodeId>) -> Self {
        Self { started_at, node, score: -1.0, images: Vec::new() }
    }

    /// Number of frames
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// True if no frame was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Mean per-image score: motion plus object and person bonuses.
    ///
    /// Stores the result in [`Event::score`]. An empty event scores zero.
    pub fn compute_score(&mut self) -> f64 {
        if self.images.is_empty() {
            self.score = 0.0;
            return self.score;
        }

        let total: f64 = self
            .images
            .iter()
            .map(|image| {
                image.motion
                    + image
                        .objects
                        .iter()
                        .map(|object| {
                            let person = if object.name == "person" { Self::PERSON_WEIGHT } else { 0.0 };
                            Self::OBJECT_WEIGHT + person
                        })
                        .sum::<f64>()
            })
            .sum();

        self.score = total / self.images.len() as f64;
        self.score
    }

    /// Base file name: `<started_at>_<node>_<score>_<images>`.
    ///
    /// The node is spelled with [`NodeId::file_token`]; events no node has
    /// stamped are filed under `-`.
    #[must_use]
    pub fn file_stem(&self) -> String {
        let node = self.node.map_or_else(|| "-".to_string(), NodeId::file_token);
        format!(
            "{}_{}_{}_{}",
            self.started_at.format(EVENT_TIME_FORMAT),
            node,
            self.score.trunc() as i64,
            self.images.len()
        )
    }
}
