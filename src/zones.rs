// src/zones.rs
//
// Coarse spatial zones of the camera's field of view, plus the
// per-cycle aggregation of zone assignments into a Configuration.

use crate::types::ZoneConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Left,
    Right,
    Top,
    Bottom,
    None,
}

pub struct ZoneClassifier {
    config: ZoneConfig,
}

impl ZoneClassifier {
    pub fn new(config: ZoneConfig) -> Self {
        Self { config }
    }

    /// Fixed precedence: horizontal zones win over vertical ones. A point
    /// in a horizontal band always resolves to Left/Right even when it
    /// also qualifies for Top/Bottom.
    pub fn classify(&self, x: f32, y: f32) -> Zone {
        if x < self.config.left_x {
            Zone::Left
        } else if x > self.config.right_x {
            Zone::Right
        } else if y < self.config.top_y {
            Zone::Top
        } else if y > self.config.bottom_y {
            Zone::Bottom
        } else {
            Zone::None
        }
    }
}

/// Mapping from each zone to at most one object label. An unpopulated
/// zone is the empty string; equality therefore treats "absent" and
/// "empty" as the same thing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub left: String,
    #[serde(default)]
    pub right: String,
    #[serde(default)]
    pub top: String,
    #[serde(default)]
    pub bottom: String,
}

impl Configuration {
    pub fn get(&self, zone: Zone) -> Option<&str> {
        let label = match zone {
            Zone::Left => &self.left,
            Zone::Right => &self.right,
            Zone::Top => &self.top,
            Zone::Bottom => &self.bottom,
            Zone::None => return None,
        };
        if label.is_empty() {
            None
        } else {
            Some(label)
        }
    }

    fn slot_mut(&mut self, zone: Zone) -> Option<&mut String> {
        match zone {
            Zone::Left => Some(&mut self.left),
            Zone::Right => Some(&mut self.right),
            Zone::Top => Some(&mut self.top),
            Zone::Bottom => Some(&mut self.bottom),
            Zone::None => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
            && self.right.is_empty()
            && self.top.is_empty()
            && self.bottom.is_empty()
    }
}

/// Merge one cycle's zone assignments into a single Configuration.
/// Input order is confidence descending (as produced by the
/// PostProcessor); the first detection to claim a zone wins and later
/// ones are ignored.
pub fn aggregate<I>(assignments: I) -> Configuration
where
    I: IntoIterator<Item = (Zone, String)>,
{
    let mut config = Configuration::default();
    for (zone, label) in assignments {
        if let Some(slot) = config.slot_mut(zone) {
            if slot.is_empty() {
                *slot = label;
            }
        }
    }
    config
}
