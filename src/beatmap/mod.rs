//! Beatmap references extracted from chat and the metadata they resolve to.
//!
//! - [`parser`]: link recognition (beatmap and beatmapset URL forms)
//! - [`mods`]: requested mod extraction

pub mod mods;
pub mod parser;

pub use parser::parse_message;

use serde::Deserialize;
use std::fmt;

/// Whether a reference names a single difficulty or a whole set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeatmapKind {
    Map,
    Mapset,
}

impl fmt::Display for BeatmapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Map => f.write_str("Beatmap"),
            Self::Mapset => f.write_str("Beatmapset"),
        }
    }
}

/// A beatmap request found in a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatmapReference {
    pub id: u64,
    pub kind: BeatmapKind,
    /// Serialized mod string, e.g. `+HDDT`, or empty.
    pub mods: String,
}

/// Resolved metadata for a single difficulty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BeatmapInfo {
    /// Difficulty id (always a single map, even when a set was requested).
    pub id: u64,
    pub artist: String,
    pub title: String,
    pub version: String,
    pub bpm: f64,
    /// Drain length in seconds.
    pub length: u64,
    /// Ranked status as reported by the API (`ranked`, `loved`, `graveyard`, ...).
    pub status: String,
    pub rating: f64,
}

impl BeatmapInfo {
    /// `{artist} - {title} [{version}]`
    pub fn display_title(&self) -> String {
        format!("{} - {} [{}]", self.artist, self.title, self.version)
    }
}
