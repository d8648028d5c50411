//! Typed model of the playlists an HLS VOD asset consists of.

use serde::{Deserialize, Serialize};

/// `#EXT-X-PLAYLIST-TYPE` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistType {
    /// The playlist never changes.
    Vod,
    /// Segments may only be appended.
    Event,
}

/// One `#EXT-X-STREAM-INF` entry of a master playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Peak bitrate in bits per second (`BANDWIDTH`).
    pub bandwidth_bps: u64,
    /// `RESOLUTION` as (width, height).
    pub resolution: Option<(u32, u32)>,
    /// RFC 6381 codec list, e.g. `avc1.64001f,mp4a.40.2`.
    pub codecs: Option<String>,
    /// Media playlist URI, relative to the master.
    pub uri: String,
}

/// A media segment and its `#EXTINF` duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub duration_secs: f64,
    /// Segment URI, relative to its playlist.
    pub uri: String,
}

/// Entry point of a multi-rendition asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterPlaylist {
    /// Lowest rung first.
    pub variants: Vec<Variant>,
}

/// Segment list of a single rendition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaPlaylist {
    /// `#EXT-X-TARGETDURATION`, whole seconds.
    pub target_duration: u32,
    /// `#EXT-X-MEDIA-SEQUENCE`.
    pub media_sequence: u64,
    pub playlist_type: Option<PlaylistType>,
    /// fMP4 init segment (`#EXT-X-MAP`).
    pub map_uri: Option<String>,
    pub segments: Vec<Segment>,
    /// Whether `#EXT-X-ENDLIST` is present.
    pub end_list: bool,
}

impl MediaPlaylist {
    /// Every file URI this playlist references, init segment first.
    pub fn referenced_uris(&self) -> impl Iterator<Item = &str> {
        self.map_uri
            .as_deref()
            .into_iter()
            .chain(self.segments.iter().map(|s| s.uri.as_str()))
    }
}

/// Either kind of playlist, as returned by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Playlist {
    Master(MasterPlaylist),
    Media(MediaPlaylist),
}
