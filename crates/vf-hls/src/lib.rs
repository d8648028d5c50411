//! vf-hls: HLS playlist generation, parsing, and verification.
//!
//! # Modules
//!
//! - [`generator`] - `Display` rendering of the master playlist (M3U8)
//! - [`parser`] - read generated playlists back into typed form
//! - [`verify`] - walk a playlist tree on disk and check every reference

pub mod generator;
pub mod parser;
pub mod types;
pub mod verify;

// Re-export commonly used items at the crate root.
pub use generator::generate_master_playlist;
pub use parser::{parse_playlist, ParseError};
pub use types::{MasterPlaylist, MediaPlaylist, Playlist, PlaylistType, Segment, Variant};
pub use verify::{verify_playlist_tree, VerifiedTree, VerifyError};
