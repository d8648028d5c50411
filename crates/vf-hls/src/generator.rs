//! Master playlist rendering.
//!
//! Media playlists come from the encoder; only the master is written here.
//! Rendering is deterministic: the same model always yields byte-identical
//! text, so re-encoding an asset rewrites the same master playlist.

use std::fmt;

use super::types::MasterPlaylist;

/// `#EXT-X-VERSION` of the master; nothing in it needs a newer protocol.
const VERSION: u32 = 3;

impl fmt::Display for MasterPlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#EXTM3U")?;
        writeln!(f, "#EXT-X-VERSION:{VERSION}")?;

        for variant in &self.variants {
            write!(f, "#EXT-X-STREAM-INF:BANDWIDTH={}", variant.bandwidth_bps)?;
            if let Some((width, height)) = variant.resolution {
                write!(f, ",RESOLUTION={width}x{height}")?;
            }
            if let Some(codecs) = &variant.codecs {
                write!(f, ",CODECS=\"{codecs}\"")?;
            }
            writeln!(f)?;
            writeln!(f, "{}", variant.uri)?;
        }

        Ok(())
    }
}

/// Render a master playlist: `#EXTM3U`, `#EXT-X-VERSION`, then one
/// `#EXT-X-STREAM-INF` + URI pair per variant in the given order.
pub fn generate_master_playlist(playlist: &MasterPlaylist) -> String {
    playlist.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Variant;

    fn rung(bandwidth_bps: u64, width: u32, height: u32, index: usize) -> Variant {
        Variant {
            bandwidth_bps,
            resolution: Some((width, height)),
            codecs: None,
            uri: format!("v{index}/prog_index.m3u8"),
        }
    }

    #[test]
    fn master_for_two_rung_ladder() {
        let playlist = MasterPlaylist {
            variants: vec![rung(5_000_000, 1280, 720, 0), rung(8_000_000, 1920, 1080, 1)],
        };

        let expected = "\
#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1280x720
v0/prog_index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=8000000,RESOLUTION=1920x1080
v1/prog_index.m3u8
";
        assert_eq!(generate_master_playlist(&playlist), expected);
    }

    #[test]
    fn master_with_codecs_and_no_resolution() {
        let playlist = MasterPlaylist {
            variants: vec![Variant {
                bandwidth_bps: 128_000,
                resolution: None,
                codecs: Some("mp4a.40.2".into()),
                uri: "audio/prog_index.m3u8".into(),
            }],
        };

        let m3u8 = generate_master_playlist(&playlist);
        assert!(m3u8.contains("#EXT-X-STREAM-INF:BANDWIDTH=128000,CODECS=\"mp4a.40.2\"\n"));
        assert!(!m3u8.contains("RESOLUTION"));
    }

    #[test]
    fn empty_master_is_header_only() {
        assert_eq!(
            generate_master_playlist(&MasterPlaylist::default()),
            "#EXTM3U\n#EXT-X-VERSION:3\n"
        );
    }
}
