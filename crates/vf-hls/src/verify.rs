//! On-disk verification of a generated playlist tree.
//!
//! Starting from an entry playlist (a master or a single media playlist),
//! every referenced sub-playlist and segment must exist next to its parent
//! and be non-empty, and every media playlist must be a finished VOD list.
//! An asset that fails this check must not be published.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::parser::{parse_playlist, ParseError};
use super::types::{MediaPlaylist, Playlist, PlaylistType};

/// Errors produced while verifying a playlist tree.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("missing file {}", .0.display())]
    Missing(PathBuf),

    #[error("empty file {}", .0.display())]
    Empty(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: ParseError },

    #[error("{} references no segments", .0.display())]
    NoSegments(PathBuf),

    /// No `#EXT-X-ENDLIST`, or typed `EVENT`: the encoder did not finish it.
    #[error("{} is not a finished VOD playlist", .0.display())]
    Unfinished(PathBuf),

    #[error("{} references {uri}, which is not a relative path", path.display())]
    ForeignUri { path: PathBuf, uri: String },

    #[error("master playlist {} references another master playlist {}", master.display(), nested.display())]
    NestedMaster { master: PathBuf, nested: PathBuf },
}

/// Files found while walking a verified tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifiedTree {
    /// Every playlist, entry playlist included.
    pub playlists: BTreeSet<PathBuf>,
    /// Every referenced segment (and init segment).
    pub segments: BTreeSet<PathBuf>,
}

impl VerifiedTree {
    /// Total number of distinct files in the tree.
    pub fn file_count(&self) -> usize {
        self.playlists.len() + self.segments.len()
    }
}

/// Walk the playlist tree rooted at `entry` and check every reference.
pub fn verify_playlist_tree(entry: &Path) -> Result<VerifiedTree, VerifyError> {
    let mut tree = VerifiedTree::default();

    match read_playlist(entry)? {
        Playlist::Master(master) => {
            tree.playlists.insert(entry.to_path_buf());
            for variant in &master.variants {
                let child = resolve(entry, &variant.uri)?;
                match read_playlist(&child)? {
                    Playlist::Media(media) => verify_media(&child, &media, &mut tree)?,
                    Playlist::Master(_) => {
                        return Err(VerifyError::NestedMaster {
                            master: entry.to_path_buf(),
                            nested: child,
                        })
                    }
                }
            }
        }
        Playlist::Media(media) => verify_media(entry, &media, &mut tree)?,
    }

    tracing::debug!(
        "Verified HLS tree at {}: {} playlists, {} segments",
        entry.display(),
        tree.playlists.len(),
        tree.segments.len()
    );

    Ok(tree)
}

fn verify_media(
    path: &Path,
    media: &MediaPlaylist,
    tree: &mut VerifiedTree,
) -> Result<(), VerifyError> {
    if media.segments.is_empty() {
        return Err(VerifyError::NoSegments(path.to_path_buf()));
    }

    for uri in media.referenced_uris() {
        let segment = resolve(path, uri)?;
        check_non_empty(&segment)?;
        tree.segments.insert(segment);
    }

    if !media.end_list || media.playlist_type == Some(PlaylistType::Event) {
        return Err(VerifyError::Unfinished(path.to_path_buf()));
    }

    tree.playlists.insert(path.to_path_buf());
    Ok(())
}

fn read_playlist(path: &Path) -> Result<Playlist, VerifyError> {
    check_non_empty(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| VerifyError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_playlist(&text).map_err(|source| VerifyError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn check_non_empty(path: &Path) -> Result<(), VerifyError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(VerifyError::Empty(path.to_path_buf())),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(VerifyError::Missing(path.to_path_buf()))
        }
        Err(source) => Err(VerifyError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Resolve a playlist-relative URI against the playlist's directory.
fn resolve(playlist: &Path, uri: &str) -> Result<PathBuf, VerifyError> {
    let relative = Path::new(uri);
    if uri.contains("://") || relative.is_absolute() {
        return Err(VerifyError::ForeignUri {
            path: playlist.to_path_buf(),
            uri: uri.to_string(),
        });
    }
    let dir = playlist.parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;

    const MEDIA: &str = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:10.0,\nsegment_000.ts\n#EXTINF:2.5,\nsegment_001.ts\n#EXT-X-ENDLIST\n";

    fn write_rendition(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), MEDIA).unwrap();
        fs::write(dir.join("segment_000.ts"), b"ts").unwrap();
        fs::write(dir.join("segment_001.ts"), b"ts").unwrap();
    }

    #[test]
    fn verifies_single_media_playlist() {
        let tmp = tempfile::tempdir().unwrap();
        let v0 = tmp.path().join("v0");
        write_rendition(&v0, "index.m3u8");

        let tree = verify_playlist_tree(&v0.join("index.m3u8")).unwrap();
        assert_eq!(tree.playlists.len(), 1);
        assert_eq!(tree.segments.len(), 2);
        assert!(tree.segments.contains(&v0.join("segment_001.ts")));
    }

    #[test]
    fn verifies_master_tree() {
        let tmp = tempfile::tempdir().unwrap();
        write_rendition(&tmp.path().join("v0"), "prog_index.m3u8");
        write_rendition(&tmp.path().join("v1"), "prog_index.m3u8");
        let master = tmp.path().join("master.m3u8");
        fs::write(
            &master,
            "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=5000000\nv0/prog_index.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=8000000\nv1/prog_index.m3u8\n",
        )
        .unwrap();

        let tree = verify_playlist_tree(&master).unwrap();
        assert_eq!(tree.playlists.len(), 3);
        assert_eq!(tree.segments.len(), 4);
        assert_eq!(tree.file_count(), 7);
    }

    #[test]
    fn dangling_segment_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let v0 = tmp.path().join("v0");
        write_rendition(&v0, "index.m3u8");
        fs::remove_file(v0.join("segment_001.ts")).unwrap();

        let err = verify_playlist_tree(&v0.join("index.m3u8")).unwrap_err();
        assert_matches!(err, VerifyError::Missing(p) if p == v0.join("segment_001.ts"));
    }

    #[test]
    fn empty_segment_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let v0 = tmp.path().join("v0");
        write_rendition(&v0, "index.m3u8");
        fs::write(v0.join("segment_000.ts"), b"").unwrap();

        let err = verify_playlist_tree(&v0.join("index.m3u8")).unwrap_err();
        assert_matches!(err, VerifyError::Empty(_));
    }

    #[test]
    fn missing_variant_playlist_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        write_rendition(&tmp.path().join("v0"), "prog_index.m3u8");
        let master = tmp.path().join("master.m3u8");
        fs::write(
            &master,
            "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=5000000\nv0/prog_index.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=8000000\nv1/prog_index.m3u8\n",
        )
        .unwrap();

        let err = verify_playlist_tree(&master).unwrap_err();
        assert_matches!(err, VerifyError::Missing(p) if p.ends_with("v1/prog_index.m3u8"));
    }

    #[test]
    fn playlist_without_segments_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.m3u8");
        fs::write(&path, "#EXTM3U\n#EXT-X-ENDLIST\n").unwrap();
        assert_matches!(verify_playlist_tree(&path), Err(VerifyError::NoSegments(_)));
    }

    #[test]
    fn unfinished_playlist_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let v0 = tmp.path().join("v0");
        write_rendition(&v0, "index.m3u8");
        let index = v0.join("index.m3u8");

        fs::write(&index, MEDIA.replace("#EXT-X-ENDLIST\n", "")).unwrap();
        assert_matches!(verify_playlist_tree(&index), Err(VerifyError::Unfinished(p)) if p == index);

        let event = MEDIA.replace("#EXTM3U\n", "#EXTM3U\n#EXT-X-PLAYLIST-TYPE:EVENT\n");
        fs::write(&index, event).unwrap();
        assert_matches!(verify_playlist_tree(&index), Err(VerifyError::Unfinished(_)));

        let vod = MEDIA.replace("#EXTM3U\n", "#EXTM3U\n#EXT-X-PLAYLIST-TYPE:VOD\n");
        fs::write(&index, vod).unwrap();
        assert!(verify_playlist_tree(&index).is_ok());
    }

    #[test]
    fn remote_uri_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.m3u8");
        fs::write(&path, "#EXTM3U\n#EXTINF:1.0,\nhttps://cdn.example/seg.ts\n").unwrap();
        assert_matches!(
            verify_playlist_tree(&path),
            Err(VerifyError::ForeignUri { .. })
        );
    }
}
