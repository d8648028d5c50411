//! Minimal M3U8 reader.
//!
//! Understands the tags that matter for checking a VOD asset: variant
//! streams, segment durations and URIs, the init-segment map, and the
//! end-list marker. Unknown tags are skipped.

use super::types::{MasterPlaylist, MediaPlaylist, Playlist, PlaylistType, Segment, Variant};

/// Errors produced while reading a playlist.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("playlist does not start with #EXTM3U")]
    MissingHeader,

    #[error("line {line}: {tag} is not followed by a URI")]
    MissingUri { line: usize, tag: &'static str },

    #[error("line {line}: invalid {what}: {value}")]
    InvalidValue {
        line: usize,
        what: &'static str,
        value: String,
    },

    #[error("line {line}: URI {uri} appears without a preceding tag")]
    OrphanUri { line: usize, uri: String },
}

enum Pending {
    Variant(Variant),
    Segment(f64),
}

/// Parse M3U8 text into a [`Playlist`].
///
/// A playlist containing any `#EXT-X-STREAM-INF` tag is a master playlist;
/// everything else is treated as a media playlist.
pub fn parse_playlist(text: &str) -> Result<Playlist, ParseError> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));

    match lines.find(|(_, l)| !l.is_empty()) {
        Some((_, "#EXTM3U")) => {}
        _ => return Err(ParseError::MissingHeader),
    }

    let mut variants = Vec::new();
    let mut media = MediaPlaylist::default();
    let mut pending: Option<(usize, Pending)> = None;

    for (line_no, line) in lines {
        if line.is_empty() {
            continue;
        }

        if let Some(tag) = line.strip_prefix('#') {
            // Other tags (discontinuities, byte ranges) may sit between an
            // entry tag and its URI; a new entry or the end marker may not.
            let closes_entry = tag.starts_with("EXT-X-STREAM-INF:")
                || tag.starts_with("EXTINF:")
                || tag == "EXT-X-ENDLIST";
            if closes_entry {
                if let Some((line, p)) = pending.take() {
                    return Err(ParseError::MissingUri {
                        line,
                        tag: pending_tag(&p),
                    });
                }
            }

            if let Some(attrs) = tag.strip_prefix("EXT-X-STREAM-INF:") {
                pending = Some((line_no, Pending::Variant(parse_variant(line_no, attrs)?)));
            } else if let Some(rest) = tag.strip_prefix("EXTINF:") {
                let raw = rest.split(',').next().unwrap_or("").trim();
                let duration = raw.parse::<f64>().map_err(|_| ParseError::InvalidValue {
                    line: line_no,
                    what: "segment duration",
                    value: raw.to_string(),
                })?;
                pending = Some((line_no, Pending::Segment(duration)));
            } else if let Some(raw) = tag.strip_prefix("EXT-X-TARGETDURATION:") {
                media.target_duration =
                    raw.trim().parse().map_err(|_| ParseError::InvalidValue {
                        line: line_no,
                        what: "target duration",
                        value: raw.to_string(),
                    })?;
            } else if let Some(raw) = tag.strip_prefix("EXT-X-MEDIA-SEQUENCE:") {
                media.media_sequence =
                    raw.trim().parse().map_err(|_| ParseError::InvalidValue {
                        line: line_no,
                        what: "media sequence",
                        value: raw.to_string(),
                    })?;
            } else if let Some(raw) = tag.strip_prefix("EXT-X-PLAYLIST-TYPE:") {
                media.playlist_type = Some(match raw.trim() {
                    "VOD" => PlaylistType::Vod,
                    "EVENT" => PlaylistType::Event,
                    other => {
                        return Err(ParseError::InvalidValue {
                            line: line_no,
                            what: "playlist type",
                            value: other.to_string(),
                        })
                    }
                });
            } else if let Some(attrs) = tag.strip_prefix("EXT-X-MAP:") {
                media.map_uri = attributes(attrs)
                    .find(|(k, _)| *k == "URI")
                    .map(|(_, v)| v.to_string());
            } else if tag == "EXT-X-ENDLIST" {
                media.end_list = true;
            }
            continue;
        }

        match pending.take() {
            Some((_, Pending::Variant(mut variant))) => {
                variant.uri = line.to_string();
                variants.push(variant);
            }
            Some((_, Pending::Segment(duration_secs))) => media.segments.push(Segment {
                duration_secs,
                uri: line.to_string(),
            }),
            None => {
                return Err(ParseError::OrphanUri {
                    line: line_no,
                    uri: line.to_string(),
                })
            }
        }
    }

    if let Some((line, p)) = pending {
        return Err(ParseError::MissingUri {
            line,
            tag: pending_tag(&p),
        });
    }

    if variants.is_empty() {
        Ok(Playlist::Media(media))
    } else {
        Ok(Playlist::Master(MasterPlaylist { variants }))
    }
}

fn pending_tag(p: &Pending) -> &'static str {
    match p {
        Pending::Variant(_) => "#EXT-X-STREAM-INF",
        Pending::Segment(_) => "#EXTINF",
    }
}

fn parse_variant(line: usize, attrs: &str) -> Result<Variant, ParseError> {
    let mut variant = Variant {
        bandwidth_bps: 0,
        resolution: None,
        codecs: None,
        uri: String::new(),
    };
    let mut saw_bandwidth = false;

    for (key, value) in attributes(attrs) {
        match key {
            "BANDWIDTH" => {
                variant.bandwidth_bps = value.parse().map_err(|_| ParseError::InvalidValue {
                    line,
                    what: "BANDWIDTH",
                    value: value.to_string(),
                })?;
                saw_bandwidth = true;
            }
            "RESOLUTION" => {
                let parsed = value
                    .split_once('x')
                    .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)));
                variant.resolution = Some(parsed.ok_or_else(|| ParseError::InvalidValue {
                    line,
                    what: "RESOLUTION",
                    value: value.to_string(),
                })?);
            }
            "CODECS" => variant.codecs = Some(value.to_string()),
            _ => {}
        }
    }

    if !saw_bandwidth {
        return Err(ParseError::InvalidValue {
            line,
            what: "BANDWIDTH",
            value: "<missing>".into(),
        });
    }

    Ok(variant)
}

/// Split an attribute list on commas that are not inside quotes and strip
/// surrounding quotes from values.
fn attributes(list: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in list.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);

    parts.into_iter().filter_map(|part| {
        let (k, v) = part.split_once('=')?;
        Some((k.trim(), v.trim().trim_matches('"')))
    })
}
