//! Shared test harness for pipeline integration tests.
//!
//! Provides a scripted [`FakeProber`], a [`FakeEncoder`] that writes real
//! playlists and segments (or fails in a chosen way), and a [`Harness`]
//! that wires them into a [`Pipeline`] over a temp directory.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vf_av::{EncodeOutput, Encoder, OutputLayout, Prober};
use vf_core::{EncodeError, EncodingPlan, MediaProbe, ProbeError};
use vodforge::{Pipeline, PipelineSettings, PipelineState, StateObserver};

pub const MB: u64 = 1024 * 1024;

pub const LANDSCAPE: MediaProbe = MediaProbe {
    width: 1920,
    height: 1080,
    has_audio: true,
};

pub const PORTRAIT: MediaProbe = MediaProbe {
    width: 1080,
    height: 1920,
    has_audio: true,
};

/// Segment files written per rendition.
pub const SEGMENTS: [&str; 2] = ["segment_000.ts", "segment_001.ts"];

/// Prober returning a fixed answer; `None` means "no video stream".
pub struct FakeProber {
    answer: Option<MediaProbe>,
    hang: bool,
    calls: AtomicUsize,
}

impl FakeProber {
    pub fn new(answer: Option<MediaProbe>) -> Self {
        Self {
            answer,
            hang: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A prober that never answers until its token is cancelled.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new(None)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for FakeProber {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<MediaProbe, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            cancel.cancelled().await;
            return Err(ProbeError::Cancelled {
                path: path.to_path_buf(),
            });
        }
        self.answer.ok_or_else(|| ProbeError::NoVideoStream {
            path: path.to_path_buf(),
        })
    }
}

/// How the [`FakeEncoder`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Write every playlist, segment, and the master.
    Complete,
    /// Write everything except the last segment of the last rendition.
    MissingSegment,
    /// Write one partial segment, then fail like a crashed encoder.
    Fail,
    /// Create the directories, then wait for cancellation.
    HangUntilCancelled,
}

/// Encoder writing a plausible HLS tree without running ffmpeg.
pub struct FakeEncoder {
    behavior: Behavior,
    plans: Mutex<Vec<EncodingPlan>>,
}

impl FakeEncoder {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            plans: Mutex::new(Vec::new()),
        }
    }

    /// Plans received so far, in call order.
    pub fn plans(&self) -> Vec<EncodingPlan> {
        self.plans.lock().unwrap().clone()
    }
}

fn write(path: &Path, contents: &[u8]) -> Result<(), EncodeError> {
    fs::write(path, contents).map_err(|e| EncodeError::io(format!("writing {}", path.display()), e))
}

#[async_trait]
impl Encoder for FakeEncoder {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn encode(
        &self,
        _input: &Path,
        plan: &EncodingPlan,
        layout: &OutputLayout,
        cancel: &CancellationToken,
    ) -> Result<EncodeOutput, EncodeError> {
        self.plans.lock().unwrap().push(plan.clone());
        let dirs = layout.prepare(plan).await?;

        match self.behavior {
            Behavior::Fail => {
                write(&dirs[0].join(SEGMENTS[0]), b"partial")?;
                return Err(EncodeError::process_failed(
                    Some(1),
                    "Error while filtering: Cannot allocate memory\nConversion failed!",
                ));
            }
            Behavior::HangUntilCancelled => {
                cancel.cancelled().await;
                return Err(EncodeError::Cancelled);
            }
            Behavior::Complete | Behavior::MissingSegment => {}
        }

        let text = media_playlist(&[10.0, 4.5]);

        for (index, dir) in dirs.iter().enumerate() {
            write(&layout.media_playlist(plan, index), text.as_bytes())?;
            for segment in SEGMENTS {
                let skip = self.behavior == Behavior::MissingSegment
                    && index == dirs.len() - 1
                    && segment == SEGMENTS[1];
                if !skip {
                    write(&dir.join(segment), b"\x47\x40\x00\x10")?;
                }
            }
        }

        layout.write_master(plan).await?;

        Ok(EncodeOutput {
            entry_playlist: layout.entry_playlist(plan),
            media_playlists: layout.media_playlists(plan),
        })
    }
}

/// Finished VOD playlist over [`SEGMENTS`], as ffmpeg's HLS muxer writes it.
pub fn media_playlist(durations: &[f64]) -> String {
    let longest = durations.iter().copied().fold(0.0_f64, f64::max);
    let mut text = format!(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:{}\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-PLAYLIST-TYPE:VOD\n",
        longest.ceil() as u32
    );
    for (uri, duration) in SEGMENTS.iter().zip(durations) {
        text.push_str(&format!("#EXTINF:{duration:.6},\n{uri}\n"));
    }
    text.push_str("#EXT-X-ENDLIST\n");
    text
}

/// A pipeline over fakes, rooted in a fresh temp directory.
pub struct Harness {
    pub dir: TempDir,
    pub prober: Arc<FakeProber>,
    pub encoder: Arc<FakeEncoder>,
    pub pipeline: Pipeline,
    states: Arc<Mutex<Vec<PipelineState>>>,
}

impl Harness {
    pub fn new(answer: Option<MediaProbe>, behavior: Behavior) -> Self {
        Self::with_settings(answer, behavior, PipelineSettings::default())
    }

    pub fn with_settings(
        answer: Option<MediaProbe>,
        behavior: Behavior,
        settings: PipelineSettings,
    ) -> Self {
        Self::with_prober(FakeProber::new(answer), behavior, settings)
    }

    pub fn with_prober(
        prober: FakeProber,
        behavior: Behavior,
        settings: PipelineSettings,
    ) -> Self {
        let prober = Arc::new(prober);
        let encoder = Arc::new(FakeEncoder::new(behavior));
        let states = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&states);
        let pipeline = Pipeline::new(prober.clone(), encoder.clone(), settings).with_observer(
            StateObserver::new(move |_, state| sink.lock().unwrap().push(state.clone())),
        );

        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
            prober,
            encoder,
            pipeline,
            states,
        }
    }

    /// Create `upload/source.mp4` with the given apparent size.
    pub fn input(&self, size_bytes: u64) -> PathBuf {
        let upload = self.dir.path().join("upload");
        fs::create_dir_all(&upload).unwrap();
        let path = upload.join("source.mp4");
        let file = fs::File::create(&path).unwrap();
        file.set_len(size_bytes).unwrap();
        path
    }

    /// Every state observed so far.
    pub fn states(&self) -> Vec<PipelineState> {
        self.states.lock().unwrap().clone()
    }
}
