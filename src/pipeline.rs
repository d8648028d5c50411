//! End-to-end transcoding of one uploaded file into an HLS asset.
//!
//! A run walks `Start -> Probed -> PlanSelected -> Encoding -> Done`, or
//! stops at `Failed` with the first stage error. Each transition is logged
//! and handed to the optional [`StateObserver`].
//!
//! The pipeline holds no per-run state, so one [`Pipeline`] may drive many
//! concurrent runs. Runs on the same source share an output root unless the
//! caller gives each its own [`OutputLayout`] via [`Pipeline::run_into`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use vf_av::ladder::plan_ladder;
use vf_av::probe::check_input;
use vf_av::{
    select_strategy_for_size, EncoderSettings, Encoder, FfmpegEncoder, FfprobeProber,
    OutputLayout, Prober, ToolRegistry, FFMPEG, FFPROBE,
};
use vf_core::config::{Config, RungConfig, TranscodeConfig};
use vf_core::{EncodeError, EncodingPlan, MediaProbe, Result, Stage, Strategy};
use vf_hls::{verify_playlist_tree, VerifiedTree};

/// Lifecycle of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    /// The input was inspected.
    Probed { probe: MediaProbe },
    /// The plan is fixed; `renditions` outputs will be produced.
    PlanSelected { strategy: Strategy, renditions: usize },
    Encoding,
    /// Every declared output exists and is non-empty.
    Done,
    /// The run stopped at `stage`; partial output is left in place.
    Failed { stage: Stage },
}

impl PipelineState {
    /// Whether the run has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Start => write!(f, "start"),
            PipelineState::Probed { probe } => write!(
                f,
                "probed ({}x{}, audio: {})",
                probe.width, probe.height, probe.has_audio
            ),
            PipelineState::PlanSelected {
                strategy,
                renditions,
            } => match strategy {
                Strategy::SingleStream => write!(f, "plan selected (single stream)"),
                Strategy::MultiStream { .. } => {
                    write!(f, "plan selected (ladder of {renditions})")
                }
            },
            PipelineState::Encoding => write!(f, "encoding"),
            PipelineState::Done => write!(f, "done"),
            PipelineState::Failed { stage } => write!(f, "failed during {stage}"),
        }
    }
}

/// Receives every state transition of a run.
///
/// Wraps a callback so callers can forward transitions to their own job
/// tracking without the pipeline knowing about it.
pub struct StateObserver {
    callback: Box<dyn Fn(&Path, &PipelineState) + Send + Sync>,
}

impl StateObserver {
    /// Create a new observer from the given callback.
    pub fn new(callback: impl Fn(&Path, &PipelineState) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create an observer that discards all transitions.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    /// Report a transition for `input`.
    pub fn notify(&self, input: &Path, state: &PipelineState) {
        (self.callback)(input, state);
    }
}

impl fmt::Debug for StateObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateObserver").finish_non_exhaustive()
    }
}

/// Decision inputs taken from [`TranscodeConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSettings {
    pub size_threshold_mb: u64,
    pub max_rungs: usize,
    pub ladder: Vec<RungConfig>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&TranscodeConfig::default())
    }
}

impl From<&TranscodeConfig> for PipelineSettings {
    fn from(cfg: &TranscodeConfig) -> Self {
        Self {
            size_threshold_mb: cfg.size_threshold_mb,
            max_rungs: cfg.max_rungs,
            ladder: cfg.ladder.clone(),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Directory holding `v0..vN` (and `master.m3u8` for a ladder).
    pub output_root: PathBuf,
    pub strategy: Strategy,
    pub plan: EncodingPlan,
    /// Playlist a player should open.
    pub entry_playlist: PathBuf,
    /// Every playlist and segment confirmed on disk.
    pub tree: VerifiedTree,
}

/// Probe, plan, encode, verify.
pub struct Pipeline {
    prober: Arc<dyn Prober>,
    encoder: Arc<dyn Encoder>,
    settings: PipelineSettings,
    observer: Arc<StateObserver>,
}

impl Pipeline {
    /// Create a pipeline from explicit components.
    pub fn new(
        prober: Arc<dyn Prober>,
        encoder: Arc<dyn Encoder>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            prober,
            encoder,
            settings,
            observer: Arc::new(StateObserver::noop()),
        }
    }

    /// Build the ffprobe/ffmpeg pipeline described by `config`.
    ///
    /// # Errors
    ///
    /// [`vf_core::Error::Tool`] if ffprobe or ffmpeg is not in `tools`.
    pub fn from_config(config: &Config, tools: &ToolRegistry) -> Result<Self> {
        let transcode = &config.transcode;
        let ffprobe = tools.require(FFPROBE)?;
        let ffmpeg = tools.require(FFMPEG)?;

        let prober = FfprobeProber::new(ffprobe.path.clone(), transcode.probe_timeout());
        let encoder = FfmpegEncoder::new(ffmpeg.path.clone(), EncoderSettings::from(transcode));

        Ok(Self::new(
            Arc::new(prober),
            Arc::new(encoder),
            PipelineSettings::from(transcode),
        ))
    }

    /// Builder: attach a state observer.
    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run with the output root next to `input`.
    pub async fn run(&self, input: &Path, cancel: &CancellationToken) -> Result<PipelineOutput> {
        self.run_into(input, OutputLayout::beside(input), cancel).await
    }

    /// Run with an explicit output layout.
    ///
    /// Re-running with the same input and layout overwrites the previous
    /// output in place and yields the same tree.
    pub async fn run_into(
        &self,
        input: &Path,
        layout: OutputLayout,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput> {
        self.run_inner(input, layout, None, cancel).await
    }

    /// Like [`Pipeline::run_into`], but the encode stage must finish within
    /// `deadline`.
    ///
    /// On expiry the encoder is cancelled and awaited, so no ffmpeg process
    /// outlives the call, and the run fails with [`EncodeError::Timeout`].
    pub async fn run_with_deadline(
        &self,
        input: &Path,
        layout: OutputLayout,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput> {
        self.run_inner(input, layout, Some(deadline), cancel).await
    }

    async fn run_inner(
        &self,
        input: &Path,
        layout: OutputLayout,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput> {
        self.transition(input, PipelineState::Start);

        match self.execute(input, layout, deadline, cancel).await {
            Ok(output) => {
                self.transition(input, PipelineState::Done);
                tracing::info!(
                    "{}: {} file(s) ready, entry playlist {}",
                    input.display(),
                    output.tree.file_count(),
                    output.entry_playlist.display()
                );
                Ok(output)
            }
            Err(err) => {
                let stage = err.stage();
                tracing::error!("{}: {err}", input.display());
                self.transition(input, PipelineState::Failed { stage });
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        input: &Path,
        layout: OutputLayout,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput> {
        let size_bytes = check_input(input).await?;
        let probe = self.prober.probe(input, cancel).await?;
        self.transition(input, PipelineState::Probed { probe });

        let strategy = select_strategy_for_size(
            size_bytes,
            self.settings.size_threshold_mb,
            self.settings.max_rungs,
        );
        let plan = match strategy {
            Strategy::SingleStream => EncodingPlan::single(probe.has_audio),
            Strategy::MultiStream { rungs } => EncodingPlan::multi(
                plan_ladder(&probe, &self.settings.ladder, rungs)?,
                probe.has_audio,
            ),
        };
        self.transition(
            input,
            PipelineState::PlanSelected {
                strategy,
                renditions: plan.rendition_count(),
            },
        );
        for rendition in plan.renditions() {
            tracing::debug!(
                "rung {}: {}x{} @ {} bps",
                rendition.label(),
                rendition.computed_width,
                rendition.target_height,
                rendition.max_bitrate_bps
            );
        }

        if cancel.is_cancelled() {
            return Err(EncodeError::Cancelled.into());
        }

        self.transition(input, PipelineState::Encoding);
        let encoded = match deadline {
            None => self.encoder.encode(input, &plan, &layout, cancel).await?,
            Some(limit) => self.encode_within(input, &plan, &layout, limit, cancel).await?,
        };

        let tree = verify_playlist_tree(&encoded.entry_playlist)
            .map_err(|e| EncodeError::IncompleteOutput(e.to_string()))?;
        if let Some(missing) = encoded
            .media_playlists
            .iter()
            .find(|p| !tree.playlists.contains(*p))
        {
            return Err(EncodeError::IncompleteOutput(format!(
                "{} is not reachable from {}",
                missing.display(),
                encoded.entry_playlist.display()
            ))
            .into());
        }

        Ok(PipelineOutput {
            output_root: layout.root().to_path_buf(),
            strategy,
            plan,
            entry_playlist: encoded.entry_playlist,
            tree,
        })
    }

    async fn encode_within(
        &self,
        input: &Path,
        plan: &EncodingPlan,
        layout: &OutputLayout,
        limit: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<vf_av::EncodeOutput, EncodeError> {
        let token = cancel.child_token();
        let encode = self.encoder.encode(input, plan, layout, &token);
        tokio::pin!(encode);

        tokio::select! {
            result = &mut encode => result,
            _ = tokio::time::sleep(limit) => {
                tracing::warn!("{}: encode exceeded {limit:?}, stopping", input.display());
                token.cancel();
                // Wait for the encoder to reap its child before reporting.
                let _ = encode.await;
                Err(EncodeError::Timeout(limit))
            }
        }
    }

    fn transition(&self, input: &Path, state: PipelineState) {
        tracing::info!("{}: {state}", input.display());
        self.observer.notify(input, &state);
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("prober", &self.prober.name())
            .field("encoder", &self.encoder.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
