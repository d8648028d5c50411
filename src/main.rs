mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tokio_util::sync::CancellationToken;
use vf_av::{
    plan_ladder, FfprobeProber, OutputLayout, Prober, ToolRegistry, ToolStatus, FFPROBE,
};
use vf_core::config::Config;
use vf_core::MediaProbe;
use vodforge::{Pipeline, StateObserver};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    // Logs go to stderr so JSON output on stdout stays machine-readable.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vodforge=trace,vf_av=debug,vf_hls=debug,vf_core=debug".to_string()
        } else {
            "vodforge=info,vf_av=info,vf_hls=warn,vf_core=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            input,
            output,
            max_rungs,
            threshold_mb,
            timeout,
        } => {
            let mut config = Config::load_or_default(cli.config.as_deref());
            if let Some(n) = max_rungs {
                config.transcode.max_rungs = n;
            }
            if let Some(mb) = threshold_mb {
                config.transcode.size_threshold_mb = mb;
            }
            if let Some(secs) = timeout {
                config.transcode.encode_timeout_secs = Some(secs);
            }

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_file(&input, output.as_deref(), &config))
        }
        Commands::Probe { file, json } => {
            let config = Config::load_or_default(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, &config))
        }
        Commands::Plan {
            width,
            height,
            max_rungs,
            json,
        } => {
            let config = Config::load_or_default(cli.config.as_deref());
            plan(width, height, max_rungs, json, &config)
        }
        Commands::CheckTools => {
            let config = Config::load_or_default(cli.config.as_deref());
            check_tools(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
    }
}

async fn run_file(input: &Path, output: Option<&Path>, config: &Config) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("config: {warning}");
    }

    let tools = ToolRegistry::discover(&config.tools);
    let pipeline = Pipeline::from_config(config, &tools)?.with_observer(StateObserver::new(
        |input, state| {
            tracing::debug!(target: "vodforge::progress", "{} -> {state}", input.display());
        },
    ));
    let settings = pipeline.settings();
    tracing::debug!(
        "ladder above {} MB, up to {} rung(s)",
        settings.size_threshold_mb,
        settings.max_rungs
    );

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; stopping encoder");
                cancel.cancel();
            }
        })
    };

    let layout = match output {
        Some(root) => OutputLayout::new(root),
        None => OutputLayout::beside(input),
    };
    let result = pipeline.run_into(input, layout, &cancel).await;
    interrupt.abort();

    let out = result.with_context(|| format!("failed to transcode {}", input.display()))?;

    println!("Input:    {}", input.display());
    match out.plan.renditions() {
        [] => println!("Strategy: single stream"),
        rungs => {
            println!("Strategy: ladder of {}", rungs.len());
            for (index, rung) in rungs.iter().enumerate() {
                println!(
                    "  v{index}: {}x{} @ {} bps",
                    rung.computed_width, rung.target_height, rung.max_bitrate_bps
                );
            }
        }
    }
    println!("Playlist: {}", out.entry_playlist.display());
    println!(
        "Files:    {} playlist(s), {} segment(s)",
        out.tree.playlists.len(),
        out.tree.segments.len()
    );

    Ok(())
}

async fn probe_file(path: &Path, json: bool, config: &Config) -> Result<()> {
    let tools = ToolRegistry::discover(&config.tools);
    let ffprobe = tools.require(FFPROBE)?;
    let prober = FfprobeProber::new(ffprobe.path.clone(), config.transcode.probe_timeout());

    let probe = prober.probe(path, &CancellationToken::new()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&probe)?);
    } else {
        print_probe(path, &probe);
    }

    Ok(())
}

fn print_probe(path: &Path, probe: &MediaProbe) {
    println!("File:       {}", path.display());
    println!("Resolution: {}x{}", probe.width, probe.height);
    println!(
        "Audio:      {}",
        if probe.has_audio { "yes (copied)" } else { "no (AAC fallback)" }
    );
}

fn plan(
    width: u32,
    height: u32,
    max_rungs: Option<usize>,
    json: bool,
    config: &Config,
) -> Result<()> {
    let probe = MediaProbe {
        width,
        height,
        has_audio: true,
    };
    let rungs = max_rungs.unwrap_or(config.transcode.max_rungs);
    let ladder = plan_ladder(&probe, &config.transcode.ladder, rungs)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ladder)?);
        return Ok(());
    }

    println!("Source: {width}x{height}");
    for (index, rung) in ladder.iter().enumerate() {
        println!(
            "v{index}  {:>5}  {:>4}x{:<4}  maxrate {} bps  bufsize {} bps",
            rung.label(),
            rung.computed_width,
            rung.target_height,
            rung.max_bitrate_bps,
            rung.bufsize_bps()
        );
    }

    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let statuses = ToolRegistry::discover(&config.tools).statuses();
    for status in &statuses {
        let mark = if status.is_available() { "✓" } else { "✗" };
        let mut line = format!("{mark} {}", status.name);
        if let Some(version) = &status.version {
            line.push_str(&format!(" ({version})"));
        }
        if let Some(tool) = &status.resolved {
            line.push_str(&format!(" - {}", tool.path.display()));
        }
        println!("{line}");
    }

    println!();
    if statuses.iter().all(ToolStatus::is_available) {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable transcoding.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read {}", p.display()))?;
            Config::from_json(&text)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("Configuration has {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  ⚠ {warning}");
        }
    }

    let t = &config.transcode;
    println!("  Size threshold: {} MB", t.size_threshold_mb);
    println!("  Ladder rungs: {} of {}", t.max_rungs, t.ladder.len());
    println!("  Segment duration: {}s", t.segment_duration_secs);
    println!(
        "  Encoder: libx264 preset {} crf {} gop {} threads {}",
        t.preset, t.crf, t.keyframe_interval, t.threads
    );
    match t.encode_timeout() {
        Some(d) => println!("  Encode timeout: {}s", d.as_secs()),
        None => println!("  Encode timeout: none"),
    }

    Ok(())
}
