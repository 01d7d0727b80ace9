mod layers;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use airmix_compositor::{Compositor, InputFrame};
use airmix_core::{hash, AirmixConfig, DeviceBackend, FormatDesc, SystemFrame, VideoFormat};

use crate::layers::LayerSource;

#[derive(Parser)]
#[command(
    name = "airmix",
    version,
    about = "Airmix: real-time frame compositor for broadcast graphics"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite synthetic layers in real time and report what came out
    Run(RunArgs),

    /// List the output format presets
    Formats,

    /// Print the default configuration as TOML
    Config,
}

#[derive(Args)]
struct RunArgs {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format preset, overrides the config file
    #[arg(short, long)]
    format: Option<String>,

    /// Number of ticks to composite
    #[arg(long, default_value_t = 250)]
    ticks: u64,

    /// Layers per tick
    #[arg(long, default_value_t = 3)]
    layers: usize,

    /// Device backend: software or wgpu, overrides the config file
    #[arg(long)]
    backend: Option<DeviceBackend>,

    /// Composite as fast as possible instead of at the format's frame rate
    #[arg(long)]
    unpaced: bool,

    /// Write the last composited frame to this PNG file
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let config = load_config(&args)?;
            init_tracing(&config.logging.filter);
            cmd_run(args, config)
        }
        Commands::Formats => cmd_formats(),
        Commands::Config => cmd_config(),
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

fn load_config(args: &RunArgs) -> Result<AirmixConfig> {
    let mut config = match &args.config {
        Some(path) => AirmixConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AirmixConfig::default(),
    };
    if let Some(name) = &args.format {
        config.format.name = name.clone();
    }
    if let Some(backend) = args.backend {
        config.compositor.backend = backend;
    }
    Ok(config)
}

fn cmd_run(args: RunArgs, config: AirmixConfig) -> Result<()> {
    let desc = config
        .format
        .to_desc()
        .context("invalid output format")?;
    let compositor = Compositor::with_config(desc.clone(), config.compositor.clone())
        .context("failed to start compositor")?;

    println!(
        "Compositing {} ticks of {} layers at {} {}x{} ({:.2} fps, {:?} device)",
        args.ticks,
        args.layers,
        desc.format,
        desc.width,
        desc.height,
        desc.fps(),
        config.compositor.backend
    );

    let mut sources: Vec<LayerSource> = (0..args.layers)
        .map(|i| LayerSource::new(i, args.layers, &desc))
        .collect();

    let interval = desc.frame_interval();
    let start = Instant::now();
    let mut deadline = start;
    let mut popped = 0u64;
    let mut last: Option<Arc<SystemFrame>> = None;

    for tick in 0..args.ticks {
        let frames = build_tick(&compositor, &mut sources, tick)?;
        compositor.push(frames)?;

        while let Some(frame) = compositor.try_pop() {
            popped += 1;
            last = Some(frame);
        }

        if !args.unpaced {
            deadline += interval;
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            } else if now - deadline > interval {
                tracing::warn!(
                    "tick {} is {:.1} ms late",
                    tick,
                    (now - deadline).as_secs_f64() * 1000.0
                );
            }
        }
    }

    compositor.flush()?;
    while let Some(frame) = compositor.try_pop() {
        popped += 1;
        last = Some(frame);
    }
    let elapsed = start.elapsed();
    let stats = compositor.stats();
    compositor.shutdown()?;

    println!();
    println!("   Ticks:      {} in {:.2}s", args.ticks, elapsed.as_secs_f64());
    println!("   Rate:       {:.1} ticks/s", rate(args.ticks, elapsed));
    println!("   Outputs:    {}", popped);
    println!("   Stats:      {}", serde_json::to_string_pretty(&stats)?);

    if let Some(frame) = last {
        println!("   Last hash:  {}", hash::hash_frame(&frame));
        if let Some(path) = &args.snapshot {
            write_png(&frame, path)?;
            println!("   Snapshot:   {}", path.display());
        }
    }
    Ok(())
}

/// Even layers are drawn straight into pooled frames, odd layers into host
/// frames that the compositor copies.
fn build_tick(
    compositor: &Compositor,
    sources: &mut [LayerSource],
    tick: u64,
) -> Result<Vec<InputFrame>> {
    let mut frames: Vec<InputFrame> = Vec::with_capacity(sources.len());
    for (i, source) in sources.iter_mut().enumerate() {
        let host = source.render(tick);
        if i % 2 == 0 {
            let mut frame = compositor.create_frame(host.image.width, host.image.height)?;
            frame.pixels_mut().copy_from_slice(host.data());
            frame.audio_mut().copy_from(host.audio.samples());
            frames.push(frame.into());
        } else {
            frames.push(host.into());
        }
    }
    Ok(frames)
}

fn rate(ticks: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        ticks as f64 / secs
    } else {
        0.0
    }
}

fn write_png(frame: &SystemFrame, path: &Path) -> Result<()> {
    let image = image::RgbaImage::from_raw(frame.image.width, frame.image.height, frame.data().to_vec())
        .context("frame buffer does not match its dimensions")?;
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn cmd_formats() -> Result<()> {
    println!("{:<12} {:>6} {:>6} {:>9}  {}", "NAME", "WIDTH", "HEIGHT", "FPS", "SCAN");
    for preset in VideoFormat::PRESETS {
        let desc = FormatDesc::preset(preset)?;
        println!(
            "{:<12} {:>6} {:>6} {:>9.3}  {:?}",
            preset.name(),
            desc.width,
            desc.height,
            desc.fps(),
            desc.field_mode
        );
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    print!("{}", AirmixConfig::default().to_toml()?);
    Ok(())
}
