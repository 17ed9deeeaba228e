use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use pulse_visualiser_core::{
    AnalysisTap, AppConfig, BandHeuristicClassifier, BuildContext, FeatureExtractor,
    FileAssetLoader, HeadlessSurfaces, HueTracker, ManualClock, RenderScheduler, SignalTap,
    SourceClassifier, SurfaceSize, SystemClock, TickOutcome, Transport, Visualization,
    VisualizationKind, VisualizationRegistry,
};
use tracing_subscriber::EnvFilter;

fn main() -> pulse_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Play {
            input,
            visualization,
            seconds,
            fps,
            switch_to,
            switch_at,
            media,
            no_3d,
        } => run_play(
            &config,
            &input,
            PlayArgs {
                visualization,
                seconds,
                fps,
                switch_to,
                switch_at,
                media,
                no_3d,
            },
        ),
        Commands::Analyze { input, output, fps } => run_analyze(&config, &input, &output, fps),
        Commands::List => run_list(&config),
    }
}

struct PlayArgs {
    visualization: Option<String>,
    seconds: Option<f64>,
    fps: Option<u32>,
    switch_to: Option<String>,
    switch_at: f64,
    media: Vec<String>,
    no_3d: bool,
}

fn build_context(config: &AppConfig) -> BuildContext {
    BuildContext {
        size: SurfaceSize::new(config.display.width, config.display.height),
        seed: config.seed,
        loader: Arc::new(FileAssetLoader),
    }
}

fn run_play(config: &AppConfig, input: &Path, args: PlayArgs) -> pulse_visualiser_core::Result<()> {
    let initial: VisualizationKind = args
        .visualization
        .as_deref()
        .unwrap_or(config.visualization.as_str())
        .parse()?;
    let follow_up = args
        .switch_to
        .as_deref()
        .map(str::parse::<VisualizationKind>)
        .transpose()?;
    let fps = args.fps.unwrap_or(config.display.fps).max(1);
    tracing::info!(?input, %initial, fps, "starting headless playback");

    let mut transport = Transport::headless(Box::new(SystemClock::start()));
    let audio = transport.open_path(input)?;
    let mut tap = SignalTap::new(audio, &config.audio)?;

    let surfaces = if args.no_3d {
        HeadlessSurfaces::without_3d()
    } else {
        HeadlessSurfaces::new()
    };
    let mut scheduler = RenderScheduler::new(
        VisualizationRegistry::with_defaults(),
        Box::new(surfaces),
        build_context(config),
        Box::new(BandHeuristicClassifier::new(config.seed)),
    );
    scheduler.configure(&config.options);
    scheduler.switch_to(initial)?;
    if !args.media.is_empty() && !scheduler.set_media(&args.media) {
        tracing::warn!(%initial, "visualization does not display media items");
    }

    transport.play()?;
    scheduler.ensure_scheduled(&transport);

    let limit = args.seconds.unwrap_or_else(|| transport.duration());
    let interval = Duration::from_secs_f64(1.0 / fps as f64);
    let display = Instant::now();
    let mut pending_switch = follow_up;
    let mut rendered = 0u64;

    loop {
        let timestamp = display.elapsed().as_secs_f64();
        if timestamp >= limit {
            break;
        }

        if let Some(kind) = pending_switch {
            if timestamp >= args.switch_at {
                pending_switch = None;
                scheduler.switch_to(kind)?;
                if !args.media.is_empty() {
                    scheduler.set_media(&args.media);
                }
            }
        }

        match scheduler.tick(timestamp, &mut transport, &mut tap)? {
            TickOutcome::Rendered => rendered += 1,
            TickOutcome::Idle if !transport.is_playing() => break,
            TickOutcome::Idle => {}
        }

        let spent = display.elapsed().as_secs_f64() - timestamp;
        if let Some(rest) = interval.checked_sub(Duration::from_secs_f64(spent.max(0.0))) {
            thread::sleep(rest);
        }
    }

    transport.stop();
    scheduler.shutdown();
    tracing::info!(rendered, "playback finished");
    Ok(())
}

fn run_analyze(
    config: &AppConfig,
    input: &Path,
    output: &Path,
    fps: Option<u32>,
) -> pulse_visualiser_core::Result<()> {
    let fps = fps.unwrap_or(config.display.fps).max(1);
    tracing::info!(?input, ?output, fps, "running offline analysis");

    let clock = ManualClock::new();
    let mut transport = Transport::headless(Box::new(clock.clone()));
    let audio = transport.open_path(input)?;
    let mut tap = SignalTap::new(audio, &config.audio)?;
    let mut classifier = BandHeuristicClassifier::new(config.seed);
    let extractor = FeatureExtractor::new();
    let mut hue = HueTracker::new();

    transport.play()?;
    let step = 1.0 / fps as f64;
    let mut frames = Vec::new();

    while transport.is_playing() {
        let position = transport.position();
        let raw = tap.capture(position)?;
        let estimate = classifier.classify(&raw.frequency);
        let frame = extractor.extract_with_source(&raw.frequency, &raw.time_domain, estimate)?;
        let state = hue.observe(frame.source_label.as_deref(), frame.average_intensity);

        frames.push(serde_json::json!({
            "position": position,
            "hue": state.current_hue,
            "averageIntensity": frame.average_intensity,
            "bassEnergy": frame.bass_energy,
            "beatOnsets": frame.beat_onsets.len(),
            "sourceLabel": frame.source_label,
            "sourceConfidence": frame.source_confidence,
        }));

        clock.advance(step);
        transport.poll();
    }

    let file = std::fs::File::create(output)?;
    serde_json::to_writer_pretty(file, &frames)?;
    tracing::info!(frames = frames.len(), bins = tap.bin_count(), "analysis written");
    Ok(())
}

fn run_list(config: &AppConfig) -> pulse_visualiser_core::Result<()> {
    let registry = VisualizationRegistry::with_defaults();
    let mut surfaces = HeadlessSurfaces::new();
    let ctx = build_context(config);

    for kind in registry.kinds() {
        let mut visualization = registry.build(kind, &mut surfaces, &ctx)?;
        let capabilities = visualization.capabilities();
        visualization.destroy();

        let mut extras = Vec::new();
        if kind.is_3d() {
            extras.push("3d");
        }
        if capabilities.media_items {
            extras.push("media");
        }
        if capabilities.camera_controls {
            extras.push("camera");
        }
        println!("{:<12} {}", kind.id(), extras.join(", "));
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive visualiser", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play an audio file and drive a visualization in real time.
    Play {
        /// Audio file to play.
        input: PathBuf,
        /// Visualization to start with; defaults to the configured one.
        #[arg(short, long)]
        visualization: Option<String>,
        /// Stop after this many seconds instead of at the end of the media.
        #[arg(short, long)]
        seconds: Option<f64>,
        #[arg(long)]
        fps: Option<u32>,
        /// Visualization to switch to while playing.
        #[arg(long)]
        switch_to: Option<String>,
        /// Seconds into playback at which to switch.
        #[arg(long, default_value_t = 5.0)]
        switch_at: f64,
        /// Media URLs handed to visualizations that display them.
        #[arg(long, num_args = 1..)]
        media: Vec<String>,
        /// Pretend no 3D context is available.
        #[arg(long)]
        no_3d: bool,
    },
    /// Analyse an audio file offline and write per-tick features as JSON.
    Analyze {
        /// Audio file to analyse.
        input: PathBuf,
        /// Output path for the JSON frames.
        output: PathBuf,
        #[arg(long)]
        fps: Option<u32>,
    },
    /// List the available visualizations and their capabilities.
    List,
}
