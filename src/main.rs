use beatmapper::groove::GridResolution;
use beatmapper::{process_audio_file, PipelineConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Drum recording to rhythm-game beatmap transcriber
#[derive(Parser)]
#[command(name = "beatmapper")]
#[command(about = "Turn drum recordings into lane-assigned rhythm-game beatmaps")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe a WAV file into a beatmap
    Process {
        /// Input audio file (WAV)
        input: PathBuf,

        /// Beatmap JSON to write (parent directories are created)
        #[arg(short, long)]
        output: PathBuf,

        /// Also write a per-onset debug trace here
        #[arg(long)]
        debug_output: Option<PathBuf>,

        /// Configuration file (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Quantization grid (e.g. "sixteenth", "1/8", "1/8T")
        #[arg(long)]
        grid: Option<GridResolution>,

        /// Fixed tempo instead of estimating it
        #[arg(long)]
        bpm: Option<f64>,

        /// Minimum classifier confidence [0, 1]
        #[arg(long)]
        confidence_threshold: Option<f32>,

        /// Onset detection sensitivity [0, 1]
        #[arg(long)]
        sensitivity: Option<f32>,

        /// Maximum snap distance in milliseconds
        #[arg(long)]
        max_snap_error_ms: Option<f64>,

        /// Classifier model file
        #[arg(long)]
        model: Option<PathBuf>,

        /// Use the heuristic classifier only
        #[arg(long)]
        no_ml: bool,

        /// Skip drum separation
        #[arg(long)]
        no_isolate: bool,

        /// Drop hits the classifier could not label
        #[arg(long)]
        drop_unknown: bool,

        /// Beatmap title (defaults to the input file name)
        #[arg(long)]
        title: Option<String>,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            debug_output,
            config,
            grid,
            bpm,
            confidence_threshold,
            sensitivity,
            max_snap_error_ms,
            model,
            no_ml,
            no_isolate,
            drop_unknown,
            title,
        } => {
            let mut config = match config {
                Some(path) => PipelineConfig::load(&path)?,
                None => PipelineConfig::default(),
            };

            if let Some(grid) = grid {
                config.quantization_grid = grid;
            }
            if let Some(bpm) = bpm {
                config.bpm = Some(bpm);
            }
            if let Some(threshold) = confidence_threshold {
                config.confidence_threshold = threshold;
            }
            if let Some(sensitivity) = sensitivity {
                config.detection_sensitivity = sensitivity;
            }
            if let Some(max_snap) = max_snap_error_ms {
                config.max_snap_error_ms = max_snap;
            }
            if model.is_some() {
                config.model_path = model;
            }
            if title.is_some() {
                config.title = title;
            }
            if no_ml {
                config.use_ml_classifier = false;
            }
            if no_isolate {
                config.isolate_drums = false;
            }
            if drop_unknown {
                config.drop_unknown = true;
            }

            config.apply_process_env();

            let result = process_audio_file(&input, &output, &config, debug_output.as_deref())?;

            println!(
                "Wrote {} hits ({} classifier) to {}",
                result.hit_count,
                result.classifier_mode,
                result.output_path.display()
            );
            if let Some(debug_path) = result.debug_path {
                println!("Debug trace: {}", debug_path.display());
            }
        }
        Commands::ValidateConfig { config } => {
            let config = PipelineConfig::load(&config)?;
            config.validate()?;
            println!("Configuration is valid");
            println!("{}", config.to_toml_string()?);
        }
        Commands::ShowConfig => {
            let config = PipelineConfig::default();
            println!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
