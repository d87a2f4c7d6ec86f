//! Voxel Scene CLI
//!
//! Build standalone voxel scene documents from generated placement programs.

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use voxel_scene::{
    extract_document, host::embed_frame, BuildGuide, ControlMessage, EnvironmentState, Interpreter,
    SceneBuilder, SceneConfig,
};

#[derive(Parser)]
#[command(name = "voxel-scene")]
#[command(author, version, about = "Build explorable voxel scenes from placement programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a scene document from generator output
    Build {
        /// Generator output or program file ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output HTML file
        #[arg(short, long)]
        output: PathBuf,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Scale factor for the initial camera placement
        #[arg(long)]
        camera_scale: Option<f64>,

        /// Keep only the last block placed at each coordinate
        #[arg(long)]
        dedupe: bool,

        /// Initial time of day (0.0 to 1.0)
        #[arg(long)]
        sunlight: Option<f32>,

        /// Initial god-ray intensity (0.0 to 1.0)
        #[arg(long)]
        godrays: Option<f32>,

        /// Write a sandboxed iframe wrapping the document instead
        #[arg(long)]
        frame: bool,
    },

    /// Print the document or program extracted from generator output
    Extract {
        /// Generator output file ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
    },

    /// Print the build guide of a program as JSON
    Guide {
        /// Generator output or program file ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
    },

    /// Print a control-channel payload
    Message {
        #[command(subcommand)]
        message: MessageKind,
    },
}

#[derive(Subcommand)]
enum MessageKind {
    /// Set time of day and god-ray intensity
    Environment {
        #[arg(long)]
        sunlight: f64,

        #[arg(long)]
        godrays: f64,
    },
    /// Show or hide the build guide
    Toggle,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            config,
            camera_scale,
            dedupe,
            sunlight,
            godrays,
            frame,
        } => {
            let mut config = match config {
                Some(path) => SceneConfig::from_json_file(path)?,
                None => SceneConfig::default(),
            };
            if let Some(factor) = camera_scale {
                config = config.with_camera_scale(factor);
            }
            if dedupe {
                config = config.with_dedupe(true);
            }
            if sunlight.is_some() || godrays.is_some() {
                let current = config.initial_environment;
                config = config.with_initial_environment(EnvironmentState::new(
                    sunlight.unwrap_or(current.time_of_day),
                    godrays.unwrap_or(current.god_ray_intensity),
                ));
            }
            config.validate()?;
            build(&input, &output, config, frame)?;
        }
        Commands::Extract { input } => {
            println!("{}", extract_document(&read_input(&input)?));
        }
        Commands::Guide { input } => {
            let program = extract_document(&read_input(&input)?);
            let interpretation = Interpreter::default().run(&program);
            if let Some(message) = interpretation.error_message() {
                eprintln!("Program failed, showing fallback structure: {}", message);
            }
            let guide = BuildGuide::from_voxels(&interpretation.voxels);
            println!("{}", serde_json::to_string_pretty(&guide)?);
        }
        Commands::Message { message } => {
            let message = match message {
                MessageKind::Environment { sunlight, godrays } => ControlMessage::Environment { sunlight, godrays },
                MessageKind::Toggle => ControlMessage::ToggleInstructions,
            };
            println!("{}", message.to_json()?);
        }
    }

    Ok(())
}

fn build(input: &Path, output: &Path, config: SceneConfig, frame: bool) -> Result<(), Box<dyn std::error::Error>> {
    let text = read_input(input)?;
    let mut builder = SceneBuilder::new(config);
    let result = builder.build(&text)?;

    if result.is_passthrough() {
        println!("Input was a complete document; cleaned and passed through");
    } else {
        println!(
            "Placed {} blocks over {} layers ({} block types)",
            result.guide.total_blocks(),
            result.guide.layers.len(),
            result.guide.totals.len()
        );
        if result.used_fallback() {
            println!("  Used the fallback structure");
        }
        if let Some(error) = &result.error {
            println!("  Error: {}", error);
        }
    }

    let html = if frame { embed_frame(&result.html) } else { result.html };
    fs::write(output, &html)?;
    println!("Wrote {} bytes to {:?}", html.len(), output);

    Ok(())
}

fn read_input(path: &Path) -> io::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        fs::read_to_string(path)
    }
}
