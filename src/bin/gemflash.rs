// gemflash - generate, edit and compose images through the image service

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use gemflash::StudioConfig;
use gemflash::studio::upload::load_file;
use gemflash::studio::{
    AspectRatio, DirectorySaver, ImageId, NoticeLevel, OutputFormat, PoolKind, Resolution, Studio,
    Tab,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate, edit and compose images with a remote AI image service", long_about = None)]
struct Cli {
    /// Config file (defaults to .gemflash.toml in the current or home directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Image service base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory results are saved to
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct OutputOptions {
    /// Aspect ratio, e.g. 1:1 or 16:9
    #[arg(short, long)]
    aspect_ratio: Option<AspectRatio>,

    /// Output resolution (1K, 2K or 4K)
    #[arg(short, long)]
    resolution: Option<Resolution>,

    /// Output format (png, jpeg or webp)
    #[arg(short, long)]
    format: Option<OutputFormat>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an image from a text prompt
    Generate {
        /// Text prompt describing the image
        #[arg(short, long)]
        prompt: String,

        #[command(flatten)]
        output: OutputOptions,
    },

    /// Edit an existing image
    Edit {
        /// Description of the change
        #[arg(short, long)]
        prompt: String,

        /// Local image to edit
        #[arg(short, long, conflicts_with = "url", required_unless_present = "url")]
        image: Option<PathBuf>,

        /// Image URL to edit
        #[arg(short, long)]
        url: Option<String>,

        #[command(flatten)]
        output: OutputOptions,
    },

    /// Combine several images into one
    Compose {
        /// Description of the composition
        #[arg(short, long)]
        prompt: String,

        /// Images to combine, in order
        #[arg(short, long = "image", required = true, num_args = 1..)]
        images: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputOptions,
    },

    /// Write a config file with default settings
    InitConfig {
        #[arg(default_value = ".gemflash.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gemflash={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Command::InitConfig { path } = &cli.command {
        return init_config(path);
    }

    let mut config = StudioConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    tracing::debug!(base_url = %config.api.base_url, "Using image service");

    let saver = DirectorySaver::new(&config.output_dir);
    let mut studio = Studio::connect(config)?;

    let (tab, pool) = match cli.command {
        Command::Generate { prompt, output } => {
            prepare(&mut studio, Tab::Generate, prompt, &output);
            (Tab::Generate, PoolKind::Generated)
        }
        Command::Edit {
            prompt,
            image,
            url,
            output,
        } => {
            prepare(&mut studio, Tab::Edit, prompt, &output);
            match (image, url) {
                (Some(path), _) => {
                    let file = load_file(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    studio.set_edit_upload(file)?;
                }
                (None, Some(url)) => studio.set_edit_url(url),
                (None, None) => bail!("either --image or --url is required"),
            }
            (Tab::Edit, PoolKind::Edited)
        }
        Command::Compose {
            prompt,
            images,
            output,
        } => {
            prepare(&mut studio, Tab::Compose, prompt, &output);
            let mut files = Vec::with_capacity(images.len());
            for path in &images {
                let file = load_file(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                files.push(file);
            }

            // Uploads are listed newest first; select in command-line order
            let ids = studio.upload_compose_files(files);
            print_notices(&mut studio);
            for id in ids? {
                studio.toggle_compose_selection(id)?;
            }
            (Tab::Compose, PoolKind::Composed)
        }
        Command::InitConfig { path } => return init_config(&path),
    };

    let result = run_with_progress(&mut studio, tab).await;
    print_notices(&mut studio);
    let id = result?;

    let path = studio.download(pool, id, &saver)?;
    println!("{}", path.display());
    Ok(())
}

fn init_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    StudioConfig::default().to_file(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn prepare(studio: &mut Studio, tab: Tab, prompt: String, output: &OutputOptions) {
    studio.set_prompt(tab, prompt);
    if let Some(aspect_ratio) = output.aspect_ratio {
        studio.set_aspect_ratio(tab, aspect_ratio);
    }
    if let Some(resolution) = output.resolution {
        studio.set_resolution(tab, resolution);
    }
    if let Some(format) = output.format {
        studio.set_format(tab, format);
    }
}

/// Dispatch the tab's request, redrawing the progress line until it settles
async fn run_with_progress(studio: &mut Studio, tab: Tab) -> gemflash::studio::Result<ImageId> {
    let pending = studio.begin(tab)?;
    let api = studio.api();
    let request = api.dispatch(&pending.request);
    tokio::pin!(request);

    let mut ticker = tokio::time::interval(Duration::from_millis(
        studio.config().progress.interval_ms.max(1),
    ));
    let outcome = loop {
        tokio::select! {
            outcome = &mut request => break outcome,
            _ = ticker.tick() => draw_progress(studio, tab),
        }
    };

    let result = studio.complete(pending.ticket, outcome);
    draw_progress(studio, tab);
    eprintln!();
    result
}

fn draw_progress(studio: &Studio, tab: Tab) {
    let percent = studio.progress(tab);
    let label = studio.progress_stage(tab).label();
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "\r{:>3}% {:<24}", percent, label);
    let _ = stderr.flush();
}

fn print_notices(studio: &mut Studio) {
    for notice in studio.drain_notices() {
        match notice.level {
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
            NoticeLevel::Success | NoticeLevel::Info => eprintln!("{}", notice.message),
        }
    }
}
