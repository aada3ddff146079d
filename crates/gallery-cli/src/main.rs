use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gallery_contracts::{EventLog, GalleryEvent};
use gallery_engine::{
    list_images, process, thumbnail_or_original, HostRequest, PromptExtractor,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "prompt-gallery",
    version,
    about = "Extract generation prompts from image metadata"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the prompt stored in one image.
    Extract(ExtractArgs),
    /// List images in a directory.
    List(ListArgs),
    /// Pick an image (by name or seeded at random) and print its prompt.
    Pick(PickArgs),
    /// Write a JPEG thumbnail of one image.
    Thumbnail(ThumbnailArgs),
}

#[derive(Debug, Parser)]
struct ExtractArgs {
    #[arg(long)]
    image: PathBuf,
    /// Print `{text, trace}` as JSON instead of plain text.
    #[arg(long)]
    json: bool,
    /// Print the extraction trace to stderr.
    #[arg(long)]
    trace: bool,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ListArgs {
    #[arg(long)]
    dir: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct PickArgs {
    #[arg(long)]
    dir: Option<PathBuf>,
    #[arg(long)]
    file: Option<String>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long)]
    randomize: bool,
    #[arg(long)]
    json: bool,
    #[arg(long)]
    trace: bool,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ThumbnailArgs {
    #[arg(long)]
    dir: Option<PathBuf>,
    #[arg(long)]
    file: String,
    #[arg(long)]
    size: Option<u32>,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("prompt-gallery error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gallery_engine=info,prompt_gallery=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    match cli.command {
        Command::Extract(args) => run_extract(args),
        Command::List(args) => run_list(args, &config),
        Command::Pick(args) => run_pick(args, &config),
        Command::Thumbnail(args) => run_thumbnail(args, &config),
    }
}

fn run_extract(args: ExtractArgs) -> Result<i32> {
    let events = open_events(args.events);
    let result = PromptExtractor::new().extract(&args.image);

    if let Some(events) = &events {
        events.record(&GalleryEvent::prompt_extracted(&args.image, &result))?;
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.text);
    }
    if args.trace {
        eprintln!("{}", result.trace);
    }
    Ok(0)
}

fn run_list(args: ListArgs, config: &Config) -> Result<i32> {
    let dir = require_dir(config.directory(args.dir))?;
    let files = list_images(&dir)?;
    info!(dir = %dir.display(), count = files.len(), "listed images");
    for file in files {
        println!("{file}");
    }
    Ok(0)
}

fn run_pick(args: PickArgs, config: &Config) -> Result<i32> {
    let events = open_events(args.events);
    let directory = config
        .directory(args.dir)
        .map(|dir| dir.display().to_string())
        .unwrap_or_default();
    let request = HostRequest {
        directory,
        filename: args.file,
        seed: args.seed,
        randomize: args.randomize,
    };
    let response = process(&request);

    if let Some(events) = &events {
        events.record(&GalleryEvent::ImagePicked {
            directory: request.directory.clone(),
            filename: request.filename.clone(),
            seed: request.seed,
            randomize: request.randomize,
            prompt_chars: response.prompt.chars().count(),
        })?;
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.prompt);
    }
    if args.trace {
        eprintln!("{}", response.trace);
    }
    Ok(0)
}

fn run_thumbnail(args: ThumbnailArgs, config: &Config) -> Result<i32> {
    let events = open_events(args.events);
    let dir = require_dir(config.directory(args.dir))?;
    let path = dir.join(&args.file);
    if !path.exists() {
        bail!("File not found {}", path.display());
    }
    let size = config.thumbnail_size(args.size);
    let (bytes, mime) = thumbnail_or_original(&path, size)?;
    fs::write(&args.out, &bytes)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    info!(
        image = %path.display(),
        out = %args.out.display(),
        size,
        bytes = bytes.len(),
        "thumbnail written"
    );
    if let Some(events) = &events {
        events.record(&GalleryEvent::ThumbnailWritten {
            image: path.display().to_string(),
            out: args.out.display().to_string(),
            mime: mime.to_string(),
            bytes: bytes.len(),
        })?;
    }
    println!("{mime}");
    Ok(0)
}

fn require_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    dir.with_context(|| {
        format!(
            "No directory specified (pass --dir or set {})",
            config::DIR_ENV
        )
    })
}

fn open_events(path: Option<PathBuf>) -> Option<EventLog> {
    path.map(|path| EventLog::new(path, uuid::Uuid::new_v4().to_string()))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use serde_json::Value;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pick_flags_parse() {
        let cli = Cli::try_parse_from([
            "prompt-gallery",
            "pick",
            "--dir",
            "/srv/images",
            "--seed",
            "42",
            "--randomize",
        ])
        .unwrap();
        let Command::Pick(args) = cli.command else {
            panic!("expected pick");
        };
        assert_eq!(args.dir, Some(PathBuf::from("/srv/images")));
        assert_eq!(args.seed, 42);
        assert!(args.randomize);
        assert_eq!(args.file, None);
    }

    #[test]
    fn missing_directory_is_reported() {
        let err = require_dir(None).unwrap_err();
        assert!(err.to_string().contains("PROMPT_GALLERY_DIR"));
    }

    #[test]
    fn extract_writes_event_line() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let events_path = dir.path().join("events.jsonl");
        run_extract(ExtractArgs {
            image: dir.path().join("missing.png"),
            json: false,
            trace: false,
            events: Some(events_path.clone()),
        })?;

        let raw = fs::read_to_string(&events_path)?;
        let event: Value = serde_json::from_str(raw.trim())?;
        assert_eq!(event["type"], "prompt_extracted");
        assert!(event["trace"][0]
            .as_str()
            .is_some_and(|line| line.starts_with("Path checked: ")));
        assert!(event["text_chars"].as_u64().is_some_and(|chars| chars > 0));
        Ok(())
    }

    #[test]
    fn thumbnail_fallback_is_logged() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("broken.webp"), b"not an image")?;
        let out = dir.path().join("thumb.bin");
        let events_path = dir.path().join("events.jsonl");
        let config = Config::from_lookup(|_| None);

        run_thumbnail(
            ThumbnailArgs {
                dir: Some(dir.path().to_path_buf()),
                file: "broken.webp".to_string(),
                size: Some(64),
                out: out.clone(),
                events: Some(events_path.clone()),
            },
            &config,
        )?;

        assert_eq!(fs::read(&out)?, b"not an image");
        let event: Value = serde_json::from_str(fs::read_to_string(&events_path)?.trim())?;
        assert_eq!(event["type"], "thumbnail_written");
        assert_eq!(event["mime"], "image/webp");
        assert_eq!(event["bytes"], 12);
        Ok(())
    }
}
