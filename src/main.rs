use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;

use promptvault::config::Config;
use promptvault::extraction::{ExtractionSession, ImagePayload, Notice};
use promptvault::logging;
use promptvault::ocr::TextRecognitionEngine;

struct Args {
    config_path: Option<PathBuf>,
    image: PathBuf,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut command = None;
    let mut image = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("promptvault {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "scan" if command.is_none() => command = Some("scan"),
            arg if command.is_some() && image.is_none() && !arg.starts_with('-') => {
                image = Some(PathBuf::from(arg));
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    match image {
        Some(image) => Args { config_path, image },
        None => {
            eprintln!("Error: scan requires an image path");
            print_help();
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"promptvault - prompt reference library with OCR prompt extraction

USAGE:
    promptvault [OPTIONS] scan IMAGE

COMMANDS:
    scan IMAGE          Read the prompt printed on IMAGE

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PROMPTVAULT_CONFIG  Path to config file (overrides default location)
    PROMPTVAULT_LOG     Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/promptvault/config.toml"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(Some(Config::config_dir().join("logs")));

    let config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let engine = Arc::new(TextRecognitionEngine::from_config(&config.ocr));
    let mut session = ExtractionSession::from_config(engine, &config);
    let mut progress = session.subscribe();

    let payload = ImagePayload::from_file(&args.image, config.ocr.max_image_bytes)?;
    session.start(payload)?;

    let mut last = 0;
    loop {
        let snapshot = progress.borrow_and_update().clone();
        if snapshot.progress != last {
            last = snapshot.progress;
            eprint!("\rReading prompt... {:>3}%", last);
        }
        if !snapshot.state.is_processing() {
            eprintln!();
            break;
        }
        if progress.changed().await.is_err() {
            break;
        }
    }

    match session.snapshot().notice() {
        Some(Notice::Extracted(_)) => {
            println!("{}", session.accept()?);
            Ok(())
        }
        Some(Notice::NothingDetected) => {
            eprintln!("No text detected. Try a sharper or closer image.");
            Ok(())
        }
        Some(Notice::Failed(e)) => Err(e.into()),
        None => Err(anyhow!("Extraction ended without a result")),
    }
}
