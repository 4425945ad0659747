//! Markcopy — copy web pages as Markdown, from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use markcopy_agent::StaticFrame;
use markcopy_core::{
    AgentStatus, ConversionOptions, FileSettingsStore, LineBreaks, MemorySettingsStore,
    COPY_COMMAND,
};
use markcopy_delivery::{check_url, DeliveryConfig, DeliveryCoordinator, LogNotifier};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod local;

use local::LocalHost;

fn resolve_data_dir() -> PathBuf {
    std::env::var("MARKCOPY_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_help() {
    println!("Markcopy — copy web pages as Markdown");
    println!();
    println!("Usage: markcopy <command>");
    println!();
    println!("Commands:");
    println!("  convert <file.html> [options]   Deliver a copy command to the page and print the Markdown");
    println!("      --url <url>                 Page URL (default: file:// path of the input)");
    println!("      --one-per-paragraph         No blank line between paragraphs");
    println!("      --no-readability            Skip article extraction when nothing is found");
    println!("  convert-html <file.html>        Convert the whole file, no content location");
    println!("  check-url <url>                 Report whether the extension may run on a URL");
    println!("  init [data-dir]                 Write default settings.json and delivery.json");
    println!("  help                            Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_help();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "convert" => {
            if args.len() < 3 {
                eprintln!("Usage: markcopy convert <file.html> [--url <url>] [--one-per-paragraph] [--no-readability]");
                std::process::exit(1);
            }
            convert(&args[2], &args[3..]).await
        }
        "convert-html" => {
            if args.len() < 3 {
                eprintln!("Usage: markcopy convert-html <file.html>");
                std::process::exit(1);
            }
            let html = std::fs::read_to_string(&args[2])?;
            let options = FileSettingsStore::new(&resolve_data_dir()).load();
            println!("{}", markcopy_convert::html_to_markdown(&html, &options));
            Ok(())
        }
        "check-url" => {
            if args.len() < 3 {
                eprintln!("Usage: markcopy check-url <url>");
                std::process::exit(1);
            }
            match check_url(&args[2]) {
                Ok(()) => {
                    println!("allowed: {}", args[2]);
                    Ok(())
                }
                Err(e) => {
                    println!("{}", e);
                    std::process::exit(2);
                }
            }
        }
        "init" => {
            let data_dir = if args.len() > 2 {
                PathBuf::from(&args[2])
            } else {
                resolve_data_dir()
            };
            let settings = FileSettingsStore::new(&data_dir);
            settings.save(&settings.load())?;
            let delivery = DeliveryConfig::load(&data_dir);
            delivery.save()?;
            info!("Wrote defaults to {}", data_dir.display());
            println!("{}", settings.path().display());
            println!("{}", delivery.config_path.display());
            Ok(())
        }
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}. Use 'markcopy help' for usage.", other);
            std::process::exit(1);
        }
    }
}

/// Run the full delivery protocol against a page loaded from `path`.
async fn convert(path: &str, flags: &[String]) -> anyhow::Result<()> {
    let data_dir = resolve_data_dir();
    let mut options: ConversionOptions = FileSettingsStore::new(&data_dir).load();
    let mut url = None;

    let mut flags = flags.iter();
    while let Some(flag) = flags.next() {
        match flag.as_str() {
            "--one-per-paragraph" => options.line_breaks = LineBreaks::OnePerParagraph,
            "--no-readability" => options.auto_readability = false,
            "--url" => {
                let value = flags
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--url needs a value"))?;
                url = Some(value.clone());
            }
            other => anyhow::bail!("Unknown option: {}", other),
        }
    }

    let document = std::fs::read_to_string(path)?;
    let url = match url {
        Some(url) => url,
        None => format!("file://{}", std::fs::canonicalize(path)?.display()),
    };

    let frame = Arc::new(StaticFrame::new(url, document));
    let settings = Arc::new(MemorySettingsStore::new(options));
    let host = Arc::new(LocalHost::new(frame, settings));
    let coordinator = DeliveryCoordinator::new(
        host.clone(),
        Arc::new(LogNotifier),
        DeliveryConfig::load(&data_dir),
    );

    let delivery = coordinator
        .on_command(COPY_COMMAND)
        .await
        .ok_or_else(|| anyhow::anyhow!("No active tab"))??;
    info!(
        "Delivered via {:?} after {} retries",
        delivery.path, delivery.retries
    );

    if let Some(toast) = host.frame().last_toast() {
        eprintln!("{}", toast);
    }
    match (delivery.response.status, host.copied()) {
        (AgentStatus::Ok, Some(markdown)) => {
            println!("{}", markdown);
            Ok(())
        }
        (AgentStatus::Error, _) => anyhow::bail!(
            "{}",
            delivery.response.message.unwrap_or_else(|| "Conversion failed".into())
        ),
        _ => std::process::exit(3),
    }
}
