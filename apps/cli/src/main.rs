//! Command-line host for the detection and sentiment services.
//!
//! ```text
//! veil models
//! veil download <model-id>
//! veil detect [--heuristic] <text>
//! veil redact [--preserve-length] [--heuristic] <text>
//! veil analyze <text>
//! ```
//!
//! `VEIL_MODEL_URL` sets the artifact server, `VEIL_CACHE_DIR` the cache root.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use veil_application::{EntityDetectionConfig, PiiDetector, SentimentAnalyzer, SentimentConfig};
use veil_events::{event_names, BroadcastEventBus};
use veil_inference::OnnxEngine;
use veil_models::{default_cache_dir, Catalog, HttpArtifactSource, ManagerConfig, ModelManager};

const DEFAULT_MODEL_URL: &str = "http://localhost:8080/models";

const USAGE: &str = "usage: veil <models | download <id> | detect [--heuristic] <text> | \
redact [--preserve-length] [--heuristic] <text> | analyze <text>>";

struct Args {
    command: String,
    flags: Vec<String>,
    rest: Vec<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        bail!(USAGE);
    };
    let (flags, rest): (Vec<String>, Vec<String>) = args.partition(|a| a.starts_with("--"));
    Ok(Args {
        command,
        flags,
        rest,
    })
}

impl Args {
    fn has_flag(&self, name: &str) -> bool {
        self.flags.iter().any(|f| f == name)
    }

    fn text(&self) -> Result<String> {
        if self.rest.is_empty() {
            bail!("missing text\n{USAGE}");
        }
        Ok(self.rest.join(" "))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,veil=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;

    let cache_dir = std::env::var_os("VEIL_CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(default_cache_dir);
    let base_url = std::env::var("VEIL_MODEL_URL").unwrap_or_else(|_| DEFAULT_MODEL_URL.into());

    let events = Arc::new(BroadcastEventBus::new(64));
    let manager = ModelManager::new(
        ManagerConfig::with_cache_dir(cache_dir),
        Catalog::builtin(),
        Arc::new(HttpArtifactSource::new(base_url)),
        Arc::new(OnnxEngine::new()),
        events.clone(),
    );
    manager
        .initialize()
        .await
        .context("failed to initialize model cache")?;

    match args.command.as_str() {
        "models" => {
            let models = manager.list().await;
            println!("{}", serde_json::to_string_pretty(&models)?);
        }
        "download" => {
            let Some(id) = args.rest.first() else {
                bail!("missing model id\n{USAGE}");
            };
            let mut progress = events.subscribe();
            let reporter = tokio::spawn(async move {
                while let Ok(event) = progress.recv().await {
                    if event.topic == event_names::DOWNLOAD_PROGRESS {
                        if let Some(p) = event.payload["progress"].as_f64() {
                            eprint!("\r{:>5.1}%", p * 100.0);
                        }
                    }
                }
            });
            let path = manager.download(id).await;
            reporter.abort();
            eprintln!();
            let path = path.with_context(|| format!("download of {id} failed"))?;
            println!("{}", path.display());
        }
        "detect" | "redact" => {
            let detector = PiiDetector::new(manager.clone());
            let config = EntityDetectionConfig {
                preserve_length: args.has_flag("--preserve-length"),
                heuristic_fallback: args.has_flag("--heuristic"),
                ..Default::default()
            };
            detector.initialize(config).await?;
            let text = args.text()?;
            if args.command == "detect" {
                let entities = detector.detect(&text).await?;
                println!("{}", serde_json::to_string_pretty(&entities)?);
            } else {
                let result = detector.redact(&text).await?;
                println!("{}", result.redacted_text);
            }
            tracing::debug!(stats = ?detector.stats(), "Detection finished");
        }
        "analyze" => {
            let analyzer = SentimentAnalyzer::new(manager.clone());
            analyzer.initialize(SentimentConfig::default()).await?;
            let result = analyzer.analyze(&args.text()?).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }

    Ok(())
}
