use std::time::Duration;

use anyhow::{bail, Context, Result};
use grocery_extract::api_connection::connection::{ModelGateway, OpenAiGateway};
use grocery_extract::cli::{parse_args, Cli, OutputFormat};
use grocery_extract::config::AppConfig;
use grocery_extract::error::ExtractionFailure;
use grocery_extract::extraction::{ExecutionMode, ExtractionPipeline, QuantityTable};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn render(result: &Result<QuantityTable, ExtractionFailure>, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => match result {
            Ok(table) => serde_json::to_string_pretty(table).context("Failed to serialize quantity table"),
            Err(failure) => serde_json::to_string_pretty(failure).context("Failed to serialize failure"),
        },
        OutputFormat::Table => match result {
            Ok(table) if table.is_empty() => Ok("Nothing to buy.".to_string()),
            Ok(table) => {
                let width = table.keys().map(|name| name.chars().count()).max().unwrap_or(0);
                Ok(table
                    .iter()
                    .map(|(name, grams)| format!("{:<width$}  {:>8} g", name, grams, width = width))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            Err(failure) => Ok(format!("Error: {}", failure)),
        },
    }
}

async fn answer<G: ModelGateway>(
    pipeline: &ExtractionPipeline<G>,
    request: &str,
    format: OutputFormat,
) -> Result<bool> {
    let result = pipeline.get_ingredients_list(request).await;
    println!("{}", render(&result, format)?);
    Ok(result.is_ok())
}

fn build_pipeline(cli: &Cli, config: AppConfig) -> ExtractionPipeline<OpenAiGateway> {
    let mut settings = config.model;
    if let Some(model) = &cli.model {
        settings.model = model.clone();
    }
    if cli.no_proxy_auth {
        settings.proxy_auth = false;
    }

    let mode = if cli.concurrent {
        ExecutionMode::Concurrent
    } else {
        ExecutionMode::Sequential
    };
    let pipeline = ExtractionPipeline::new(OpenAiGateway::new(config.gateway), settings).with_mode(mode);
    match cli.timeout_secs {
        Some(secs) => pipeline.with_timeout(Duration::from_secs(secs)),
        None => pipeline,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = parse_args();
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    info!(model = %config.model.model, proxy = config.gateway.proxy.is_some(), "configuration loaded");
    let pipeline = build_pipeline(&cli, config);

    if cli.interactive {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
            let request = line.trim();
            if request.is_empty() {
                continue;
            }
            answer(&pipeline, request, cli.format).await?;
        }
        return Ok(());
    }

    let request = match (&cli.text, &cli.request_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read request file '{}'", path))?,
        (None, None) => bail!("Provide a request with --text, --request-file or --interactive"),
    };

    if !answer(&pipeline, request.trim(), cli.format).await? {
        std::process::exit(1);
    }
    Ok(())
}
