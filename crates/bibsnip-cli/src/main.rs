use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

use bibsnip_core::config_file;
use bibsnip_core::workbench::Workbench;
use bibsnip_llm::{DEFAULT_VERIFY_TIMEOUT, Provider, Session};
use bibsnip_pdf_mupdf::MupdfBackend;

/// Resolve click-dragged citation selections from a PDF into BibTeX
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify an API key against its provider and persist it on success
    VerifyKey {
        /// API key (defaults to the environment, then the saved key file)
        #[arg(long)]
        api_key: Option<String>,

        /// Force a provider (openai|gemini) instead of detecting it from
        /// the key shape
        #[arg(long)]
        provider: Option<String>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Resolve citation selections from a PDF into BibTeX
    Resolve {
        /// Path to the PDF
        file_path: PathBuf,

        /// Selection text to resolve (repeatable). With none given, one
        /// selection per stdin line is resolved until EOF.
        #[arg(short, long = "selection")]
        selections: Vec<String>,

        /// API key (defaults to the environment, then the saved key file)
        #[arg(long)]
        api_key: Option<String>,

        /// Force a provider (openai|gemini)
        #[arg(long)]
        provider: Option<String>,

        /// Model name override
        #[arg(long)]
        model: Option<String>,

        /// Path to the output log (stdout when absent)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Skip key verification before resolving
        #[arg(long)]
        skip_verify: bool,
    },

    /// Print the (narrowed) context window for a PDF and exit
    Context {
        /// Path to the PDF
        file_path: PathBuf,

        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        provider: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        no_color: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::VerifyKey {
            api_key,
            provider,
            no_color,
        } => verify_key(api_key, provider, ColorMode(!no_color)).await,
        Command::Resolve {
            file_path,
            selections,
            api_key,
            provider,
            model,
            output,
            no_color,
            skip_verify,
        } => {
            let use_color = !no_color && output.is_none();
            resolve(
                file_path,
                selections,
                api_key,
                provider,
                model,
                output,
                ColorMode(use_color),
                skip_verify,
            )
            .await
        }
        Command::Context {
            file_path,
            api_key,
            provider,
            model,
            no_color,
        } => context(file_path, api_key, provider, model, ColorMode(!no_color)).await,
    }
}

/// Resolve key material: CLI flag > environment > saved key file.
fn resolve_api_key(api_key: Option<String>) -> anyhow::Result<String> {
    api_key
        .or_else(config_file::load_api_key)
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No API key. Pass --api-key, set GOOGLE_API_KEY/OPENAI_API_KEY, or run: bibsnip verify-key"
            )
        })
}

/// Build the provider session. Provider and model come from flags, then
/// the config file, then key-shape detection.
fn build_session(
    api_key: &str,
    provider: Option<String>,
    model: Option<String>,
    config: &config_file::ConfigFile,
) -> anyhow::Result<Session> {
    let provider = match provider.or_else(|| config.provider.clone()) {
        Some(tag) => Provider::parse(&tag)
            .ok_or_else(|| anyhow::anyhow!("Unknown provider '{tag}' (expected openai|gemini)"))?,
        None => Provider::detect(api_key),
    };

    let mut session = Session::with_provider(api_key, provider)?;
    if let Some(model) = model.or_else(|| config.model.clone()) {
        session.set_model(model);
    }
    Ok(session)
}

fn verify_timeout(config: &config_file::ConfigFile) -> Duration {
    config
        .verify_timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_VERIFY_TIMEOUT)
}

async fn verify_key(
    api_key: Option<String>,
    provider: Option<String>,
    color: ColorMode,
) -> anyhow::Result<()> {
    let config = config_file::load_config();
    let key = resolve_api_key(api_key)?;
    let session = build_session(&key, provider, None, &config)?;

    output::status(color, "Verifying...");
    let (ok, msg) = session.validate_connection(verify_timeout(&config)).await;
    if !ok {
        output::error(color, &format!("Error: {}", output::shorten(&msg, 80)));
        anyhow::bail!("key verification failed");
    }

    output::success(
        color,
        &format!("Connected ({}). Using {}.", session.provider(), session.model()),
    );
    output::status(
        color,
        &format!(
            "Available models: {}",
            session.provider().available_models().join(", ")
        ),
    );
    match config_file::save_api_key(&key) {
        Ok(path) => output::status(color, &format!("Key saved to {}.", path.display())),
        Err(e) => output::error(color, &format!("Key not saved: {e}")),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn resolve(
    file_path: PathBuf,
    selections: Vec<String>,
    api_key: Option<String>,
    provider: Option<String>,
    model: Option<String>,
    output_path: Option<PathBuf>,
    color: ColorMode,
    skip_verify: bool,
) -> anyhow::Result<()> {
    let config = config_file::load_config();
    let key = resolve_api_key(api_key)?;
    let session = build_session(&key, provider, model, &config)?;

    if !skip_verify {
        output::status(color, "Verifying API key...");
        let (ok, msg) = session.validate_connection(verify_timeout(&config)).await;
        if !ok {
            output::error(color, &format!("Error: {}", output::shorten(&msg, 80)));
            anyhow::bail!("key verification failed");
        }
        output::success(
            color,
            &format!("Connected ({}). Using {}.", session.provider(), session.model()),
        );
        if let Err(e) = config_file::save_api_key(&key) {
            tracing::warn!(error = %e, "failed to persist verified key");
        }
    }

    let mut writer: Box<dyn Write> = if let Some(ref path) = output_path {
        Box::new(std::fs::File::create(path)?)
    } else {
        Box::new(std::io::stdout())
    };

    let wb = open_and_analyze(session, &file_path, color).await?;

    let mut resolved = 0usize;
    if selections.is_empty() {
        output::status(color, "Reading selections from stdin (one per line)...");
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            resolve_one(&wb, &line, &mut writer, color).await?;
            resolved += 1;
        }
    } else {
        for selection in &selections {
            resolve_one(&wb, selection, &mut writer, color).await?;
            resolved += 1;
        }
    }

    output::status(color, &format!("Done. {resolved} selection(s) resolved."));
    Ok(())
}

async fn context(
    file_path: PathBuf,
    api_key: Option<String>,
    provider: Option<String>,
    model: Option<String>,
    color: ColorMode,
) -> anyhow::Result<()> {
    let config = config_file::load_config();
    let key = resolve_api_key(api_key)?;
    let session = build_session(&key, provider, model, &config)?;

    let wb = open_and_analyze(session, &file_path, color).await?;
    let mut stdout = std::io::stdout();
    stdout.write_all(wb.context().as_bytes())?;
    Ok(())
}

/// Open the document, then run narrowing and style detection in background
/// tasks, applying their results as they arrive.
async fn open_and_analyze(
    session: Session,
    file_path: &Path,
    color: ColorMode,
) -> anyhow::Result<Workbench> {
    if !file_path.exists() {
        anyhow::bail!("File not found: {}", file_path.display());
    }

    let mut wb = Workbench::new(Arc::new(session));
    wb.open_document(&MupdfBackend::new(), file_path)?;
    output::status(
        color,
        &format!(
            "Loaded {} pages ({} chars). Locating bibliography...",
            wb.accessor().page_count(),
            wb.context().len()
        ),
    );

    let (tx, mut rx) = mpsc::channel(4);
    wb.spawn_background_analysis(tx);
    while let Some(event) = rx.recv().await {
        if let Some(status) = wb.apply_event(event) {
            output::status(color, &status);
        }
    }

    Ok(wb)
}

async fn resolve_one(
    wb: &Workbench,
    selection: &str,
    writer: &mut Box<dyn Write>,
    color: ColorMode,
) -> anyhow::Result<()> {
    output::status(color, "Resolving selection with LLM...");
    let block = wb.resolve_selection(selection).await;
    writeln!(writer, "{block}\n")?;
    writer.flush()?;
    Ok(())
}
