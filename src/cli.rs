use crate::backend::HttpBackend;
use crate::model::{self, PanelEvent};
use crate::orchestrator::{PanelForm, RunController};
use crate::stats::RunStats;
use crate::storage::{ConfigStore, PanelConfig};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use tokio::sync::mpsc;

/// Output line routing for the stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "share-console",
    version,
    about = "Control panel for a remote batch share service"
)]
pub struct Cli {
    /// Base URL of the batch share backend
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub backend_url: String,

    /// Path to the credential blob JSON (appstate)
    #[arg(long)]
    pub appstate_file: Option<std::path::PathBuf>,

    /// Message attached to every share
    #[arg(long)]
    pub message: Option<String>,

    /// Target link to share
    #[arg(long)]
    pub link: Option<String>,

    /// Attempts per batch; invalid or non-positive values fall back to 5
    #[arg(long)]
    pub count: Option<String>,

    /// Seconds between attempts; invalid or non-positive values fall back to 15
    #[arg(long)]
    pub delay: Option<String>,

    /// Validate the credential and exit (no batch run)
    #[arg(long)]
    pub validate_only: bool,

    /// Print the run report as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print a text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Persist message/link/count/delay before running
    #[arg(long)]
    pub save_config: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    if !args.json && !args.text && !args.validate_only {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_headless(args).await;
        }
    }

    run_headless(args).await
}

/// Read the credential blob, empty when no file was given.
pub(crate) fn read_appstate(args: &Cli) -> Result<String> {
    match args.appstate_file.as_deref() {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading credential blob {}", path.display())),
        None => Ok(String::new()),
    }
}

/// Merge CLI flags over the persisted configuration. CLI values win; the
/// count/delay strings stay raw and are parsed permissively at run start.
pub(crate) fn build_form(args: &Cli, cfg: &PanelConfig, appstate_raw: String) -> PanelForm {
    PanelForm {
        appstate_raw,
        message: args
            .message
            .clone()
            .unwrap_or_else(|| cfg.message.clone()),
        link: args.link.clone().unwrap_or_else(|| cfg.url.clone()),
        count: args
            .count
            .clone()
            .unwrap_or_else(|| cfg.count.to_string()),
        delay: args
            .delay
            .clone()
            .unwrap_or_else(|| cfg.delay.to_string()),
    }
}

/// Final report for `--json` mode.
#[derive(Serialize)]
struct JsonReport {
    user: String,
    summary: model::RunSummary,
    stats: RunStats,
}

/// One-shot validate + run without the TUI, streaming log events to
/// stderr and the final summary to stdout.
async fn run_headless(args: Cli) -> Result<()> {
    let store = ConfigStore::new();
    let cfg = store.load();
    let appstate_raw = read_appstate(&args)?;
    let form = build_form(&args, &cfg, appstate_raw);

    let (out_tx, out_handle) = spawn_output_writer();

    if args.save_config {
        let path = store.save(&form.to_config())?;
        let _ = out_tx.send(OutputLine::Stderr(format!("Saved: {}", path.display())));
    }

    let backend = HttpBackend::new(&args.backend_url)?;
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<PanelEvent>();
    let mut controller = RunController::new(backend, evt_tx);

    // Stream controller log lines as they arrive.
    let printer = {
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            while let Some(ev) = evt_rx.recv().await {
                if let PanelEvent::Log { level, message } = ev {
                    let _ = out_tx.send(OutputLine::Stderr(format!(
                        "{} {}",
                        level.glyph(),
                        message
                    )));
                }
            }
        })
    };

    let outcome = run_operations(&args, &mut controller, &form, &out_tx).await;

    // Close the event stream before awaiting the printer.
    drop(controller);
    let _ = printer.await;
    drop(out_tx);
    let _ = out_handle.await;

    outcome
}

/// Validate, then (unless validate-only) run one batch and report.
async fn run_operations(
    args: &Cli,
    controller: &mut RunController<HttpBackend>,
    form: &PanelForm,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    let session = controller
        .validate(&form.appstate_raw)
        .await
        .context("session validation failed")?;

    if args.validate_only {
        let _ = out_tx.send(OutputLine::Stdout(format!("Session: {}", session.user)));
        return Ok(());
    }

    let req = form.run_request().context("building run request failed")?;
    let summary = controller.start(&req).await.context("batch run failed")?;
    let stats = controller.stats();

    if args.json {
        let report = JsonReport {
            user: session.user,
            summary,
            stats,
        };
        let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(&report)?));
    } else {
        let text = crate::text_summary::build_text_summary(Some(&session.user), &summary, &stats);
        for line in text.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    Ok(())
}
