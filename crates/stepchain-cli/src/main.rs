// crates/stepchain-cli/src/main.rs
// ============================================================================
// Module: Stepchain CLI Entry Point
// Description: Offline runner for problem specifications and trace files.
// Purpose: Execute, verify, and hash deterministically from the command line.
// Dependencies: clap, serde_json, stepchain-core, thiserror, tracing-subscriber
// ============================================================================

//! ## Overview
//! The Stepchain CLI runs a problem specification file through the engine and
//! emits its NDJSON trace, verifies the hash chain of an existing trace
//! file, and prints canonical hashes of JSON documents. All behavior is
//! deterministic: the clock seed defaults to the specification's
//! `created_at` and can be overridden for replay experiments.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde_json::Value;
use stepchain_core::ExecuteRequest;
use stepchain_core::Timestamp;
use stepchain_core::TimestampError;
use stepchain_core::TraceId;
use stepchain_core::hashing::CanonicalError;
use stepchain_core::hashing::decode_canonical_json;
use stepchain_core::hashing::hash_canonical_json;
use stepchain_core::runtime::Engine;
use stepchain_core::runtime::EngineError;
use stepchain_core::runtime::TraceError;
use stepchain_core::runtime::TraceSummary;
use stepchain_core::runtime::verify_trace_bytes;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Command Line Interface
// ============================================================================

/// Stepchain offline runner.
#[derive(Debug, Parser)]
#[command(name = "stepchain", version, about = "Deterministic multi-step reasoning runner")]
struct Cli {
    /// Selected subcommand.
    #[command(subcommand)]
    command: Command,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Execute a problem specification file and emit its trace.
    Run(RunArgs),
    /// Verify the hash chain of a trace file.
    Verify(VerifyArgs),
    /// Print the canonical SHA-256 hash of a JSON file.
    Hash(HashArgs),
}

/// Arguments for `stepchain run`.
#[derive(Debug, Args)]
struct RunArgs {
    /// Path to the problem specification JSON file.
    spec: PathBuf,
    /// Trace identifier (defaults to `trace-<spec id>`).
    #[arg(long)]
    trace_id: Option<String>,
    /// Clock seed as RFC 3339 UTC (defaults to the spec's `created_at`).
    #[arg(long)]
    now: Option<String>,
    /// Write trace bytes to this file instead of stdout.
    #[arg(long)]
    trace_out: Option<PathBuf>,
    /// Write the final state JSON to this file.
    #[arg(long)]
    state_out: Option<PathBuf>,
}

/// Arguments for `stepchain verify`.
#[derive(Debug, Args)]
struct VerifyArgs {
    /// Path to the NDJSON trace file.
    trace: PathBuf,
}

/// Arguments for `stepchain hash`.
#[derive(Debug, Args)]
struct HashArgs {
    /// Path to the JSON file to hash canonically.
    file: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI errors with process exit-code mapping.
#[derive(Debug, Error)]
enum CliError {
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Input file is not valid JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Engine rejected or failed the request.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Trace verification failed.
    #[error(transparent)]
    Trace(#[from] TraceError),
    /// Canonical encoding failed.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
    /// Timestamp argument is invalid.
    #[error(transparent)]
    Timestamp(#[from] TimestampError),
    /// Specification file is missing a required field.
    #[error("spec error: {0}")]
    Spec(String),
}

impl CliError {
    /// Returns the process exit code for the error.
    const fn exit_code(&self) -> u8 {
        match self {
            Self::Io(_) | Self::Json(_) => 1,
            Self::Engine(_)
            | Self::Trace(_)
            | Self::Canonical(_)
            | Self::Timestamp(_)
            | Self::Spec(_) => 2,
        }
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut stderr = io::stderr().lock();
            let _ = writeln!(stderr, "stepchain: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

/// Installs the tracing subscriber from the environment filter.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

/// Dispatches the selected subcommand.
fn dispatch(command: Command) -> Result<(), CliError> {
    match command {
        Command::Run(args) => run_command(&args),
        Command::Verify(args) => {
            let summary = verify_file(&args.trace)?;
            let mut stdout = io::stdout().lock();
            writeln!(
                stdout,
                "trace ok: {} record(s) ({} step, {} control)",
                summary.records, summary.step_records, summary.control_records
            )?;
            Ok(())
        }
        Command::Hash(args) => {
            let digest = hash_file(&args.file)?;
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{digest}")?;
            Ok(())
        }
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes a specification file and writes the trace and final state.
fn run_command(args: &RunArgs) -> Result<(), CliError> {
    let raw = fs::read(&args.spec)?;
    let problem_spec: Value = serde_json::from_slice(&raw)?;

    let now_text = match args.now.as_ref() {
        Some(text) => text.clone(),
        None => problem_spec
            .get("created_at")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CliError::Spec("`created_at` is required when --now is not given".to_string())
            })?
            .to_string(),
    };
    let now = Timestamp::parse(now_text)?;
    let trace_id = args.trace_id.clone().unwrap_or_else(|| {
        let request_id =
            problem_spec.get("id").and_then(Value::as_str).unwrap_or("local").to_string();
        format!("trace-{request_id}")
    });

    let request = ExecuteRequest {
        problem_spec,
        trace_id: TraceId::new(trace_id),
        now,
    };
    let outcome = Engine::new().execute(&request, None, None)?;

    match args.trace_out.as_ref() {
        Some(path) => fs::write(path, &outcome.trace)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&outcome.trace)?;
        }
    }
    if let Some(path) = args.state_out.as_ref() {
        let mut bytes = serde_json::to_vec_pretty(&outcome.final_state)?;
        bytes.push(b'\n');
        fs::write(path, bytes)?;
    }
    Ok(())
}

/// Verifies a trace file and returns its summary.
fn verify_file(path: &Path) -> Result<TraceSummary, CliError> {
    let bytes = fs::read(path)?;
    Ok(verify_trace_bytes(&bytes)?)
}

/// Computes the canonical hash of a JSON file, rejecting duplicate keys.
fn hash_file(path: &Path) -> Result<String, CliError> {
    let bytes = fs::read(path)?;
    let value = decode_canonical_json(&bytes)?;
    let digest = hash_canonical_json(&value)?;
    Ok(digest.as_str().to_string())
}
