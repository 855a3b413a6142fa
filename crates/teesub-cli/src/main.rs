use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use teesub_core::{report_hash, AnalyzeResponse, DatasetRequest, EnclaveKeypair, Verdict};
use teesub_runtime::{
    verify_response, verify_response_with_key, Pipeline, PipelineConfig, PipelineError,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod serve;

#[derive(Parser)]
#[command(name = "teesub")]
#[command(version)]
#[command(about = "Compliance scan with signed, attested reports (local TEE substitute)")]
struct Cli {
    /// CI-friendly: no stdout on success (errors still go to stderr)
    #[arg(long, global = true)]
    quiet: bool,

    /// Print machine-readable JSON to stdout on success (suppressed by --quiet)
    #[arg(long, global = true)]
    print_json: bool,

    /// Write success output as JSON to this file (stdout stays empty)
    #[arg(long, global = true)]
    json_file: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan one dataset folder and produce a signed, attested report
    Analyze {
        #[arg(long)]
        dataset_id: String,

        #[arg(long)]
        merkle_root: String,

        /// Dataset folder, relative to the dataset base directory
        #[arg(long)]
        blob_id: String,

        #[arg(long)]
        policy_version: String,

        #[arg(long)]
        model_version: String,

        /// Dataset base directory (overrides DEV_DATASET_BASE_PATH)
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Images sampled for the weapon check (overrides TEESUB_SAMPLE_SIZE)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        sample_size: Option<u64>,

        /// Write the full response JSON to this path
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Check report hash, nonce binding and signature of a saved response
    Verify {
        /// Path to response.json
        #[arg(long)]
        response: PathBuf,

        /// Expected enclave public key, 0x-prefixed hex (optional)
        #[arg(long)]
        pub_key: Option<String>,
    },

    /// Print the reportHash of a JSON report
    HashReport {
        /// Path to report.json
        #[arg(long)]
        report: PathBuf,
    },

    /// Serve /health and /analyze-dataset over HTTP
    Serve {
        #[arg(long, env = "TEESUB_ADDR", default_value = "127.0.0.1:8080")]
        addr: SocketAddr,

        /// Dataset base directory (overrides DEV_DATASET_BASE_PATH)
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Images sampled for the weapon check (overrides TEESUB_SAMPLE_SIZE)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        sample_size: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let exit_code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "teesub=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.cmd {
        Command::Analyze {
            ref dataset_id,
            ref merkle_root,
            ref blob_id,
            ref policy_version,
            ref model_version,
            ref base_dir,
            sample_size,
            ref out,
        } => {
            let pipeline = build_pipeline(base_dir.as_deref(), sample_size)?;
            let request = DatasetRequest {
                dataset_id: dataset_id.clone(),
                dataset_merkle_root: merkle_root.clone(),
                encrypted_data_blob_id: blob_id.clone(),
                policy_version: policy_version.clone(),
                model_version: model_version.clone(),
            };

            let response = pipeline.analyze(&request)?;

            if let Some(out_path) = out {
                let mut bytes = serde_json::to_vec_pretty(&response)
                    .map_err(|e| CliError::Json(format!("{e}")))?;
                bytes.push(b'\n');
                write_file_atomic(out_path, &bytes)?;
            }

            let verdict = response.report.verdict;
            let score = response.report.score;
            let findings = response.report.findings.len();
            let hash = response.payload.report_hash.clone();
            let pub_key = response.attestation.enclave_pub_key.clone();

            let payload = JsonOut::Analyze {
                ok: true,
                verdict,
                score,
                findings,
                report_hash: hash.clone(),
                out: out.as_ref().map(|p| path_string_ref(p)),
                response,
            };

            emit_success(&cli, payload, || {
                println!("ok");
                println!("verdict     : {verdict}");
                println!("score       : {score}");
                println!("findings    : {findings}");
                println!("report_hash : {hash}");
                println!("pub_key     : {pub_key}");
            })?;
            Ok(())
        }

        Command::Verify {
            ref response,
            ref pub_key,
        } => {
            let value = read_json(response)?;
            let verified = match pub_key {
                Some(key) => verify_response_with_key(&value, key),
                None => verify_response(&value),
            }
            .map_err(|e| CliError::VerifyFailed(e.to_string()))?;

            let payload = JsonOut::Verify {
                ok: true,
                report_hash: verified.report_hash.clone(),
                tee_nonce: verified.payload.tee_nonce.clone(),
                enclave_pub_key: verified.attestation.enclave_pub_key.clone(),
                provider: verified.attestation.provider.as_str(),
                response: path_string_ref(response),
            };

            emit_success(&cli, payload, || {
                println!("ok");
                println!("report_hash : {}", verified.report_hash);
                println!("tee_nonce   : {}", verified.payload.tee_nonce);
                println!("pub_key     : {}", verified.attestation.enclave_pub_key);
                println!("provider    : {}", verified.attestation.provider.as_str());
            })?;
            Ok(())
        }

        Command::HashReport { ref report } => {
            let value = read_json(report)?;
            let hash = report_hash(&value).map_err(|e| CliError::Json(format!("{e}")))?;

            let payload = JsonOut::HashReport {
                ok: true,
                report_hash: hash.clone(),
                report: path_string_ref(report),
            };

            emit_success(&cli, payload, || println!("{hash}"))?;
            Ok(())
        }

        Command::Serve {
            addr,
            ref base_dir,
            sample_size,
        } => {
            let pipeline = build_pipeline(base_dir.as_deref(), sample_size)?;
            serve::run(pipeline, addr)
        }
    }
}

fn build_pipeline(base_dir: Option<&Path>, sample_size: Option<u64>) -> Result<Pipeline, CliError> {
    let mut config =
        PipelineConfig::from_env().map_err(|e| CliError::Runtime(format!("config: {e}")))?;
    if let Some(dir) = base_dir {
        config.dataset_base = dir.to_path_buf();
    }
    if let Some(n) = sample_size {
        config.sample_size = n as usize;
    }

    let keys = EnclaveKeypair::generate()
        .map_err(|e| CliError::Runtime(format!("enclave key generation failed: {e}")))?;
    info!(
        pub_key = keys.public_key_hex(),
        base = %config.dataset_base.display(),
        "enclave key generated"
    );

    Ok(Pipeline::from_config(&config, Arc::new(keys)))
}

/* ----------------------------- JSON output ----------------------------- */

#[derive(Serialize)]
#[serde(tag = "cmd", rename_all = "kebab-case")]
enum JsonOut {
    Analyze {
        ok: bool,
        verdict: Verdict,
        score: u8,
        findings: usize,
        report_hash: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        out: Option<String>,
        response: AnalyzeResponse,
    },
    Verify {
        ok: bool,
        report_hash: String,
        tee_nonce: String,
        enclave_pub_key: String,
        provider: &'static str,
        response: String,
    },
    HashReport {
        ok: bool,
        report_hash: String,
        report: String,
    },
}

fn emit_success<F>(cli: &Cli, payload: JsonOut, human: F) -> Result<(), CliError>
where
    F: FnOnce(),
{
    emit_json(cli, &payload)?;
    if !cli.quiet && !cli.print_json && cli.json_file.is_none() {
        human();
    }
    Ok(())
}

fn emit_json(cli: &Cli, payload: &JsonOut) -> Result<(), CliError> {
    if let Some(path) = cli.json_file.as_ref() {
        let mut bytes = serde_json::to_string(payload)
            .map_err(|e| CliError::Json(format!("{e}")))?
            .into_bytes();
        bytes.push(b'\n');
        write_file_atomic(path, &bytes)?;
    }
    if !cli.quiet && cli.print_json && cli.json_file.is_none() {
        print_json_line(payload)?;
    }
    Ok(())
}

fn print_json_line(payload: &JsonOut) -> Result<(), CliError> {
    let s = serde_json::to_string(payload).map_err(|e| CliError::Json(format!("{e}")))?;
    println!("{s}");
    Ok(())
}

fn path_string_ref(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/* ----------------------------- IO helpers ----------------------------- */

fn read_json(path: &Path) -> Result<Value, CliError> {
    let bytes = read_file(path)?;
    serde_json::from_slice(&bytes).map_err(|e| CliError::Json(format!("{}: {e}", path.display())))
}

fn read_file(path: &Path) -> Result<Vec<u8>, CliError> {
    fs::read(path).map_err(|e| CliError::Io(format!("{}: {e}", path.display())))
}

fn write_file_atomic(path: &Path, data: &[u8]) -> Result<(), CliError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or(CliError::Io(format!(
            "invalid output path: {}",
            path.display()
        )))?
        .to_string_lossy();

    let tmp_path = parent.join(format!(".{}.tmp", file_name));
    fs::write(&tmp_path, data).map_err(|e| CliError::Io(format!("{}: {e}", tmp_path.display())))?;

    fs::rename(&tmp_path, path).map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;

    Ok(())
}

/* ------------------------------ Errors -------------------------------- */

#[derive(Debug)]
enum CliError {
    Io(String),
    Json(String),
    Rejected(String),
    Runtime(String),
    VerifyFailed(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Io(_) => 2,
            CliError::Json(_) => 3,
            CliError::Rejected(_) => 4,
            CliError::Runtime(_) => 5,
            CliError::VerifyFailed(_) => 6,
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        if err.is_client_error() {
            CliError::Rejected(err.to_string())
        } else {
            CliError::Runtime(err.to_string())
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Io(s) => write!(f, "io: {s}"),
            CliError::Json(s) => write!(f, "json: {s}"),
            CliError::Rejected(s) => write!(f, "rejected: {s}"),
            CliError::Runtime(s) => write!(f, "{s}"),
            CliError::VerifyFailed(s) => write!(f, "verify failed: {s}"),
        }
    }
}
