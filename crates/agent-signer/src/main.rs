use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use ssh_agent_signer::{AgentSigner, RequestSigner};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Sign a request date with a key held by the running SSH agent.
#[derive(Parser)]
struct Args {
    /// Key fingerprint (MD5 hex or SHA256 base64, optionally prefixed).
    #[clap(long, env = "TRITON_KEY_ID")]
    key_id: String,
    #[clap(long, env = "TRITON_ACCOUNT")]
    account: String,
    /// Date header value to sign. Defaults to the current time.
    #[clap(long)]
    date: Option<String>,
    /// Sign this text instead of a date header and print the bare signature.
    #[clap(long, conflicts_with = "date")]
    raw: Option<String>,
    #[clap(long, default_value = "text")]
    output: OutputFormat,
}

#[derive(Serialize)]
struct HeaderOutput<'a> {
    key_id: &'a str,
    fingerprint: &'a str,
    algorithm: &'a str,
    date: &'a str,
    authorization: String,
}

#[derive(Serialize)]
struct RawOutput<'a> {
    key_id: &'a str,
    fingerprint: &'a str,
    algorithm: String,
    signature: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let signer = AgentSigner::new(&args.key_id, &args.account).context("creating SSH agent signer")?;

    if let Some(payload) = args.raw {
        let (signature, algorithm) = signer.sign_raw(&payload).context("signing payload")?;
        match args.output {
            OutputFormat::Text => println!("{signature} {algorithm}"),
            OutputFormat::Json => {
                let output = RawOutput {
                    key_id: signer.key_id(),
                    fingerprint: signer.key_fingerprint(),
                    algorithm,
                    signature,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
        return Ok(());
    }

    let date = args.date.unwrap_or_else(http_date_now);
    let authorization = signer.sign(&date).context("signing date header")?;
    match args.output {
        OutputFormat::Text => println!("{authorization}"),
        OutputFormat::Json => {
            let output = HeaderOutput {
                key_id: signer.key_id(),
                fingerprint: signer.key_fingerprint(),
                algorithm: signer.default_algorithm(),
                date: &date,
                authorization,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Current time in the RFC 7231 IMF-fixdate form used by the `Date` header.
fn http_date_now() -> String {
    chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
