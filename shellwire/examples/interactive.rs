//! Interactive shell example
//!
//! Opens a shell on a remote host and relays the local terminal to it until
//! the remote shell exits or Ctrl-C is pressed.
//!
//! Host keys are checked against `~/.ssh/known_hosts` (unknown hosts are
//! learned). Pass `--fingerprint` to pin a single SHA-256 fingerprint with a
//! custom verifier instead.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example interactive -- --host localhost --user your_username --password your_password
//! cargo run --example interactive -- --host 10.0.0.5 --user admin --key ~/.ssh/id_ed25519 \
//!     --fingerprint SHA256:+DiY3wvvV6TuJJhbpZisF/zLDA0zPMSvHdkr4UvCOqU
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use shellwire::error::HostKeyError;
use shellwire::host_key::KnownHostsMode;
use shellwire::{ClientBuilder, Custom, HostKeyRecord, LocalStreams};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = ClientBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .timeout(Duration::from_secs(args.timeout));

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    builder = match args.fingerprint {
        Some(pinned) => builder.host_key_verifier(Custom::new(move |record: &HostKeyRecord| {
            match record.fingerprint() {
                Some(fingerprint) if fingerprint == pinned => Ok(()),
                other => Err(HostKeyError::Rejected {
                    host: record.hostname.clone(),
                    reason: format!(
                        "fingerprint {} is not {}",
                        other.as_deref().unwrap_or("<unparsable>"),
                        pinned
                    ),
                }),
            }
        })),
        None => builder.known_hosts(KnownHostsMode::AcceptNew),
    };

    let client = builder.build()?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let report = client.run(LocalStreams::stdio(), &cancel).await?;

    eprintln!(
        "\nSession closed: {} bytes sent, {} bytes received",
        report.input.bytes,
        report.output.bytes + report.error.bytes
    );

    // A read on stdin may still be pending.
    std::process::exit(0);
}

struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    fingerprint: Option<String>,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 22u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "admin".to_string());
        let mut password = None;
        let mut key = None;
        let mut fingerprint = None;
        let mut timeout = 30u64;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--port" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        port = args[i].parse().unwrap_or(22);
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--password" | "-P" => {
                    i += 1;
                    if i < args.len() {
                        password = Some(args[i].clone());
                    }
                }
                "--key" | "-k" => {
                    i += 1;
                    if i < args.len() {
                        key = Some(PathBuf::from(&args[i]));
                    }
                }
                "--fingerprint" | "-f" => {
                    i += 1;
                    if i < args.len() {
                        fingerprint = Some(args[i].clone());
                    }
                }
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i].parse().unwrap_or(30);
                    }
                }
                "--help" => {
                    println!("Usage: interactive [OPTIONS]");
                    println!();
                    println!("Options:");
                    println!("  -h, --host <HOST>         Target host [default: localhost]");
                    println!("  -p, --port <PORT>         SSH port [default: 22]");
                    println!("  -u, --user <USER>         Username [default: $USER]");
                    println!("  -P, --password <PASS>     Password");
                    println!("  -k, --key <PATH>          Private key file");
                    println!("  -f, --fingerprint <FP>    Accept only this SHA256 host key fingerprint");
                    println!("  -t, --timeout <SECS>      Connect timeout [default: 30]");
                    std::process::exit(0);
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            host,
            port,
            user,
            password,
            key,
            fingerprint,
            timeout,
        }
    }
}
