use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use shellwire::host_key::KnownHostsMode;
use shellwire::session::{DEFAULT_COLS, DEFAULT_ROWS, DEFAULT_TERM};
use shellwire::transport::{DEFAULT_HOST, DEFAULT_PORT};
use shellwire::{
    AcceptAny, ClientBuilder, Error, FixedKey, KnownHosts, LocalStreams, TerminalPrompter,
};

/// Grace period for blocked stdin reads once the session is over.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "shellwire")]
#[command(about = "Open an interactive shell on an SSH server")]
#[command(version)]
struct Cli {
    /// Remote username
    #[arg(short, long)]
    user: Option<String>,

    /// Password (may be empty)
    #[arg(
        short,
        long,
        env = "SHELLWIRE_PASSWORD",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true
    )]
    password: String,

    /// Server host
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short = 'P', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Answer keyboard-interactive prompts from the terminal
    #[arg(long)]
    keyboard_interactive: bool,

    /// Private key file
    #[arg(short, long)]
    identity: Option<PathBuf>,

    /// Terminal type
    #[arg(long, default_value = DEFAULT_TERM)]
    term: String,

    /// Terminal height
    #[arg(long, default_value_t = DEFAULT_ROWS)]
    rows: u32,

    /// Terminal width
    #[arg(long, default_value_t = DEFAULT_COLS)]
    cols: u32,

    /// Connect and handshake timeout in seconds
    #[arg(long, default_value_t = 30)]
    connect_timeout: u64,

    /// Accept only this host key (OpenSSH public key line)
    #[arg(long, conflicts_with_all = ["known_hosts", "accept_new", "insecure_accept_any"])]
    host_key: Option<String>,

    /// known_hosts file [default: ~/.ssh/known_hosts]
    #[arg(long)]
    known_hosts: Option<PathBuf>,

    /// Add unknown hosts to known_hosts instead of rejecting them
    #[arg(long)]
    accept_new: bool,

    /// Skip host key verification entirely
    #[arg(long, conflicts_with_all = ["known_hosts", "accept_new"])]
    insecure_accept_any: bool,
}

impl Cli {
    /// `passphrase` unlocks the identity file, when one is given.
    fn into_builder(self, passphrase: Option<String>) -> Result<ClientBuilder, Error> {
        let mut builder = ClientBuilder::new(self.host)
            .port(self.port)
            .term(self.term)
            .terminal_size(self.cols, self.rows)
            .timeout(Duration::from_secs(self.connect_timeout));

        if let Some(user) = self.user {
            builder = builder.username(user);
        }

        // Public key first, then password, then interactive prompts. An empty
        // password is skipped when prompts were asked for.
        if let Some(identity) = self.identity {
            builder = match passphrase {
                Some(passphrase) => builder.private_key_with_passphrase(identity, passphrase),
                None => builder.private_key(identity),
            };
        }
        if !self.keyboard_interactive || !self.password.is_empty() {
            builder = builder.password(self.password);
        }
        if self.keyboard_interactive {
            builder = builder.keyboard_interactive(TerminalPrompter::new());
        }

        builder = if let Some(line) = self.host_key {
            builder.host_key_verifier(FixedKey::from_openssh(&line)?)
        } else if self.insecure_accept_any {
            builder.host_key_verifier(AcceptAny)
        } else {
            let mode = if self.accept_new {
                KnownHostsMode::AcceptNew
            } else {
                KnownHostsMode::Strict
            };
            match self.known_hosts {
                Some(path) => builder.host_key_verifier(KnownHosts::with_path(mode, path)),
                None => builder.host_key_verifier(KnownHosts::new(mode)),
            }
        };

        Ok(builder)
    }
}

/// Whether `path` holds a private key that cannot be loaded without a passphrase.
fn key_is_encrypted(path: &Path) -> bool {
    matches!(
        russh::keys::load_secret_key(path, None),
        Err(russh::keys::Error::KeyIsEncrypted)
    )
}

/// Ask for the identity file's passphrase if it has one.
fn identity_passphrase(path: &Path) -> Option<String> {
    if !key_is_encrypted(path) {
        return None;
    }
    match rpassword::prompt_password(format!("Enter passphrase for key {}: ", path.display())) {
        Ok(passphrase) => Some(passphrase),
        Err(e) => {
            warn!("cannot read passphrase for {}: {}", path.display(), e);
            None
        }
    }
}

async fn run(cli: Cli, passphrase: Option<String>) -> Result<(), Error> {
    let client = cli.into_builder(passphrase)?.build()?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, stopping relay");
            trigger.cancel();
        }
    });

    let report = client.run(LocalStreams::stdio(), &cancel).await?;
    info!(
        "session ended: {} bytes sent, {} bytes received",
        report.input.bytes,
        report.output.bytes + report.error.bytes
    );
    Ok(())
}

/// 2 for configuration errors, 1 for everything else.
fn exit_status(err: &Error) -> u8 {
    match err {
        Error::Config(_) => 2,
        _ => 1,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("shellwire: failed to start runtime: {}", e);
            return ExitCode::from(1);
        }
    };

    // No Ctrl-C handler is installed yet, so an interrupt at the prompt exits.
    let passphrase = cli.identity.as_deref().and_then(identity_passphrase);
    let result = runtime.block_on(run(cli, passphrase));
    // A pending stdin read would otherwise keep the process alive.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("shellwire: {}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}
