use facegate::{
    common::{dev_socket_path, system_socket_path},
    config::Config,
    dev_mode::DevMode,
    error::{GateError, Result},
    protocol::{read_frame, send_message, Request, Response},
    Gate,
};
use anyhow::Context as _;
use clap::Parser;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "facegate-service")]
#[command(about = "FaceGate access decision service")]
struct Args {
    /// Run in development mode
    #[arg(long)]
    dev: bool,

    /// Socket path in dev mode
    #[arg(long)]
    dev_socket: Option<PathBuf>,

    /// Data directory in dev mode
    #[arg(long, default_value = "./dev_data")]
    dev_data_dir: PathBuf,

    /// Config file (defaults to the usual search locations)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting FaceGate service (dev_mode: {})", args.dev);

    let (socket_path, dev_mode) = if args.dev {
        (
            args.dev_socket.clone().unwrap_or_else(dev_socket_path),
            DevMode::with_base_dir(true, args.dev_data_dir.clone())?,
        )
    } else {
        (system_socket_path(), DevMode::new(false)?)
    };

    let config = Config::discover(args.config.as_deref(), args.dev)?;
    let service = config.service.clone();

    // Models load once and are shared by every connection
    let gate = Arc::new(Gate::from_config(&config, &dev_mode)?);

    let listener = bind_socket(&socket_path)?;
    tracing::info!("Listening on {}", socket_path.display());

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let gate = Arc::clone(&gate);
                let limits = service.clone();
                std::thread::spawn(move || {
                    if let Err(e) = handle_client(stream, &gate, &limits) {
                        tracing::error!("Client error: {}", e);
                    }
                });
            }
            Err(e) => {
                tracing::error!("Connection error: {}", e);
            }
        }
    }

    Ok(())
}

fn bind_socket(socket_path: &Path) -> Result<UnixListener> {
    // Clean up old socket if exists
    if socket_path.exists() {
        fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind Unix socket at {}", socket_path.display()))?;

    // Any local client may ask for a decision
    fs::set_permissions(socket_path, fs::Permissions::from_mode(0o666))?;

    Ok(listener)
}

fn handle_client(
    mut stream: UnixStream,
    gate: &Gate,
    limits: &facegate::config::ServiceConfig,
) -> Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(limits.read_timeout_secs)))?;
    stream.set_write_timeout(Some(Duration::from_secs(limits.write_timeout_secs)))?;

    let frame = match read_frame(&mut stream, limits.max_request_bytes) {
        Ok(frame) => frame,
        Err(GateError::Serialization(reason)) => {
            tracing::warn!("Rejecting request: {}", reason);
            return send_message(&mut stream, &Response::bad_request());
        }
        Err(e) => return Err(e),
    };

    let started = Instant::now();
    let response = match serde_json::from_slice::<Request>(&frame) {
        Ok(request) => {
            tracing::info!("Processing {} request", request_kind(&request));
            gate.handle(request)
        }
        Err(e) => {
            tracing::warn!("Malformed request: {}", e);
            Response::bad_request()
        }
    };

    tracing::info!(
        "Responded {} in {:.0?}: {}",
        response.status_code,
        started.elapsed(),
        response.message()
    );
    send_message(&mut stream, &response)
}

fn request_kind(request: &Request) -> &'static str {
    match request {
        Request::Verify(_) => "verify",
        Request::Register(_) => "register",
    }
}
