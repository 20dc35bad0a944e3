use facegate::{
    config::Config,
    dev_mode::DevMode,
    protocol::{Response, ResponseBody},
    core::enroll_directory,
    service::{artifact_store, collaborators},
    sinks::JsonlAuditLog,
    storage::CollectionStore,
    EnrollmentPipeline, EnrollmentPolicy, ServiceClient,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facegate")]
#[command(about = "Face-recognition access control")]
struct Cli {
    /// Enable development mode (local data directory and socket)
    #[arg(long, global = true)]
    dev: bool,

    /// Data directory in dev mode
    #[arg(long, global = true, default_value = "./dev_data")]
    dev_data_dir: PathBuf,

    /// Config file (defaults to the usual search locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the service for an access decision on a probe image
    Verify {
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Register an employee's face
    Register {
        #[arg(short, long)]
        image: PathBuf,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// National id number
        #[arg(long)]
        cedula: String,
        #[arg(long)]
        city: String,
    },
    /// Register every image in a directory, one employee per file.
    /// The file stem is the employee id and name (`ana_ruiz.jpg`).
    /// Runs in-process against the data directory.
    Enroll {
        dir: PathBuf,
        #[arg(long)]
        city: String,
    },
    /// Manage the face collection
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },
    /// Show recent audit log entries
    Audit {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Work with stored unmatched-face artifacts
    Artifact {
        #[command(subcommand)]
        command: ArtifactCommands,
    },
}

#[derive(Subcommand)]
enum CollectionCommands {
    /// Create the configured collection (or the one named)
    Create {
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Subcommand)]
enum ArtifactCommands {
    /// Check a signed artifact URL and print the file it points to
    Resolve { url: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on mode
    setup_logging(cli.dev);

    let config = Config::discover(cli.config.as_deref(), cli.dev)?;

    match cli.command {
        Commands::Verify { image } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("Failed to read image {}", image.display()))?;
            let response = ServiceClient::new(cli.dev).verify(&bytes)?;
            print_response(&response);
        }
        Commands::Register { image, first_name, last_name, cedula, city } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("Failed to read image {}", image.display()))?;
            let response = ServiceClient::new(cli.dev)
                .register(&bytes, &first_name, &last_name, &cedula, &city)?;
            print_response(&response);
        }
        Commands::Enroll { dir, city } => {
            let dev_mode = data_layout(cli.dev, &cli.dev_data_dir)?;
            let pipeline = EnrollmentPipeline::new(
                collaborators(&config, &dev_mode)?,
                EnrollmentPolicy::from_config(&config),
            );
            let results = enroll_directory(&pipeline, &dir, &city)
                .with_context(|| format!("Failed to enroll from {}", dir.display()))?;

            let mut enrolled = 0;
            for result in &results {
                match &result.outcome {
                    Ok(enrollment) => {
                        enrolled += 1;
                        println!("✅ {}  Face ID: {}", result.external_id, enrollment.record.template_key);
                    }
                    Err(e) => println!("❌ {}  {}", result.external_id, e.message()),
                }
            }
            println!("Enrolled {} of {} images", enrolled, results.len());
        }
        Commands::Collection { command: CollectionCommands::Create { id } } => {
            let id = id.unwrap_or_else(|| config.collection.id.clone());
            let dev_mode = data_layout(cli.dev, &cli.dev_data_dir)?;
            let store = CollectionStore::new(dev_mode.collections_dir())?;
            if store.create(&id)? {
                println!("✅ Created face collection {}", id);
            } else {
                println!("Face collection {} already exists", id);
            }
        }
        Commands::Audit { limit } => {
            let Some(log_name) = &config.audit.log_name else {
                println!("Audit logging is disabled (set [audit] log_name to enable it)");
                return Ok(());
            };
            let dev_mode = data_layout(cli.dev, &cli.dev_data_dir)?;
            let log = JsonlAuditLog::open(&dev_mode.logs_dir(), log_name)?;
            let entries = log.recent(limit)?;
            if entries.is_empty() {
                println!("No audit entries in {}", log.path().display());
            }
            for entry in entries {
                println!(
                    "{}  {:<8}  {} ({})  [{}]",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.status.as_str(),
                    entry.identity_name,
                    entry.identity_id,
                    entry.log_id
                );
            }
        }
        Commands::Artifact { command: ArtifactCommands::Resolve { url } } => {
            if config.artifacts.signing_key.is_none() {
                bail!("artifacts.signing_key must be configured to verify artifact URLs");
            }
            let dev_mode = data_layout(cli.dev, &cli.dev_data_dir)?;
            let store = artifact_store(&config, &dev_mode)?;
            let path = store
                .resolve(&url, chrono::Utc::now().timestamp())
                .with_context(|| format!("Rejected artifact URL {}", url))?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

/// Data directories, resolved only by commands that touch them.
fn data_layout(dev: bool, dev_data_dir: &Path) -> Result<DevMode> {
    let dev_mode = if dev {
        DevMode::with_base_dir(true, dev_data_dir.to_path_buf())?
    } else {
        DevMode::new(false)?
    };
    Ok(dev_mode)
}

fn print_response(response: &Response) {
    match &response.body {
        ResponseBody::Access(access) => {
            println!("[{}] {}: {}", response.status_code, access.status, access.message);
            if let Some(employee_id) = &access.employee_id {
                println!("   Employee ID: {}", employee_id);
            }
        }
        ResponseBody::Registration(registration) => {
            println!("[{}] {}", response.status_code, registration.message);
            if let Some(face_id) = &registration.face_id {
                println!("   Face ID: {}", face_id);
            }
        }
    }
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }
}
