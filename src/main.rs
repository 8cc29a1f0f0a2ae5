//! ALFA Face Vault - CLI
//!
//! Command-line interface for enrollment, protection and admin operations.
//! Descriptors are read from JSON files produced by an external extractor.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use alfa_face_vault::{AuthSession, LockState, Role, VaultConfig, VaultError};

#[derive(Parser)]
#[command(name = "alfa-face")]
#[command(author = "Karen Tonoyan")]
#[command(version = alfa_face_vault::VERSION)]
#[command(about = "ALFA Face Vault - Face-gated file protection")]
struct Cli {
    /// Config file (JSON); falls back to $ALFA_FACE_CONFIG, then defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a user from a descriptor file
    Register {
        #[arg(short, long)]
        user: String,

        /// JSON array of numbers
        #[arg(short, long)]
        descriptor: PathBuf,

        /// Overwrite the descriptor of an existing user
        #[arg(long)]
        force: bool,
    },

    /// Create an account with no descriptor
    AddAccount {
        #[arg(short, long)]
        user: String,

        #[arg(long)]
        admin: bool,
    },

    /// Authenticate and encrypt a file
    Protect {
        #[arg(short, long)]
        user: String,

        /// JSON array of numbers
        #[arg(short, long)]
        descriptor: PathBuf,

        #[arg(short, long)]
        file: PathBuf,
    },

    /// Decrypt a protected file
    Decrypt {
        #[arg(short, long)]
        user: String,

        /// Protected file (with suffix)
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Clear a lockout
    Unlock {
        #[arg(short, long)]
        user: String,
    },

    /// Remove a user and all of its keys
    Remove {
        #[arg(short, long)]
        user: String,
    },

    /// List identities
    List,

    /// Show one identity
    Show {
        #[arg(short, long)]
        user: String,
    },

    /// Write a config file with default values
    InitConfig {
        path: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config;
    let open = || -> anyhow::Result<AuthSession> {
        let config = VaultConfig::resolve(config_path.as_deref())?;
        AuthSession::open(config).context("failed to open vault database")
    };

    match cli.command {
        Commands::Register { user, descriptor, force } => {
            let session = open()?;
            let values = read_descriptor(&descriptor)?;
            let identity = match session.register(&user, &values) {
                Err(VaultError::AlreadyExists(_)) if force => {
                    session.update_descriptor(&user, &values)?
                }
                other => other?,
            };
            println!("✅ User '{}' enrolled ({} dims)", identity.username, values.len());
        }

        Commands::AddAccount { user, admin } => {
            let session = open()?;
            let role = if admin { Role::Admin } else { Role::User };
            session.create_account(&user, role)?;
            println!("✅ Account '{}' created as {}", user, role);
        }

        Commands::Protect { user, descriptor, file } => {
            let session = open()?;
            let values = read_descriptor(&descriptor)?;
            match session.authenticate_and_protect(&user, Some(&values), &file) {
                Ok(result) => {
                    println!("🔐 Protected: {}", result.protected_path.display());
                    println!("   Distance:  {:.4}", result.distance);
                    println!("   Key:       {}", result.key_fingerprint);
                    println!("   Size:      {} bytes", result.bytes_written);
                }
                Err(VaultError::AuthenticationFailed { remaining }) => {
                    anyhow::bail!("face not recognized ({} attempt(s) left)", remaining);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Decrypt { user, file, output } => {
            let session = open()?;
            let written = session.decrypt_to_file(&user, &file, &output)?;
            println!("✅ Decrypted {} bytes to: {}", written, output.display());
        }

        Commands::Unlock { user } => {
            let session = open()?;
            session.unlock_user(&user)?;
            println!("🔓 User '{}' unlocked", user);
        }

        Commands::Remove { user } => {
            let session = open()?;
            let purged = session.remove_user(&user)?;
            println!("🗑️ User '{}' removed ({} key(s) purged)", user, purged);
        }

        Commands::List => {
            let session = open()?;
            let identities = session.list_identities()?;
            if identities.is_empty() {
                println!("📭 No identities");
            } else {
                println!("👤 Identities ({}):", identities.len());
                println!("{:-<60}", "");
                for identity in identities {
                    let state = match session.lock_state(&identity.username)? {
                        LockState::Open => "open".to_string(),
                        LockState::Locked { until } => format!("locked until {}", until),
                    };
                    let enrolled = if identity.is_enrolled() { "enrolled" } else { "no face" };
                    println!(
                        "{:<20} {:<6} {:<9} {}",
                        identity.username, identity.role, enrolled, state
                    );
                }
            }
        }

        Commands::Show { user } => {
            let session = open()?;
            let identity = session.identity(&user)?;
            let state = session.lock_state(&user)?;
            let files = session.key_vault().list_paths(&user)?;

            println!("👤 {}", identity.username);
            println!("{:-<40}", "");
            println!("Role:             {}", identity.role);
            println!("Enrolled:         {}", identity.is_enrolled());
            println!("Failed attempts:  {}", identity.failed_attempts);
            println!("State:            {}", serde_json::to_string(&state)?);
            println!("Created:          {}", identity.created_at);
            println!("Protected files:  {}", files.len());
            for path in files {
                println!("   - {}", path);
            }
        }

        Commands::InitConfig { path } => {
            VaultConfig::default().save(&path)?;
            println!("✅ Config written to: {}", path.display());
        }
    }

    Ok(())
}

fn read_descriptor(path: &Path) -> anyhow::Result<Vec<f64>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor {}", path.display()))?;
    let values: Vec<f64> = serde_json::from_str(&data)
        .with_context(|| format!("descriptor {} is not a JSON array of numbers", path.display()))?;
    Ok(values)
}
