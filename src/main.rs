use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
mod auth;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use vaultseal::{
    EnvelopeError, Storage, Vault, VaultConfig,
    crypto::{self, opened_file_name, sealed_file_name},
};

#[derive(Debug, Parser)]
#[command(name = "vaultseal")]
#[command(
    version,
    about = "Seal files with a password so whoever stores them never sees the contents."
)]
struct Cli {
    /// Directory holding the vault catalog and envelopes
    #[arg(long, global = true, value_name = "PATH", env = "VAULTSEAL_ROOT")]
    root: Option<PathBuf>,

    /// Owner whose vault entries are listed and managed
    #[arg(long, global = true, env = "VAULTSEAL_OWNER")]
    owner: Option<String>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, env = "VAULTSEAL_LOG", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypts a file into an envelope next to it
    #[command(arg_required_else_help = true)]
    Seal {
        input: PathBuf,
        /// Output path (default: <input>.enc)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decrypts an envelope file
    #[command(arg_required_else_help = true)]
    Open {
        input: PathBuf,
        /// Output path (default: <input> without .enc)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encrypts a file and stores it in the vault
    #[command(arg_required_else_help = true)]
    Put { file: PathBuf },

    /// Lists files stored in the vault
    List,

    /// Decrypts a vault file and writes it out
    #[command(arg_required_else_help = true)]
    Get {
        id: Uuid,
        /// Output path (default: original file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing output file
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Permanently deletes a file from the vault
    #[command(arg_required_else_help = true)]
    Delete { id: Uuid },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn file_name(path: &Path) -> Result<String> {
    Ok(path
        .file_name()
        .with_context(|| format!("'{}' has no file name", path.display()))?
        .to_string_lossy()
        .into_owned())
}

fn write_new(path: &Path, data: &[u8], force: bool) -> Result<()> {
    let storage = Storage::new(path.to_path_buf());
    if storage.exists() && !force {
        bail!("'{}' already exists", path.display());
    }
    storage
        .save(data)
        .with_context(|| format!("failed to write '{}'", path.display()))
}

/// Human readable size: `0 B`, `512 B`, `1.5 KB`, ...
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        let rounded = (size * 10.0).round() / 10.0;
        format!("{rounded} {}", UNITS[unit])
    }
}

fn run(args: Cli) -> Result<()> {
    let config = || VaultConfig::resolve(args.root.clone(), args.owner.clone());

    match args.command {
        Commands::Seal { ref input, ref output } => {
            let output = match output {
                Some(p) => p.clone(),
                None => input.with_file_name(sealed_file_name(&file_name(input)?)),
            };
            let plaintext = zeroize::Zeroizing::new(
                fs::read(input).with_context(|| format!("failed to read '{}'", input.display()))?,
            );
            let password = auth::read_new_password_with_confirmation()?;

            let envelope = crypto::seal(&plaintext, password.as_bytes())?;
            write_new(&output, &envelope, false)?;
            println!("sealed '{}'", output.display());
        }
        Commands::Open { ref input, ref output } => {
            let output = match output {
                Some(p) => p.clone(),
                None => {
                    let name = file_name(input)?;
                    let stem = opened_file_name(&name).with_context(|| {
                        format!("'{name}' does not end in .enc; pass --output")
                    })?;
                    input.with_file_name(stem)
                }
            };
            let envelope =
                fs::read(input).with_context(|| format!("failed to read '{}'", input.display()))?;
            let password = auth::read_password()?;

            let plaintext = crypto::open(&envelope, password.as_bytes())?;
            write_new(&output, &plaintext, false)?;
            println!("opened '{}'", output.display());
        }
        Commands::Put { ref file } => {
            let name = file_name(file)?;
            let plaintext = zeroize::Zeroizing::new(
                fs::read(file).with_context(|| format!("failed to read '{}'", file.display()))?,
            );
            let password = auth::read_new_password_with_confirmation()?;

            let mut vault = Vault::open_local(&config()?)?;
            let entry = vault.upload(&name, &plaintext, password.as_bytes())?;
            println!("stored '{}' as {}", entry.filename(), entry.id());
        }
        Commands::List => {
            let vault = Vault::open_local(&config()?)?;
            let entries = vault.list();

            if entries.is_empty() {
                println!("No files stored.");
                return Ok(());
            }

            let name_width = entries
                .iter()
                .map(|e| e.filename().len())
                .chain(std::iter::once("Name".len()))
                .max()
                .unwrap_or_default();

            println!(
                "{:<36}  {:<name_width$}  {:>9}  Created",
                "Id", "Name", "Size"
            );
            for e in entries {
                println!(
                    "{:<36}  {:<name_width$}  {:>9}  {}",
                    e.id(),
                    e.filename(),
                    format_size(e.size_bytes()),
                    e.created_at().format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Commands::Get {
            id,
            ref output,
            force,
        } => {
            let vault = Vault::open_local(&config()?)?;
            let entry = vault.entry(id)?;
            let output = match output {
                Some(p) => p.clone(),
                None => PathBuf::from(file_name(Path::new(entry.filename()))?),
            };
            let password = auth::read_password()?;

            let (entry, plaintext) = vault.download(id, password.as_bytes())?;
            write_new(&output, &plaintext, force)?;
            println!("restored '{}' to '{}'", entry.filename(), output.display());
        }
        Commands::Delete { id } => {
            let mut vault = Vault::open_local(&config()?)?;
            let entry = vault.delete(id)?;
            println!("'{}' deleted", entry.filename());
        }
    }

    Ok(())
}

fn main() -> std::process::ExitCode {
    let args = Cli::parse();
    init_logging(&args.log_level);

    match run(args) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            if e.downcast_ref::<EnvelopeError>() == Some(&EnvelopeError::Decryption) {
                eprintln!("Error: wrong password or corrupted file");
            } else {
                tracing::debug!(error = ?e, "command failed");
                eprintln!("Error: {e:#}");
            }
            std::process::ExitCode::FAILURE
        }
    }
}
