//! vaultpack: password-sealed files and folder archives
//!
//! Commands:
//!   encrypt <paths..>   - seal one file into a container, or many into an archive
//!   decrypt <input>     - restore a container or archive into a directory
//!   inspect <input>     - print container/archive metadata (no password)
//!   config show         - display current configuration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tracing::{info, warn};

use vaultpack_archive::{ArchiveCodec, ArchiveOptions, ArchiveVariant, InputFile, ProgressFn};
use vaultpack_core::config::VaultConfig;
use vaultpack_core::types::now_millis;
use vaultpack_core::validate::{validate_password, validate_relative_path};
use vaultpack_core::{ArchiveMetadata, FileMetadata, FilenameEncryptionOptions, FilenameMode};
use vaultpack_crypto::{
    default_provider, ContainerCodec, CredentialFileAuthenticator, EncryptionSecret,
    HardwareAuthenticator, KdfParams,
};

const PASSWORD_ENV: &str = "VAULTPACK_PASSWORD";
const RESTORE_INFO_NAME: &str = "_restore_info.json";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "vaultpack",
    version,
    about = "Password-sealed file containers and archives",
    long_about = "vaultpack: encrypt files and folder trees with a password, optionally strengthened by a hardware key"
)]
struct Cli {
    /// Path to vaultpack.toml configuration file
    #[arg(long, short = 'c', env = "VAULTPACK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "VAULTPACK_LOG")]
    log: Option<String>,

    /// Log format; overrides [log] format
    #[arg(long, env = "VAULTPACK_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt files or directories
    ///
    /// A single regular file becomes a `.enc` container. Several files, or
    /// any directory, become one zip archive of containers.
    Encrypt {
        /// Files and directories to encrypt
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Output file (or directory, for a single container)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Filename obfuscation: none, partial, full
        #[arg(long)]
        filename_mode: Option<FilenameMode>,
        /// Keep the original extension visible on obfuscated names
        #[arg(long)]
        preserve_extensions: bool,
        /// Prefix for partial-mode names
        #[arg(long)]
        prefix: Option<String>,
        /// Enhanced archive: archive-wide key and zstd payload compression
        #[arg(long)]
        enhanced: bool,
        /// Compression level 0-9 for enhanced archives
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=9))]
        compression_level: Option<u8>,
        /// Store archive entries instead of deflating the package
        #[arg(long)]
        no_solid: bool,
        /// Hardware credential file to combine with the password
        #[arg(long)]
        hardware_key: Option<PathBuf>,
    },

    /// Decrypt a container or archive
    Decrypt {
        /// Container (.enc or obfuscated name) or archive (.zip)
        input: PathBuf,
        /// Output directory
        #[arg(long, short = 'o', default_value = ".")]
        output: PathBuf,
        /// Hardware credential file, required when the input was sealed with one
        #[arg(long)]
        hardware_key: Option<PathBuf>,
    },

    /// Show metadata stored in the clear, without decrypting
    Inspect {
        input: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).await?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = match cli.log_format.clone() {
        Some(f) => f,
        None if config.log.format == "json" => LogFormat::Json,
        None => LogFormat::Text,
    };
    init_logging(&level, &format);
    if let Some(path) = cli.config.as_deref().filter(|p| !p.exists()) {
        warn!("config file not found: {}  (using defaults)", path.display());
    }

    match cli.command {
        Commands::Encrypt {
            paths,
            output,
            filename_mode,
            preserve_extensions,
            prefix,
            enhanced,
            compression_level,
            no_solid,
            hardware_key,
        } => {
            let overrides = EncryptOverrides {
                filename_mode,
                preserve_extensions,
                prefix,
                enhanced,
                compression_level,
                no_solid,
            };
            cmd_encrypt(&config, &paths, output.as_deref(), overrides, hardware_key.as_deref()).await
        }
        Commands::Decrypt {
            input,
            output,
            hardware_key,
        } => cmd_decrypt(&config, &input, &output, hardware_key.as_deref()).await,
        Commands::Inspect { input } => cmd_inspect(&input).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, cli.config.as_deref()),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

async fn load_config(path: Option<&Path>) -> Result<VaultConfig> {
    match path {
        Some(path) if path.exists() => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading config: {}", path.display()))?;
            VaultConfig::from_toml(&content)
                .with_context(|| format!("parsing config: {}", path.display()))
        }
        _ => Ok(VaultConfig::default()),
    }
}

fn codec_for(config: &VaultConfig) -> Result<ContainerCodec> {
    let params = KdfParams::from(&config.kdf);
    params.validate().context("invalid [kdf] settings")?;
    Ok(ContainerCodec::new(default_provider(), params))
}

// ── Secrets ───────────────────────────────────────────────────────────────────

/// Password from `VAULTPACK_PASSWORD`, else an interactive prompt.
///
/// `confirm` asks twice on a prompt; `min_len` is enforced on either source.
fn read_password(confirm: bool, min_len: usize) -> Result<SecretString> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        validate_password(&password, None, min_len)?;
        return Ok(SecretString::from(password));
    }

    let password = rpassword::prompt_password("Password: ").context("reading password")?;
    let confirmation = if confirm {
        Some(rpassword::prompt_password("Confirm password: ").context("reading password")?)
    } else {
        None
    };
    validate_password(&password, confirmation.as_deref(), min_len)?;
    Ok(SecretString::from(password))
}

fn build_secret(
    password: SecretString,
    hardware_key: Option<&Path>,
    codec: &ContainerCodec,
) -> Result<EncryptionSecret> {
    let secret = EncryptionSecret::from_secret(password);
    match hardware_key {
        Some(path) => {
            let hardware = CredentialFileAuthenticator::new(path, Arc::clone(codec.provider()))
                .authenticate()
                .with_context(|| format!("hardware key: {}", path.display()))?;
            Ok(secret.with_hardware(hardware))
        }
        None => Ok(secret),
    }
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_sink(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |percent| pb.set_position(u64::from(percent)))
}

// ── `vaultpack encrypt` ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct EncryptOverrides {
    filename_mode: Option<FilenameMode>,
    preserve_extensions: bool,
    prefix: Option<String>,
    enhanced: bool,
    compression_level: Option<u8>,
    no_solid: bool,
}

impl EncryptOverrides {
    fn filenames(&self, config: &VaultConfig) -> FilenameEncryptionOptions {
        let mut options = config.filenames.clone();
        if let Some(mode) = self.filename_mode {
            options.mode = mode;
        }
        if self.preserve_extensions {
            options.preserve_extensions = true;
        }
        if let Some(prefix) = &self.prefix {
            options.custom_prefix = prefix.clone();
        }
        options
    }

    fn archive_options(&self, config: &VaultConfig) -> ArchiveOptions {
        let mut options = ArchiveOptions::from_config(config);
        options.filenames = self.filenames(config);
        if self.enhanced || self.compression_level.is_some() || self.no_solid {
            let mut compression = config.archive.compression;
            if let Some(level) = self.compression_level {
                compression.level = level;
            }
            let solid = config.archive.solid && !self.no_solid;
            options = options.enhanced(compression, solid);
        }
        options
    }
}

async fn cmd_encrypt(
    config: &VaultConfig,
    paths: &[PathBuf],
    output: Option<&Path>,
    overrides: EncryptOverrides,
    hardware_key: Option<&Path>,
) -> Result<()> {
    for path in paths {
        if !path.exists() {
            bail!("path not found: {}", path.display());
        }
    }

    let codec = codec_for(config)?;
    let password = read_password(true, config.password.min_length)?;
    let secret = build_secret(password, hardware_key, &codec)?;

    if let [single] = paths {
        if single.is_file() {
            let filenames = overrides.filenames(config);
            filenames.validate()?;
            return encrypt_container(codec, secret, single, output, filenames).await;
        }
    }

    let files = collect_inputs(paths)?;
    if files.is_empty() {
        bail!("no files found under the given paths");
    }
    let options = overrides.archive_options(config);
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("vaultpack-{}.zip", now_millis())));

    println!(
        "Encrypting {} files → {} ({})",
        files.len(),
        output.display(),
        match options.variant {
            ArchiveVariant::Standard => "standard archive",
            ArchiveVariant::Enhanced { .. } => "enhanced archive",
        }
    );

    let pb = make_progress_bar("encrypt");
    let progress = progress_sink(&pb);
    let archive = ArchiveCodec::new(codec);
    let file_count = files.len();
    let bytes = tokio::task::spawn_blocking(move || {
        archive.pack_many(&files, &secret, &options, Some(&progress))
    })
    .await
    .context("joining encrypt task")?
    .context("encrypting archive")?;
    pb.finish_with_message("done");

    tokio::fs::write(&output, &bytes)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    info!(files = file_count, bytes = bytes.len(), "archive written");
    println!("  files:  {file_count}");
    println!("  size:   {}", fmt_bytes(bytes.len() as u64));
    println!("  output: {}", output.display());
    Ok(())
}

async fn encrypt_container(
    codec: ContainerCodec,
    secret: EncryptionSecret,
    input: &Path,
    output: Option<&Path>,
    filenames: FilenameEncryptionOptions,
) -> Result<()> {
    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let name = file_name_of(input)?;
    let metadata = FileMetadata::new(name, data.len() as u64, "")
        .with_filename_encryption(filenames)
        .with_last_modified(mtime_millis(input));

    let packed = tokio::task::spawn_blocking(move || codec.pack(&data, metadata, &secret))
        .await
        .context("joining encrypt task")?
        .context("encrypting file")?;

    let target = match output {
        Some(path) if path.is_dir() => path.join(&packed.stored_name),
        Some(path) => path.to_path_buf(),
        None => input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&packed.stored_name),
    };
    tokio::fs::write(&target, &packed.bytes)
        .await
        .with_context(|| format!("writing {}", target.display()))?;

    println!("Encrypted {} → {}", input.display(), target.display());
    println!("  size: {}", fmt_bytes(packed.bytes.len() as u64));
    Ok(())
}

/// Expand `paths` into archive inputs.
///
/// Directories contribute every regular file below them, with a relative path
/// rooted at the directory's own name; plain files are individual entries.
fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<InputFile>> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            let root = file_name_of(path)?;
            let mut found = Vec::new();
            collect_files_inner(path, &mut found)?;
            found.sort(); // deterministic order
            for file in found {
                let rel = file
                    .strip_prefix(path)
                    .with_context(|| format!("{} escaped {}", file.display(), path.display()))?;
                let segments: Vec<_> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                let relative = format!("{root}/{}", segments.join("/"));
                inputs.push(InputFile::from_path(&file).with_relative_path(relative));
            }
        } else if path.is_file() {
            inputs.push(InputFile::from_path(path));
        } else {
            bail!("not a file or directory: {}", path.display());
        }
    }
    Ok(inputs)
}

fn collect_files_inner(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading dir: {}", dir.display()))? {
        let entry = entry.context("reading dir entry")?;
        let path = entry.path();
        let meta = entry.metadata().context("stat dir entry")?;
        if meta.is_dir() {
            collect_files_inner(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

// ── `vaultpack decrypt` ───────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RestoreInfo<'a> {
    restored_at: u64,
    source: String,
    manifest: &'a ArchiveMetadata,
    files: Vec<RestoredEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RestoredEntry {
    path: String,
    size: u64,
    mime_type: String,
}

async fn cmd_decrypt(
    config: &VaultConfig,
    input: &Path,
    output: &Path,
    hardware_key: Option<&Path>,
) -> Result<()> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let codec = codec_for(config)?;

    if is_zip(&bytes) {
        let manifest = ArchiveCodec::read_manifest(&bytes).context("reading archive manifest")?;
        if manifest.has_hardware_key && hardware_key.is_none() {
            bail!("this archive was sealed with a hardware key; pass --hardware-key");
        }
        let password = read_password(false, 1)?;
        let secret = build_secret(password, hardware_key, &codec)?;

        let pb = make_progress_bar("decrypt");
        let progress = progress_sink(&pb);
        let archive = ArchiveCodec::new(codec);
        let unpacked = tokio::task::spawn_blocking(move || {
            archive.unpack_many(&bytes, &secret, Some(&progress))
        })
        .await
        .context("joining decrypt task")?
        .context("decrypting archive")?;
        pb.finish_with_message("done");

        for file in &unpacked.files {
            write_restored(output, &file.path, &file.data).await?;
        }

        let info = RestoreInfo {
            restored_at: now_millis(),
            source: input.display().to_string(),
            manifest: &unpacked.manifest,
            files: unpacked
                .files
                .iter()
                .map(|f| RestoredEntry {
                    path: f.path.clone(),
                    size: f.data.len() as u64,
                    mime_type: f.metadata.mime_type.clone(),
                })
                .collect(),
        };
        let info_json = serde_json::to_vec_pretty(&info).context("serializing restore info")?;
        write_restored(output, RESTORE_INFO_NAME, &info_json).await?;

        println!("Decrypted {} files → {}", unpacked.files.len(), output.display());
        return Ok(());
    }

    let metadata = ContainerCodec::peek_metadata(&bytes).context("reading container")?;
    if metadata.has_hardware_key && hardware_key.is_none() {
        bail!("this file was sealed with a hardware key; pass --hardware-key");
    }
    let password = read_password(false, 1)?;
    let secret = build_secret(password, hardware_key, &codec)?;
    let stored_name = file_name_of(input)?;

    let (name, data) = tokio::task::spawn_blocking(move || {
        let unpacked = codec.unpack(&bytes, &secret)?;
        let name = codec.names().reveal(
            &stored_name,
            secret.password(),
            &unpacked.metadata.filename_encryption,
            &unpacked.metadata.original_name,
        );
        Ok::<_, vaultpack_core::VaultError>((name, unpacked.data))
    })
    .await
    .context("joining decrypt task")?
    .context("decrypting file")?;

    let target = write_restored(output, &name, &data).await?;
    println!("Decrypted {} → {}", input.display(), target.display());
    Ok(())
}

async fn write_restored(root: &Path, relative: &str, data: &[u8]) -> Result<PathBuf> {
    validate_relative_path(relative)?;
    let target = root.join(relative);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(&target, data)
        .await
        .with_context(|| format!("writing {}", target.display()))?;
    Ok(target)
}

// ── `vaultpack inspect` ───────────────────────────────────────────────────────

async fn cmd_inspect(input: &Path) -> Result<()> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;

    if is_zip(&bytes) {
        let manifest = ArchiveCodec::read_manifest(&bytes).context("reading archive manifest")?;
        println!("Archive: {}", input.display());
        println!("  version:      {}", manifest.version);
        println!("  encryption:   {}", manifest.encryption_method);
        println!("  files:        {}", manifest.total_files);
        println!("  folders:      {}", manifest.folders.len());
        println!("  hardware key: {}", manifest.has_hardware_key);
        println!("  filenames:    {}", manifest.filename_encryption.mode);
        println!(
            "  variant:      {}",
            if manifest.is_enhanced() { "enhanced" } else { "standard" }
        );
        println!("  total size:   {}", fmt_bytes(manifest.total_original_size));
        for folder in &manifest.folders {
            println!("    {}/ ({} files)", folder.name, folder.file_count);
        }
    } else {
        let metadata = ContainerCodec::peek_metadata(&bytes).context("reading container")?;
        let rendered =
            serde_json::to_string_pretty(&metadata).context("serializing metadata")?;
        println!("Container: {}", input.display());
        println!("{rendered}");
    }
    Ok(())
}

// ── `vaultpack config show` ───────────────────────────────────────────────────

fn cmd_config_show(config: &VaultConfig, config_path: Option<&Path>) -> Result<()> {
    match config_path {
        Some(path) if path.exists() => println!("# Configuration from: {}", path.display()),
        Some(path) => println!("# Configuration: defaults (no file at {})", path.display()),
        None => println!("# Configuration: defaults"),
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06")
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("no file name in {}", path.display()))
}

fn mtime_millis(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_millis() as u64)
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
