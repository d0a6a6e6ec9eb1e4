//! cloak: client-side encrypted file storage CLI
//!
//! Account commands:
//!   keygen                  - create a new account secret and recovery phrase
//!   recover                 - rebuild the account secret from its recovery phrase
//!
//! File commands:
//!   encrypt <file>          - seal a file, writing <file>.cloak and its metadata sidecar
//!   decrypt <file>          - open a sealed (or plain) file with the secret or a share link
//!   share <file>            - print a share link for a sealed file
//!   inspect <file>          - show envelope details without any key material
//!   config show             - display current configuration

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use cloak_core::config::{AccountConfig, CloakConfig};
use cloak_core::types::FileMeta;
use cloak_crypto::{
    decrypt, derive_account_secret, encrypt_file, encrypt_legacy, export_for_share, inspect,
    mnemonic_to_secret, secret_to_mnemonic, unwrap, AccountSecret, CryptoError, DecryptOptions,
    DecryptRequest, Generation, KdfParams, Outcome, ShareLink, WrappedFileKey,
};

/// Suffix appended to encrypted objects written by `cloak encrypt`
const ENCRYPTED_SUFFIX: &str = "cloak";

/// Output name when even the configured default is not a usable file name
const LAST_RESORT_NAME: &str = "download";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cloak",
    version,
    about = "Client-side encrypted file storage",
    long_about = "cloak: seal files before upload, open them after download, and share them by link"
)]
struct Cli {
    /// Path to cloak.toml configuration file
    #[arg(long, short = 'c', env = "CLOAK_CONFIG", default_value = "~/.config/cloak/cloak.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new account secret and print its recovery phrase
    Keygen {
        /// Write the secret (hex) to this file instead of stdout
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Rebuild the account secret from its 24-word recovery phrase (prompted)
    Recover {
        /// Write the secret (hex) to this file instead of stdout
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Encrypt a file
    Encrypt {
        /// Plaintext file
        input: PathBuf,
        /// Output path (default: <input>.cloak)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Write the legacy direct-key format (no wrapped key, not shareable)
        #[arg(long)]
        legacy: bool,
        #[command(flatten)]
        secret: SecretArgs,
    },

    /// Decrypt a file; plain files are copied through unchanged
    Decrypt {
        /// Encrypted (or plain) file
        input: PathBuf,
        /// Output path (default: suggested name next to the input)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Metadata sidecar (default: <input>.cloakmeta.json)
        #[arg(long)]
        meta: Option<PathBuf>,
        /// Share link or bare share token
        #[arg(long, env = "CLOAK_SHARE", hide_env_values = true)]
        share: Option<String>,
        #[command(flatten)]
        secret: SecretArgs,
    },

    /// Print a share link for an encrypted file
    Share {
        /// Encrypted file
        input: PathBuf,
        /// Metadata sidecar (default: <input>.cloakmeta.json)
        #[arg(long)]
        meta: Option<PathBuf>,
        #[command(flatten)]
        secret: SecretArgs,
    },

    /// Show envelope details (generation, extension hint, sizes)
    Inspect {
        /// File to inspect
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

/// Sources for the account secret, highest priority first
#[derive(Args, Debug, Default)]
struct SecretArgs {
    /// Account secret as hex or base64
    #[arg(long, env = "CLOAK_ACCOUNT_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Derive the account secret from a passphrase (prompted)
    #[arg(long)]
    passphrase: bool,

    /// File holding the account secret (overrides config secret_file)
    #[arg(long)]
    secret_file: Option<PathBuf>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = CloakConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;
    init_logging(&config.logging.level, &config.logging.format);

    match cli.command {
        Commands::Keygen { out } => cmd_keygen(out.as_deref()).await,
        Commands::Recover { out } => cmd_recover(out.as_deref()).await,
        Commands::Encrypt { input, output, legacy, secret } => {
            cmd_encrypt(&config, &input, output.as_deref(), legacy, &secret).await
        }
        Commands::Decrypt { input, output, meta, share, secret } => {
            cmd_decrypt(&config, &input, output.as_deref(), meta.as_deref(), share, &secret).await
        }
        Commands::Share { input, meta, secret } => {
            cmd_share(&config, &input, meta.as_deref(), &secret).await
        }
        Commands::Inspect { input } => cmd_inspect(&input).await,
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        "json" => registry.with(fmt::layer().json().with_writer(std::io::stderr)).init(),
        _ => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
    }
}

// ── Secret resolution ─────────────────────────────────────────────────────────

/// Resolve the account secret: --secret/env > --passphrase > --secret-file > config.
/// `Ok(None)` when no source is configured.
async fn resolve_secret(
    config: &CloakConfig,
    args: &SecretArgs,
) -> Result<Option<AccountSecret>> {
    if let Some(encoded) = &args.secret {
        let secret =
            AccountSecret::parse(encoded).context("parsing --secret / CLOAK_ACCOUNT_SECRET")?;
        return Ok(Some(secret));
    }

    if args.passphrase {
        return passphrase_secret(&config.account).map(Some);
    }

    let Some(path) = args
        .secret_file
        .clone()
        .or_else(|| config.account.secret_file.clone())
    else {
        return Ok(None);
    };

    let path = expand_tilde(&path);
    let content = Zeroizing::new(
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading secret file: {}", path.display()))?,
    );
    let secret = AccountSecret::parse(&content)
        .with_context(|| format!("parsing secret file: {}", path.display()))?;
    Ok(Some(secret))
}

fn passphrase_secret(account: &AccountConfig) -> Result<AccountSecret> {
    let salt_b64 = account
        .passphrase_salt
        .as_deref()
        .context("passphrase login needs `passphrase_salt` in the [account] config section")?;
    let salt_bytes = B64.decode(salt_b64).context("decoding passphrase_salt")?;
    let salt: [u8; 16] = salt_bytes.as_slice().try_into().map_err(|_| {
        anyhow::anyhow!("passphrase_salt must decode to 16 bytes, got {}", salt_bytes.len())
    })?;

    let passphrase = SecretString::from(
        rpassword::prompt_password("Passphrase: ").context("reading passphrase")?,
    );
    let params = KdfParams {
        mem_cost_kib: account.argon2_mem_cost_kib,
        time_cost: account.argon2_time_cost,
        parallelism: account.argon2_parallelism,
    };
    derive_account_secret(&passphrase, &salt, &params).context("deriving account secret")
}

async fn require_secret(config: &CloakConfig, args: &SecretArgs) -> Result<AccountSecret> {
    resolve_secret(config, args).await?.context(
        "no account secret available\n\
         Provide one with --secret, --secret-file, --passphrase, CLOAK_ACCOUNT_SECRET,\n\
         or set [account] secret_file in the config.",
    )
}

async fn write_secret(secret: &AccountSecret, out: Option<&Path>) -> Result<()> {
    let hex = secret.to_hex();
    match out {
        Some(path) => {
            tokio::fs::write(path, format!("{}\n", hex.as_str()))
                .await
                .with_context(|| format!("writing secret: {}", path.display()))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                    .await
                    .with_context(|| format!("restricting permissions: {}", path.display()))?;
            }
            println!("  secret:  written to {}", path.display());
        }
        None => println!("  secret:  {}", hex.as_str()),
    }
    Ok(())
}

// ── `cloak keygen` / `cloak recover` ──────────────────────────────────────────

async fn cmd_keygen(out: Option<&Path>) -> Result<()> {
    let secret = AccountSecret::generate();
    let words = secret_to_mnemonic(&secret)?;

    println!("New account secret created.");
    write_secret(&secret, out).await?;
    println!();
    println!("Recovery phrase (write it down; it is shown once and never stored):");
    println!();
    println!("  {}", words.as_str());
    Ok(())
}

async fn cmd_recover(out: Option<&Path>) -> Result<()> {
    let words = Zeroizing::new(
        rpassword::prompt_password("Recovery phrase: ").context("reading recovery phrase")?,
    );
    let secret = mnemonic_to_secret(&words).context("recovering account secret")?;

    println!("Account secret recovered.");
    write_secret(&secret, out).await
}

// ── `cloak encrypt` ───────────────────────────────────────────────────────────

async fn cmd_encrypt(
    config: &CloakConfig,
    input: &Path,
    output: Option<&Path>,
    legacy: bool,
    secret_args: &SecretArgs,
) -> Result<()> {
    let secret = require_secret(config, secret_args).await?;
    let plaintext = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let name = file_name(input).unwrap_or_else(|| config.decrypt.default_name.clone());

    let (envelope, meta) = if legacy {
        let envelope = encrypt_legacy(&plaintext, &secret, Some(name.as_str()))?;
        let meta = FileMeta::encrypted(name.as_str(), Generation::Legacy.to_string(), None);
        (envelope, meta)
    } else {
        let encrypted = encrypt_file(&plaintext, &secret, Some(name.as_str()))?;
        let meta = FileMeta::encrypted(
            name.as_str(),
            Generation::Current.to_string(),
            Some(encrypted.wrapped_key.to_string()),
        );
        (encrypted.envelope, meta)
    };

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_encrypted_path(input));
    tokio::fs::write(&output, &envelope)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    let meta_path = FileMeta::sidecar_path(&output);
    tokio::fs::write(&meta_path, meta.to_bytes()?)
        .await
        .with_context(|| format!("writing metadata {}", meta_path.display()))?;

    println!("Encrypted {} → {}", input.display(), output.display());
    println!("  format:  {}", meta.generation.as_deref().unwrap_or("current"));
    println!("  bytes:   {} → {}", plaintext.len(), envelope.len());
    println!("  meta:    {}", meta_path.display());
    Ok(())
}

// ── `cloak decrypt` ───────────────────────────────────────────────────────────

async fn cmd_decrypt(
    config: &CloakConfig,
    input: &Path,
    output: Option<&Path>,
    meta_override: Option<&Path>,
    share: Option<String>,
    secret_args: &SecretArgs,
) -> Result<()> {
    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;

    let meta_path = meta_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| FileMeta::sidecar_path(input));
    let meta = read_meta(&meta_path).await?;

    let wrapped_key = meta
        .as_ref()
        .and_then(|m| m.wrapped_key.as_deref())
        .map(WrappedFileKey::from_base64)
        .transpose()
        .with_context(|| format!("parsing wrapped key in {}", meta_path.display()))?;

    let secret = resolve_secret(config, secret_args).await?;
    let token = share.map(share_token_arg);
    let fallback = fallback_name(input, meta.as_ref(), &config.decrypt.default_name);

    let mut req = DecryptRequest::new(&data, &fallback)
        .with_marked_encrypted(meta.as_ref().map_or(true, |m| m.encrypted))
        .with_options(DecryptOptions {
            legacy_probe: config.decrypt.legacy_probe,
        });
    if let Some(secret) = &secret {
        req = req.with_secret(secret);
    }
    if let Some(wrapped_key) = &wrapped_key {
        req = req.with_wrapped_key(wrapped_key);
    }
    if let Some(token) = token.as_deref() {
        req = req.with_share_token(token);
    }

    let outcome = decrypt(&req)?;
    let status = match &outcome {
        Outcome::Decrypted(file) if file.probed => "decrypted (probed legacy)",
        Outcome::Decrypted(_) => "decrypted",
        Outcome::Unencrypted => "not encrypted, copied as-is",
        Outcome::Failed(_) => "failed",
    };

    let (content, name) = match outcome.into_content(&data, &fallback) {
        Ok(resolved) => resolved,
        Err(failure) => {
            tracing::debug!(%failure, input = %input.display(), "decryption failed");
            anyhow::bail!("{}", failure.user_message());
        }
    };

    let output = output.map(Path::to_path_buf).unwrap_or_else(|| {
        input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&name)
    });
    if output == input {
        anyhow::bail!(
            "refusing to overwrite the input {}; pass --output",
            input.display()
        );
    }
    tokio::fs::write(&output, &content)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    println!("{} → {}", input.display(), output.display());
    println!("  status:  {status}");
    println!("  bytes:   {}", content.len());
    Ok(())
}

// ── `cloak share` ─────────────────────────────────────────────────────────────

async fn cmd_share(
    config: &CloakConfig,
    input: &Path,
    meta_override: Option<&Path>,
    secret_args: &SecretArgs,
) -> Result<()> {
    let meta_path = meta_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| FileMeta::sidecar_path(input));
    let meta = read_meta(&meta_path)
        .await?
        .with_context(|| format!("no metadata sidecar at {}", meta_path.display()))?;

    let wrapped = meta
        .wrapped_key
        .as_deref()
        .context("this file has no wrapped key (legacy or plain files cannot be shared)")?;
    let wrapped = WrappedFileKey::from_base64(wrapped)
        .with_context(|| format!("parsing wrapped key in {}", meta_path.display()))?;

    let secret = require_secret(config, secret_args).await?;
    let owned = match unwrap(&wrapped, &secret) {
        Ok(owned) => owned,
        Err(CryptoError::KeyRejected) => {
            anyhow::bail!("The account secret does not open this file's key.")
        }
        Err(e) => return Err(e.into()),
    };

    let object = file_name(input).context("input has no file name")?;
    let base = format!("{}/{}", config.share.base_url.trim_end_matches('/'), object);
    let link = ShareLink::build(&base, &export_for_share(&owned));

    println!("Anyone with this link can decrypt {}:", meta.name);
    println!();
    println!("  {link}");
    Ok(())
}

// ── `cloak inspect` ───────────────────────────────────────────────────────────

async fn cmd_inspect(input: &Path) -> Result<()> {
    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;

    match inspect(&data) {
        Ok(Some(info)) => println!("{}", serde_json::to_string_pretty(&info)?),
        Ok(None) => println!("{}: not a cloak envelope (plain file)", input.display()),
        Err(e) => anyhow::bail!("{}: corrupt envelope: {e}", input.display()),
    }
    Ok(())
}

// ── `cloak config show` ───────────────────────────────────────────────────────

fn cmd_config_show(config: &CloakConfig, path: &Path) -> Result<()> {
    println!("# config: {}", path.display());
    println!("{}", toml::to_string_pretty(config).context("serializing config")?);
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn read_meta(path: &Path) -> Result<Option<FileMeta>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => FileMeta::from_bytes(&bytes)
            .map(Some)
            .with_context(|| format!("parsing metadata {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading metadata {}", path.display())),
    }
}

/// A share link yields its token; anything else is passed through for the
/// engine to judge.
fn share_token_arg(raw: String) -> String {
    match ShareLink::parse(&raw) {
        Ok(token) => token.to_string(),
        Err(_) => raw,
    }
}

/// Name for recovered plaintext: metadata name, else the input name without
/// the `.cloak` suffix, else the configured default.
///
/// Always a single path component. Metadata may come from whoever uploaded
/// the object, so directories, `..` and absolute paths are stripped.
fn fallback_name(input: &Path, meta: Option<&FileMeta>, default_name: &str) -> String {
    let from_meta = meta.and_then(|m| path_component(&m.name));
    let from_input = input
        .file_name()
        .map(|n| n.to_string_lossy())
        .and_then(|name| {
            name.strip_suffix(&format!(".{ENCRYPTED_SUFFIX}"))
                .and_then(path_component)
        });

    from_meta
        .or(from_input)
        .or_else(|| path_component(default_name))
        .unwrap_or_else(|| LAST_RESORT_NAME.to_string())
}

/// Final component of `name`; `None` for empty names, `.` and `..`.
fn path_component(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
}

fn default_encrypted_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".");
    name.push(ENCRYPTED_SUFFIX);
    PathBuf::from(name)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(format!("{home}/{rest}"))
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_encrypted_path() {
        assert_eq!(
            default_encrypted_path(Path::new("/tmp/photo.jpg")),
            PathBuf::from("/tmp/photo.jpg.cloak")
        );
    }

    #[test]
    fn test_fallback_name() {
        let meta = FileMeta::encrypted("invoice.pdf", "current", None);
        assert_eq!(
            fallback_name(Path::new("/x/QmHash"), Some(&meta), "download"),
            "invoice.pdf"
        );
        assert_eq!(
            fallback_name(Path::new("/x/notes.txt.cloak"), None, "download"),
            "notes.txt"
        );
        assert_eq!(fallback_name(Path::new("/x/.cloak"), None, "download"), "download");
        assert_eq!(fallback_name(Path::new("/x/blob"), None, "download"), "download");
    }

    #[test]
    fn test_fallback_name_strips_directories() {
        let blob = Path::new("/inbox/blob");
        for (hostile, expected) in [
            ("/etc/passwd", "passwd"),
            ("../../.bashrc", ".bashrc"),
            ("nested/dir/report.pdf", "report.pdf"),
            ("..", "download"),
            (".", "download"),
            ("/", "download"),
        ] {
            let meta = FileMeta::plaintext(hostile);
            assert_eq!(fallback_name(blob, Some(&meta), "download"), expected, "{hostile}");
        }

        assert_eq!(fallback_name(blob, None, "../out/file"), "file");
        assert_eq!(fallback_name(blob, None, ".."), "download");
    }

    #[test]
    fn test_share_token_arg() {
        let token = "A".repeat(43);
        let link = format!("https://cloak.example/f/x#key={token}");
        assert_eq!(share_token_arg(link), token);
        assert_eq!(share_token_arg(token.clone()), token);
        assert_eq!(share_token_arg("https://x#key=bad".into()), "https://x#key=bad");
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("~/cloak.toml"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert_eq!(expand_tilde(Path::new("/etc/cloak.toml")), PathBuf::from("/etc/cloak.toml"));
    }

    #[tokio::test]
    async fn test_resolve_secret_sources() {
        let tmp = tempfile::TempDir::new().unwrap();
        let secret_path = tmp.path().join("secret");
        tokio::fs::write(&secret_path, format!("{}\n", "ab".repeat(32)))
            .await
            .unwrap();

        let mut config = CloakConfig::default();
        assert!(resolve_secret(&config, &SecretArgs::default())
            .await
            .unwrap()
            .is_none());

        config.account.secret_file = Some(secret_path.clone());
        let from_config = resolve_secret(&config, &SecretArgs::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(from_config.as_bytes(), &[0xab; 32]);

        let explicit = SecretArgs {
            secret: Some("cd".repeat(32)),
            ..SecretArgs::default()
        };
        let from_flag = resolve_secret(&config, &explicit).await.unwrap().unwrap();
        assert_eq!(from_flag.as_bytes(), &[0xcd; 32]);
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let input = tmp.path().join("report.pdf");
        tokio::fs::write(&input, b"%PDF-1.7 quarterly").await.unwrap();

        let config = CloakConfig::default();
        let secret = SecretArgs {
            secret: Some("11".repeat(32)),
            ..SecretArgs::default()
        };

        cmd_encrypt(&config, &input, None, false, &secret).await.unwrap();
        let sealed = tmp.path().join("report.pdf.cloak");
        assert!(FileMeta::sidecar_path(&sealed).exists());

        let out = tmp.path().join("roundtrip.pdf");
        cmd_decrypt(&config, &sealed, Some(&out), None, None, &secret)
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&out).await.unwrap(), b"%PDF-1.7 quarterly");

        // without any key material the engine's message surfaces
        let err = cmd_decrypt(&config, &sealed, Some(&out), None, None, &SecretArgs::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("share link"));
    }

    #[tokio::test]
    async fn test_decrypt_keeps_output_next_to_input() {
        let tmp = tempfile::TempDir::new().unwrap();
        let inbox = tmp.path().join("inbox");
        tokio::fs::create_dir(&inbox).await.unwrap();

        let blob = inbox.join("blob");
        tokio::fs::write(&blob, b"plain bytes").await.unwrap();
        let victim = tmp.path().join("victim.txt");
        FileMeta::plaintext(victim.to_string_lossy())
            .write(&FileMeta::sidecar_path(&blob))
            .unwrap();

        let config = CloakConfig::default();
        cmd_decrypt(&config, &blob, None, None, None, &SecretArgs::default())
            .await
            .unwrap();

        assert!(!victim.exists());
        assert_eq!(
            tokio::fs::read(inbox.join("victim.txt")).await.unwrap(),
            b"plain bytes"
        );
    }

    #[tokio::test]
    async fn test_read_meta_missing() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(read_meta(&tmp.path().join("absent.json")).await.unwrap().is_none());
    }
}
