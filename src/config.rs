use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, fmt, str::FromStr};

/// Default request body cap; multipart uploads are buffered in memory.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub project_id: String,
    pub bucket_name: String,
    pub signing_secret: String,
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
}

// The signing secret must never end up in logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("project_id", &self.project_id)
            .field("bucket_name", &self.bucket_name)
            .field("signing_secret", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("public_base_url", &self.public_base_url)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Photo album image record service")]
pub struct Args {
    /// Project identifier (overrides PROJECT_ID)
    #[arg(long)]
    pub project_id: Option<String>,

    /// Object store bucket (overrides BUCKET_NAME)
    #[arg(long)]
    pub bucket_name: Option<String>,

    /// Secret used to sign object URLs (overrides SIGNING_SECRET)
    #[arg(long)]
    pub signing_secret: Option<String>,

    /// Host to bind to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where image payloads are stored (overrides STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Base URL signed links are issued under (overrides PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Maximum accepted request body in bytes (overrides MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |name| env::var(name))?;
        Ok((cfg, migrate))
    }

    /// Merge parsed arguments over values produced by `lookup`.
    ///
    /// `lookup` has the shape of `std::env::var` so tests can feed a map.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let project_id = required(args.project_id, &lookup, "PROJECT_ID")?;
        let bucket_name = required(args.bucket_name, &lookup, "BUCKET_NAME")?;
        let signing_secret = required(args.signing_secret, &lookup, "SIGNING_SECRET")?;

        let host = match args.host {
            Some(host) => host,
            None => optional(&lookup, "HOST")?.unwrap_or_else(|| "0.0.0.0".into()),
        };
        let port = match args.port {
            Some(port) => port,
            None => parsed(&lookup, "PORT")?.unwrap_or(8080),
        };
        let storage_dir = match args.storage_dir {
            Some(dir) => dir,
            None => optional(&lookup, "STORAGE_DIR")?.unwrap_or_else(|| "./data/objects".into()),
        };
        let database_url = match args.database_url {
            Some(url) => url,
            None => optional(&lookup, "DATABASE_URL")?
                .unwrap_or_else(|| format!("sqlite://./data/meta/{}.db", project_id)),
        };
        let public_base_url = match args.public_base_url {
            Some(url) => url,
            None => optional(&lookup, "PUBLIC_BASE_URL")?
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
        };
        let max_upload_bytes = match args.max_upload_bytes {
            Some(limit) => limit,
            None => parsed(&lookup, "MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };

        Ok(Self {
            project_id,
            bucket_name,
            signing_secret,
            host,
            port,
            storage_dir,
            database_url,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_upload_bytes,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn optional<F>(lookup: &F, name: &str) -> Result<Option<String>>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(name) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn required<F>(flag: Option<String>, lookup: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    let value = match flag {
        Some(value) => value,
        None => optional(lookup, name)?.unwrap_or_default(),
    };
    if value.is_empty() {
        bail!("no {}", name);
    }
    Ok(value)
}

fn parsed<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    optional(lookup, name)?
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", name, value))
        })
        .transpose()
}
