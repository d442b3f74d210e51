//! Configuration resolution for dlmig-ingest
//!
//! Provides multi-tier configuration resolution with CLI/ENV → TOML → default priority,
//! then validates the combination of output options.

use crate::error::{IngestError, IngestResult};
use clap::Parser;
use dlmig_common::config::TomlConfig;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default catalog (Aleph X-Server) endpoint
pub const DEFAULT_CATALOG_URL: &str = "http://aleph.mzk.cz/X";
/// Candidate catalog partitions, queried in order
pub const DEFAULT_PARTITIONS: [&str; 2] = ["mzk01", "mzk03"];
/// Attempts per catalog query while the response lacks result markers
pub const DEFAULT_RETRY_COUNT: u32 = 3;
/// Partition codes of accepted records start with this
pub const DEFAULT_INSTITUTION_PREFIX: &str = "MZK0";
/// Partition used when the catalog has no matching record
pub const DEFAULT_FALLBACK_PARTITION: &str = "uuid";
/// Upper bound of catalog entries examined per partition
pub const DEFAULT_MAX_CANDIDATES: u32 = 20;
/// Public image server base URL
pub const DEFAULT_IMAGESERVER_URL: &str = "http://imageserver.mzk.cz";
/// Import directory prefix as seen by the digital library
pub const DEFAULT_IMPORT_PREFIX: &str = "/import";

/// Command-line arguments for dlmig-ingest
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "dlmig-ingest")]
#[command(about = "Migrate digitized-library exports into image server and digital library layout")]
#[command(version)]
pub struct CliArgs {
    /// Export root; every leaf directory is one title
    #[arg(short, long, env = "DLMIG_INPUT")]
    pub input: PathBuf,

    /// Staged output root (receives `kramerius/` and `imageserver/`)
    #[arg(short, long, env = "DLMIG_OUTPUT", conflicts_with = "direct")]
    pub output: Option<PathBuf>,

    /// Write directly into the digital library and image server directories
    #[arg(long)]
    pub direct: bool,

    /// Digital library import directory (direct output)
    #[arg(long, env = "DLMIG_KRAMERIUS_DIR")]
    pub kramerius_dir: Option<PathBuf>,

    /// Image server storage root (direct output)
    #[arg(long, env = "DLMIG_IMAGESERVER_DIR")]
    pub imageserver_dir: Option<PathBuf>,

    /// Import process endpoint of the digital library
    #[arg(long, env = "DLMIG_KRAMERIUS_ADDRESS")]
    pub kramerius_address: Option<String>,

    /// Digital library credentials as `user:password`
    #[arg(long, env = "DLMIG_KRAMERIUS_CREDENTIALS")]
    pub kramerius_credentials: Option<String>,

    /// Directory receiving catalog update records
    #[arg(long, env = "DLMIG_ALEPH_DIR")]
    pub aleph_dir: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write a JSON batch report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Where the migrated output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Live digital library import directory and image server root
    Direct {
        kramerius_dir: PathBuf,
        imageserver_dir: PathBuf,
    },
    /// Local staging root mirroring both targets
    Staged { root: PathBuf },
}

impl OutputTarget {
    pub fn kramerius_dir(&self) -> PathBuf {
        match self {
            OutputTarget::Direct { kramerius_dir, .. } => kramerius_dir.clone(),
            OutputTarget::Staged { root } => root.join("kramerius"),
        }
    }

    pub fn imageserver_dir(&self) -> PathBuf {
        match self {
            OutputTarget::Direct { imageserver_dir, .. } => imageserver_dir.clone(),
            OutputTarget::Staged { root } => root.join("imageserver"),
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, OutputTarget::Direct { .. })
    }
}

/// Basic-auth credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Parse `user:password`; the password may itself contain `:`
    pub fn parse(raw: &str) -> Option<Self> {
        let (user, password) = raw.split_once(':')?;
        if user.is_empty() {
            return None;
        }
        Some(Self {
            user: user.to_string(),
            password: password.to_string(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Digital library import trigger endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEndpoint {
    pub address: String,
    pub credentials: Credentials,
    pub import_prefix: String,
}

/// Catalog lookup settings passed to the resolver at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    pub base_url: String,
    pub partitions: Vec<String>,
    pub retry_count: u32,
    pub institution_prefix: String,
    pub max_candidates: u32,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_URL.to_string(),
            partitions: DEFAULT_PARTITIONS.iter().map(|p| p.to_string()).collect(),
            retry_count: DEFAULT_RETRY_COUNT,
            institution_prefix: DEFAULT_INSTITUTION_PREFIX.to_string(),
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

/// Fully resolved run configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub input_root: PathBuf,
    pub output: OutputTarget,
    pub import_endpoint: Option<ImportEndpoint>,
    pub aleph_dir: Option<PathBuf>,
    pub catalog: CatalogSettings,
    pub imageserver_url: String,
    pub fallback_partition: String,
    pub report_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl IngestConfig {
    /// Minimal configuration writing into a staging root, catalog at `catalog_url`
    pub fn staged(input_root: PathBuf, output_root: PathBuf, catalog_url: &str) -> Self {
        Self {
            input_root,
            output: OutputTarget::Staged { root: output_root },
            import_endpoint: None,
            aleph_dir: None,
            catalog: CatalogSettings {
                base_url: catalog_url.to_string(),
                ..CatalogSettings::default()
            },
            imageserver_url: DEFAULT_IMAGESERVER_URL.to_string(),
            fallback_partition: DEFAULT_FALLBACK_PARTITION.to_string(),
            report_path: None,
            log_level: None,
        }
    }

    /// Merge command-line values over the TOML file and validate
    pub fn resolve(args: &CliArgs, toml: &TomlConfig) -> IngestResult<Self> {
        let kramerius_dir = args
            .kramerius_dir
            .clone()
            .or_else(|| toml.kramerius.directory.clone());
        let imageserver_dir = args
            .imageserver_dir
            .clone()
            .or_else(|| toml.imageserver.directory.clone());
        let address = args
            .kramerius_address
            .clone()
            .or_else(|| toml.kramerius.address.clone());
        let credentials = args
            .kramerius_credentials
            .clone()
            .or_else(|| toml.kramerius.credentials.clone());
        let aleph_dir = args.aleph_dir.clone().or_else(|| toml.aleph.directory.clone());

        if !args.input.is_dir() {
            return Err(IngestError::Config(format!(
                "Input directory does not exist: {}",
                args.input.display()
            )));
        }

        if let Some(dir) = &aleph_dir {
            if !dir.is_dir() {
                return Err(IngestError::Config(format!(
                    "Aleph directory must exist: {}",
                    dir.display()
                )));
            }
        }

        let output = if args.direct {
            let kramerius_dir = kramerius_dir.ok_or_else(|| {
                IngestError::Config("Path to kramerius must be specified for direct output".to_string())
            })?;
            let imageserver_dir = imageserver_dir.ok_or_else(|| {
                IngestError::Config("Path to imageserver must be specified for direct output".to_string())
            })?;
            require_dir(&kramerius_dir, "Kramerius")?;
            require_dir(&imageserver_dir, "Imageserver")?;
            OutputTarget::Direct {
                kramerius_dir,
                imageserver_dir,
            }
        } else if let Some(root) = args.output.clone() {
            OutputTarget::Staged { root }
        } else {
            return Err(IngestError::Config(
                "Output not set, use --output <dir> or --direct".to_string(),
            ));
        };

        let import_endpoint = match (address, credentials) {
            (None, None) => None,
            (Some(_), None) | (None, Some(_)) => {
                return Err(IngestError::Config(
                    "kramerius address and credentials must both be set when the import call is used"
                        .to_string(),
                ));
            }
            (Some(address), Some(raw)) => {
                let credentials = Credentials::parse(&raw).ok_or_else(|| {
                    IngestError::Config("kramerius credentials must have the form user:password".to_string())
                })?;
                reqwest::Url::parse(&address)
                    .map_err(|e| IngestError::Config(format!("Malformed kramerius address: {}", e)))?;

                if output.is_direct() {
                    Some(ImportEndpoint {
                        address,
                        credentials,
                        import_prefix: toml
                            .kramerius
                            .import_prefix
                            .clone()
                            .unwrap_or_else(|| DEFAULT_IMPORT_PREFIX.to_string()),
                    })
                } else {
                    warn!("Import call is only issued for direct output, ignoring kramerius address");
                    None
                }
            }
        };

        let defaults = CatalogSettings::default();
        let catalog = CatalogSettings {
            base_url: toml.catalog.base_url.clone().unwrap_or(defaults.base_url),
            partitions: toml.catalog.partitions.clone().unwrap_or(defaults.partitions),
            retry_count: toml.catalog.retry_count.unwrap_or(defaults.retry_count),
            institution_prefix: toml
                .catalog
                .institution_prefix
                .clone()
                .unwrap_or(defaults.institution_prefix),
            max_candidates: toml.catalog.max_candidates.unwrap_or(defaults.max_candidates),
        };

        if catalog.partitions.is_empty() {
            return Err(IngestError::Config("At least one catalog partition is required".to_string()));
        }
        if catalog.retry_count == 0 {
            return Err(IngestError::Config("catalog.retry_count must be at least 1".to_string()));
        }

        let config = Self {
            input_root: args.input.clone(),
            output,
            import_endpoint,
            aleph_dir,
            catalog,
            imageserver_url: toml
                .imageserver
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGESERVER_URL.to_string()),
            fallback_partition: toml
                .catalog
                .fallback_partition
                .clone()
                .unwrap_or_else(|| DEFAULT_FALLBACK_PARTITION.to_string()),
            report_path: args.report.clone(),
            log_level: toml.logging.level.clone(),
        };

        info!(
            input = %config.input_root.display(),
            direct = config.output.is_direct(),
            notify = config.import_endpoint.is_some(),
            aleph = config.aleph_dir.is_some(),
            "Configuration resolved"
        );

        Ok(config)
    }
}

fn require_dir(path: &Path, what: &str) -> IngestResult<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(IngestError::Config(format!(
            "{} directory does not exist: {}",
            what,
            path.display()
        )))
    }
}
