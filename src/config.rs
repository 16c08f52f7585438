use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub upload_dir: String,
    #[serde(default)]
    pub metadata_file: Option<String>,
    pub max_file_size: u64,
    pub sample_size: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: ServerConfig,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub upload_dir: PathBuf,
    /// Ledger of upload records, a single JSON array.
    pub metadata_file: PathBuf,
    pub max_file_size: u64,
    /// How many videos a listing samples from the upload directory.
    pub sample_size: usize,
}

const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
const DEFAULT_SAMPLE_SIZE: usize = 10;

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        // Try to load config file
        let config_path = base_dir.join("config.toml");
        let config_file = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Some(toml::from_str::<ConfigFile>(&content)?)
        } else {
            None
        };

        // Env vars override config file
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .or_else(|| config_file.as_ref().map(|c| c.server.port))
            .unwrap_or(5000);

        let upload_dir_str = std::env::var("UPLOAD_DIR")
            .or_else(|_| {
                config_file
                    .as_ref()
                    .map(|c| c.server.upload_dir.clone())
                    .ok_or(())
            })
            .unwrap_or_else(|_| "uploads".to_string());

        let upload_dir = if upload_dir_str.starts_with('/') {
            PathBuf::from(upload_dir_str)
        } else {
            base_dir.join(upload_dir_str)
        };

        let metadata_file = std::env::var("METADATA_FILE")
            .ok()
            .or_else(|| {
                config_file
                    .as_ref()
                    .and_then(|c| c.server.metadata_file.clone())
            })
            .map(|p| {
                if p.starts_with('/') {
                    PathBuf::from(p)
                } else {
                    base_dir.join(p)
                }
            })
            .unwrap_or_else(|| upload_dir.join("metadata.json"));

        let max_file_size = std::env::var("MAX_FILE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .or_else(|| config_file.as_ref().map(|c| c.server.max_file_size))
            .unwrap_or(DEFAULT_MAX_FILE_SIZE);

        let sample_size = std::env::var("SAMPLE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .or_else(|| config_file.as_ref().map(|c| c.server.sample_size))
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_SAMPLE_SIZE);

        Ok(Self {
            port,
            upload_dir,
            metadata_file,
            max_file_size,
            sample_size,
        })
    }

    pub fn from_env() -> Self {
        Self::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let upload_dir = base_dir.join("uploads");

        Self {
            port: 5000,
            metadata_file: upload_dir.join("metadata.json"),
            upload_dir,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}
