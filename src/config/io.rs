use std::env::current_exe;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use directories_next::ProjectDirs;
use fd_lock::{RwLock, RwLockWriteGuard};
use log::{debug, error, info, warn};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::config::types::Config;
use crate::error::ConfigError;

// creates a path to smartstick.json in the same directory as the executable
// this keeps the app portable on a usb stick
fn get_portable_config_path() -> Option<PathBuf> {
    match current_exe() {
        Ok(mut path) => {
            // /opt/smartstick => /opt/smartstick.json
            if !path.set_extension("json") {
                warn!("current exe has no filename: {}", path.to_string_lossy());
                return None
            }

            Some(path)
        },
        Err(err) => {
            warn!("failed to get current exe path: {:?}", err);
            None
        },
    }
}

// creates a path to smartstick-companion.json in an os dependent standard directory, such as
// ~/.config on linux.
fn get_local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "smartstick", "smartstick-companion").map(|dirs| {
        dirs.config_dir().join("smartstick-companion.json")
    })
}

fn get_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = get_portable_config_path() {
        match std::fs::metadata(&path) {
            Ok(attr) => {
                if attr.is_file() {
                    return Ok(path);
                }
            }
            Err(err) => {
                info!("No portable config at {}; Using local path instead. ({})", path.to_string_lossy(), err);
            },
        }
    }

    match get_local_config_path() {
        None => Err(ConfigError::NoConfigPath),
        Some(path) => Ok(path),
    }
}

/// Holds the config file open for the exclusive lock that keeps a second instance from driving
/// the same bluetooth adapter.
pub struct InstanceLock {
    rw_lock: RwLock<std::fs::File>,
}

impl InstanceLock {
    pub fn acquire(&mut self) -> Result<RwLockWriteGuard<'_, std::fs::File>, ConfigError> {
        self.rw_lock.try_write().map_err(|source| ConfigError::CanNotLock { source })
    }
}

/// Reads and writes the config document. Clones share one open file.
#[derive(Clone)]
pub struct ConfigIO {
    file: Arc<Mutex<std::fs::File>>,
}

impl ConfigIO {
    pub fn new_sync() -> Result<Self, ConfigError> {
        ConfigIO::open_sync(&get_config_path()?)
    }

    pub fn open_sync(path: &Path) -> Result<Self, ConfigError> {
        info!("Using config file {}", path.to_string_lossy());

        if let Some(directory) = path.parent() {
            std::fs::create_dir_all(directory)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(false)
            .create(true)
            .open(path)?;

        Ok(ConfigIO { file: Arc::new(Mutex::new(file)) })
    }

    pub fn instance_lock(&self) -> Result<InstanceLock, ConfigError> {
        Ok(InstanceLock { rw_lock: RwLock::new(self.std_file()?) })
    }

    // a new handle on the shared open file; the seek position is shared as well
    fn std_file(&self) -> Result<std::fs::File, ConfigError> {
        let file = self.file.lock().expect("Failed to lock ConfigIO file");
        Ok(file.try_clone()?)
    }

    /// An empty file (as created on first start) reads as the default config.
    pub async fn read(&self) -> Result<Config, ConfigError> {
        let mut file = File::from_std(self.std_file()?);
        let mut content = Vec::new();
        file.rewind().await?;
        file.read_to_end(&mut content).await?;

        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Config::default());
        }
        Ok(serde_json::from_slice(&content)?)
    }

    /// Like [`ConfigIO::read`], but a missing or broken config is logged and replaced by the
    /// defaults.
    pub async fn read_or_default(&self) -> Config {
        match self.read().await {
            Ok(config) => config,
            Err(err) => {
                error!("Failed to load config, using defaults: {}", err);
                Config::default()
            },
        }
    }

    pub async fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let content = serde_json::to_vec_pretty(config)?;
        debug!("Saving config ({} bytes)", content.len());

        let mut file = File::from_std(self.std_file()?);
        file.set_len(0).await?;
        file.rewind().await?;
        file.write_all(&content).await?;
        file.flush().await?;
        Ok(())
    }
}
