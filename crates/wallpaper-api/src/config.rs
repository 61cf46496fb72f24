//! Service configuration from environment variables

use crate::device::DeviceClass;
use crate::error::{Result, WallpaperError};
use crate::partition::{Partition, PartitionSet};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub index_dir: PathBuf,
    pub blob_dir: PathBuf,
    pub partitions: PartitionSet,
    pub refresh_interval: Duration,
    pub refresh_on_startup: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8787,
            index_dir: PathBuf::from("./data/index"),
            blob_dir: PathBuf::from("./data/blobs"),
            partitions: PartitionSet::default(),
            refresh_interval: Duration::from_secs(24 * 60 * 60), // daily
            refresh_on_startup: true,
        }
    }
}

impl ApiConfig {
    /// Parse configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let port = match var("PORT") {
            Some(s) => s
                .parse::<u16>()
                .map_err(|_| WallpaperError::Config(format!("invalid PORT: {}", s)))?,
            None => defaults.port,
        };

        let index_dir = var("INDEX_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.index_dir);
        let blob_dir = var("BLOB_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.blob_dir);

        let partitions = PartitionSet {
            desktop: Partition::new(
                DeviceClass::Desktop,
                var("DESKTOP_INDEX_KEY").unwrap_or(defaults.partitions.desktop.index_name),
                var("DESKTOP_PREFIX").unwrap_or(defaults.partitions.desktop.prefix),
            ),
            mobile: Partition::new(
                DeviceClass::Mobile,
                var("MOBILE_INDEX_KEY").unwrap_or(defaults.partitions.mobile.index_name),
                var("MOBILE_PREFIX").unwrap_or(defaults.partitions.mobile.prefix),
            ),
        };
        if partitions.desktop.index_name == partitions.mobile.index_name {
            return Err(WallpaperError::Config(
                "desktop and mobile partitions share an index key".to_string(),
            ));
        }

        let refresh_interval = match var("REFRESH_INTERVAL_SECS") {
            Some(s) => match s.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(WallpaperError::Config(format!(
                        "invalid REFRESH_INTERVAL_SECS: {}",
                        s
                    )))
                }
            },
            None => defaults.refresh_interval,
        };

        let refresh_on_startup = var("REFRESH_ON_STARTUP")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(defaults.refresh_on_startup);

        Ok(Self {
            port,
            index_dir,
            blob_dir,
            partitions,
            refresh_interval,
            refresh_on_startup,
        })
    }
}
