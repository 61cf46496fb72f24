//! Random Wallpaper Service Library
//!
//! Serves one randomly chosen image per request, picked from a per-device
//! key index that a scheduled refresher rebuilds from the blob store.

pub mod config;
pub mod device;
pub mod error;
pub mod index;
pub mod partition;
pub mod refresher;
pub mod selector;
pub mod server;

pub use config::ApiConfig;
pub use device::{classify, DeviceClass};
pub use error::{ApiError, RefreshError, Result, ServeError, WallpaperError};
pub use index::KeyIndex;
pub use partition::{Partition, PartitionSet};
pub use refresher::{
    spawn_refresh_schedule, IndexRefresher, PartitionRefresh, RefreshOutcome, RefreshReport,
    MIN_REFRESH_INTERVAL,
};
pub use selector::{KeySelector, RandomSelector};
pub use server::{create_router, serve_random, start_server, Served, ServerState, SharedState};
