use std::path::PathBuf;

use crate::storage::txlog::SyncMode;

/// Engine configuration.
///
/// With `log_dir` unset the index is purely in-memory and mutations are
/// not durable. `sync_mode` selects the transaction log's fsync policy.
#[derive(Debug, Clone, Default)]
pub struct IndexConfig {
    pub log_dir: Option<PathBuf>,
    pub sync_mode: SyncMode,
}

impl IndexConfig {
    pub fn in_memory() -> Self {
        IndexConfig::default()
    }

    pub fn durable(log_dir: impl Into<PathBuf>) -> Self {
        IndexConfig {
            log_dir: Some(log_dir.into()),
            sync_mode: SyncMode::Immediate,
        }
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_memory_with_immediate_sync() {
        let config = IndexConfig::default();
        assert!(config.log_dir.is_none());
        assert_eq!(config.sync_mode, SyncMode::Immediate);
    }

    #[test]
    fn durable_config_carries_the_directory() {
        let config = IndexConfig::durable("/var/lib/search").with_sync_mode(SyncMode::Batch);
        assert_eq!(config.log_dir.as_deref(), Some(std::path::Path::new("/var/lib/search")));
        assert_eq!(config.sync_mode, SyncMode::Batch);
    }
}
