use std::{path::PathBuf, sync::Arc};

use serde::Deserialize;

use crate::{FileLeadStore, MemoryLeadStore, r#trait::Store};

/// Configuration for the lead store
///
/// # Examples
///
/// Persistent store:
/// ```ron
/// Outreach (
///     store: (
///         backend: File(path: "/var/lib/outreach/leads.bin"),
///     ),
/// )
/// ```
///
/// Bounded in-memory store:
/// ```ron
/// Outreach (
///     store: (
///         backend: Memory,
///         max_leads: Some(10000),
///     ),
/// )
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Maximum number of leads to hold (omit for unlimited)
    #[serde(default)]
    pub max_leads: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub enum StoreBackend {
    /// Process-local tables, lost on exit
    #[default]
    Memory,
    /// Tables snapshotted to `path` after every write
    File { path: PathBuf },
}

impl StoreConfig {
    /// Construct the configured backend.
    ///
    /// # Errors
    /// If a file-backed store exists on disk but cannot be loaded.
    pub fn into_store(self) -> crate::Result<Arc<dyn Store>> {
        let store: Arc<dyn Store> = match self.backend {
            StoreBackend::Memory => Arc::new(
                self.max_leads
                    .map_or_else(MemoryLeadStore::new, MemoryLeadStore::with_capacity),
            ),
            StoreBackend::File { path } => Arc::new(FileLeadStore::open(path, self.max_leads)?),
        };

        Ok(store)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_memory() {
        let config: StoreConfig =
            ron::from_str("(backend: Memory, max_leads: Some(5))").expect("valid config");
        assert!(matches!(config.backend, StoreBackend::Memory));
        assert_eq!(config.max_leads, Some(5));
    }

    #[test]
    fn test_parse_file() {
        let config: StoreConfig =
            ron::from_str(r#"(backend: File(path: "/tmp/leads.bin"))"#).expect("valid config");
        match config.backend {
            StoreBackend::File { path } => assert_eq!(path, PathBuf::from("/tmp/leads.bin")),
            StoreBackend::Memory => panic!("expected file backend"),
        }
        assert_eq!(config.max_leads, None);
    }

    #[test]
    fn test_default_is_memory() {
        let config: StoreConfig = ron::from_str("()").expect("valid config");
        assert!(matches!(config.backend, StoreBackend::Memory));
    }
}
