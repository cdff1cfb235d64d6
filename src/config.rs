//! Table configuration.

use tracing::warn;

/// Row count below which filtered iteration always scans.
pub const DEFAULT_INDEX_THRESHOLD: usize = 300;

/// Environment variable overriding [TableConfig::index_threshold].
pub const INDEX_THRESHOLD_ENV: &str = "TUPLEDB_INDEX_THRESHOLD";

/// Configuration for a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Tables with fewer valid rows than this never consult an index:
    /// the lookup overhead is not amortized on small tables.
    pub index_threshold: usize,
}

impl TableConfig {
    pub fn new() -> Self {
        Self {
            index_threshold: DEFAULT_INDEX_THRESHOLD,
        }
    }

    /// Reads the configuration from the environment, falling back to the
    /// defaults for unset or unparsable variables.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(raw) = std::env::var(INDEX_THRESHOLD_ENV) {
            match raw.trim().parse() {
                Ok(threshold) => config.index_threshold = threshold,
                Err(err) => warn!(
                    variable = INDEX_THRESHOLD_ENV,
                    value = %raw,
                    error = %err,
                    "ignoring invalid index threshold"
                ),
            }
        }
        config
    }

    /// Sets the index threshold.
    pub fn with_index_threshold(mut self, threshold: usize) -> Self {
        self.index_threshold = threshold;
        self
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new()
    }
}
