//! Tunables of the inference engine.

use serde::{Deserialize, Serialize};

/// Default bound on the number of entries of any intermediate factor (32 MiB of `f64`s)
pub const DEFAULT_MAX_FACTOR_ENTRIES: usize = 1 << 22;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {

    /// Largest table, in entries, inference may build before failing with `ResourceExceeded`
    pub max_factor_entries: usize,

    /// Drop variables that are neither queried, observed, nor ancestors of either before
    /// eliminating. They sum out to 1 and cannot change the posterior.
    pub prune_barren: bool,
}

impl Default for EngineConfig {

    fn default() -> Self {
        EngineConfig {
            max_factor_entries: DEFAULT_MAX_FACTOR_ENTRIES,
            prune_barren: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{ "prune_barren": false }"#).unwrap();
        assert!(!cfg.prune_barren);
        assert_eq!(DEFAULT_MAX_FACTOR_ENTRIES, cfg.max_factor_entries);

        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(EngineConfig::default(), cfg);
    }
}
