//! JSON configuration controlling which kinds and namespaces are fair game.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use serpent_core::{FilterConfig, ResourceKind, CONTROL_PLANE_NAMESPACE};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub resource_types: Vec<String>,
    pub namespaces: Namespaces,
    pub protect_critical: bool,
    pub queue_capacity: usize,
    pub sample_interval_ms: u64,
    pub fallback_timeout_ms: u64,
    /// Eating unbound food deletes a random pod outside the binding
    /// protocol. Off by default: the destroyed object is not the one that
    /// was visually offered.
    pub fallback_delete_on_unbound: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Namespaces {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resource_types: vec!["pods".to_string()],
            namespaces: Namespaces {
                include: Vec::new(),
                exclude: vec![CONTROL_PLANE_NAMESPACE.to_string()],
            },
            protect_critical: true,
            queue_capacity: 100,
            sample_interval_ms: 1000,
            fallback_timeout_ms: 2000,
            fallback_delete_on_unbound: false,
        }
    }
}

impl Config {
    /// A missing or malformed file behind an explicit path is fatal; no
    /// path at all means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let data = std::fs::read_to_string(p)
                    .with_context(|| format!("reading config file {}", p.display()))?;
                let cfg = serde_json::from_str(&data)
                    .with_context(|| format!("parsing config file {}", p.display()))?;
                Ok(cfg)
            }
            None => Ok(Config::default()),
        }
    }

    /// Parse configured kinds. Unknown kinds are warned about once and
    /// skipped; ending up with none at all is a configuration error.
    pub fn kinds(&self) -> Result<Vec<ResourceKind>> {
        let mut kinds = Vec::new();
        for raw in &self.resource_types {
            match raw.parse::<ResourceKind>() {
                Ok(kind) => {
                    if !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
                Err(e) => warn!(error = %e, "skipping unsupported resource kind"),
            }
        }
        anyhow::ensure!(!kinds.is_empty(), "no usable resource kinds configured");
        Ok(kinds)
    }

    pub fn filter(&self) -> FilterConfig {
        FilterConfig::new(
            self.namespaces.include.iter().cloned(),
            self.namespaces.exclude.iter().cloned(),
            self.protect_critical,
        )
    }
}
