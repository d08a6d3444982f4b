//! Runtime configuration
//!
//! Read from a JSON file and/or the environment, then resolved against a
//! [`Registry`] so a bad backend name or element type fails at start-up.
//!
//! - `HYBRID_ND_BACKEND`: backend name, overrides the file
//! - `HYBRID_ND_DTYPE`: element type (`f32`, `f16`, ...), overrides the file

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dtype::DType;
use crate::error::{HybridError, Result};
use crate::registry::{BackendEntry, Registry};

pub const BACKEND_ENV: &str = "HYBRID_ND_BACKEND";
pub const DTYPE_ENV: &str = "HYBRID_ND_DTYPE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Backend name; the registry's first active backend when unset
    pub backend: Option<String>,
    pub dtype: DType,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), ?config, "loaded runtime config");
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `HYBRID_ND_BACKEND` / `HYBRID_ND_DTYPE` on top of `self`
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`with_env_overrides`](Self::with_env_overrides) with an
    /// arbitrary variable source.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup(BACKEND_ENV).filter(|b| !b.trim().is_empty()) {
            self.backend = Some(backend.trim().to_string());
        }
        if let Some(dtype) = lookup(DTYPE_ENV).filter(|d| !d.trim().is_empty()) {
            self.dtype = dtype.parse()?;
        }
        Ok(self)
    }

    /// Active backend this config selects.
    ///
    /// # Errors
    /// `UnknownBackend` if the named backend is absent or inactive, or if no
    /// backend is named and none is active; `DTypeNotAllowed` if the backend
    /// does not accept `dtype`.
    pub fn resolve<'r>(&self, registry: &'r Registry) -> Result<&'r BackendEntry> {
        let entry = match &self.backend {
            Some(name) => {
                registry.lookup_variant(name)?;
                registry.entry(name)
            }
            None => registry.default_backend(),
        }
        .ok_or_else(|| HybridError::UnknownBackend {
            name: self.backend.clone().unwrap_or_default(),
            active: registry.active_backends().map(str::to_string).collect(),
        })?;

        registry.check_dtype(&entry.name, self.dtype)?;
        info!(backend = %entry.name, dtype = %self.dtype, "resolved runtime config");
        Ok(entry)
    }
}
