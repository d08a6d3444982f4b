//! Backend variant registry
//!
//! Maps a backend name to the pair of representation tags it uses and to the
//! element types its array constructor accepts. One table holds every known
//! backend; an `active` flag marks the ones enabled for dispatch.
//!
//! - [`Registry::lookup_variant`] only answers for active backends.
//! - [`Registry::lookup_allowed_types`] answers for every known backend.
//!
//! The registry is assembled once through [`RegistryBuilder::build`] and is
//! read-only afterwards, so a shared `&Registry` (or `Arc<Registry>`) can be
//! handed to any number of threads.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::array::ArrayFactory;
use crate::backends;
use crate::dtype::DType;
use crate::error::{HybridError, Result};
use crate::variant::{ArrayType, FunctionType, OrdinalMap};

/// One backend as known to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEntry {
    pub name: String,
    pub array_type: ArrayType,
    pub function_type: FunctionType,
    pub allowed_types: BTreeSet<DType>,
    pub active: bool,
}

impl BackendEntry {
    /// Create an active entry
    pub fn new(
        name: impl Into<String>,
        array_type: ArrayType,
        function_type: FunctionType,
        allowed_types: impl IntoIterator<Item = DType>,
    ) -> Self {
        BackendEntry {
            name: name.into(),
            array_type,
            function_type,
            allowed_types: allowed_types.into_iter().collect(),
            active: true,
        }
    }

    /// Keep the entry in the type table but out of dispatch
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.allowed_types.insert(dtype);
        self
    }

    pub fn variant(&self) -> (ArrayType, FunctionType) {
        (self.array_type, self.function_type)
    }

    pub fn supports_dtype(&self, dtype: DType) -> bool {
        self.allowed_types.contains(&dtype)
    }
}

/// Collects entries before the registry is frozen
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<BackendEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, entry: BackendEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Validate and freeze the table.
    ///
    /// # Errors
    /// `DuplicateBackend` if a name appears twice, `EmptyAllowedTypes` if an
    /// entry accepts no element type.
    pub fn build(self) -> Result<Registry> {
        let mut seen = BTreeSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(HybridError::DuplicateBackend(entry.name.clone()));
            }
            if entry.allowed_types.is_empty() {
                return Err(HybridError::EmptyAllowedTypes(entry.name.clone()));
            }
        }

        let mut by_array_type = OrdinalMap::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.active && !by_array_type.contains(entry.array_type) {
                by_array_type.insert(entry.array_type, idx);
            }
        }

        let registry = Registry {
            entries: self.entries,
            by_array_type,
        };
        debug!(
            known = ?registry.known_backends().collect::<Vec<_>>(),
            active = ?registry.active_backends().collect::<Vec<_>>(),
            "backend registry ready"
        );
        Ok(registry)
    }
}

/// Immutable backend table
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<BackendEntry>,
    // first active backend per array representation
    by_array_type: OrdinalMap<ArrayType, usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// The built-in table: `plain-array` active, `symbolic-graph` known but
    /// disabled.
    pub fn standard() -> Result<Self> {
        Self::builder()
            .register(backends::plain::entry())
            .register(backends::symbolic::entry())
            .build()
    }

    /// Array and function tags of an active backend.
    ///
    /// # Errors
    /// `UnknownBackend` when `name` is absent or inactive.
    pub fn lookup_variant(&self, name: &str) -> Result<(ArrayType, FunctionType)> {
        self.active_entry(name).map(BackendEntry::variant)
    }

    /// Element types accepted by any known backend, active or not.
    ///
    /// # Errors
    /// `UnknownBackend` when `name` is not in the table at all.
    pub fn lookup_allowed_types(&self, name: &str) -> Result<&BTreeSet<DType>> {
        self.entry(name)
            .map(|e| &e.allowed_types)
            .ok_or_else(|| self.unknown(name))
    }

    /// Fail unless `dtype` is legal for arrays of backend `name`.
    pub fn check_dtype(&self, name: &str, dtype: DType) -> Result<()> {
        let allowed = self.lookup_allowed_types(name)?;
        if allowed.contains(&dtype) {
            Ok(())
        } else {
            Err(HybridError::DTypeNotAllowed {
                backend: name.to_string(),
                dtype,
                allowed: allowed.iter().copied().collect(),
            })
        }
    }

    pub fn entry(&self, name: &str) -> Option<&BackendEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.entry(name).is_some_and(|e| e.active)
    }

    /// Active backend names in registration order
    pub fn active_backends(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.active)
            .map(|e| e.name.as_str())
    }

    /// Every backend name in registration order
    pub fn known_backends(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// First active backend, used when nothing else is configured
    pub fn default_backend(&self) -> Option<&BackendEntry> {
        self.entries.iter().find(|e| e.active)
    }

    /// Active backend that owns arrays of kind `array_type`
    pub fn backend_for(&self, array_type: ArrayType) -> Option<&BackendEntry> {
        self.by_array_type
            .get(array_type)
            .and_then(|&idx| self.entries.get(idx))
    }

    /// Array constructor bound to an active backend.
    pub fn factory(&self, name: &str) -> Result<ArrayFactory> {
        let entry = self.active_entry(name)?;
        Ok(ArrayFactory::new(
            entry.name.clone(),
            entry.array_type,
            entry.allowed_types.clone(),
        ))
    }

    fn active_entry(&self, name: &str) -> Result<&BackendEntry> {
        match self.entry(name) {
            Some(entry) if entry.active => Ok(entry),
            Some(_) => {
                warn!(backend = name, "backend is registered but not active");
                Err(self.unknown(name))
            }
            None => Err(self.unknown(name)),
        }
    }

    fn unknown(&self, name: &str) -> HybridError {
        HybridError::UnknownBackend {
            name: name.to_string(),
            active: self.active_backends().map(str::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake(name: &str, active: bool) -> BackendEntry {
        let entry = BackendEntry::new(
            name,
            ArrayType::PlainArray,
            FunctionType::PlainArray,
            [DType::F32],
        );
        if active { entry } else { entry.inactive() }
    }

    #[test]
    fn standard_registry_scenario() {
        let registry = Registry::standard().unwrap();

        assert_eq!(
            registry.lookup_variant("plain-array").unwrap(),
            (ArrayType::PlainArray, FunctionType::PlainArray)
        );
        assert!(matches!(
            registry.lookup_variant("symbolic-graph"),
            Err(HybridError::UnknownBackend { .. })
        ));
        let symbolic = registry.lookup_allowed_types("symbolic-graph").unwrap();
        assert!(symbolic.contains(&DType::F32));
        assert!(!symbolic.contains(&DType::Bool));
    }

    #[test]
    fn unknown_names_fail_both_lookups() {
        let registry = Registry::standard().unwrap();
        assert!(matches!(
            registry.lookup_variant("nonexistent"),
            Err(HybridError::UnknownBackend { .. })
        ));
        match registry.lookup_allowed_types("nonexistent") {
            Err(HybridError::UnknownBackend { name, active }) => {
                assert_eq!(name, "nonexistent");
                assert_eq!(active, vec!["plain-array".to_string()]);
            }
            other => panic!("expected UnknownBackend, got {other:?}"),
        }
    }

    #[test]
    fn active_names_are_subset_of_known() {
        let registry = Registry::standard().unwrap();
        let known: Vec<_> = registry.known_backends().collect();
        assert_eq!(known, vec!["plain-array", "symbolic-graph"]);
        for name in registry.active_backends() {
            assert!(known.contains(&name));
            assert!(registry.is_active(name));
        }
        assert!(!registry.is_active("symbolic-graph"));
        assert!(!registry.is_active("missing"));
    }

    #[test]
    fn build_rejects_duplicates() {
        let err = Registry::builder()
            .register(fake("a", true))
            .register(fake("a", false))
            .build()
            .unwrap_err();
        assert!(matches!(err, HybridError::DuplicateBackend(name) if name == "a"));
    }

    #[test]
    fn build_rejects_empty_allowed_types() {
        let entry = BackendEntry::new(
            "empty",
            ArrayType::PlainArray,
            FunctionType::PlainArray,
            Vec::<DType>::new(),
        );
        let err = Registry::builder().register(entry).build().unwrap_err();
        assert!(matches!(err, HybridError::EmptyAllowedTypes(_)));
    }

    #[test]
    fn check_dtype_reports_allowed_set() {
        let registry = Registry::standard().unwrap();
        assert!(registry.check_dtype("plain-array", DType::I64).is_ok());
        // inactive backends still answer type questions
        assert!(registry.check_dtype("symbolic-graph", DType::F16).is_ok());
        match registry.check_dtype("symbolic-graph", DType::I64) {
            Err(HybridError::DTypeNotAllowed { backend, dtype, allowed }) => {
                assert_eq!(backend, "symbolic-graph");
                assert_eq!(dtype, DType::I64);
                assert!(allowed.contains(&DType::F32));
            }
            other => panic!("expected DTypeNotAllowed, got {other:?}"),
        }
    }

    #[test]
    fn default_and_array_owner_skip_inactive_entries() {
        let registry = Registry::builder()
            .register(fake("off", false))
            .register(fake("on", true))
            .register(fake("later", true))
            .build()
            .unwrap();
        assert_eq!(registry.default_backend().map(|e| e.name.as_str()), Some("on"));
        assert_eq!(
            registry.backend_for(ArrayType::PlainArray).map(|e| e.name.as_str()),
            Some("on")
        );
        assert!(registry.backend_for(ArrayType::SymbolicGraph).is_none());
    }

    #[test]
    fn factory_requires_active_backend() {
        let registry = Registry::standard().unwrap();
        assert!(registry.factory("plain-array").is_ok());
        assert!(matches!(
            registry.factory("symbolic-graph"),
            Err(HybridError::UnknownBackend { .. })
        ));
    }

    #[test]
    fn registry_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Registry>();

        let registry = std::sync::Arc::new(Registry::standard().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let r = std::sync::Arc::clone(&registry);
                std::thread::spawn(move || r.lookup_variant("plain-array").unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(
                h.join().unwrap(),
                (ArrayType::PlainArray, FunctionType::PlainArray)
            );
        }
    }
}
