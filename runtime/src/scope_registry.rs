// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("the scope registry is already initialized")]
    AlreadyInitialized,

    #[error("the scope registry is not initialized")]
    NotInitialized,

    #[error("scope id {0} is not registered")]
    UnknownScopeId(u32),

    #[error("scope id {0} is registered twice")]
    DuplicateScopeId(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeEntry {
    pub id: u32,
    pub name: Box<str>,
    pub fields: Vec<Box<str>>,
}

static SCOPE_TABLE: Lazy<RwLock<Option<BTreeMap<u32, ScopeEntry>>>> =
    Lazy::new(|| RwLock::new(None));

/// Process-wide table mapping scope ids to names and source field lists.
/// Populated exactly once at startup from the scope-declaration manifest;
/// reinitialization requires an explicit reset (tests only).
pub struct ScopeRegistry {}

impl ScopeRegistry {
    pub fn init(entries: Vec<ScopeEntry>) -> Result<(), RegistryError> {
        let mut table = SCOPE_TABLE.write();
        if table.is_some() {
            return Err(RegistryError::AlreadyInitialized);
        }

        let mut map = BTreeMap::new();
        for entry in entries {
            if map.insert(entry.id, entry.clone()).is_some() {
                return Err(RegistryError::DuplicateScopeId(entry.id));
            }
        }

        *table = Some(map);
        Ok(())
    }

    pub fn is_initialized() -> bool {
        SCOPE_TABLE.read().is_some()
    }

    pub fn name_of(id: u32) -> Result<Box<str>, RegistryError> {
        let table = SCOPE_TABLE.read();
        let table = table.as_ref().ok_or(RegistryError::NotInitialized)?;
        table
            .get(&id)
            .map(|e| e.name.clone())
            .ok_or(RegistryError::UnknownScopeId(id))
    }

    pub fn source_fields(id: u32) -> Result<Vec<Box<str>>, RegistryError> {
        let table = SCOPE_TABLE.read();
        let table = table.as_ref().ok_or(RegistryError::NotInitialized)?;
        table
            .get(&id)
            .map(|e| e.fields.clone())
            .ok_or(RegistryError::UnknownScopeId(id))
    }

    /// Clear the table so a test can drive initialization again. Production
    /// code never resets.
    pub fn reset_for_tests() {
        *SCOPE_TABLE.write() = None;
    }
}

static DISABLED: Lazy<RwLock<Option<BTreeSet<Box<str>>>>> = Lazy::new(|| RwLock::new(None));

/// Process-wide set of source names whose dispatchers are suppressed.
/// Populated once at startup from `oal-disabled-sources.txt`.
pub struct DisabledSources {}

impl DisabledSources {
    pub fn init(names: Vec<Box<str>>) -> Result<(), RegistryError> {
        let mut set = DISABLED.write();
        if set.is_some() {
            return Err(RegistryError::AlreadyInitialized);
        }

        *set = Some(names.into_iter().collect());
        Ok(())
    }

    /// An uninitialized set disables nothing.
    pub fn is_disabled(name: &str) -> bool {
        DISABLED
            .read()
            .as_ref()
            .is_some_and(|set| set.contains(name))
    }

    pub fn reset_for_tests() {
        *DISABLED.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    // The registries are process-wide; serialize the tests that touch them.
    static TEST_GUARD: Mutex<()> = Mutex::new(());

    fn entries() -> Vec<ScopeEntry> {
        vec![
            ScopeEntry {
                id: 1,
                name: "Service".into(),
                fields: vec!["name".into(), "latency".into()],
            },
            ScopeEntry {
                id: 3,
                name: "Endpoint".into(),
                fields: vec!["name".into(), "serviceName".into(), "latency".into()],
            },
        ]
    }

    #[test]
    fn test_strict_append_once_lifecycle() {
        let _guard = TEST_GUARD.lock();
        ScopeRegistry::reset_for_tests();

        assert_eq!(
            Err(RegistryError::NotInitialized),
            ScopeRegistry::name_of(1)
        );

        ScopeRegistry::init(entries()).unwrap();
        assert_eq!(
            Err(RegistryError::AlreadyInitialized),
            ScopeRegistry::init(entries())
        );

        assert_eq!(Ok(Box::from("Endpoint")), ScopeRegistry::name_of(3));
        assert_eq!(
            Err(RegistryError::UnknownScopeId(9)),
            ScopeRegistry::name_of(9)
        );
        assert_eq!(
            vec![Box::<str>::from("name"), Box::<str>::from("latency")],
            ScopeRegistry::source_fields(1).unwrap()
        );

        ScopeRegistry::reset_for_tests();
        ScopeRegistry::init(entries()).unwrap();
        ScopeRegistry::reset_for_tests();
    }

    #[test]
    fn test_disabled_sources() {
        let _guard = TEST_GUARD.lock();
        DisabledSources::reset_for_tests();

        assert!(!DisabledSources::is_disabled("segment"));
        DisabledSources::init(vec!["segment".into()]).unwrap();
        assert!(DisabledSources::is_disabled("segment"));
        assert!(!DisabledSources::is_disabled("endpoint"));

        DisabledSources::reset_for_tests();
    }
}
