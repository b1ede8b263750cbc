// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use analysis_engine_model::K8sRetagType;

/// External K8s metadata source consulted by `retagByK8sMeta`. Implementors
/// own their caching and blocking semantics; the expression runtime calls
/// this synchronously.
pub trait K8sMetadataRegistry: Send + Sync {
    /// Resolve the owning service for a pod in a namespace. `None` leaves
    /// the sample's labels unchanged.
    fn resolve(&self, retag_type: K8sRetagType, value: &str, namespace: &str) -> Option<String>;
}

/// External process registry backing the whitelisted static calls available
/// inside MAL closures.
pub trait ProcessRegistry: Send + Sync {
    fn generate_virtual_local_process(&self, service: &str, instance: &str) -> String;

    fn generate_virtual_remote_process(
        &self,
        service: &str,
        instance: &str,
        address: &str,
    ) -> String;
}

/// Process registry used when no real one is wired in: produces stable
/// identifiers without registering anything anywhere.
#[derive(Debug, Default)]
pub struct DefaultProcessRegistry;

impl ProcessRegistry for DefaultProcessRegistry {
    fn generate_virtual_local_process(&self, service: &str, instance: &str) -> String {
        format!("virtual-local::{service}::{instance}")
    }

    fn generate_virtual_remote_process(
        &self,
        service: &str,
        instance: &str,
        address: &str,
    ) -> String {
        format!("virtual-remote::{service}::{instance}::{address}")
    }
}

/// Everything a compiled expression may reach outside its own inputs.
#[derive(Clone)]
pub struct RuntimeServices {
    k8s: Option<Arc<dyn K8sMetadataRegistry>>,
    process: Arc<dyn ProcessRegistry>,
}

impl std::fmt::Debug for RuntimeServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeServices")
            .field("k8s", &self.k8s.is_some())
            .finish()
    }
}

impl RuntimeServices {
    pub fn new() -> RuntimeServices {
        Self {
            k8s: None,
            process: Arc::new(DefaultProcessRegistry),
        }
    }

    pub fn with_k8s(mut self, registry: Arc<dyn K8sMetadataRegistry>) -> RuntimeServices {
        self.k8s = Some(registry);
        self
    }

    pub fn with_process_registry(mut self, registry: Arc<dyn ProcessRegistry>) -> RuntimeServices {
        self.process = registry;
        self
    }

    pub fn get_k8s(&self) -> Option<&dyn K8sMetadataRegistry> {
        self.k8s.as_deref()
    }

    pub fn get_process_registry(&self) -> &dyn ProcessRegistry {
        self.process.as_ref()
    }
}

impl Default for RuntimeServices {
    fn default() -> Self {
        Self::new()
    }
}
