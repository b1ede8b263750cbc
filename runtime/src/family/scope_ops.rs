// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use analysis_engine_model::{Layer, ScopeBinding};

use crate::sample::SampleFamily;

fn to_owned_keys(keys: &[&str]) -> Vec<Box<str>> {
    keys.iter().map(|k| Box::from(*k)).collect()
}

impl SampleFamily {
    fn bind_scope(&self, scope: ScopeBinding) -> SampleFamily {
        if self.is_empty() {
            return SampleFamily::empty();
        }

        let mut result = self.clone();
        result.get_context_mut().scope = Some(scope);
        result
    }

    pub fn service(&self, keys: &[&str], layer: Layer) -> SampleFamily {
        self.bind_scope(ScopeBinding::Service {
            keys: to_owned_keys(keys),
            layer,
        })
    }

    pub fn instance(
        &self,
        service_keys: &[&str],
        instance_keys: &[&str],
        layer: Layer,
    ) -> SampleFamily {
        self.bind_scope(ScopeBinding::Instance {
            service_keys: to_owned_keys(service_keys),
            instance_keys: to_owned_keys(instance_keys),
            layer,
        })
    }

    pub fn endpoint(
        &self,
        service_keys: &[&str],
        endpoint_keys: &[&str],
        layer: Layer,
    ) -> SampleFamily {
        self.bind_scope(ScopeBinding::Endpoint {
            service_keys: to_owned_keys(service_keys),
            endpoint_keys: to_owned_keys(endpoint_keys),
            layer,
        })
    }

    pub fn service_relation(
        &self,
        source_keys: &[&str],
        dest_keys: &[&str],
        layer: Layer,
    ) -> SampleFamily {
        self.bind_scope(ScopeBinding::ServiceRelation {
            source_keys: to_owned_keys(source_keys),
            dest_keys: to_owned_keys(dest_keys),
            layer,
        })
    }

    pub fn instance_relation(
        &self,
        source_keys: &[&str],
        dest_keys: &[&str],
        layer: Layer,
    ) -> SampleFamily {
        self.bind_scope(ScopeBinding::InstanceRelation {
            source_keys: to_owned_keys(source_keys),
            dest_keys: to_owned_keys(dest_keys),
            layer,
        })
    }

    pub fn endpoint_relation(
        &self,
        source_keys: &[&str],
        dest_keys: &[&str],
        layer: Layer,
    ) -> SampleFamily {
        self.bind_scope(ScopeBinding::EndpointRelation {
            source_keys: to_owned_keys(source_keys),
            dest_keys: to_owned_keys(dest_keys),
            layer,
        })
    }

    pub fn process(
        &self,
        service_keys: &[&str],
        instance_keys: &[&str],
        process_keys: &[&str],
        layer: Layer,
    ) -> SampleFamily {
        self.bind_scope(ScopeBinding::Process {
            service_keys: to_owned_keys(service_keys),
            instance_keys: to_owned_keys(instance_keys),
            process_keys: to_owned_keys(process_keys),
            layer,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sample::test_support::*;
    use crate::sample::SampleFamily;

    #[test]
    fn test_service_binding() {
        let input = family("m", &[(&[("svc", "a")], 1.0)]);

        let bound = input.service(&["svc"], Layer::General);

        assert_eq!(
            Some(&ScopeBinding::Service {
                keys: vec!["svc".into()],
                layer: Layer::General,
            }),
            bound.get_scope()
        );
        assert_eq!(None, input.get_scope());
    }

    #[test]
    fn test_scope_on_empty_stays_empty() {
        let bound = SampleFamily::empty().endpoint(&["svc"], &["endpoint"], Layer::Http);

        assert!(bound.is_empty());
        assert_eq!(None, bound.get_scope());
    }
}
