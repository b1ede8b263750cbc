// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use crate::ModelError;

/// Build-time declaration of one trace/log source scope. The catalog is the
/// compiled-in table the scope-declaration manifest resolves against at
/// startup; the build-time "annotation scan" is a walk over this table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDeclaration {
    pub id: u32,
    pub name: &'static str,
    pub fqn: &'static str,
    /// Every field an OAL statement may project or filter on.
    pub fields: &'static [&'static str],
    /// Fields forming the entity identity of metrics built from this source.
    pub identity: &'static [&'static str],
}

pub const SERVICE_SCOPE: SourceDeclaration = SourceDeclaration {
    id: 1,
    name: "Service",
    fqn: "source.Service",
    fields: &["name", "layer", "latency", "status", "responseCode", "type"],
    identity: &["name"],
};

pub const SERVICE_INSTANCE_SCOPE: SourceDeclaration = SourceDeclaration {
    id: 2,
    name: "ServiceInstance",
    fqn: "source.ServiceInstance",
    fields: &["name", "serviceName", "latency", "status", "responseCode"],
    identity: &["serviceName", "name"],
};

pub const ENDPOINT_SCOPE: SourceDeclaration = SourceDeclaration {
    id: 3,
    name: "Endpoint",
    fqn: "source.Endpoint",
    fields: &["name", "serviceName", "latency", "status", "responseCode", "type"],
    identity: &["serviceName", "name"],
};

pub const SERVICE_RELATION_SCOPE: SourceDeclaration = SourceDeclaration {
    id: 4,
    name: "ServiceRelation",
    fqn: "source.ServiceRelation",
    fields: &[
        "sourceServiceName",
        "destServiceName",
        "latency",
        "status",
        "componentId",
        "detectPoint",
    ],
    identity: &["sourceServiceName", "destServiceName"],
};

pub const SERVICE_INSTANCE_RELATION_SCOPE: SourceDeclaration = SourceDeclaration {
    id: 5,
    name: "ServiceInstanceRelation",
    fqn: "source.ServiceInstanceRelation",
    fields: &[
        "sourceServiceName",
        "sourceServiceInstance",
        "destServiceName",
        "destServiceInstance",
        "latency",
        "status",
        "componentId",
        "detectPoint",
    ],
    identity: &[
        "sourceServiceName",
        "sourceServiceInstance",
        "destServiceName",
        "destServiceInstance",
    ],
};

pub const ENDPOINT_RELATION_SCOPE: SourceDeclaration = SourceDeclaration {
    id: 6,
    name: "EndpointRelation",
    fqn: "source.EndpointRelation",
    fields: &[
        "sourceServiceName",
        "sourceEndpoint",
        "destServiceName",
        "destEndpoint",
        "latency",
        "status",
        "componentId",
        "detectPoint",
    ],
    identity: &[
        "sourceServiceName",
        "sourceEndpoint",
        "destServiceName",
        "destEndpoint",
    ],
};

pub const PROCESS_SCOPE: SourceDeclaration = SourceDeclaration {
    id: 7,
    name: "Process",
    fqn: "source.Process",
    fields: &["name", "serviceName", "instanceName", "layer", "latency", "status"],
    identity: &["serviceName", "instanceName", "name"],
};

pub fn all_sources() -> &'static [SourceDeclaration] {
    &[
        SERVICE_SCOPE,
        SERVICE_INSTANCE_SCOPE,
        ENDPOINT_SCOPE,
        SERVICE_RELATION_SCOPE,
        SERVICE_INSTANCE_RELATION_SCOPE,
        ENDPOINT_RELATION_SCOPE,
        PROCESS_SCOPE,
    ]
}

pub fn source_by_name(name: &str) -> Result<&'static SourceDeclaration, ModelError> {
    all_sources()
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| ModelError::UnknownSource(name.into()))
}

pub fn source_by_fqn(fqn: &str) -> Result<&'static SourceDeclaration, ModelError> {
    all_sources()
        .iter()
        .find(|s| s.fqn == fqn)
        .ok_or_else(|| ModelError::UnknownSource(fqn.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ids_are_unique() {
        let mut ids: Vec<u32> = all_sources().iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), all_sources().len());
    }

    #[test]
    fn test_identity_fields_are_declared_fields() {
        for source in all_sources() {
            for identity_field in source.identity {
                assert!(
                    source.fields.contains(identity_field),
                    "{} identity field {} missing from field list",
                    source.name,
                    identity_field
                );
            }
        }
    }

    #[test]
    fn test_lookup_by_name_and_fqn() {
        assert_eq!(3, source_by_name("Endpoint").unwrap().id);
        assert_eq!("Endpoint", source_by_fqn("source.Endpoint").unwrap().name);
        assert!(source_by_name("NotASource").is_err());
    }
}
