// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Technology family attached to a scope binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    Undefined,
    General,
    Http,
    Rpc,
    Database,
    Mysql,
    Postgresql,
    Redis,
    Cache,
    Mq,
    OsLinux,
    OsWindows,
    K8s,
    Mesh,
    Faas,
}

impl Layer {
    pub fn get_name(&self) -> &'static str {
        match self {
            Layer::Undefined => "UNDEFINED",
            Layer::General => "GENERAL",
            Layer::Http => "HTTP",
            Layer::Rpc => "RPC",
            Layer::Database => "DATABASE",
            Layer::Mysql => "MYSQL",
            Layer::Postgresql => "POSTGRESQL",
            Layer::Redis => "REDIS",
            Layer::Cache => "CACHE",
            Layer::Mq => "MQ",
            Layer::OsLinux => "OS_LINUX",
            Layer::OsWindows => "OS_WINDOWS",
            Layer::K8s => "K8S",
            Layer::Mesh => "MESH",
            Layer::Faas => "FAAS",
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get_name())
    }
}

impl TryFrom<&str> for Layer {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "UNDEFINED" => Ok(Layer::Undefined),
            "GENERAL" => Ok(Layer::General),
            "HTTP" => Ok(Layer::Http),
            "RPC" => Ok(Layer::Rpc),
            "DATABASE" => Ok(Layer::Database),
            "MYSQL" => Ok(Layer::Mysql),
            "POSTGRESQL" => Ok(Layer::Postgresql),
            "REDIS" => Ok(Layer::Redis),
            "CACHE" => Ok(Layer::Cache),
            "MQ" => Ok(Layer::Mq),
            "OS_LINUX" => Ok(Layer::OsLinux),
            "OS_WINDOWS" => Ok(Layer::OsWindows),
            "K8S" => Ok(Layer::K8s),
            "MESH" => Ok(Layer::Mesh),
            "FAAS" => Ok(Layer::Faas),
            _ => Err(ModelError::UnknownLayer(value.into())),
        }
    }
}

/// How labels are rewritten from K8s metadata in `retagByK8sMeta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum K8sRetagType {
    Pod2Service,
}

impl K8sRetagType {
    pub fn get_name(&self) -> &'static str {
        match self {
            K8sRetagType::Pod2Service => "Pod2Service",
        }
    }
}

impl TryFrom<&str> for K8sRetagType {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Pod2Service" => Ok(K8sRetagType::Pod2Service),
            _ => Err(ModelError::UnknownK8sRetagType(value.into())),
        }
    }
}

/// How meter values are folded into storage buckets downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownsamplingType {
    Avg,
    Sum,
    Latest,
}

impl DownsamplingType {
    pub fn get_name(&self) -> &'static str {
        match self {
            DownsamplingType::Avg => "AVG",
            DownsamplingType::Sum => "SUM",
            DownsamplingType::Latest => "LATEST",
        }
    }
}

impl TryFrom<&str> for DownsamplingType {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "AVG" => Ok(DownsamplingType::Avg),
            "SUM" => Ok(DownsamplingType::Sum),
            "LATEST" => Ok(DownsamplingType::Latest),
            _ => Err(ModelError::UnknownDownsamplingType(value.into())),
        }
    }
}
