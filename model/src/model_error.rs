// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("'{0}' is not a known layer")]
    UnknownLayer(String),

    #[error("'{0}' is not a known K8s retag type")]
    UnknownK8sRetagType(String),

    #[error("'{0}' is not a known downsampling type")]
    UnknownDownsamplingType(String),

    #[error("'{0}' is not a known source")]
    UnknownSource(String),
}
