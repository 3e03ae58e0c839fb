//! Typed `ome.io/v1beta1` custom resources.
//!
//! These carry the subset of the operator's schema that informer consumers
//! key off: model identity, artifact location, and readiness state. Schema
//! generation is disabled since the CRDs are installed by the operator, not
//! by this client.

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Location of model artifacts in object storage or on local disk
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

/// On-disk serialization format of a model, e.g. `safetensors`
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelFormat {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Observed state shared by the model resources
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    /// Lifecycle state reported by the operator, `Ready` once servable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes_ready: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes_failed: Vec<String>,
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default)]
#[kube(
    group = "ome.io",
    version = "v1beta1",
    kind = "BaseModel",
    plural = "basemodels",
    namespaced,
    status = "ModelStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct BaseModelSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_format: Option<ModelFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default)]
#[kube(
    group = "ome.io",
    version = "v1beta1",
    kind = "ClusterBaseModel",
    plural = "clusterbasemodels",
    status = "ModelStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterBaseModelSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_format: Option<ModelFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
    #[serde(default)]
    pub disabled: bool,
}

/// Reference to a model or runtime by name
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub name: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct InferenceServiceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default)]
#[kube(
    group = "ome.io",
    version = "v1beta1",
    kind = "InferenceService",
    plural = "inferenceservices",
    namespaced,
    status = "InferenceServiceStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct InferenceServiceSpec {
    /// Base model served by this service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ObjectRef>,
    /// Serving runtime the service is scheduled onto
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default)]
#[kube(
    group = "ome.io",
    version = "v1beta1",
    kind = "FineTunedWeight",
    plural = "finetunedweights",
    status = "ModelStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct FineTunedWeightSpec {
    /// Base model these weights were tuned from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_model_ref: Option<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
}

impl BaseModel {
    /// Whether the operator reports this model as servable
    #[must_use]
    pub fn is_ready(&self) -> bool {
        status_ready(self.status.as_ref().and_then(|s| s.state.as_deref()))
    }
}

impl ClusterBaseModel {
    /// Whether the operator reports this model as servable
    #[must_use]
    pub fn is_ready(&self) -> bool {
        status_ready(self.status.as_ref().and_then(|s| s.state.as_deref()))
    }
}

fn status_ready(state: Option<&str>) -> bool {
    state.is_some_and(|s| s.eq_ignore_ascii_case("ready"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    #[test]
    fn test_crd_identity() {
        assert_eq!(BaseModel::kind(&()), "BaseModel");
        assert_eq!(BaseModel::group(&()), "ome.io");
        assert_eq!(BaseModel::version(&()), "v1beta1");
        assert_eq!(ClusterBaseModel::plural(&()), "clusterbasemodels");
        assert_eq!(FineTunedWeight::plural(&()), "finetunedweights");
        assert_eq!(InferenceService::plural(&()), "inferenceservices");
    }

    #[test]
    fn test_readiness_from_status() {
        let mut model = BaseModel::new("llama", BaseModelSpec::default());
        assert!(!model.is_ready());

        model.status = Some(ModelStatus {
            state: Some("Ready".to_string()),
            ..ModelStatus::default()
        });
        assert!(model.is_ready());

        model.status = Some(ModelStatus {
            state: Some("Failed".to_string()),
            ..ModelStatus::default()
        });
        assert!(!model.is_ready());
    }
}
