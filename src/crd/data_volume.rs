use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Storage-provisioning resource backing a VM disk. The gateway only edits
/// its metadata (ownerReferences) and issues deletes; the spec payload is
/// validated and acted on by the provisioner, so it is carried as raw JSON
/// and the flattened map keeps any field not modeled here intact across a
/// round trip.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "cdi.kubevirt.io",
    version = "v1beta1",
    kind = "DataVolume",
    plural = "datavolumes",
    shortname = "dv",
    namespaced,
    status = "DataVolumeStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
