//! Internal hub types: the single, evolving record shape every external
//! api-version converts through. Must be a superset of every supported
//! version's fields for a given kind (§4.2).

use hcprp_common::SystemData;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    Accepted,
    Provisioning,
    Updating,
    Succeeded,
    Failed,
    Deleting,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub pod_cidr: String,
    pub service_cidr: String,
    pub machine_cidr: String,
    pub host_prefix: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub subnet_id: String,
    pub outbound_type: String,
    pub network_security_group_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSpec {
    pub id: String,
    pub channel_group: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressSpec {
    pub visibility: IngressVisibility,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngressVisibility {
    Public,
    Private,
}

/// Only representable on `2024-06-10-preview`; absent on `2023-09-04`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAuthConfig {
    pub issuer_url: String,
    pub client_id: String,
    pub username_claim: String,
    pub groups_claim: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub location: String,
    pub network: NetworkSpec,
    pub platform: PlatformSpec,
    pub version: VersionSpec,
    pub ingress: IngressSpec,
    pub external_auth: Option<ExternalAuthConfig>,
    pub tags: std::collections::BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub resource_id: String,
    pub subscription_id: String,
    pub internal_cs_id: Option<String>,
    pub provisioning_state: ProvisioningState,
    pub spec: ClusterSpec,
    pub system_data: SystemData,
    pub etag: Uuid,
}

/// Only representable on `2024-06-10-preview`; `2023-09-04` fixes replica
/// count and omits this entirely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscalingSpec {
    pub min_replicas: u32,
    pub max_replicas: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolSpec {
    pub vm_size: String,
    pub replicas: u32,
    pub autoscaling: Option<AutoscalingSpec>,
    pub taints: Vec<Taint>,
    pub labels: std::collections::BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    pub value: String,
    pub effect: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePool {
    pub resource_id: String,
    pub parent_cluster_id: String,
    pub subscription_id: String,
    pub internal_cs_id: Option<String>,
    pub provisioning_state: ProvisioningState,
    pub spec: NodePoolSpec,
    pub system_data: SystemData,
    pub etag: Uuid,
}
