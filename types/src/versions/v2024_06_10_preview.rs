//! `2024-06-10-preview`: the full-featured api-version, able to represent
//! every field the internal hub carries.

use crate::conversion::{ClusterCodec, NodePoolCodec};
use crate::hub::{
    AutoscalingSpec, Cluster, ClusterSpec, ExternalAuthConfig, IngressSpec, NetworkSpec,
    NodePool, NodePoolSpec, PlatformSpec, Taint, VersionSpec,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterBody {
    location: String,
    network: NetworkSpec,
    platform: PlatformSpec,
    version: VersionSpec,
    ingress: IngressSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_auth: Option<ExternalAuthConfig>,
    #[serde(default)]
    tags: std::collections::BTreeMap<String, String>,
}

pub struct ClusterV1;

impl ClusterCodec for ClusterV1 {
    fn zero(&self) -> Value {
        json!({
            "location": "",
            "network": {
                "podCidr": "10.128.0.0/14",
                "serviceCidr": "172.30.0.0/16",
                "machineCidr": "10.0.0.0/16",
                "hostPrefix": 23,
            },
            "platform": { "subnetId": "", "outboundType": "loadBalancer" },
            "version": { "id": "" },
            "ingress": { "visibility": "Public" },
            "tags": {},
        })
    }

    fn normalize(&self, external: &Value) -> Result<ClusterSpec> {
        let body: ClusterBody =
            serde_json::from_value(external.clone()).context("invalid cluster body")?;
        Ok(ClusterSpec {
            location: body.location,
            network: body.network,
            platform: body.platform,
            version: body.version,
            ingress: body.ingress,
            external_auth: body.external_auth,
            tags: body.tags,
        })
    }

    fn project(&self, cluster: &Cluster) -> Value {
        let body = ClusterBody {
            location: cluster.spec.location.clone(),
            network: cluster.spec.network.clone(),
            platform: cluster.spec.platform.clone(),
            version: cluster.spec.version.clone(),
            ingress: cluster.spec.ingress.clone(),
            external_auth: cluster.spec.external_auth.clone(),
            tags: cluster.spec.tags.clone(),
        };
        serde_json::to_value(body).expect("ClusterBody always serializes")
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodePoolBody {
    vm_size: String,
    replicas: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    autoscaling: Option<AutoscalingSpec>,
    #[serde(default)]
    taints: Vec<Taint>,
    #[serde(default)]
    labels: std::collections::BTreeMap<String, String>,
}

pub struct NodePoolV1;

impl NodePoolCodec for NodePoolV1 {
    fn zero(&self) -> Value {
        json!({ "vmSize": "", "replicas": 2, "taints": [], "labels": {} })
    }

    fn normalize(&self, external: &Value) -> Result<NodePoolSpec> {
        let body: NodePoolBody =
            serde_json::from_value(external.clone()).context("invalid node pool body")?;
        Ok(NodePoolSpec {
            vm_size: body.vm_size,
            replicas: body.replicas,
            autoscaling: body.autoscaling,
            taints: body.taints,
            labels: body.labels,
        })
    }

    fn project(&self, node_pool: &NodePool) -> Value {
        let body = NodePoolBody {
            vm_size: node_pool.spec.vm_size.clone(),
            replicas: node_pool.spec.replicas,
            autoscaling: node_pool.spec.autoscaling.clone(),
            taints: node_pool.spec.taints.clone(),
            labels: node_pool.spec.labels.clone(),
        };
        serde_json::to_value(body).expect("NodePoolBody always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::*;
    use hcprp_common::SystemData;
    use uuid::Uuid;

    fn sample_cluster() -> Cluster {
        Cluster {
            resource_id: "/subscriptions/s/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/c1".into(),
            subscription_id: "s".into(),
            internal_cs_id: Some("cs-1".into()),
            provisioning_state: ProvisioningState::Succeeded,
            spec: ClusterSpec {
                location: "eastus".into(),
                network: NetworkSpec {
                    pod_cidr: "10.128.0.0/14".into(),
                    service_cidr: "172.30.0.0/16".into(),
                    machine_cidr: "10.0.0.0/16".into(),
                    host_prefix: 23,
                },
                platform: PlatformSpec {
                    subnet_id: "/subscriptions/s/.../subnet1".into(),
                    outbound_type: "loadBalancer".into(),
                    network_security_group_id: None,
                },
                version: VersionSpec { id: "4.15.9".into(), channel_group: None },
                ingress: IngressSpec { visibility: IngressVisibility::Public },
                external_auth: Some(ExternalAuthConfig {
                    issuer_url: "https://issuer.example".into(),
                    client_id: "client".into(),
                    username_claim: "email".into(),
                    groups_claim: None,
                }),
                tags: Default::default(),
            },
            system_data: SystemData {
                created_by: None,
                created_by_type: None,
                created_at: None,
                last_modified_by: None,
                last_modified_by_type: None,
                last_modified_at: None,
            },
            etag: Uuid::new_v4(),
        }
    }

    #[test]
    fn round_trip_preserves_external_auth() {
        let cluster = sample_cluster();
        let projected = ClusterV1.project(&cluster);
        let normalized = ClusterV1.normalize(&projected).unwrap();
        assert_eq!(normalized, cluster.spec);
    }
}
