//! `2023-09-04`: an earlier, narrower api-version. Lacks `externalAuth` on
//! clusters and `autoscaling` on node pools (§4.2 expansion note) — both
//! are silently dropped on projection and absent from normalize.

use crate::conversion::{ClusterCodec, NodePoolCodec};
use crate::hub::{
    Cluster, ClusterSpec, NetworkSpec, NodePool, NodePoolSpec, PlatformSpec, Taint, VersionSpec,
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
    #[serde(default)]
    tags: std::collections::BTreeMap<String, String>,
}

pub struct ClusterV0;

impl ClusterCodec for ClusterV0 {
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
            // This version has no ingress visibility knob; the RP defaults
            // new clusters created at this version to Public.
            ingress: crate::hub::IngressSpec {
                visibility: crate::hub::IngressVisibility::Public,
            },
            external_auth: None,
            tags: body.tags,
        })
    }

    fn project(&self, cluster: &Cluster) -> Value {
        let body = ClusterBody {
            location: cluster.spec.location.clone(),
            network: cluster.spec.network.clone(),
            platform: cluster.spec.platform.clone(),
            version: cluster.spec.version.clone(),
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
    #[serde(default)]
    taints: Vec<Taint>,
    #[serde(default)]
    labels: std::collections::BTreeMap<String, String>,
}

pub struct NodePoolV0;

impl NodePoolCodec for NodePoolV0 {
    fn zero(&self) -> Value {
        json!({ "vmSize": "", "replicas": 2, "taints": [], "labels": {} })
    }

    fn normalize(&self, external: &Value) -> Result<NodePoolSpec> {
        let body: NodePoolBody =
            serde_json::from_value(external.clone()).context("invalid node pool body")?;
        Ok(NodePoolSpec {
            vm_size: body.vm_size,
            replicas: body.replicas,
            autoscaling: None,
            taints: body.taints,
            labels: body.labels,
        })
    }

    fn project(&self, node_pool: &NodePool) -> Value {
        let body = NodePoolBody {
            vm_size: node_pool.spec.vm_size.clone(),
            replicas: node_pool.spec.replicas,
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

    #[test]
    fn projection_drops_external_auth() {
        let cluster = Cluster {
            resource_id: "r".into(),
            subscription_id: "s".into(),
            internal_cs_id: None,
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
                    subnet_id: "subnet".into(),
                    outbound_type: "loadBalancer".into(),
                    network_security_group_id: None,
                },
                version: VersionSpec { id: "4.15.9".into(), channel_group: None },
                ingress: IngressSpec { visibility: IngressVisibility::Private },
                external_auth: Some(ExternalAuthConfig {
                    issuer_url: "https://issuer.example".into(),
                    client_id: "c".into(),
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
        };

        let projected = ClusterV0.project(&cluster);
        assert!(projected.get("externalAuth").is_none());

        let normalized = ClusterV0.normalize(&projected).unwrap();
        assert!(normalized.external_auth.is_none());
        // Ingress visibility (Private, set via the other version) is not
        // representable here and collapses to the default on round-trip.
        assert_eq!(normalized.ingress.visibility, IngressVisibility::Public);
    }
}
