//! Wire types for the CS façade (§6.2). These are intentionally distinct
//! from both the ARM versioned bodies (`hcprp-types::versions`) and the
//! internal hub (`hcprp-types::hub`) — CS has its own shape and evolves
//! independently of ARM's api-version surface.

use serde::{Deserialize, Serialize};

/// CS's own provisioning-state vocabulary (§4.6 mapping table).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CsProvisioningState {
    Ready,
    Active,
    Installing,
    Pending,
    Validating,
    Updating,
    Error,
    Uninstalling,
    Unknown(String),
}

impl Serialize for CsProvisioningState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CsProvisioningState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_str(&raw))
    }
}

impl CsProvisioningState {
    pub fn as_str(&self) -> &str {
        match self {
            CsProvisioningState::Ready => "ready",
            CsProvisioningState::Active => "active",
            CsProvisioningState::Installing => "installing",
            CsProvisioningState::Pending => "pending",
            CsProvisioningState::Validating => "validating",
            CsProvisioningState::Updating => "updating",
            CsProvisioningState::Error => "error",
            CsProvisioningState::Uninstalling => "uninstalling",
            CsProvisioningState::Unknown(raw) => raw,
        }
    }

    pub fn from_str(raw: &str) -> Self {
        match raw {
            "ready" => CsProvisioningState::Ready,
            "active" => CsProvisioningState::Active,
            "installing" => CsProvisioningState::Installing,
            "pending" => CsProvisioningState::Pending,
            "validating" => CsProvisioningState::Validating,
            "updating" => CsProvisioningState::Updating,
            "error" => CsProvisioningState::Error,
            "uninstalling" => CsProvisioningState::Uninstalling,
            other => CsProvisioningState::Unknown(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsClusterSpec {
    pub network: serde_json::Value,
    pub platform: serde_json::Value,
    pub version: serde_json::Value,
    pub ingress: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_auth: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsCluster {
    pub internal_id: String,
    pub state: CsProvisioningState,
    pub spec: CsClusterSpec,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsClusterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_auth: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsNodePoolSpec {
    pub vm_size: String,
    pub replicas: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<serde_json::Value>,
    pub taints: serde_json::Value,
    pub labels: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsNodePool {
    pub internal_id: String,
    pub state: CsProvisioningState,
    pub spec: CsNodePoolSpec,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsNodePoolPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsExternalAuthSpec {
    pub issuer_url: String,
    pub client_id: String,
    pub username_claim: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups_claim: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsExternalAuth {
    pub internal_id: String,
    pub spec: CsExternalAuthSpec,
}

/// The structured error shape CS returns for non-2xx responses (§6.2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsErrorBody {
    pub code: String,
    pub reason: String,
    pub target: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsAck {
    pub accepted: bool,
}
