//! Field validation and visibility enforcement (§4.3), run on the
//! internal hub value after Normalize. Violations are collected rather
//! than short-circuited so a single PUT can report everything wrong with
//! it at once.

use hcprp_common::error::{ArmErrorDetail, RpError};
use hcprp_types::hub::{ClusterSpec, NodePoolSpec};
use hcprp_types::visibility::{Capability, FieldVisibility, ResourceKind, lookup_or_default};
use std::net::Ipv4Addr;

fn is_cidr_v4(value: &str) -> bool {
    let Some((addr, prefix)) = value.split_once('/') else {
        return false;
    };
    let Ok(_) = addr.parse::<Ipv4Addr>() else {
        return false;
    };
    matches!(prefix.parse::<u8>(), Ok(p) if p <= 32)
}

fn detail(code: &str, message: impl Into<String>, target: &str) -> ArmErrorDetail {
    ArmErrorDetail {
        code: code.to_string(),
        message: message.into(),
        target: Some(target.to_string()),
    }
}

pub fn validate_cluster_create(spec: &ClusterSpec) -> Result<(), RpError> {
    let mut violations = Vec::new();

    if spec.location.trim().is_empty() {
        violations.push(detail(
            "InvalidParameter",
            "location is required",
            "properties.location",
        ));
    }
    if !is_cidr_v4(&spec.network.machine_cidr) {
        violations.push(detail(
            "InvalidParameter",
            "machineNetwork.cidr must be a valid IPv4 CIDR",
            "properties.network.machineCidr",
        ));
    }
    if !is_cidr_v4(&spec.network.pod_cidr) {
        violations.push(detail(
            "InvalidParameter",
            "podCidr must be a valid IPv4 CIDR",
            "properties.network.podCidr",
        ));
    }
    if !is_cidr_v4(&spec.network.service_cidr) {
        violations.push(detail(
            "InvalidParameter",
            "serviceCidr must be a valid IPv4 CIDR",
            "properties.network.serviceCidr",
        ));
    }
    if spec.platform.subnet_id.trim().is_empty() {
        violations.push(detail(
            "InvalidParameter",
            "platform.subnetId is required",
            "properties.platform.subnetId",
        ));
    }
    if spec.version.id.trim().is_empty() {
        violations.push(detail(
            "InvalidParameter",
            "version.id is required",
            "properties.version.id",
        ));
    }

    finish(violations)
}

/// Compares `new` against `current` and flags any changed field lacking
/// `Update` visibility (§4.3). Fields present in the visibility side
/// table but not modeled here are covered by whole-struct equality below;
/// explicit per-field checks exist for those the spec calls out by name.
pub fn validate_cluster_update(current: &ClusterSpec, new: &ClusterSpec) -> Result<(), RpError> {
    let mut violations = Vec::new();
    check_field(
        ResourceKind::Cluster,
        "location",
        current.location != new.location,
        &mut violations,
    );
    check_field(
        ResourceKind::Cluster,
        "platform.subnetId",
        current.platform.subnet_id != new.platform.subnet_id,
        &mut violations,
    );
    check_field(
        ResourceKind::Cluster,
        "ingress.visibility",
        current.ingress.visibility != new.ingress.visibility,
        &mut violations,
    );
    check_field(
        ResourceKind::Cluster,
        "network",
        current.network != new.network,
        &mut violations,
    );
    finish(violations)
}

pub fn validate_node_pool_create(spec: &NodePoolSpec) -> Result<(), RpError> {
    let mut violations = Vec::new();
    if spec.vm_size.trim().is_empty() {
        violations.push(detail(
            "InvalidParameter",
            "vmSize is required",
            "properties.vmSize",
        ));
    }
    if spec.replicas == 0 && spec.autoscaling.is_none() {
        violations.push(detail(
            "InvalidParameter",
            "replicas must be greater than zero when autoscaling is not configured",
            "properties.replicas",
        ));
    }
    if let Some(auto) = &spec.autoscaling
        && auto.min_replicas > auto.max_replicas
    {
        violations.push(detail(
            "InvalidParameter",
            "autoscaling.minReplicas must not exceed maxReplicas",
            "properties.autoscaling",
        ));
    }
    finish(violations)
}

pub fn validate_node_pool_update(current: &NodePoolSpec, new: &NodePoolSpec) -> Result<(), RpError> {
    let mut violations = Vec::new();
    check_field(
        ResourceKind::NodePool,
        "vmSize",
        current.vm_size != new.vm_size,
        &mut violations,
    );
    finish(violations)
}

fn check_field(
    kind: ResourceKind,
    field_path: &'static str,
    changed: bool,
    violations: &mut Vec<ArmErrorDetail>,
) {
    if !changed {
        return;
    }
    let visibility: FieldVisibility = lookup_or_default(kind, field_path);
    if !visibility.allows(Capability::Update) {
        violations.push(detail(
            "InvalidParameter",
            format!("{field_path} cannot be changed after creation"),
            &format!("properties.{field_path}"),
        ));
    }
}

fn finish(violations: Vec<ArmErrorDetail>) -> Result<(), RpError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(RpError::Validation(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcprp_types::hub::*;

    fn valid_spec() -> ClusterSpec {
        ClusterSpec {
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
            external_auth: None,
            tags: Default::default(),
        }
    }

    #[test]
    fn valid_cluster_passes() {
        assert!(validate_cluster_create(&valid_spec()).is_ok());
    }

    #[test]
    fn bad_cidr_is_rejected() {
        let mut spec = valid_spec();
        spec.network.machine_cidr = "not-a-cidr".into();
        let err = validate_cluster_create(&spec).unwrap_err();
        match err {
            RpError::Validation(v) => assert_eq!(v.len(), 1),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn changing_subnet_on_update_is_rejected() {
        let current = valid_spec();
        let mut new = current.clone();
        new.platform.subnet_id = "/subscriptions/s/.../subnet2".into();
        let err = validate_cluster_update(&current, &new).unwrap_err();
        assert!(matches!(err, RpError::Validation(_)));
    }

    #[test]
    fn changing_mutable_field_on_update_is_allowed() {
        let current = valid_spec();
        let mut new = current.clone();
        new.platform.outbound_type = "userDefinedRouting".into();
        assert!(validate_cluster_update(&current, &new).is_ok());
    }
}
