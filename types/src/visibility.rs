//! Visibility side table: which capability set each field path carries,
//! keyed by (kind, field path) rather than per-field tags (§9 design note).
//! Populated once at startup via a `OnceLock`-backed static map, mirroring
//! the reference stack's `OnceLock<PrometheusHandle>` pattern.

use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Read,
    Create,
    Update,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Cluster,
    NodePool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldVisibility {
    pub read: bool,
    pub create: bool,
    pub update: bool,
}

impl FieldVisibility {
    pub const fn all() -> Self {
        Self {
            read: true,
            create: true,
            update: true,
        }
    }

    pub const fn read_create() -> Self {
        Self {
            read: true,
            create: true,
            update: false,
        }
    }

    pub const fn read_only() -> Self {
        Self {
            read: true,
            create: false,
            update: false,
        }
    }

    pub fn allows(&self, cap: Capability) -> bool {
        match cap {
            Capability::Read => self.read,
            Capability::Create => self.create,
            Capability::Update => self.update,
        }
    }
}

type VisibilityMap = HashMap<(ResourceKind, &'static str), FieldVisibility>;

static VISIBILITY: OnceLock<VisibilityMap> = OnceLock::new();

fn build_map() -> VisibilityMap {
    use Capability::*;
    use ResourceKind::*;
    let _ = (Read, Create, Update);

    let mut m = HashMap::new();
    m.insert((Cluster, "location"), FieldVisibility::read_create());
    m.insert((Cluster, "network"), FieldVisibility::read_create());
    m.insert((Cluster, "platform.subnetId"), FieldVisibility::read_create());
    m.insert((Cluster, "platform.outboundType"), FieldVisibility::all());
    m.insert((Cluster, "version.id"), FieldVisibility::all());
    m.insert((Cluster, "ingress.visibility"), FieldVisibility::read_create());
    m.insert((Cluster, "externalAuth"), FieldVisibility::all());
    m.insert((Cluster, "tags"), FieldVisibility::all());
    m.insert((Cluster, "provisioningState"), FieldVisibility::read_only());
    m.insert((Cluster, "internalCSId"), FieldVisibility::read_only());

    m.insert((NodePool, "vmSize"), FieldVisibility::read_create());
    m.insert((NodePool, "replicas"), FieldVisibility::all());
    m.insert((NodePool, "autoscaling"), FieldVisibility::all());
    m.insert((NodePool, "taints"), FieldVisibility::read_create());
    m.insert((NodePool, "labels"), FieldVisibility::all());
    m.insert((NodePool, "provisioningState"), FieldVisibility::read_only());
    m.insert((NodePool, "internalCSId"), FieldVisibility::read_only());

    m
}

pub fn lookup(kind: ResourceKind, field_path: &str) -> Option<FieldVisibility> {
    VISIBILITY
        .get_or_init(build_map)
        .get(&(kind, field_path))
        .copied()
}

/// Fields with no entry default to update-forbidden read/create, matching
/// the conservative default ARM expects for unmodeled fields.
pub fn lookup_or_default(kind: ResourceKind, field_path: &str) -> FieldVisibility {
    lookup(kind, field_path).unwrap_or(FieldVisibility::read_create())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioning_state_is_read_only_on_both_kinds() {
        let v = lookup(ResourceKind::Cluster, "provisioningState").unwrap();
        assert!(v.read && !v.create && !v.update);
        let v = lookup(ResourceKind::NodePool, "provisioningState").unwrap();
        assert!(v.read && !v.create && !v.update);
    }

    #[test]
    fn unknown_field_defaults_to_read_create() {
        let v = lookup_or_default(ResourceKind::Cluster, "spec.unmodeled");
        assert!(v.read && v.create && !v.update);
    }
}
