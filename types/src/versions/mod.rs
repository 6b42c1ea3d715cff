pub mod v2023_09_04;
pub mod v2024_06_10_preview;

use crate::conversion::{ClusterCodec, NodePoolCodec};
use std::collections::HashMap;
use std::sync::OnceLock;

pub const SUPPORTED_API_VERSIONS: &[&str] = &["2024-06-10-preview", "2023-09-04"];

struct Registry {
    clusters: HashMap<&'static str, Box<dyn ClusterCodec>>,
    node_pools: HashMap<&'static str, Box<dyn NodePoolCodec>>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        let mut clusters: HashMap<&'static str, Box<dyn ClusterCodec>> = HashMap::new();
        clusters.insert("2024-06-10-preview", Box::new(v2024_06_10_preview::ClusterV1));
        clusters.insert("2023-09-04", Box::new(v2023_09_04::ClusterV0));

        let mut node_pools: HashMap<&'static str, Box<dyn NodePoolCodec>> = HashMap::new();
        node_pools.insert("2024-06-10-preview", Box::new(v2024_06_10_preview::NodePoolV1));
        node_pools.insert("2023-09-04", Box::new(v2023_09_04::NodePoolV0));

        Registry { clusters, node_pools }
    })
}

pub fn is_supported(api_version: &str) -> bool {
    SUPPORTED_API_VERSIONS.contains(&api_version)
}

pub fn cluster_codec(api_version: &str) -> Option<&'static dyn ClusterCodec> {
    registry().clusters.get(api_version).map(|b| b.as_ref())
}

pub fn node_pool_codec(api_version: &str) -> Option<&'static dyn NodePoolCodec> {
    registry().node_pools.get(api_version).map(|b| b.as_ref())
}
