//! Conversion layer contract (§4.2): each api-version implements this
//! trait pair against the internal hub type. The registry (`versions::registry`)
//! holds one boxed instance per supported version string and is consulted
//! once per request, after api-version validation.

use crate::hub::{Cluster, ClusterSpec, NodePool, NodePoolSpec};
use anyhow::Result;
use serde_json::Value;

pub trait ClusterCodec: Send + Sync {
    /// A freshly-defaulted external body, used when projecting a cluster
    /// that predates fields this version added.
    fn zero(&self) -> Value;

    /// External JSON → hub spec. May reject malformed or out-of-range
    /// input with a validation error; callers run field/visibility
    /// validation on the result afterward.
    fn normalize(&self, external: &Value) -> Result<ClusterSpec>;

    /// Hub → external JSON at this version. Lossy: fields this version
    /// cannot represent (e.g. externalAuth on the narrower version) are
    /// omitted.
    fn project(&self, cluster: &Cluster) -> Value;
}

pub trait NodePoolCodec: Send + Sync {
    fn zero(&self) -> Value;
    fn normalize(&self, external: &Value) -> Result<NodePoolSpec>;
    fn project(&self, node_pool: &NodePool) -> Value;
}
