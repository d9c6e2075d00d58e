//! Counts of objects owned by other applications that reference a tenant.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use modkit::api::ApiResult;

/// Related object counts of one tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedCounts {
    pub circuit_count: u64,
    pub device_count: u64,
    pub ipaddress_count: u64,
    pub prefix_count: u64,
    pub rack_count: u64,
    pub site_count: u64,
    pub virtualmachine_count: u64,
    pub vlan_count: u64,
    pub vrf_count: u64,
    pub cluster_count: u64,
}

/// Names of the annotations backed by [`TenantRelations`].
pub const RELATED_COUNT_FIELDS: [&str; 10] = [
    "circuit_count",
    "device_count",
    "ipaddress_count",
    "prefix_count",
    "rack_count",
    "site_count",
    "virtualmachine_count",
    "vlan_count",
    "vrf_count",
    "cluster_count",
];

#[async_trait]
pub trait TenantRelations: Send + Sync {
    /// Counts per tenant id. Tenants without an entry count zero everywhere.
    async fn counts(&self, tenant_ids: &[i64]) -> ApiResult<HashMap<i64, RelatedCounts>>;
}

/// No other applications installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRelations;

#[async_trait]
impl TenantRelations for NoRelations {
    async fn counts(&self, _: &[i64]) -> ApiResult<HashMap<i64, RelatedCounts>> {
        Ok(HashMap::new())
    }
}
