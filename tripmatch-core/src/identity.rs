use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tripmatch_shared::Masked;

use crate::{CoreResult, HostId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Pending,
    Approved,
    Rejected,
    Blocked,
}

impl HostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostStatus::Pending => "pending",
            HostStatus::Approved => "approved",
            HostStatus::Rejected => "rejected",
            HostStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(HostStatus::Pending),
            "approved" => Ok(HostStatus::Approved),
            "rejected" => Ok(HostStatus::Rejected),
            "blocked" => Ok(HostStatus::Blocked),
            other => Err(format!("unknown host status: {}", other)),
        }
    }
}

/// Host record as held by the identity service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub user_id: String,
    pub status: HostStatus,
    pub full_name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub email: Option<Masked<String>>,
    pub profile_image: Option<String>,
    pub verified: bool,
}

impl Host {
    pub fn is_approved(&self) -> bool {
        self.status == HostStatus::Approved
    }

    pub fn profile(&self) -> HostProfile {
        HostProfile {
            id: self.id,
            full_name: self.full_name.clone(),
            country: self.country.clone(),
            city: self.city.clone(),
            profile_image: self.profile_image.clone(),
            verified: self.verified,
        }
    }
}

/// The subset of a host that is safe to show to other hosts and the public
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostProfile {
    pub id: HostId,
    pub full_name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub profile_image: Option<String>,
    pub verified: bool,
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Map an authenticated actor (user id) to their host record
    async fn resolve_host(&self, actor_id: &str) -> CoreResult<Option<Host>>;

    async fn find_host(&self, host_id: HostId) -> CoreResult<Option<Host>>;

    async fn public_profiles(&self, host_ids: &[HostId]) -> CoreResult<HashMap<HostId, HostProfile>>;

    /// Persist the blocked status. Must be idempotent.
    async fn block_host(&self, host_id: HostId, reason: &str) -> CoreResult<()>;
}
