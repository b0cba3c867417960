#![forbid(unsafe_code)]

use hm_core::ids::{TeamId, ZoneId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportTeamRequest {
    pub team_id: i64,
    pub number: i64,
    pub name: String,
    pub category: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefineZoneRequest {
    pub zone_id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefinePointRequest {
    pub point_id: i64,
    pub zone_id: i64,
    pub parent_section_id: Option<i64>,
    pub level: u32,
    pub is_section: bool,
    /// Explicit sibling tie-break; `query_items` orders by
    /// (level, sort_key, point_id).
    pub sort_key: i64,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOpenRequest {
    pub team_id: TeamId,
    pub zone_id: ZoneId,
    /// 0 uses the default lease TTL.
    pub lease_ttl_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeamInfo {
    pub team_id: TeamId,
    pub number: i64,
    pub name: String,
    pub category: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRow {
    pub seq: i64,
    pub ts_ms: i64,
    pub team_id: Option<i64>,
    pub event_type: String,
    pub payload_json: String,
}
