//! First-generation status API (`api_version = 1`).
//!
//! Limiters report dry-run counters, resolvers report a flat `requests`
//! block and stream zones report flat totals with a status-code table of
//! sessions.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::types::{
    Connections, DnsResponses, HttpCaches, HttpLocationZones, HttpServerZones, HttpUpstreams,
    Processes, ResponseCodes, Slabs, StreamUpstreams,
};
use super::{boxed, ApiVersion, Flatten, Resource, Schema};
use crate::metrics::{with_tag, Measurement, Tags};

pub struct LegacySchema;

impl Schema for LegacySchema {
    fn version(&self) -> ApiVersion {
        ApiVersion::Legacy
    }

    fn decode(&self, resource: Resource, body: &[u8]) -> Result<Box<dyn Flatten>, serde_json::Error> {
        match resource {
            Resource::Processes => boxed::<Processes>(body),
            Resource::Connections => boxed::<Connections>(body),
            Resource::Slabs => boxed::<Slabs>(body),
            Resource::HttpServerZones => boxed::<HttpServerZones>(body),
            Resource::HttpLocationZones => boxed::<HttpLocationZones>(body),
            Resource::HttpUpstreams => boxed::<HttpUpstreams>(body),
            Resource::HttpCaches => boxed::<HttpCaches>(body),
            Resource::HttpLimitReqs => boxed::<HttpLimitReqs>(body),
            Resource::HttpLimitConns => boxed::<HttpLimitConns>(body),
            Resource::Resolvers => boxed::<ResolverZones>(body),
            Resource::StreamServerZones => boxed::<StreamServerZones>(body),
            Resource::StreamUpstreams => boxed::<StreamUpstreams>(body),
            Resource::StreamLimitConns => boxed::<StreamLimitConns>(body),
        }
    }
}

// ─── limiters ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitReq {
    pub passed: Option<i64>,
    pub delayed: Option<i64>,
    pub rejected: Option<i64>,
    pub delayed_dry_run: Option<i64>,
    pub rejected_dry_run: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct HttpLimitReqs(pub BTreeMap<String, LimitReq>);

impl Flatten for HttpLimitReqs {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        self.0
            .iter()
            .map(|(name, limit)| {
                let mut m = Measurement::new("angie_api_http_limit_reqs", with_tag(base, "limit", name));
                m.opt("passed", limit.passed)
                    .opt("delayed", limit.delayed)
                    .opt("rejected", limit.rejected)
                    .opt("delayed_dry_run", limit.delayed_dry_run)
                    .opt("rejected_dry_run", limit.rejected_dry_run);
                m
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitConn {
    pub passed: Option<i64>,
    pub rejected: Option<i64>,
    pub rejected_dry_run: Option<i64>,
}

fn flatten_limit_conns(zones: &BTreeMap<String, LimitConn>, name: &str, base: &Tags) -> Vec<Measurement> {
    zones
        .iter()
        .map(|(limit_name, limit)| {
            let mut m = Measurement::new(name, with_tag(base, "limit", limit_name));
            m.opt("passed", limit.passed)
                .opt("rejected", limit.rejected)
                .opt("rejected_dry_run", limit.rejected_dry_run);
            m
        })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct HttpLimitConns(pub BTreeMap<String, LimitConn>);

impl Flatten for HttpLimitConns {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        flatten_limit_conns(&self.0, "angie_api_http_limit_conns", base)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StreamLimitConns(pub BTreeMap<String, LimitConn>);

impl Flatten for StreamLimitConns {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        flatten_limit_conns(&self.0, "angie_api_stream_limit_conns", base)
    }
}

// ─── resolvers ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolverRequests {
    pub name: Option<i64>,
    pub srv: Option<i64>,
    pub addr: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolverZone {
    #[serde(default)]
    pub requests: ResolverRequests,
    #[serde(default)]
    pub responses: DnsResponses,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ResolverZones(pub BTreeMap<String, ResolverZone>);

impl Flatten for ResolverZones {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        self.0
            .iter()
            .map(|(name, zone)| {
                let mut m = Measurement::new("angie_api_resolver_zones", with_tag(base, "zone", name));
                m.opt("name", zone.requests.name)
                    .opt("srv", zone.requests.srv)
                    .opt("addr", zone.requests.addr);
                zone.responses.put(&mut m);
                m
            })
            .collect()
    }
}

// ─── stream server zones ─────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamServerZone {
    pub processing: Option<i64>,
    pub connections: Option<i64>,
    #[serde(default)]
    pub sessions: ResponseCodes,
    pub discarded: Option<i64>,
    pub received: Option<i64>,
    pub sent: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StreamServerZones(pub BTreeMap<String, StreamServerZone>);

impl Flatten for StreamServerZones {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        self.0
            .iter()
            .map(|(name, zone)| {
                let mut m = Measurement::new("angie_api_stream_server_zones", with_tag(base, "zone", name));
                m.opt("processing", zone.processing)
                    .opt("connections", zone.connections)
                    .opt("discarded", zone.discarded)
                    .opt("received", zone.received)
                    .opt("sent", zone.sent);
                zone.sessions.put(&mut m, "sessions");
                m
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::testutil::{find, flatten};
    use serde_json::json;

    #[test]
    fn limit_reqs_report_dry_run_counters() {
        let ms = flatten(
            ApiVersion::Legacy,
            Resource::HttpLimitReqs,
            json!({
                "one": { "passed": 10, "delayed": 1, "rejected": 2, "delayed_dry_run": 0, "rejected_dry_run": 3 }
            }),
        );
        let m = find(&ms, "angie_api_http_limit_reqs", ("limit", "one"));
        assert_eq!(m.int("rejected_dry_run"), Some(3));
        assert_eq!(m.int("delayed_dry_run"), Some(0));
        assert!(!m.has_field("skipped"));
    }

    #[test]
    fn limit_conns_pick_module_measurement() {
        let body = json!({ "perip": { "passed": 4, "rejected": 0 } });
        let http = flatten(ApiVersion::Legacy, Resource::HttpLimitConns, body.clone());
        let stream = flatten(ApiVersion::Legacy, Resource::StreamLimitConns, body);

        let m = find(&http, "angie_api_http_limit_conns", ("limit", "perip"));
        assert_eq!(m.int("passed"), Some(4));
        assert!(!m.has_field("rejected_dry_run"));
        find(&stream, "angie_api_stream_limit_conns", ("limit", "perip"));
    }

    #[test]
    fn resolver_requests_are_flat() {
        let ms = flatten(
            ApiVersion::Legacy,
            Resource::Resolvers,
            json!({
                "resolver_zone": {
                    "requests": { "name": 25460, "srv": 130, "addr": 2580 },
                    "responses": { "noerror": 26499, "formerr": 0, "servfail": 3, "nxdomain": 0,
                                   "notimp": 0, "refused": 0, "timedout": 243, "unknown": 478 }
                }
            }),
        );
        let m = find(&ms, "angie_api_resolver_zones", ("zone", "resolver_zone"));
        assert_eq!(m.int("name"), Some(25460));
        assert_eq!(m.int("timedout"), Some(243));
        assert!(!m.has_field("queries_name"));
    }

    #[test]
    fn stream_zone_sessions_table() {
        let ms = flatten(
            ApiVersion::Legacy,
            Resource::StreamServerZones,
            json!({
                "tcp": {
                    "processing": 0, "connections": 12,
                    "sessions": { "200": 11, "502": 1 },
                    "received": 100, "sent": 200
                }
            }),
        );
        let m = find(&ms, "angie_api_stream_server_zones", ("zone", "tcp"));
        assert_eq!(m.int("connections"), Some(12));
        assert_eq!(m.int("sessions_200"), Some(11));
        assert_eq!(m.int("sessions_502"), Some(1));
        assert!(!m.has_field("discarded"));
    }
}
