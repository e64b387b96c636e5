//! Second-generation status API (`api_version = 2`).
//!
//! Limiters replace the dry-run counters with `skipped` / `exhausted`,
//! resolvers split `queries` from `sent` record types, and stream zones
//! report structured `connections` / `sessions` / `data` blocks.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::types::{
    Connections, Data, DnsResponses, HttpCaches, HttpLocationZones, HttpServerZones, HttpUpstreams,
    Processes, Slabs, Ssl, StreamUpstreams,
};
use super::{boxed, ApiVersion, Flatten, Resource, Schema};
use crate::metrics::{with_tag, Measurement, Tags};

pub struct CurrentSchema;

impl Schema for CurrentSchema {
    fn version(&self) -> ApiVersion {
        ApiVersion::Current
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
    pub skipped: Option<i64>,
    pub delayed: Option<i64>,
    pub rejected: Option<i64>,
    pub exhausted: Option<i64>,
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
                    .opt("skipped", limit.skipped)
                    .opt("delayed", limit.delayed)
                    .opt("rejected", limit.rejected)
                    .opt("exhausted", limit.exhausted);
                m
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitConn {
    pub passed: Option<i64>,
    pub skipped: Option<i64>,
    pub rejected: Option<i64>,
    pub exhausted: Option<i64>,
}

fn flatten_limit_conns(zones: &BTreeMap<String, LimitConn>, name: &str, base: &Tags) -> Vec<Measurement> {
    zones
        .iter()
        .map(|(limit_name, limit)| {
            let mut m = Measurement::new(name, with_tag(base, "limit", limit_name));
            m.opt("passed", limit.passed)
                .opt("skipped", limit.skipped)
                .opt("rejected", limit.rejected)
                .opt("exhausted", limit.exhausted);
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
pub struct ResolverQueries {
    pub name: Option<i64>,
    pub srv: Option<i64>,
    pub addr: Option<i64>,
}

/// DNS requests sent upstream, by record type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolverSent {
    pub a: Option<i64>,
    pub aaaa: Option<i64>,
    pub ptr: Option<i64>,
    pub srv: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolverZone {
    #[serde(default)]
    pub queries: ResolverQueries,
    #[serde(default)]
    pub sent: ResolverSent,
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
                m.opt("queries_name", zone.queries.name)
                    .opt("queries_srv", zone.queries.srv)
                    .opt("queries_addr", zone.queries.addr)
                    .opt("sent_a", zone.sent.a)
                    .opt("sent_aaaa", zone.sent.aaaa)
                    .opt("sent_ptr", zone.sent.ptr)
                    .opt("sent_srv", zone.sent.srv);
                zone.responses.put(&mut m);
                m
            })
            .collect()
    }
}

// ─── stream server zones ─────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamConnections {
    pub total: Option<i64>,
    pub processing: Option<i64>,
    pub discarded: Option<i64>,
    pub passed: Option<i64>,
}

/// Session outcomes, named after the status each maps to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamSessions {
    pub success: Option<i64>,
    pub invalid: Option<i64>,
    pub forbidden: Option<i64>,
    pub internal_error: Option<i64>,
    pub bad_gateway: Option<i64>,
    pub service_unavailable: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamServerZone {
    pub ssl: Option<Ssl>,
    #[serde(default)]
    pub connections: StreamConnections,
    #[serde(default)]
    pub sessions: StreamSessions,
    #[serde(default)]
    pub data: Data,
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
                let c = &zone.connections;
                let s = &zone.sessions;
                m.opt("connections_total", c.total)
                    .opt("connections_processing", c.processing)
                    .opt("connections_discarded", c.discarded)
                    .opt("connections_passed", c.passed)
                    .opt("sessions_success", s.success)
                    .opt("sessions_invalid", s.invalid)
                    .opt("sessions_forbidden", s.forbidden)
                    .opt("sessions_internal_error", s.internal_error)
                    .opt("sessions_bad_gateway", s.bad_gateway)
                    .opt("sessions_service_unavailable", s.service_unavailable);
                zone.data.put(&mut m);
                if let Some(ssl) = &zone.ssl {
                    ssl.put(&mut m);
                }
                m
            })
            .collect()
    }
}
