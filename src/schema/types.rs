//! Records whose shape is the same in every status API generation.
//!
//! Every counter is optional: a key the server did not send must not turn
//! into a zero-valued field.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use super::Flatten;
use crate::metrics::{with_tag, Measurement, Tags};

// ─── Response code tables ────────────────────────────────────────

/// HTTP status code → count, holding only the codes the server reported.
///
/// Keys outside 100–599 and `null` counts are skipped while decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseCodes(pub BTreeMap<u16, i64>);

impl ResponseCodes {
    /// Emit `{prefix}_{code}` for every reported code.
    pub fn put(&self, m: &mut Measurement, prefix: &str) {
        for (code, count) in &self.0 {
            m.set(format!("{prefix}_{code}"), *count);
        }
    }

    pub fn get(&self, code: u16) -> Option<i64> {
        self.0.get(&code).copied()
    }
}

impl<'de> Deserialize<'de> for ResponseCodes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CodesVisitor;

        impl<'de> Visitor<'de> for CodesVisitor {
            type Value = ResponseCodes;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of HTTP status codes to counts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut codes = BTreeMap::new();
                while let Some(key) = map.next_key::<String>()? {
                    match key.parse::<u16>() {
                        Ok(code) if (100..=599).contains(&code) => {
                            if let Some(count) = map.next_value::<Option<i64>>()? {
                                codes.insert(code, count);
                            }
                        }
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(ResponseCodes(codes))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ResponseCodes::default())
            }
        }

        deserializer.deserialize_any(CodesVisitor)
    }
}

// ─── Building blocks ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Data {
    pub sent: Option<i64>,
    pub received: Option<i64>,
}

impl Data {
    pub fn put(&self, m: &mut Measurement) {
        m.opt("sent", self.sent).opt("received", self.received);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Requests {
    pub total: Option<i64>,
    pub processing: Option<i64>,
    pub discarded: Option<i64>,
}

impl Requests {
    pub fn put(&self, m: &mut Measurement) {
        m.opt("total", self.total)
            .opt("processing", self.processing)
            .opt("discarded", self.discarded);
    }
}

/// Per-zone TLS summary; the whole block is missing on plain zones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ssl {
    pub handshaked: Option<i64>,
    pub reuses: Option<i64>,
    pub timedout: Option<i64>,
    pub failed: Option<i64>,
}

impl Ssl {
    pub fn put(&self, m: &mut Measurement) {
        m.opt("ssl_handshaked", self.handshaked)
            .opt("ssl_reuses", self.reuses)
            .opt("ssl_timedout", self.timedout)
            .opt("ssl_failed", self.failed);
    }
}

/// DNS response counters of a resolver zone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DnsResponses {
    pub noerror: Option<i64>,
    pub formerr: Option<i64>,
    pub servfail: Option<i64>,
    pub nxdomain: Option<i64>,
    pub notimp: Option<i64>,
    pub refused: Option<i64>,
    pub timedout: Option<i64>,
    pub unknown: Option<i64>,
}

impl DnsResponses {
    pub fn put(&self, m: &mut Measurement) {
        m.opt("noerror", self.noerror)
            .opt("formerr", self.formerr)
            .opt("servfail", self.servfail)
            .opt("nxdomain", self.nxdomain)
            .opt("notimp", self.notimp)
            .opt("refused", self.refused)
            .opt("timedout", self.timedout)
            .opt("unknown", self.unknown);
    }
}

// ─── processes / connections ─────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Processes {
    pub respawned: Option<i64>,
}

impl Flatten for Processes {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        let mut m = Measurement::new("angie_api_processes", base.clone());
        m.opt("respawned", self.respawned);
        vec![m]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Connections {
    pub accepted: Option<i64>,
    pub dropped: Option<i64>,
    pub active: Option<i64>,
    pub idle: Option<i64>,
}

impl Flatten for Connections {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        let mut m = Measurement::new("angie_api_connections", base.clone());
        m.opt("accepted", self.accepted)
            .opt("dropped", self.dropped)
            .opt("active", self.active)
            .opt("idle", self.idle);
        vec![m]
    }
}

// ─── slabs ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlabPages {
    pub used: Option<i64>,
    pub free: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlabSlot {
    pub used: Option<i64>,
    pub free: Option<i64>,
    pub reqs: Option<i64>,
    pub fails: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Slab {
    #[serde(default)]
    pub pages: SlabPages,
    #[serde(default)]
    pub slots: BTreeMap<String, SlabSlot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Slabs(pub BTreeMap<String, Slab>);

impl Flatten for Slabs {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        let mut out = Vec::new();
        for (zone, slab) in &self.0 {
            let zone_tags = with_tag(base, "zone", zone);

            let mut pages = Measurement::new("angie_api_slabs_pages", zone_tags.clone());
            pages.opt("used", slab.pages.used).opt("free", slab.pages.free);
            out.push(pages);

            for (slot_id, slot) in &slab.slots {
                let mut m = Measurement::new("angie_api_slabs_slots", with_tag(&zone_tags, "slot", slot_id));
                m.opt("used", slot.used)
                    .opt("free", slot.free)
                    .opt("reqs", slot.reqs)
                    .opt("fails", slot.fails);
                out.push(m);
            }
        }
        out
    }
}

// ─── http zones ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerZone {
    pub ssl: Option<Ssl>,
    #[serde(default)]
    pub requests: Requests,
    #[serde(default)]
    pub responses: ResponseCodes,
    #[serde(default)]
    pub data: Data,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct HttpServerZones(pub BTreeMap<String, ServerZone>);

impl Flatten for HttpServerZones {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        self.0
            .iter()
            .map(|(name, zone)| {
                let mut m = Measurement::new("angie_api_http_server_zones", with_tag(base, "zone", name));
                zone.requests.put(&mut m);
                zone.data.put(&mut m);
                zone.responses.put(&mut m, "responses");
                if let Some(ssl) = &zone.ssl {
                    ssl.put(&mut m);
                }
                m
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationZone {
    #[serde(default)]
    pub requests: Requests,
    #[serde(default)]
    pub responses: ResponseCodes,
    #[serde(default)]
    pub data: Data,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct HttpLocationZones(pub BTreeMap<String, LocationZone>);

impl Flatten for HttpLocationZones {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        self.0
            .iter()
            .map(|(name, zone)| {
                let mut m = Measurement::new("angie_api_http_location_zones", with_tag(base, "zone", name));
                zone.requests.put(&mut m);
                zone.data.put(&mut m);
                zone.responses.put(&mut m, "responses");
                m
            })
            .collect()
    }
}

// ─── upstreams (http and stream) ─────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Selected {
    pub current: Option<i64>,
    pub total: Option<i64>,
    pub last: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Health {
    pub fails: Option<i64>,
    pub unavailable: Option<i64>,
    pub downtime: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Peer {
    pub server: Option<String>,
    pub service: Option<String>,
    pub backup: Option<bool>,
    pub weight: Option<i64>,
    pub state: Option<String>,
    #[serde(default)]
    pub selected: Selected,
    pub max_conns: Option<i64>,
    #[serde(default)]
    pub responses: ResponseCodes,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub health: Health,
    pub sid: Option<String>,
}

impl Peer {
    fn measurement(&self, name: &str, tags: Tags) -> Measurement {
        let mut m = Measurement::new(name, tags);
        m.opt("server", self.server.as_deref())
            .opt("service", self.service.as_deref())
            .opt("backup", self.backup)
            .opt("weight", self.weight)
            .opt("state", self.state.as_deref())
            .opt("selected_current", self.selected.current)
            .opt("selected_total", self.selected.total)
            .opt("selected_last", self.selected.last.as_deref())
            .opt("max_conns", self.max_conns)
            .opt("health_fails", self.health.fails)
            .opt("health_unavailable", self.health.unavailable)
            .opt("health_downtime", self.health.downtime);
        self.data.put(&mut m);
        self.responses.put(&mut m, "responses");
        m
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Upstream {
    #[serde(default)]
    pub peers: BTreeMap<String, Peer>,
    pub keepalive: Option<i64>,
    pub zombies: Option<i64>,
}

impl Upstream {
    /// One group measurement plus one measurement per peer.
    fn flatten_into(&self, out: &mut Vec<Measurement>, base: &Tags, names: (&str, &str), upstream: &str) {
        let group_tags = with_tag(base, "upstream", upstream);

        let mut group = Measurement::new(names.0, group_tags.clone());
        group.opt("keepalive", self.keepalive).opt("zombies", self.zombies);
        out.push(group);

        for (peer_name, peer) in &self.peers {
            let mut tags = with_tag(&group_tags, "peer", peer_name);
            tags.insert("sid".into(), peer.sid.clone().unwrap_or_default());
            out.push(peer.measurement(names.1, tags));
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct HttpUpstreams(pub BTreeMap<String, Upstream>);

impl Flatten for HttpUpstreams {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        let mut out = Vec::new();
        for (name, upstream) in &self.0 {
            upstream.flatten_into(
                &mut out,
                base,
                ("angie_api_http_upstreams", "angie_api_http_upstream_peers"),
                name,
            );
        }
        out
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StreamUpstreams(pub BTreeMap<String, Upstream>);

impl Flatten for StreamUpstreams {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        let mut out = Vec::new();
        for (name, upstream) in &self.0 {
            upstream.flatten_into(
                &mut out,
                base,
                ("angie_api_stream_upstreams", "angie_api_stream_upstream_peers"),
                name,
            );
        }
        out
    }
}

// ─── caches ──────────────────────────────────────────────────────

/// Responses/bytes served in one cache state. The `*_written` counters
/// only exist for states that write to the cache (miss, expired, bypass).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheStats {
    pub responses: Option<i64>,
    pub bytes: Option<i64>,
    pub responses_written: Option<i64>,
    pub bytes_written: Option<i64>,
}

impl CacheStats {
    fn put(&self, m: &mut Measurement, state: &str) {
        m.opt(&format!("{state}_responses"), self.responses)
            .opt(&format!("{state}_bytes"), self.bytes)
            .opt(&format!("{state}_responses_written"), self.responses_written)
            .opt(&format!("{state}_bytes_written"), self.bytes_written);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cache {
    pub size: Option<i64>,
    pub max_size: Option<i64>,
    pub cold: Option<bool>,
    #[serde(default)]
    pub hit: CacheStats,
    #[serde(default)]
    pub stale: CacheStats,
    #[serde(default)]
    pub updating: CacheStats,
    #[serde(default)]
    pub revalidated: CacheStats,
    #[serde(default)]
    pub miss: CacheStats,
    #[serde(default)]
    pub expired: CacheStats,
    #[serde(default)]
    pub bypass: CacheStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct HttpCaches(pub BTreeMap<String, Cache>);

impl Flatten for HttpCaches {
    fn flatten(&self, base: &Tags) -> Vec<Measurement> {
        self.0
            .iter()
            .map(|(name, cache)| {
                let mut m = Measurement::new("angie_api_http_caches", with_tag(base, "cache", name));
                m.opt("size", cache.size)
                    .opt("max_size", cache.max_size)
                    .opt("cold", cache.cold);
                cache.hit.put(&mut m, "hit");
                cache.stale.put(&mut m, "stale");
                cache.updating.put(&mut m, "updating");
                cache.revalidated.put(&mut m, "revalidated");
                cache.miss.put(&mut m, "miss");
                cache.expired.put(&mut m, "expired");
                cache.bypass.put(&mut m, "bypass");
                m
            })
            .collect()
    }
}
