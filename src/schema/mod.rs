//! Status document decoding and flattening.
//!
//! Every sub-resource of the status API decodes into a typed record that
//! knows how to flatten itself into measurements. The record shapes differ
//! between status API generations for a handful of resources, so decoding
//! goes through a [`Schema`] picked once from the configured API version.

pub mod current;
pub mod legacy;
pub mod types;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::metrics::{Measurement, Tags};

// ─── Resources ───────────────────────────────────────────────────

/// One status API sub-resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Processes,
    Connections,
    Slabs,
    HttpServerZones,
    HttpLocationZones,
    HttpUpstreams,
    HttpCaches,
    HttpLimitReqs,
    HttpLimitConns,
    Resolvers,
    StreamServerZones,
    StreamUpstreams,
    StreamLimitConns,
}

impl Resource {
    /// Gather order used by the poller.
    pub const ALL: [Resource; 13] = [
        Resource::Processes,
        Resource::Connections,
        Resource::Slabs,
        Resource::HttpServerZones,
        Resource::HttpLocationZones,
        Resource::HttpUpstreams,
        Resource::HttpCaches,
        Resource::HttpLimitReqs,
        Resource::HttpLimitConns,
        Resource::Resolvers,
        Resource::StreamServerZones,
        Resource::StreamUpstreams,
        Resource::StreamLimitConns,
    ];

    /// Path relative to the configured base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Processes => "processes",
            Self::Connections => "connections",
            Self::Slabs => "slabs",
            Self::HttpServerZones => "http/server_zones",
            Self::HttpLocationZones => "http/location_zones",
            Self::HttpUpstreams => "http/upstreams",
            Self::HttpCaches => "http/caches",
            Self::HttpLimitReqs => "http/limit_reqs",
            Self::HttpLimitConns => "http/limit_conns",
            Self::Resolvers => "resolvers",
            Self::StreamServerZones => "stream/server_zones",
            Self::StreamUpstreams => "stream/upstreams",
            Self::StreamLimitConns => "stream/limit_conns",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

// ─── API versions ────────────────────────────────────────────────

/// Status API generation the deployment speaks.
///
/// Configured as an integer; `0` (unset) means the legacy generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "i64")]
pub enum ApiVersion {
    #[default]
    Legacy,
    Current,
}

impl TryFrom<i64> for ApiVersion {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            0 | 1 => Ok(Self::Legacy),
            2 => Ok(Self::Current),
            other => Err(format!("unsupported api_version {other}")),
        }
    }
}

impl ApiVersion {
    pub fn number(self) -> i64 {
        match self {
            Self::Legacy => 1,
            Self::Current => 2,
        }
    }

    /// The decoder for this generation.
    pub fn schema(self) -> &'static dyn Schema {
        match self {
            Self::Legacy => &legacy::LegacySchema,
            Self::Current => &current::CurrentSchema,
        }
    }
}

// ─── Decoding seam ───────────────────────────────────────────────

/// A decoded status document that can be turned into measurements.
pub trait Flatten: Send {
    /// `base` carries the endpoint tags (`source`, `port`).
    fn flatten(&self, base: &Tags) -> Vec<Measurement>;
}

/// Decoder for one status API generation.
pub trait Schema: Send + Sync {
    fn version(&self) -> ApiVersion;

    fn decode(&self, resource: Resource, body: &[u8]) -> Result<Box<dyn Flatten>, serde_json::Error>;
}

pub(crate) fn boxed<T>(body: &[u8]) -> Result<Box<dyn Flatten>, serde_json::Error>
where
    T: DeserializeOwned + Flatten + 'static,
{
    Ok(Box::new(serde_json::from_slice::<T>(body)?))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_version_from_config_integer() {
        assert_eq!(ApiVersion::try_from(0).unwrap(), ApiVersion::Legacy);
        assert_eq!(ApiVersion::try_from(1).unwrap(), ApiVersion::Legacy);
        assert_eq!(ApiVersion::try_from(2).unwrap(), ApiVersion::Current);
        assert!(ApiVersion::try_from(3).is_err());
    }

    #[test]
    fn schema_matches_version() {
        for v in [ApiVersion::Legacy, ApiVersion::Current] {
            assert_eq!(v.schema().version(), v);
        }
    }

    #[test]
    fn resource_paths_are_unique() {
        let mut paths: Vec<_> = Resource::ALL.iter().map(|r| r.path()).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), Resource::ALL.len());
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        for v in [ApiVersion::Legacy, ApiVersion::Current] {
            for r in Resource::ALL {
                assert!(v.schema().decode(r, b"{not json").is_err(), "{r}");
            }
        }
    }
}
