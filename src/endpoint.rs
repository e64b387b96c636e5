use url::Url;

use crate::error::Error;
use crate::metrics::Tags;

/// One configured status API base URL together with the `source` / `port`
/// tags every measurement gathered from it carries.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: Url,
    source: String,
    port: String,
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let base = Url::parse(raw).map_err(|source| Error::InvalidUrl {
            url: raw.to_owned(),
            source,
        })?;

        let source = base
            .host_str()
            .unwrap_or_default()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_owned();

        // `Url::port` hides ports equal to the scheme default, which is
        // exactly what we would fall back to anyway.
        let port = match (base.port(), base.scheme()) {
            (Some(port), _) => port.to_string(),
            (None, "http") => "80".to_owned(),
            (None, "https") => "443".to_owned(),
            (None, _) => String::new(),
        };

        Ok(Self { base, source, port })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `{base}/{path}?pretty=off`
    pub fn resource_url(&self, path: &str) -> Result<Url, Error> {
        let raw = format!("{}/{}", self.base.as_str().trim_end_matches('/'), path);
        let mut url = Url::parse(&raw).map_err(|source| Error::InvalidUrl {
            url: raw.clone(),
            source,
        })?;
        url.query_pairs_mut().append_pair("pretty", "off");
        Ok(url)
    }

    /// Base tag set: `source` and `port`.
    pub fn tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert("source".into(), self.source.clone());
        tags.insert("port".into(), self.port.clone());
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port_of(raw: &str) -> String {
        Endpoint::parse(raw).unwrap().tags()["port"].clone()
    }

    #[test]
    fn port_defaults_follow_scheme() {
        assert_eq!(port_of("http://host/status"), "80");
        assert_eq!(port_of("https://host/status"), "443");
        assert_eq!(port_of("http://host:8080/status"), "8080");
        assert_eq!(port_of("http://host:80/status"), "80");
    }

    #[test]
    fn unknown_scheme_without_port_has_empty_port() {
        assert_eq!(port_of("unix://host/status"), "");
    }

    #[test]
    fn source_tag_is_bare_host() {
        let ep = Endpoint::parse("http://[::1]:9000/status").unwrap();
        let tags = ep.tags();
        assert_eq!(tags["source"], "::1");
        assert_eq!(tags["port"], "9000");
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn resource_url_appends_path_and_pretty_off() {
        let ep = Endpoint::parse("http://localhost/status/").unwrap();
        let url = ep.resource_url("http/upstreams").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost/status/http/upstreams?pretty=off"
        );
    }

    #[test]
    fn garbage_url_is_rejected() {
        let err = Endpoint::parse("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }
}
