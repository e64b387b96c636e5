use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Identity, StatusCode};
use tracing::debug;

use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::schema::Resource;

/// HTTP client for the status API.
///
/// Built once per plugin instance and reused across poll cycles; clones
/// share the same connection pool.
///
/// `response_timeout` bounds the whole request, body read included;
/// reqwest has no separate response-header deadline.
#[derive(Clone)]
pub struct StatusClient {
    http: reqwest::Client,
}

impl StatusClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        config.validate()?;

        let timeout = config.effective_response_timeout();
        debug!(?timeout, "creating HTTP client");

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(config.insecure_skip_verify);

        if let Some(path) = &config.tls_ca {
            let pem = read_pem(path)?;
            let ca = Certificate::from_pem(&pem).map_err(Error::ClientBuild)?;
            builder = builder.add_root_certificate(ca);
        }

        if let (Some(cert), Some(key)) = (&config.tls_cert, &config.tls_key) {
            // rustls wants the key and the chain in one PEM buffer
            let mut pem = read_pem(key)?;
            pem.push(b'\n');
            pem.extend(read_pem(cert)?);
            let identity = Identity::from_pem(&pem).map_err(Error::ClientBuild)?;
            builder = builder.identity(identity);
        }

        let http = builder.build().map_err(Error::ClientBuild)?;
        Ok(Self { http })
    }

    /// `GET {base}/{resource}?pretty=off`, returning the raw JSON body.
    pub async fn fetch(&self, endpoint: &Endpoint, resource: Resource) -> Result<Bytes, Error> {
        let url = endpoint.resource_url(resource.path())?;
        let address = url.to_string();

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| Error::Transport {
                url: address.clone(),
                source,
            })?;

        match resp.status() {
            // Optional or version-specific feature not enabled on the server
            StatusCode::NOT_FOUND => return Err(Error::NotFound { url: address }),
            status if !status.is_success() => {
                return Err(Error::UnexpectedStatus {
                    url: address,
                    status,
                })
            }
            _ => {}
        }

        let content_type = media_type(
            resp.headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        if !content_type.eq_ignore_ascii_case("application/json") {
            return Err(Error::UnexpectedContentType {
                url: address,
                content_type,
            });
        }

        resp.bytes().await.map_err(|source| Error::Transport {
            url: address,
            source,
        })
    }
}

fn read_pem(path: &std::path::Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|source| Error::TlsFile {
        path: path.to_owned(),
        source,
    })
}

/// `Content-Type` without parameters: `application/json; charset=utf-8`
/// → `application/json`.
fn media_type(header: Option<&str>) -> String {
    header
        .unwrap_or_default()
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_owned()
}
