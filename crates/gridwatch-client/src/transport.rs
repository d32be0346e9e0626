//! ---
//! gw_section: "04-networking"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "HTTP transport and operator commands."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
//! Thin reqwest wrapper over the telemetry endpoints.
//!
//! Every endpoint name is resolved relative to the configured base URL, so
//! `http://host:3000/api/` yields `http://host:3000/api/status` and so on.

use gridwatch_common::EndpointConfig;
use gridwatch_core::{ClusterStats, NodeRecord};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::command::{ActionVerb, CommandReply};
use crate::error::ClientError;

pub const STATUS: &str = "status";
pub const NODES: &str = "nodes";
pub const STATS: &str = "stats";
pub const ACTION: &str = "action";
pub const CONFIGURE: &str = "configure";
pub const SET_VOLTAGE: &str = "set_voltage";
pub const VERIFY: &str = "verify";

#[derive(Debug, Clone)]
pub struct GridClient {
    http: Client,
    base: Url,
}

impl GridClient {
    pub fn new(config: &EndpointConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| ClientError::Transport {
                endpoint: "client",
                source,
            })?;
        Ok(Self {
            http,
            base: normalise_base(config.base_url.clone()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Url, ClientError> {
        let mut url = self.base.join(endpoint)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Single-device snapshot.
    pub async fn status(&self) -> Result<NodeRecord, ClientError> {
        let url = self.url(STATUS, &[])?;
        self.fetch_json(STATUS, self.http.get(url)).await
    }

    /// Dashboard node list.
    pub async fn nodes(&self) -> Result<Vec<NodeRecord>, ClientError> {
        let url = self.url(NODES, &[])?;
        self.fetch_json(NODES, self.http.get(url)).await
    }

    pub async fn stats(&self) -> Result<ClusterStats, ClientError> {
        let url = self.url(STATS, &[])?;
        self.fetch_json(STATS, self.http.get(url)).await
    }

    pub async fn action(&self, verb: ActionVerb) -> Result<CommandReply, ClientError> {
        let url = self.url(ACTION, &[("action", verb.as_ref())])?;
        self.command(ACTION, self.http.post(url)).await
    }

    pub async fn configure(&self, id: &str, region: &str) -> Result<CommandReply, ClientError> {
        let url = self.url(CONFIGURE, &[("id", id), ("region", region)])?;
        self.command(CONFIGURE, self.http.get(url)).await
    }

    pub async fn set_voltage(&self, volts: f64) -> Result<CommandReply, ClientError> {
        let value = volts.to_string();
        let url = self.url(SET_VOLTAGE, &[("v", value.as_str())])?;
        self.command(SET_VOLTAGE, self.http.get(url)).await
    }

    pub async fn verify(&self, node_id: &str) -> Result<CommandReply, ClientError> {
        let url = self.url(VERIFY, &[("id", node_id)])?;
        self.command(VERIFY, self.http.get(url)).await
    }

    async fn send(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<(StatusCode, String), ClientError> {
        let response = request
            .send()
            .await
            .map_err(|source| ClientError::Transport { endpoint, source })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ClientError::Transport { endpoint, source })?;
        debug!(endpoint, status = status.as_u16(), bytes = body.len(), "endpoint answered");
        Ok((status, body))
    }

    async fn fetch_json<T>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let (status, body) = self.send(endpoint, request).await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        serde_json::from_str(&body).map_err(|err| ClientError::Malformed {
            endpoint,
            message: err.to_string(),
        })
    }

    /// Commands answer with a `{status, error}` object. An `error` field, or a client-error
    /// status with any body, is a rejection the operator has to see.
    async fn command(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<CommandReply, ClientError> {
        let (status, body) = self.send(endpoint, request).await?;
        let reply = serde_json::from_str::<CommandReply>(&body).ok();

        if let Some(message) = reply.as_ref().and_then(CommandReply::error_message) {
            return Err(ClientError::Rejected {
                endpoint,
                message: message.to_owned(),
            });
        }
        match reply {
            Some(reply) if status.is_success() => Ok(reply),
            None if status.is_success() => Err(ClientError::Malformed {
                endpoint,
                message: format!("expected a JSON object, got {:?}", truncate(&body)),
            }),
            _ if status.is_client_error() => Err(ClientError::Rejected {
                endpoint,
                message: rejection_text(status, &body),
            }),
            _ => Err(ClientError::Status {
                endpoint,
                status: status.as_u16(),
            }),
        }
    }
}

/// `Url::join` drops the last path segment unless the base ends in `/`.
fn normalise_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base
}

fn rejection_text(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request rejected")
            .to_owned()
    } else {
        truncate(body).to_owned()
    }
}

fn truncate(body: &str) -> &str {
    const LIMIT: usize = 200;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
