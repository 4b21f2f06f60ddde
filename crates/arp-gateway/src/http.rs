use crate::clients::{
    AtomicExecutorClient, CompositeExecutorClient, NodeRegistryClient, PdpClient,
    SelectionClient,
};
use crate::error::DownstreamError;
use arp_model::{
    AtomicExecuteRequest, AtomicExecuteResult, CandidateSet, CandidateSetRequest,
    CompositeBeginRequest, CompositeBeginResponse, ErrorDetails, Health, NodeType, NodeTypeRef,
    PolicyDecision, PolicyDecisionRequest, VersionInfo,
};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

const HEALTH_PATH: &str = "/v1/health";
const VERSION_PATH: &str = "/v1/version";
const ERROR_BODY_PREVIEW_CHARS: usize = 256;

/// reqwest client speaking the v1 HTTP surface of any downstream service.
#[derive(Clone, Debug)]
pub struct HttpServiceClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(default)]
    details: Option<ErrorDetails>,
}

impl HttpServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// `path` with one more segment appended; `/`, `?` and `#` in the segment
    /// are percent-encoded.
    fn endpoint_with_segment(
        &self,
        path: &str,
        segment: &str,
    ) -> Result<reqwest::Url, DownstreamError> {
        let mut url = reqwest::Url::parse(&self.endpoint(path))
            .map_err(|err| DownstreamError::Transport(format!("invalid endpoint url: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| {
                DownstreamError::Transport(format!(
                    "base url cannot carry a path: {}",
                    self.base_url
                ))
            })?
            .push(segment);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: impl reqwest::IntoUrl,
        query: &[(&str, &str)],
    ) -> Result<T, DownstreamError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|err| DownstreamError::Transport(format!("http get failed: {err}")))?;
        decode_response(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DownstreamError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|err| DownstreamError::Transport(format!("http post failed: {err}")))?;
        decode_response(response).await
    }

    async fn post_empty(&self, url: reqwest::Url) -> Result<(), DownstreamError> {
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|err| DownstreamError::Transport(format!("http post failed: {err}")))?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(map_http_status(status, text))
    }
}

async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, DownstreamError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| DownstreamError::Transport(format!("http read body failed: {err}")))?;
    if !status.is_success() {
        return Err(map_http_status(status, text));
    }
    serde_json::from_str(&text)
        .map_err(|err| DownstreamError::Decode(format!("http json decode failed: {err}")))
}

/// Only a body carrying the `{"error":{...}}` envelope is an API error; any
/// other non-2xx response is reported as undecodable.
fn map_http_status(status: reqwest::StatusCode, body: String) -> DownstreamError {
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => DownstreamError::Api {
            code: envelope.error.code,
            message: envelope.error.message,
            status_code: Some(status.as_u16()),
            details: envelope.error.details,
        },
        Err(_) => {
            let preview: String = body.trim().chars().take(ERROR_BODY_PREVIEW_CHARS).collect();
            if preview.is_empty() {
                DownstreamError::Decode(format!("http status {status} with empty body"))
            } else {
                DownstreamError::Decode(format!(
                    "http status {status} without error envelope: {preview}"
                ))
            }
        }
    }
}

#[async_trait]
impl AtomicExecutorClient for HttpServiceClient {
    async fn execute_atomic_node_run(
        &self,
        request: AtomicExecuteRequest,
    ) -> Result<AtomicExecuteResult, DownstreamError> {
        self.post_json("/v1/atomic-node-runs:execute", &request)
            .await
    }

    async fn cancel_atomic_node_run(&self, node_run_id: String) -> Result<(), DownstreamError> {
        let url =
            self.endpoint_with_segment("/v1/atomic-node-runs", &format!("{node_run_id}:cancel"))?;
        self.post_empty(url).await
    }

    async fn health(&self) -> Result<Health, DownstreamError> {
        self.get_json(self.endpoint(HEALTH_PATH), &[]).await
    }

    async fn version(&self) -> Result<VersionInfo, DownstreamError> {
        self.get_json(self.endpoint(VERSION_PATH), &[]).await
    }
}

#[async_trait]
impl CompositeExecutorClient for HttpServiceClient {
    async fn begin_composite_node_run(
        &self,
        request: CompositeBeginRequest,
    ) -> Result<CompositeBeginResponse, DownstreamError> {
        self.post_json("/v1/composite-node-runs:begin", &request)
            .await
    }

    async fn cancel_composite_node_run(
        &self,
        node_run_id: String,
    ) -> Result<(), DownstreamError> {
        let url = self
            .endpoint_with_segment("/v1/composite-node-runs", &format!("{node_run_id}:cancel"))?;
        self.post_empty(url).await
    }

    async fn health(&self) -> Result<Health, DownstreamError> {
        self.get_json(self.endpoint(HEALTH_PATH), &[]).await
    }

    async fn version(&self) -> Result<VersionInfo, DownstreamError> {
        self.get_json(self.endpoint(VERSION_PATH), &[]).await
    }
}

#[async_trait]
impl SelectionClient for HttpServiceClient {
    async fn generate_candidate_set(
        &self,
        request: CandidateSetRequest,
    ) -> Result<CandidateSet, DownstreamError> {
        self.post_json("/v1/candidate-sets", &request).await
    }

    async fn health(&self) -> Result<Health, DownstreamError> {
        self.get_json(self.endpoint(HEALTH_PATH), &[]).await
    }

    async fn version(&self) -> Result<VersionInfo, DownstreamError> {
        self.get_json(self.endpoint(VERSION_PATH), &[]).await
    }
}

#[async_trait]
impl PdpClient for HttpServiceClient {
    async fn decide_policy(
        &self,
        request: PolicyDecisionRequest,
    ) -> Result<PolicyDecision, DownstreamError> {
        self.post_json("/v1/policy:decide", &request).await
    }

    async fn health(&self) -> Result<Health, DownstreamError> {
        self.get_json(self.endpoint(HEALTH_PATH), &[]).await
    }

    async fn version(&self) -> Result<VersionInfo, DownstreamError> {
        self.get_json(self.endpoint(VERSION_PATH), &[]).await
    }
}

#[async_trait]
impl NodeRegistryClient for HttpServiceClient {
    async fn get_node_type(
        &self,
        node_type_ref: NodeTypeRef,
    ) -> Result<NodeType, DownstreamError> {
        let url = self.endpoint_with_segment("/v1/node-types", &node_type_ref.node_type_id)?;
        self.get_json(url, &[("version", node_type_ref.version.as_str())])
            .await
    }

    async fn health(&self) -> Result<Health, DownstreamError> {
        self.get_json(self.endpoint(HEALTH_PATH), &[]).await
    }

    async fn version(&self) -> Result<VersionInfo, DownstreamError> {
        self.get_json(self.endpoint(VERSION_PATH), &[]).await
    }
}
