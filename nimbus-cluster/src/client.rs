//! HTTP client for the node API

use async_trait::async_trait;
use nimbus_core::TaskId;
use nimbus_interfaces::{
    ApiResponse, CreateTaskRequest, NodeClient, NodeError, NodeResult, RemoteTaskSnapshot,
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

const TASK_ENDPOINT: &str = "api/v4/slave/task";

/// [`NodeClient`] speaking JSON over HTTP to a remote node
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    client: Client,
    base: Url,
}

impl HttpNodeClient {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nimbus/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, base))
    }

    /// Use a preconfigured `reqwest` client
    pub fn with_client(client: Client, mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { client, base }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> NodeResult<Url> {
        self.base
            .join(path)
            .map_err(|err| NodeError::Protocol(format!("invalid node URL: {}", err)))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> NodeResult<T> {
        let status = response.status();
        if status.is_server_error() {
            return Err(NodeError::Transport(format!("node answered {}", status)));
        }
        if !status.is_success() {
            return Err(NodeError::Rejected {
                code: i32::from(status.as_u16()),
                message: status.to_string(),
            });
        }
        let envelope: ApiResponse<T> = response.json().await.map_err(transport_error)?;
        envelope.into_result()
    }
}

fn transport_error(err: reqwest::Error) -> NodeError {
    if err.is_decode() {
        NodeError::Protocol(err.to_string())
    } else {
        NodeError::Transport(err.to_string())
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn create_task(&self, request: CreateTaskRequest) -> NodeResult<TaskId> {
        let url = self.endpoint(TASK_ENDPOINT)?;
        debug!(%url, task_type = %request.task_type, "Creating remote task");

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(response).await
    }

    async fn get_task(&self, id: TaskId, include_progress: bool) -> NodeResult<RemoteTaskSnapshot> {
        let url = self.endpoint(&format!("{}/{}", TASK_ENDPOINT, id))?;
        debug!(%url, "Polling remote task");

        let response = self
            .client
            .get(url)
            .query(&[("progress", include_progress)])
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(response).await
    }
}
