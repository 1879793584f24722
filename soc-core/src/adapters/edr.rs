use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AdapterFailure, Result, SocError};

use super::{
    Adapter, AdapterConfig, AdapterHealth, AdapterStatus, ArtifactInfo, CollectionAdapter, CollectionJob, EndpointInfo, Hunt,
};

/// EDR-style collection/containment adapter. The wire shape (bearer-token
/// auth, JSON action endpoints under `/devices/…`) proves the integration
/// surface the response executor dispatches through; it is not bound to any
/// specific vendor's API.
pub struct HttpCollectionAdapter {
    name: String,
    client: reqwest::Client,
    base_url: String,
    config: AdapterConfig,
}

impl HttpCollectionAdapter {
    pub fn new(name: impl Into<String>, config: AdapterConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_s.max(1)))
            .build()
            .unwrap_or_default();
        let base_url = config.url.clone().unwrap_or_default();
        HttpCollectionAdapter { name: name.into(), client, base_url, config }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, format!("{}{path}", self.base_url));
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let response = self.request(reqwest::Method::GET, path).query(query).send().await.map_err(|e| {
            SocError::adapter(AdapterFailure::Unavailable, format!("{} request failed: {e}", self.name))
        })?;
        if !response.status().is_success() {
            return Err(SocError::adapter(AdapterFailure::Invalid, format!("{} returned {}", self.name, response.status())));
        }
        response.json().await.map_err(|e| SocError::adapter(AdapterFailure::Invalid, e.to_string()))
    }

    fn endpoint_from_host(host: &Value) -> EndpointInfo {
        EndpointInfo {
            client_id: host.get("device_id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            hostname: host.get("hostname").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            os: host.get("platform_name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            os_version: host.get("os_version").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            ip_addresses: host.get("local_ip").and_then(|v| v.as_str()).map(|ip| vec![ip.to_string()]).unwrap_or_default(),
            online: host.get("status").and_then(|v| v.as_str()) == Some("Online"),
            last_seen: host.get("last_seen").and_then(|v| v.as_str()).and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok()).map(|ts| ts.with_timezone(&chrono::Utc)),
            labels: Default::default(),
        }
    }

    async fn post_action(&self, path: &str, body: Value) -> Result<()> {
        let response = self.request(reqwest::Method::POST, path).json(&body).send().await.map_err(|e| {
            SocError::adapter(AdapterFailure::Unavailable, format!("{} request failed: {e}", self.name))
        })?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SocError::adapter(AdapterFailure::AuthFailed, format!("{} rejected credentials", self.name)));
        }
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SocError::adapter(AdapterFailure::RateLimited, format!("{} rate limited", self.name)));
        }
        if !response.status().is_success() {
            return Err(SocError::adapter(AdapterFailure::Invalid, format!("{} returned {}", self.name, response.status())));
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for HttpCollectionAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> bool {
        self.request(reqwest::Method::GET, "/devices/queries/devices/v1").send().await.map(|r| r.status().is_success()).unwrap_or(false)
    }

    async fn disconnect(&self) {}

    async fn health_check(&self) -> AdapterHealth {
        match self.request(reqwest::Method::GET, "/devices/queries/devices/v1").send().await {
            Ok(r) if r.status().is_success() => {
                AdapterHealth { status: AdapterStatus::Connected, version: None, message: Some("connected".into()), details: None }
            }
            Ok(r) => AdapterHealth {
                status: AdapterStatus::Error,
                version: None,
                message: Some(format!("http {}", r.status())),
                details: None,
            },
            Err(e) => AdapterHealth { status: AdapterStatus::Error, version: None, message: Some(e.to_string()), details: None },
        }
    }

    fn get_config(&self) -> Value {
        json!({
            "base_url": self.base_url,
            "api_key_configured": self.config.api_key.is_some(),
        })
    }
}

#[async_trait]
impl CollectionAdapter for HttpCollectionAdapter {
    async fn isolate_host(&self, client_id: &str) -> Result<()> {
        self.post_action("/devices/entities/devices-actions/v2", json!({"action_name": "contain", "ids": [client_id]})).await
    }

    async fn unisolate_host(&self, client_id: &str) -> Result<()> {
        self.post_action("/devices/entities/devices-actions/v2", json!({"action_name": "lift_containment", "ids": [client_id]})).await
    }

    async fn kill_process(&self, client_id: &str, pid: u32) -> Result<()> {
        self.post_action("/real-time-response/entities/command/v1", json!({"device_id": client_id, "command": "kill", "pid": pid})).await
    }

    async fn quarantine_file(&self, client_id: &str, file_path: &str) -> Result<()> {
        self.post_action("/real-time-response/entities/command/v1", json!({"device_id": client_id, "command": "quarantine", "path": file_path}))
            .await
    }

    async fn collect_artifact(&self, client_id: &str, artifact: &str, urgent: bool) -> Result<CollectionJob> {
        let response = self
            .request(reqwest::Method::POST, "/real-time-response/entities/batch-command/v1")
            .json(&json!({"device_id": client_id, "artifact": artifact, "urgent": urgent}))
            .send()
            .await
            .map_err(|e| SocError::adapter(AdapterFailure::Unavailable, e.to_string()))?;

        if !response.status().is_success() {
            return Err(SocError::adapter(AdapterFailure::Invalid, format!("collection request returned {}", response.status())));
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let job_id = body.get("job_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        Ok(CollectionJob { job_id, status: "queued".to_string(), client_id: client_id.to_string(), artifact: Some(artifact.to_string()) })
    }

    async fn get_collection_status(&self, job_id: &str) -> Result<CollectionJob> {
        let body = self.get_json("/real-time-response/entities/command/v1", &[("cloud_request_id", job_id)]).await?;
        let resources = body.get("resources").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let Some(result) = resources.first() else {
            return Ok(CollectionJob { job_id: job_id.to_string(), status: "unknown".to_string(), client_id: String::new(), artifact: None });
        };
        let status = if result.get("complete").and_then(|v| v.as_bool()).unwrap_or(false) { "completed" } else { "running" };
        Ok(CollectionJob {
            job_id: job_id.to_string(),
            status: status.to_string(),
            client_id: result.get("device_id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            artifact: result.get("base_command").and_then(|v| v.as_str()).map(str::to_string),
        })
    }

    async fn get_collection_results(&self, job_id: &str, _limit: u32) -> Result<Vec<Value>> {
        let body = self.get_json("/real-time-response/entities/command/v1", &[("cloud_request_id", job_id)]).await?;
        let resources = body.get("resources").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let Some(result) = resources.first() else {
            return Ok(Vec::new());
        };
        let stdout = result.get("stdout").and_then(|v| v.as_str()).unwrap_or_default();
        match serde_json::from_str::<Vec<Value>>(stdout) {
            Ok(parsed) => Ok(parsed),
            Err(_) => Ok(vec![json!({"output": stdout})]),
        }
    }

    async fn list_endpoints(&self, limit: u32, offset: u32, search: Option<&str>, online_only: bool) -> Result<Vec<EndpointInfo>> {
        let mut filters = Vec::new();
        if let Some(search) = search {
            filters.push(format!("hostname:*'{search}*'"));
        }
        if online_only {
            filters.push("status:'Online'".to_string());
        }
        let limit = limit.min(5000).to_string();
        let offset = offset.to_string();
        let mut query = vec![("limit", limit.as_str()), ("offset", offset.as_str())];
        let filter = filters.join("+");
        if !filters.is_empty() {
            query.push(("filter", filter.as_str()));
        }
        let body = self.get_json("/devices/queries/devices/v1", &query).await?;
        let host_ids = body.get("resources").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        if host_ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .request(reqwest::Method::POST, "/devices/entities/devices/v2")
            .json(&json!({"ids": host_ids}))
            .send()
            .await
            .map_err(|e| SocError::adapter(AdapterFailure::Unavailable, e.to_string()))?;
        let detail: Value = response.json().await.unwrap_or(Value::Null);
        let hosts = detail.get("resources").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        Ok(hosts.iter().map(Self::endpoint_from_host).collect())
    }

    async fn get_endpoint(&self, client_id: &str) -> Result<Option<EndpointInfo>> {
        let response = self
            .request(reqwest::Method::POST, "/devices/entities/devices/v2")
            .json(&json!({"ids": [client_id]}))
            .send()
            .await
            .map_err(|e| SocError::adapter(AdapterFailure::Unavailable, e.to_string()))?;
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let hosts = body.get("resources").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        Ok(hosts.first().map(Self::endpoint_from_host))
    }

    async fn search_endpoints(&self, query: &str) -> Result<Vec<EndpointInfo>> {
        self.list_endpoints(100, 0, Some(query), false).await
    }

    async fn list_artifacts(&self, category: Option<&str>) -> Result<Vec<ArtifactInfo>> {
        let catalog = [
            ("runscript", "Run a custom script", "custom"),
            ("get", "Get a file from the host", "file"),
            ("reg", "Query registry", "registry"),
            ("ps", "List processes", "process"),
            ("netstat", "Network connections", "network"),
        ];
        Ok(catalog
            .into_iter()
            .filter(|(_, _, cat)| category.map(|c| c == *cat).unwrap_or(true))
            .map(|(name, description, category)| ArtifactInfo { name: name.to_string(), description: description.to_string(), category: category.to_string() })
            .collect())
    }

    /// CrowdStrike hunts live behind a separate IOC-management surface this
    /// adapter doesn't speak; mirrors the upstream behavior of returning an
    /// empty/local-only result rather than hitting a nonexistent endpoint.
    async fn list_hunts(&self, _limit: u32, _state: Option<&str>) -> Result<Vec<Hunt>> {
        Ok(Vec::new())
    }

    async fn create_hunt(&self, name: &str, artifact_name: &str, description: Option<&str>) -> Result<Hunt> {
        Ok(Hunt {
            hunt_id: String::new(),
            name: name.to_string(),
            artifact_name: artifact_name.to_string(),
            state: "created".to_string(),
            description: description.map(str::to_string),
        })
    }

    async fn start_hunt(&self, hunt_id: &str) -> Result<Hunt> {
        Ok(Hunt { hunt_id: hunt_id.to_string(), name: String::new(), artifact_name: String::new(), state: "running".to_string(), description: None })
    }

    async fn stop_hunt(&self, hunt_id: &str) -> Result<Hunt> {
        Ok(Hunt { hunt_id: hunt_id.to_string(), name: String::new(), artifact_name: String::new(), state: "stopped".to_string(), description: None })
    }

    async fn get_hunt_results(&self, _hunt_id: &str, _limit: u32) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn isolate_host_posts_contain_action() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/devices/entities/devices-actions/v2"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = AdapterConfig { url: Some(server.uri()), api_key: Some("token".to_string()), timeout_s: 5, ..Default::default() };
        let adapter = HttpCollectionAdapter::new("edr", config);
        adapter.isolate_host("CID-1").await.unwrap();
    }

    #[tokio::test]
    async fn rate_limited_response_maps_to_rate_limited_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(429)).mount(&server).await;

        let config = AdapterConfig { url: Some(server.uri()), timeout_s: 5, ..Default::default() };
        let adapter = HttpCollectionAdapter::new("edr", config);
        let err = adapter.isolate_host("CID-1").await.unwrap_err();
        assert!(matches!(err, SocError::Adapter { kind: AdapterFailure::RateLimited, .. }));
    }

    #[tokio::test]
    async fn get_collection_status_polls_by_job_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/real-time-response/entities/command/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resources": [{"device_id": "CID-1", "base_command": "ps", "complete": true}]
            })))
            .mount(&server)
            .await;

        let config = AdapterConfig { url: Some(server.uri()), timeout_s: 5, ..Default::default() };
        let adapter = HttpCollectionAdapter::new("edr", config);
        let job = adapter.get_collection_status("req-1").await.unwrap();
        assert_eq!(job.status, "completed");
        assert_eq!(job.client_id, "CID-1");
    }

    #[tokio::test]
    async fn list_endpoints_joins_query_and_detail_lookups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices/queries/devices/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resources": ["dev-1"]})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/devices/entities/devices/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resources": [{"device_id": "dev-1", "hostname": "WORK-01", "platform_name": "Windows", "status": "Online"}]
            })))
            .mount(&server)
            .await;

        let config = AdapterConfig { url: Some(server.uri()), timeout_s: 5, ..Default::default() };
        let adapter = HttpCollectionAdapter::new("edr", config);
        let endpoints = adapter.list_endpoints(100, 0, None, false).await.unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].hostname, "WORK-01");
        assert!(endpoints[0].online);
    }

    #[tokio::test]
    async fn list_artifacts_filters_by_category() {
        let config = AdapterConfig { url: Some("http://localhost".to_string()), timeout_s: 5, ..Default::default() };
        let adapter = HttpCollectionAdapter::new("edr", config);
        let artifacts = adapter.list_artifacts(Some("process")).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "ps");
    }
}
