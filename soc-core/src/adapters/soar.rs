use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::{AdapterFailure, Result, SocError};

use super::{Adapter, AdapterConfig, AdapterHealth, AdapterStatus, ApprovalRequest, SoarAdapter, Workflow, WorkflowExecution};

/// SOAR adapter speaking a Shuffle-shaped workflow API: workflows are listed
/// and triggered under `/api/v1/workflows`, executions are polled and
/// aborted under `/api/v1/workflows/executions/{id}`, and approvals piggyback
/// on executions parked in a `WAITING` status rather than a dedicated
/// approvals endpoint.
pub struct HttpSoarAdapter {
    name: String,
    client: reqwest::Client,
    base_url: String,
    config: AdapterConfig,
}

impl HttpSoarAdapter {
    pub fn new(name: impl Into<String>, config: AdapterConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_s.max(1)))
            .build()
            .unwrap_or_default();
        let base_url = config.url.clone().unwrap_or_default();
        HttpSoarAdapter { name: name.into(), client, base_url, config }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, format!("{}{path}", self.base_url));
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let response = self.request(reqwest::Method::GET, path).send().await.map_err(|e| {
            SocError::adapter(AdapterFailure::Unavailable, format!("{} request failed: {e}", self.name))
        })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Value::Null);
        }
        if !response.status().is_success() {
            return Err(SocError::adapter(AdapterFailure::Invalid, format!("{} returned {}", self.name, response.status())));
        }
        response.json().await.map_err(|e| SocError::adapter(AdapterFailure::Invalid, e.to_string()))
    }

    fn workflow_from(data: &Value) -> Workflow {
        let tags: Vec<String> = data.get("tags").and_then(|v| v.as_array()).map(|a| a.iter().filter_map(|t| t.as_str().map(str::to_string)).collect()).unwrap_or_default();
        Workflow {
            workflow_id: data.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            name: data.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            description: data.get("description").and_then(|v| v.as_str()).map(str::to_string),
            category: tags.first().cloned(),
            triggers: data.get("trigger_types").and_then(|v| v.as_array()).map(|a| a.iter().filter_map(|t| t.as_str().map(str::to_string)).collect()).unwrap_or_default(),
            is_active: data.get("status").and_then(|v| v.as_str()) == Some("production"),
            parameters: data.get("workflow_variables").and_then(|v| v.as_array()).cloned().unwrap_or_default(),
            created_at: None,
            updated_at: None,
        }
    }

    fn status_from_shuffle(status: &str) -> &'static str {
        match status {
            "EXECUTING" => "running",
            "FINISHED" => "completed",
            "ABORTED" => "failed",
            "WAITING" => "waiting_approval",
            _ => "pending",
        }
    }
}

#[async_trait]
impl Adapter for HttpSoarAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> bool {
        self.request(reqwest::Method::GET, "/api/v1/health").send().await.map(|r| r.status().is_success()).unwrap_or(false)
    }

    async fn disconnect(&self) {}

    async fn health_check(&self) -> AdapterHealth {
        match self.get_json("/api/v1/health").await {
            Ok(body) => AdapterHealth {
                status: AdapterStatus::Connected,
                version: body.get("version").and_then(|v| v.as_str()).map(str::to_string),
                message: Some("connected".into()),
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
impl SoarAdapter for HttpSoarAdapter {
    async fn list_workflows(&self, category: Option<&str>, active_only: bool) -> Result<Vec<Workflow>> {
        let body = self.get_json("/api/v1/workflows").await?;
        let entries = body.as_array().cloned().unwrap_or_default();
        Ok(entries
            .iter()
            .filter(|data| {
                let tags: Vec<String> = data.get("tags").and_then(|v| v.as_array()).map(|a| a.iter().filter_map(|t| t.as_str().map(str::to_lowercase)).collect()).unwrap_or_default();
                let category_ok = category.map(|c| tags.contains(&c.to_lowercase())).unwrap_or(true);
                let active_ok = !active_only || data.get("status").and_then(|v| v.as_str()) == Some("production");
                category_ok && active_ok
            })
            .map(Self::workflow_from)
            .collect())
    }

    async fn get_workflow(&self, workflow_id: &str) -> Result<Option<Workflow>> {
        let body = self.get_json(&format!("/api/v1/workflows/{workflow_id}")).await?;
        if body.is_null() {
            return Ok(None);
        }
        Ok(Some(Self::workflow_from(&body)))
    }

    async fn trigger_workflow(&self, workflow_id: &str, parameters: Value, triggered_by: Option<&str>) -> Result<WorkflowExecution> {
        let workflow_name = self.get_workflow(workflow_id).await?.map(|w| w.name).unwrap_or_else(|| workflow_id.to_string());
        let execution_source = triggered_by.map(|by| format!("soc-core:{by}")).unwrap_or_else(|| "soc-core".to_string());

        let response = self
            .request(reqwest::Method::POST, &format!("/api/v1/workflows/{workflow_id}/execute"))
            .json(&json!({"execution_argument": parameters.to_string(), "execution_source": execution_source}))
            .send()
            .await
            .map_err(|e| SocError::adapter(AdapterFailure::Unavailable, e.to_string()))?;
        if !response.status().is_success() {
            return Err(SocError::adapter(AdapterFailure::Invalid, format!("{} returned {}", self.name, response.status())));
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let execution_id = body.get("execution_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        Ok(WorkflowExecution {
            execution_id,
            workflow_id: workflow_id.to_string(),
            workflow_name,
            status: "pending".to_string(),
            started_at: Some(Utc::now()),
            completed_at: None,
            triggered_by: triggered_by.map(str::to_string),
            parameters,
            results: None,
            error: None,
        })
    }

    async fn get_execution_status(&self, execution_id: &str) -> Result<WorkflowExecution> {
        let body = self.get_json(&format!("/api/v1/workflows/executions/{execution_id}")).await?;
        let workflow_id = body.get("workflow_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let workflow_name = self.get_workflow(&workflow_id).await?.map(|w| w.name).unwrap_or_else(|| workflow_id.clone());
        let shuffle_status = body.get("status").and_then(|v| v.as_str()).unwrap_or("");
        let finished = matches!(shuffle_status, "FINISHED" | "ABORTED");
        let result = body.get("result").cloned();

        Ok(WorkflowExecution {
            execution_id: execution_id.to_string(),
            workflow_id,
            workflow_name,
            status: Self::status_from_shuffle(shuffle_status).to_string(),
            started_at: None,
            completed_at: if finished { Some(Utc::now()) } else { None },
            triggered_by: None,
            parameters: body.get("execution_argument").and_then(|v| v.as_str()).and_then(|s| serde_json::from_str(s).ok()).unwrap_or(Value::Null),
            results: result.clone().map(|r| json!({"output": r})),
            error: if shuffle_status == "ABORTED" { result.and_then(|r| r.as_str().map(str::to_string)) } else { None },
        })
    }

    async fn cancel_execution(&self, execution_id: &str) -> Result<bool> {
        let response = self.request(reqwest::Method::GET, &format!("/api/v1/workflows/executions/{execution_id}/abort")).send().await;
        Ok(response.map(|r| r.status().is_success()).unwrap_or(false))
    }

    async fn list_pending_approvals(&self) -> Result<Vec<ApprovalRequest>> {
        let body = self.get_json("/api/v1/workflows/executions").await?;
        let entries = body.as_array().cloned().unwrap_or_default();

        let mut approvals = Vec::new();
        for data in entries {
            if data.get("status").and_then(|v| v.as_str()) != Some("WAITING") {
                continue;
            }
            let execution_id = data.get("execution_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let workflow_id = data.get("workflow_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let workflow_name = self.get_workflow(&workflow_id).await?.map(|w| w.name).unwrap_or_else(|| workflow_id.clone());
            let parameters = data.get("execution_argument").and_then(|v| v.as_str()).and_then(|s| serde_json::from_str(s).ok()).unwrap_or(Value::Null);
            approvals.push(ApprovalRequest {
                approval_id: execution_id.clone(),
                execution_id,
                description: format!("Workflow '{workflow_name}' is waiting for input"),
                action: "User Input Required".to_string(),
                workflow_name,
                requested_at: Utc::now(),
                parameters,
            });
        }
        Ok(approvals)
    }

    async fn approve_request(&self, approval_id: &str, approved_by: &str, comment: Option<&str>) -> Result<bool> {
        let response = self
            .request(reqwest::Method::POST, &format!("/api/v1/workflows/executions/{approval_id}/continue"))
            .json(&json!({
                "authorization": "",
                "result": json!({"approved": true, "approved_by": approved_by, "comment": comment.unwrap_or("")}).to_string(),
            }))
            .send()
            .await;
        Ok(response.map(|r| r.status().is_success()).unwrap_or(false))
    }

    async fn deny_request(&self, approval_id: &str, _denied_by: &str, _reason: Option<&str>) -> Result<bool> {
        let response = self.request(reqwest::Method::GET, &format!("/api/v1/workflows/executions/{approval_id}/abort")).send().await;
        Ok(response.map(|r| r.status().is_success()).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn trigger_workflow_returns_pending_execution() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows/host_isolation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "host_isolation", "name": "Host Isolation", "status": "production"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/workflows/host_isolation/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"execution_id": "exec-1"})))
            .mount(&server)
            .await;

        let config = AdapterConfig { url: Some(server.uri()), api_key: Some("token".to_string()), timeout_s: 5, ..Default::default() };
        let adapter = HttpSoarAdapter::new("shuffle", config);
        let execution = adapter.trigger_workflow("host_isolation", json!({"hostname": "WORK-01"}), Some("analyst")).await.unwrap();

        assert_eq!(execution.execution_id, "exec-1");
        assert_eq!(execution.workflow_name, "Host Isolation");
        assert_eq!(execution.status, "pending");
    }

    #[tokio::test]
    async fn list_pending_approvals_filters_waiting_executions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows/executions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"execution_id": "exec-1", "workflow_id": "wf-1", "status": "WAITING"},
                {"execution_id": "exec-2", "workflow_id": "wf-1", "status": "EXECUTING"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET")).and(path("/api/v1/workflows/wf-1")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let config = AdapterConfig { url: Some(server.uri()), timeout_s: 5, ..Default::default() };
        let adapter = HttpSoarAdapter::new("shuffle", config);
        let approvals = adapter.list_pending_approvals().await.unwrap();

        assert_eq!(approvals.len(), 1);
        assert_eq!(approvals[0].execution_id, "exec-1");
    }
}
