//! REST backend.
//!
//! Endpoint layout:
//!
//! ```text
//! GET  /api/forms/templates/{task_type}
//! GET  /api/forms/{task_type}/fields?templateId={id}
//! GET  /api/tasks/{task_id}/progress
//! POST /api/tasks/{task_id}/progress
//! POST /api/tasks/{task_id}/submit
//! POST /api/tasks/{task_id}/clear
//! ```

use async_trait::async_trait;
use ob_forms_types::{FieldDefinition, FormData, TaskId, Template, TemplateId};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{
    BackendError, BackendResult, ClearAck, FormBackend, ProgressRequest, SaveAck, SubmitAck,
};

/// Body of a 422 response from the submit endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncompleteBody {
    #[serde(default)]
    missing_fields: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearRequest<'a> {
    task_type: &'a str,
}

/// HTTP client for the forms REST API.
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> BackendResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(http, base_url))
    }

    /// Use a preconfigured client (proxies, TLS roots, default headers).
    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> BackendResult<T> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        decode(check_status(response, &url).await?).await
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> BackendResult<Response> {
        let url = self.url(path);
        debug!(%url, "POST");
        self.http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))
    }
}

async fn check_status(response: Response, url: &str) -> BackendResult<Response> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(BackendError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::Status {
            code: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    response
        .json()
        .await
        .map_err(|e| BackendError::Decode(e.to_string()))
}

#[async_trait]
impl FormBackend for HttpBackend {
    async fn template_by_task_type(&self, task_type: &str) -> BackendResult<Template> {
        self.get_json(&format!("/api/forms/templates/{}", task_type))
            .await
    }

    async fn field_definitions(
        &self,
        task_type: &str,
        template_id: TemplateId,
    ) -> BackendResult<Vec<FieldDefinition>> {
        self.get_json(&format!(
            "/api/forms/{}/fields?templateId={}",
            task_type, template_id
        ))
        .await
    }

    async fn saved_progress(&self, task_id: TaskId) -> BackendResult<FormData> {
        match self
            .get_json(&format!("/api/tasks/{}/progress", task_id))
            .await
        {
            Err(BackendError::NotFound(_)) => Ok(FormData::new()),
            other => other,
        }
    }

    async fn save_progress(&self, request: &ProgressRequest) -> BackendResult<SaveAck> {
        let path = format!("/api/tasks/{}/progress", request.task_id);
        let response = self.post_json(&path, request).await?;
        decode(check_status(response, &path).await?).await
    }

    async fn submit(&self, request: &ProgressRequest) -> BackendResult<SubmitAck> {
        let path = format!("/api/tasks/{}/submit", request.task_id);
        let response = self.post_json(&path, request).await?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let missing_fields = match decode::<IncompleteBody>(response).await {
                Ok(body) => body.missing_fields,
                Err(e) => {
                    debug!(error = %e, "Unreadable 422 body; reporting incomplete without field list");
                    Vec::new()
                }
            };
            return Err(BackendError::Incomplete { missing_fields });
        }
        decode(check_status(response, &path).await?).await
    }

    async fn clear_fields(&self, task_id: TaskId, task_type: &str) -> BackendResult<ClearAck> {
        let path = format!("/api/tasks/{}/clear", task_id);
        let response = self.post_json(&path, &ClearRequest { task_type }).await?;
        decode(check_status(response, &path).await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ob_forms_types::FieldValue;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one request with a canned status and JSON body.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // headers, then as much body as content-length announces
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }

    fn backend(url: String) -> HttpBackend {
        let http = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpBackend::with_client(http, url)
    }

    fn request() -> ProgressRequest {
        let mut answers = FormData::new();
        answers.insert("legalName".into(), FieldValue::text("Acme"));
        ProgressRequest {
            task_id: TaskId(42),
            form_type: "company_kyb".into(),
            answers,
            include_metadata: true,
        }
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            backend.url("/api/tasks/1/progress"),
            "http://localhost:5000/api/tasks/1/progress"
        );
    }

    #[tokio::test]
    async fn test_missing_progress_is_empty_answers() {
        let url = serve_once("404 Not Found", r#"{"error":"no progress"}"#).await;
        let answers = backend(url).saved_progress(TaskId(42)).await.unwrap();
        assert!(answers.is_empty());
    }

    #[tokio::test]
    async fn test_saved_progress_decodes_answers() {
        let url = serve_once("200 OK", r#"{"legalName":"Acme","employeeCount":40,"agreed":false}"#).await;
        let answers = backend(url).saved_progress(TaskId(42)).await.unwrap();
        assert_eq!(answers.get("legalName"), Some(&FieldValue::text("Acme")));
        assert_eq!(answers.get("agreed"), Some(&FieldValue::Bool(false)));
    }

    #[tokio::test]
    async fn test_unprocessable_submit_is_incomplete() {
        let url = serve_once("422 Unprocessable Entity", r#"{"missingFields":["website"]}"#).await;
        let err = backend(url).submit(&request()).await.unwrap_err();
        match err {
            BackendError::Incomplete { missing_fields } => {
                assert_eq!(missing_fields, vec!["website".to_string()])
            }
            other => panic!("expected Incomplete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unprocessable_submit_with_unreadable_body_is_still_incomplete() {
        let url = serve_once("422 Unprocessable Entity", "not json").await;
        let err = backend(url).submit(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Incomplete { ref missing_fields } if missing_fields.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_reported_with_status() {
        let url = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let err = backend(url).save_progress(&request()).await.unwrap_err();
        match err {
            BackendError::Status { code, body } => {
                assert_eq!(code, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected Status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_successful_submit_decodes_ack() {
        let url = serve_once(
            "200 OK",
            r#"{"taskId":42,"submittedAt":"2026-01-05T10:00:00Z","fileId":9}"#,
        )
        .await;
        let ack = backend(url).submit(&request()).await.unwrap();
        assert_eq!(ack.task_id, TaskId(42));
        assert_eq!(ack.file_id, Some(9));
    }
}
