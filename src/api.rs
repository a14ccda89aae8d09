use reqwest::StatusCode;
use serde_json::Value;

/// API paths on the note service host.
pub const API_NOTE_CREATE: &str = "/api/open/api/v1/note/create";
pub const API_NOTE_EDIT: &str = "/api/open/api/v1/note/edit";
pub const API_NOTE_SET: &str = "/api/open/api/v1/note/set";
pub const API_UPLOAD_PREPARE: &str = "/api/open/api/v1/upload/prepare";
pub const API_UPLOAD_URL: &str = "/api/open/api/v1/upload/url";

/// Shared HTTP client for the note service API.
pub struct ApiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

/// Status code, parsed JSON body (when the body parses as JSON), and the
/// raw body for error reporting.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
    pub raw: String,
}

impl ApiResponse {
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// Look up a string field in the parsed body by JSON pointer.
    pub fn str_field(&self, pointer: &str) -> Option<&str> {
        self.body.as_ref()?.pointer(pointer)?.as_str()
    }
}

impl ApiClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// POST a JSON payload to an API path, with bearer auth.
    pub async fn post_json(&self, path: &str, payload: &Value) -> Result<ApiResponse, reqwest::Error> {
        log::debug!("POST {}: {}", path, payload);

        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;

        Self::read(response).await
    }

    /// POST a multipart form to an absolute upload endpoint. The endpoint
    /// is a pre-signed object-store URL, so no auth header is attached.
    pub async fn multipart_upload(
        &self,
        endpoint: &str,
        form: reqwest::multipart::Form,
    ) -> Result<ApiResponse, reqwest::Error> {
        log::debug!("POST multipart to {}", endpoint);

        let response = self.client.post(endpoint).multipart(form).send().await?;
        Self::read(response).await
    }

    async fn read(response: reqwest::Response) -> Result<ApiResponse, reqwest::Error> {
        let status = response.status();
        let raw = response.text().await?;
        let body = serde_json::from_str(&raw).ok();
        Ok(ApiResponse { status, body, raw })
    }
}
