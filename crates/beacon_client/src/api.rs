use std::time::Duration;

use serde_json::json;

use crate::types::{
    map_reqwest_error, ApiError, ConnectResponse, ErrorKind, InstallResponse, JobStatusDto,
    MessageDto, SendMessageResponse,
};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ApiSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for the dashboard API. Cheap to clone; every method maps
/// transport failures onto [`ApiError`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(ErrorKind::Network, err.to_string()))?;
        Ok(Self {
            http,
            base: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }

    pub async fn initiate_first_phase(
        &self,
        org: &str,
        provider: &str,
    ) -> Result<String, ApiError> {
        let url = self.url(&format!("api/orgs/{org}/integrations/{provider}/connect"));
        let response: ConnectResponse = self.post_json(&url, json!({})).await?;
        Ok(response.authorize_url)
    }

    pub async fn initiate_second_phase(
        &self,
        org: &str,
        provider: &str,
        force_new: bool,
    ) -> Result<String, ApiError> {
        let url = self.url(&format!("api/orgs/{org}/integrations/{provider}/install"));
        let response: InstallResponse =
            self.post_json(&url, json!({ "forceNew": force_new })).await?;
        Ok(response.install_url)
    }

    pub async fn auto_connect(
        &self,
        org: &str,
        provider: &str,
        source_org: &str,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!(
            "api/orgs/{org}/integrations/{provider}/auto-connect"
        ));
        let response = self
            .http
            .post(&url)
            .json(&json!({ "sourceOrgId": source_org }))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::ensure_success(&response)?;
        Ok(())
    }

    pub async fn send_message(
        &self,
        conversation: &str,
        client_id: &str,
        text: &str,
    ) -> Result<SendMessageResponse, ApiError> {
        let url = self.url(&format!("api/conversations/{conversation}/messages"));
        self.post_json(&url, json!({ "id": client_id, "text": text }))
            .await
    }

    pub async fn list_messages(&self, conversation: &str) -> Result<Vec<MessageDto>, ApiError> {
        let url = self.url(&format!("api/conversations/{conversation}/messages"));
        self.get_json(&url).await
    }

    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusDto, ApiError> {
        let url = self.url(&format!("api/jobs/{job_id}"));
        self.get_json(&url).await
    }

    pub async fn retry_job(&self, job_id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("api/jobs/{job_id}/retry"));
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::ensure_success(&response)?;
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.http.get(url).send().await.map_err(map_reqwest_error)?;
        Self::ensure_success(&response)?;
        response.json::<T>().await.map_err(map_reqwest_error)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::ensure_success(&response)?;
        response.json::<T>().await.map_err(map_reqwest_error)
    }

    fn ensure_success(response: &reqwest::Response) -> Result<(), ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::new(
                ErrorKind::Http(status.as_u16()),
                status.to_string(),
            ))
        }
    }
}
