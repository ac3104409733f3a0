//! fal queue REST client.
//!
//! Both queued links of the chain talk to `queue.fal.run`; they differ only
//! in the model path and in how the input image is named in the request
//! body (`image_urls: [..]` for the edit model, `image_url` for flux).
//!
//! All calls carry `Authorization: Key <FAL_API_KEY>`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::FalConfig;
use crate::media::Image;
use crate::transform::error::TransformError;
use crate::transform::job::{JobClient, JobStatus, StatusUpdate, Submission, TransformJob};
use crate::vision::PromptBuilder;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FalImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    images: Vec<FalImage>,
    request_id: Option<String>,
    status_url: Option<String>,
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    response_url: Option<String>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ResultResponse {
    #[serde(default)]
    images: Vec<FalImage>,
}

// ---------------------------------------------------------------------------
// FalClient
// ---------------------------------------------------------------------------

/// How the model expects the input image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageField {
    /// `"image_urls": [url]`
    List,
    /// `"image_url": url`
    Single,
}

/// [`JobClient`] for one fal model.
pub struct FalClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    image_field: ImageField,
    prompts: PromptBuilder,
}

impl FalClient {
    pub fn new(config: &FalConfig, model: &str, image_field: ImageField) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: model.trim_matches('/').to_string(),
            image_field,
            prompts: PromptBuilder::new(),
        }
    }

    /// The image-edit model, fully polled.
    pub fn primary(config: &FalConfig) -> Self {
        Self::new(config, &config.primary_model, ImageField::List)
    }

    /// The flux model, polled once.
    pub fn secondary(config: &FalConfig) -> Self {
        Self::new(config, &config.secondary_model, ImageField::Single)
    }

    fn api_key(&self) -> Result<&str, TransformError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| TransformError::not_configured(&self.model))
    }

    /// Queue paths use the owner/app prefix of the model path
    /// (`fal-ai/gemini-25-flash-image/edit` → `fal-ai/gemini-25-flash-image`).
    fn app_path(&self) -> &str {
        match self.model.match_indices('/').nth(1) {
            Some((idx, _)) => &self.model[..idx],
            None => &self.model,
        }
    }

    fn default_status_endpoint(&self, request_id: &str) -> String {
        format!("{}/{}/requests/{request_id}/status", self.base_url, self.app_path())
    }

    fn default_result_endpoint(&self, request_id: &str) -> String {
        format!("{}/{}/requests/{request_id}", self.base_url, self.app_path())
    }

    fn submit_body(&self, image_url: String, instruction: &str) -> serde_json::Value {
        let mut body = json!({
            "prompt": self.prompts.edit_prompt(instruction),
            "num_images": 1,
            "output_format": "jpeg",
        });
        match self.image_field {
            ImageField::List => body["image_urls"] = json!([image_url]),
            ImageField::Single => body["image_url"] = json!(image_url),
        }
        body
    }

    fn parse_submission(&self, response: SubmitResponse) -> Result<Submission, TransformError> {
        if !response.images.is_empty() {
            return Ok(Submission::Immediate(
                response.images.into_iter().map(|i| i.url).collect(),
            ));
        }
        let Some(request_id) = response.request_id else {
            return Err(self.schema("response has neither images nor request_id"));
        };
        Ok(Submission::Queued(TransformJob {
            provider: self.model.clone(),
            status_endpoint: response
                .status_url
                .unwrap_or_else(|| self.default_status_endpoint(&request_id)),
            result_endpoint: Some(
                response
                    .response_url
                    .unwrap_or_else(|| self.default_result_endpoint(&request_id)),
            ),
            request_id,
            status: JobStatus::Queued,
        }))
    }

    fn parse_status(&self, response: StatusResponse) -> Result<StatusUpdate, TransformError> {
        let status = JobStatus::parse(&response.status)
            .ok_or_else(|| self.schema(format!("unknown job status {:?}", response.status)))?;
        let error = response.error.map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        Ok(StatusUpdate {
            status,
            result_endpoint: response.response_url,
            error,
        })
    }

    fn schema(&self, message: impl Into<String>) -> TransformError {
        TransformError::SchemaMismatch {
            provider: self.model.clone(),
            message: message.into(),
        }
    }

    /// Send `request` and decode a 2xx JSON body as `T`.
    async fn send_json<T>(&self, request: reqwest::RequestBuilder) -> Result<T, TransformError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let key = self.api_key()?;
        let response = request
            .header(reqwest::header::AUTHORIZATION, format!("Key {key}"))
            .send()
            .await
            .map_err(|e| TransformError::network(&self.model, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransformError::ProviderUnavailable {
                provider: self.model.clone(),
                reason: format!("HTTP {}: {}", status.as_u16(), body.trim()),
                status: Some(status.as_u16()),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| self.schema(e.to_string()))
    }
}

#[async_trait]
impl JobClient for FalClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn submit(&self, image: &Image, instruction: &str) -> Result<Submission, TransformError> {
        let body = self.submit_body(image.to_url(), instruction);
        let url = format!("{}/{}", self.base_url, self.model);
        log::debug!("{}: submitting", self.model);

        let response: SubmitResponse = self.send_json(self.client.post(url).json(&body)).await?;
        self.parse_submission(response)
    }

    async fn poll_status(&self, job: &TransformJob) -> Result<StatusUpdate, TransformError> {
        let response: StatusResponse = self
            .send_json(self.client.get(&job.status_endpoint))
            .await?;
        self.parse_status(response)
    }

    async fn fetch_result(&self, endpoint: &str) -> Result<Vec<String>, TransformError> {
        let response: ResultResponse = self.send_json(self.client.get(endpoint)).await?;
        Ok(response.images.into_iter().map(|i| i.url).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
