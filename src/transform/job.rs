//! Queued-job protocol: submit → poll status → fetch result.
//!
//! [`JobClient`] speaks one provider's wire format; [`poll_job`] drives a
//! queued [`TransformJob`] to an image URL under a [`PollMode`]; and
//! [`QueuedProvider`] glues the two into a [`TransformProvider`].
//!
//! ```text
//! submit ─┬─ Immediate([url, ..]) ──────────────────────────────▶ url
//!         └─ Queued(job) ─▶ Full:       sleep, poll × max_attempts
//!                                         Completed → fetch result ─▶ url
//!                                         Failed    → JobFailed
//!                                         exhausted → JobTimeout
//!                           SingleShot: sleep once, fetch result ─▶ url
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::media::Image;
use crate::transform::error::TransformError;
use crate::transform::provider::{TransformProvider, TransformedResult};
use crate::vision::Mood;

// ---------------------------------------------------------------------------
// Job types
// ---------------------------------------------------------------------------

/// Lifecycle of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Parse the queue's status string (`IN_QUEUE`, `IN_PROGRESS`,
    /// `COMPLETED`, `FAILED`).
    ///
    /// ```
    /// use sound_snapper::transform::JobStatus;
    ///
    /// assert_eq!(JobStatus::parse("IN_PROGRESS"), Some(JobStatus::Running));
    /// assert_eq!(JobStatus::parse("SOMETHING_ELSE"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN_QUEUE" | "QUEUED" => Some(JobStatus::Queued),
            "IN_PROGRESS" | "RUNNING" => Some(JobStatus::Running),
            "COMPLETED" | "OK" => Some(JobStatus::Completed),
            "FAILED" | "ERROR" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A request a provider accepted into its queue.  Lives only until it
/// resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformJob {
    pub provider: String,
    pub request_id: String,
    pub status_endpoint: String,
    pub result_endpoint: Option<String>,
    pub status: JobStatus,
}

/// One answer from a status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: JobStatus,
    /// Where the result can be fetched, when the provider says so.
    pub result_endpoint: Option<String>,
    /// Provider message for a failed job.
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            result_endpoint: None,
            error: None,
        }
    }
}

/// Answer to a submit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The provider answered with image URLs straight away (never empty).
    Immediate(Vec<String>),
    /// The provider queued the request.
    Queued(TransformJob),
}

// ---------------------------------------------------------------------------
// JobClient trait
// ---------------------------------------------------------------------------

/// Wire-level client for one queued image provider.
#[async_trait]
pub trait JobClient: Send + Sync {
    fn name(&self) -> &str;

    fn is_configured(&self) -> bool;

    async fn submit(&self, image: &Image, instruction: &str) -> Result<Submission, TransformError>;

    async fn poll_status(&self, job: &TransformJob) -> Result<StatusUpdate, TransformError>;

    /// Image URLs listed by the result payload at `endpoint` (possibly none).
    async fn fetch_result(&self, endpoint: &str) -> Result<Vec<String>, TransformError>;
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Bounded status polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait before every status request.
    pub interval: Duration,
    /// Status requests before giving up.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 30,
        }
    }
}

/// How a queued job is driven to its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Poll the status endpoint under `PollPolicy`.
    Full(PollPolicy),
    /// Wait once, then fetch the result; no status polling, no retry.
    SingleShot { delay: Duration },
}

/// Drive `job` to an image URL.
pub async fn poll_job<C>(client: &C, mut job: TransformJob, mode: PollMode) -> Result<String, TransformError>
where
    C: JobClient + ?Sized,
{
    match mode {
        PollMode::Full(policy) => poll_until_terminal(client, &mut job, policy).await,
        PollMode::SingleShot { delay } => fetch_once(client, &job, delay).await,
    }
}

async fn poll_until_terminal<C>(
    client: &C,
    job: &mut TransformJob,
    policy: PollPolicy,
) -> Result<String, TransformError>
where
    C: JobClient + ?Sized,
{
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;

        let update = match client.poll_status(job).await {
            Ok(update) => update,
            Err(e) => {
                log::warn!("{}: poll {attempt}/{} failed: {e}", job.provider, policy.max_attempts);
                continue;
            }
        };
        job.status = update.status;
        log::debug!(
            "{}: poll {attempt}/{} -> {:?}",
            job.provider,
            policy.max_attempts,
            update.status
        );

        match update.status {
            JobStatus::Queued | JobStatus::Running => {}
            JobStatus::Failed => {
                return Err(TransformError::JobFailed {
                    provider: job.provider.clone(),
                    message: update.error.unwrap_or_else(|| "unknown error".into()),
                });
            }
            JobStatus::Completed => {
                let Some(endpoint) = update.result_endpoint.or_else(|| job.result_endpoint.clone())
                else {
                    return Err(TransformError::SchemaMismatch {
                        provider: job.provider.clone(),
                        message: "completed job has no result endpoint".into(),
                    });
                };
                match client.fetch_result(&endpoint).await {
                    Ok(urls) => {
                        return urls.into_iter().next().ok_or_else(|| {
                            TransformError::NoImageInResult {
                                provider: job.provider.clone(),
                            }
                        });
                    }
                    Err(e) => {
                        log::warn!("{}: fetching result failed: {e}", job.provider);
                    }
                }
            }
        }
    }

    Err(TransformError::JobTimeout {
        provider: job.provider.clone(),
        attempts: policy.max_attempts,
    })
}

async fn fetch_once<C>(client: &C, job: &TransformJob, delay: Duration) -> Result<String, TransformError>
where
    C: JobClient + ?Sized,
{
    tokio::time::sleep(delay).await;

    let endpoint = job
        .result_endpoint
        .clone()
        .unwrap_or_else(|| job.status_endpoint.clone());
    let timeout = || TransformError::JobTimeout {
        provider: job.provider.clone(),
        attempts: 1,
    };

    match client.fetch_result(&endpoint).await {
        Ok(urls) => urls.into_iter().next().ok_or_else(timeout),
        Err(e) => {
            log::warn!("{}: single result poll failed: {e}", job.provider);
            Err(timeout())
        }
    }
}

// ---------------------------------------------------------------------------
// QueuedProvider
// ---------------------------------------------------------------------------

/// [`TransformProvider`] backed by a [`JobClient`] and a [`PollMode`].
pub struct QueuedProvider<C: JobClient> {
    client: C,
    mode: PollMode,
}

impl<C: JobClient> QueuedProvider<C> {
    pub fn new(client: C, mode: PollMode) -> Self {
        Self { client, mode }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn mode(&self) -> PollMode {
        self.mode
    }
}

#[async_trait]
impl<C: JobClient> TransformProvider for QueuedProvider<C> {
    fn name(&self) -> &str {
        self.client.name()
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn transform(
        &self,
        image: &Image,
        instruction: &str,
        _mood: Mood,
    ) -> Result<TransformedResult, TransformError> {
        if !self.client.is_configured() {
            return Err(TransformError::not_configured(self.name()));
        }

        let url = match self.client.submit(image, instruction).await? {
            Submission::Immediate(urls) => {
                log::info!("{}: immediate result", self.name());
                urls.into_iter()
                    .next()
                    .ok_or_else(|| TransformError::NoImageInResult {
                        provider: self.name().to_string(),
                    })?
            }
            Submission::Queued(job) => {
                log::info!("{}: queued as {}", self.name(), job.request_id);
                poll_job(&self.client, job, self.mode).await?
            }
        };

        Ok(TransformedResult {
            image: Image::Remote(url),
            provider: self.name().to_string(),
            scene: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
