//! [`TransformationOrchestrator`]: walks the provider fallback chain.
//!
//! Providers are tried strictly one after another, in configured order,
//! until one yields an image.  Unconfigured providers are skipped without a
//! request.  When every link fails the individual failures are returned in
//! [`TransformError::AllProvidersExhausted`], in chain order.

use std::sync::Arc;

use crate::config::{AppConfig, ProviderKind};
use crate::media::Image;
use crate::transform::error::TransformError;
use crate::transform::fal::FalClient;
use crate::transform::job::{PollMode, PollPolicy, QueuedProvider};
use crate::transform::multimodal::MultimodalProvider;
use crate::transform::provider::{TransformProvider, TransformedResult};
use crate::vision::{GenerativeModel, Mood};

/// Ordered image-transformation fallback chain.
pub struct TransformationOrchestrator {
    chain: Vec<Arc<dyn TransformProvider>>,
}

impl TransformationOrchestrator {
    pub fn new(chain: Vec<Arc<dyn TransformProvider>>) -> Self {
        Self { chain }
    }

    /// Build the chain listed in `config.transform.chain`.
    ///
    /// `model` backs the multimodal link; it is shared with scene analysis.
    pub fn from_config(config: &AppConfig, model: Arc<dyn GenerativeModel>) -> Self {
        let transform = &config.transform;
        let chain = transform
            .chain
            .iter()
            .map(|kind| -> Arc<dyn TransformProvider> {
                match kind {
                    ProviderKind::Primary => Arc::new(QueuedProvider::new(
                        FalClient::primary(&config.fal),
                        PollMode::Full(PollPolicy {
                            interval: transform.poll_interval(),
                            max_attempts: transform.max_poll_attempts,
                        }),
                    )),
                    ProviderKind::Secondary => Arc::new(QueuedProvider::new(
                        FalClient::secondary(&config.fal),
                        PollMode::SingleShot {
                            delay: transform.single_shot_delay(),
                        },
                    )),
                    ProviderKind::Multimodal => Arc::new(MultimodalProvider::new(
                        config.gemini.image_model.clone(),
                        Arc::clone(&model),
                    )),
                }
            })
            .collect();
        Self::new(chain)
    }

    /// Provider names in chain order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.chain.iter().map(|p| p.name()).collect()
    }

    /// Transform `image`, falling back along the chain.
    pub async fn transform(
        &self,
        image: &Image,
        instruction: &str,
        mood: Mood,
    ) -> Result<TransformedResult, TransformError> {
        let mut failures = Vec::with_capacity(self.chain.len());

        for provider in &self.chain {
            if !provider.is_configured() {
                log::info!("{}: not configured, skipping", provider.name());
                failures.push(TransformError::not_configured(provider.name()));
                continue;
            }

            log::info!("{}: transforming ({instruction})", provider.name());
            match provider.transform(image, instruction, mood).await {
                Ok(result) => {
                    log::info!("{}: produced {}", provider.name(), result.image.describe());
                    return Ok(result);
                }
                Err(e) => {
                    log::warn!("{}: {e}", provider.name());
                    failures.push(e);
                }
            }
        }

        Err(TransformError::AllProvidersExhausted { failures })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
