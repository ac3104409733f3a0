//! Last link of the chain: one generative call that transforms the image and
//! analyzes the result.

use std::sync::Arc;

use async_trait::async_trait;

use crate::media::Image;
use crate::transform::error::TransformError;
use crate::transform::provider::{TransformProvider, TransformedResult};
use crate::vision::{scan_parts, GenAiError, GenerativeModel, Mood, PromptBuilder};

/// [`TransformProvider`] over an image+text [`GenerativeModel`].
///
/// When the answer carries a valid scene description it is returned in
/// [`TransformedResult::scene`] so no second analysis is needed.
pub struct MultimodalProvider {
    name: String,
    model: Arc<dyn GenerativeModel>,
    prompts: PromptBuilder,
}

impl MultimodalProvider {
    pub fn new(name: impl Into<String>, model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            name: name.into(),
            model,
            prompts: PromptBuilder::new(),
        }
    }

    fn map_error(&self, e: GenAiError) -> TransformError {
        let provider = self.name.clone();
        match e {
            GenAiError::MissingApiKey => TransformError::not_configured(provider),
            GenAiError::Http { status, body } => TransformError::ProviderUnavailable {
                provider,
                reason: format!("HTTP {status}: {}", body.trim()),
                status: Some(status),
            },
            GenAiError::Request(message) => TransformError::Network { provider, message },
            GenAiError::Timeout => TransformError::network(provider, "request timed out"),
            GenAiError::Parse(message) => TransformError::SchemaMismatch { provider, message },
            GenAiError::EmptyResponse => TransformError::NoImageInResult { provider },
        }
    }
}

#[async_trait]
impl TransformProvider for MultimodalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.model.is_configured()
    }

    async fn transform(
        &self,
        image: &Image,
        instruction: &str,
        mood: Mood,
    ) -> Result<TransformedResult, TransformError> {
        if !self.model.is_configured() {
            return Err(TransformError::not_configured(&self.name));
        }

        let prompt = self.prompts.transform_prompt(instruction, mood);
        let parts = self
            .model
            .generate_image_and_text(image, &prompt)
            .await
            .map_err(|e| self.map_error(e))?;

        let scanned = scan_parts(parts);
        let data = scanned.image.ok_or_else(|| TransformError::NoImageInResult {
            provider: self.name.clone(),
        })?;
        if scanned.scene.is_none() {
            log::info!("{}: no scene in answer, re-analysis needed", self.name);
        }

        Ok(TransformedResult {
            image: Image::Inline(data),
            provider: self.name.clone(),
            scene: scanned.scene,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
