//! The [`TransformProvider`] seam every link of the fallback chain implements.

use async_trait::async_trait;

use crate::media::Image;
use crate::transform::error::TransformError;
use crate::vision::{Mood, SceneSound};

/// A successfully transformed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedResult {
    /// The new image, usually a provider-hosted URL.
    pub image: Image,
    /// Name of the provider that produced it.
    pub provider: String,
    /// Scene analysis produced in the same call, if the provider does that.
    pub scene: Option<SceneSound>,
}

/// One image-transformation provider.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn TransformProvider>`.
#[async_trait]
pub trait TransformProvider: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// `false` when the credential is missing; the chain skips the provider.
    fn is_configured(&self) -> bool;

    /// Transform `image` following `instruction`.
    async fn transform(
        &self,
        image: &Image,
        instruction: &str,
        mood: Mood,
    ) -> Result<TransformedResult, TransformError>;
}

// Compile-time assertion: the trait must stay object-safe.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TransformProvider>) {}
};
