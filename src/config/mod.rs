//! Configuration module for SoundSnapper.
//!
//! Provides `AppConfig` (top-level settings), one sub-config per provider
//! family, `AppPaths` for the platform config directory, and TOML
//! persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AudioConfig, ElevenLabsConfig, FalConfig, GeminiConfig, ProviderKind,
    TransformConfig, UiConfig,
};
