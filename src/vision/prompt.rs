//! Prompt builder for scene analysis, effect regeneration and image
//! transformation.
//!
//! [`PromptBuilder`] produces:
//! * **Analysis** (`analysis_instruction`): system instruction for the
//!   vision model; the image is sent as the only user part.
//! * **Effect** (`effect_prompt`): plain-text request for a fresh effect
//!   prompt consistent with an already established scene.
//! * **Multimodal transform** (`transform_prompt`): asks one model for a
//!   transformed image *and* the scene JSON of the new image.
//! * **Queue transform** (`edit_prompt`): instruction text for the fal
//!   image-edit models.

use serde_json::json;

use crate::vision::scene::Mood;

/// Preset transformation styles offered to the user.
pub const TRANSFORMATION_STYLES: [&str; 5] =
    ["Anime", "Watercolor", "Cyberpunk", "Vintage Film", "Low Poly 3D"];

/// JSON schema of [`SceneSound`](crate::vision::SceneSound) in the Gemini
/// `responseSchema` dialect.
pub fn scene_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "sceneDescription": {
                "type": "STRING",
                "description": "A short, narrative description of the scene to be spoken to the user."
            },
            "ambience": {
                "type": "STRING",
                "description": "A descriptive phrase for a text-to-sound model to generate a background ambient sound."
            },
            "soundEffect": {
                "type": "STRING",
                "description": "A descriptive phrase for a primary sound effect for the scene."
            }
        },
        "required": ["sceneDescription", "ambience", "soundEffect"]
    })
}

/// Builds every prompt the pipeline sends to a generative model.
///
/// # Example
/// ```rust
/// use sound_snapper::vision::{Mood, PromptBuilder};
///
/// let prompt = PromptBuilder::new().analysis_instruction(Mood::SciFi);
/// assert!(prompt.contains("sci-fi style"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// System instruction for the analysis call.
    pub fn analysis_instruction(&self, mood: Mood) -> String {
        let style = mood.as_str().to_lowercase();
        format!(
            "You are an expert sound designer. Analyze the image to understand the environment. \
Act as a creative text-to-sound AI prompter.\n\
First, provide a short, narrative description of the scene in one sentence, as if you are describing it to a user.\n\
Second, provide a single, clear description for a background ambient sound, in a {style} style, \
based on the image. This will be used for a looping audio track.\n\
Third, provide a creative, descriptive prompt for a single, primary sound effect for the scene, \
matching the {style} style, inspired by the image.\n\n\
Ensure your entire output is a single, valid JSON object that strictly follows the provided schema."
        )
    }

    /// Request for one new effect prompt that fits `scene` and `mood`.
    pub fn effect_prompt(&self, scene: &str, mood: Mood) -> String {
        format!(
            "You are a creative sound designer. The scene is: \"{scene}\". The mood is {mood}. \
Generate a new, unique sound effect prompt that would fit this scene. \
Output ONLY the short prompt text, nothing else."
        )
    }

    /// Combined transform + analysis request for the multimodal fallback.
    pub fn transform_prompt(&self, instruction: &str, mood: Mood) -> String {
        let schema = serde_json::to_string_pretty(&scene_schema()).unwrap_or_default();
        format!(
            "First, transform this image {instruction}.\n\
Second, acting as an expert sound designer, analyze the NEW image you are creating. \
The desired mood is {mood}.\n\
Provide a single, valid JSON object that strictly follows this schema:\n\
{schema}\n\
The JSON should be the only text in your response."
        )
    }

    /// Instruction text for the queue image-edit models.
    pub fn edit_prompt(&self, instruction: &str) -> String {
        format!(
            "Transform this image: {instruction}. \
Create a stylized version while maintaining the core elements of the scene."
        )
    }

    /// Instruction text for a preset style.
    pub fn preset_instruction(&self, style: &str) -> String {
        format!("Transform this image in a {style} style")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_instruction_uses_lowercase_mood() {
        let prompt = PromptBuilder::new().analysis_instruction(Mood::Dreamy);
        assert!(prompt.contains("in a dreamy style"));
        assert!(prompt.contains("matching the dreamy style"));
        assert!(prompt.contains("single, valid JSON object"));
    }

    #[test]
    fn effect_prompt_embeds_scene_and_mood() {
        let prompt = PromptBuilder::new().effect_prompt("A quiet forest.", Mood::Cartoon);
        assert!(prompt.contains("\"A quiet forest.\""));
        assert!(prompt.contains("The mood is Cartoon."));
        assert!(prompt.contains("ONLY the short prompt text"));
    }

    #[test]
    fn transform_prompt_embeds_schema() {
        let prompt = PromptBuilder::new()
            .transform_prompt("in a Watercolor style", Mood::SciFi);
        assert!(prompt.starts_with("First, transform this image in a Watercolor style."));
        assert!(prompt.contains("The desired mood is Sci-Fi."));
        assert!(prompt.contains("\"soundEffect\""));
        assert!(prompt.contains("\"required\""));
    }

    #[test]
    fn edit_and_preset_prompts() {
        let builder = PromptBuilder::new();
        assert_eq!(
            builder.preset_instruction("Anime"),
            "Transform this image in a Anime style"
        );
        assert!(builder
            .edit_prompt("make it snowy")
            .starts_with("Transform this image: make it snowy."));
    }

    #[test]
    fn schema_requires_all_three_fields() {
        let schema = scene_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);
    }
}
