//! [`SceneSound`]: the scene/ambience/effect triple, and [`Mood`].
//!
//! Model output is validated strictly: the text (optionally wrapped in a
//! Markdown code fence) must be one JSON object with three non-empty string
//! fields.  Anything else is a [`SceneError`], never a partial value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Mood
// ---------------------------------------------------------------------------

/// Style the generated sounds should follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mood {
    #[default]
    Real,
    Dreamy,
    #[serde(rename = "Sci-Fi")]
    SciFi,
    Cartoon,
}

impl Mood {
    pub const ALL: [Mood; 4] = [Mood::Real, Mood::Dreamy, Mood::SciFi, Mood::Cartoon];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Real => "Real",
            Mood::Dreamy => "Dreamy",
            Mood::SciFi => "Sci-Fi",
            Mood::Cartoon => "Cartoon",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    /// Case-insensitive; `scifi` and `sci_fi` are accepted for `Sci-Fi`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "real" => Ok(Mood::Real),
            "dreamy" => Ok(Mood::Dreamy),
            "scifi" => Ok(Mood::SciFi),
            "cartoon" => Ok(Mood::Cartoon),
            _ => Err(format!("unknown mood '{s}' (expected Real, Dreamy, Sci-Fi or Cartoon)")),
        }
    }
}

// ---------------------------------------------------------------------------
// SceneSound
// ---------------------------------------------------------------------------

/// What the scene is and what it should sound like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSound {
    /// One narrative sentence, spoken to the user.
    pub scene_description: String,
    /// Prompt for the looping background track.
    pub ambience: String,
    /// Prompt for the one-shot primary effect.
    pub sound_effect: String,
}

impl SceneSound {
    /// Substituted whenever analysis fails.
    pub fn fallback() -> Self {
        Self {
            scene_description:
                "I see something interesting. Let's listen to what this scene sounds like."
                    .into(),
            ambience: "Gentle ambient background with soft environmental sounds".into(),
            sound_effect: "A subtle, atmospheric sound effect that matches the scene".into(),
        }
    }
}

impl Default for SceneSound {
    fn default() -> Self {
        Self::fallback()
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Why a model response was not a valid [`SceneSound`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("response is not a JSON object: {0}")]
    Json(String),

    #[error("required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("required field '{0}' is empty")]
    EmptyField(&'static str),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScene {
    scene_description: Option<String>,
    ambience: Option<String>,
    sound_effect: Option<String>,
}

/// Remove an incidental Markdown code fence around a model response.
///
/// ```
/// use sound_snapper::vision::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
/// assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
/// ```
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
        body = body.strip_suffix("```").unwrap_or(body);
    }
    body.trim()
}

/// Validate model output against the [`SceneSound`] shape.
pub fn parse_scene_sound(text: &str) -> Result<SceneSound, SceneError> {
    let body = strip_code_fence(text);
    let raw: RawScene =
        serde_json::from_str(body).map_err(|e| SceneError::Json(e.to_string()))?;

    Ok(SceneSound {
        scene_description: required(raw.scene_description, "sceneDescription")?,
        ambience: required(raw.ambience, "ambience")?,
        sound_effect: required(raw.sound_effect, "soundEffect")?,
    })
}

fn required(value: Option<String>, name: &'static str) -> Result<String, SceneError> {
    let value = value.ok_or(SceneError::MissingField(name))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SceneError::EmptyField(name));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"sceneDescription":"A busy street.","ambience":"city hum","soundEffect":"a car horn"}"#;

    #[test]
    fn parses_plain_json() {
        let scene = parse_scene_sound(VALID).unwrap();
        assert_eq!(scene.scene_description, "A busy street.");
        assert_eq!(scene.ambience, "city hum");
        assert_eq!(scene.sound_effect, "a car horn");
    }

    #[test]
    fn parses_fenced_json() {
        let fenced = format!("```json\n{VALID}\n```");
        assert_eq!(parse_scene_sound(&fenced).unwrap().ambience, "city hum");

        let bare_fence = format!("```\n{VALID}\n```");
        assert_eq!(parse_scene_sound(&bare_fence).unwrap().ambience, "city hum");
    }

    #[test]
    fn missing_sound_effect_is_rejected() {
        let text = r#"{"sceneDescription":"A beach.","ambience":"waves"}"#;
        assert_eq!(
            parse_scene_sound(text),
            Err(SceneError::MissingField("soundEffect"))
        );
    }

    #[test]
    fn empty_field_is_rejected() {
        let text = r#"{"sceneDescription":"  ","ambience":"waves","soundEffect":"gull"}"#;
        assert_eq!(
            parse_scene_sound(text),
            Err(SceneError::EmptyField("sceneDescription"))
        );
    }

    #[test]
    fn non_string_field_is_a_json_error() {
        let text = r#"{"sceneDescription":"x","ambience":3,"soundEffect":"y"}"#;
        assert!(matches!(parse_scene_sound(text), Err(SceneError::Json(_))));
    }

    #[test]
    fn prose_is_a_json_error() {
        assert!(matches!(
            parse_scene_sound("Sure! Here is your scene."),
            Err(SceneError::Json(_))
        ));
    }

    #[test]
    fn fallback_is_fully_populated() {
        let fallback = SceneSound::fallback();
        assert!(!fallback.scene_description.is_empty());
        assert!(!fallback.ambience.is_empty());
        assert!(!fallback.sound_effect.is_empty());
    }

    #[test]
    fn scene_serializes_camel_case() {
        let json = serde_json::to_value(SceneSound::fallback()).unwrap();
        assert!(json.get("sceneDescription").is_some());
        assert!(json.get("soundEffect").is_some());
    }

    #[test]
    fn mood_parsing() {
        assert_eq!("real".parse::<Mood>(), Ok(Mood::Real));
        assert_eq!("Sci-Fi".parse::<Mood>(), Ok(Mood::SciFi));
        assert_eq!("scifi".parse::<Mood>(), Ok(Mood::SciFi));
        assert_eq!("CARTOON".parse::<Mood>(), Ok(Mood::Cartoon));
        assert!("noir".parse::<Mood>().is_err());
    }

    #[test]
    fn mood_serde_uses_display_names() {
        assert_eq!(serde_json::to_string(&Mood::SciFi).unwrap(), "\"Sci-Fi\"");
        for mood in Mood::ALL {
            assert_eq!(mood.to_string().parse::<Mood>(), Ok(mood));
        }
    }
}
