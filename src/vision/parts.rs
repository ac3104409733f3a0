//! Scanning an ordered multimodal response for one image and one scene.

use crate::media::ImageData;
use crate::vision::client::ContentPart;
use crate::vision::scene::{parse_scene_sound, SceneSound};

/// What [`scan_parts`] found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScannedParts {
    /// First image part.
    pub image: Option<ImageData>,
    /// First text part that is a valid [`SceneSound`].
    pub scene: Option<SceneSound>,
}

/// Pick the first image part and the first text part that parses as a
/// [`SceneSound`].  Later images are ignored; malformed text parts are
/// logged and skipped.
pub fn scan_parts(parts: Vec<ContentPart>) -> ScannedParts {
    let mut found = ScannedParts::default();

    for part in parts {
        match part {
            ContentPart::Image(data) => {
                if found.image.is_none() {
                    found.image = Some(data);
                } else {
                    log::debug!("multimodal: ignoring extra image part");
                }
            }
            ContentPart::Text(text) => {
                if found.scene.is_some() {
                    continue;
                }
                match parse_scene_sound(&text) {
                    Ok(scene) => found.scene = Some(scene),
                    Err(e) => log::warn!("multimodal: skipping text part: {e}"),
                }
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tag: u8) -> ContentPart {
        ContentPart::Image(ImageData::new("image/png", vec![tag]))
    }

    fn text(s: &str) -> ContentPart {
        ContentPart::Text(s.to_string())
    }

    const FOREST: &str =
        r#"{"sceneDescription":"An anime forest.","ambience":"chimes","soundEffect":"a sparkle"}"#;
    const CITY: &str =
        r#"{"sceneDescription":"A neon city.","ambience":"synth hum","soundEffect":"a laser"}"#;

    #[test]
    fn first_image_and_first_valid_scene_win() {
        let scanned = scan_parts(vec![
            text("Here is your image!"),
            image(1),
            text(r#"{"sceneDescription":"broken""#),
            text(&format!("```json\n{FOREST}\n```")),
            image(2),
            text(CITY),
        ]);

        assert_eq!(scanned.image.unwrap().bytes, vec![1]);
        assert_eq!(scanned.scene.unwrap().ambience, "chimes");
    }

    #[test]
    fn incomplete_json_is_skipped() {
        let scanned = scan_parts(vec![
            text(r#"{"sceneDescription":"x","ambience":"y"}"#),
            text(CITY),
        ]);
        assert!(scanned.image.is_none());
        assert_eq!(scanned.scene.unwrap().sound_effect, "a laser");
    }

    #[test]
    fn nothing_usable() {
        assert_eq!(scan_parts(vec![text("sorry")]), ScannedParts::default());
        assert_eq!(scan_parts(Vec::new()), ScannedParts::default());
    }
}
