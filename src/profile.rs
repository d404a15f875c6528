use std::path::Path;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::ValidationError;
use crate::models::ProfileUpdate;

pub const MAX_HOBBIES_CHARS: usize = 50;
pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;
pub const FOCUS_OPTIONS: [&str; 6] = ["探究活動", "部活動", "生徒会", "アルバイト", "資格勉強", "その他"];

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: [u8; 3] = [0xFF, 0xD8, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
}

impl ImageType {
    pub fn mime(self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
        }
    }
}

/// Sniffs the format from magic bytes; file extensions are ignored.
pub fn detect_image(bytes: &[u8]) -> Option<ImageType> {
    if bytes.starts_with(&PNG_SIGNATURE) {
        Some(ImageType::Png)
    } else if bytes.starts_with(&JPEG_SIGNATURE) {
        Some(ImageType::Jpeg)
    } else {
        None
    }
}

pub fn image_data_url(bytes: &[u8]) -> Result<String, ValidationError> {
    let image_type = detect_image(bytes).ok_or_else(|| {
        ValidationError::Rule("profile image must be a JPEG or PNG file".to_string())
    })?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ValidationError::Rule(
            "profile image must be 2MB or smaller".to_string(),
        ));
    }
    Ok(format!("data:{};base64,{}", image_type.mime(), STANDARD.encode(bytes)))
}

pub fn read_image(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(image_data_url(&bytes)?)
}

pub fn check_hobbies(hobbies: &str) -> Result<(), ValidationError> {
    if hobbies.chars().count() > MAX_HOBBIES_CHARS {
        return Err(ValidationError::TooLong {
            field: "hobbies",
            max: MAX_HOBBIES_CHARS,
        });
    }
    Ok(())
}

pub fn check_focus(focus: &[String]) -> Result<(), ValidationError> {
    if focus
        .iter()
        .any(|value| !FOCUS_OPTIONS.contains(&value.as_str()))
    {
        return Err(ValidationError::not_allowed("current focus", &FOCUS_OPTIONS));
    }
    Ok(())
}

/// Validates every supplied field; an empty hobbies string is left out.
pub fn build_update(
    hobbies: Option<String>,
    current_focus: Option<Vec<String>>,
    profile_image: Option<String>,
) -> Result<ProfileUpdate, ValidationError> {
    if let Some(hobbies) = &hobbies {
        check_hobbies(hobbies)?;
    }

    let current_focus = match current_focus {
        Some(mut focus) => {
            check_focus(&focus)?;
            let mut seen = Vec::with_capacity(focus.len());
            focus.retain(|value| {
                if seen.contains(value) {
                    false
                } else {
                    seen.push(value.clone());
                    true
                }
            });
            Some(focus)
        }
        None => None,
    };

    let update = ProfileUpdate {
        profile_image,
        hobbies: hobbies.filter(|value| !value.trim().is_empty()),
        current_focus,
    };
    if update == ProfileUpdate::default() {
        return Err(ValidationError::Rule("nothing to update".to_string()));
    }
    Ok(update)
}
