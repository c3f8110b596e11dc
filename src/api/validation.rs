use regex::Regex;
use std::sync::LazyLock;

use super::ApiError;
use crate::constants::uploads::{ALLOWED_IMAGE_MIME, MAX_IMAGE_BYTES};

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Trims the value and rejects it when nothing remains.
pub fn validate_non_empty<'a>(value: &'a str, message: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(message));
    }
    Ok(trimmed)
}

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let trimmed = email.trim();
    if !EMAIL_SHAPE.is_match(trimmed) {
        return Err(ApiError::validation("Email format is invalid."));
    }
    Ok(trimmed)
}

pub fn validate_min_length(value: &str, min: usize, message: &str) -> Result<(), ApiError> {
    if value.chars().count() < min {
        return Err(ApiError::validation(message));
    }
    Ok(())
}

pub fn validate_match(value: &str, confirmation: &str, message: &str) -> Result<(), ApiError> {
    if value != confirmation {
        return Err(ApiError::validation(message));
    }
    Ok(())
}

/// Checks the declared MIME type and size of an image upload and returns the
/// file extension to store it under.
pub fn validate_image_upload(
    content_type: Option<&str>,
    size: usize,
) -> Result<&'static str, ApiError> {
    let mime = content_type.unwrap_or_default();

    if !ALLOWED_IMAGE_MIME.contains(&mime) {
        return Err(ApiError::validation("Only JPG, PNG, GIF allowed."));
    }

    if size > MAX_IMAGE_BYTES {
        return Err(ApiError::validation("Max file size is 2MB."));
    }

    let extension = match mime {
        "image/png" => "png",
        "image/gif" => "gif",
        _ => "jpg",
    };

    Ok(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_non_empty() {
        assert_eq!(validate_non_empty("  hi  ", "empty").unwrap(), "hi");
        assert!(validate_non_empty("", "empty").is_err());
        assert!(validate_non_empty("   ", "empty").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.co").is_ok());
        assert_eq!(validate_email("  a@b.co  ").unwrap(), "a@b.co");
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a b@c.de").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_validate_min_length() {
        assert!(validate_min_length("123456", 6, "short").is_ok());
        assert!(validate_min_length("12345", 6, "short").is_err());
        assert!(validate_min_length("", 6, "short").is_err());
    }

    #[test]
    fn test_validate_match() {
        assert!(validate_match("secret", "secret", "mismatch").is_ok());
        assert!(validate_match("secret", "Secret", "mismatch").is_err());
    }

    #[test]
    fn test_validate_image_upload() {
        assert_eq!(validate_image_upload(Some("image/png"), 100).unwrap(), "png");
        assert_eq!(validate_image_upload(Some("image/gif"), 100).unwrap(), "gif");
        assert_eq!(
            validate_image_upload(Some("image/jpeg"), MAX_IMAGE_BYTES).unwrap(),
            "jpg"
        );
        assert!(validate_image_upload(Some("text/plain"), 100).is_err());
        assert!(validate_image_upload(None, 100).is_err());
        assert!(validate_image_upload(Some("image/jpeg"), MAX_IMAGE_BYTES + 1).is_err());
    }
}
