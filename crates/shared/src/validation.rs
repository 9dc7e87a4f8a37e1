use crate::constants::*;
use crate::models::Attachment;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Message must have text or an attachment")]
    EmptyMessage,
    #[error("Message must be at most {MAX_MESSAGE_LENGTH} characters")]
    MessageTooLong,
    #[error("Attachment must be an embedded {0} data URL")]
    MalformedAttachment(&'static str),
    #[error("Attachment exceeds {MAX_ATTACHMENT_BYTES} bytes")]
    AttachmentTooLarge,
    #[error("Message has no author identity")]
    MissingIdentity,
    #[error("Display name must be at most {MAX_DISPLAY_NAME_LENGTH} characters")]
    DisplayNameTooLong,
    #[error("Emoji is required")]
    InvalidEmoji,
}

/// Placeholder identities that older clients substituted for a missing author.
const PLACEHOLDER_IDENTITIES: [&str; 1] = ["unknown"];

/// Trim and lowercase so "Alice " and "alice" address the same user.
pub fn normalize_user_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn identity_eq(a: &str, b: &str) -> bool {
    normalize_user_key(a) == normalize_user_key(b)
}

pub fn validate_identity(display_name: &str, user_id: &str) -> Result<(), ValidationError> {
    let name = display_name.trim();
    let id = user_id.trim();
    if name.is_empty() || id.is_empty() {
        return Err(ValidationError::MissingIdentity);
    }
    if PLACEHOLDER_IDENTITIES
        .iter()
        .any(|p| name.eq_ignore_ascii_case(p) || id.eq_ignore_ascii_case(p))
    {
        return Err(ValidationError::MissingIdentity);
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(ValidationError::DisplayNameTooLong);
    }
    Ok(())
}

pub fn validate_message_parts(
    body: Option<&str>,
    attachment: Option<&Attachment>,
) -> Result<(), ValidationError> {
    let body = body.map(str::trim).unwrap_or("");
    let attachment = attachment.filter(|a| a.is_present());

    if body.is_empty() && attachment.is_none() {
        return Err(ValidationError::EmptyMessage);
    }
    if body.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::MessageTooLong);
    }
    if let Some(att) = attachment {
        let prefix = att.kind.data_url_prefix().unwrap_or("data:");
        if !att.data.starts_with(prefix) {
            return Err(ValidationError::MalformedAttachment(att.kind.as_str()));
        }
        // base64 inflates by 4/3
        if att.data.len() / 4 * 3 > MAX_ATTACHMENT_BYTES {
            return Err(ValidationError::AttachmentTooLarge);
        }
    }
    Ok(())
}

pub fn validate_emoji(emoji: &str) -> Result<(), ValidationError> {
    let trimmed = emoji.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_EMOJI_LENGTH {
        return Err(ValidationError::InvalidEmoji);
    }
    Ok(())
}
