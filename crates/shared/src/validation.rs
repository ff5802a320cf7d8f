use crate::constants::*;

pub fn validate_room_name(name: &str) -> Result<(), String> {
    if name.trim().chars().count() > MAX_ROOM_NAME_LENGTH {
        return Err(format!(
            "Room name must be at most {} characters",
            MAX_ROOM_NAME_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_message_content(body: &str) -> Result<(), String> {
    if body.trim().is_empty() {
        return Err("Message content is required".into());
    }
    if body.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_attachment_ref(body: &str) -> Result<(), String> {
    if body.len() > MAX_MESSAGE_LENGTH {
        return Err("Attachment reference too long".into());
    }
    Ok(())
}

pub fn validate_mentions(mentions: &[String]) -> Result<(), String> {
    if mentions.len() > MAX_MENTIONS {
        return Err(format!("At most {} mentions are allowed", MAX_MENTIONS));
    }
    if mentions.iter().any(|m| m.trim().is_empty()) {
        return Err("Mentions must reference a user id".into());
    }
    Ok(())
}

pub fn validate_device_token(token: &str) -> Result<(), String> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err("Device token is required".into());
    }
    if trimmed.len() > MAX_DEVICE_TOKEN_LENGTH {
        return Err("Device token is too long".into());
    }
    Ok(())
}

pub fn validate_reaction_slot(slot: usize) -> Result<(), String> {
    if slot >= REACTION_SLOTS {
        return Err(format!("Reaction slot must be below {}", REACTION_SLOTS));
    }
    Ok(())
}
