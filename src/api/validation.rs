use thiserror::Error;

use super::models::{GenerateBody, PromptUpdate, VariantRef};

const MAX_SLOT_LEN: usize = 128;
const MAX_PROMPT_LEN: usize = 4000;
const MAX_BATCH: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("slot must be 1 to 128 characters")]
    InvalidSlot,
    #[error("filename '{0}' must be a bare file name")]
    InvalidFilename(String),
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("prompt exceeds 4000 characters")]
    PromptTooLong,
    #[error("count must be between 1 and 10")]
    InvalidCount,
}

pub fn validate_variant_ref(body: &VariantRef) -> Result<(), RequestValidationError> {
    validate_slot(&body.slot)?;

    let filename = &body.filename;
    if filename.is_empty() || filename.contains(['/', '\\']) || filename.starts_with('.') {
        return Err(RequestValidationError::InvalidFilename(filename.clone()));
    }

    Ok(())
}

pub fn validate_generate(body: &GenerateBody) -> Result<(), RequestValidationError> {
    validate_slot(&body.slot)?;

    if let Some(prompt) = &body.prompt {
        validate_prompt(prompt)?;
    }

    if let Some(count) = body.count {
        if !(1..=MAX_BATCH).contains(&count) {
            return Err(RequestValidationError::InvalidCount);
        }
    }

    Ok(())
}

pub fn validate_prompt_update(body: &PromptUpdate) -> Result<(), RequestValidationError> {
    validate_slot(&body.slot)?;
    validate_prompt(&body.prompt)
}

fn validate_slot(slot: &str) -> Result<(), RequestValidationError> {
    if slot.trim().is_empty() || slot.len() > MAX_SLOT_LEN {
        return Err(RequestValidationError::InvalidSlot);
    }
    Ok(())
}

fn validate_prompt(prompt: &str) -> Result<(), RequestValidationError> {
    if prompt.trim().is_empty() {
        return Err(RequestValidationError::EmptyPrompt);
    }
    if prompt.chars().count() > MAX_PROMPT_LEN {
        return Err(RequestValidationError::PromptTooLong);
    }
    Ok(())
}
