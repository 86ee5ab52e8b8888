//! `custom_id` construction and parsing
//!
//! A `custom_id` is `org~repo~number`. Text components are
//! `application/x-www-form-urlencoded`, which escapes `~` as `%7E`, so the
//! delimiter can never occur inside a component and every id splits into
//! exactly three parts.

use url::form_urlencoded;

use super::types::ItemRef;

/// Separator between encoded components
pub const DELIMITER: char = '~';

/// Why a `custom_id` could not be built or parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustomIdError {
    #[error("{0} must not be empty")]
    EmptyComponent(&'static str),
    #[error("expected 3 components, found {0}")]
    ComponentCount(usize),
    #[error("component {0:?} is not canonically encoded")]
    NonCanonical(String),
    #[error("item number {0:?} is not a decimal integer")]
    InvalidNumber(String),
}

fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn decode_component(encoded: &str) -> Result<String, CustomIdError> {
    if encoded.is_empty() {
        return Ok(String::new());
    }
    // `parse` treats `&` and `=` as pair separators; those never survive
    // encoding, so any id containing them fails the canonical check below.
    let decoded = form_urlencoded::parse(encoded.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default();
    if encode_component(&decoded) != encoded {
        return Err(CustomIdError::NonCanonical(encoded.to_string()));
    }
    Ok(decoded)
}

/// Build the `custom_id` for an item
pub fn encode(item: &ItemRef) -> Result<String, CustomIdError> {
    if item.organization.is_empty() {
        return Err(CustomIdError::EmptyComponent("organization"));
    }
    if item.repository.is_empty() {
        return Err(CustomIdError::EmptyComponent("repository"));
    }
    Ok(format!(
        "{}{}{}{}{}",
        encode_component(&item.organization),
        DELIMITER,
        encode_component(&item.repository),
        DELIMITER,
        item.number
    ))
}

/// Recover the item identity from a `custom_id`
pub fn decode(custom_id: &str) -> Result<ItemRef, CustomIdError> {
    let parts: Vec<&str> = custom_id.split(DELIMITER).collect();
    let [organization, repository, number] = parts.as_slice() else {
        return Err(CustomIdError::ComponentCount(parts.len()));
    };

    let organization = decode_component(organization)?;
    if organization.is_empty() {
        return Err(CustomIdError::EmptyComponent("organization"));
    }
    let repository = decode_component(repository)?;
    if repository.is_empty() {
        return Err(CustomIdError::EmptyComponent("repository"));
    }

    let parsed = number
        .parse::<u64>()
        .map_err(|_| CustomIdError::InvalidNumber(number.to_string()))?;
    if parsed.to_string() != *number {
        return Err(CustomIdError::InvalidNumber(number.to_string()));
    }

    Ok(ItemRef::new(organization, repository, parsed))
}
