//! Pure field-level validators.
//!
//! Every other component runs these before mutation; they have no side
//! effects and return a human-readable violation reason on failure.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::value_objects::Money;

/// Minimum title length in characters.
pub const TITLE_MIN: usize = 3;
/// Maximum title length in characters.
pub const TITLE_MAX: usize = 100;
/// Minimum description length in characters.
pub const DESCRIPTION_MIN: usize = 10;
/// Maximum description length in characters.
pub const DESCRIPTION_MAX: usize = 1000;
/// Maximum price in whole currency units.
pub const PRICE_MAX_UNITS: i64 = 1_000_000;
/// Minimum slot capacity.
pub const CAPACITY_MIN: u32 = 1;
/// Maximum slot capacity.
pub const CAPACITY_MAX: u32 = 100;
/// Maximum notes length in characters.
pub const NOTES_MAX: usize = 500;
/// Minimum slot duration in minutes.
pub const SLOT_DURATION_MIN: i64 = 30;
/// Maximum slot duration in minutes.
pub const SLOT_DURATION_MAX: i64 = 480;

/// Validates a workshop title (3-100 characters).
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    let len = title.chars().count();
    if (TITLE_MIN..=TITLE_MAX).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::TitleLength { len })
    }
}

/// Validates a workshop description (10-1000 characters).
pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    let len = description.chars().count();
    if (DESCRIPTION_MIN..=DESCRIPTION_MAX).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::DescriptionLength { len })
    }
}

/// Validates a price (0 to 1,000,000 currency units).
pub fn validate_price(price: Money) -> Result<(), ValidationError> {
    if price.is_negative() || price > Money::from_units(PRICE_MAX_UNITS) {
        Err(ValidationError::PriceOutOfRange { price })
    } else {
        Ok(())
    }
}

/// Validates a slot capacity (1-100).
pub fn validate_capacity(capacity: u32) -> Result<(), ValidationError> {
    if (CAPACITY_MIN..=CAPACITY_MAX).contains(&capacity) {
        Ok(())
    } else {
        Err(ValidationError::CapacityOutOfRange { capacity })
    }
}

/// Validates a rating (1-5).
pub fn validate_rating(rating: u8) -> Result<(), ValidationError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(ValidationError::RatingOutOfRange { rating })
    }
}

/// Validates a review comment (10-500 characters).
pub fn validate_comment(comment: &str) -> Result<(), ValidationError> {
    let len = comment.chars().count();
    if (10..=500).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::CommentLength { len })
    }
}

/// Validates booking notes (at most 500 characters).
pub fn validate_notes(notes: &str) -> Result<(), ValidationError> {
    let len = notes.chars().count();
    if len <= NOTES_MAX {
        Ok(())
    } else {
        Err(ValidationError::NotesTooLong { len })
    }
}

/// Validates a booking amount (non-negative).
pub fn validate_amount(amount: Money) -> Result<(), ValidationError> {
    if amount.is_negative() {
        Err(ValidationError::AmountNegative { amount })
    } else {
        Ok(())
    }
}

/// Validates a slot window: end after start, duration 30-480 minutes.
pub fn validate_slot_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if end <= start {
        return Err(ValidationError::SlotWindowReversed);
    }
    let minutes = (end - start).num_minutes();
    if !(SLOT_DURATION_MIN..=SLOT_DURATION_MAX).contains(&minutes) {
        return Err(ValidationError::SlotDurationOutOfRange { minutes });
    }
    Ok(())
}
