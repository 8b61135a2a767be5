//! Validation helpers for handshake payloads.

use validator::ValidationError;

const MAX_TRIP_ID_LENGTH: usize = 64;

/// Validates that a trip identifier is non-empty, reasonably short, and free
/// of whitespace.
pub fn validate_trip_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_TRIP_ID_LENGTH {
        let mut err = ValidationError::new("trip_id_length");
        err.message = Some(
            format!(
                "Trip id must be between 1 and {MAX_TRIP_ID_LENGTH} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if id.chars().any(|c| c.is_whitespace()) {
        let mut err = ValidationError::new("trip_id_format");
        err.message = Some("Trip id must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a tripmate email is plausibly shaped; membership itself is
/// checked against the trip record, this only rejects garbage handshakes.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let Some((local, domain)) = email.split_once('@') else {
        let mut err = ValidationError::new("email_format");
        err.message = Some("Email must contain a single `@`".into());
        return Err(err);
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        let mut err = ValidationError::new("email_format");
        err.message = Some("Email must have a non-empty local part and domain".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_trip_id_valid() {
        assert!(validate_trip_id("trip-42").is_ok());
        assert!(validate_trip_id("64f1a2b3c4d5e6f708192a3b").is_ok());
    }

    #[test]
    fn test_validate_trip_id_invalid() {
        assert!(validate_trip_id("").is_err()); // empty
        assert!(validate_trip_id("trip 42").is_err()); // whitespace
        assert!(validate_trip_id(&"x".repeat(65)).is_err()); // too long
    }

    #[test]
    fn test_validate_email_valid() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("a.b+c@travel.io").is_ok());
    }

    #[test]
    fn test_validate_email_invalid() {
        assert!(validate_email("").is_err());
        assert!(validate_email("ana").is_err()); // no @
        assert!(validate_email("@example.com").is_err()); // empty local part
        assert!(validate_email("ana@").is_err()); // empty domain
        assert!(validate_email("ana@ex@ample.com").is_err()); // double @
    }
}
