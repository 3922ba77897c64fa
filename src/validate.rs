use crate::error::ApiError;

/// Closed-enumeration check for fields like mood or intensity.
pub fn allow_listed(value: &str, allowed: &[&str], field: &str) -> Result<(), ApiError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ApiError::validation(
            field,
            &format!("must be one of: {}", allowed.join(", ")),
        ))
    }
}

pub fn allow_listed_opt(
    value: Option<&str>,
    allowed: &[&str],
    field: &str,
) -> Result<(), ApiError> {
    match value {
        Some(v) => allow_listed(v, allowed, field),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOODS: &[&str] = &["terrible", "bad", "okay", "good", "great"];

    #[test]
    fn accepts_listed_values() {
        assert!(allow_listed("good", MOODS, "mood").is_ok());
        assert!(allow_listed_opt(None, MOODS, "mood").is_ok());
    }

    #[test]
    fn rejects_unlisted_values() {
        let err = allow_listed("ecstatic", MOODS, "mood").unwrap_err();
        match err {
            ApiError::Validation(map) => assert!(map.contains_key("mood")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
