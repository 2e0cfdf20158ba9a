use axum::http::HeaderMap;
use trolley::domain::ConflictResolution;

/// Header carrying the cart identity for cart-scoped routes.
pub const CART_ID_HEADER: &str = "x-cart-id";

/// Optional header identifying a signed-in user. Absent means guest.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug)]
pub enum ValidationError {
    MissingCartId,
    BlankCartId,
    UnknownResolution(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingCartId => {
                write!(f, "X-Cart-ID header is required")
            }
            ValidationError::BlankCartId => {
                write!(f, "X-Cart-ID header must not be blank")
            }
            ValidationError::UnknownResolution(value) => {
                write!(
                    f,
                    "conflict_resolution must be 'sum' or 'last-write-wins', got '{}'",
                    value
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Extracts the cart id from the request headers.
pub fn require_cart_id(headers: &HeaderMap) -> Result<String, ValidationError> {
    let value = headers
        .get(CART_ID_HEADER)
        .ok_or(ValidationError::MissingCartId)?;

    let cart_id = value
        .to_str()
        .map_err(|_| ValidationError::BlankCartId)?
        .trim();

    if cart_id.is_empty() {
        return Err(ValidationError::BlankCartId);
    }

    Ok(cart_id.to_string())
}

/// Extracts the user identity, if any. A blank header reads as guest.
pub fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Parses the merge conflict resolution, defaulting when absent.
pub fn parse_resolution(value: Option<&str>) -> Result<ConflictResolution, ValidationError> {
    match value {
        None => Ok(ConflictResolution::default()),
        Some(raw) => raw
            .parse()
            .map_err(|_| ValidationError::UnknownResolution(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    fn headers_with(name: &str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    #[test]
    fn test_require_cart_id_reads_header_case_insensitively() {
        let headers = headers_with("X-Cart-ID", "guest-abc123");

        assert_eq!(require_cart_id(&headers).unwrap(), "guest-abc123");
    }

    #[test]
    fn test_require_cart_id_trims_whitespace() {
        let headers = headers_with(CART_ID_HEADER, "  user-42  ");

        assert_eq!(require_cart_id(&headers).unwrap(), "user-42");
    }

    #[test]
    fn test_require_cart_id_rejects_missing_and_blank() {
        let err = require_cart_id(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingCartId));

        let err = require_cart_id(&headers_with(CART_ID_HEADER, "   ")).unwrap_err();
        assert!(matches!(err, ValidationError::BlankCartId));
    }

    #[test]
    fn test_user_id_blank_means_guest() {
        assert_eq!(user_id(&HeaderMap::new()), None);
        assert_eq!(user_id(&headers_with(USER_ID_HEADER, "  ")), None);
        assert_eq!(
            user_id(&headers_with(USER_ID_HEADER, "user-42")),
            Some("user-42".to_string())
        );
    }

    #[test]
    fn test_parse_resolution_defaults_to_sum() {
        assert_eq!(parse_resolution(None).unwrap(), ConflictResolution::Sum);
        assert_eq!(
            parse_resolution(Some("last-write-wins")).unwrap(),
            ConflictResolution::LastWriteWins
        );

        let err = parse_resolution(Some("magic")).unwrap_err();
        assert!(err.to_string().contains("'magic'"));
    }
}
