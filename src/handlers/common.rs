use crate::errors::ApiError;
use validator::Validate;

/// Validate request input at the handler boundary, before the service
/// layer runs.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input
        .validate()
        .map_err(|e| ApiError::ValidationError(format!("Validation failed: {}", e)))
}
