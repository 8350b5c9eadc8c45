//! Request validation: the `ValidatedJson` extractor and field validators.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::web::error::ApiError;

/// JSON body that has passed its `validator` rules.
///
/// Malformed JSON is a `400`; rule violations are a `422` with per-field
/// messages.
///
/// ```ignore
/// async fn create_team(
///     ValidatedJson(req): ValidatedJson<CreateTeamRequest>,
/// ) -> Result<Json<TeamResponse>, ApiError> {
///     // req.name is 1-100 characters here
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e.body_text())))?;
        value.validate().map_err(ApiError::from_validation_errors)?;
        Ok(ValidatedJson(value))
    }
}

/// Reject control characters, including line breaks. Names are single-line.
pub fn no_control_chars(value: &str) -> Result<(), ValidationError> {
    if value.chars().any(char::is_control) {
        return Err(ValidationError::new("no_control_chars")
            .with_message("Must not contain control characters".into()));
    }
    Ok(())
}

/// Reject values that are blank once trimmed.
pub fn not_empty_trimmed(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_empty_trimmed")
            .with_message("Must not be empty".into()));
    }
    Ok(())
}

/// Drop control characters from a single-line form value.
///
/// Form fields are not run through `validator`, so display names submitted at
/// the gate are cleaned instead of rejected.
pub fn sanitize_string(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}
