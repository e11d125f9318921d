// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON body extractor that runs `validator` rules before the handler.

use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// A JSON body that deserialized and passed validation.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {}", e.body_text())))?;

        body.validate()
            .map_err(|errors| AppError::BadRequest(describe(&errors)))?;

        Ok(ValidatedJson(body))
    }
}

fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                let msg = error
                    .message
                    .as_deref()
                    .unwrap_or_else(|| error.code.as_ref());
                format!("{field}: {msg}")
            })
        })
        .collect();
    messages.sort();
    format!("Validation failed: {}", messages.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Validate)]
    struct Body {
        #[validate(range(min = 1, max = 100, message = "out of range"))]
        max_slots: u32,
        #[validate(length(min = 1))]
        instructor: String,
    }

    #[test]
    fn test_describe_lists_every_field() {
        let body = Body {
            max_slots: 0,
            instructor: String::new(),
        };
        let errors = body.validate().unwrap_err();
        assert_eq!(
            describe(&errors),
            "Validation failed: instructor: length, max_slots: out of range"
        );
    }
}
