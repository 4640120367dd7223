use crate::error::{ApiError, ApiResult};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Wire wrapper every gateway endpoint answers with.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(rename = "errorCode", default)]
    pub error_code: i64,
    #[serde(rename = "errorMsg", default)]
    pub error_msg: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }

    fn message(&self) -> String {
        match self.error_msg.as_deref() {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => format!("request failed with code {}", self.error_code),
        }
    }

    /// Unwraps the payload, mapping codes in `unauthorized_codes` to
    /// [`ApiError::Unauthorized`] and any other non-zero code to
    /// [`ApiError::Business`].
    pub fn into_result(self, unauthorized_codes: &BTreeSet<i64>) -> ApiResult<Option<T>> {
        if self.is_success() {
            return Ok(self.data);
        }
        let message = self.message();
        if unauthorized_codes.contains(&self.error_code) {
            Err(ApiError::Unauthorized {
                status: None,
                message,
            })
        } else {
            Err(ApiError::Business {
                code: self.error_code,
                message,
            })
        }
    }
}
