//! 核心错误到 HTTP 状态码的映射
//!
//! 非法输入 → 400，实体缺失 → 404，离线前置条件 → 409，
//! 传输/远端/内部故障 → 500。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use vigil_core::error::CoreError;

/// 统一的 JSON 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

pub struct HttpError(pub CoreError);

impl HttpError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            CoreError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            CoreError::UnsupportedPolicyType { .. } => {
                (StatusCode::BAD_REQUEST, "UNSUPPORTED_POLICY_TYPE")
            }
            CoreError::Serialization { .. } => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            CoreError::UnknownAgent { .. } => (StatusCode::NOT_FOUND, "UNKNOWN_AGENT"),
            CoreError::AgentOffline { .. } => (StatusCode::CONFLICT, "AGENT_OFFLINE"),
            CoreError::DispatchTimeout { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DISPATCH_TIMEOUT")
            }
            CoreError::PolicyRejected { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "POLICY_REJECTED")
            }
            CoreError::Transport { .. }
            | CoreError::Store { .. }
            | CoreError::Config { .. }
            | CoreError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl From<CoreError> for HttpError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::validation("x"), StatusCode::BAD_REQUEST),
            (
                CoreError::unsupported_policy_type("icmp"),
                StatusCode::BAD_REQUEST,
            ),
            (CoreError::not_found("agent a1"), StatusCode::NOT_FOUND),
            (CoreError::unknown_agent("a1"), StatusCode::NOT_FOUND),
            (CoreError::agent_offline("a1"), StatusCode::CONFLICT),
            (
                CoreError::policy_rejected("bad"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                CoreError::transport("down"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(HttpError(err).status_and_code().0, expected);
        }
    }
}
