//! Error taxonomy for the aggregation core and the public gateway.
//!
//! Every gateway-facing error renders as the uniform `{success: false,
//! error}` JSON shape with the status code carried by the variant. Upstream
//! failures are surfaced verbatim and never retried inside the core; a
//! failing credential fails the whole batch.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced by the aggregation service and the gateway checks.
///
/// Client-facing messages are kept verbatim from the deployed service so
/// existing consumers see identical bodies.
#[derive(Debug, Error)]
pub enum Error {
    /// Non-ok provider response or a network/timeout failure. The message
    /// is surfaced to the caller as-is.
    #[error("{message}")]
    Upstream { message: String },

    /// No upstream credential configured; fails every request until fixed.
    #[error("UptimeRobot API Key 未配置，请在环境变量中设置 UPTIMEROBOT_API_KEY")]
    Configuration,

    /// Fixed-window rate limit exceeded; recoverable by waiting.
    #[error("请求过于频繁，请稍后再试")]
    RateLimited,

    /// API-key auth enabled but no key was supplied.
    #[error("缺少 API 密钥，请在请求头中添加 X-API-Key")]
    MissingApiKey,

    /// The supplied key is not in the allow-list.
    #[error("无效的 API 密钥")]
    InvalidApiKey,

    /// API-key auth enabled but the server's allow-list is empty.
    #[error("服务器未配置允许的 API 密钥，请联系管理员")]
    NoApiKeysConfigured,

    /// The request's declared origin is not in the CORS allow-list.
    #[error("不允许的源")]
    OriginDenied,
}

impl Error {
    /// Wrap an upstream failure, preserving the provider's message.
    pub fn upstream(message: impl Into<String>) -> Self {
        Error::Upstream {
            message: message.into(),
        }
    }

    /// The HTTP status code this error renders with at the gateway.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Upstream { .. } | Error::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::MissingApiKey | Error::InvalidApiKey | Error::NoApiKeysConfigured => {
                StatusCode::UNAUTHORIZED
            }
            Error::OriginDenied => StatusCode::FORBIDDEN,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::upstream(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::upstream("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(Error::Configuration.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(Error::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(Error::MissingApiKey.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::InvalidApiKey.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::OriginDenied.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_upstream_message_surfaces_verbatim() {
        let err = Error::upstream("api_key not found");
        assert_eq!(err.to_string(), "api_key not found");
    }
}
