use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use multilevel_core::{Error, ErrorKind};
use serde::Serialize;
use tokio::task::JoinError;
use tracing::{error, warn};

/// Error type for HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed body or form, caught before reaching a client.
    BadRequest(String),
    NotFound(String),
    Core(Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: Option<String>,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Core(Error::Io(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(err.body_text())
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        Self::Core(Error::Io(std::io::Error::other(err)))
    }
}

impl ApiError {
    fn parts(self) -> (StatusCode, ErrorBody) {
        let body = |error: &str, detail: Option<String>| ErrorBody { error: error.to_string(), detail };

        match self {
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, body("invalid request", Some(detail))),
            Self::NotFound(detail) => (StatusCode::NOT_FOUND, body("not found", Some(detail))),
            Self::Core(err) => match err.kind() {
                ErrorKind::Validation => {
                    (StatusCode::BAD_REQUEST, body("invalid request", Some(inner_message(err))))
                }
                ErrorKind::Configuration => {
                    error!(error = %err, "server is missing configuration");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        body("server configuration error", Some(inner_message(err))),
                    )
                }
                ErrorKind::RemoteService => {
                    warn!(error = %err, "upstream provider failed");
                    (StatusCode::BAD_GATEWAY, body("remote service error", Some(err.to_string())))
                }
                ErrorKind::Unexpected => {
                    error!(error = %err, "internal server error");
                    (StatusCode::INTERNAL_SERVER_ERROR, body("internal server error", None))
                }
            },
        }
    }
}

fn inner_message(err: Error) -> String {
    match err {
        Error::Validation(msg) | Error::Configuration(msg) => msg,
        other => other.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.parts();
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (ApiError::from(Error::Validation("bad size".into())), StatusCode::BAD_REQUEST),
            (ApiError::from(Error::Configuration("no key".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ApiError::from(Error::RemoteService {
                    provider: "openweather",
                    status: Some(404),
                    message: "city not found".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::from(std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::NotFound("image not found".into()), StatusCode::NOT_FOUND),
        ];

        for (err, status) in cases {
            assert_eq!(err.parts().0, status);
        }
    }

    #[test]
    fn unexpected_errors_hide_details() {
        let (_, body) =
            ApiError::from(std::io::Error::other("/secret/path")).parts();

        assert_eq!(body.error, "internal server error");
        assert_eq!(body.detail, None);
    }

    #[tokio::test]
    async fn failed_task_is_an_internal_error() {
        let task = tokio::spawn(std::future::pending::<()>());
        task.abort();
        let join_error = task.await.unwrap_err();

        let (status, body) = ApiError::from(join_error).parts();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.detail, None);
    }

    #[test]
    fn remote_errors_carry_provider_detail() {
        let (_, body) = ApiError::from(Error::RemoteService {
            provider: "openweather",
            status: Some(401),
            message: "Invalid API key".into(),
        })
        .parts();

        assert_eq!(body.detail.as_deref(), Some("openweather request failed: Invalid API key"));
    }
}
