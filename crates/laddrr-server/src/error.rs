use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use laddrr_core::LaddrrError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Every failure leaves the server as `{ "error": string }` with a status
/// that separates caller mistakes (4xx) from service failures (5xx).
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if let Some(rejection) = self.0.downcast_ref::<JsonRejection>() {
            return rejection.status();
        }
        let Some(e) = self.0.downcast_ref::<LaddrrError>() else {
            return StatusCode::INTERNAL_SERVER_ERROR;
        };
        match e {
            LaddrrError::NotInitialized
            | LaddrrError::UnknownFlow(_)
            | LaddrrError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            LaddrrError::InvalidInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LaddrrError::NotFound { .. } => StatusCode::NOT_FOUND,
            LaddrrError::SurveyClosed(_) => StatusCode::CONFLICT,
            LaddrrError::GenerationFailed { .. } => StatusCode::BAD_GATEWAY,
            LaddrrError::Transport { .. } => StatusCode::SERVICE_UNAVAILABLE,
            LaddrrError::Template(_)
            | LaddrrError::UnsupportedVersion { .. }
            | LaddrrError::Store(_)
            | LaddrrError::Io(_)
            | LaddrrError::Yaml(_)
            | LaddrrError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %format!("{:#}", self.0), "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laddrr_core::error::Violation;

    fn status_of(e: LaddrrError) -> StatusCode {
        AppError(e.into()).into_response().status()
    }

    #[test]
    fn invalid_input_maps_to_422() {
        let e = LaddrrError::InvalidInput {
            flow: "rewriteText".into(),
            violations: vec![Violation {
                path: "textToRewrite".into(),
                reason: "must not be empty".into(),
            }],
        };
        assert_eq!(status_of(e), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn unknown_flow_maps_to_400() {
        assert_eq!(status_of(LaddrrError::UnknownFlow("nope".into())), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let e = LaddrrError::NotFound {
            key: "k".into(),
            id: "x".into(),
        };
        assert_eq!(status_of(e), StatusCode::NOT_FOUND);
    }

    #[test]
    fn survey_closed_maps_to_409() {
        assert_eq!(status_of(LaddrrError::SurveyClosed("s".into())), StatusCode::CONFLICT);
    }

    #[test]
    fn generation_failed_maps_to_502() {
        let e = LaddrrError::GenerationFailed {
            flow: "f".into(),
            reason: "model returned no output".into(),
        };
        assert_eq!(status_of(e), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn transport_maps_to_503() {
        let e = LaddrrError::Transport {
            flow: "f".into(),
            source: "connection refused".into(),
        };
        assert_eq!(status_of(e), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn io_error_maps_to_500() {
        let e = LaddrrError::Io(std::io::Error::other("disk full"));
        assert_eq!(status_of(e), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn foreign_error_maps_to_500() {
        let response = AppError(anyhow::anyhow!("something unexpected")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
