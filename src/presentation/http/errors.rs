use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};

use crate::bootstrap::context::CompositionContext;

const ERROR_VIEW: &str = "error";

/// Error surface for route handlers. Converting into a response records the
/// detail as an extension; the terminal renderer turns it into the error view.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Message(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
    pub detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let detail = ErrorDetail {
            message: self.to_string(),
            detail: format!("{self:?}"),
        };
        let mut response = self.status().into_response();
        response.extensions_mut().insert(detail);
        response
    }
}

/// Catch-all terminal handler for requests nothing else claimed.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

/// Terminal error renderer, installed as the outermost layer. Responses that
/// carry an [`ErrorDetail`] are re-rendered through the `error` view.
pub async fn render_errors(
    State(ctx): State<CompositionContext>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let Some(detail) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };
    render_error(&ctx, response.status(), &detail)
}

/// Renders the `error` view with `{{message}}`/`{{error}}` filled in. Internal
/// detail stays hidden unless the environment is development-labeled. Falls
/// back to a plain-text body when no error view exists.
pub fn render_error(ctx: &CompositionContext, status: StatusCode, detail: &ErrorDetail) -> Response {
    let error_body = if ctx.is_development() {
        detail.detail.as_str()
    } else {
        ""
    };
    let located = ctx.views().locate(ERROR_VIEW).ok().flatten();
    if let Some(path) = located {
        if let Ok(template) = std::fs::read_to_string(&path) {
            let html = template
                .replace("{{ message }}", &detail.message)
                .replace("{{message}}", &detail.message)
                .replace("{{ error }}", error_body)
                .replace("{{error}}", error_body);
            return (status, Html(html)).into_response();
        }
    }
    (status, detail.message.clone()).into_response()
}
