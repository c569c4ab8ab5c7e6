use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use hoaxify_lifecycle::Identity;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

/// Resolve the `Authorization` header into an [`Identity`] extension.
///
/// Never rejects: a missing, malformed, revoked or expired token simply
/// yields `Identity::Anonymous` and the handler decides. Only a store
/// failure turns into a 500.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let gate = state.gate.clone();
    let identity: Identity = blocking(move || Ok(gate.resolve(auth_header.as_deref())?)).await?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
