//! Dashboard passthrough: `ANY /api/{*path}` → upstream `api_prefix/path`.
//!
//! The inbound `Authorization: Bearer` header, when present, becomes the
//! session token of the outbound call; otherwise the gateway falls back to the
//! service token.

use crate::{AppState, error::ApiError};
use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{
        HeaderMap,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use partnergate_gateway::{Attachment, Body, Method, MultipartBody, RequestContext};
use serde_json::{Value, json};
use std::{collections::BTreeMap, sync::Arc};

/// Forward one dashboard request and wrap the upstream body in the success envelope.
///
/// # Errors
///
/// Returns [`ApiError`] when the inbound body cannot be decoded or the
/// upstream call fails.
pub async fn forward(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<BTreeMap<String, String>>,
    req: Request,
) -> Result<Json<Value>, ApiError> {
    let method: Method = req.method().as_str().parse().map_err(ApiError::bad_request)?;
    check_path(&path)?;
    let user_token = session_token(req.headers());
    let body = match method {
        Method::Get | Method::Delete => None,
        Method::Post | Method::Put => read_body(req, &state).await?,
    };

    let mut ctx = RequestContext::new(method, state.gateway.endpoint(&path))
        .with_query(query)
        .with_user_token(user_token);
    ctx.body = body;

    let data = state.gateway.execute(ctx).await?;
    Ok(Json(json!({"success": true, "data": data})))
}

/// Keep the forwarded path under the partner prefix: `.`, `..` (also as
/// `%2e`) and empty segments would be resolved by the URL parser and escape it.
fn check_path(path: &str) -> Result<(), ApiError> {
    let escapes = |segment: &str| {
        let segment = segment.to_ascii_lowercase().replace("%2e", ".");
        segment.is_empty() || segment == "." || segment == ".."
    };
    if path.split(['/', '\\']).any(escapes) {
        return Err(ApiError::bad_request(format!("invalid path: {path}")));
    }
    Ok(())
}

/// `Authorization: Bearer <token>` → `Some(token)`; anything else is ignored.
fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

async fn read_body(req: Request, state: &Arc<AppState>) -> Result<Option<Body>, ApiError> {
    let is_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?;
        return Ok(Some(read_multipart(multipart).await?.into()));
    }

    let bytes = Bytes::from_request(req, state)
        .await
        .map_err(|e| ApiError::bad_request(format!("unreadable body: {e}")))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let json: Value = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::bad_request(format!("malformed JSON body: {e}")))?;
    Ok(Some(json.into()))
}

/// Re-encode an inbound form: parts with a file name become attachments.
async fn read_multipart(mut multipart: Multipart) -> Result<MultipartBody, ApiError> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        ApiError::bad_request(format!("malformed multipart body: {e}"))
    };

    let mut form = MultipartBody::new();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(malformed)?;

        form = match file_name {
            Some(file_name) => {
                let mut attachment = Attachment::new(file_name, data.to_vec());
                if let Some(ct) = content_type {
                    attachment = attachment.with_content_type(ct);
                }
                form.file(name, attachment)
            }
            None => form.text(name, String::from_utf8_lossy(&data).into_owned()),
        };
    }
    Ok(form)
}
