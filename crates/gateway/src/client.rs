//! The outbound request gateway.

use crate::{Body, GatewayStats, Query, RequestContext, classify::classify};
use arc_swap::ArcSwap;
use partnergate_auth::TokenManager;
use partnergate_config::Config;
use partnergate_types::{ErrorKind, GatewayError, join_url};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

type Result<T> = std::result::Result<T, GatewayError>;

/// Performs authenticated calls against the upstream API.
///
/// Each call reads a fresh configuration snapshot (base URL, timeout), so a
/// hot reload applies to the next call. Dropping a returned future aborts the
/// in-flight request, which is how inbound cancellation propagates.
pub struct RequestGateway {
    http: reqwest::Client,
    config: Arc<ArcSwap<Config>>,
    tokens: Arc<TokenManager>,
    stats: Arc<GatewayStats>,
}

impl RequestGateway {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        config: Arc<ArcSwap<Config>>,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            http,
            config,
            tokens,
            stats: Arc::new(GatewayStats::new()),
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    #[must_use]
    pub fn stats(&self) -> &GatewayStats {
        &self.stats
    }

    /// Prefix `path` with the configured partner API prefix.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.config.load().upstream.api_prefix, path)
    }

    /// # Errors
    ///
    /// Returns a classified [`GatewayError`] on any failure.
    pub async fn get(&self, path: &str, query: Query, user_token: Option<&str>) -> Result<Value> {
        self.execute(
            RequestContext::get(path)
                .with_query(query)
                .with_user_token(user_token),
        )
        .await
    }

    /// POST a JSON or multipart body; the [`Body`] variant selects the encoding.
    ///
    /// # Errors
    ///
    /// Returns a classified [`GatewayError`] on any failure.
    pub async fn post(
        &self,
        path: &str,
        body: impl Into<Body>,
        user_token: Option<&str>,
    ) -> Result<Value> {
        self.execute(
            RequestContext::post(path)
                .with_body(body)
                .with_user_token(user_token),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns a classified [`GatewayError`] on any failure.
    pub async fn put(&self, path: &str, body: Value, user_token: Option<&str>) -> Result<Value> {
        self.execute(
            RequestContext::put(path)
                .with_body(body)
                .with_user_token(user_token),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns a classified [`GatewayError`] on any failure.
    pub async fn delete(&self, path: &str, user_token: Option<&str>) -> Result<Value> {
        self.execute(RequestContext::delete(path).with_user_token(user_token))
            .await
    }

    /// Perform one call and record its outcome.
    ///
    /// Returns the parsed 2xx body as-is (`Value::Null` for an empty body).
    /// No retry is attempted.
    ///
    /// # Errors
    ///
    /// - Non-2xx responses are classified by status (see [`crate::classify`]).
    /// - Timeouts and other transport failures become `ServerError` without a status.
    /// - Service-token renewal failures become `ServerError`.
    /// - A multipart body without an attachment is rejected as `ValidationFailed`.
    pub async fn execute(&self, ctx: RequestContext) -> Result<Value> {
        let method = ctx.method;
        let path = ctx.path.clone();
        let started = Instant::now();

        let result = self.dispatch(ctx).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok((status, _)) => {
                self.stats.record_success(method);
                tracing::info!(%method, %path, status, elapsed_ms, "upstream call succeeded");
            }
            Err(e) => {
                self.stats.record_failure(method, e.kind);
                tracing::error!(
                    %method,
                    %path,
                    status = ?e.status,
                    kind = %e.kind,
                    message = %e.message,
                    elapsed_ms,
                    "upstream call failed"
                );
            }
        }
        result.map(|(_, body)| body)
    }

    async fn dispatch(&self, ctx: RequestContext) -> Result<(u16, Value)> {
        if let Some(Body::Multipart(form)) = &ctx.body
            && !form.has_attachment()
        {
            return Err(GatewayError::new(
                ErrorKind::ValidationFailed,
                None,
                "Validation Error: multipart body has no attachment",
            ));
        }

        let token = self.resolve_token(ctx.user_token.as_deref()).await?;
        let (url, timeout) = {
            let config = self.config.load();
            (
                join_url(&config.upstream.base_url, &ctx.path),
                config.upstream.timeout(),
            )
        };

        let mut builder = self
            .http
            .request(ctx.method.into(), &url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .timeout(timeout);
        if !ctx.query.is_empty() {
            builder = builder.query(&ctx.query);
        }
        builder = match ctx.body {
            Some(Body::Json(json)) => builder.header(CONTENT_TYPE, "application/json").json(&json),
            Some(Body::Multipart(form)) => builder.multipart(form.into_form()?),
            None => builder,
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| transport_error(&e, timeout))?;
        let status = resp.status().as_u16();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| transport_error(&e, timeout))?;

        if !(200..300).contains(&status) {
            return Err(classify(status, &bytes));
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok((status, Value::Null));
        }
        serde_json::from_slice(&bytes)
            .map(|body| (status, body))
            .map_err(|e| {
                GatewayError::new(
                    ErrorKind::ServerError,
                    Some(status),
                    format!("API Error ({status}): invalid JSON response: {e}"),
                )
            })
    }

    /// Session token first; the service token only when none was supplied.
    async fn resolve_token(&self, user_token: Option<&str>) -> Result<String> {
        match user_token.filter(|t| !t.is_empty()) {
            Some(token) => Ok(token.to_string()),
            None => Ok(self.tokens.get_token().await?),
        }
    }
}

fn transport_error(e: &reqwest::Error, timeout: Duration) -> GatewayError {
    if e.is_timeout() {
        GatewayError::transport(format!(
            "Request timed out after {}s",
            timeout.as_secs()
        ))
    } else {
        use std::error::Error as _;

        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        GatewayError::transport(format!("API Error: {message}"))
    }
}
