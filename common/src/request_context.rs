use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, Request, StatusCode, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    future::Future,
    net::{IpAddr, SocketAddr},
    time::SystemTime,
};
use uuid::Uuid;

/// Who or what last touched a resource, per the ARM `systemData` contract.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum IdentityType {
    User,
    Application,
    ManagedIdentity,
    Key,
}

/// ARM's `systemData` envelope, stamped onto every tracked resource on
/// create and update.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemData {
    pub created_by: Option<String>,
    pub created_by_type: Option<IdentityType>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_by: Option<String>,
    pub last_modified_by_type: Option<IdentityType>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl SystemData {
    pub fn stamp_created(principal: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            created_by: principal.clone(),
            created_by_type: principal.as_ref().map(|_| IdentityType::User),
            created_at: Some(now),
            last_modified_by: principal.clone(),
            last_modified_by_type: principal.map(|_| IdentityType::User),
            last_modified_at: Some(now),
        }
    }

    pub fn stamp_updated(mut self, principal: Option<String>) -> Self {
        self.last_modified_by = principal.clone();
        self.last_modified_by_type = principal.map(|_| IdentityType::User);
        self.last_modified_at = Some(Utc::now());
        self
    }
}

/// Everything about an inbound ARM request worth threading through
/// handlers and middleware, stored per-request in `request.extensions()`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct RequestContext {
    /// Generated for this hop; always echoed back as `x-ms-request-id`.
    pub request_id: Uuid,
    /// ARM's end-to-end correlation id, propagated if the caller supplied one.
    pub correlation_request_id: Uuid,
    /// Caller-supplied `x-ms-client-request-id`, echoed verbatim if `x-ms-return-client-request-id: true`.
    pub client_request_id: Option<String>,
    pub return_client_request_id: bool,
    pub client_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub received_at: SystemTime,
    /// The resolved `{api-version}` query parameter, validated by middleware.
    pub api_version: Option<String>,
}

/// Axum extractor usage: `RequestContextExtractor(ctx): RequestContextExtractor`
pub struct RequestContextExtractor(pub RequestContext);

impl std::ops::Deref for RequestContextExtractor {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for RequestContextExtractor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let ctx = parts.extensions.get::<RequestContext>().cloned();

        async move {
            ctx.map(RequestContextExtractor).ok_or((
                StatusCode::INTERNAL_SERVER_ERROR,
                "RequestContext missing (did you add the middleware?)",
            ))
        }
    }
}

pub mod middleware {
    use super::*;

    /// Builds the `RequestContext` and echoes `x-ms-request-id` /
    /// `x-ms-client-request-id` on the way out. Installed first in the
    /// frontend's layer stack so every later middleware and handler can
    /// rely on the extension being present.
    pub async fn request_context(mut req: Request<Body>, next: Next) -> Response {
        let headers = req.headers();
        let request_id = Uuid::new_v4();
        let correlation_request_id = extract_correlation_request_id(headers);
        let client_request_id = headers
            .get("x-ms-client-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let return_client_request_id = headers
            .get("x-ms-return-client-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let client_ip = extract_client_ip(headers).or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        });
        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let api_version = req
            .uri()
            .query()
            .and_then(|q| {
                url_encoded_param(q, "api-version")
            });

        let ctx = RequestContext {
            request_id,
            correlation_request_id,
            client_request_id: client_request_id.clone(),
            return_client_request_id,
            client_ip,
            user_agent,
            received_at: SystemTime::now(),
            api_version,
        };
        req.extensions_mut().insert(ctx);

        let mut res = next.run(req).await;
        res.headers_mut()
            .insert("x-ms-request-id", request_id.to_string().parse().unwrap());
        if return_client_request_id
            && let Some(id) = client_request_id
            && let Ok(val) = id.parse()
        {
            res.headers_mut().insert("x-ms-client-request-id", val);
        }
        res
    }
}

fn url_encoded_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == key { Some(v.to_string()) } else { None }
    })
}

fn extract_correlation_request_id(headers: &HeaderMap) -> Uuid {
    headers
        .get("x-ms-correlation-request-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .unwrap_or_else(Uuid::new_v4)
}

fn extract_client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    // Prefer first IP in X-Forwarded-For (client, proxy1, proxy2...)
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok())
        && let Some(ip) = xff
            .split(',')
            .map(|s| s.trim())
            .find_map(|s| s.parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    // Some proxies set X-Real-IP
    if let Some(xri) = headers.get("x-real-ip").and_then(|v| v.to_str().ok())
        && let Ok(ip) = xri.trim().parse::<IpAddr>()
    {
        return Some(ip);
    }

    None
}
