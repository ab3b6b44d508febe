//! Request extractors.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, MatchedPath};
use axum::http::request::Parts;

use crate::domain::RequestContext;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the originating client address behind a proxy.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Builds the caller context from `x-user-id`, the first `x-forwarded-for`
/// hop (falling back to the socket peer), and the matched route.
///
/// Every field is optional, so extraction never fails.
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER).map(ToString::to_string);

        let client_address = header(parts, FORWARDED_FOR_HEADER)
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            });

        let endpoint = parts
            .extensions
            .get::<MatchedPath>()
            .map_or_else(|| parts.uri.path().to_string(), |p| p.as_str().to_string());

        Ok(Self {
            user_id,
            client_address,
            endpoint: Some(endpoint),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> RequestContext {
        let (mut parts, ()) = request.into_parts();
        let Ok(ctx) = RequestContext::from_request_parts(&mut parts, &()).await;
        ctx
    }

    #[tokio::test]
    async fn reads_user_and_first_forwarded_hop() {
        let Ok(request) = Request::builder()
            .uri("/api/v1/appointments")
            .header(USER_ID_HEADER, "dr-house")
            .header(FORWARDED_FOR_HEADER, "203.0.113.9, 10.0.0.1")
            .body(())
        else {
            panic!("valid request");
        };
        let ctx = extract(request).await;
        assert_eq!(ctx.user_id.as_deref(), Some("dr-house"));
        assert_eq!(ctx.client_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(ctx.endpoint.as_deref(), Some("/api/v1/appointments"));
    }

    #[tokio::test]
    async fn falls_back_to_peer_address() {
        let Ok(mut request) = Request::builder().uri("/health").body(()) else {
            panic!("valid request");
        };
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 4], 5555))));
        let ctx = extract(request).await;
        assert_eq!(ctx.user_id, None);
        assert_eq!(ctx.client_address.as_deref(), Some("192.0.2.4"));
    }
}
