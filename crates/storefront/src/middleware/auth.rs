//! Caller identity extractors.
//!
//! Credentials are checked by the access gate in front of the storefront.
//! The gate forwards the resolved identity as headers:
//!
//! - `x-user-id` - integer user ID (required)
//! - `x-user-role` - `admin` or `customer` (default: customer)
//! - `x-gateway-token` - shared secret, required when
//!   `STOREFRONT_GATEWAY_SECRET` is configured
//!
//! Missing or malformed headers reject the request with 401. Public routes
//! take [`FromGateway`], which checks only the gateway token.

use axum::{extract::FromRequestParts, http::request::Parts};
use secrecy::ExposeSecret;
use tracing::Span;

use toyshop_core::{Caller, Role, UserId};

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;
use crate::store::Store;

/// Header carrying the acting user's ID.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the acting user's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";
/// Header carrying the gateway's shared secret.
pub const GATEWAY_TOKEN_HEADER: &str = "x-gateway-token";

/// Extractor that requires a resolved caller.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireCaller(caller): RequireCaller) -> impl IntoResponse {
///     format!("Hello, user {}!", caller.user_id)
/// }
/// ```
pub struct RequireCaller(pub Caller);

impl<S: Store> FromRequestParts<AppState<S>> for RequireCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let caller = resolve_caller(parts, state)?;

        Span::current().record("user_id", caller.user_id.as_i32());
        set_sentry_user(&caller.user_id);

        Ok(Self(caller))
    }
}

/// Extractor for public routes: no identity, but the request must still
/// come through the gateway when a gateway secret is configured.
pub struct FromGateway;

impl<S: Store> FromRequestParts<AppState<S>> for FromGateway {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        check_gateway(parts, state)?;
        Ok(Self)
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|h| h.to_str().ok())
}

fn check_gateway<S: Store>(parts: &Parts, state: &AppState<S>) -> Result<(), AppError> {
    if let Some(secret) = &state.config().gateway_secret {
        let token = header(parts, GATEWAY_TOKEN_HEADER).unwrap_or_default();
        if !constant_time_eq(token.as_bytes(), secret.expose_secret().as_bytes()) {
            tracing::warn!("Request without a valid gateway token");
            return Err(AppError::Unauthorized(
                "Not authorized, invalid gateway token".to_string(),
            ));
        }
    }
    Ok(())
}

fn resolve_caller<S: Store>(parts: &Parts, state: &AppState<S>) -> Result<Caller, AppError> {
    check_gateway(parts, state)?;

    let user_id = header(parts, USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no identity".to_string()))?
        .parse::<UserId>()
        .map_err(|_| AppError::Unauthorized("Not authorized, malformed identity".to_string()))?;

    let role = match header(parts, USER_ROLE_HEADER) {
        Some(value) => value
            .parse::<Role>()
            .map_err(|_| AppError::Unauthorized("Not authorized, unknown role".to_string()))?,
        None => Role::Customer,
    };

    Ok(Caller { user_id, role })
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;
    use secrecy::SecretString;

    use super::*;
    use crate::config::StorefrontConfig;
    use crate::store::MemoryStore;

    fn state(secret: Option<&str>) -> AppState<MemoryStore> {
        let config = StorefrontConfig {
            gateway_secret: secret.map(SecretString::from),
            ..StorefrontConfig::default()
        };
        AppState::new(config, MemoryStore::new())
    }

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/cart");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_defaults_to_customer() {
        let caller = resolve_caller(&parts(&[("x-user-id", "7")]), &state(None)).unwrap();
        assert_eq!(caller, Caller::customer(UserId::new(7)));
    }

    #[test]
    fn test_admin_role() {
        let caller = resolve_caller(
            &parts(&[("x-user-id", "1"), ("x-user-role", "admin")]),
            &state(None),
        )
        .unwrap();
        assert!(caller.is_admin());
    }

    #[test]
    fn test_missing_identity_rejected() {
        let err = resolve_caller(&parts(&[]), &state(None)).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_malformed_identity_rejected() {
        let err = resolve_caller(&parts(&[("x-user-id", "abc")]), &state(None)).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_gateway_token_enforced() {
        let state = state(Some("k3Y!9xQ#2mZ@7vB$4nW&8pL*1rT^6sD0"));
        let err = resolve_caller(&parts(&[("x-user-id", "1")]), &state).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let caller = resolve_caller(
            &parts(&[
                ("x-user-id", "1"),
                ("x-gateway-token", "k3Y!9xQ#2mZ@7vB$4nW&8pL*1rT^6sD0"),
            ]),
            &state,
        )
        .unwrap();
        assert_eq!(caller.user_id, UserId::new(1));
    }

    #[test]
    fn test_gateway_check_ignores_identity() {
        assert!(check_gateway(&parts(&[]), &state(None)).is_ok());

        let state = state(Some("k3Y!9xQ#2mZ@7vB$4nW&8pL*1rT^6sD0"));
        assert!(check_gateway(&parts(&[]), &state).is_err());
        assert!(
            check_gateway(
                &parts(&[("x-gateway-token", "k3Y!9xQ#2mZ@7vB$4nW&8pL*1rT^6sD0")]),
                &state
            )
            .is_ok()
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
