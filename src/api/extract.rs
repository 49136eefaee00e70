//! Request extractors: gateway identity, session key and validated JSON.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{async_trait, Json};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use super::error::json_error;
use crate::auth::Principal;
use crate::session::SessionKey;
use crate::ShopError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_SUPPLIER_HEADER: &str = "x-user-supplier";
pub const SESSION_HEADER: &str = "x-session-key";

/// Caller identity as asserted by the gateway in front of the service.
pub struct CurrentUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_headers(&parts.headers)
            .map(CurrentUser)
            .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "authentication required"))
    }
}

fn principal_from_headers(headers: &HeaderMap) -> Option<Principal> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty());
    let user_id = Uuid::parse_str(header(USER_ID_HEADER)?).ok()?;
    let email = header(USER_EMAIL_HEADER).map(str::to_string);
    let supplier = header(USER_SUPPLIER_HEADER).is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");
    Some(if supplier { Principal::supplier(user_id, email) } else { Principal::customer(user_id, email) })
}

/// Session key from `x-session-key`.
pub struct Session(pub SessionKey);

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ShopError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_from_headers(&parts.headers)?
            .map(Session)
            .ok_or_else(|| ShopError::validation(format!("missing {SESSION_HEADER} header")))
    }
}

/// Session key when the header is sent. A header that is present but not a
/// valid key is rejected rather than ignored.
pub struct OptionalSession(pub Option<SessionKey>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalSession
where
    S: Send + Sync,
{
    type Rejection = ShopError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_from_headers(&parts.headers).map(OptionalSession)
    }
}

fn session_from_headers(headers: &HeaderMap) -> Result<Option<SessionKey>, ShopError> {
    let Some(value) = headers.get(SESSION_HEADER) else { return Ok(None) };
    let raw = value
        .to_str()
        .map_err(|_| ShopError::validation(format!("{SESSION_HEADER} header is not valid text")))?;
    SessionKey::new(raw).map(Some)
}

/// JSON body that passed `validator` checks.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ShopError::validation(e.body_text()).into_response())?;
        value
            .validate()
            .map_err(|e| ShopError::validation(e.to_string()).into_response())?;
        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_principal_from_headers() {
        let id = Uuid::now_v7();
        let mut headers = HeaderMap::new();
        assert!(principal_from_headers(&headers).is_none());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(principal_from_headers(&headers).is_none());

        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        let customer = principal_from_headers(&headers).unwrap();
        assert_eq!(customer, Principal::customer(id, None));

        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("boss@shop.com"));
        headers.insert(USER_SUPPLIER_HEADER, HeaderValue::from_static("TRUE"));
        let supplier = principal_from_headers(&headers).unwrap();
        assert!(supplier.supplier);
        assert_eq!(supplier.email.as_deref(), Some("boss@shop.com"));
    }

    #[test]
    fn test_session_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_from_headers(&headers).unwrap(), None);

        headers.insert(SESSION_HEADER, HeaderValue::from_static("sess-1"));
        assert_eq!(session_from_headers(&headers).unwrap().as_ref().map(SessionKey::as_str), Some("sess-1"));

        headers.insert(SESSION_HEADER, HeaderValue::from_static("   "));
        assert_eq!(session_from_headers(&headers).unwrap_err().kind(), "validation_error");

        headers.insert(SESSION_HEADER, HeaderValue::from_str(&"k".repeat(129)).unwrap());
        assert_eq!(session_from_headers(&headers).unwrap_err().kind(), "validation_error");

        headers.insert(SESSION_HEADER, HeaderValue::from_bytes(b"caf\xe9").unwrap());
        assert_eq!(session_from_headers(&headers).unwrap_err().kind(), "validation_error");
    }
}
