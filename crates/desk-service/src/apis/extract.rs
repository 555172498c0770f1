//! Request extractors that fail with the desk error envelope.
//!
//! axum's stock extractors reject with plain-text bodies. These wrappers run
//! them and turn every rejection into an [`APIError`].

use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::{request::Parts, HeaderMap};
use axum::Json;
use desk_types::{APIError, OrderId, Principal, Role, UserId};
use serde::de::DeserializeOwned;

/// Header carrying the authenticated user id, set by the upstream proxy.
pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
/// Header carrying the authenticated role, set by the upstream proxy.
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

/// The principal resolved from trusted request headers.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Principal);

impl<S> FromRequestParts<S> for Authenticated
where
	S: Send + Sync,
{
	type Rejection = APIError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		resolve_principal(&parts.headers).map(Authenticated)
	}
}

fn resolve_principal(headers: &HeaderMap) -> Result<Principal, APIError> {
	let header = |name: &str| {
		headers
			.get(name)
			.and_then(|value| value.to_str().ok())
			.map(str::trim)
			.filter(|value| !value.is_empty())
	};
	let unauthorized = |message: &str| APIError::Unauthorized {
		message: message.to_string(),
	};

	let id = header(PRINCIPAL_ID_HEADER)
		.ok_or_else(|| unauthorized("Missing principal id"))?
		.parse::<UserId>()
		.map_err(|_| unauthorized("Malformed principal id"))?;
	let role = header(PRINCIPAL_ROLE_HEADER)
		.ok_or_else(|| unauthorized("Missing principal role"))?
		.parse::<Role>()
		.map_err(|_| unauthorized("Unknown principal role"))?;

	Ok(Principal { id, role })
}

/// The `{id}` path segment of order routes.
#[derive(Debug, Clone, Copy)]
pub struct OrderPath(pub OrderId);

impl<S> FromRequestParts<S> for OrderPath
where
	S: Send + Sync,
{
	type Rejection = APIError;

	async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
		let Path(raw) = Path::<String>::from_request_parts(parts, state)
			.await
			.map_err(|e| APIError::validation(e.body_text()))?;
		raw.parse::<OrderId>()
			.map(OrderPath)
			.map_err(|_| APIError::validation(format!("Invalid order id '{}'", raw)))
	}
}

/// JSON body whose parse failures surface as `VALIDATION_ERROR`.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
	T: DeserializeOwned,
	S: Send + Sync,
{
	type Rejection = APIError;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		Json::<T>::from_request(req, state)
			.await
			.map(|Json(value)| ApiJson(value))
			.map_err(|e| APIError::validation(e.body_text()))
	}
}
