use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Context;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{request::Parts, HeaderMap, HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use stacks_http::{found, AppError};
use stacks_kernel::settings::AuthSettings;

use crate::policy::Policy;
use crate::principal::Principal;

/// Resolves the caller of each request. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Authenticator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    policy: Policy,
    user_header: HeaderName,
    login_url: Arc<str>,
}

impl Authenticator {
    pub fn new(policy: Policy, user_header: &str, login_url: &str) -> anyhow::Result<Self> {
        let user_header = HeaderName::from_bytes(user_header.as_bytes())
            .with_context(|| format!("invalid identity header name '{user_header}'"))?;
        Ok(Self {
            inner: Arc::new(Inner {
                policy,
                user_header,
                login_url: Arc::from(login_url),
            }),
        })
    }

    pub fn from_settings(settings: &AuthSettings) -> anyhow::Result<Self> {
        let policy = Policy::load(&settings.policy_path)
            .with_context(|| format!("failed to load policy '{}'", settings.policy_path))?;
        Self::new(policy, &settings.user_header, &settings.login_url)
    }

    /// The caller named by the identity header, if any.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        let username = headers
            .get(&self.inner.user_header)?
            .to_str()
            .ok()?
            .trim();
        if username.is_empty() {
            return None;
        }
        Some(Principal {
            username: username.to_string(),
            capabilities: self.inner.policy.capabilities_of(username),
        })
    }
}

/// Per-request authentication outcome, stored in request extensions.
#[derive(Debug, Clone)]
struct Session {
    principal: Option<Principal>,
    login_url: Arc<str>,
}

/// Middleware attaching the resolved caller to every request.
///
/// Install with `axum::middleware::from_fn_with_state(authenticator, authenticate)`.
pub async fn authenticate(
    State(authenticator): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = authenticator.resolve(request.headers());
    if let Some(principal) = &principal {
        tracing::debug!(user = %principal.username, "caller authenticated");
    }
    request.extensions_mut().insert(Session {
        principal,
        login_url: authenticator.inner.login_url.clone(),
    });
    next.run(request).await
}

/// Why a guard refused a request.
#[derive(Debug)]
pub enum AuthRejection {
    /// No caller: send them to log in and come back
    LoginRequired { login_url: String, next: String },
    /// Caller known but lacking a capability
    Forbidden(AppError),
    /// The `authenticate` middleware is not installed on this route
    NotConfigured,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::LoginRequired { login_url, next } => {
                found(format!("{login_url}?next={next}"))
            }
            AuthRejection::Forbidden(err) => err.into_response(),
            AuthRejection::NotConfigured => {
                AppError::Internal(anyhow::anyhow!("authentication layer is not installed"))
                    .into_response()
            }
        }
    }
}

fn session(parts: &Parts) -> Result<&Session, AuthRejection> {
    parts
        .extensions
        .get::<Session>()
        .ok_or(AuthRejection::NotConfigured)
}

/// Characters kept verbatim in the `next` parameter; everything else is escaped.
const NEXT_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Path and query the caller asked for, before any router nesting stripped
/// its prefix, escaped for use as the `next` parameter.
fn requested_path(parts: &Parts) -> String {
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or(&parts.uri);
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    utf8_percent_encode(target, NEXT_ESCAPES).to_string()
}

/// Guard: the request has a caller. Anonymous requests are redirected to the login URL.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = session(parts)?;
        match &session.principal {
            Some(principal) => Ok(Self(principal.clone())),
            None => Err(AuthRejection::LoginRequired {
                login_url: session.login_url.to_string(),
                next: requested_path(parts),
            }),
        }
    }
}

/// The caller, if there is one. Never rejects once the middleware is installed.
#[derive(Debug, Clone)]
pub struct MaybeAuthenticated(pub Option<Principal>);

impl<S> FromRequestParts<S> for MaybeAuthenticated
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session(parts)?.principal.clone()))
    }
}

/// Marker naming the capability a [`Permission`] guard demands.
pub trait RequiredCapability {
    const CAPABILITY: &'static str;
}

/// Guard: the caller holds `P::CAPABILITY`.
///
/// Runs before the handler body, so a caller lacking the capability learns
/// nothing about the records behind the route.
#[derive(Debug, Clone)]
pub struct Permission<P> {
    principal: Principal,
    _capability: PhantomData<fn() -> P>,
}

impl<P> Permission<P> {
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn into_principal(self) -> Principal {
        self.principal
    }
}

impl<S, P> FromRequestParts<S> for Permission<P>
where
    S: Send + Sync,
    P: RequiredCapability,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(principal) = Authenticated::from_request_parts(parts, state).await?;
        principal
            .require(P::CAPABILITY)
            .map_err(AuthRejection::Forbidden)?;
        Ok(Self {
            principal,
            _capability: PhantomData,
        })
    }
}
