//! Session key authentication
//!
//! There are no users, whoever knows the session key gets in. The frontend keeps the key in
//! the [`SESSION_COOKIE`] cookie after a successful login.

use async_graphql::Context;
use async_graphql::ErrorExtensions;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Name of the cookie holding the session key
pub const SESSION_COOKIE: &str = "HejSessionKey";

/// The key to compare the session cookie against
#[derive(Clone)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new<K>(key: K) -> Self
    where
        K: Into<String>,
    {
        Self(key.into())
    }

    /// Does the candidate equal the key? Takes the same time for every candidate of equal length
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

/// Value of the session cookie sent with a request, if any
#[derive(Clone, Debug, Default)]
pub struct SessionCookie(pub Option<String>);

impl SessionCookie {
    pub fn from_jar(jar: &CookieJar) -> Self {
        Self(jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string()))
    }
}

/// Cookie that makes the browser forget the session key
pub fn removal_cookie() -> String {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();

    cookie.to_string()
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication cookie '{}' not set", SESSION_COOKIE)]
    CookieNotSet,

    #[error("wrong session key")]
    WrongSessionKey,
}

impl ErrorExtensions for AuthError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string())
            .extend_with(|_, extensions| extensions.set("code", "UNAUTHENTICATED"))
    }
}

/// Make sure the request carries the right session key
///
/// # Errors
///
/// Will return `Err` when the cookie is missing or holds the wrong key, both with the
/// `UNAUTHENTICATED` code
pub fn authenticate(ctx: &Context<'_>) -> async_graphql::Result<()> {
    let key = ctx.data::<SessionKey>()?;

    let cookie = ctx
        .data_opt::<SessionCookie>()
        .and_then(|cookie| cookie.0.as_deref());

    match cookie {
        None => Err(AuthError::CookieNotSet.extend()),
        Some(value) if key.matches(value) => Ok(()),
        Some(_) => Err(AuthError::WrongSessionKey.extend()),
    }
}
