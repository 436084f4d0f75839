//! Small cookie-building helpers shared by the auth routes.
//!
//! Every cookie this gateway issues is `Secure`, `Path=/`, `SameSite=Strict`;
//! only `HttpOnly` differs (the session cookie is opaque to client script,
//! the CSRF cookie must be readable so client JS can echo it in a header).

use axum_extra::extract::cookie::{Cookie, SameSite};
use std::time::Duration;
use time::Duration as CookieDuration;

pub fn build_cookie(name: impl Into<String>, value: impl Into<String>, max_age: Duration, http_only: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name.into(), value.into());
    cookie.set_path("/");
    cookie.set_http_only(http_only);
    cookie.set_secure(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_max_age(CookieDuration::seconds(max_age.as_secs() as i64));
    cookie
}

/// A cookie that immediately expires, used to clear a previously-set cookie.
pub fn expired_cookie(name: impl Into<String>) -> Cookie<'static> {
    let mut cookie = Cookie::new(name.into(), "");
    cookie.set_path("/");
    cookie.set_max_age(CookieDuration::seconds(0));
    cookie
}
