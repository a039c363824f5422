//! Reading and writing session cookies on HTTP headers.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use cookie::time::{Duration, OffsetDateTime};
use cookie::Cookie;

use super::CookieOptions;
use crate::Result;

/// Find the value of the cookie called `name` in the request headers.
///
/// All `Cookie` headers are searched; unparsable pairs are skipped.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|cookie| cookie.ok())
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

/// Build a cookie carrying `value` with the given attributes.
///
/// A positive max age also sets `Expires`, unless that date is out of
/// range; a negative one produces `Max-Age=0` and an `Expires` in 1970 so
/// that the browser drops it.
pub fn new_cookie(name: &str, value: &str, options: &CookieOptions) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), value.to_string()))
        .path(options.path.clone())
        .secure(options.secure)
        .http_only(options.http_only);

    if let Some(domain) = &options.domain {
        builder = builder.domain(domain.clone());
    }

    if options.max_age > 0 {
        let max_age = Duration::seconds(options.max_age);
        builder = builder.max_age(max_age);
        if let Some(expires) = OffsetDateTime::now_utc().checked_add(max_age) {
            builder = builder.expires(expires);
        }
    } else if options.max_age < 0 {
        builder = builder
            .max_age(Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH);
    }

    builder.build()
}

/// Append a `Set-Cookie` header for `cookie`.
pub fn set_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) -> Result<()> {
    let value = HeaderValue::from_str(&cookie.to_string())?;
    headers.append(SET_COOKIE, value);
    Ok(())
}
