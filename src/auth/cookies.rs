//! Session cookies: names, attributes, and the add/clear helpers.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const ACCESS_COOKIE_NAME: &str = "accessToken";
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Cookie attributes shared by both session cookies
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_max_age_secs: u64,
    pub refresh_max_age_secs: u64,
}

impl CookiePolicy {
    fn build(&self, name: &'static str, value: String, max_age_secs: u64) -> Cookie<'static> {
        Cookie::build((name, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .path("/")
            .max_age(time::Duration::seconds(max_age_secs as i64))
            .build()
    }

    pub fn access_cookie(&self, token: String) -> Cookie<'static> {
        self.build(ACCESS_COOKIE_NAME, token, self.access_max_age_secs)
    }

    pub fn refresh_cookie(&self, token: String) -> Cookie<'static> {
        self.build(REFRESH_COOKIE_NAME, token, self.refresh_max_age_secs)
    }

    /// Attach a freshly minted access token
    pub fn with_access(&self, jar: CookieJar, token: String) -> CookieJar {
        jar.add(self.access_cookie(token))
    }

    /// Attach both tokens (login)
    pub fn with_session(&self, jar: CookieJar, access: String, refresh: String) -> CookieJar {
        jar.add(self.access_cookie(access))
            .add(self.refresh_cookie(refresh))
    }
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, ""))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .build();
    cookie.make_removal();
    cookie
}

/// Expire both session cookies on the client.
/// Always emits both removals, whether or not the request carried the cookie.
pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.add(removal_cookie(ACCESS_COOKIE_NAME))
        .add(removal_cookie(REFRESH_COOKIE_NAME))
}

/// Read a non-empty cookie value
pub fn get_cookie(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
