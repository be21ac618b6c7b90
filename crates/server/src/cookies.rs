//! Cookie names, `Set-Cookie` builders, and `Cookie` header parsing.

use axum::http::{HeaderMap, HeaderValue, header};

use salesdesk_api::service::SESSION_COOKIE_MAX_AGE_SECS;

pub const SESSION_COOKIE: &str = "session";
pub const STATE_COOKIE: &str = "google_oauth_state";
pub const VERIFIER_COOKIE: &str = "google_code_verifier";

/// The OAuth round trip must finish within this window.
const OAUTH_COOKIE_MAX_AGE_SECS: u64 = 600;

/// Cookie attributes derived from whether the dashboard is served over https.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub secure: bool,
}

impl CookieSettings {
    fn secure_attr(&self) -> &'static str {
        if self.secure { "; Secure" } else { "" }
    }

    /// Session cookies must survive the cross-site hop back from the provider
    /// when deployed behind https.
    fn same_site(&self) -> &'static str {
        if self.secure { "None" } else { "Lax" }
    }

    pub fn session(&self, token: &str) -> String {
        format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite={}; Max-Age={SESSION_COOKIE_MAX_AGE_SECS}{}",
            self.same_site(),
            self.secure_attr()
        )
    }

    /// Short-lived cookie holding OAuth state or the PKCE verifier.
    pub fn oauth(&self, name: &str, value: &str) -> String {
        format!(
            "{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={OAUTH_COOKIE_MAX_AGE_SECS}{}",
            self.secure_attr()
        )
    }

    pub fn clear(&self, name: &str) -> String {
        format!(
            "{name}=; Path=/; HttpOnly; SameSite={}; Max-Age=0{}",
            self.same_site(),
            self.secure_attr()
        )
    }
}

/// Read a cookie value from every `Cookie` header on the request.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Append `Set-Cookie` headers. Cookie values are hex/base64url so they are
/// always valid header values; anything else is skipped with a warning.
pub fn append_set_cookies<I>(headers: &mut HeaderMap, cookies: I)
where
    I: IntoIterator<Item = String>,
{
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("dropping invalid Set-Cookie value: {e}"),
        }
    }
}
