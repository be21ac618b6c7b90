//! Generic OAuth2 provider support.
//!
//! Config-driven: the Google sign-in used by the dashboard is just a preset.
//! Any OIDC-compatible provider can be described with an
//! [`OAuthProviderConfig`].
//!
//! This module contains only types, URL builders, and JSON parsing.
//! No HTTP calls or DB access; those live in the server.

use serde::{Deserialize, Serialize};

use crate::ServiceError;

// ── Provider Configuration ──────────────────────────────────────────────────

/// OAuth2 provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthProviderConfig {
    // OAuth2 endpoints
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,

    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Space-separated scopes.
    pub scopes: String,

    /// JSON field mapping from userinfo response to internal fields
    pub field_map: OAuthFieldMap,
}

/// Maps provider-specific JSON field names to our internal fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthFieldMap {
    /// Field containing the user's unique ID: "sub" (OIDC)
    pub id: String,
    /// Field containing the display name: "name"
    pub name: String,
    /// Field containing the email: "email"
    pub email: String,
    /// Field containing the avatar URL: "picture"
    pub avatar: String,
}

/// Normalized user info extracted from a provider's userinfo response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthUserInfo {
    /// Provider-side user ID (as string)
    pub provider_user_id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

// ── URL Builders (pure functions, no HTTP) ──────────────────────────────────

/// Build the authorize URL the browser is redirected to (authorization code + PKCE).
pub fn build_authorize_url(
    config: &OAuthProviderConfig,
    redirect_uri: &str,
    state: &str,
    code_challenge: &str,
) -> String {
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&state={}&scope={}&code_challenge={}&code_challenge_method=S256",
        config.authorize_url,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(state),
        urlencoding::encode(&config.scopes),
        urlencoding::encode(code_challenge),
    )
}

/// Build the token exchange request as `application/x-www-form-urlencoded` pairs.
pub fn build_token_request_form(
    config: &OAuthProviderConfig,
    code: &str,
    redirect_uri: &str,
    code_verifier: &str,
) -> Vec<(String, String)> {
    vec![
        ("client_id".into(), config.client_id.clone()),
        ("client_secret".into(), config.client_secret.clone()),
        ("code".into(), code.to_string()),
        ("code_verifier".into(), code_verifier.to_string()),
        ("grant_type".into(), "authorization_code".into()),
        ("redirect_uri".into(), redirect_uri.to_string()),
    ]
}

/// Build the token exchange request as an x-www-form-urlencoded string.
pub fn build_token_request_form_encoded(
    config: &OAuthProviderConfig,
    code: &str,
    redirect_uri: &str,
    code_verifier: &str,
) -> String {
    build_token_request_form(config, code, redirect_uri, code_verifier)
        .into_iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(&k), urlencoding::encode(&v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parse access_token from an OAuth token response.
///
/// Supports both JSON (`{"access_token":"..."}`) and query-string style
/// (`access_token=...&scope=...`) payloads.
pub fn parse_access_token_response(raw: &str) -> Result<String, ServiceError> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(ServiceError::Internal(
            "OAuth token exchange failed: empty response body".into(),
        ));
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(token) = json
            .get("access_token")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return Ok(token.to_string());
        }

        let err = json.get("error").and_then(|v| v.as_str());
        let err_desc = json.get("error_description").and_then(|v| v.as_str());
        return Err(ServiceError::Internal(format!(
            "OAuth token exchange failed: {}",
            describe_token_error(err, err_desc)
        )));
    }

    let mut access_token: Option<String> = None;
    let mut error: Option<String> = None;
    let mut error_description: Option<String> = None;

    for pair in body.split('&') {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        let value = decode_form_component(v);
        match decode_form_component(k).as_str() {
            "access_token" if !value.trim().is_empty() => access_token = Some(value),
            "error" if !value.trim().is_empty() => error = Some(value),
            "error_description" if !value.trim().is_empty() => error_description = Some(value),
            _ => {}
        }
    }

    if let Some(token) = access_token {
        return Ok(token);
    }

    Err(ServiceError::Internal(format!(
        "OAuth token exchange failed: {}",
        describe_token_error(error.as_deref(), error_description.as_deref())
    )))
}

fn describe_token_error(error: Option<&str>, description: Option<&str>) -> String {
    match (error, description.filter(|d| !d.is_empty())) {
        (Some(e), Some(d)) => format!("{e}: {d}"),
        (Some(e), None) => e.to_string(),
        (None, Some(d)) => d.to_string(),
        (None, None) => "no access_token field in response".to_string(),
    }
}

/// Extract normalized user info from a provider's userinfo JSON response.
pub fn extract_user_info(
    config: &OAuthProviderConfig,
    userinfo_json: &serde_json::Value,
) -> Result<OAuthUserInfo, ServiceError> {
    // Provider user ID may be a number or a string depending on provider
    let provider_user_id = match &userinfo_json[&config.field_map.id] {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) if !s.is_empty() => s.clone(),
        _ => {
            return Err(ServiceError::Internal(format!(
                "OAuth userinfo missing '{}' field",
                config.field_map.id
            )));
        }
    };

    let email = userinfo_json[&config.field_map.email]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ServiceError::Internal(format!(
                "OAuth userinfo missing '{}' field",
                config.field_map.email
            ))
        })?
        .to_string();

    let name = userinfo_json[&config.field_map.name]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| email.clone());

    let avatar_url = userinfo_json[&config.field_map.avatar]
        .as_str()
        .map(|s| s.to_string());

    Ok(OAuthUserInfo {
        provider_user_id,
        email,
        name,
        avatar_url,
    })
}

// ── Provider Presets ────────────────────────────────────────────────────────

/// Create a Google OpenID Connect provider config. Only needs client credentials.
pub fn google_preset(client_id: String, client_secret: String) -> OAuthProviderConfig {
    OAuthProviderConfig {
        authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
        token_url: "https://oauth2.googleapis.com/token".into(),
        userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".into(),
        client_id,
        client_secret,
        scopes: "openid profile email".into(),
        field_map: OAuthFieldMap {
            id: "sub".into(),
            name: "name".into(),
            email: "email".into(),
            avatar: "picture".into(),
        },
    }
}

/// Trim a configuration value, treating blank strings as absent.
pub fn normalize_oauth_config_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn decode_form_component(s: &str) -> String {
    let plus_decoded = s.replace('+', " ");
    urlencoding::decode(&plus_decoded)
        .map(|c| c.into_owned())
        .unwrap_or(plus_decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OAuthProviderConfig {
        google_preset("cid".into(), "secret".into())
    }

    #[test]
    fn parse_access_token_json_ok() {
        let raw = r#"{"access_token":"ya29.abc","expires_in":3599,"token_type":"Bearer"}"#;
        let token = parse_access_token_response(raw).expect("token parse");
        assert_eq!(token, "ya29.abc");
    }

    #[test]
    fn parse_access_token_form_ok() {
        let raw = "access_token=ya29.def&scope=openid+email&token_type=bearer";
        let token = parse_access_token_response(raw).expect("token parse");
        assert_eq!(token, "ya29.def");
    }

    #[test]
    fn parse_access_token_json_error_has_reason() {
        let raw = r#"{"error":"invalid_grant","error_description":"Bad Request"}"#;
        let err = parse_access_token_response(raw).expect_err("must fail");
        assert!(err.message().contains("invalid_grant: Bad Request"));
        assert!(parse_access_token_response("   ").is_err());
    }

    #[test]
    fn authorize_url_carries_pkce_and_state() {
        let url = build_authorize_url(
            &provider(),
            "https://app.example/api/auth/callback/google",
            "st4te",
            "chal",
        );
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("state=st4te"));
        assert!(url.contains("code_challenge=chal"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("scope=openid%20profile%20email"));
        assert!(url.contains(
            "redirect_uri=https%3A%2F%2Fapp.example%2Fapi%2Fauth%2Fcallback%2Fgoogle"
        ));
    }

    #[test]
    fn token_form_contains_verifier() {
        let encoded =
            build_token_request_form_encoded(&provider(), "code-1", "https://app/cb", "ver");
        assert!(encoded.contains("client_id=cid"));
        assert!(encoded.contains("client_secret=secret"));
        assert!(encoded.contains("grant_type=authorization_code"));
        assert!(encoded.contains("code=code-1"));
        assert!(encoded.contains("code_verifier=ver"));
    }

    #[test]
    fn extract_google_userinfo() {
        let json = serde_json::json!({
            "sub": "10769150350006150715113082367",
            "email": "jane@example.com",
            "name": "Jane Doe",
            "picture": "https://lh3.googleusercontent.com/a/x",
        });
        let info = extract_user_info(&provider(), &json).unwrap();
        assert_eq!(info.provider_user_id, "10769150350006150715113082367");
        assert_eq!(info.email, "jane@example.com");
        assert_eq!(info.name, "Jane Doe");
        assert!(info.avatar_url.is_some());
    }

    #[test]
    fn extract_userinfo_falls_back_to_email_for_name() {
        let json = serde_json::json!({ "sub": "1", "email": "x@example.com" });
        let info = extract_user_info(&provider(), &json).unwrap();
        assert_eq!(info.name, "x@example.com");
        assert_eq!(info.avatar_url, None);
    }

    #[test]
    fn extract_userinfo_requires_id_and_email() {
        let no_id = serde_json::json!({ "email": "x@example.com" });
        assert!(extract_user_info(&provider(), &no_id).is_err());
        let no_email = serde_json::json!({ "sub": "1", "name": "X" });
        assert!(extract_user_info(&provider(), &no_email).is_err());
    }

    #[test]
    fn blank_config_values_are_absent() {
        assert_eq!(normalize_oauth_config_value("  "), None);
        assert_eq!(normalize_oauth_config_value(" id "), Some("id".into()));
    }
}
