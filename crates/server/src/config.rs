use anyhow::{Context, Result, bail};
use url::Url;

use salesdesk_api::crypto;
use salesdesk_api::oauth::{self, OAuthProviderConfig};

use crate::cookies::CookieSettings;

/// Server configuration loaded from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    /// Public origin used for post-login redirects, without a trailing slash.
    pub base_url: String,
    pub google: OAuthProviderConfig,
    /// Absolute callback URL registered with the provider.
    pub redirect_uri: String,
    /// HMAC key for invite transfer tokens.
    pub transfer_secret: Vec<u8>,
    pub cookies: CookieSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(name)
                .as_deref()
                .and_then(oauth::normalize_oauth_config_value)
        };

        let Some(client_id) = var("GOOGLE_CLIENT_ID") else {
            bail!("GOOGLE_CLIENT_ID must be set");
        };
        let Some(client_secret) = var("GOOGLE_CLIENT_SECRET") else {
            bail!("GOOGLE_CLIENT_SECRET must be set");
        };
        let Some(redirect_uri) = var("GOOGLE_REDIRECT_URI") else {
            bail!("GOOGLE_REDIRECT_URI must be set");
        };

        let parsed = Url::parse(&redirect_uri)
            .with_context(|| format!("GOOGLE_REDIRECT_URI is not a valid URL: {redirect_uri}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("GOOGLE_REDIRECT_URI must be an http(s) URL");
        }
        let secure = parsed.scheme() == "https";

        let base_url = var("BASE_URL")
            .unwrap_or_else(|| parsed.origin().ascii_serialization())
            .trim_end_matches('/')
            .to_string();

        let transfer_secret = match var("TRANSFER_TOKEN_SECRET") {
            Some(secret) => secret.into_bytes(),
            None => {
                tracing::warn!(
                    "TRANSFER_TOKEN_SECRET not set; using a per-process key, pending invite sign-ups will not survive a restart"
                );
                crypto::generate_secret()?
            }
        };

        tracing::info!("OAuth provider enabled: Google");

        Ok(Self {
            base_url,
            google: oauth::google_preset(client_id, client_secret),
            redirect_uri,
            transfer_secret,
            cookies: CookieSettings { secure },
        })
    }

    /// Absolute URL for a path on the dashboard origin.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
pub fn test_config() -> AppConfig {
    AppConfig {
        base_url: "http://localhost:3000".into(),
        google: oauth::google_preset("cid".into(), "secret".into()),
        redirect_uri: "http://localhost:3000/api/auth/callback/google".into(),
        transfer_secret: b"test-transfer-secret".to_vec(),
        cookies: CookieSettings { secure: false },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("GOOGLE_CLIENT_ID", "cid"),
        ("GOOGLE_CLIENT_SECRET", "secret"),
        ("GOOGLE_REDIRECT_URI", "https://dash.example.com/api/auth/callback/google"),
    ];

    #[test]
    fn https_redirect_enables_secure_cookies_and_derives_base_url() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert!(config.cookies.secure);
        assert_eq!(config.base_url, "https://dash.example.com");
        assert_eq!(config.url_for("/dashboard"), "https://dash.example.com/dashboard");
        assert!(!config.transfer_secret.is_empty());
    }

    #[test]
    fn explicit_base_url_and_secret_win() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("BASE_URL", "http://localhost:3000/"));
        vars.push(("TRANSFER_TOKEN_SECRET", "s3cret"));
        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.transfer_secret, b"s3cret");
    }

    #[test]
    fn missing_or_blank_credentials_fail() {
        let err = AppConfig::from_lookup(lookup(&REQUIRED[1..])).err().unwrap();
        assert!(err.to_string().contains("GOOGLE_CLIENT_ID"));

        let mut vars = REQUIRED.to_vec();
        vars[1] = ("GOOGLE_CLIENT_SECRET", "   ");
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn redirect_uri_must_be_http_url() {
        let mut vars = REQUIRED.to_vec();
        vars[2] = ("GOOGLE_REDIRECT_URI", "not a url");
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());
        vars[2] = ("GOOGLE_REDIRECT_URI", "ftp://example.com/cb");
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());
    }
}
