use crate::Result;
use ohno::IntoAppError;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

const LOG_TARGET: &str = "      http";

/// Options for constructing the shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Route every request (HTTP and HTTPS) through this proxy pool.
    pub proxy_pool: Option<String>,

    /// Send this bearer token with every request.
    pub bearer_token: Option<String>,
}

/// Build a `reqwest` client from the given options.
///
/// The `User-Agent` is not fixed here; [`super::resilient_send`] picks one per attempt.
pub fn build_client(options: &ClientOptions) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();

    if let Some(proxy_pool) = &options.proxy_pool {
        log::info!(target: LOG_TARGET, "Proxy pool '{proxy_pool}' enabled");
        let proxy = reqwest::Proxy::all(proxy_pool).into_app_err_with(|| format!("invalid proxy pool URL '{proxy_pool}'"))?;
        builder = builder.proxy(proxy);
    }

    if let Some(token) = &options.bearer_token {
        let mut auth_val = HeaderValue::from_str(&format!("Bearer {token}")).into_app_err("invalid characters in access token")?;
        auth_val.set_sensitive(true);

        let mut headers = HeaderMap::new();
        let _ = headers.insert(AUTHORIZATION, auth_val);

        builder = builder.default_headers(headers);
    }

    builder.build().into_app_err("unable to create HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_default_client() {
        let _ = build_client(&ClientOptions::default()).unwrap();
    }

    #[test]
    fn test_build_client_with_proxy_and_token() {
        let options = ClientOptions {
            proxy_pool: Some("http://127.0.0.1:8899".to_string()),
            bearer_token: Some("hf_secret".to_string()),
        };
        let _ = build_client(&options).unwrap();
    }

    #[test]
    fn test_build_client_rejects_bad_token() {
        let options = ClientOptions {
            proxy_pool: None,
            bearer_token: Some("bad\ntoken".to_string()),
        };
        let _ = build_client(&options).unwrap_err();
    }
}
