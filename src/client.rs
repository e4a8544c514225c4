//! HTTP client wrapper: build reqwest client with timeouts, cookie store and TLS trust from config.
//! Single JSON POST; the caller interprets the response.

use crate::config::{ApiConfig, CredentialsConfig, read_secret};
use anyhow::Context;
use base64::Engine;
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderName, HeaderValue};
use reqwest::Client;
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;

/// Build a reqwest client from api config. The cookie store keeps session cookies set by the server.
pub fn build_client(api: &ApiConfig) -> anyhow::Result<Client> {
    let timeout_secs = api.timeout_secs;
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(std::cmp::min(10, timeout_secs)))
        .timeout(Duration::from_secs(timeout_secs))
        .cookie_store(true);
    if api.accept_invalid_certs {
        builder = builder.danger_accept_invalid_certs(true);
    }
    if let Some(path) = api.ca_cert_file.as_deref().filter(|p| !p.is_empty()) {
        let pem = std::fs::read(path).with_context(|| format!("read ca_cert_file {:?}", path))?;
        let cert = reqwest::Certificate::from_pem(&pem)
            .with_context(|| format!("parse ca_cert_file {:?}", path))?;
        builder = builder.add_root_certificate(cert);
    }
    builder.build().context("build reqwest client")
}

/// Build a JSON POST to `url` with credentials and extra headers from api config.
pub fn build_request<T: Serialize + ?Sized>(
    client: &Client,
    api: &ApiConfig,
    url: &str,
    body: &T,
) -> anyhow::Result<reqwest::Request> {
    let mut req = client.post(url).json(body);
    if let Some(credentials) = &api.credentials {
        req = add_credentials(req, credentials)?;
    }
    if let Some(headers) = &api.headers {
        for (k, v) in headers {
            let name = HeaderName::try_from(k.as_str())
                .with_context(|| format!("invalid header name: {:?}", k))?;
            let value = HeaderValue::try_from(v.as_str())
                .with_context(|| format!("invalid header value for {}: {:?}", k, v))?;
            req = req.header(name, value);
        }
    }
    req.build().context("build request")
}

fn add_credentials(
    req: reqwest::RequestBuilder,
    credentials: &CredentialsConfig,
) -> anyhow::Result<reqwest::RequestBuilder> {
    let req = match credentials {
        CredentialsConfig::Cookie {
            cookie_env,
            cookie_file,
        } => {
            let cookie = read_secret(cookie_file.as_deref(), cookie_env)
                .context("session cookie")?;
            let hv = HeaderValue::try_from(cookie.as_str()).context("invalid cookie value")?;
            req.header(COOKIE, hv)
        }
        CredentialsConfig::Basic {
            user_env,
            user_file,
            password_env,
            password_file,
        } => {
            let user = read_secret(user_file.as_deref(), user_env).context("basic auth user")?;
            let password = read_secret(password_file.as_deref(), password_env)
                .context("basic auth password")?;
            let encoded = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", user, password).as_bytes());
            let hv = HeaderValue::try_from(format!("Basic {}", encoded))
                .context("invalid basic auth")?;
            req.header(AUTHORIZATION, hv)
        }
    };
    Ok(req)
}

/// Render a request for `--dry-run`: request line, headers (credentials redacted), body.
pub fn describe_request(req: &reqwest::Request) -> String {
    let mut out = format!("{} {}\n", req.method(), req.url());
    let mut headers: Vec<_> = req.headers().iter().collect();
    headers.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    for (name, value) in headers {
        let shown = if *name == AUTHORIZATION || *name == COOKIE {
            "[REDACTED]"
        } else {
            value.to_str().unwrap_or("<binary>")
        };
        let _ = writeln!(out, "{}: {}", name, shown);
    }
    if let Some(bytes) = req.body().and_then(|b| b.as_bytes()) {
        let _ = write!(out, "\n{}", String::from_utf8_lossy(bytes));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api_with(credentials: Option<CredentialsConfig>) -> ApiConfig {
        ApiConfig {
            base_url: "http://localhost:4567".to_string(),
            credentials,
            ..ApiConfig::default()
        }
    }

    fn secret_file(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn request_is_json_post() {
        let api = api_with(None);
        let client = build_client(&api).unwrap();
        let req = build_request(&client, &api, &api.spaces_url(), &json!({"name": "N"})).unwrap();
        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(req.url().as_str(), "http://localhost:4567/spaces");
        assert_eq!(
            req.headers().get(reqwest::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn basic_credentials_from_files() {
        let user = secret_file("natter_client_test_user", "alice\n");
        let password = secret_file("natter_client_test_password", "changeit");
        let api = api_with(Some(CredentialsConfig::Basic {
            user_env: "NATTER_TEST_NEVER_SET_USER".to_string(),
            user_file: Some(user.clone()),
            password_env: "NATTER_TEST_NEVER_SET_PASSWORD".to_string(),
            password_file: Some(password.clone()),
        }));
        let client = build_client(&api).unwrap();
        let req = build_request(&client, &api, &api.spaces_url(), &json!({})).unwrap();
        let expected = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("alice:changeit")
        );
        assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), expected.as_str());
        let _ = std::fs::remove_file(user);
        let _ = std::fs::remove_file(password);
    }

    #[test]
    fn cookie_credentials_and_missing_secret() {
        let cookie = secret_file("natter_client_test_cookie", "JSESSIONID=node01");
        let api = api_with(Some(CredentialsConfig::Cookie {
            cookie_env: "NATTER_TEST_NEVER_SET_COOKIE".to_string(),
            cookie_file: Some(cookie.clone()),
        }));
        let client = build_client(&api).unwrap();
        let req = build_request(&client, &api, &api.spaces_url(), &json!({})).unwrap();
        assert_eq!(req.headers().get(COOKIE).unwrap(), "JSESSIONID=node01");
        let _ = std::fs::remove_file(cookie);

        let api = api_with(Some(CredentialsConfig::Cookie {
            cookie_env: "NATTER_TEST_NEVER_SET_COOKIE".to_string(),
            cookie_file: None,
        }));
        let err = build_request(&client, &api, &api.spaces_url(), &json!({})).unwrap_err();
        assert!(format!("{:#}", err).contains("NATTER_TEST_NEVER_SET_COOKIE"));
    }

    #[test]
    fn extra_headers_reach_the_request() {
        let api = ApiConfig {
            headers: Some(std::collections::HashMap::from([
                ("X-Requested-With".to_string(), "natter".to_string()),
                ("X-CSRF-Token".to_string(), "abc123".to_string()),
            ])),
            ..api_with(None)
        };
        let client = build_client(&api).unwrap();
        let req = build_request(&client, &api, &api.spaces_url(), &json!({})).unwrap();
        assert_eq!(req.headers().get("x-requested-with").unwrap(), "natter");
        assert_eq!(req.headers().get("x-csrf-token").unwrap(), "abc123");
        assert_eq!(
            req.headers().get(reqwest::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn invalid_extra_headers_are_rejected() {
        let bad_name = ApiConfig {
            headers: Some(std::collections::HashMap::from([(
                "Bad Header".to_string(),
                "v".to_string(),
            )])),
            ..api_with(None)
        };
        let client = build_client(&bad_name).unwrap();
        let err = build_request(&client, &bad_name, &bad_name.spaces_url(), &json!({}))
            .unwrap_err();
        assert!(
            format!("{:#}", err).contains("invalid header name"),
            "{:#}",
            err
        );

        let bad_value = ApiConfig {
            headers: Some(std::collections::HashMap::from([(
                "X-Trace".to_string(),
                "line\nbreak".to_string(),
            )])),
            ..api_with(None)
        };
        let err = build_request(&client, &bad_value, &bad_value.spaces_url(), &json!({}))
            .unwrap_err();
        assert!(
            format!("{:#}", err).contains("invalid header value for X-Trace"),
            "{:#}",
            err
        );
    }

    #[test]
    fn describe_request_redacts_credentials() {
        let cookie = secret_file("natter_client_test_describe", "JSESSIONID=secret");
        let api = api_with(Some(CredentialsConfig::Cookie {
            cookie_env: "NATTER_TEST_NEVER_SET_COOKIE".to_string(),
            cookie_file: Some(cookie.clone()),
        }));
        let client = build_client(&api).unwrap();
        let req = build_request(
            &client,
            &api,
            &api.spaces_url(),
            &json!({"name": "N", "owner": "O"}),
        )
        .unwrap();
        let rendered = describe_request(&req);
        let _ = std::fs::remove_file(cookie);
        insta::assert_snapshot!(rendered, @r#"
        POST http://localhost:4567/spaces
        content-type: application/json
        cookie: [REDACTED]

        {"name":"N","owner":"O"}
        "#);
    }
}
