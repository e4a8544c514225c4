//! Mock Natter API for development and testing.
//!
//! Run with `natter mock-server mocks/spaces.yaml`. POSTs to the configured endpoint are
//! matched against the rules by JSON body field; the first matching rule's response is served.

use anyhow::Context;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Mock server config (YAML): endpoint path and list of response rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Optional bind address:port (default "127.0.0.1:0" = pick port).
    #[serde(default)]
    pub bind: Option<String>,

    /// Response rules in order; first match wins.
    pub responses: Vec<ResponseRule>,
}

fn default_endpoint() -> String {
    "/spaces".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseRule {
    #[serde(rename = "match", default)]
    pub match_: MatchRule,

    pub response: ResponseSpec,
}

/// Body match: key = top-level JSON field, value = exact string or "*" for any.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchRule {
    #[serde(default)]
    pub body: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseSpec {
    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Path to file containing response body (relative to config file dir).
    #[serde(default)]
    pub body_file: Option<String>,

    /// Inline body (used if body_file is not set).
    #[serde(default)]
    pub body: Option<String>,
}

fn default_status() -> u16 {
    201
}

pub fn load_mock_config(path: &Path) -> anyhow::Result<MockConfig> {
    let s = std::fs::read_to_string(path).context("read mock config")?;
    serde_yaml_ng::from_str(&s).context("parse mock config YAML")
}

fn resolve_body(spec: &ResponseSpec, config_dir: &Path) -> anyhow::Result<Vec<u8>> {
    if let Some(ref path) = spec.body_file {
        let full = config_dir.join(path);
        return std::fs::read(&full).with_context(|| format!("read body_file {}", full.display()));
    }
    Ok(spec.body.clone().unwrap_or_default().into_bytes())
}

/// A string field matches its value exactly; other JSON types match their serialized form.
fn body_matches(rule: &MatchRule, body: &serde_json::Value) -> bool {
    rule.body.iter().all(|(key, expected)| match body.get(key) {
        None => false,
        Some(_) if expected == "*" => true,
        Some(serde_json::Value::String(actual)) => actual == expected,
        Some(other) => other.to_string() == *expected,
    })
}

fn build_response(spec: &ResponseSpec, body: &[u8]) -> axum::response::Response {
    let status = StatusCode::from_u16(spec.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = axum::response::Response::new(axum::body::Body::from(body.to_vec()));
    *response.status_mut() = status;
    for (k, v) in &spec.headers {
        if let (Ok(name), Ok(value)) = (
            axum::http::header::HeaderName::try_from(k.as_str()),
            axum::http::header::HeaderValue::try_from(v.as_str()),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

type Rules = Arc<Vec<(MatchRule, ResponseSpec, Vec<u8>)>>;

fn router(endpoint: String, rules: Rules) -> axum::Router {
    let handler = move |body: axum::body::Bytes| {
        let rules = rules.clone();
        async move {
            let Ok(json) = serde_json::from_slice::<serde_json::Value>(&body) else {
                return (StatusCode::BAD_REQUEST, "request body is not JSON").into_response();
            };
            for (match_rule, spec, body) in rules.as_ref() {
                if body_matches(match_rule, &json) {
                    info!(status = spec.status, "mock response");
                    return build_response(spec, body);
                }
            }
            (StatusCode::NOT_FOUND, "no mock response matched request body").into_response()
        }
    };
    axum::Router::new().route(&endpoint, axum::routing::post(handler))
}

/// Run the mock server: load config, bind, serve requests until shutdown.
pub async fn run_mock_server(config_path: &Path) -> anyhow::Result<()> {
    let config = load_mock_config(config_path)?;
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let bind = config.bind.as_deref().unwrap_or("127.0.0.1:0").to_string();

    // Preload response bodies (paths relative to config_dir).
    let rules = config
        .responses
        .into_iter()
        .map(|r| {
            let body = resolve_body(&r.response, config_dir).context("resolve response body")?;
            Ok((r.match_, r.response, body))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .context("bind mock server")?;
    let addr = listener.local_addr().context("mock server local_addr")?;
    info!(%addr, endpoint = %config.endpoint, "mock server listening (Ctrl+C to stop)");
    eprintln!("mock server at http://{}", addr);

    let app = router(config.endpoint, Arc::new(rules));
    axum::serve(listener, app).await.context("serve mock server")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_mock_config_parses_yaml() {
        let yaml = r#"
responses:
  - match:
      body:
        owner: "mallory"
    response:
      status: 401
  - response:
      headers:
        Location: "/spaces/1"
      body: '{"name":"N","uri":"/spaces/1"}'
"#;
        let temp = std::env::temp_dir().join("natter_mock_test.yaml");
        std::fs::write(&temp, yaml).unwrap();
        let config = load_mock_config(&temp).unwrap();
        let _ = std::fs::remove_file(&temp);
        assert_eq!(config.endpoint, "/spaces");
        assert_eq!(config.responses.len(), 2);
        assert_eq!(config.responses[0].response.status, 401);
        assert_eq!(config.responses[1].response.status, 201);
        assert_eq!(
            config.responses[1].response.headers.get("Location"),
            Some(&"/spaces/1".to_string())
        );
    }

    #[test]
    fn body_matches_wildcard_and_exact() {
        let mut rule = MatchRule::default();
        assert!(body_matches(&rule, &json!({"name": "N"})));

        rule.body.insert("name".to_string(), "*".to_string());
        assert!(body_matches(&rule, &json!({"name": "anything", "owner": "O"})));
        assert!(!body_matches(&rule, &json!({"owner": "O"})));

        rule.body.insert("owner".to_string(), "alice".to_string());
        assert!(body_matches(&rule, &json!({"name": "N", "owner": "alice"})));
        assert!(!body_matches(&rule, &json!({"name": "N", "owner": "bob"})));
    }

    #[tokio::test]
    async fn serves_first_matching_rule() {
        let rules = vec![
            (
                MatchRule {
                    body: HashMap::from([("owner".to_string(), "mallory".to_string())]),
                },
                ResponseSpec {
                    status: 401,
                    headers: HashMap::new(),
                    body_file: None,
                    body: None,
                },
                Vec::new(),
            ),
            (
                MatchRule::default(),
                ResponseSpec {
                    status: 201,
                    headers: HashMap::from([(
                        "Content-Type".to_string(),
                        "application/json".to_string(),
                    )]),
                    body_file: None,
                    body: None,
                },
                br#"{"name":"N","uri":"/spaces/1"}"#.to_vec(),
            ),
        ];
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router("/spaces".to_string(), Arc::new(rules));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = reqwest::Client::new();
        let url = format!("http://{}/spaces", addr);
        let denied = client
            .post(&url)
            .json(&json!({"name": "N", "owner": "mallory"}))
            .send()
            .await
            .unwrap();
        assert_eq!(denied.status().as_u16(), 401);

        let created = client
            .post(&url)
            .json(&json!({"name": "N", "owner": "O"}))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status().as_u16(), 201);
        let body: serde_json::Value = created.json().await.unwrap();
        assert_eq!(body["uri"], "/spaces/1");
    }

    #[test]
    fn bundled_mock_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("mocks/spaces.yaml");
        let config = load_mock_config(&path).unwrap();
        assert_eq!(config.responses.len(), 3);
        assert!(body_matches(
            &config.responses[1].match_,
            &json!({"name": "N", "owner": "mallory"})
        ));
    }
}
