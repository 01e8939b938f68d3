//! HTTP client for the remote decision service.
//!
//! Two endpoints:
//! - `POST /computer`: goal + screenshot in, candidate actions out
//! - `POST /chat`: optional free-form planning
//!
//! Exactly one attempt per call. Failures map onto distinct [`AgentError`]
//! variants: transport ([`AgentError::Transport`]), non-success status
//! ([`AgentError::Service`]) and unparseable bodies
//! ([`AgentError::DecisionParse`]).

use {
    reqwest::Client,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
};

use crate::{
    capture::data_uri,
    error::{AgentError, Result},
    types::{Action, AgentSettings, ScreenshotContext},
};

/// Response envelope versions this client understands.
pub const SUPPORTED_SCHEMA_VERSION: u32 = 1;

const PLANNER_SYSTEM_PROMPT: &str =
    "You are an expert browser agent that does tasks autonomously on the web.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComputerRequest<'a> {
    goal: &'a str,
    image_url: String,
    display_width: u32,
    display_height: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    agent_role: &'static str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// One candidate returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub action: Action,
    /// Explicit "execute this one" marker (versioned envelope only).
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionedEnvelope {
    schema_version: u32,
    #[serde(default)]
    candidates: Vec<serde_json::Value>,
}

/// Parsed `/computer` response.
///
/// Only the selected candidate is decoded. Entries the service offers
/// alongside it may use action types this client does not know.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionResult {
    /// `None` for the legacy bare-array shape.
    pub schema_version: Option<u32>,
    /// How many candidates the service returned.
    pub candidate_count: usize,
    /// The first candidate flagged `primary`, otherwise the first candidate.
    pub selected: Option<Candidate>,
}

impl DecisionResult {
    /// Parse either the versioned envelope
    /// `{"schemaVersion":1,"candidates":[{"action":{..},"primary":true}]}`
    /// or the legacy array `[{"action":{..}}]`.
    pub fn parse(body: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| AgentError::DecisionParse(format!("invalid JSON: {e}")))?;

        let (schema_version, entries) = match value {
            serde_json::Value::Array(entries) => (None, entries),
            serde_json::Value::Object(_) => {
                let envelope: VersionedEnvelope = serde_json::from_value(value)
                    .map_err(|e| AgentError::DecisionParse(format!("envelope: {e}")))?;
                if envelope.schema_version != SUPPORTED_SCHEMA_VERSION {
                    return Err(AgentError::DecisionParse(format!(
                        "unsupported schema version {}",
                        envelope.schema_version
                    )));
                }
                (Some(envelope.schema_version), envelope.candidates)
            },
            other => {
                return Err(AgentError::DecisionParse(format!(
                    "expected an array or object, got {}",
                    json_kind(&other)
                )));
            },
        };

        let index = entries
            .iter()
            .position(is_primary)
            .or_else(|| (!entries.is_empty()).then_some(0));

        let selected = match index {
            Some(i) => {
                let candidate: Candidate = serde_json::from_value(entries[i].clone())
                    .map_err(|e| AgentError::DecisionParse(format!("candidate {i}: {e}")))?;
                Some(candidate)
            },
            None => None,
        };

        Ok(Self {
            schema_version,
            candidate_count: entries.len(),
            selected,
        })
    }

    /// The one action to execute.
    pub fn select(&self) -> Option<&Action> {
        self.selected.as_ref().map(|c| &c.action)
    }
}

fn is_primary(entry: &serde_json::Value) -> bool {
    entry
        .get("primary")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Client for the remote decision service.
#[derive(Clone)]
pub struct DecisionServiceClient {
    http: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
}

impl DecisionServiceClient {
    pub fn new(settings: &AgentSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| AgentError::Other(anyhow::anyhow!("failed to build HTTP client: {e}")))?;
        Self::with_client(http, &settings.service_url, settings.api_key.clone())
    }

    /// Use a preconfigured `reqwest::Client`.
    pub fn with_client(
        http: Client,
        base_url: &str,
        api_key: Option<Secret<String>>,
    ) -> Result<Self> {
        let parsed = url::Url::parse(base_url).map_err(|e| {
            AgentError::Other(anyhow::anyhow!(
                "invalid decision service URL '{base_url}': {e}"
            ))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AgentError::Other(anyhow::anyhow!(
                "decision service URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the service which action brings `goal` closer, given `screenshot`.
    pub async fn submit(
        &self,
        goal: &str,
        screenshot: &ScreenshotContext,
    ) -> Result<DecisionResult> {
        let request = ComputerRequest {
            goal,
            image_url: data_uri(screenshot),
            display_width: screenshot.device_width,
            display_height: screenshot.device_height,
        };

        debug!(
            goal,
            display_width = request.display_width,
            display_height = request.display_height,
            "requesting decision"
        );

        let body = self.post_json("computer", &request).await?;
        let decision = DecisionResult::parse(&body)?;

        info!(
            candidates = decision.candidate_count,
            schema_version = ?decision.schema_version,
            "decision received"
        );

        Ok(decision)
    }

    /// Ask the planner for high-level steps. The response shape is free-form:
    /// JSON bodies are returned as parsed, anything else as a string.
    pub async fn plan(&self, prompt: &str) -> Result<serde_json::Value> {
        let request = ChatRequest {
            agent_role: "planner",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: PLANNER_SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Based on the following input, decide some high level actions that the agent should take.: \"{prompt}\""
                    ),
                },
            ],
        };

        let body = self.post_json("chat", &request).await?;
        // Plain-text plans come back as a JSON string.
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<String> {
        let url = format!("{}/{path}", self.base_url);

        let mut req = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let resp = req.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "decision service request failed");
            AgentError::Transport(e.to_string())
        })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AgentError::Transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "decision service returned an error");
            return Err(AgentError::Service {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, crate::types::MouseButton};

    fn screenshot() -> ScreenshotContext {
        ScreenshotContext::new(vec![0x89, b'P', b'N', b'G'], 1024, 768, 2.0)
    }

    fn client_for(server: &mockito::Server) -> DecisionServiceClient {
        DecisionServiceClient::with_client(Client::new(), &server.url(), None).unwrap()
    }

    // ── Response parsing ───────────────────────────────────────────────────

    #[test]
    fn legacy_array_selects_first_entry() {
        let d = DecisionResult::parse(
            r#"[{"action":{"type":"click","x":500,"y":300}},{"action":{"type":"wait"}}]"#,
        )
        .unwrap();
        assert_eq!(d.schema_version, None);
        assert_eq!(
            d.select(),
            Some(&Action::Click {
                x: 500.0,
                y: 300.0,
                button: MouseButton::Left
            })
        );
    }

    #[test]
    fn versioned_envelope_prefers_primary() {
        let d = DecisionResult::parse(
            r#"{"schemaVersion":1,"candidates":[
                {"action":{"type":"wait"}},
                {"action":{"type":"navigate","url":"https://example.com"},"primary":true}
            ]}"#,
        )
        .unwrap();
        assert_eq!(d.schema_version, Some(1));
        assert_eq!(
            d.select(),
            Some(&Action::Navigate {
                url: "https://example.com".into()
            })
        );
    }

    #[test]
    fn versioned_envelope_without_primary_falls_back_to_first() {
        let d = DecisionResult::parse(
            r#"{"schemaVersion":1,"candidates":[{"action":{"type":"keypress","keyCode":"Tab"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            d.select(),
            Some(&Action::KeyPress {
                key_code: "Tab".into()
            })
        );
    }

    #[test]
    fn unknown_action_in_unselected_entry_is_ignored() {
        let d = DecisionResult::parse(
            r#"[{"action":{"type":"click","x":500,"y":300}},{"action":{"type":"drag","x":1,"y":1}}]"#,
        )
        .unwrap();
        assert_eq!(d.candidate_count, 2);
        assert_eq!(
            d.select(),
            Some(&Action::Click {
                x: 500.0,
                y: 300.0,
                button: MouseButton::Left
            })
        );

        let d = DecisionResult::parse(
            r#"{"schemaVersion":1,"candidates":[
                {"action":{"type":"drag","x":1,"y":1}},
                {"action":{"type":"keypress","keyCode":"Enter"},"primary":true}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            d.select(),
            Some(&Action::KeyPress {
                key_code: "Enter".into()
            })
        );
    }

    #[test]
    fn unknown_action_in_selected_entry_is_a_parse_error() {
        let err = DecisionResult::parse(
            r#"[{"action":{"type":"drag","x":1,"y":1}},{"action":{"type":"wait"}}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, AgentError::DecisionParse(ref m) if m.contains("candidate 0")));
    }

    #[test]
    fn empty_list_selects_nothing() {
        assert_eq!(DecisionResult::parse("[]").unwrap().select(), None);
        assert_eq!(
            DecisionResult::parse(r#"{"schemaVersion":1}"#)
                .unwrap()
                .select(),
            None
        );
    }

    #[test]
    fn unknown_schema_version_is_a_parse_error() {
        let err = DecisionResult::parse(r#"{"schemaVersion":2,"candidates":[]}"#).unwrap_err();
        assert!(matches!(err, AgentError::DecisionParse(ref m) if m.contains("version 2")));
    }

    #[test]
    fn entry_without_action_is_a_parse_error() {
        assert!(matches!(
            DecisionResult::parse(r#"[{"thought":"hmm"}]"#),
            Err(AgentError::DecisionParse(_))
        ));
        assert!(matches!(
            DecisionResult::parse(r#""click somewhere""#),
            Err(AgentError::DecisionParse(_))
        ));
    }

    #[test]
    fn rejects_non_http_base_url() {
        assert!(DecisionServiceClient::with_client(Client::new(), "ftp://x", None).is_err());
        assert!(DecisionServiceClient::with_client(Client::new(), "not a url", None).is_err());
    }

    // ── HTTP integration tests (with mockito) ──────────────────────────

    #[tokio::test]
    async fn submit_sends_data_uri_and_dimensions() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/computer")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::PartialJson(serde_json::json!({
                    "goal": "open settings",
                    "displayWidth": 1024,
                    "displayHeight": 768,
                })),
                mockito::Matcher::Regex(r#""imageUrl":"data:image/png;base64,"#.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"action":{"type":"click","x":500,"y":300}}]"#)
            .create_async()
            .await;

        let decision = client_for(&server)
            .submit("open settings", &screenshot())
            .await
            .unwrap();

        assert_eq!(decision.candidate_count, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn submit_sends_bearer_token_when_configured() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/computer")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = DecisionServiceClient::with_client(
            Client::new(),
            &format!("{}/", server.url()),
            Some(Secret::new("sk-test".to_string())),
        )
        .unwrap();
        client.submit("x", &screenshot()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_error_status_is_service_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/computer")
            .with_status(422)
            .with_body("bad screenshot")
            .create_async()
            .await;

        let err = client_for(&server)
            .submit("x", &screenshot())
            .await
            .unwrap_err();
        assert!(
            matches!(err, AgentError::Service { status: 422, ref body } if body == "bad screenshot")
        );
    }

    #[tokio::test]
    async fn server_error_status_is_service_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/computer")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = client_for(&server)
            .submit("x", &screenshot())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Service { status: 500, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/computer")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{not valid json}")
            .create_async()
            .await;

        let err = client_for(&server)
            .submit("x", &screenshot())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::DecisionParse(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        // Bind then drop a listener so the port is very likely closed.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client =
            DecisionServiceClient::with_client(Client::new(), &format!("http://{addr}"), None)
                .unwrap();

        let err = client.submit("x", &screenshot()).await.unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
    }

    #[tokio::test]
    async fn plan_posts_planner_role() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({ "agentRole": "planner" }),
            ))
            .with_status(200)
            .with_body(r#"{"steps":["open the menu"]}"#)
            .create_async()
            .await;

        let plan = client_for(&server).plan("find settings").await.unwrap();
        assert_eq!(plan["steps"][0], "open the menu");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn plain_text_plan_is_returned_as_string() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat")
            .with_status(200)
            .with_body("1. open the menu\n2. click settings")
            .create_async()
            .await;

        let plan = client_for(&server).plan("find settings").await.unwrap();
        assert_eq!(plan.as_str(), Some("1. open the menu\n2. click settings"));
    }
}
