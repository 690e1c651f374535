//! In-process fake Wikibase for tests.
//!
//! Serves the subset of the action API the client uses from an axum router
//! on an ephemeral port, keeps claims in memory and records every request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{Form, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::config::{RetryPolicy, WikiConfig};

pub(crate) const USERNAME: &str = "SummaryBot";
pub(crate) const PASSWORD: &str = "hunter2";
pub(crate) const LOGIN_TOKEN: &str = "4f1e8c0b+\\";
pub(crate) const CSRF_TOKEN: &str = "9d2a7b3c+\\";
const SESSION_COOKIE: &str = "wikisession=7a91f3";

/// A request as seen by the fake server.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: &'static str,
    pub params: HashMap<String, String>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A JSON-encoded parameter, decoded.
    pub fn json_param(&self, name: &str) -> Option<Value> {
        self.param(name).and_then(|v| serde_json::from_str(v).ok())
    }

    /// `"GET wbgetclaims"`, `"GET query/csrf"`, ...
    pub fn describe(&self) -> String {
        let action = self.param("action").unwrap_or("?");
        match (action, self.param("type")) {
            ("query", Some(kind)) => format!("{} query/{}", self.method, kind),
            _ => format!("{} {}", self.method, action),
        }
    }
}

#[derive(Default)]
struct FakeState {
    /// item -> property -> claims (wire JSON)
    items: HashMap<String, HashMap<String, Vec<Value>>>,
    requests: Vec<RecordedRequest>,
    fail_next: u32,
    stall_next: u32,
    stall_for: Duration,
    claim_read_error: Option<String>,
    next_id: u64,
}

impl FakeState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn claim_mut(&mut self, statement_id: &str) -> Option<&mut Value> {
        self.items
            .values_mut()
            .flat_map(|props| props.values_mut())
            .flatten()
            .find(|claim| claim["id"] == statement_id)
    }

    fn new_hash(&mut self) -> String {
        format!("{:040x}", self.next_id())
    }
}

type Shared = Arc<Mutex<FakeState>>;

/// Handle to a running fake Wikibase.
pub(crate) struct FakeWikibase {
    url: String,
    state: Shared,
}

impl FakeWikibase {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new()
            .route("/w/api.php", get(handle_get).post(handle_post))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}/w/api.php", addr),
            state,
        }
    }

    /// Client config without retries.
    pub fn config(&self) -> WikiConfig {
        WikiConfig::new(self.url.clone())
            .with_timeout(Duration::from_secs(5))
            .with_retry(RetryPolicy::none())
    }

    pub fn config_with_retries(&self, max_attempts: u32) -> WikiConfig {
        self.config().with_retry(RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        })
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Answer the next `n` requests with HTTP 503.
    pub fn fail_next(&self, n: u32) {
        self.lock().fail_next = n;
    }

    /// Hold the next `n` responses back for `delay`.
    pub fn stall_next(&self, n: u32, delay: Duration) {
        let mut state = self.lock();
        state.stall_next = n;
        state.stall_for = delay;
    }

    /// Answer statement reads (`wbgetclaims&claim=`) with this API error code.
    pub fn fail_claim_reads(&self, code: &str) {
        self.lock().claim_read_error = Some(code.to_string());
    }

    /// Add a statement and return its id.
    pub fn add_claim(&self, item: &str, property: &str, value: Value) -> String {
        let mut state = self.lock();
        let id = format!("{}$FAKE-{}", item, state.next_id());
        let claim = json!({
            "id": id,
            "type": "statement",
            "rank": "normal",
            "mainsnak": snak(property, value, None),
        });
        state
            .items
            .entry(item.to_string())
            .or_default()
            .entry(property.to_string())
            .or_default()
            .push(claim);
        id
    }

    /// Add a qualifier to a statement and return its hash.
    pub fn add_qualifier(&self, statement_id: &str, property: &str, value: Value) -> String {
        let mut state = self.lock();
        let hash = state.new_hash();
        let claim = state.claim_mut(statement_id).unwrap();
        push_qualifier(claim, snak(property, value, Some(&hash)));
        hash
    }

    pub fn qualifiers(&self, statement_id: &str, property: &str) -> Vec<Value> {
        let mut state = self.lock();
        state
            .claim_mut(statement_id)
            .and_then(|claim| claim["qualifiers"][property].as_array().cloned())
            .unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Mutating requests (everything posted except the login itself).
    pub fn writes(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "POST" && r.param("action") != Some("login"))
            .collect()
    }
}

fn snak(property: &str, value: Value, hash: Option<&str>) -> Value {
    let kind = match &value {
        Value::Object(obj) if obj.contains_key("text") => "monolingualtext",
        Value::Object(obj) if obj.contains_key("id") => "wikibase-entityid",
        _ => "string",
    };
    let mut snak = json!({
        "snaktype": "value",
        "property": property,
        "datavalue": { "value": value, "type": kind },
    });
    if let Some(hash) = hash {
        snak["hash"] = json!(hash);
    }
    snak
}

fn push_qualifier(claim: &mut Value, qualifier: Value) {
    let property = qualifier["property"].as_str().unwrap_or_default().to_string();
    if !claim["qualifiers"].is_object() {
        claim["qualifiers"] = json!({});
    }
    let list = &mut claim["qualifiers"][property.as_str()];
    if !list.is_array() {
        *list = json!([]);
    }
    if let Some(list) = list.as_array_mut() {
        list.push(qualifier);
    }
}

async fn handle_get(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    handle(&state, "GET", params, &headers).await
}

async fn handle_post(
    State(state): State<Shared>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    handle(&state, "POST", params, &headers).await
}

/// Record the request, optionally stall, then answer it.
async fn handle(state: &Shared, method: &'static str, params: HashMap<String, String>, headers: &HeaderMap) -> Response {
    let stall = {
        let mut state = state.lock().unwrap();
        state.requests.push(RecordedRequest {
            method,
            params: params.clone(),
        });
        if state.stall_next > 0 {
            state.stall_next -= 1;
            Some(state.stall_for)
        } else {
            None
        }
    };

    if let Some(delay) = stall {
        tokio::time::sleep(delay).await;
    }

    dispatch(state, method, params, headers)
}

fn dispatch(state: &Shared, method: &'static str, params: HashMap<String, String>, headers: &HeaderMap) -> Response {
    let mut state = state.lock().unwrap();

    if state.fail_next > 0 {
        state.fail_next -= 1;
        return (StatusCode::SERVICE_UNAVAILABLE, "upstream unavailable").into_response();
    }

    let logged_in = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|c| c.contains(SESSION_COOKIE));
    let p = |name: &str| params.get(name).map(String::as_str).unwrap_or_default();

    let token_ok = p("token") == CSRF_TOKEN;
    let bad_token = || json!({ "error": { "code": "badtoken", "info": "Invalid CSRF token." } });
    let bad_guid = || json!({ "error": { "code": "invalid-guid", "info": "The statement id is not valid." } });

    let body = match (method, p("action")) {
        ("GET", "query") => match p("type") {
            "login" => json!({ "query": { "tokens": { "logintoken": LOGIN_TOKEN } } }),
            "csrf" if logged_in => json!({ "query": { "tokens": { "csrftoken": CSRF_TOKEN } } }),
            "csrf" => json!({ "query": { "tokens": { "csrftoken": "+\\" } } }),
            _ => json!({ "error": { "code": "badvalue", "info": "Unrecognized value for parameter \"type\"." } }),
        },
        ("POST", "login") => {
            if p("lgtoken") != LOGIN_TOKEN {
                json!({ "login": { "result": "WrongToken" } })
            } else if p("lgname") == USERNAME && p("lgpassword") == PASSWORD {
                let mut response = Json(json!({ "login": { "result": "Success", "lgusername": USERNAME } })).into_response();
                response.headers_mut().insert(
                    header::SET_COOKIE,
                    HeaderValue::from_static("wikisession=7a91f3; path=/; HttpOnly"),
                );
                return response;
            } else {
                json!({ "login": { "result": "Failed", "reason": "Incorrect username or password entered." } })
            }
        }
        ("GET", "wbgetclaims") if !p("claim").is_empty() && state.claim_read_error.is_some() => {
            let code = state.claim_read_error.clone().unwrap_or_default();
            json!({ "error": { "code": code, "info": "A database query error has occurred." } })
        }
        ("GET", "wbgetclaims") if !p("claim").is_empty() => {
            let claim = state.claim_mut(p("claim")).cloned();
            match claim {
                Some(claim) => {
                    let property = claim["mainsnak"]["property"].as_str().unwrap_or_default().to_string();
                    json!({ "claims": { property: [claim] } })
                }
                None => bad_guid(),
            }
        }
        ("GET", "wbgetclaims") => {
            let claims = state
                .items
                .get(p("entity"))
                .and_then(|props| props.get(p("property")))
                .filter(|c| !c.is_empty())
                .cloned();
            match claims {
                Some(claims) => json!({ "claims": { p("property"): claims } }),
                None => json!({ "claims": [] }),
            }
        }
        ("POST", "wbcreateclaim") if token_ok => {
            let value: Value = serde_json::from_str(p("value")).unwrap_or(Value::Null);
            let id = format!("{}$FAKE-{}", p("entity"), state.next_id());
            let claim = json!({
                "id": id,
                "type": "statement",
                "rank": "normal",
                "mainsnak": snak(p("property"), value, None),
            });
            state
                .items
                .entry(p("entity").to_string())
                .or_default()
                .entry(p("property").to_string())
                .or_default()
                .push(claim.clone());
            json!({ "success": 1, "claim": claim })
        }
        ("POST", "wbsetclaimvalue") if token_ok => {
            let value: Value = serde_json::from_str(p("value")).unwrap_or(Value::Null);
            match state.claim_mut(p("claim")) {
                Some(claim) => {
                    let property = claim["mainsnak"]["property"].as_str().unwrap_or_default().to_string();
                    claim["mainsnak"] = snak(&property, value, None);
                    json!({ "success": 1, "claim": claim.clone() })
                }
                None => bad_guid(),
            }
        }
        ("POST", "wbsetqualifier") if token_ok => {
            let value: Value = serde_json::from_str(p("value")).unwrap_or(Value::Null);
            let hash = state.new_hash();
            let qualifier = snak(p("property"), value, Some(&hash));
            let snak_hash = p("snakhash");
            match state.claim_mut(p("claim")) {
                None => bad_guid(),
                Some(claim) if snak_hash.is_empty() => {
                    push_qualifier(claim, qualifier);
                    json!({ "success": 1, "claim": claim.clone() })
                }
                Some(claim) => {
                    let slot = claim["qualifiers"][p("property")]
                        .as_array_mut()
                        .and_then(|list| list.iter_mut().find(|q| q["hash"] == snak_hash));
                    match slot {
                        Some(slot) => {
                            *slot = qualifier;
                            json!({ "success": 1, "claim": claim.clone() })
                        }
                        None => json!({ "error": { "code": "no-such-qualifier", "info": "Could not find the qualifier." } }),
                    }
                }
            }
        }
        ("POST", "wbcreateclaim" | "wbsetclaimvalue" | "wbsetqualifier") => bad_token(),
        _ => json!({ "error": { "code": "badvalue", "info": "Unrecognized value for parameter \"action\"." } }),
    };

    Json(body).into_response()
}
