use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use fixtures::{run_server, FixtureArgs};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// Stand-in for the Fyers API, for running the OAuth flow end-to-end
/// without real credentials.
///
/// Point the main server at it with:
///   FYERS_AUTHORIZE_URL=http://127.0.0.1:3100/api/v3/generate-authcode
///   FYERS_TOKEN_URL=http://127.0.0.1:3100/api/v3/validate-authcode
#[derive(Parser, Debug)]
#[clap(name = "broker-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,
}

// Codes handed out by the authorize endpoint; each is good for one exchange.
#[derive(Clone, Default)]
struct AppState {
    issued_codes: Arc<Mutex<HashSet<String>>>,
}

#[derive(Debug, Deserialize)]
struct AuthorizeParams {
    #[allow(dead_code)]
    client_id: Option<String>,
    redirect_uri: String,
    state: Option<String>,
    /// Pass `outcome=deny` to simulate the user refusing consent.
    outcome: Option<String>,
}

#[derive(Serialize)]
struct CallbackRedirectParams<'a> {
    auth_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

#[derive(Serialize)]
struct DeniedRedirectParams<'a> {
    error: &'a str,
    error_description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let state = AppState::default();

    let app = Router::new()
        .route("/api/v3/generate-authcode", get(authorize))
        .route("/api/v3/validate-authcode", post(validate_authcode))
        .with_state(state);

    run_server(args.common, app).await
}

/// Immediately "authenticates" and bounces back to the redirect URI with a
/// fresh single-use code, echoing the state untouched.
async fn authorize(
    State(state): State<AppState>,
    Query(params): Query<AuthorizeParams>,
) -> impl IntoResponse {
    if params.outcome.as_deref() == Some("deny") {
        let query = serde_urlencoded::to_string(DeniedRedirectParams {
            error: "access_denied",
            error_description: "User denied the login request",
            state: params.state.as_deref(),
        })
        .expect("query serialization cannot fail");
        return Redirect::to(&format!("{}?{}", params.redirect_uri, query));
    }

    let code = format!("fixture-{}", Uuid::new_v4().simple());
    state
        .issued_codes
        .lock()
        .expect("issued codes lock poisoned")
        .insert(code.clone());
    info!(%code, "Issued authorization code");

    let query = serde_urlencoded::to_string(CallbackRedirectParams {
        auth_code: &code,
        state: params.state.as_deref(),
    })
    .expect("query serialization cannot fail");
    Redirect::to(&format!("{}?{}", params.redirect_uri, query))
}

/// Fyers-shaped token endpoint: `{"s":"ok", ...}` for a code it issued,
/// `{"s":"error", ...}` otherwise. Codes are invalidated on first use, like
/// the real provider.
async fn validate_authcode(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    let grant_type = payload["grant_type"].as_str().unwrap_or_default();
    let code = payload["code"].as_str().unwrap_or_default();
    let has_hash = payload["appIdHash"].as_str().is_some();

    if grant_type != "authorization_code" || !has_hash {
        return Json(json!({
            "s": "error",
            "code": -413,
            "message": "invalid request",
        }));
    }

    let known = state
        .issued_codes
        .lock()
        .expect("issued codes lock poisoned")
        .remove(code);
    if !known {
        info!(%code, "Rejected unknown or reused code");
        return Json(json!({
            "s": "error",
            "code": -413,
            "message": "invalid code",
        }));
    }

    info!(%code, "Exchanged code for token");
    Json(json!({
        "s": "ok",
        "code": 200,
        "message": "",
        "access_token": format!("fixture-token-{}", Uuid::new_v4().simple()),
    }))
}
