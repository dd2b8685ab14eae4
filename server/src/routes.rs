use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::get;
use color_eyre::eyre::WrapErr;
use maud::html;
use serde::Deserialize;
use tracing::{error, info};

use crate::components::layout::{Card, Page};
use crate::components::ui::button::Button;
use crate::errors::{ServerResult, WithStatus};
use crate::oauth::exchange::{compute_checksum, ExchangeError, TokenRecord};
use crate::oauth::state_store::parse_state_param;
use crate::state::AppState;
use crate::tokens::SavedToken;

/// Build the application router with all routes
pub fn routes(app_state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/", get(root_page))
        .route("/login", get(login))
        .route("/fyers/callback", get(callback))
        .route("/tokens", get(tokens_page))
        .route("/token/:token_id", get(token_detail))
        .route("/static/*path", get(crate::static_assets::serve_static_file))
        .fallback(not_found)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Homepage: intro card with the login button and a how-it-works list.
async fn root_page() -> Page {
    let content = html! {
        p { "This application helps you securely authenticate with the Fyers API and retrieve an access token." }

        div class="actions" {
            (Button::primary("Login with Fyers").href("/login"))
        }

        div {
            h3 { "How it works:" }
            ol {
                li { "Click the login button above" }
                li { "You'll be redirected to Fyers' login page" }
                li { "After successful authentication, you'll be redirected back here" }
                li { "Your access token will be displayed and saved for future use" }
            }
        }
    };

    Page::new(
        "Home",
        Card::new(content).with_title("Welcome to Fyers OAuth Integration"),
    )
}

/// Issue a fresh anti-CSRF state and redirect the browser to the Fyers
/// authorization endpoint.
async fn login(State(state): State<AppState>) -> Redirect {
    let (state_id, secret) = state.state_store.issue();

    let auth_url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&state={}",
        state.config.authorize_url,
        urlencoding::encode(&state.config.app_id),
        urlencoding::encode(&state.config.redirect_uri),
        urlencoding::encode(&format!("{state_id}:{secret}")),
    );

    info!(%state_id, "Generated Fyers auth URL");
    Redirect::to(&auth_url)
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    /// Standard authorization-code parameter name.
    code: Option<String>,
    /// Fyers also delivers the code under this name; it wins when both are
    /// present. Both names are part of the provider contract.
    auth_code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Handle the callback from Fyers after authentication.
async fn callback(State(state): State<AppState>, Query(params): Query<CallbackParams>) -> Page {
    // The provider reports pre-exchange failures (e.g. the user denied
    // consent) directly in the callback.
    if let Some(provider_error) = &params.error {
        let description = params.error_description.as_deref().unwrap_or("");
        error!(
            error = %provider_error,
            description, "Fyers reported an OAuth error"
        );
        return provider_error_page(provider_error, description);
    }

    let Some(raw_state) = params.state.as_deref() else {
        error!("Missing state parameter in callback");
        return security_failure_page();
    };

    // NotFound, Mismatch, and Malformed all render identically; the logs are
    // the only place they differ.
    let validated = parse_state_param(raw_state)
        .and_then(|(state_id, secret)| state.state_store.consume(state_id, secret));
    if let Err(err) = validated {
        error!(%err, state = raw_state, "State validation failed");
        return security_failure_page();
    }

    let code = params.auth_code.as_deref().or(params.code.as_deref());
    let Some(code) = code else {
        error!("Missing authorization code in callback");
        return missing_code_page();
    };

    let app_id_hash = compute_checksum(&state.config.app_id, &state.config.secret_key);
    let record = match state.exchanger.exchange(code, &app_id_hash).await {
        Ok(record) => record,
        Err(err) => {
            error!(%err, "Token exchange failed");
            return exchange_error_page(&err);
        }
    };

    // Persistence is best-effort: losing the write must not lose the
    // display, so the token is rendered either way.
    let saved_path = match state.token_store.save(&record).await {
        Ok(path) => {
            info!(path = %path.display(), "Access token saved");
            Some(path.display().to_string())
        }
        Err(err) => {
            error!(?err, "Failed to persist token record");
            None
        }
    };

    success_page(&record, saved_path.as_deref())
}

/// List all saved tokens, newest first.
async fn tokens_page(State(state): State<AppState>) -> ServerResult<Page, StatusCode> {
    let tokens = state
        .token_store
        .list()
        .await
        .wrap_err("Failed to list saved tokens")
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)?;

    if tokens.is_empty() {
        let content = html! {
            p { "No tokens have been saved yet." }
            (Button::primary("Back to Home").href("/"))
        };
        return Ok(Page::new(
            "No Tokens",
            Card::new(content).with_title("Saved Tokens"),
        ));
    }

    let content = html! {
        p { "The following tokens have been saved:" }

        div class="token-list" {
            @for token in &tokens {
                (token_list_entry(token))
            }
        }

        (Button::primary("Back to Home").href("/"))
    };

    Ok(Page::new(
        "Saved Tokens",
        Card::new(content).with_title("Saved Tokens"),
    ))
}

fn token_list_entry(token: &SavedToken) -> maud::Markup {
    let preview_id = format!("token-{}", token.id);

    html! {
        div class="card" {
            h3 { (token.id) ".json" }
            p { "Created: " (token.created_label) }
            @if let Some(read_error) = &token.read_error {
                p { "Error reading token: " (read_error) }
            } @else {
                pre id=(preview_id) {
                    (token_preview(token.access_token.as_deref()))
                }
                (Button::primary("Copy Token").copy_target(&preview_id))
                " "
                (Button::secondary("View Details").href(&format!("/token/{}", token.id)))
            }
        }
    }
}

/// First 20 characters of the token, enough to tell records apart without
/// dumping the full credential into the listing.
fn token_preview(access_token: Option<&str>) -> String {
    match access_token {
        Some(token) => format!("{}...", token.chars().take(20).collect::<String>()),
        None => "No token found".to_string(),
    }
}

/// Detail page for one saved token.
async fn token_detail(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> ServerResult<Page, StatusCode> {
    let token = state
        .token_store
        .load(&token_id)
        .await
        .wrap_err_with(|| format!("Failed to load token {token_id}"))
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)?;

    let Some(token) = token else {
        let content = html! {
            p { "The requested token does not exist." }
            (Button::primary("View All Tokens").href("/tokens"))
        };
        return Ok(Page::new(
            "Token Not Found",
            Card::new(content).with_title("Token Not Found"),
        )
        .with_error("Token not found"));
    };

    let raw_pretty =
        serde_json::to_string_pretty(&token.raw).unwrap_or_else(|_| token.raw.to_string());

    let content = html! {
        div class="token-info" {
            h3 { "Access Token" }
            pre id="access-token-detail" {
                (token.access_token.as_deref().unwrap_or("No token found"))
            }
            (Button::primary("Copy Token").copy_target("access-token-detail"))
        }

        div class="token-info" {
            h3 { "Complete Token Data" }
            pre id="token-data" { (raw_pretty) }
            (Button::primary("Copy Data").copy_target("token-data"))
        }

        div class="actions" {
            (Button::primary("Back to Token List").href("/tokens"))
        }
    };

    Ok(Page::new(
        format!("Token: {}", token.id),
        Card::new(content).with_title(&format!("Token Details: {}", token.id)),
    ))
}

async fn not_found() -> (StatusCode, Page) {
    let content = html! {
        p { "The requested page does not exist." }
        (Button::primary("Back to Home").href("/"))
    };

    (
        StatusCode::NOT_FOUND,
        Page::new("Page Not Found", Card::new(content).with_title("Page Not Found"))
            .with_error("Page not found"),
    )
}

fn provider_error_page(provider_error: &str, description: &str) -> Page {
    let content = html! {
        p { "Fyers returned an error:" }
        pre { (provider_error) ": " (description) }
        (Button::primary("Try Again").href("/"))
    };

    Page::new(
        "Authentication Error",
        Card::new(content).with_title("Authentication Error"),
    )
    .with_error(format!("Fyers error: {provider_error}"))
}

/// One page for every state-validation failure. The variants are deliberately
/// not distinguished here so a forged callback learns nothing about which
/// check it tripped.
fn security_failure_page() -> Page {
    let content = html! {
        p { "Invalid state parameter. This could be a CSRF attempt." }
        (Button::primary("Try Again").href("/"))
    };

    Page::new("Error", Card::new(content).with_title("Security Error"))
        .with_error("Security validation failed")
}

fn missing_code_page() -> Page {
    let content = html! {
        p { "Missing authorization code" }
        (Button::primary("Try Again").href("/"))
    };

    Page::new("Error", Card::new(content).with_title("Error"))
        .with_error("Missing authorization code")
}

fn exchange_error_page(err: &ExchangeError) -> Page {
    let detail = match err {
        ExchangeError::Network(source) => format!("Could not reach Fyers: {source}"),
        ExchangeError::Rejected { message } => message.clone(),
        ExchangeError::MalformedResponse => {
            "Authentication succeeded but no access token was returned".to_string()
        }
    };

    let content = html! {
        p { "Failed to retrieve access token:" }
        pre { (detail) }
        (Button::primary("Try Again").href("/"))
    };

    Page::new("API Error", Card::new(content).with_title("API Error"))
        .with_error(format!("API error: {detail}"))
}

fn success_page(record: &TokenRecord, saved_path: Option<&str>) -> Page {
    let raw_pretty = serde_json::to_string_pretty(&record.raw_response)
        .unwrap_or_else(|_| record.raw_response.to_string());

    let content = html! {
        p { "Your access token has been retrieved and saved successfully!" }

        div class="token-info" {
            h3 { "Access Token" }
            pre id="access-token" { (record.access_token) }
            (Button::primary("Copy Token").copy_target("access-token"))
        }

        div class="token-info" {
            h3 { "Token Details" }
            (Button::primary("Show Details").toggle_target("token-details"))
            pre id="token-details" class="hidden" { (raw_pretty) }
        }

        div class="actions" {
            @if let Some(path) = saved_path {
                p { "Token has been saved to: " code { (path) } }
            } @else {
                p { "The token could not be saved to disk; copy it from this page." }
            }
            (Button::primary("Back to Home").href("/"))
        }
    };

    Page::new(
        "Authentication Successful",
        Card::new(content).with_title("Authentication Successful"),
    )
    .with_success("Authentication successful!")
}
