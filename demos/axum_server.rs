// Optional .env file
// ```.env
// nonce_secret="base64 encoded secret key"
// admin_url="http://localhost:3000/"
// ```
// Without `nonce_secret` a random key is used and tokens do not survive a restart.
// finally ```cargo run --example axum_server``` and open http://localhost:3000/
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, Uri},
    response::{Html, IntoResponse},
    routing::{get, post},
};
use axum_extra::extract::{CookieJar, cookie::Cookie};
use http::{
    StatusCode,
    header::{HOST, REFERER},
};
use maud::{PreEscaped, html};
use tiny_nonce::{
    config::{Config, ConfigBuilder},
    format::Arg,
    host::{DEFAULT_NONCE_NAME, RequestHost},
    registry::NonceRegistry,
    request::Request as NonceRequest,
    session_token::SessionToken,
};
use tracing::{error, info};
use uuid::Uuid;

extern crate tiny_nonce;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log settings
    tracing_subscriber::fmt::init();

    // Build Config
    let mut builder = match dotenvy::var("nonce_secret") {
        Ok(secret) => ConfigBuilder::new().secret_key_base64(&secret)?,
        Err(_) => ConfigBuilder::new().random_secret_key()?,
    };
    if let Ok(admin_url) = dotenvy::var("admin_url") {
        builder = builder.admin_url(&admin_url);
    }
    let config = builder.build();

    // Register every named nonce before the registry is shared
    let mut nonces = NonceRegistry::new();
    nonces.register("delete-post", "delete-post-%d", vec![]);
    nonces.register("trash-post", "trash-post-%d", vec![]);
    nonces.register(
        "qwerty",
        "qwerty %s %d",
        vec![Arg::from("caleb"), Arg::from(15)],
    );

    let app_state = AppState::new(config, nonces);
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .context("Failed to bind listener")?;
    // '/': A page with a protected form and a protected link
    // '/posts/{id}/delete': Form target, admin style check
    // '/posts/{id}/trash': Link target, AJAX style check
    // '/debug': Debug snapshot of the `qwerty` nonce
    let app = Router::new()
        .route("/", get(index))
        .route("/posts/{id}/delete", post(delete_post))
        .route("/posts/{id}/trash", get(trash_post))
        .route("/debug", get(debug))
        .with_state(Arc::new(app_state));

    axum::serve(listener, app)
        .await
        .context("Server stopped")?;
    anyhow::Ok(())
}

static COOKIE_KEY: &str = "session";
const POST_ID: i64 = 5;

async fn index(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    uri: Uri,
) -> Result<impl IntoResponse, StatusCode> {
    // Start a session on first visit
    // Cookie_Key -- Session_Key
    //               Session_Key -- SessionToken(in memory or redis)
    let jar = if jar.get(COOKIE_KEY).is_none() {
        let session_token = SessionToken::new().map_err(|e| e.status_code())?;
        let session_key = Uuid::new_v4().to_string();
        app_state
            .sessions
            .lock()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .insert(session_key.clone(), session_token);
        jar.add(Cookie::new(COOKIE_KEY, session_key))
    } else {
        jar
    };

    let request = nonce_request(&app_state, &jar, &headers, &uri)?;
    let host = RequestHost::new(&app_state.config, &request);
    let args = [Arg::from(POST_ID)];

    let field = app_state
        .nonces
        .get("delete-post")
        .field_default(&host, &args)
        .map_err(|e| e.status_code())?;
    let trash_base = format!("/posts/{}/trash", POST_ID);
    let trash_url = app_state
        .nonces
        .get("trash-post")
        .url(&host, &args, DEFAULT_NONCE_NAME, Some(trash_base.as_str()))
        .map_err(|e| e.status_code())?;

    let page = html! {
        h1 { "Post " (POST_ID) }
        form action={"/posts/" (POST_ID) "/delete"} method="post" {
            (PreEscaped(field))
            input type="submit" value="Delete";
        }
        p { a href=(trash_url) { "Move to trash" } }
        p { a href="/debug" { "Debug" } }
    };
    Ok((jar, Html(page.into_string())))
}

async fn delete_post(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    jar: CookieJar,
    headers: HeaderMap,
    uri: Uri,
    body: String,
) -> Result<impl IntoResponse, StatusCode> {
    let request = nonce_request(&app_state, &jar, &headers, &uri)?.with_form_body(&body);
    let host = RequestHost::new(&app_state.config, &request);

    // Failure ends the request with 403
    let verification = app_state
        .nonces
        .get("delete-post")
        .is_valid_for_admin(&host, &[Arg::from(id)], DEFAULT_NONCE_NAME)
        .map_err(|e| e.status_code())?;
    info!("Deleted post {} ({:?})", id, verification);
    Ok(Html(format!("Post {} deleted", id)))
}

async fn trash_post(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    jar: CookieJar,
    headers: HeaderMap,
    uri: Uri,
) -> Result<impl IntoResponse, StatusCode> {
    let request = nonce_request(&app_state, &jar, &headers, &uri)?;
    let host = RequestHost::new(&app_state.config, &request);

    let verification = app_state
        .nonces
        .get("trash-post")
        .is_valid_for_ajax(&host, &[Arg::from(id)], None, true)
        .map_err(|e| e.status_code())?;
    Ok(Json(verification))
}

async fn debug(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    uri: Uri,
) -> Result<impl IntoResponse, StatusCode> {
    let request = nonce_request(&app_state, &jar, &headers, &uri)?;
    let host = RequestHost::new(&app_state.config, &request);

    let nonce = app_state.nonces.get("qwerty");
    let info = nonce.debug_info(&host);
    let extra = nonce.extra_debug_info(&host).map_err(|e| {
        error!("Failed to collect debug info: {}", e);
        e.status_code()
    })?;
    Ok(Json(serde_json::json!({ "info": info, "extra": extra })))
}

// Builds the nonce view of an incoming request.
// RequestHost needs the full url, so get HOST from header and path
fn nonce_request(
    app_state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<NonceRequest, StatusCode> {
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let full_url = format!("http://{}{}", host, path);

    let mut request = NonceRequest::from_url(&full_url).map_err(|e| {
        error!("Failed to parse url: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    if let Some(referer) = headers.get(REFERER).and_then(|v| v.to_str().ok()) {
        request = request.with_referer(referer);
    }

    // Visitors with a live session count as the demo user
    let session_token = match jar.get(COOKIE_KEY) {
        Some(cookie) => app_state
            .sessions
            .lock()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .get(cookie.value())
            .cloned(),
        None => None,
    };
    Ok(match session_token {
        Some(session_token) => request.with_user_id(1).with_session_token(session_token),
        None => request,
    })
}

#[derive(Debug)]
struct AppState {
    config: Config,
    nonces: NonceRegistry,
    sessions: Mutex<HashMap<String, SessionToken>>,
}

impl AppState {
    fn new(config: Config, nonces: NonceRegistry) -> Self {
        Self {
            config,
            nonces,
            sessions: Mutex::default(),
        }
    }
}
