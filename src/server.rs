//! HTTP API server.
//!
//! Exposes the search pipeline and the account endpoints as a JSON HTTP API
//! for the storefront UI.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/search` | Query search, or price comparison for a product |
//! | `POST` | `/api/nike-products` | Raw listings from the Nike source only |
//! | `POST` | `/api/auth/signup` | Create an account |
//! | `POST` | `/api/auth/signin` | Check credentials, set the session cookie |
//! | `POST` | `/api/auth/signout` | Clear the session cookie |
//! | `GET`  | `/api/auth/me` | Current account and search history |
//! | `PUT`  | `/api/auth/update-profile` | Change name, email or password |
//! | `POST` | `/api/auth/forgot-password` | Email a password-reset token |
//! | `POST` | `/api/auth/validate-reset-token` | Check a reset token before asking for a new password |
//! | `POST` | `/api/auth/reset-password` | Set a new password with a reset token |
//! | `POST` | `/api/auth/verify-email` | Confirm the address with a verification token |
//! | `GET`  | `/health` | Health check (crate and vocabulary versions) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must be at most 200 characters" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `conflict` (409), `rate_limited` (429), `internal` (500). Internal errors
//! carry a fixed message; the cause is only written to the server log.
//!
//! Adapter failures are not errors: a search where both sources fail is a
//! `200` with empty product lists and both entries of `errors` set.
//!
//! # Rate limiting
//!
//! The search endpoints share one fixed-window gate keyed by client address
//! (see [`crate::ratelimit`]). Successful responses carry
//! `x-ratelimit-remaining`.
//!
//! # Email
//!
//! No mail transport is configured. Reset and verification tokens are
//! logged at `info` (recipient and expiry) and `debug` (the token itself).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted, so pre-flight `OPTIONS`
//! requests from browser clients always succeed.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{
        header::{HeaderName, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::aggregate::{aggregate, compare_prices, SourceErrors};
use crate::assistant::{Assistant, Language};
use crate::config::Config;
use crate::models::{Company, ProductCandidate};
use crate::ratelimit::{client_identifier, Decision, RateLimiter};
use crate::session::{
    clear_cookie, cookie_value, hash_password, one_time_token, session_cookie,
    validate_password, verify_password, Claims, SessionSigner,
};
use crate::traits::AdapterSet;
use crate::users::{
    spawn_history_hook, EmailTaken, InMemoryUserStore, NewUser, OneTimeToken, ProfileUpdate,
    PublicUser, Redemption, TokenCheck, TokenPurpose, User, UserStore,
};
use crate::vocab::VOCABULARY_VERSION;

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    adapters: AdapterSet,
    limiter: Arc<RateLimiter>,
    users: Arc<dyn UserStore>,
    sessions: Arc<SessionSigner>,
    assistant: Arc<Assistant>,
}

impl AppState {
    /// Wires the server components for `config` around the given adapters
    /// and user store.
    pub fn new(
        config: &Config,
        adapters: AdapterSet,
        users: Arc<dyn UserStore>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            config: Arc::new(config.clone()),
            adapters,
            limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            users,
            sessions: Arc::new(SessionSigner::from_config(&config.auth)),
            assistant: Arc::new(Assistant::from_config(&config.assistant)?),
        })
    }
}

/// Starts the HTTP server with the retailer adapters and an in-memory
/// user store built from `config`.
///
/// This is the entry point used by the `shopc serve` command.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let adapters = AdapterSet::from_config(config)?;
    run_server_with_adapters(config, adapters, Arc::new(InMemoryUserStore::new())).await
}

/// Starts the HTTP server around caller-supplied adapters and user store.
///
/// # Example
///
/// ```rust,no_run
/// use shop_compare::server::run_server_with_adapters;
/// use shop_compare::traits::AdapterSet;
/// use shop_compare::users::InMemoryUserStore;
/// use std::sync::Arc;
///
/// # async fn example(config: &shop_compare::config::Config) -> anyhow::Result<()> {
/// let adapters = AdapterSet::from_config(config)?;
/// run_server_with_adapters(config, adapters, Arc::new(InMemoryUserStore::new())).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server_with_adapters(
    config: &Config,
    adapters: AdapterSet,
    users: Arc<dyn UserStore>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config, adapters, users)?;
    let app = router(state);

    println!("shop-compare listening on http://{}", bind_addr);
    tracing::info!(
        bind = %bind_addr,
        primary = config.adapters.amazon.enabled,
        secondary = config.adapters.nike.enabled,
        assistant = %config.assistant.provider,
        "server starting"
    );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router with every route and the CORS layer.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(RATE_LIMIT_REMAINING)]);

    Router::new()
        .route("/api/search", post(handle_search))
        .route("/api/nike-products", post(handle_nike_products))
        .route("/api/auth/signup", post(handle_signup))
        .route("/api/auth/signin", post(handle_signin))
        .route("/api/auth/signout", post(handle_signout))
        .route("/api/auth/me", get(handle_me))
        .route("/api/auth/update-profile", put(handle_update_profile))
        .route("/api/auth/forgot-password", post(handle_forgot_password))
        .route("/api/auth/validate-reset-token", post(handle_validate_reset_token))
        .route("/api/auth/reset-password", post(handle_reset_password))
        .route("/api/auth/verify-email", post(handle_verify_email))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"rate_limited"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn unauthorized(message: impl Into<String>) -> AppError {
    app_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

fn conflict(message: impl Into<String>) -> AppError {
    app_error(StatusCode::CONFLICT, "conflict", message)
}

fn rate_limited() -> AppError {
    app_error(
        StatusCode::TOO_MANY_REQUESTS,
        "rate_limited",
        "Too many requests, please try again later",
    )
}

/// Logs `err` in full and returns an error that reveals nothing about it.
fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{:#}", err), "internal error");
    app_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "Internal server error",
    )
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

/// Runs `fut` on its own task so that a panic inside the pipeline turns
/// into a 500 instead of a dropped connection.
async fn isolate<F>(fut: F) -> Result<F::Output, AppError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(fut)
        .await
        .map_err(|e| internal(anyhow::anyhow!("request task failed: {}", e)))
}

// ============ Request gate ============

fn gate(state: &AppState, headers: &HeaderMap) -> Result<Decision, AppError> {
    let client = client_identifier(headers);
    let decision = state.limiter.check(&client);
    if !decision.allowed {
        tracing::warn!(client = %client, "rate limit exceeded");
        return Err(rate_limited());
    }
    Ok(decision)
}

fn with_remaining(decision: Decision, body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    response
}

/// Substrings that mark a query as script injection rather than a search.
const DISALLOWED_QUERY_FRAGMENTS: &[&str] = &["<script", "javascript:"];

fn check_query(query: &str, max_len: usize) -> Result<(), AppError> {
    if query.chars().count() > max_len {
        return Err(bad_request(format!(
            "query must be at most {} characters",
            max_len
        )));
    }
    let lowered = query.to_lowercase();
    if DISALLOWED_QUERY_FRAGMENTS
        .iter()
        .any(|fragment| lowered.contains(fragment))
    {
        return Err(bad_request("query contains disallowed content"));
    }
    Ok(())
}

fn parse_language(code: Option<&str>) -> Result<Language, AppError> {
    match code {
        None => Ok(Language::default()),
        Some(code) => Language::parse(code).ok_or_else(|| {
            bad_request(format!(
                "language must be one of: {}",
                Language::SUPPORTED.join(", ")
            ))
        }),
    }
}

// ============ POST /api/search ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    product: Option<ProductPayload>,
    #[serde(default)]
    language: Option<String>,
}

/// A product record sent back by the client. Only title, price and url
/// are required.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ProductPayload {
    fn into_candidate(self) -> Result<ProductCandidate, AppError> {
        fn required(field: Option<String>, name: &str) -> Result<String, AppError> {
            field
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| bad_request(format!("product.{} is required", name)))
        }

        let title = required(self.title, "title")?;
        let price = required(self.price, "price")?;
        let url = required(self.url, "url")?;
        let company = match self.company.as_deref() {
            Some(c) if c.eq_ignore_ascii_case("nike") => Company::Nike,
            _ => Company::Amazon,
        };

        let mut candidate =
            ProductCandidate::new(title, price, self.image.unwrap_or_default(), url, company);
        candidate.description = self.description;
        Ok(candidate)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    products: Vec<ProductCandidate>,
    load_more_products: Vec<ProductCandidate>,
    has_more_products: bool,
    errors: SourceErrors,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_response: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductResponse {
    prices: Vec<ProductCandidate>,
    errors: SourceErrors,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_response: Option<String>,
}

/// Handler for `POST /api/search`.
///
/// With a `product`, compares prices for it across both sources. Otherwise
/// runs the query pipeline. A signed-in caller's query is appended to their
/// history after the response has been computed.
async fn handle_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let decision = gate(&state, &headers)?;
    let req = json_body(body)?;
    let language = parse_language(req.language.as_deref())?;
    if let Some(query) = &req.query {
        check_query(query, state.config.search.max_query_length)?;
    }

    if let Some(payload) = req.product {
        let product = payload.into_candidate()?;
        let response = isolate(run_product(state.clone(), product, req.query, language)).await?;
        return Ok(with_remaining(decision, Json(response)));
    }

    let query = req
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| bad_request("query or product is required"))?
        .to_string();

    let response = isolate(run_query(state.clone(), query.clone(), language)).await?;

    if let Some(user_id) = session_user(&state, &headers) {
        spawn_history_hook(
            state.users.clone(),
            user_id,
            query,
            state.config.search.history_limit,
        );
    }

    Ok(with_remaining(decision, Json(response)))
}

async fn run_query(state: AppState, query: String, language: Language) -> SearchResponse {
    let result = aggregate(&query, &state.adapters, &state.config.search).await;

    let ai_response = match state
        .assistant
        .summarize_products(&query, &result.immediate, language)
        .await
    {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "assistant summary failed");
            None
        }
    };

    SearchResponse {
        has_more_products: result.has_more(),
        products: result.immediate,
        load_more_products: result.more,
        errors: result.errors,
        ai_response,
    }
}

async fn run_product(
    state: AppState,
    product: ProductCandidate,
    question: Option<String>,
    language: Language,
) -> ProductResponse {
    let comparison = compare_prices(&product.title, &state.adapters).await;

    let ai_response = match state
        .assistant
        .answer_product(&product, question.as_deref(), language)
        .await
    {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "assistant product answer failed");
            None
        }
    };

    ProductResponse {
        prices: comparison.prices,
        errors: comparison.errors,
        ai_response,
    }
}

// ============ POST /api/nike-products ============

#[derive(Deserialize)]
struct BrandProductsRequest {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Serialize)]
struct BrandProductsResponse {
    products: Vec<ProductCandidate>,
    success: bool,
}

/// Handler for `POST /api/nike-products`. Returns the secondary source's
/// listings unranked; a source failure is a 500.
async fn handle_nike_products(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<BrandProductsRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let decision = gate(&state, &headers)?;
    let req = json_body(body)?;
    let query = req
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("query is required"))?;
    check_query(&query, state.config.search.max_query_length)?;

    let products = state
        .adapters
        .secondary
        .fetch(query.trim())
        .await
        .map_err(|e| internal(e.context("brand products fetch failed")))?;

    Ok(with_remaining(
        decision,
        Json(BrandProductsResponse {
            products,
            success: true,
        }),
    ))
}

// ============ Accounts ============

#[derive(Serialize)]
struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    user: PublicUser,
}

fn user_response(message: Option<&'static str>, user: &User) -> Json<UserResponse> {
    Json(UserResponse {
        message,
        user: PublicUser::from(user),
    })
}

/// Verified session claims from the request cookie.
fn require_session(state: &AppState, headers: &HeaderMap) -> Result<Claims, AppError> {
    let token = cookie_value(headers, &state.config.auth.cookie_name)
        .ok_or_else(|| unauthorized("No token provided"))?;
    state.sessions.verify(&token).map_err(|e| {
        if e.to_string().contains("expired") {
            unauthorized("Token expired")
        } else {
            unauthorized("Invalid token")
        }
    })
}

fn session_user(state: &AppState, headers: &HeaderMap) -> Option<String> {
    require_session(state, headers).ok().map(|claims| claims.sub)
}

fn issue_cookie(state: &AppState, user: &User) -> Result<String, AppError> {
    let token = state.sessions.issue(&user.id, &user.email).map_err(internal)?;
    Ok(session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.sessions.ttl_secs(),
    ))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

async fn handle_signup(
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let req = json_body(body)?;
    let (Some(first_name), Some(last_name), Some(email), Some(password)) = (
        non_empty(req.first_name),
        non_empty(req.last_name),
        non_empty(req.email),
        non_empty(req.password),
    ) else {
        return Err(bad_request("All fields are required"));
    };
    if !email.contains('@') {
        return Err(bad_request("email is not valid"));
    }
    validate_password(&password).map_err(|e| bad_request(e.to_string()))?;

    let verification = new_token(state.config.auth.verification_token_ttl_secs);
    let user = state
        .users
        .create(NewUser {
            email,
            first_name,
            last_name,
            password_hash: hash_password(&password),
            verification_token: Some(verification.clone()),
        })
        .await
        .map_err(|e| {
            if e.is::<EmailTaken>() {
                conflict("Email already registered")
            } else {
                internal(e)
            }
        })?;

    tracing::info!(user = %user.id, "account created");
    send_token_email(TokenPurpose::EmailVerification, &user, &verification);
    Ok((
        StatusCode::CREATED,
        user_response(Some("Account created successfully"), &user),
    )
        .into_response())
}

#[derive(Deserialize)]
struct SigninRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

async fn handle_signin(
    State(state): State<AppState>,
    body: Result<Json<SigninRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let req = json_body(body)?;
    let (Some(email), Some(password)) = (non_empty(req.email), non_empty(req.password)) else {
        return Err(bad_request("Email and password are required"));
    };

    let user = state
        .users
        .find_by_email(&email)
        .await
        .map_err(internal)?
        .ok_or_else(|| unauthorized("Invalid credentials"))?;
    if !verify_password(&password, &user.password_hash).map_err(internal)? {
        return Err(unauthorized("Invalid credentials"));
    }

    let cookie = issue_cookie(&state, &user)?;
    Ok((
        [(SET_COOKIE, cookie)],
        user_response(Some("Sign in successful"), &user),
    )
        .into_response())
}

async fn handle_signout(State(state): State<AppState>) -> Response {
    (
        [(SET_COOKIE, clear_cookie(&state.config.auth.cookie_name))],
        Json(serde_json::json!({ "message": "Signed out" })),
    )
        .into_response()
}

async fn handle_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, AppError> {
    let claims = require_session(&state, &headers)?;
    let user = state
        .users
        .find_by_id(&claims.sub)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("User not found"))?;
    Ok(user_response(None, &user))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Handler for `PUT /api/auth/update-profile`. Re-issues the session
/// cookie so its claims follow an email change.
async fn handle_update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let claims = require_session(&state, &headers)?;
    let req = json_body(body)?;

    let email = non_empty(req.email);
    if email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(bad_request("email is not valid"));
    }
    let password_hash = match non_empty(req.password) {
        Some(p) => {
            validate_password(&p).map_err(|e| bad_request(e.to_string()))?;
            Some(hash_password(&p))
        }
        None => None,
    };

    let update = ProfileUpdate {
        email,
        first_name: non_empty(req.first_name),
        last_name: non_empty(req.last_name),
        password_hash,
    };
    let user = state
        .users
        .update_profile(&claims.sub, update)
        .await
        .map_err(|e| {
            if e.is::<EmailTaken>() {
                conflict("Email already registered")
            } else {
                internal(e)
            }
        })?
        .ok_or_else(|| not_found("User not found"))?;

    let cookie = issue_cookie(&state, &user)?;
    Ok((
        [(SET_COOKIE, cookie)],
        user_response(Some("Profile updated successfully"), &user),
    )
        .into_response())
}

// ============ Password reset and email verification ============

const RESET_LINK_SENT: &str =
    "If an account with that email exists, we've sent a password reset link.";

fn new_token(ttl_secs: i64) -> OneTimeToken {
    OneTimeToken::new(
        one_time_token(),
        chrono::Utc::now() + chrono::Duration::seconds(ttl_secs),
    )
}

/// Outbound email stand-in.
fn send_token_email(purpose: TokenPurpose, user: &User, token: &OneTimeToken) {
    tracing::info!(
        to = %user.email,
        purpose = purpose.as_str(),
        expires_at = %token.expires_at,
        "email delivery not configured, token logged instead"
    );
    tracing::debug!(purpose = purpose.as_str(), token = %token.value, "one-time token");
}

fn reset_token_user(check: TokenCheck) -> Result<User, AppError> {
    match check {
        TokenCheck::Valid(user) => Ok(user),
        TokenCheck::Invalid => Err(bad_request("Invalid reset token")),
        TokenCheck::Expired => Err(bad_request("Reset token has expired")),
    }
}

#[derive(Deserialize)]
struct ForgotPasswordRequest {
    #[serde(default)]
    email: Option<String>,
}

/// Handler for `POST /api/auth/forgot-password`. Answers the same way
/// whether or not the address is registered.
async fn handle_forgot_password(
    State(state): State<AppState>,
    body: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let req = json_body(body)?;
    let email = non_empty(req.email).ok_or_else(|| bad_request("Email is required"))?;

    let token = new_token(state.config.auth.reset_token_ttl_secs);
    match state
        .users
        .issue_token(&email, TokenPurpose::PasswordReset, token.clone())
        .await
        .map_err(internal)?
    {
        Some(user) => send_token_email(TokenPurpose::PasswordReset, &user, &token),
        None => tracing::debug!("password reset requested for unknown address"),
    }
    Ok(Json(serde_json::json!({ "message": RESET_LINK_SENT })))
}

#[derive(Deserialize)]
struct TokenRequest {
    #[serde(default)]
    token: Option<String>,
}

async fn handle_validate_reset_token(
    State(state): State<AppState>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let req = json_body(body)?;
    let token = non_empty(req.token).ok_or_else(|| bad_request("Token is required"))?;

    let check = state
        .users
        .check_token(TokenPurpose::PasswordReset, &token, chrono::Utc::now())
        .await
        .map_err(internal)?;
    reset_token_user(check)?;
    Ok(Json(serde_json::json!({ "message": "Token is valid" })))
}

#[derive(Deserialize)]
struct ResetPasswordRequest {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Handler for `POST /api/auth/reset-password`. The token is consumed only
/// when the new password is acceptable.
async fn handle_reset_password(
    State(state): State<AppState>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let req = json_body(body)?;
    let (Some(token), Some(password)) = (non_empty(req.token), non_empty(req.password)) else {
        return Err(bad_request("Token and password are required"));
    };
    validate_password(&password).map_err(|e| bad_request(e.to_string()))?;

    let check = state
        .users
        .redeem_token(
            &token,
            Redemption::ResetPassword {
                password_hash: hash_password(&password),
            },
            chrono::Utc::now(),
        )
        .await
        .map_err(internal)?;
    let user = reset_token_user(check)?;

    tracing::info!(user = %user.id, "password reset");
    Ok(Json(
        serde_json::json!({ "message": "Password reset successfully" }),
    ))
}

async fn handle_verify_email(
    State(state): State<AppState>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let req = json_body(body)?;
    let token =
        non_empty(req.token).ok_or_else(|| bad_request("Verification token is required"))?;

    let check = state
        .users
        .redeem_token(&token, Redemption::VerifyEmail, chrono::Utc::now())
        .await
        .map_err(internal)?;
    match check {
        TokenCheck::Valid(user) => {
            tracing::info!(user = %user.id, "email verified");
            Ok(user_response(Some("Email verified successfully"), &user))
        }
        TokenCheck::Invalid => Err(bad_request("Invalid verification token")),
        TokenCheck::Expired => Err(bad_request(
            "Verification token has expired. Please request a new one.",
        )),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
    /// Keyword table version used for ranking.
    vocabulary: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        vocabulary: VOCABULARY_VERSION.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_payload_requires_fields() {
        let payload: ProductPayload =
            serde_json::from_str(r#"{"title":"Pegasus 41","price":"$112","company":"Nike"}"#)
                .unwrap();
        let err = payload.into_candidate().unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "product.url is required");

        let payload: ProductPayload = serde_json::from_str(
            r#"{"title":"Pegasus 41","price":"$112","url":"https://www.nike.com/t/p","company":"Nike"}"#,
        )
        .unwrap();
        let candidate = payload.into_candidate().unwrap();
        assert_eq!(candidate.company, Company::Nike);
    }

    #[test]
    fn test_parse_language() {
        assert_eq!(parse_language(None).unwrap(), Language::En);
        assert_eq!(parse_language(Some("fr")).unwrap(), Language::Fr);
        let err = parse_language(Some("de")).unwrap_err();
        assert_eq!(err.code, "bad_request");
    }

    #[test]
    fn test_check_query_counts_characters() {
        assert!(check_query(&"é".repeat(200), 200).is_ok());
        assert!(check_query(&"a".repeat(201), 200).is_err());
    }

    #[test]
    fn test_check_query_rejects_script_content() {
        for q in [
            "shoes <script>alert(1)</script>",
            "<SCRIPT src=x>",
            "JavaScript:alert(1)",
        ] {
            let err = check_query(q, 200).unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert_eq!(err.message, "query contains disallowed content");
        }
        assert!(check_query("java script book", 200).is_ok());
    }

    #[test]
    fn test_search_response_shape() {
        let response = SearchResponse {
            products: vec![],
            load_more_products: vec![],
            has_more_products: false,
            errors: SourceErrors {
                primary: Some("timeout".into()),
                secondary: None,
            },
            ai_response: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "products": [],
                "loadMoreProducts": [],
                "hasMoreProducts": false,
                "errors": { "amazon": "timeout", "nike": null }
            })
        );
    }
}
