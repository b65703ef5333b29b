//! Authentication service routes

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{Method, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use std::{sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

use crate::{
    cookies,
    error::{ApiResponse, AuthError, AuthResult},
    middleware::{AuthenticatedUser, require_session},
    models::{LoginCredentials, NewUser, RegisterRequest, User},
    state::AppState,
    store::StoreError,
    validation,
};

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/me", get(current_user))
        .route("/user/:userid", get(get_user))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/ping", get(ping))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .merge(protected)
        .layer(cors_layer())
        .with_state(state)
}

/// Open CORS policy: any origin, no credentials, preflight cached for 5 minutes
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers([header::LINK])
        .max_age(Duration::from_secs(300))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// Liveness heartbeat
pub async fn ping() -> &'static str {
    "."
}

fn bad_json(rejection: JsonRejection) -> AuthError {
    AuthError::BadRequest(rejection.body_text())
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AuthResult<impl IntoResponse> {
    let Json(request) = payload.map_err(bad_json)?;
    validation::validate_registration(&request).map_err(AuthError::BadRequest)?;

    if state.store.get_user_by_email(&request.email).await?.is_some() {
        return Err(duplicate_email(&request.email));
    }
    if state
        .store
        .get_user_by_username(&request.username)
        .await?
        .is_some()
    {
        return Err(duplicate_username(&request.username));
    }

    let verifier = Arc::clone(&state.verifier);
    let password = request.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || verifier.hash(&password))
        .await
        .context("password hashing task failed")??;

    let new_user = NewUser {
        name: request.name,
        email: request.email,
        username: request.username,
        password_hash,
    };

    // A concurrent registration can still win the race past the checks above
    let user = match state.store.create_user(&new_user).await {
        Ok(user) => user,
        Err(StoreError::Conflict(constraint)) if constraint.contains("username") => {
            return Err(duplicate_username(&new_user.username));
        }
        Err(StoreError::Conflict(_)) => return Err(duplicate_email(&new_user.email)),
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, "User registered");

    let message = format!("User created successfully with id {}", user.id);
    Ok((StatusCode::OK, Json(ApiResponse::success(message, user))))
}

fn duplicate_email(email: &str) -> AuthError {
    AuthError::BadRequest(format!("user with email {email} already exists"))
}

fn duplicate_username(username: &str) -> AuthError {
    AuthError::BadRequest(format!("user with username {username} already exists"))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginCredentials>, JsonRejection>,
) -> AuthResult<impl IntoResponse> {
    let Json(credentials) = payload.map_err(bad_json)?;
    validation::validate_login(&credentials).map_err(AuthError::BadRequest)?;

    let issued = state
        .issuer
        .login(&credentials.email, &credentials.password)
        .await?;
    let headers = state.cookies.issue(
        &issued.session_token,
        &issued.csrf_token,
        issued.expires_at,
    )?;

    Ok((
        StatusCode::OK,
        headers,
        Json(ApiResponse::success("Login successful", issued.user)),
    ))
}

/// Logout endpoint
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> AuthResult<impl IntoResponse> {
    let session_token = cookies::session_token(&jar);
    state.revoker.logout(session_token.as_deref()).await?;

    let headers = state.cookies.clear()?;
    Ok((
        StatusCode::OK,
        headers,
        Json(ApiResponse::message("logout successful")),
    ))
}

async fn find_user(state: &AppState, id: Uuid) -> AuthResult<User> {
    state
        .store
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| AuthError::NotFound("user not found".to_string()))
}

/// The authenticated caller's own record
pub async fn current_user(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> AuthResult<Json<ApiResponse<User>>> {
    let user = find_user(&state, user_id).await?;
    Ok(Json(ApiResponse::success("success", user)))
}

/// Look up any user by id
pub async fn get_user(
    State(state): State<AppState>,
    Path(userid): Path<String>,
) -> AuthResult<Json<ApiResponse<User>>> {
    let id = Uuid::parse_str(&userid)
        .map_err(|_| AuthError::BadRequest(format!("invalid user id: {userid}")))?;
    let user = find_user(&state, id).await?;
    Ok(Json(ApiResponse::success("success", user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        activity::{ActivityConfig, ActivityRecorder},
        config::AuthConfig,
        session::test_support::PlainVerifier,
        store::{MemoryStore, SessionStore},
        token::OsTokenGenerator,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{HeaderMap, Request, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_app() -> (Router, MemoryStore) {
        let store = MemoryStore::new();
        let shared: Arc<dyn SessionStore> = Arc::new(store.clone());
        let activity = ActivityRecorder::start(Arc::clone(&shared), ActivityConfig::default());
        let state = AppState::new(
            shared,
            Arc::new(PlainVerifier),
            Arc::new(OsTokenGenerator),
            activity,
            &AuthConfig::default(),
        );
        (create_router(state), store)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with(uri: &str, session: Option<&str>, csrf: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(session) = session {
            builder = builder.header(header::COOKIE, format!("session_token={session}"));
        }
        if let Some(csrf) = csrf {
            builder = builder.header(cookies::CSRF_HEADER_NAME, csrf);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|c| c.strip_prefix(&format!("{name}=")).map(str::to_string))
            .and_then(|rest| rest.split(';').next().map(str::to_string))
    }

    fn alice() -> Value {
        json!({
            "name": "Alice Liddell",
            "email": "alice@example.com",
            "username": "alice",
            "password": "password123"
        })
    }

    async fn register_and_login(app: &Router) -> (String, String, String) {
        let (status, _, body) = send(app, post_json("/register", alice())).await;
        assert_eq!(status, StatusCode::OK);
        let user_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, headers, _) = send(
            app,
            post_json(
                "/login",
                json!({"email": "alice@example.com", "password": "password123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let session = cookie_value(&headers, cookies::SESSION_COOKIE_NAME).unwrap();
        let csrf = cookie_value(&headers, cookies::CSRF_COOKIE_NAME).unwrap();
        (user_id, session, csrf)
    }

    #[tokio::test]
    async fn test_health_and_ping() {
        let (app, _) = test_app();

        let (status, _, body) = send(&app, get_with("/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let response = app
            .clone()
            .oneshot(get_with("/ping", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b".");
    }

    #[tokio::test]
    async fn test_cors_preflight_is_answered() {
        let (app, _) = test_app();

        let preflight = Request::builder()
            .method("OPTIONS")
            .uri("/login")
            .header(header::ORIGIN, "http://frontend.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(preflight).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "300");
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        for method in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
            assert!(methods.contains(method), "{methods}");
        }
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }

    #[tokio::test]
    async fn test_cors_headers_on_regular_responses() {
        let (app, _) = test_app();

        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://frontend.example.com")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_EXPOSE_HEADERS], "link");
    }

    #[tokio::test]
    async fn test_register_creates_user_without_exposing_hash() {
        let (app, store) = test_app();

        let (status, _, body) = send(&app, post_json("/register", alice())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], false);
        let id = body["data"]["id"].as_str().unwrap();
        assert_eq!(
            body["message"],
            format!("User created successfully with id {id}")
        );
        assert!(body["data"].get("password_hash").is_none());

        let stored = store
            .get_user_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.password_hash, "plain:password123");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let (app, _) = test_app();
        send(&app, post_json("/register", alice())).await;

        let (status, _, body) = send(&app, post_json("/register", alice())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "user with email alice@example.com already exists");

        let mut same_username = alice();
        same_username["email"] = json!("other@example.com");
        let (status, _, body) = send(&app, post_json("/register", same_username)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "user with username alice already exists");
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_input() {
        let (app, store) = test_app();

        let mut short_password = alice();
        short_password["password"] = json!("short");
        let (status, _, body) = send(&app, post_json("/register", short_password)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], true);

        let malformed = Request::builder()
            .method("POST")
            .uri("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(&app, malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], true);

        assert!(store.get_user_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_sets_both_cookies() {
        let (app, _) = test_app();
        send(&app, post_json("/register", alice())).await;

        let (status, headers, body) = send(
            &app,
            post_json(
                "/login",
                json!({"email": "alice@example.com", "password": "password123"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["data"]["username"], "alice");
        assert!(body["data"].get("password_hash").is_none());

        let set_cookies: Vec<_> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(set_cookies.len(), 2);
        assert!(
            set_cookies
                .iter()
                .any(|c| c.starts_with("session_token=") && c.contains("HttpOnly"))
        );
        assert!(
            set_cookies
                .iter()
                .any(|c| c.starts_with("csrf_token=") && !c.contains("HttpOnly"))
        );
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (app, store) = test_app();
        send(&app, post_json("/register", alice())).await;

        let (status, headers, body) = send(
            &app,
            post_json(
                "/login",
                json!({"email": "alice@example.com", "password": "wrong-password"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "invalid email or password");
        assert!(headers.get(header::SET_COOKIE).is_none());

        let (status, _, body) = send(
            &app,
            post_json(
                "/login",
                json!({"email": "bob@example.com", "password": "password123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "invalid email or password");

        let (status, _, _) = send(&app, post_json("/login", json!({"email": "alice"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_protected_routes_require_session_and_csrf() {
        let (app, _) = test_app();
        let (user_id, session, csrf) = register_and_login(&app).await;

        let (status, _, body) = send(&app, get_with("/me", None, Some(&csrf))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "invalid session");

        let (status, _, body) = send(&app, get_with("/me", Some(&session), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "missing csrf token");

        let (status, _, body) = send(&app, get_with("/me", Some(&session), Some("forged"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "invalid csrf token");

        let (status, _, body) = send(&app, get_with("/me", Some(&session), Some(&csrf))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], user_id);
    }

    #[tokio::test]
    async fn test_get_user_by_id() {
        let (app, _) = test_app();
        let (user_id, session, csrf) = register_and_login(&app).await;

        let uri = format!("/user/{user_id}");
        let (status, _, body) = send(&app, get_with(&uri, Some(&session), Some(&csrf))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "alice@example.com");

        let (status, _, _) =
            send(&app, get_with("/user/not-a-uuid", Some(&session), Some(&csrf))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/user/{}", Uuid::new_v4());
        let (status, _, body) = send(&app, get_with(&uri, Some(&session), Some(&csrf))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "user not found");

        // Validation still runs before the path is inspected
        let (status, _, _) = send(&app, get_with("/user/not-a-uuid", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_revokes_and_clears_cookies() {
        let (app, _) = test_app();
        let (_, session, csrf) = register_and_login(&app).await;

        let logout = Request::builder()
            .method("POST")
            .uri("/logout")
            .header(header::COOKIE, format!("session_token={session}"))
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&app, logout).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "logout successful");
        assert_eq!(cookie_value(&headers, "session_token").as_deref(), Some(""));
        assert_eq!(cookie_value(&headers, "csrf_token").as_deref(), Some(""));

        let (status, _, body) = send(&app, get_with("/me", Some(&session), Some(&csrf))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "invalid session");

        let anonymous = Request::builder()
            .method("POST")
            .uri("/logout")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&app, anonymous).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
