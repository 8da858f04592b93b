//! Authentication handlers

use crate::models::*;
use crate::validation::validate_registration_role;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use validator::Validate;

use super::AppState;

/// Session cookie name
pub const SESSION_COOKIE: &str = "rms_session";

/// Rate limit: max attempts per IP per hour
pub(crate) const MAX_AUTH_ATTEMPTS: i64 = 10;

// =============================================================================
// Login Endpoint
// =============================================================================

/// Log in with email and password
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> impl IntoResponse {
    let client_ip = get_client_ip(&headers, &state.trusted_proxies);

    // Check rate limit
    if !check_rate_limit(&state.pool, &client_ip, "login").await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::SET_COOKIE, "".to_string())],
            Json(ApiResponse::<UserResponse>::error(
                "Too many login attempts. Please try again later.",
            )),
        );
    }

    // Record attempt
    record_attempt(&state.pool, &client_ip, "login").await;

    // Find user
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&input.email)
        .fetch_optional(&state.pool)
        .await;

    let user = match user {
        Ok(Some(u)) => u,
        Ok(None) | Err(_) => {
            // Don't reveal whether the email exists
            return (
                StatusCode::UNAUTHORIZED,
                [(header::SET_COOKIE, "".to_string())],
                Json(ApiResponse::error("Invalid email or password")),
            );
        }
    };

    // Verify password
    let parsed_hash = match PasswordHash::new(&user.password_hash) {
        Ok(h) => h,
        Err(_) => {
            tracing::error!("Invalid password hash in database for user {}", user.email);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::SET_COOKIE, "".to_string())],
                Json(ApiResponse::error("Authentication error")),
            );
        }
    };

    if Argon2::default()
        .verify_password(input.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::SET_COOKIE, "".to_string())],
            Json(ApiResponse::error("Invalid email or password")),
        );
    }

    // Generate session token
    let token = generate_session_token();
    let token_hash = hash_token(&token);
    let expires_at = Utc::now() + Duration::hours(state.session_expiry_hours);

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.chars().take(500).collect::<String>());

    // Create session
    let session_result = sqlx::query(
        r#"
        INSERT INTO sessions (user_id, token_hash, expires_at, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user.id)
    .bind(&token_hash)
    .bind(expires_at)
    .bind(&client_ip)
    .bind(&user_agent)
    .execute(&state.pool)
    .await;

    if session_result.is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::SET_COOKIE, "".to_string())],
            Json(ApiResponse::error("Failed to create session")),
        );
    }

    // Log audit event
    let _ = sqlx::query(
        r#"
        INSERT INTO audit_log (action, entity_type, entity_id, actor_id, actor_ip)
        VALUES ('user_login', 'user', $1, $1, $2)
        "#,
    )
    .bind(user.id)
    .bind(&client_ip)
    .execute(&state.pool)
    .await;

    // Set secure cookie
    let secure_flag = if state.is_production { "; Secure" } else { "" };
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        state.session_expiry_hours * 3600,
        secure_flag
    );

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(UserResponse::from(user))),
    )
}

// =============================================================================
// Registration Endpoint
// =============================================================================

/// Open registration for unprivileged accounts
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<RegisterRequest>,
) -> impl IntoResponse {
    let client_ip = get_client_ip(&headers, &state.trusted_proxies);

    if !check_rate_limit(&state.pool, &client_ip, "register").await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<UserResponse>::error(
                "Too many registration attempts. Please try again later.",
            )),
        );
    }
    record_attempt(&state.pool, &client_ip, "register").await;

    // Validate input
    if let Err(e) = input.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        );
    }

    let role = input.role.unwrap_or(UserRole::Student);
    if let Err(e) = validate_registration_role(role) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        );
    }

    // Reject duplicate emails up front
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
        .bind(&input.email)
        .fetch_one(&state.pool)
        .await
        .unwrap_or(false);

    if exists {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("A user with this email already exists")),
        );
    }

    let password_hash = match hash_password(&input.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Failed to hash password: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Registration failed")),
            );
        }
    };

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(&input.email)
    .bind(&password_hash)
    .bind(role)
    .fetch_one(&state.pool)
    .await;

    match user {
        Ok(user) => {
            let _ = sqlx::query(
                r#"
                INSERT INTO audit_log (action, entity_type, entity_id, actor_id, actor_ip)
                VALUES ('user_registered', 'user', $1, $1, $2)
                "#,
            )
            .bind(user.id)
            .bind(&client_ip)
            .execute(&state.pool)
            .await;

            (
                StatusCode::CREATED,
                Json(ApiResponse::success(UserResponse::from(user))),
            )
        }
        Err(e) => {
            tracing::error!("Failed to create user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Registration failed")),
            )
        }
    }
}

// =============================================================================
// Logout Endpoint
// =============================================================================

/// Log out and end the session
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let token = extract_session_token(&headers);
    let client_ip = get_client_ip(&headers, &state.trusted_proxies);

    if let Some(token) = token {
        let token_hash = hash_token(&token);

        // Get session for audit log
        let session =
            sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token_hash = $1")
                .bind(&token_hash)
                .fetch_optional(&state.pool)
                .await
                .ok()
                .flatten();

        // Delete session
        let _ = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(&token_hash)
            .execute(&state.pool)
            .await;

        // Log audit event
        if let Some(session) = session {
            let _ = sqlx::query(
                r#"
                INSERT INTO audit_log (action, entity_type, entity_id, actor_id, actor_ip)
                VALUES ('user_logout', 'user', $1, $1, $2)
                "#,
            )
            .bind(session.user_id)
            .bind(&client_ip)
            .execute(&state.pool)
            .await;
        }
    }

    // Clear cookie
    let secure_flag = if state.is_production { "; Secure" } else { "" };
    let cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0{}",
        SESSION_COOKIE, secure_flag
    );

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(())),
    )
}

// =============================================================================
// Current User Endpoint
// =============================================================================

/// Get the currently authenticated user
pub async fn get_current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    match validate_session(&state.pool, &headers).await {
        Some(user) => (
            StatusCode::OK,
            Json(ApiResponse::success(UserResponse::from(user))),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Not authenticated")),
        ),
    }
}

// =============================================================================
// Session Validation
// =============================================================================

/// Validate a session from request headers
pub async fn validate_session(pool: &PgPool, headers: &HeaderMap) -> Option<User> {
    let token = extract_session_token(headers)?;
    let token_hash = hash_token(&token);

    // Find valid session
    let session = sqlx::query_as::<_, Session>(
        r#"
        SELECT * FROM sessions
        WHERE token_hash = $1 AND expires_at > NOW()
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await
    .ok()??;

    // Get associated user
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(session.user_id)
        .fetch_optional(pool)
        .await
        .ok()?
}

// =============================================================================
// Password Utilities
// =============================================================================

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

// =============================================================================
// Helper Functions
// =============================================================================

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(&format!("{}=", SESSION_COOKIE)) {
            return Some(value.to_string());
        }
    }

    None
}

pub(crate) fn generate_session_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolve the client IP for rate limiting and audit records.
///
/// X-Forwarded-For is honored as-is when no trusted proxy prefixes are
/// configured (development). When prefixes are configured, every proxy hop
/// in the chain must match one of them, otherwise the header is ignored.
pub(crate) fn get_client_ip(headers: &HeaderMap, trusted_proxies: &[String]) -> String {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let hops: Vec<&str> = xff.split(',').map(str::trim).collect();
        if let Some((client, proxies)) = hops.split_first() {
            let proxies_trusted = trusted_proxies.is_empty()
                || proxies
                    .iter()
                    .all(|p| trusted_proxies.iter().any(|t| p.starts_with(t.as_str())));
            if proxies_trusted && !client.is_empty() {
                return client.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return real_ip.to_string();
    }

    "unknown".to_string()
}

pub(crate) async fn check_rate_limit(pool: &PgPool, ip: &str, endpoint: &str) -> bool {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM rate_limit_attempts
        WHERE ip_address = $1 AND endpoint = $2
        AND attempted_at > NOW() - INTERVAL '1 hour'
        "#,
    )
    .bind(ip)
    .bind(endpoint)
    .fetch_one(pool)
    .await
    .unwrap_or(0);

    count < MAX_AUTH_ATTEMPTS
}

pub(crate) async fn record_attempt(pool: &PgPool, ip: &str, endpoint: &str) {
    let _ = sqlx::query("INSERT INTO rate_limit_attempts (ip_address, endpoint) VALUES ($1, $2)")
        .bind(ip)
        .bind(endpoint)
        .execute(pool)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_sha256() {
        let hash = hash_token("test-session-token");
        // SHA-256 produces 64-character hex string
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_token_is_deterministic() {
        let hash1 = hash_token("same-token");
        let hash2 = hash_token("same-token");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_generate_session_token_length() {
        let token = generate_session_token();
        // 32 random bytes = 64 hex chars
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_session_token_unique() {
        let t1 = generate_session_token();
        let t2 = generate_session_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_extract_session_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "rms_session=abc123xyz; other=xyz".parse().unwrap(),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc123xyz"));
    }

    #[test]
    fn test_extract_session_token_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "other=xyz".parse().unwrap());
        assert_eq!(extract_session_token(&headers), None);

        let empty = HeaderMap::new();
        assert_eq!(extract_session_token(&empty), None);
    }

    #[test]
    fn test_get_client_ip_without_proxies_uses_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(get_client_ip(&headers, &[]), "203.0.113.7");
    }

    #[test]
    fn test_get_client_ip_rejects_untrusted_chain() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.7, 198.51.100.9".parse().unwrap(),
        );
        let trusted = vec!["10.0.0.".to_string()];
        assert_eq!(get_client_ip(&headers, &trusted), "unknown");
    }

    #[test]
    fn test_get_client_ip_accepts_trusted_chain() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.5".parse().unwrap());
        let trusted = vec!["10.0.0.".to_string()];
        assert_eq!(get_client_ip(&headers, &trusted), "203.0.113.7");
    }

    #[test]
    fn test_get_client_ip_no_headers() {
        let headers = HeaderMap::new();
        assert_eq!(get_client_ip(&headers, &[]), "unknown");
    }
}
