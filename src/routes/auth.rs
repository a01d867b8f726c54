//! routes/auth.rs — conventional auth store: users, invites, sessions
//! (stateless JWT). The first registered account bootstraps as admin;
//! everyone after needs an unused invite code.
use std::sync::Arc;

use axum::{
    routing::post,
    response::IntoResponse,
    extract::{Extension, Json},
    http::{HeaderMap, StatusCode},
    Router,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::{AppErr, AppResult, bad},
    store::now_ms,
    utils::jwt,
};

#[derive(Deserialize)]
struct RegisterInput {
    username: String,
    password: String,
    invite: Option<String>,
}

#[derive(Deserialize)]
struct LoginInput {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct TokenJson {
    token: String,
    user_id: String,
    is_admin: bool,
}

#[derive(Serialize)]
struct InviteJson {
    code: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/invites", post(create_invite))
}

/* ---------------- Register ---------------- */
async fn register(
    Extension(pool): Extension<SqlitePool>,
    Json(p): Json<RegisterInput>,
) -> AppResult<impl IntoResponse> {
    if p.username.trim().is_empty() || p.password.is_empty() {
        return Err(bad("username and password required"));
    }

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await?;
    let is_admin = count == 0;
    let uid = uuid::Uuid::new_v4().to_string();

    if !is_admin {
        let code = p.invite.as_deref().ok_or_else(|| bad("invite required"))?;
        let claimed = sqlx::query("UPDATE invites SET used_by = ? WHERE code = ? AND used_by IS NULL")
            .bind(&uid)
            .bind(code)
            .execute(&pool)
            .await?;
        if claimed.rows_affected() == 0 {
            return Err(bad("invalid or used invite"));
        }
    }

    sqlx::query("INSERT INTO users (id, username, password, is_admin, created_at) VALUES (?,?,?,?,?)")
        .bind(&uid)
        .bind(&p.username)
        .bind(hash_password(&p.password))
        .bind(is_admin)
        .bind(now_ms())
        .execute(&pool)
        .await?;

    Ok(StatusCode::CREATED)
}

/* ---------------- Login ---------------- */
async fn login(
    Extension(pool): Extension<SqlitePool>,
    Extension(cfg): Extension<Arc<Config>>,
    Json(p): Json<LoginInput>,
) -> AppResult<Json<TokenJson>> {
    let (id, pwd, is_admin): (String, String, bool) =
        sqlx::query_as("SELECT id, password, is_admin FROM users WHERE username = ?")
            .bind(&p.username)
            .fetch_optional(&pool)
            .await?
            .ok_or_else(|| AppErr::Bad("user not found".into()))?;

    if !verify_password(&pwd, &p.password) {
        return Err(AppErr::Unauthorized("wrong password".into()));
    }

    let token = jwt::sign(&id, is_admin, &cfg.jwt_secret);
    Ok(Json(TokenJson { token, user_id: id, is_admin }))
}

/* ---------------- Invites ---------------- */
async fn create_invite(
    headers: HeaderMap,
    Extension(pool): Extension<SqlitePool>,
    Extension(cfg): Extension<Arc<Config>>,
) -> AppResult<Json<InviteJson>> {
    let claims = jwt::require_admin(&headers, &cfg.jwt_secret)?;
    let code = nanoid::nanoid!(10);
    sqlx::query("INSERT INTO invites (code, created_by, created_at) VALUES (?,?,?)")
        .bind(&code)
        .bind(&claims.sub)
        .bind(now_ms())
        .execute(&pool)
        .await?;
    Ok(Json(InviteJson { code }))
}

/* ---------------- Password digests ---------------- */
fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::random();
    let salt = hex(&salt);
    let d = digest(&salt, password);
    format!("{salt}${d}")
}

fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, d)) => digest(salt, password) == d,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut h = Sha256::new();
    h.update(salt.as_bytes());
    h.update(b"$");
    h.update(password.as_bytes());
    hex(h.finalize().as_slice())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
