use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    model::{role::Role, user::User},
    models::{Claims, LoginReqDto, TokenPair, TokenType, UserReq},
    state::AppState,
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues an access token plus a stored refresh token.
async fn issue_pair(
    pool: &MySqlPool,
    state: &AppState,
    user_id: u64,
    username: &str,
    role: u8,
) -> Result<TokenPair, HttpResponse> {
    let config = &state.config;
    let access_token = generate_access_token(
        user_id,
        username.to_string(),
        role,
        &config.jwt_secret,
        config.access_token_ttl,
    );
    let refresh = generate_refresh_token(
        user_id,
        username.to_string(),
        role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    );
    let (access_token, (refresh_token, refresh_claims)) = match (access_token, refresh) {
        (Ok(a), Ok(r)) => (a, r),
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, user_id, "Failed to sign token");
            return Err(HttpResponse::InternalServerError().finish());
        }
    };

    debug!(user_id, jti = %refresh_claims.jti, "Storing refresh token");
    if let Err(e) = store_refresh_token(pool, user_id, &refresh_claims).await {
        error!(error = %e, user_id, "Failed to store refresh token");
        return Err(HttpResponse::InternalServerError().finish());
    }

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

async fn store_refresh_token(pool: &MySqlPool, user_id: u64, claims: &Claims) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;
    Ok(())
}

/// Registers a user. Admin only.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = UserReq,
    responses(
        (status = 201, description = "User created"),
        (status = 400, description = "Empty username/password or unknown role"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Username already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn register(
    auth: AuthUser,
    user: web::Json<UserReq>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let username = user.username.trim().to_lowercase();
    if username.is_empty() || user.password.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "Username and password must not be empty"
        })));
    }
    let Some(role) = Role::from_id(user.role_id) else {
        return Ok(HttpResponse::BadRequest().json(json!({ "error": "Unknown role" })));
    };

    let hashed = hash_password(&user.password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let result = sqlx::query("INSERT INTO users (username, password, role_id) VALUES (?, ?, ?)")
        .bind(&username)
        .bind(hashed)
        .bind(role.id())
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(done) => {
            info!(user_id = done.last_insert_id(), admin_id = auth.user_id, "User registered");
            Ok(HttpResponse::Created().json(json!({
                "message": "User registered successfully",
                "id": done.last_insert_id()
            })))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
            Ok(HttpResponse::Conflict().json(json!({ "error": "Username already exists" })))
        }
        Err(e) => {
            error!(error = %e, "Failed to register user");
            Err(actix_web::error::ErrorInternalServerError("Internal Server Error"))
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, state, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
) -> impl Responder {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().body("Username or password required");
    }

    let db_user = match sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(u)) if u.is_active => u,
        Ok(_) => {
            info!("Invalid credentials: unknown or inactive user");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    let pair = match issue_pair(
        pool.get_ref(),
        &state,
        db_user.id,
        &db_user.username,
        db_user.role_id,
    )
    .await
    {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login
        warn!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    HttpResponse::Ok().json(pair)
}

/// Rotates a refresh token: the presented one is revoked, a new pair issued.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::Unauthorized().body("No token");
    };
    let claims = match verify_token(token, &state.config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::Unauthorized().finish(),
    };

    // revoke-if-live is the check: a replayed token matches no row
    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ? AND revoked = FALSE AND expires_at > NOW()",
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await;
    match revoked {
        Ok(done) if done.rows_affected() == 1 => {}
        Ok(_) => {
            info!(user_id = claims.user_id, "Refresh with revoked or unknown token");
            return HttpResponse::Unauthorized().finish();
        }
        Err(e) => {
            error!(error = %e, "Failed to revoke refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    }

    match issue_pair(pool.get_ref(), &state, claims.user_id, &claims.sub, claims.role).await {
        Ok(pair) => HttpResponse::Ok().json(pair),
        Err(resp) => resp,
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };
    let claims = match verify_token(token, &state.config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, "Failed to revoke refresh token on logout");
    }

    // success even if the token didn't exist
    HttpResponse::NoContent().finish()
}
