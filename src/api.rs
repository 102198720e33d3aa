use crate::{auth, config::Config, db, error::AppError, likes, model, tweets, users};
use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<SqliteConnectionManager>,
    pub config: Config,
    pub jwt_secret: Arc<Vec<u8>>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        let pool = db::init_pool(config.data_dir.join("chirp.db"))?;
        let secret = match &config.jwt_secret {
            Some(encoded) => STANDARD.decode(encoded).context("invalid auth secret")?,
            None => {
                tracing::warn!("no auth secret configured, generating an ephemeral one");
                auth::generate_secret()
            }
        };
        {
            let conn = pool.get()?;
            if users::count_users(&conn)? == 0 && !config.bootstrap.is_empty() {
                for entry in &config.bootstrap {
                    users::insert_user(
                        &conn,
                        &model::User {
                            id: Uuid::new_v4(),
                            name: entry.name.clone(),
                            email: entry.email.clone(),
                            image: entry.image.clone(),
                        },
                    )?;
                }
                tracing::info!(count = config.bootstrap.len(), "bootstrapped users");
            }
        }
        Ok(Self {
            pool,
            config,
            jwt_secret: Arc::new(secret),
        })
    }
}

/// Build the HTTP application router.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/tweets", post(create_tweet).get(list_tweets))
        .route("/api/tweets/:id/like", post(like_tweet).delete(unlike_tweet))
        .route("/api/me", get(me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));
    Router::new()
        .route("/api/health", get(health))
        .merge(protected)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Verify the bearer token, resolve the caller's user record and attach it
/// to the request. Every failure short-circuits with AuthError before any
/// business logic runs.
async fn auth_middleware<B>(
    State(state): State<AppState>,
    mut req: axum::http::Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Auth)?;
    let claims = auth::verify_token(&state.jwt_secret, token).map_err(|_| AppError::Auth)?;
    let user_id = claims.user_id().ok_or(AppError::Auth)?;
    let conn = state.pool.get()?;
    let user = users::get_user(&conn, &user_id)?.ok_or(AppError::Auth)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[derive(Deserialize)]
struct CreateTweetReq {
    text: String,
}

async fn create_tweet(
    State(state): State<AppState>,
    Extension(user): Extension<model::User>,
    Json(req): Json<CreateTweetReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = state.pool.get()?;
    let tweet = tweets::create_tweet(&conn, &user.id, &req.text)?;
    Ok((StatusCode::CREATED, Json(tweet)))
}

#[derive(Deserialize)]
struct FeedQuery {
    limit: Option<i64>,
    cursor: Option<String>,
}

async fn list_tweets(
    State(state): State<AppState>,
    Extension(user): Extension<model::User>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<model::FeedPage>, AppError> {
    let limit = query.limit.unwrap_or(tweets::LIMIT_DEFAULT);
    if !(tweets::LIMIT_MIN..=tweets::LIMIT_MAX).contains(&limit) {
        return Err(AppError::Validation("invalid_limit"));
    }
    let cursor = query
        .cursor
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|_| AppError::Validation("invalid_cursor"))?;
    let conn = state.pool.get()?;
    let page = tweets::list_feed(&conn, &user.id, limit as usize, cursor.as_ref())?;
    Ok(Json(page))
}

async fn like_tweet(
    State(state): State<AppState>,
    Extension(user): Extension<model::User>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tweet_id = parse_tweet_id(&id)?;
    let conn = state.pool.get()?;
    let like = likes::like_tweet(&conn, &user.id, &tweet_id)?;
    Ok((StatusCode::CREATED, Json(like)))
}

async fn unlike_tweet(
    State(state): State<AppState>,
    Extension(user): Extension<model::User>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tweet_id = parse_tweet_id(&id)?;
    let conn = state.pool.get()?;
    likes::unlike_tweet(&conn, &user.id, &tweet_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(Extension(user): Extension<model::User>) -> Json<model::User> {
    Json(user)
}

fn parse_tweet_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("invalid_tweet_id"))
}

/// Run the HTTP server with the provided configuration.
pub async fn run_http_server(config: Config) -> Result<()> {
    let state = AppState::new(config).await?;
    let addr: SocketAddr = state.config.bind.parse()?;
    tracing::info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(build_router(state).into_make_service())
        .await?;
    Ok(())
}
