use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;
use warp::http::header::{HeaderValue, LOCATION, SET_COOKIE};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Reply};

use crate::auth::{AuthError, AuthService, GUEST_COOKIE, SESSION_COOKIE, STATE_COOKIE};
use crate::game_manager::{GameManager, PlayerKey, TurnError, validate_input};
use game_core::{DailyRecord, StatsEngine, format_percent};
use game_persistence::repositories::{RecordRepository, UserRepository};
use game_types::{ErrorResponse, GameRequest, GameResponse, RecordStatsResponse, SessionUser};

pub mod auth;
pub mod config;
pub mod game_manager;
pub mod llm;
pub mod rate_limiter;

const MAX_BODY_BYTES: u64 = 16 * 1024;

#[derive(Debug, Deserialize)]
struct AuthorizeQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub fn create_routes(
    static_dir: PathBuf,
    game_manager: Arc<GameManager>,
    auth_service: Arc<AuthService>,
    user_repository: Arc<UserRepository>,
    record_repository: Arc<RecordRepository>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let game_manager_filter = warp::any().map({
        let game_manager = game_manager.clone();
        move || game_manager.clone()
    });

    let auth_filter = warp::any().map({
        let auth_service = auth_service.clone();
        move || auth_service.clone()
    });

    let user_repository_filter = warp::any().map({
        let user_repository = user_repository.clone();
        move || user_repository.clone()
    });

    let record_repository_filter = warp::any().map({
        let record_repository = record_repository.clone();
        move || record_repository.clone()
    });

    // Pages
    let index = warp::path::end()
        .and(warp::get())
        .and(warp::fs::file(static_dir.join("index.html")));

    let analysis = warp::path("analysis")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::fs::file(static_dir.join("analysis.html")));

    let static_files = warp::path("static").and(warp::fs::dir(static_dir));

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    // Google login
    let login = warp::path!("login" / "google")
        .and(warp::get())
        .and(auth_filter.clone())
        .and_then(handle_login_request);

    let authorize = warp::path("authorize")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<AuthorizeQuery>())
        .and(warp::cookie::optional::<String>(STATE_COOKIE))
        .and(auth_filter.clone())
        .and(user_repository_filter.clone())
        .and_then(handle_authorize_request);

    let logout = warp::path("logout")
        .and(warp::path::end())
        .and(warp::get())
        .and(auth_filter.clone())
        .and_then(handle_logout_request);

    // Game move
    let game = warp::path("game")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(warp::cookie::optional::<String>(SESSION_COOKIE))
        .and(warp::cookie::optional::<String>(GUEST_COOKIE))
        .and(warp::addr::remote())
        .and(game_manager_filter.clone())
        .and(auth_filter.clone())
        .and(user_repository_filter.clone())
        .and_then(handle_game_request);

    // Caller statistics
    let record = warp::path("record")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::cookie::optional::<String>(SESSION_COOKIE))
        .and(auth_filter.clone())
        .and(user_repository_filter.clone())
        .and(record_repository_filter.clone())
        .and_then(handle_record_request);

    index
        .map(Reply::into_response)
        .or(analysis.map(Reply::into_response))
        .unify()
        .or(static_files.map(Reply::into_response))
        .unify()
        .or(health.map(Reply::into_response))
        .unify()
        .or(login)
        .unify()
        .or(authorize)
        .unify()
        .or(logout)
        .unify()
        .or(game)
        .unify()
        .or(record)
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(warp::log("twenty_questions"))
}

fn json_response<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    json_response(&ErrorResponse::new(message), status)
}

fn redirect_response(location: &str) -> Response {
    let mut response = warp::reply::with_status(warp::reply(), StatusCode::FOUND).into_response();
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(LOCATION, value);
            response
        }
        Err(err) => {
            tracing::error!("Invalid redirect location {}: {}", location, err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect")
        }
    }
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(err) => tracing::error!("Refusing to set malformed cookie: {}", err),
    }
    response
}

fn turn_error_response(err: &TurnError) -> Response {
    let status = match err {
        TurnError::MissingInput | TurnError::InputTooLong => StatusCode::BAD_REQUEST,
        TurnError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        TurnError::Provider(_) | TurnError::NoWords | TurnError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        tracing::error!("Game move failed: {}", err);
    }
    error_response(status, err.to_string())
}

async fn handle_login_request(auth_service: Arc<AuthService>) -> Result<Response, warp::Rejection> {
    match auth_service.begin_login() {
        Ok((url, state_cookie)) => Ok(with_cookie(redirect_response(url.as_str()), &state_cookie)),
        Err(err) => {
            tracing::error!("Failed to build authorization URL: {}", err);
            Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to start login",
            ))
        }
    }
}

async fn handle_authorize_request(
    query: AuthorizeQuery,
    state_cookie: Option<String>,
    auth_service: Arc<AuthService>,
    user_repository: Arc<UserRepository>,
) -> Result<Response, warp::Rejection> {
    let clear_state = auth_service.clear_cookie(STATE_COOKIE);

    if let Some(error) = query.error {
        tracing::warn!("Google login was not completed: {}", error);
        let response = error_response(
            StatusCode::BAD_REQUEST,
            format!("Authorization failed: {}", error),
        );
        return Ok(with_cookie(response, &clear_state));
    }

    let profile = match auth_service
        .complete_login(
            query.code.as_deref(),
            query.state.as_deref(),
            state_cookie.as_deref(),
        )
        .await
    {
        Ok(profile) => profile,
        Err(err) => {
            let status = match err {
                AuthError::MissingCode | AuthError::StateMismatch | AuthError::MissingEmail => {
                    StatusCode::BAD_REQUEST
                }
                _ => {
                    tracing::error!("Google login failed: {}", err);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            return Ok(with_cookie(error_response(status, err.to_string()), &clear_state));
        }
    };

    let (Some(email), Some(name)) = (profile.email.as_deref(), profile.display_name()) else {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            AuthError::MissingEmail.to_string(),
        ));
    };

    let user = match user_repository.find_or_create(email, &name).await {
        Ok(user) => user,
        Err(err) => {
            tracing::error!("Failed to store user {}: {}", email, err);
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store user",
            ));
        }
    };

    let token = match auth_service.issue_session(&SessionUser::from(&user)) {
        Ok(token) => token,
        Err(err) => {
            tracing::error!("Failed to issue session for {}: {}", user.email, err);
            return Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()));
        }
    };

    tracing::info!("User {} signed in", user.email);
    let response = with_cookie(redirect_response("/"), &auth_service.session_cookie(&token));
    Ok(with_cookie(response, &clear_state))
}

async fn handle_logout_request(auth_service: Arc<AuthService>) -> Result<Response, warp::Rejection> {
    Ok(with_cookie(
        redirect_response("/"),
        &auth_service.clear_cookie(SESSION_COOKIE),
    ))
}

async fn handle_game_request(
    body: Bytes,
    session_cookie: Option<String>,
    guest_cookie: Option<String>,
    remote: Option<SocketAddr>,
    game_manager: Arc<GameManager>,
    auth_service: Arc<AuthService>,
    user_repository: Arc<UserRepository>,
) -> Result<Response, warp::Rejection> {
    // Malformed JSON counts as a missing input
    let request: GameRequest = serde_json::from_slice(&body).unwrap_or_default();
    let input = match validate_input(request.input.as_deref()) {
        Ok(input) => input,
        Err(err) => return Ok(turn_error_response(&err)),
    };

    let mut set_guest_cookie = None;
    let player = match auth_service.session_user(session_cookie.as_deref()) {
        Some(session_user) => match user_repository.find_by_email(&session_user.email).await {
            Ok(Some(user)) => PlayerKey::User(user.id),
            Ok(None) => return Ok(error_response(StatusCode::NOT_FOUND, "User not found")),
            Err(err) => {
                tracing::error!("Failed to load user {}: {}", session_user.email, err);
                return Ok(error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to load user",
                ));
            }
        },
        None => match guest_cookie.as_deref().and_then(|id| Uuid::parse_str(id).ok()) {
            Some(guest_id) => PlayerKey::Guest(guest_id),
            None => {
                if let Some(addr) = remote {
                    if !game_manager.admit_new_guest(addr.ip()) {
                        return Ok(turn_error_response(&TurnError::RateLimited));
                    }
                }
                let guest_id = Uuid::new_v4();
                set_guest_cookie = Some(auth_service.guest_cookie(&guest_id.to_string()));
                PlayerKey::Guest(guest_id)
            }
        },
    };

    let response = match game_manager.play_turn(player, input).await {
        Ok(outcome) => json_response(
            &GameResponse {
                message: outcome.reply,
            },
            StatusCode::OK,
        ),
        Err(err) => turn_error_response(&err),
    };

    Ok(match set_guest_cookie {
        Some(cookie) => with_cookie(response, &cookie),
        None => response,
    })
}

async fn handle_record_request(
    session_cookie: Option<String>,
    auth_service: Arc<AuthService>,
    user_repository: Arc<UserRepository>,
    record_repository: Arc<RecordRepository>,
) -> Result<Response, warp::Rejection> {
    let Some(session_user) = auth_service.session_user(session_cookie.as_deref()) else {
        return Ok(error_response(StatusCode::UNAUTHORIZED, "User not logged in"));
    };

    let user = match user_repository.find_by_email(&session_user.email).await {
        Ok(Some(user)) => user,
        Ok(None) => return Ok(error_response(StatusCode::NOT_FOUND, "User not found")),
        Err(err) => {
            tracing::error!("Failed to load user {}: {}", session_user.email, err);
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load user",
            ));
        }
    };

    let records = async {
        let finished = record_repository.list_finished().await?;
        let mine = record_repository.list_for_user(user.id).await?;
        anyhow::Ok((finished, mine))
    };
    let (finished, mine) = match records.await {
        Ok(records) => records,
        Err(err) => {
            tracing::error!("Failed to load records of {}: {}", user.email, err);
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load records",
            ));
        }
    };

    let stats = StatsEngine::player_stats(&finished, user.id);
    let response = RecordStatsResponse {
        success_rate: format_percent(stats.success_rate),
        my_avg_attempts: stats.avg_attempts,
        my_rank: stats.rank,
        my_percentile: stats.percentile.map(format_percent),
        finished_games: stats.finished_games,
        record_list: mine.iter().map(DailyRecord::to_game_record).collect(),
    };

    Ok(json_response(&response, StatusCode::OK))
}

async fn handle_rejection(err: warp::Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string")
    } else {
        tracing::warn!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(error_response(status, message))
}
