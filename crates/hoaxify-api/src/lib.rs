pub mod auth;
pub mod error;
pub mod files;
pub mod hoaxes;
pub mod mail;
pub mod middleware;
pub mod pagination;
pub mod storage;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use rand::Rng;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::auth::AppState;

/// Stored files never change under a given name, so clients may cache them
/// for a year.
const STATIC_CACHE_CONTROL: &str = "max-age=31536000";

/// Every hoaxify route. The gate middleware runs on the API routes only;
/// stored attachments and profile images are served as static files.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/1.0/auth", post(auth::login))
        .route("/api/1.0/logout", post(auth::logout))
        .route("/api/1.0/users", get(users::list_users).post(users::register))
        .route("/api/1.0/users/token/{token}", post(users::activate))
        .route(
            "/api/1.0/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user)
                .layer(DefaultBodyLimit::max(users::MAX_USER_UPDATE_BODY)),
        )
        .route("/api/1.0/users/{id}/hoaxes", get(hoaxes::list_for_user))
        .route(
            "/api/1.0/user/password",
            post(users::request_password_reset).put(users::update_password),
        )
        .route("/api/1.0/hoaxes", get(hoaxes::list).post(hoaxes::submit))
        .route("/api/1.0/hoaxes/{id}", delete(hoaxes::delete))
        .route(
            "/api/1.0/hoaxes/attachments",
            post(files::upload_attachment).layer(DefaultBodyLimit::max(files::MAX_ATTACHMENT_SIZE)),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::authenticate));

    let files = Router::new()
        .nest_service("/attachments", ServeDir::new(state.attachments.dir()))
        .nest_service("/images", ServeDir::new(state.images.dir()))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static(STATIC_CACHE_CONTROL),
        ));

    api.merge(files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
