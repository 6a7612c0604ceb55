use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::{require_user, USER_ID_HEADER};
use crate::config::Config;
use crate::handlers;
use crate::AppState;

fn cors(config: &Config) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = std::iter::once(&config.frontend_url)
        .chain(config.cors_extra_origins.iter())
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(USER_ID_HEADER),
        ])
        .allow_credentials(true)
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz));

    let protected_routes = Router::new()
        // Diaries
        .route(
            "/api/diaries",
            get(handlers::diaries::list_diaries).post(handlers::diaries::create_diary),
        )
        .route("/api/diaries/replace", post(handlers::diaries::replace_diary))
        .route(
            "/api/diaries/:id",
            get(handlers::diaries::get_diary).delete(handlers::diaries::delete_diary),
        )
        // Emotion analysis
        .route("/api/emotions/analyze", post(handlers::emotions::analyze))
        // Town
        .route("/api/tree", get(handlers::town::get_tree))
        .route("/api/tree/subtract", post(handlers::town::subtract_tree))
        .route("/api/tree/fruits", get(handlers::town::fruit_count))
        .route("/api/tree/harvest", post(handlers::town::harvest_fruit))
        .route("/api/well", get(handlers::town::get_well))
        .route("/api/well/subtract", post(handlers::town::subtract_well))
        .route("/api/well/reset", post(handlers::town::reset_well))
        .route("/api/well/overflow", post(handlers::town::mark_overflow))
        // Similarity
        .route("/api/diaries/:id/similar", get(handlers::similarity::similar_to_diary))
        .route(
            "/api/diaries/:id/similar/best",
            get(handlers::similarity::best_matches_for_diary),
        )
        .route("/api/similar", post(handlers::similarity::similar_to_text))
        .route("/api/similarity/text", post(handlers::similarity::compare_texts))
        // Stats
        .route("/api/stats/office", get(handlers::stats::office_stats))
        // Letters
        .route(
            "/api/letters",
            get(handlers::letters::list_letters).post(handlers::letters::create_letter),
        )
        .route("/api/letters/unread-count", get(handlers::letters::unread_count))
        .route("/api/letters/:id/read", post(handlers::letters::mark_read))
        .route("/api/letters/:id", delete(handlers::letters::delete_letter))
        .layer(middleware::from_fn(require_user));

    let cors = cors(&state.config);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
