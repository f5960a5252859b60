// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    config::MAX_UPLOAD_BYTES,
    handlers::{
        admin::{self, approvals, content, courses as admin_courses, mocks as admin_mocks},
        attempts, auth, chat, courses, doubts, mocks, payments, profile,
    },
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, courses, mocks, attempts, doubts,
///   payments, profile, admin).
/// * Protected routes get `auth_middleware` as a route layer, so unknown
///   paths still answer 404; admin routes additionally get `admin_middleware`.
/// * Serves uploaded files under `/uploads` and the chat socket on `/ws`.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let require_auth = middleware::from_fn_with_state(state.config.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let course_routes = Router::new()
        .route("/", get(courses::list_courses))
        .route("/{id}", get(courses::get_course))
        .merge(
            Router::new()
                .route("/{id}/access", get(courses::course_access))
                .route("/{id}/enroll", post(courses::enroll))
                .route("/{id}/videos", get(courses::list_videos))
                .route("/{id}/documents", get(courses::list_documents))
                .route_layer(require_auth.clone()),
        );

    let mock_routes = Router::new()
        .route("/public", get(mocks::list_public_mocks))
        .route("/{id}", get(mocks::get_mock))
        .merge(
            Router::new()
                .route("/{id}/start", post(attempts::start_attempt))
                .route("/{id}/my-attempt", get(mocks::my_attempt_for_mock))
                .route_layer(require_auth.clone()),
        );

    let attempt_routes = Router::new()
        .route("/{id}", get(attempts::get_attempt))
        .route("/{id}/fullscreen-exit", post(attempts::fullscreen_exit))
        .route("/{id}/submit", post(attempts::submit_attempt))
        .route_layer(require_auth.clone());

    let doubt_routes = Router::new()
        .route(
            "/",
            get(doubts::list_open_doubts).post(doubts::create_doubt),
        )
        .route("/student/{id}", get(doubts::list_student_doubts))
        .route("/{id}", get(doubts::get_doubt))
        .route("/{id}/messages", post(doubts::post_message))
        .route("/{id}/close", post(doubts::close_doubt))
        .route_layer(require_auth.clone());

    let payment_routes = Router::new()
        .route("/checkout", post(payments::create_checkout))
        .route("/success", post(payments::confirm_success))
        .route("/cancel", post(payments::cancel_checkout))
        .route("/me", get(payments::list_my_payments))
        .route_layer(require_auth.clone());

    let profile_routes = Router::new()
        .route("/", get(profile::get_me))
        .route("/purchases", get(profile::list_my_purchases))
        .route("/attempts", get(profile::list_my_attempts))
        .route_layer(require_auth.clone());

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route(
            "/courses",
            get(admin_courses::list_all_courses).post(admin_courses::create_course),
        )
        .route(
            "/courses/{id}",
            put(admin_courses::update_course).delete(admin_courses::delete_course),
        )
        .route(
            "/videos",
            post(content::upload_video).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/videos/{id}", delete(content::delete_video))
        .route(
            "/documents",
            post(content::upload_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/documents/{id}",
            delete(content::delete_document),
        )
        .route(
            "/mocks",
            get(admin_mocks::list_all_mocks).post(admin_mocks::create_mock),
        )
        .route(
            "/mocks/{id}",
            get(admin_mocks::get_mock_admin)
                .put(admin_mocks::update_mock)
                .delete(admin_mocks::delete_mock),
        )
        .route("/mocks/{id}/attempts", get(admin_mocks::list_mock_attempts))
        .route("/approvals", get(approvals::list_pending))
        .route("/approvals/{id}/approve", post(approvals::approve))
        .route("/approvals/{id}/reject", post(approvals::reject))
        .route("/grants", post(approvals::grant))
        // Double middleware protection: Auth first, then Admin check
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(require_auth.clone());

    let chat_image_routes = Router::new()
        .route(
            "/chat-image/{chat_id}/{sender_role}",
            post(doubts::upload_chat_image),
        )
        .route_layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .route_layer(require_auth);

    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/courses", course_routes)
        .nest("/api/mocks", mock_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/doubts", doubt_routes)
        .nest("/api/payments", payment_routes)
        .nest("/api/me", profile_routes)
        .nest("/api/admin", admin_routes)
        .merge(chat_image_routes)
        .route("/ws", get(chat::ws_handler))
        .nest_service("/uploads", uploads)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
