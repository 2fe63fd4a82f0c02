pub mod assignments;
pub mod auth;
pub mod notifications;
pub mod organizations;
pub mod users;
pub mod workplaces;

use axum::{routing::{get, post}, Router};
use crate::AppState;

/// All routes except login, which the server mounts separately behind a rate limiter.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Auth
        .route("/api/auth/me", get(auth::me))
        .route("/api/me/current-workplace", get(assignments::my_current_workplace))
        // Organizations
        .route("/api/organizations", get(organizations::list).post(organizations::create))
        .route("/api/organizations/:id", get(organizations::get))
        // Users
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/:id", get(users::get_one))
        .route("/api/users/:id/current-assignment", get(assignments::current_for_user))
        .route("/api/users/:id/assignments/history", get(assignments::history_for_user))
        // Workplaces
        .route("/api/workplaces", get(workplaces::list).post(workplaces::create))
        .route("/api/workplaces/:id", get(workplaces::get_one).patch(workplaces::update))
        // Assignments
        .route("/api/assignments", get(assignments::list).post(assignments::create))
        .route(
            "/api/assignments/:id",
            get(assignments::get_one)
                .patch(assignments::update)
                .delete(assignments::delete),
        )
        // Notifications
        .route("/api/notifications/me", get(notifications::list_mine))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
        .with_state(state)
}

/// Login route on its own, so the server can layer rate limiting onto it.
pub fn login_router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/login", post(auth::login))
        .with_state(state)
}
