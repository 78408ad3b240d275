use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::{handler::*, middleware::mw_require_auth, AppState};

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let app = Router::new()
        .route("/lists", get(get_lists).post(create_list))
        .route("/delete-list", post(delete_list))
        .route("/lists/:list_name", get(get_list))
        .route("/lists/:list_name/tasks", post(append_task))
        .route(
            "/lists/:list_name/tasks/:task_id/completed",
            post(set_task_completed),
        )
        .route("/lists/:list_name/tasks/:task_id/toggle", post(toggle_task))
        .route("/lists/:list_name/tasks/:task_id/delete", post(delete_task))
        .route("/auth/callback", post(federated_callback))
        .route("/logout", post(logout))
        .route_layer(from_fn_with_state(app_state.clone(), mw_require_auth))
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route("/confirm", post(confirm_user))
        .route("/", get(health_checker_handler))
        .with_state(app_state);
    app
}
