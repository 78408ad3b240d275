pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod normalize;
pub mod repo;
pub mod route;
pub mod schema;
pub mod store;

use std::sync::Arc;

use auth::{CognitoClient, TokenVerifier};
use repo::SqliteUserRepository;
use store::TaskListStore;

// Struct representing the application state
pub struct AppState {
    pub store: TaskListStore<SqliteUserRepository>,
    pub verifier: Arc<dyn TokenVerifier>,
    /// Present only when credential flows go through a Cognito user pool.
    pub cognito: Option<CognitoClient>,
}
