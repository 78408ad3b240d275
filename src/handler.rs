use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{AuthError, CognitoClient},
    error::{AppError, StoreError},
    model::{AccessToken, CurrentUser, User, UserId, DEFAULT_SEED_TASKS},
    normalize::{normalize, ListName},
    schema::{
        AppendTaskSchema, ConfirmUserSchema, CreateListSchema, DeleteListSchema, ListIndexView,
        ListSummary, ListView, LoginSchema, SetCompletedSchema, SignupSchema,
    },
    AppState,
};

const LIST_INDEX: &str = "/lists";

fn list_path(name: &ListName) -> String {
    format!("{LIST_INDEX}/{name}")
}

fn cognito(data: &AppState) -> Result<&CognitoClient, AppError> {
    data.cognito
        .as_ref()
        .ok_or_else(|| AuthError::NotConfigured.into())
}

/// Normalizes a list name taken from the path; `None` means the caller should
/// be sent back to the list index.
fn path_list_name(raw: &str) -> Option<ListName> {
    match normalize(raw) {
        Ok(name) => Some(name),
        Err(err) => {
            tracing::debug!(error = %err, "rejected list name");
            None
        }
    }
}

/// Parses a list or task id taken from the request. An id that doesn't parse
/// cannot name anything, so callers treat `None` like an unknown id.
fn parse_id(raw: &str) -> Option<Uuid> {
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(err) => {
            tracing::debug!(error = %err, id = raw, "rejected id");
            None
        }
    }
}

/// Store failures that mean "this list or task is gone" become a redirect to
/// a safe page; everything else is a real error.
fn redirect_on_missing(
    result: Result<(), StoreError>,
    name: &ListName,
) -> Result<Redirect, AppError> {
    match result {
        Ok(()) => Ok(Redirect::to(&list_path(name))),
        Err(StoreError::ListNotFound(_)) => Ok(Redirect::to(LIST_INDEX)),
        Err(StoreError::TaskNotFound(_)) => Ok(Redirect::to(&list_path(name))),
        Err(err) => Err(err.into()),
    }
}

/// Registration for an account that already exists upstream: an aggregate
/// left over from an earlier attempt is fine.
fn registered(result: Result<User, StoreError>) -> Result<(), StoreError> {
    match result {
        Ok(_) => Ok(()),
        Err(StoreError::AlreadyExists(user)) => {
            tracing::debug!(%user, "task lists already exist for new account");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

// Handler for the health checker route
pub async fn health_checker_handler() -> impl IntoResponse {
    const MESSAGE: &str = "Multi-user task lists with Rust, SQLX, SQLite, and Axum";

    let json_response = serde_json::json!({
        "status": "success",
        "message": MESSAGE
    });

    Json(json_response)
}

// Handler for the list index view
pub async fn get_lists(
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ListIndexView>, AppError> {
    let (display_name, lists) = tokio::try_join!(
        data.store.display_name(&current.user_id),
        data.store.get_lists(&current.user_id),
    )?;

    Ok(Json(ListIndexView {
        display_name,
        lists: lists.iter().map(ListSummary::from).collect(),
    }))
}

// Handler for a single list view
pub async fn get_list(
    Path(list_name): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let Some(name) = path_list_name(&list_name) else {
        return Ok(Redirect::to(LIST_INDEX).into_response());
    };

    let list = match data.store.get_list(&current.user_id, &name).await {
        Ok(list) => list,
        Err(StoreError::ListNotFound(_)) => return Ok(Redirect::to(LIST_INDEX).into_response()),
        Err(err) => return Err(err.into()),
    };
    let display_name = data.store.display_name(&current.user_id).await?;

    let view = ListView {
        list_id: list.id,
        list_name: list.name,
        tasks: list.tasks,
        display_name,
    };
    Ok(Json(view).into_response())
}

// Handler for creating a list, seeded with the default tasks
pub async fn create_list(
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Form(body): Form<CreateListSchema>,
) -> Result<Redirect, AppError> {
    let name = match normalize(&body.name) {
        Ok(name) => name,
        Err(err) => {
            tracing::debug!(error = %err, "not creating list");
            return Ok(Redirect::to(LIST_INDEX));
        }
    };

    let list = data
        .store
        .create_list(&current.user_id, &name, &DEFAULT_SEED_TASKS)
        .await?;
    Ok(Redirect::to(&list_path(&list.name)))
}

pub async fn delete_list(
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Form(body): Form<DeleteListSchema>,
) -> Result<Redirect, AppError> {
    if let Some(list_id) = parse_id(&body.list_id) {
        data.store.delete_list(&current.user_id, list_id).await?;
    }
    Ok(Redirect::to(LIST_INDEX))
}

pub async fn append_task(
    Path(list_name): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Form(body): Form<AppendTaskSchema>,
) -> Result<Redirect, AppError> {
    let Some(name) = path_list_name(&list_name) else {
        return Ok(Redirect::to(LIST_INDEX));
    };

    let result = data
        .store
        .append_task(&current.user_id, &name, &body.text)
        .await
        .map(drop);
    redirect_on_missing(result, &name)
}

// Handler setting a task's completed flag to the submitted value
pub async fn set_task_completed(
    Path((list_name, task_id)): Path<(String, String)>,
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Form(body): Form<SetCompletedSchema>,
) -> Result<Redirect, AppError> {
    let Some(name) = path_list_name(&list_name) else {
        return Ok(Redirect::to(LIST_INDEX));
    };
    let Some(task_id) = parse_id(&task_id) else {
        return Ok(Redirect::to(&list_path(&name)));
    };

    let result = data
        .store
        .set_task_completed(&current.user_id, &name, task_id, body.completed)
        .await
        .map(drop);
    redirect_on_missing(result, &name)
}

// Handler flipping a task's completed flag from its stored state
pub async fn toggle_task(
    Path((list_name, task_id)): Path<(String, String)>,
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Redirect, AppError> {
    let Some(name) = path_list_name(&list_name) else {
        return Ok(Redirect::to(LIST_INDEX));
    };
    let Some(task_id) = parse_id(&task_id) else {
        return Ok(Redirect::to(&list_path(&name)));
    };

    let result = data
        .store
        .toggle_task(&current.user_id, &name, task_id)
        .await
        .map(drop);
    redirect_on_missing(result, &name)
}

pub async fn delete_task(
    Path((list_name, task_id)): Path<(String, String)>,
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Redirect, AppError> {
    let Some(name) = path_list_name(&list_name) else {
        return Ok(Redirect::to(LIST_INDEX));
    };
    let Some(task_id) = parse_id(&task_id) else {
        return Ok(Redirect::to(&list_path(&name)));
    };

    let result = data
        .store
        .delete_task(&current.user_id, &name, task_id)
        .await;
    redirect_on_missing(result, &name)
}

// Handler completing a federated login: the identity provider has already
// vouched for the token, so make sure the user has an aggregate.
pub async fn federated_callback(
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Extension(token): Extension<AccessToken>,
) -> Result<Redirect, AppError> {
    let display_name = match (current.display_name, data.cognito.as_ref()) {
        (Some(name), _) => Some(name),
        // Cognito access tokens carry no name claim; ask for the profile.
        (None, Some(client)) => client.display_name(&token.0).await.unwrap_or_else(|err| {
            tracing::warn!(user = %current.user_id, error = %err, "could not fetch profile name");
            None
        }),
        (None, None) => None,
    };

    data.store
        .find_or_create_user(&current.user_id, display_name.as_deref())
        .await?;
    Ok(Redirect::to(LIST_INDEX))
}

pub async fn login(
    State(data): State<Arc<AppState>>,
    Json(body): Json<LoginSchema>,
) -> Result<impl IntoResponse, AppError> {
    let tokens = cognito(&data)?
        .login(&body.username, &body.password)
        .await?;

    let success_response = json!({"status": "success", "data": tokens});
    Ok((StatusCode::OK, Json(success_response)))
}

pub async fn signup(
    State(data): State<Arc<AppState>>,
    Json(body): Json<SignupSchema>,
) -> Result<impl IntoResponse, AppError> {
    let confirmed = cognito(&data)?
        .sign_up(&body.username, &body.email, &body.password, &body.real_name)
        .await?;

    // Cognito refuses a repeated sign-up, so if this fails the aggregate is
    // left to /auth/callback on first login.
    let user = UserId::new(&body.username);
    if let Err(err) = registered(data.store.register_user(&user, &body.real_name).await) {
        tracing::error!(
            %user,
            error = %err,
            "Cognito account created but its task lists were not; they will be created on first login"
        );
        return Err(err.into());
    }

    let message = if confirmed {
        "User is confirmed and ready to use."
    } else {
        "User requires confirmation. Check email for a verification code."
    };
    let success_response = json!({"status": "success", "message": message});
    Ok((StatusCode::CREATED, Json(success_response)))
}

pub async fn confirm_user(
    State(data): State<Arc<AppState>>,
    Json(body): Json<ConfirmUserSchema>,
) -> Result<impl IntoResponse, AppError> {
    cognito(&data)?
        .confirm_sign_up(&body.username, &body.confirmation_code)
        .await?;

    let success_response = json!({
        "status": "success",
        "message": "User is confirmed and ready to use."
    });
    Ok((StatusCode::OK, Json(success_response)))
}

pub async fn logout(
    State(data): State<Arc<AppState>>,
    Extension(token): Extension<AccessToken>,
) -> Result<impl IntoResponse, AppError> {
    // Shared-secret tokens cannot be revoked; they simply expire.
    if let Some(client) = data.cognito.as_ref() {
        client.sign_out(&token.0).await?;
    }

    let success_response = json!({"status": "success", "message": "Signed out."});
    Ok((StatusCode::OK, Json(success_response)))
}
