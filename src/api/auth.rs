//! Registration and login endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::account::{Account, LoginRequest, RegisterLibrarian, RegisterStudent, Role},
    AppState,
};

use super::ValidatedJson;

/// Token and identity returned by registration and login
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// Bearer token (JWT)
    pub token: String,
    pub role: Role,
    pub id: i32,
    pub name: String,
}

impl AuthResponse {
    fn new(token: String, account: Account) -> Self {
        Self {
            token,
            role: account.role,
            id: account.id,
            name: account.name,
        }
    }
}

/// Register a student account
#[utoipa::path(
    post,
    path = "/auth/register/student",
    tag = "auth",
    request_body = RegisterStudent,
    responses(
        (status = 201, description = "Student registered", body = AuthResponse),
        (status = 400, description = "Missing or invalid field"),
        (status = 409, description = "Email already exists")
    )
)]
pub async fn register_student(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterStudent>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let (token, account) = state.services.auth.register_student(request).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse::new(token, account))))
}

/// Register a librarian account
#[utoipa::path(
    post,
    path = "/auth/register/librarian",
    tag = "auth",
    request_body = RegisterLibrarian,
    responses(
        (status = 201, description = "Librarian registered", body = AuthResponse),
        (status = 400, description = "Missing or invalid field"),
        (status = 409, description = "Email already exists")
    )
)]
pub async fn register_librarian(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterLibrarian>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let (token, account) = state.services.auth.register_librarian(request).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse::new(token, account))))
}

/// Log in as a student or librarian
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "User not found")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (token, account) = state.services.auth.login(request).await?;
    Ok(Json(AuthResponse::new(token, account)))
}
