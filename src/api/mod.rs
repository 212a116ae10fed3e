//! API handlers for Bookshelf REST endpoints

pub mod auth;
pub mod books;
pub mod borrow;
pub mod health;
pub mod openapi;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::de::DeserializeOwned;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use validator::Validate;

use crate::{error::AppError, models::account::Claims, AppState};

/// Extractor for the caller identity carried by the bearer token
pub struct AuthenticatedUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized("No token provided. Access denied.".to_string()))?;

        let claims = state.services.auth.verify_token(bearer.token())?;
        Ok(AuthenticatedUser(claims))
    }
}

/// Caller holding the librarian role.
///
/// Declared ahead of path and body extractors, so a wrong role is refused
/// before the request content is looked at.
pub struct Librarian(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for Librarian {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(claims) = AuthenticatedUser::from_request_parts(parts, state).await?;
        claims.require_librarian()?;
        Ok(Librarian(claims))
    }
}

/// Caller holding the student role
pub struct Student(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for Student {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(claims) = AuthenticatedUser::from_request_parts(parts, state).await?;
        claims.require_student()?;
        Ok(Student(claims))
    }
}

/// JSON body that has been deserialized and validated
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;

        value
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        Ok(ValidatedJson(value))
    }
}

/// Numeric id path segment
pub struct IdPath(pub i32);

#[async_trait]
impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i32>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(IdPath(id))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // The browser front end is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Authentication
        .route("/auth/register/student", post(auth::register_student))
        .route("/auth/register/librarian", post(auth::register_librarian))
        .route("/auth/login", post(auth::login))
        // Catalog
        .route("/books/all", get(books::list_books))
        .route("/books/available", get(books::list_available))
        .route("/books/add", post(books::add_book))
        .route("/books/:id", get(books::get_book).delete(books::delete_book))
        // Circulation
        .route("/borrow/borrow", post(borrow::borrow_book))
        .route("/borrow/my", get(borrow::my_loans))
        .route("/borrow/all", get(borrow::all_loans))
        .route("/borrow/return/:loan_id", put(borrow::return_book))
        .route("/stats", get(borrow::stats))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .with_state(state)
        .nest("/api", api)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
