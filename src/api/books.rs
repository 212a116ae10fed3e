//! Catalog endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::book::{Book, CreateBook},
    AppState,
};

use super::{IdPath, Librarian, ValidatedJson};

/// List every book in the catalog
#[utoipa::path(
    get,
    path = "/books/all",
    tag = "books",
    responses(
        (status = 200, description = "All books ordered by title", body = Vec<Book>)
    )
)]
pub async fn list_books(State(state): State<AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books().await?;
    Ok(Json(books))
}

/// List books with at least one copy on the shelf
#[utoipa::path(
    get,
    path = "/books/available",
    tag = "books",
    responses(
        (status = 200, description = "Available books ordered by title", body = Vec<Book>)
    )
)]
pub async fn list_available(State(state): State<AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_available().await?;
    Ok(Json(books))
}

/// Get a book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 400, description = "Invalid book ID"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/books/add",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Missing or invalid field"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Librarian role required"),
        (status = 409, description = "ISBN already exists")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_book(
    State(state): State<AppState>,
    Librarian(_claims): Librarian,
    ValidatedJson(book): ValidatedJson<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state.services.catalog.add_book(book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Delete a book that has no copy out on loan
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Librarian role required"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book has copies out on loan")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_book(
    State(state): State<AppState>,
    Librarian(_claims): Librarian,
    IdPath(id): IdPath,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
