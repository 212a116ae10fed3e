//! Circulation endpoints: borrow, return and loan listings

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::loan::{BorrowerLoan, CirculationStats, LoanOverview, LoanQuery},
    AppState,
};

use super::{IdPath, Librarian, Student, ValidatedJson};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    #[validate(range(min = 1, message = "Book ID is required"))]
    pub book_id: i32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowResponse {
    pub message: String,
    pub loan_id: i32,
    pub due_date: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnResponse {
    pub message: String,
    /// Late fine charged on return
    pub fine: i64,
}

/// Borrow one copy of a book
#[utoipa::path(
    post,
    path = "/borrow/borrow",
    tag = "borrow",
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Loan created", body = BorrowResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Student role required"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No copy available")
    ),
    security(("bearer_auth" = []))
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    Student(claims): Student,
    ValidatedJson(request): ValidatedJson<BorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowResponse>)> {
    let loan = state
        .services
        .circulation
        .borrow_book(claims.id, request.book_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BorrowResponse {
            message: "Book borrowed successfully".to_string(),
            loan_id: loan.id,
            due_date: loan.due_date,
        }),
    ))
}

/// The caller's own loans, newest first
#[utoipa::path(
    get,
    path = "/borrow/my",
    tag = "borrow",
    responses(
        (status = 200, description = "Loan history", body = Vec<BorrowerLoan>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Student role required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_loans(
    State(state): State<AppState>,
    Student(claims): Student,
) -> AppResult<Json<Vec<BorrowerLoan>>> {
    let loans = state.services.circulation.borrower_loans(claims.id).await?;
    Ok(Json(loans))
}

/// Every loan with borrower details, newest first
#[utoipa::path(
    get,
    path = "/borrow/all",
    tag = "borrow",
    params(LoanQuery),
    responses(
        (status = 200, description = "All loans", body = Vec<LoanOverview>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Librarian role required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn all_loans(
    State(state): State<AppState>,
    Librarian(_claims): Librarian,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<LoanOverview>>> {
    let loans = state.services.circulation.all_loans(query.status).await?;
    Ok(Json(loans))
}

/// Return a borrowed copy and charge any late fine
#[utoipa::path(
    put,
    path = "/borrow/return/{loan_id}",
    tag = "borrow",
    params(
        ("loan_id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan closed", body = ReturnResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Librarian role required"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan already returned")
    ),
    security(("bearer_auth" = []))
)]
pub async fn return_book(
    State(state): State<AppState>,
    Librarian(_claims): Librarian,
    IdPath(loan_id): IdPath,
) -> AppResult<Json<ReturnResponse>> {
    let loan = state.services.circulation.return_book(loan_id).await?;
    Ok(Json(ReturnResponse {
        message: "Book returned successfully".to_string(),
        fine: loan.fine,
    }))
}

/// Circulation counters
#[utoipa::path(
    get,
    path = "/stats",
    tag = "borrow",
    responses(
        (status = 200, description = "Circulation statistics", body = CirculationStats),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Librarian role required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn stats(
    State(state): State<AppState>,
    Librarian(_claims): Librarian,
) -> AppResult<Json<CirculationStats>> {
    let stats = state.services.circulation.stats().await?;
    Ok(Json(stats))
}
