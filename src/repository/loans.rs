//! Loans repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgExecutor, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::loan::{BorrowerLoan, CirculationStats, LoanOverview, LoanRecord, NewLoan},
};

use super::{
    books::{book_exists, try_adjust_availability},
    CirculationStore, LoanLedger,
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn loan_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Loan with id {} not found", id))
}

async fn insert_loan<'e, E>(executor: E, loan: &NewLoan) -> AppResult<LoanRecord>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, LoanRecord>(
        r#"
        INSERT INTO loans (book_id, borrower_id, borrow_date, due_date, status, fine)
        VALUES ($1, $2, $3, $4, 'borrowed', 0)
        RETURNING *
        "#,
    )
    .bind(loan.book_id)
    .bind(loan.borrower_id)
    .bind(loan.borrow_date)
    .bind(loan.due_date)
    .fetch_one(executor)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            AppError::NotFound("Book or borrower not found".to_string())
        }
        _ => AppError::Database(e),
    })
}

async fn find_loan<'e, E>(executor: E, id: i32) -> AppResult<Option<LoanRecord>>
where
    E: PgExecutor<'e>,
{
    let loan = sqlx::query_as::<_, LoanRecord>("SELECT * FROM loans WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(loan)
}

/// Close a still-borrowed loan. `None` when the loan is missing or already closed.
async fn close_loan<'e, E>(
    executor: E,
    loan_id: i32,
    return_date: NaiveDate,
    fine: i64,
) -> AppResult<Option<LoanRecord>>
where
    E: PgExecutor<'e>,
{
    let loan = sqlx::query_as::<_, LoanRecord>(
        r#"
        UPDATE loans
        SET status = 'returned', return_date = $2, fine = $3
        WHERE id = $1 AND status = 'borrowed'
        RETURNING *
        "#,
    )
    .bind(loan_id)
    .bind(return_date)
    .bind(fine)
    .fetch_optional(executor)
    .await?;
    Ok(loan)
}

#[async_trait]
impl LoanLedger for LoansRepository {
    async fn create(&self, loan: &NewLoan) -> AppResult<LoanRecord> {
        insert_loan(&self.pool, loan).await
    }

    async fn find_by_id(&self, id: i32) -> AppResult<LoanRecord> {
        find_loan(&self.pool, id)
            .await?
            .ok_or_else(|| loan_not_found(id))
    }

    async fn list_by_borrower(&self, borrower_id: i32) -> AppResult<Vec<BorrowerLoan>> {
        let loans = sqlx::query_as::<_, BorrowerLoan>(
            r#"
            SELECT l.*, b.title, b.author, b.isbn
            FROM loans l
            JOIN books b ON b.id = l.book_id
            WHERE l.borrower_id = $1
            ORDER BY l.borrow_date DESC, l.id DESC
            "#,
        )
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn list_all(&self) -> AppResult<Vec<LoanOverview>> {
        let loans = sqlx::query_as::<_, LoanOverview>(
            r#"
            SELECT l.*, b.title, b.author,
                   a.name AS borrower_name, a.email AS borrower_email
            FROM loans l
            JOIN books b ON b.id = l.book_id
            JOIN accounts a ON a.id = l.borrower_id
            ORDER BY l.borrow_date DESC, l.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn mark_returned(
        &self,
        loan_id: i32,
        return_date: NaiveDate,
        fine: i64,
    ) -> AppResult<LoanRecord> {
        if let Some(loan) = close_loan(&self.pool, loan_id, return_date, fine).await? {
            return Ok(loan);
        }

        match find_loan(&self.pool, loan_id).await? {
            Some(_) => Err(AppError::AlreadyReturned(loan_id)),
            None => Err(loan_not_found(loan_id)),
        }
    }
}

#[async_trait]
impl CirculationStore for LoansRepository {
    async fn borrow(&self, loan: &NewLoan) -> AppResult<LoanRecord> {
        let mut tx = self.pool.begin().await?;

        // The conditional decrement holds the book row lock until commit,
        // so concurrent borrows of the last copy see zero and back off.
        if !try_adjust_availability(&mut *tx, loan.book_id, -1).await? {
            return if book_exists(&mut *tx, loan.book_id).await? {
                Err(AppError::Unavailable("Book is not available".to_string()))
            } else {
                Err(AppError::NotFound(format!(
                    "Book with id {} not found",
                    loan.book_id
                )))
            };
        }

        let record = insert_loan(&mut *tx, loan).await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn return_loan(
        &self,
        loan_id: i32,
        return_date: NaiveDate,
        fine: i64,
    ) -> AppResult<LoanRecord> {
        let mut tx = self.pool.begin().await?;

        let record = match close_loan(&mut *tx, loan_id, return_date, fine).await? {
            Some(record) => record,
            None => {
                return match find_loan(&mut *tx, loan_id).await? {
                    Some(_) => Err(AppError::AlreadyReturned(loan_id)),
                    None => Err(loan_not_found(loan_id)),
                };
            }
        };

        if !try_adjust_availability(&mut *tx, record.book_id, 1).await? {
            // Dropping the transaction rolls the loan update back
            return Err(AppError::Internal(format!(
                "Shelf count of book {} out of range while returning loan {}",
                record.book_id, loan_id
            )));
        }

        tx.commit().await?;
        Ok(record)
    }

    async fn stats(&self, today: NaiveDate) -> AppResult<CirculationStats> {
        let stats = sqlx::query_as::<_, CirculationStats>(
            r#"
            SELECT
                (SELECT COALESCE(SUM(total_quantity), 0)::BIGINT FROM books) AS total_copies,
                (SELECT COALESCE(SUM(available_quantity), 0)::BIGINT FROM books) AS available_copies,
                (SELECT COUNT(*) FROM loans WHERE status = 'borrowed') AS active_loans,
                (SELECT COUNT(*) FROM loans WHERE status = 'borrowed' AND due_date < $1) AS overdue_loans,
                (SELECT COUNT(*) FROM loans WHERE status = 'returned') AS returned_loans,
                (SELECT COALESCE(SUM(fine), 0)::BIGINT FROM loans) AS fines_collected
            "#,
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
