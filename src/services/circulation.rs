//! Borrow and return workflow

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use mockable::Clock;

use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::loan::{
        BorrowerLoan, CirculationStats, LoanFilter, LoanOverview, LoanRecord, NewLoan,
    },
    repository::Repository,
};

/// Due date of a loan taken on `borrow_date` (calendar days)
pub fn due_date_for(borrow_date: NaiveDate, loan_period_days: i64) -> AppResult<NaiveDate> {
    Duration::try_days(loan_period_days)
        .and_then(|period| borrow_date.checked_add_signed(period))
        .ok_or_else(|| {
            AppError::Internal(format!(
                "Loan period of {} days from {} is out of range",
                loan_period_days, borrow_date
            ))
        })
}

/// Fine owed when returning on `return_date`.
///
/// Nothing is owed up to and including the due date. Dates carry no time
/// of day, so the days late are always whole.
pub fn compute_fine(due_date: NaiveDate, return_date: NaiveDate, fine_per_day: i64) -> i64 {
    if return_date <= due_date {
        return 0;
    }
    (return_date - due_date)
        .num_days()
        .saturating_mul(fine_per_day.max(0))
}

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    policy: CirculationConfig,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl CirculationService {
    pub fn new(
        repository: Repository,
        policy: CirculationConfig,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            repository,
            policy,
            clock,
        }
    }

    /// Calendar date in UTC
    fn today(&self) -> NaiveDate {
        self.clock.utc().date_naive()
    }

    /// Lend one copy of a book to a borrower
    pub async fn borrow_book(&self, borrower_id: i32, book_id: i32) -> AppResult<LoanRecord> {
        let book = self.repository.books.find_by_id(book_id).await?;
        if !book.is_available() {
            tracing::warn!("Borrow refused: book id={} has no copy left", book_id);
            return Err(AppError::Unavailable("Book is not available".to_string()));
        }

        let today = self.today();
        let loan = NewLoan {
            book_id,
            borrower_id,
            borrow_date: today,
            due_date: due_date_for(today, self.policy.loan_period_days)?,
        };

        // Re-checked atomically by the store, another borrower may have
        // taken the last copy since the read above
        let record = self.repository.circulation.borrow(&loan).await.map_err(|e| {
            if matches!(e, AppError::Unavailable(_)) {
                tracing::warn!("Borrow refused: book id={} taken concurrently", book_id);
            }
            e
        })?;

        tracing::info!(
            "Loan id={} created: book id={} borrower id={} due {}",
            record.id,
            book_id,
            borrower_id,
            record.due_date
        );
        Ok(record)
    }

    /// Close a loan, charging the late fine, and shelve the copy again
    pub async fn return_book(&self, loan_id: i32) -> AppResult<LoanRecord> {
        let loan = self.repository.loans.find_by_id(loan_id).await?;
        if loan.is_returned() {
            tracing::warn!("Return refused: loan id={} already returned", loan_id);
            return Err(AppError::AlreadyReturned(loan_id));
        }

        let today = self.today();
        let fine = compute_fine(loan.due_date, today, self.policy.fine_per_day);

        let record = self
            .repository
            .circulation
            .return_loan(loan_id, today, fine)
            .await?;

        tracing::info!(
            "Loan id={} returned on {} (due {}), fine {}",
            loan_id,
            today,
            record.due_date,
            fine
        );
        Ok(record)
    }

    /// A borrower's own history, newest first
    pub async fn borrower_loans(&self, borrower_id: i32) -> AppResult<Vec<BorrowerLoan>> {
        let today = self.today();
        let mut loans = self.repository.loans.list_by_borrower(borrower_id).await?;
        for entry in &mut loans {
            entry.is_overdue = entry.loan.is_overdue(today);
        }
        Ok(loans)
    }

    /// All loans, optionally filtered, newest first
    pub async fn all_loans(&self, filter: Option<LoanFilter>) -> AppResult<Vec<LoanOverview>> {
        let today = self.today();
        let loans = self.repository.loans.list_all().await?;
        Ok(loans
            .into_iter()
            .filter(|entry| filter.map_or(true, |f| f.matches(&entry.loan, today)))
            .map(|mut entry| {
                entry.is_overdue = entry.loan.is_overdue(today);
                entry
            })
            .collect())
    }

    pub async fn stats(&self) -> AppResult<CirculationStats> {
        self.repository.circulation.stats(self.today()).await
    }
}
