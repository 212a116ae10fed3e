//! Repository layer for database operations
//!
//! Services talk to storage through the traits below. Two adapters exist:
//! the Postgres repositories (`books`, `loans`, `accounts`) and the
//! process-local [`memory::MemoryStore`].

pub mod accounts;
pub mod books;
pub mod loans;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        account::{Account, NewAccount, Role},
        book::{Book, CreateBook},
        loan::{BorrowerLoan, CirculationStats, LoanOverview, LoanRecord, NewLoan},
    },
};

/// Book records and their shelf counts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Book>;

    /// All books ordered by title
    async fn list_all(&self) -> AppResult<Vec<Book>>;

    /// Books with at least one copy on the shelf, ordered by title
    async fn list_available(&self) -> AppResult<Vec<Book>>;

    /// Insert a book with `quantity` copies, all available.
    /// Fails with `DuplicateKey` when the ISBN is taken.
    async fn create(&self, book: &CreateBook) -> AppResult<Book>;

    /// Add `delta` to the available count in one conditional update.
    /// A delta that would leave `0..=total_quantity` is refused.
    async fn adjust_availability(&self, book_id: i32, delta: i32) -> AppResult<()>;

    /// Remove a book. Refused with `HasActiveLoans` while copies are out.
    async fn delete(&self, id: i32) -> AppResult<()>;
}

/// Borrow records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanLedger: Send + Sync {
    /// Insert a `Borrowed` entry with no return date and zero fine
    async fn create(&self, loan: &NewLoan) -> AppResult<LoanRecord>;

    async fn find_by_id(&self, id: i32) -> AppResult<LoanRecord>;

    /// A borrower's loans, newest borrow date first
    async fn list_by_borrower(&self, borrower_id: i32) -> AppResult<Vec<BorrowerLoan>>;

    /// Every loan with book and borrower details, newest borrow date first
    async fn list_all(&self) -> AppResult<Vec<LoanOverview>>;

    /// Close a loan. Fails with `AlreadyReturned` when it is closed already.
    async fn mark_returned(
        &self,
        loan_id: i32,
        return_date: NaiveDate,
        fine: i64,
    ) -> AppResult<LoanRecord>;
}

/// Units of work spanning the catalog and the ledger.
///
/// Each call either applies both writes or neither.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CirculationStore: Send + Sync {
    /// Take one copy off the shelf and record the loan.
    /// Fails with `Unavailable` when no copy is left.
    async fn borrow(&self, loan: &NewLoan) -> AppResult<LoanRecord>;

    /// Close the loan and put its copy back on the shelf
    async fn return_loan(
        &self,
        loan_id: i32,
        return_date: NaiveDate,
        fine: i64,
    ) -> AppResult<LoanRecord>;

    async fn stats(&self, today: NaiveDate) -> AppResult<CirculationStats>;
}

/// Student and librarian accounts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with `DuplicateKey` when the email is taken for that role
    async fn create(&self, account: &NewAccount) -> AppResult<Account>;

    /// Case-insensitive email lookup within one role
    async fn find_by_email(&self, role: Role, email: &str) -> AppResult<Option<Account>>;
}

/// Storage handles shared by all services
#[derive(Clone)]
pub struct Repository {
    pub pool: Option<Pool<Postgres>>,
    pub books: Arc<dyn CatalogStore>,
    pub loans: Arc<dyn LoanLedger>,
    pub circulation: Arc<dyn CirculationStore>,
    pub accounts: Arc<dyn AccountStore>,
}

impl Repository {
    /// Create a Postgres-backed repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        let loans = Arc::new(loans::LoansRepository::new(pool.clone()));
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            loans: loans.clone(),
            circulation: loans,
            accounts: Arc::new(accounts::AccountsRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create a repository backed by a fresh in-memory store
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            pool: None,
            books: store.clone(),
            loans: store.clone(),
            circulation: store.clone(),
            accounts: store,
        }
    }

    /// Check that storage answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(ref pool) = self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}
