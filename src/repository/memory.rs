//! In-memory storage adapter
//!
//! Every operation runs under one mutex, so a borrow's availability check,
//! decrement and ledger insert happen as a single step.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        account::{Account, NewAccount, Role},
        book::{Book, CreateBook},
        loan::{
            BorrowerLoan, CirculationStats, LoanOverview, LoanRecord, LoanStatus, NewLoan,
        },
    },
};

use super::{books::out_of_range, AccountStore, CatalogStore, CirculationStore, LoanLedger};

#[derive(Debug, Default)]
struct MemoryState {
    books: BTreeMap<i32, Book>,
    loans: BTreeMap<i32, LoanRecord>,
    accounts: BTreeMap<i32, Account>,
    last_book_id: i32,
    last_loan_id: i32,
    last_account_id: i32,
}

fn book_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", id))
}

fn loan_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Loan with id {} not found", id))
}

fn newest_first(a: &LoanRecord, b: &LoanRecord) -> std::cmp::Ordering {
    b.borrow_date.cmp(&a.borrow_date).then(b.id.cmp(&a.id))
}

impl MemoryState {
    fn book(&self, id: i32) -> AppResult<&Book> {
        self.books.get(&id).ok_or_else(|| book_not_found(id))
    }

    fn sorted_books(&self, only_available: bool) -> Vec<Book> {
        let mut books: Vec<Book> = self
            .books
            .values()
            .filter(|b| !only_available || b.is_available())
            .cloned()
            .collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        books
    }

    fn adjust_availability(&mut self, book_id: i32, delta: i32) -> AppResult<()> {
        let book = self
            .books
            .get_mut(&book_id)
            .ok_or_else(|| book_not_found(book_id))?;

        let updated = book.available_quantity + delta;
        if updated < 0 || updated > book.total_quantity {
            return Err(out_of_range(book_id, delta));
        }

        book.available_quantity = updated;
        Ok(())
    }

    /// Foreign key checks for a new loan
    fn check_references(&self, loan: &NewLoan) -> AppResult<()> {
        if !self.books.contains_key(&loan.book_id) || !self.accounts.contains_key(&loan.borrower_id)
        {
            return Err(AppError::NotFound("Book or borrower not found".to_string()));
        }
        Ok(())
    }

    fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<LoanRecord> {
        self.check_references(loan)?;

        self.last_loan_id += 1;
        let record = LoanRecord {
            id: self.last_loan_id,
            book_id: loan.book_id,
            borrower_id: loan.borrower_id,
            borrow_date: loan.borrow_date,
            due_date: loan.due_date,
            return_date: None,
            status: LoanStatus::Borrowed,
            fine: 0,
        };
        self.loans.insert(record.id, record.clone());
        Ok(record)
    }

    fn close_loan(&mut self, loan_id: i32, return_date: NaiveDate, fine: i64) -> AppResult<LoanRecord> {
        let loan = self
            .loans
            .get_mut(&loan_id)
            .ok_or_else(|| loan_not_found(loan_id))?;

        if loan.is_returned() {
            return Err(AppError::AlreadyReturned(loan_id));
        }

        loan.status = LoanStatus::Returned;
        loan.return_date = Some(return_date);
        loan.fine = fine;
        Ok(loan.clone())
    }
}

/// Process-local store implementing every storage trait
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    fn lock(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Book> {
        self.lock()?.book(id).cloned()
    }

    async fn list_all(&self) -> AppResult<Vec<Book>> {
        Ok(self.lock()?.sorted_books(false))
    }

    async fn list_available(&self) -> AppResult<Vec<Book>> {
        Ok(self.lock()?.sorted_books(true))
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let mut state = self.lock()?;

        if let Some(ref isbn) = book.isbn {
            if state.books.values().any(|b| b.isbn.as_ref() == Some(isbn)) {
                return Err(AppError::DuplicateKey("ISBN already exists".to_string()));
            }
        }

        state.last_book_id += 1;
        let created = Book {
            id: state.last_book_id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            category: book.category.clone(),
            total_quantity: book.quantity,
            available_quantity: book.quantity,
        };
        state.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn adjust_availability(&self, book_id: i32, delta: i32) -> AppResult<()> {
        self.lock()?.adjust_availability(book_id, delta)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.lock()?;
        state.book(id)?;

        let on_loan = state
            .loans
            .values()
            .any(|l| l.book_id == id && !l.is_returned());
        if on_loan {
            return Err(AppError::HasActiveLoans(id));
        }

        state.books.remove(&id);
        state.loans.retain(|_, l| l.book_id != id);
        Ok(())
    }
}

#[async_trait]
impl LoanLedger for MemoryStore {
    async fn create(&self, loan: &NewLoan) -> AppResult<LoanRecord> {
        self.lock()?.insert_loan(loan)
    }

    async fn find_by_id(&self, id: i32) -> AppResult<LoanRecord> {
        self.lock()?
            .loans
            .get(&id)
            .cloned()
            .ok_or_else(|| loan_not_found(id))
    }

    async fn list_by_borrower(&self, borrower_id: i32) -> AppResult<Vec<BorrowerLoan>> {
        let state = self.lock()?;

        let mut loans: Vec<&LoanRecord> = state
            .loans
            .values()
            .filter(|l| l.borrower_id == borrower_id)
            .collect();
        loans.sort_by(|a, b| newest_first(a, b));

        Ok(loans
            .into_iter()
            .filter_map(|loan| {
                let book = state.books.get(&loan.book_id)?;
                Some(BorrowerLoan {
                    loan: loan.clone(),
                    title: book.title.clone(),
                    author: book.author.clone(),
                    isbn: book.isbn.clone(),
                    is_overdue: false,
                })
            })
            .collect())
    }

    async fn list_all(&self) -> AppResult<Vec<LoanOverview>> {
        let state = self.lock()?;

        let mut loans: Vec<&LoanRecord> = state.loans.values().collect();
        loans.sort_by(|a, b| newest_first(a, b));

        Ok(loans
            .into_iter()
            .filter_map(|loan| {
                let book = state.books.get(&loan.book_id)?;
                let borrower = state.accounts.get(&loan.borrower_id)?;
                Some(LoanOverview {
                    loan: loan.clone(),
                    title: book.title.clone(),
                    author: book.author.clone(),
                    borrower_name: borrower.name.clone(),
                    borrower_email: borrower.email.clone(),
                    is_overdue: false,
                })
            })
            .collect())
    }

    async fn mark_returned(
        &self,
        loan_id: i32,
        return_date: NaiveDate,
        fine: i64,
    ) -> AppResult<LoanRecord> {
        self.lock()?.close_loan(loan_id, return_date, fine)
    }
}

#[async_trait]
impl CirculationStore for MemoryStore {
    async fn borrow(&self, loan: &NewLoan) -> AppResult<LoanRecord> {
        let mut state = self.lock()?;
        state.check_references(loan)?;
        state.adjust_availability(loan.book_id, -1)?;
        state.insert_loan(loan)
    }

    async fn return_loan(
        &self,
        loan_id: i32,
        return_date: NaiveDate,
        fine: i64,
    ) -> AppResult<LoanRecord> {
        let mut state = self.lock()?;

        let loan = state
            .loans
            .get(&loan_id)
            .ok_or_else(|| loan_not_found(loan_id))?;
        if loan.is_returned() {
            return Err(AppError::AlreadyReturned(loan_id));
        }
        let book_id = loan.book_id;

        // Shelf count first: a refusal leaves the loan untouched
        state.adjust_availability(book_id, 1).map_err(|e| {
            AppError::Internal(format!(
                "Shelf count of book {} out of range while returning loan {}: {}",
                book_id, loan_id, e
            ))
        })?;
        state.close_loan(loan_id, return_date, fine)
    }

    async fn stats(&self, today: NaiveDate) -> AppResult<CirculationStats> {
        let state = self.lock()?;

        let mut stats = CirculationStats::default();
        for book in state.books.values() {
            stats.total_copies += i64::from(book.total_quantity);
            stats.available_copies += i64::from(book.available_quantity);
        }
        for loan in state.loans.values() {
            match loan.status {
                LoanStatus::Borrowed => stats.active_loans += 1,
                LoanStatus::Returned => stats.returned_loans += 1,
            }
            if loan.is_overdue(today) {
                stats.overdue_loans += 1;
            }
            stats.fines_collected += loan.fine;
        }
        Ok(stats)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create(&self, account: &NewAccount) -> AppResult<Account> {
        let mut state = self.lock()?;

        let taken = state
            .accounts
            .values()
            .any(|a| a.role == account.role && a.email.eq_ignore_ascii_case(&account.email));
        if taken {
            return Err(AppError::DuplicateKey("Email already exists".to_string()));
        }

        state.last_account_id += 1;
        let created = Account {
            id: state.last_account_id,
            role: account.role,
            name: account.name.clone(),
            email: account.email.clone(),
            contact: account.contact.clone(),
            password: account.password_hash.clone(),
            created_at: Utc::now(),
        };
        state.accounts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, role: Role, email: &str) -> AppResult<Option<Account>> {
        Ok(self
            .lock()?
            .accounts
            .values()
            .find(|a| a.role == role && a.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}
