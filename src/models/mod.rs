//! Data models for Bookshelf

pub mod account;
pub mod book;
pub mod loan;

// Re-export commonly used types
pub use account::{Account, Claims, Role};
pub use book::{Book, CreateBook};
pub use loan::{BorrowerLoan, LoanOverview, LoanRecord, LoanStatus, NewLoan};
