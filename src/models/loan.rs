//! Loan (borrow) model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};

/// Lifecycle state of a loan. `Returned` is terminal.
///
/// Spelled in lowercase on the wire, like the column and the `status` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Borrowed,
    Returned,
}

impl LoanStatus {
    /// Column value
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Borrowed => "borrowed",
            LoanStatus::Returned => "returned",
        }
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "borrowed" => Ok(LoanStatus::Borrowed),
            "returned" => Ok(LoanStatus::Returned),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// SQLx conversion, stored as TEXT
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Loan record as stored in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanRecord {
    pub id: i32,
    pub book_id: i32,
    pub borrower_id: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    /// Frozen at return time, zero while borrowed
    pub fine: i64,
}

impl LoanRecord {
    pub fn is_returned(&self) -> bool {
        self.status == LoanStatus::Returned
    }

    /// Still out and past its due date
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == LoanStatus::Borrowed && self.due_date < today
    }
}

/// Values for a new ledger entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoan {
    pub book_id: i32,
    pub borrower_id: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// A borrower's own loan, with the book it refers to
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerLoan {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub loan: LoanRecord,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    #[sqlx(default)]
    pub is_overdue: bool,
}

/// Loan as seen by librarians, with book and borrower details
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanOverview {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub loan: LoanRecord,
    pub title: String,
    pub author: String,
    pub borrower_name: String,
    pub borrower_email: String,
    #[sqlx(default)]
    pub is_overdue: bool,
}

/// Filter for the librarian loan listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanFilter {
    Borrowed,
    Returned,
    Overdue,
}

impl LoanFilter {
    pub fn matches(&self, loan: &LoanRecord, today: NaiveDate) -> bool {
        match self {
            LoanFilter::Borrowed => loan.status == LoanStatus::Borrowed,
            LoanFilter::Returned => loan.status == LoanStatus::Returned,
            LoanFilter::Overdue => loan.is_overdue(today),
        }
    }
}

/// Query parameters for listing all loans
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub status: Option<LoanFilter>,
}

/// Circulation counters for the librarian dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CirculationStats {
    pub total_copies: i64,
    pub available_copies: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
    pub returned_loans: i64,
    pub fines_collected: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan(status: LoanStatus, due: NaiveDate) -> LoanRecord {
        LoanRecord {
            id: 1,
            book_id: 1,
            borrower_id: 1,
            borrow_date: due - chrono::Duration::days(14),
            due_date: due,
            return_date: (status == LoanStatus::Returned).then_some(due),
            status,
            fine: 0,
        }
    }

    #[test]
    fn test_overdue_only_when_borrowed_and_past_due() {
        let due = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let next_day = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();

        assert!(!loan(LoanStatus::Borrowed, due).is_overdue(due));
        assert!(loan(LoanStatus::Borrowed, due).is_overdue(next_day));
        assert!(!loan(LoanStatus::Returned, due).is_overdue(next_day));
    }

    #[test]
    fn test_filter_matches() {
        let due = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let later = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let out = loan(LoanStatus::Borrowed, due);
        let back = loan(LoanStatus::Returned, due);

        assert!(LoanFilter::Borrowed.matches(&out, later));
        assert!(LoanFilter::Overdue.matches(&out, later));
        assert!(!LoanFilter::Overdue.matches(&back, later));
        assert!(LoanFilter::Returned.matches(&back, later));
    }

    #[test]
    fn test_status_wire_form_matches_filter() {
        assert_eq!(serde_json::to_value(LoanStatus::Borrowed).unwrap(), "borrowed");
        assert_eq!(serde_json::to_value(LoanStatus::Returned).unwrap(), "returned");

        let filter: LoanFilter = serde_json::from_value(serde_json::json!("returned")).unwrap();
        assert_eq!(filter, LoanFilter::Returned);
        assert_eq!(LoanStatus::Returned.as_str(), "returned");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Borrowed".parse::<LoanStatus>(), Ok(LoanStatus::Borrowed));
        assert_eq!("returned".parse::<LoanStatus>(), Ok(LoanStatus::Returned));
        assert!("lost".parse::<LoanStatus>().is_err());
    }
}
