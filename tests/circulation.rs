//! Borrow/return workflow against the in-memory store

use std::sync::Arc;

use chrono::NaiveDate;

use bookshelf_server::{
    config::AppConfig,
    models::{
        account::{LoginRequest, RegisterStudent, Role},
        book::CreateBook,
        loan::{LoanFilter, LoanStatus},
    },
    repository::Repository,
    services::Services,
    AppError,
};

mod support;

use support::MutableClock;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Library {
    services: Services,
    clock: Arc<MutableClock>,
}

impl Library {
    fn open(today: NaiveDate) -> Self {
        let clock = Arc::new(MutableClock::on(today));
        let services = Services::new(Repository::in_memory(), &AppConfig::default(), clock.clone());
        Self { services, clock }
    }

    async fn add_book(&self, title: &str, quantity: i32) -> i32 {
        self.services
            .catalog
            .add_book(CreateBook {
                title: title.to_string(),
                author: "Ursula K. Le Guin".to_string(),
                isbn: None,
                category: Some("Fiction".to_string()),
                quantity,
            })
            .await
            .unwrap()
            .id
    }

    async fn student(&self, email: &str) -> i32 {
        let (_, account) = self
            .services
            .auth
            .register_student(RegisterStudent {
                name: "Ada".to_string(),
                email: email.to_string(),
                contact: None,
                password: "password".to_string(),
            })
            .await
            .unwrap();
        account.id
    }

    async fn available(&self, book_id: i32) -> i32 {
        self.services
            .catalog
            .get_book(book_id)
            .await
            .unwrap()
            .available_quantity
    }
}

#[tokio::test]
async fn test_borrow_sets_fourteen_day_due_date() {
    let library = Library::open(date(2025, 1, 25));
    let book = library.add_book("The Dispossessed", 1).await;
    let student = library.student("ada@example.com").await;

    let loan = library.services.circulation.borrow_book(student, book).await.unwrap();

    assert_eq!(loan.borrow_date, date(2025, 1, 25));
    assert_eq!(loan.due_date, date(2025, 2, 8));
    assert_eq!(loan.status, LoanStatus::Borrowed);
    assert_eq!(loan.return_date, None);
    assert_eq!(loan.fine, 0);
    assert_eq!(library.available(book).await, 0);
}

#[tokio::test]
async fn test_borrow_without_copies_creates_no_loan() {
    let library = Library::open(date(2025, 3, 1));
    let book = library.add_book("Lathe of Heaven", 1).await;
    let first = library.student("first@example.com").await;
    let second = library.student("second@example.com").await;

    library.services.circulation.borrow_book(first, book).await.unwrap();
    let err = library
        .services
        .circulation
        .borrow_book(second, book)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unavailable(_)));
    assert!(library
        .services
        .circulation
        .borrower_loans(second)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(library.available(book).await, 0);
}

#[tokio::test]
async fn test_borrow_unknown_book_is_not_found() {
    let library = Library::open(date(2025, 3, 1));
    let student = library.student("ada@example.com").await;

    let err = library
        .services
        .circulation
        .borrow_book(student, 999)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_fines_around_due_date() {
    for (days_after_due, expected) in [(0, 0), (1, 10), (3, 30)] {
        let library = Library::open(date(2025, 3, 1));
        let book = library.add_book("Always Coming Home", 1).await;
        let student = library.student("ada@example.com").await;
        let loan = library.services.circulation.borrow_book(student, book).await.unwrap();

        library.clock.set_date(loan.due_date);
        library.clock.advance_days(days_after_due);
        let returned = library.services.circulation.return_book(loan.id).await.unwrap();

        assert_eq!(returned.fine, expected, "{} days late", days_after_due);
    }
}

#[tokio::test]
async fn test_return_restores_availability() {
    let library = Library::open(date(2025, 3, 1));
    let book = library.add_book("Tehanu", 3).await;
    let student = library.student("ada@example.com").await;

    let loan = library.services.circulation.borrow_book(student, book).await.unwrap();
    assert_eq!(library.available(book).await, 2);

    library.clock.advance_days(5);
    let returned = library.services.circulation.return_book(loan.id).await.unwrap();

    assert_eq!(returned.status, LoanStatus::Returned);
    assert_eq!(returned.return_date, Some(date(2025, 3, 6)));
    assert_eq!(returned.fine, 0);
    assert_eq!(library.available(book).await, 3);
}

#[tokio::test]
async fn test_second_return_is_refused_and_keeps_first() {
    let library = Library::open(date(2025, 3, 1));
    let book = library.add_book("Tehanu", 1).await;
    let student = library.student("ada@example.com").await;
    let loan = library.services.circulation.borrow_book(student, book).await.unwrap();

    library.clock.advance_days(16);
    let first = library.services.circulation.return_book(loan.id).await.unwrap();
    assert_eq!(first.fine, 20);

    library.clock.advance_days(10);
    let err = library.services.circulation.return_book(loan.id).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyReturned(id) if id == loan.id));

    let history = library.services.circulation.borrower_loans(student).await.unwrap();
    assert_eq!(history[0].loan.fine, 20);
    assert_eq!(history[0].loan.return_date, Some(date(2025, 3, 17)));
    assert_eq!(library.available(book).await, 1);
}

#[tokio::test]
async fn test_two_copies_scenario() {
    let library = Library::open(date(2025, 3, 1));
    let book = library.add_book("The Word for World is Forest", 2).await;
    let student = library.student("ada@example.com").await;
    let circulation = &library.services.circulation;

    let first = circulation.borrow_book(student, book).await.unwrap();
    circulation.borrow_book(student, book).await.unwrap();
    assert_eq!(library.available(book).await, 0);

    let err = circulation.borrow_book(student, book).await.unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));

    library.clock.set_date(first.due_date);
    library.clock.advance_days(20);
    let returned = circulation.return_book(first.id).await.unwrap();

    assert_eq!(returned.fine, 200);
    assert_eq!(library.available(book).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_of_last_copy() {
    let library = Library::open(date(2025, 3, 1));
    let book = library.add_book("A Wizard of Earthsea", 1).await;
    let mut students = Vec::new();
    for i in 0..16 {
        students.push(library.student(&format!("student{}@example.com", i)).await);
    }

    let handles: Vec<_> = students
        .into_iter()
        .map(|student| {
            let circulation = library.services.circulation.clone();
            tokio::spawn(async move { circulation.borrow_book(student, book).await })
        })
        .collect();

    let mut granted = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(AppError::Unavailable(_)) => refused += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(granted, 1);
    assert_eq!(refused, 15);
    assert_eq!(library.available(book).await, 0);
    assert_eq!(
        library.services.circulation.all_loans(None).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_overdue_flag_and_filters() {
    let library = Library::open(date(2025, 3, 1));
    let book = library.add_book("Rocannon's World", 2).await;
    let student = library.student("ada@example.com").await;
    let circulation = &library.services.circulation;

    let late = circulation.borrow_book(student, book).await.unwrap();
    let kept = circulation.borrow_book(student, book).await.unwrap();
    library.clock.advance_days(15);
    circulation.return_book(kept.id).await.unwrap();

    let mine = circulation.borrower_loans(student).await.unwrap();
    let late_entry = mine.iter().find(|l| l.loan.id == late.id).unwrap();
    assert!(late_entry.is_overdue);

    let overdue = circulation.all_loans(Some(LoanFilter::Overdue)).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].loan.id, late.id);
    assert_eq!(overdue[0].borrower_email, "ada@example.com");

    let returned = circulation.all_loans(Some(LoanFilter::Returned)).await.unwrap();
    assert_eq!(returned.len(), 1);
    assert_eq!(returned[0].loan.fine, 10);

    let stats = circulation.stats().await.unwrap();
    assert_eq!(stats.total_copies, 2);
    assert_eq!(stats.available_copies, 1);
    assert_eq!(stats.active_loans, 1);
    assert_eq!(stats.overdue_loans, 1);
    assert_eq!(stats.returned_loans, 1);
    assert_eq!(stats.fines_collected, 10);
}

#[tokio::test]
async fn test_delete_book_with_loan_out_is_refused() {
    let library = Library::open(date(2025, 3, 1));
    let book = library.add_book("Planet of Exile", 1).await;
    let student = library.student("ada@example.com").await;
    let loan = library.services.circulation.borrow_book(student, book).await.unwrap();

    let err = library.services.catalog.delete_book(book).await.unwrap_err();
    assert!(matches!(err, AppError::HasActiveLoans(_)));

    library.services.circulation.return_book(loan.id).await.unwrap();
    library.services.catalog.delete_book(book).await.unwrap();

    let err = library.services.catalog.get_book(book).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(library
        .services
        .circulation
        .borrower_loans(student)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_duplicate_email_and_wrong_password() {
    let library = Library::open(date(2025, 3, 1));
    library.student("ada@example.com").await;

    let err = library
        .services
        .auth
        .register_student(RegisterStudent {
            name: "Other Ada".to_string(),
            email: "ADA@example.com".to_string(),
            contact: None,
            password: "another".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateKey(_)));

    let err = library
        .services
        .auth
        .login(LoginRequest {
            role: Role::Student,
            email: "ada@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
}

#[tokio::test]
async fn test_duplicate_isbn_is_rejected() {
    let library = Library::open(date(2025, 3, 1));
    let book = CreateBook {
        title: "The Left Hand of Darkness".to_string(),
        author: "Ursula K. Le Guin".to_string(),
        isbn: Some("978-0441478125".to_string()),
        category: None,
        quantity: 1,
    };

    library.services.catalog.add_book(book.clone()).await.unwrap();
    let err = library.services.catalog.add_book(book).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateKey(_)));
}
