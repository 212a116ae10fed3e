//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{PgExecutor, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook},
};

use super::CatalogStore;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Apply `delta` to the shelf count when the result stays within
/// `0..=total_quantity`. Returns whether a row was updated.
pub(crate) async fn try_adjust_availability<'e, E>(
    executor: E,
    book_id: i32,
    delta: i32,
) -> AppResult<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE books
        SET available_quantity = available_quantity + $2
        WHERE id = $1
          AND available_quantity + $2 >= 0
          AND available_quantity + $2 <= total_quantity
        "#,
    )
    .bind(book_id)
    .bind(delta)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn book_exists<'e, E>(executor: E, book_id: i32) -> AppResult<bool>
where
    E: PgExecutor<'e>,
{
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
        .bind(book_id)
        .fetch_one(executor)
        .await?;
    Ok(exists)
}

/// Error for a refused shelf-count change on an existing book
pub(crate) fn out_of_range(book_id: i32, delta: i32) -> AppError {
    if delta < 0 {
        AppError::Unavailable(format!("No copies of book {} are available", book_id))
    } else {
        AppError::Validation(format!(
            "All copies of book {} are already on the shelf",
            book_id
        ))
    }
}

#[async_trait]
impl CatalogStore for BooksRepository {
    async fn find_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn list_all(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY title, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn list_available(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE available_quantity > 0 ORDER BY title, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, category, total_quantity, available_quantity)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.category)
        .bind(book.quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "ISBN already exists"))
    }

    async fn adjust_availability(&self, book_id: i32, delta: i32) -> AppResult<()> {
        if try_adjust_availability(&self.pool, book_id, delta).await? {
            return Ok(());
        }

        if book_exists(&self.pool, book_id).await? {
            Err(out_of_range(book_id, delta))
        } else {
            Err(AppError::NotFound(format!("Book with id {} not found", book_id)))
        }
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so a concurrent borrow waits for the outcome
        sqlx::query_scalar::<_, i32>("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let on_loan: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE book_id = $1 AND status = 'borrowed')",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if on_loan {
            return Err(AppError::HasActiveLoans(id));
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
