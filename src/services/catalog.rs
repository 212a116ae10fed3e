//! Catalog management service

use crate::{
    error::AppResult,
    models::book::{Book, CreateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list_all().await
    }

    pub async fn list_available(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list_available().await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.find_by_id(id).await
    }

    /// Add a book with all its copies on the shelf
    pub async fn add_book(&self, book: CreateBook) -> AppResult<Book> {
        let book = book.normalized();
        let created = self.repository.books.create(&book).await?;
        tracing::info!(
            "Catalog create: book id={} \"{}\" with {} copies",
            created.id,
            created.title,
            created.total_quantity
        );
        Ok(created)
    }

    /// Remove a book that has no copy out on loan
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!("Catalog delete: book id={}", id);
        Ok(())
    }
}
