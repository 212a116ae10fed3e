//! Book model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Catalog entry with its copy counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub total_quantity: i32,
    /// Copies currently on the shelf, always within `0..=total_quantity`
    pub available_quantity: i32,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.available_quantity > 0
    }
}

/// Add book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    pub isbn: Option<String>,
    pub category: Option<String>,
    /// Number of copies, becomes both total and available quantity
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

impl CreateBook {
    /// Trim text fields and drop blank optional ones
    pub fn normalized(self) -> Self {
        fn blank_to_none(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            isbn: blank_to_none(self.isbn),
            category: blank_to_none(self.category),
            quantity: self.quantity,
        }
    }
}
