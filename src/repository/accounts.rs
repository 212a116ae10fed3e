//! Accounts repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::account::{Account, NewAccount, Role},
};

use super::AccountStore;

#[derive(Clone)]
pub struct AccountsRepository {
    pool: Pool<Postgres>,
}

impl AccountsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for AccountsRepository {
    async fn create(&self, account: &NewAccount) -> AppResult<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (role, name, email, contact, password)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(account.role)
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.contact)
        .bind(&account.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "Email already exists"))
    }

    async fn find_by_email(&self, role: Role, email: &str) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE role = $1 AND LOWER(email) = LOWER($2)",
        )
        .bind(role)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }
}
