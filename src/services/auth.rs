//! Registration, login and token verification

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::account::{
        Account, Claims, LoginRequest, NewAccount, RegisterLibrarian, RegisterStudent, Role,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a student and return a token for the new account
    pub async fn register_student(&self, request: RegisterStudent) -> AppResult<(String, Account)> {
        let contact = request
            .contact
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self.register(Role::Student, request.name, request.email, contact, &request.password)
            .await
    }

    /// Register a librarian and return a token for the new account
    pub async fn register_librarian(
        &self,
        request: RegisterLibrarian,
    ) -> AppResult<(String, Account)> {
        self.register(Role::Librarian, request.name, request.email, None, &request.password)
            .await
    }

    async fn register(
        &self,
        role: Role,
        name: String,
        email: String,
        contact: Option<String>,
        password: &str,
    ) -> AppResult<(String, Account)> {
        let account = NewAccount {
            role,
            name: name.trim().to_string(),
            email: normalize_email(&email),
            contact,
            password_hash: self.hash_password(password)?,
        };

        let account = self.repository.accounts.create(&account).await?;
        tracing::info!("Registered {} account id={}", role, account.id);

        let token = self.create_token_for(&account)?;
        Ok((token, account))
    }

    /// Check credentials for the given role and return a token
    pub async fn login(&self, request: LoginRequest) -> AppResult<(String, Account)> {
        let account = self
            .repository
            .accounts
            .find_by_email(request.role, &normalize_email(&request.email))
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !self.verify_password(&account, &request.password)? {
            tracing::warn!("Failed login for {} account id={}", account.role, account.id);
            return Err(AppError::InvalidCredentials);
        }

        let token = self.create_token_for(&account)?;
        Ok((token, account))
    }

    /// Decode a bearer token into the caller's claims
    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        Claims::from_token(token, &self.config.jwt_secret).map_err(|e| {
            tracing::debug!("Rejected token: {}", e);
            AppError::Unauthorized("Invalid or expired token".to_string())
        })
    }

    fn create_token_for(&self, account: &Account) -> AppResult<String> {
        Claims::new(
            account.id,
            account.role,
            Utc::now(),
            self.config.jwt_expiration_hours,
        )
        .create_token(&self.config.jwt_secret)
        .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn verify_password(&self, account: &Account, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&account.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
