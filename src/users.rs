//! User registration and lookup.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::ApiError;
use crate::model::{NewUser, User};
use crate::storage::Storage;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("El nombre es obligatorio")]
    MissingName,

    #[error("Email no válido: {0}")]
    InvalidEmail(String),

    #[error("El email ya está registrado: {0}")]
    DuplicateEmail(String),

    #[error("Usuario no encontrado: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::MissingName | UserError::InvalidEmail(_) => ApiError::Validation(e.to_string()),
            UserError::DuplicateEmail(_) => ApiError::Conflict(e.to_string()),
            UserError::NotFound(_) => ApiError::NotFound(e.to_string()),
            UserError::Storage(inner) => ApiError::Internal(inner),
        }
    }
}

/// Trim the name, trim and lowercase the email, and check both.
pub fn normalize(new_user: &NewUser) -> Result<NewUser, UserError> {
    let name = new_user.name.trim();
    if name.is_empty() {
        return Err(UserError::MissingName);
    }

    let email = new_user.email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(UserError::InvalidEmail(new_user.email.clone()));
    }

    Ok(NewUser {
        name: name.to_string(),
        email,
    })
}

/// Register a new user with zero points.
pub async fn register(storage: &Storage, new_user: &NewUser, now: DateTime<Utc>) -> Result<User, UserError> {
    let new_user = normalize(new_user)?;

    if storage.get_user_by_email(&new_user.email).await?.is_some() {
        return Err(UserError::DuplicateEmail(new_user.email));
    }

    let user = storage.create_user(&new_user, now).await?;
    info!(user_id = %user.id, "User registered");
    Ok(user)
}

pub async fn find(storage: &Storage, user_id: &str) -> Result<User, UserError> {
    storage
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| UserError::NotFound(user_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_normalize() {
        let user = normalize(&new_user("  Ana  ", " Ana@Example.COM ")).unwrap();
        assert_eq!(user.name, "Ana");
        assert_eq!(user.email, "ana@example.com");
    }

    #[test]
    fn test_normalize_rejects() {
        assert!(matches!(normalize(&new_user(" ", "a@b.c")), Err(UserError::MissingName)));
        assert!(matches!(normalize(&new_user("Ana", "ana")), Err(UserError::InvalidEmail(_))));
        assert!(matches!(normalize(&new_user("Ana", "@b.c")), Err(UserError::InvalidEmail(_))));
    }

    #[tokio::test]
    async fn test_register_and_find() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let user = register(&storage, &new_user("Ana", "ana@example.com"), Utc::now())
            .await
            .unwrap();
        assert_eq!(user.points, 0);
        assert_eq!(user.level, 1);

        let found = find(&storage, &user.id).await.unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.email, "ana@example.com");

        assert!(matches!(find(&storage, "nope").await, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_case_insensitive() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        register(&storage, &new_user("Ana", "ana@example.com"), Utc::now())
            .await
            .unwrap();
        let err = register(&storage, &new_user("Otra Ana", "ANA@example.com"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::DuplicateEmail(_)));
    }
}
