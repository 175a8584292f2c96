//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! toyshop-cli user create -e shopper@example.com -n "Sam Shopper"
//! toyshop-cli user create -e admin@example.com -n "Admin Name" --admin
//! ```
//!
//! The printed user ID is what the access gate forwards in `x-user-id`.

use thiserror::Error;

use toyshop_core::{Email, UserId};
use toyshop_storefront::db::{self, PgStore, RepositoryError};
use toyshop_storefront::models::NewUser;
use toyshop_storefront::store::UserStore;

use super::{CommandError, database_url};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Blank display name.
    #[error("Name cannot be blank")]
    BlankName,

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),

    /// Database error.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Validate the inputs for a new user.
fn new_user(email: &str, name: &str, is_admin: bool) -> Result<NewUser, UserError> {
    let email = Email::parse(email).map_err(|e| UserError::InvalidEmail(e.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(UserError::BlankName);
    }
    Ok(NewUser {
        email,
        name: name.to_owned(),
        is_admin,
    })
}

/// Create a new user.
///
/// # Errors
///
/// Returns `UserError` for invalid input, a duplicate email or a database
/// failure.
pub async fn create_user(email: &str, name: &str, is_admin: bool) -> Result<UserId, UserError> {
    let user = new_user(email, name, is_admin)?;
    let database_url = database_url()?;

    tracing::info!("Connecting to storefront database...");
    let pool = db::create_pool(&database_url)
        .await
        .map_err(CommandError::from)?;
    let store = PgStore::new(pool);

    tracing::info!("Creating user: {} (admin: {})", user.email, is_admin);
    let created = store.insert_user(&user).await.map_err(|e| match e {
        RepositoryError::Conflict(_) => UserError::UserExists(user.email.to_string()),
        other => UserError::Repository(other),
    })?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}",
        created.id,
        created.email
    );
    Ok(created.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_validates_email() {
        assert!(matches!(
            new_user("not-an-email", "Sam", false),
            Err(UserError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_new_user_rejects_blank_name() {
        assert!(matches!(
            new_user("sam@example.com", "  ", false),
            Err(UserError::BlankName)
        ));
    }

    #[test]
    fn test_new_user_trims_name() {
        let user = new_user("sam@example.com", " Sam ", true).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(user.name, "Sam");
        assert!(user.is_admin);
    }
}
