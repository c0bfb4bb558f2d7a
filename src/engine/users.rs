use serde_json::{Map, Value};
use tracing::info;

use super::Engine;
use crate::models::User;
use crate::utils::error::AppError;
use crate::validation::policy;

impl Engine {
    /// Registers a user at sign-up. The id comes from the identity provider.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when the id or the student number is taken.
    pub async fn create_user(&self, user: User) -> Result<User, AppError> {
        if self.users.exists(&user.id).await? {
            return Err(AppError::AlreadyExists(format!("user '{}'", user.id)));
        }
        if self.users.student_number_taken(&user.student_number).await? {
            return Err(AppError::AlreadyExists(format!(
                "student number {}",
                user.student_number
            )));
        }
        self.users.insert(&user).await?;

        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> Result<User, AppError> {
        self.users
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{id}'")))
    }

    pub async fn get_user_by_student_number(&self, student_number: &str) -> Result<User, AppError> {
        self.users
            .get_by_student_number(student_number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("student number {student_number}")))
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.users.list().await?)
    }

    /// # Errors
    ///
    /// `NotFound`, `EditNotAllowed`, `InvalidFieldValue`, `AlreadyExists` for
    /// a student number held by someone else, or `NoModification`.
    pub async fn update_user(&self, id: &str, updates: &Map<String, Value>) -> Result<(), AppError> {
        if !self.users.exists(id).await? {
            return Err(AppError::NotFound(format!("user '{id}'")));
        }

        let resolved = policy::user_updates(updates)?;
        if self.users.update(id, &resolved).await? == 0 {
            return Err(AppError::NoModification(format!("user '{id}'")));
        }

        info!(user_id = %id, fields = updates.len(), "User updated");
        Ok(())
    }
}
