use anyhow::Result;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::{prelude::*, users};
use game_types::User;

pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_user(model: users::Model) -> User {
        User {
            id: model.id,
            email: model.email,
            display_name: model.name,
            created_at: model.created_at.to_rfc3339(),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user_model = Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        Ok(user_model.map(Self::model_to_user))
    }

    pub async fn create_user(&self, email: &str, name: &str) -> Result<User> {
        let user_model = users::ActiveModel {
            id: sea_orm::ActiveValue::Set(Uuid::new_v4()),
            email: sea_orm::ActiveValue::Set(email.to_string()),
            name: sea_orm::ActiveValue::Set(name.to_string()),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().into()),
        };

        let saved_model = Users::insert(user_model).exec(&self.db).await?;

        // Fetch the created user
        let created_user = Users::find_by_id(saved_model.last_insert_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created user"))?;

        Ok(Self::model_to_user(created_user))
    }

    /// Return the user registered under `email`, creating it on first login.
    /// Existing users are never modified.
    pub async fn find_or_create(&self, email: &str, name: &str) -> Result<User> {
        if let Some(user) = self.find_by_email(email).await? {
            return Ok(user);
        }

        match self.create_user(email, name).await {
            Ok(user) => {
                tracing::info!("Registered new user {} ({})", user.email, user.id);
                Ok(user)
            }
            Err(err) => {
                // A concurrent login may have inserted the same email first
                match self.find_by_email(email).await? {
                    Some(user) => Ok(user),
                    None => Err(err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};

    async fn setup_test_db() -> UserRepository {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        UserRepository::new(db)
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let repo = setup_test_db().await;

        let created_user = repo.create_user("test@example.com", "Test User").await.unwrap();
        assert_eq!(created_user.email, "test@example.com");
        assert_eq!(created_user.display_name, "Test User");

        // Find by email
        let found_by_email = repo.find_by_email("test@example.com").await.unwrap().unwrap();
        assert_eq!(found_by_email.id, created_user.id);

        assert!(repo.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_or_create_keeps_existing_user() {
        let repo = setup_test_db().await;

        let first = repo.find_or_create("player@example.com", "Player").await.unwrap();
        // A later login with a changed profile name does not touch the row
        let second = repo
            .find_or_create("player@example.com", "Renamed Player")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name, "Player");
        let stored = repo.find_by_email("player@example.com").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = setup_test_db().await;

        let original = repo.create_user("dup@example.com", "One").await.unwrap();
        let result = repo.create_user("dup@example.com", "Two").await;
        assert!(result.is_err());

        let stored = repo.find_by_email("dup@example.com").await.unwrap().unwrap();
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.display_name, "One");
    }
}
