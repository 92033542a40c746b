//! User directory: identity keys to farm profiles

use common::error::DatabaseError;
use std::{collections::HashMap, sync::Arc};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{ProfilePatch, ProfileSync, User};
use crate::repositories::UserRepository;

#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<dyn UserRepository>,
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Create the profile on first contact, otherwise merge the provided
    /// fields into the stored one.
    pub async fn upsert_profile(&self, sync: ProfileSync) -> ApiResult<User> {
        let identity_key = sync.identity_key.clone().unwrap_or_default();
        let email = sync.email.clone().unwrap_or_default();
        if identity_key.trim().is_empty() || email.trim().is_empty() {
            return Err(ApiError::Validation(
                "clerkId and email are required".to_string(),
            ));
        }

        if let Some(user) = self.users.find_by_clerk_id(identity_key.trim()).await? {
            return self.merge(user, sync.fields()).await;
        }

        let user = User::new(&identity_key, &email, sync.fields())?;
        match self.users.insert(&user).await {
            Ok(()) => {
                info!("Created profile for {}", user.clerk_id);
                Ok(user)
            }
            // A concurrent sync created the same identity first.
            Err(DatabaseError::Duplicate(_)) => {
                match self.users.find_by_clerk_id(&user.clerk_id).await? {
                    Some(existing) => self.merge(existing, sync.fields()).await,
                    None => Err(ApiError::Validation(
                        "A profile with this email already exists".to_string(),
                    )),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_profile(&self, identity_key: &str) -> ApiResult<User> {
        self.users
            .find_by_clerk_id(identity_key.trim())
            .await?
            .ok_or_else(user_not_found)
    }

    pub async fn update_profile(&self, identity_key: &str, patch: ProfilePatch) -> ApiResult<User> {
        let user = self.get_profile(identity_key).await?;
        self.merge(user, patch).await
    }

    /// The user behind an identity key, or 404 "User not found".
    pub async fn resolve(&self, identity_key: &str) -> ApiResult<User> {
        self.get_profile(identity_key).await
    }

    pub async fn users_by_ids(&self, ids: &[Uuid]) -> ApiResult<HashMap<Uuid, User>> {
        let users = self.users.find_by_ids(ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    async fn merge(&self, mut user: User, patch: ProfilePatch) -> ApiResult<User> {
        if patch.apply(&mut user) {
            self.users.update(&user).await?;
            info!("Updated profile for {}", user.clerk_id);
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FarmingType;
    use crate::repositories::MemoryUserRepository;

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(MemoryUserRepository::new()))
    }

    fn sync(json: serde_json::Value) -> ProfileSync {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_creates_then_merges() {
        let directory = directory();
        let created = directory
            .upsert_profile(sync(serde_json::json!({"identityKey": "u1", "email": "a@b.com"})))
            .await
            .unwrap();
        assert_eq!(created.farm_size, "0");

        let merged = directory
            .upsert_profile(sync(serde_json::json!({
                "identityKey": "u1",
                "email": "a@b.com",
                "location": "Satara",
                "farmSize": ""
            })))
            .await
            .unwrap();
        assert_eq!(merged.id, created.id);
        assert_eq!(merged.location, "Satara");
        assert_eq!(merged.farm_size, "0");
        assert_eq!(merged.farming_type, FarmingType::Conventional);
    }

    #[tokio::test]
    async fn test_upsert_requires_identity_and_email() {
        let err = directory()
            .upsert_profile(sync(serde_json::json!({"identityKey": "u1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_identity_is_not_found() {
        let err = directory().resolve("ghost").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "User not found"));
    }
}
