//! In-memory user store for local development and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{StoreError, User, UserStore};

/// User store held entirely in process memory. Not durable.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(id).cloned())
    }

    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError("email already exists".to_string()));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_password_hash(&self, id: &str, hash: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(id) {
            Some(user) => {
                user.password_hash = hash.to_string();
                Ok(())
            }
            None => Err(StoreError("user not found".to_string())),
        }
    }

    async fn set_email_verified(&self, id: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(id) {
            Some(user) => {
                user.email_verified = true;
                Ok(())
            }
            None => Err(StoreError("user not found".to_string())),
        }
    }
}
