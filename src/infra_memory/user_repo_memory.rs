use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemoryUserRepo {
    users: DashMap<UserId, UserRecord>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user, e.g. to promote, demote, or ban in tests.
    pub fn upsert(&self, user: UserRecord) {
        self.users.insert(user.user_id, user);
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .map(|u| u.value().clone()))
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        match self.users.get_mut(&user_id) {
            Some(mut user) => {
                user.password_hash = password_hash.to_string();
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!("no user {}", user_id))),
        }
    }
}
