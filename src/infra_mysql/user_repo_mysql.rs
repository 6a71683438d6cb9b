use super::util::unavailable;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, StoreError> {
        let role: String = row.try_get("role").map_err(unavailable)?;
        Ok(UserRecord {
            user_id: UserId(row.try_get("user_id").map_err(unavailable)?),
            email: row.try_get("email").map_err(unavailable)?,
            password_hash: row.try_get("password_hash").map_err(unavailable)?,
            role: role
                .parse()
                .map_err(|e: UnknownRole| StoreError::Unavailable(e.to_string()))?,
            is_active: row.try_get("is_active").map_err(unavailable)?,
            is_banned: row.try_get("is_banned").map_err(unavailable)?,
        })
    }
}

const SELECT_USER: &str = r#"
SELECT user_id, email, password_hash, role, is_active, is_banned
FROM user_account
"#;

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row_opt = sqlx::query(&format!("{SELECT_USER} WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let row_opt = sqlx::query(&format!("{SELECT_USER} WHERE user_id = ?"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE user_account SET password_hash = ? WHERE user_id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
