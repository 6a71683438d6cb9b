use crate::application_port::*;
use crate::domain_port::UserRepo;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_service: Arc<dyn TokenService>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_service: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_service,
        }
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn login(
        &self,
        request: LoginInput,
        cancel: &CancellationToken,
    ) -> Result<LoginResult, AuthError> {
        let LoginInput { email, password } = request;

        let user = self
            .user_repo
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.may_authenticate() {
            debug!(user_id = %user.user_id, "login refused for disabled account");
            return Err(AuthError::InvalidCredentials);
        }

        let ok = self
            .credential_hasher
            .verify_password(&password, &user.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self
            .token_service
            .issue_token_pair(user.user_id, user.role, cancel)
            .await?;

        Ok(LoginResult {
            user_id: user.user_id,
            tokens,
        })
    }

    async fn change_password(
        &self,
        request: ChangePasswordInput,
        cancel: &CancellationToken,
    ) -> Result<u64, AuthError> {
        let ChangePasswordInput {
            user_id,
            old_password,
            new_password,
        } = request;

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self
            .credential_hasher
            .verify_password(&old_password, &user.password_hash)
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = self.credential_hasher.hash_password(&new_password).await?;
        self.user_repo
            .update_password_hash(user_id, &new_hash)
            .await?;

        let revoked = self
            .token_service
            .revoke_all_for_subject(user_id, cancel)
            .await?;
        info!(%user_id, revoked, "password changed");
        Ok(revoked)
    }
}
