use std::sync::Arc;

use anyhow::Context;
use rand::{rngs::OsRng, RngCore};
use reqwest::Url;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use super::{
    password::hash_password,
    repo::UserStore,
    services::{is_valid_email, normalize_email},
};
use crate::{
    config::RecoveryConfig,
    error::{AppError, AppResult},
    mailer::{Mailer, OutgoingEmail},
};

pub const RECOVERY_MESSAGE: &str =
    "If the email is registered, a recovery link has been sent";

/// 32 random bytes, hex encoded. Only the holder of the email ever sees it.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Password reset by emailed single-use token.
#[derive(Clone)]
pub struct RecoveryService {
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    reset_page: Url,
    token_ttl: Duration,
}

impl RecoveryService {
    pub fn new(
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        cfg: &RecoveryConfig,
    ) -> anyhow::Result<Self> {
        let reset_page = Url::parse(&format!(
            "{}/reset-password",
            cfg.frontend_url.trim_end_matches('/')
        ))
        .with_context(|| format!("invalid FRONTEND_URL {}", cfg.frontend_url))?;
        Ok(Self {
            users,
            mailer,
            reset_page,
            token_ttl: Duration::minutes(cfg.token_ttl_minutes),
        })
    }

    fn reset_link(&self, token: &str, email: &str) -> String {
        let mut url = self.reset_page.clone();
        url.query_pairs_mut()
            .append_pair("token", token)
            .append_pair("email", email);
        url.to_string()
    }

    /// Same outcome for known and unknown addresses.
    #[instrument(skip(self))]
    pub async fn request_recovery(&self, email: &str) -> AppResult<&'static str> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            info!("recovery requested for malformed email");
            return Ok(RECOVERY_MESSAGE);
        }

        let Some(user) = self.users.find_by_email(&email).await? else {
            info!("recovery requested for unknown email");
            return Ok(RECOVERY_MESSAGE);
        };

        let token = generate_token();
        let expires_at = OffsetDateTime::now_utc() + self.token_ttl;
        if let Err(e) = self
            .users
            .store_reset_token(user.id, &hash_token(&token), expires_at)
            .await
        {
            warn!(error = %e, user_id = %user.id, "storing reset token failed");
            return Ok(RECOVERY_MESSAGE);
        }

        let link = self.reset_link(&token, &user.email);
        let message = OutgoingEmail {
            to: user.email.clone(),
            subject: "Password recovery".into(),
            html: format!(
                "<p>Hello {},</p><p>Use the link below to choose a new password. \
                 It expires in {} minutes.</p><p><a href=\"{link}\">{link}</a></p>",
                user.username,
                self.token_ttl.whole_minutes()
            ),
        };
        // A delivery failure must not reveal that the account exists.
        if let Err(e) = self.mailer.send(message).await {
            warn!(error = %e, user_id = %user.id, "recovery email failed");
        } else {
            info!(user_id = %user.id, "recovery email dispatched");
        }
        Ok(RECOVERY_MESSAGE)
    }

    #[instrument(skip(self, token, new_password))]
    pub async fn reset_password(
        &self,
        token: &str,
        email: &str,
        new_password: &str,
    ) -> AppResult<()> {
        if new_password.is_empty() {
            return Err(AppError::Validation("new password is required".into()));
        }
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::InvalidOrExpiredToken);
        }

        let new_hash = hash_password(new_password)?;
        let user = self
            .users
            .consume_reset_token(&normalize_email(email), &hash_token(token), &new_hash)
            .await?
            .ok_or_else(|| {
                warn!("reset with invalid or expired token");
                AppError::InvalidOrExpiredToken
            })?;

        info!(user_id = %user.id, "password reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{
            dto::{LoginRequest, RegisterRequest},
            services::AuthService,
        },
        memory::{MemoryUserStore, RecordingMailer},
        state::test_jwt_keys,
    };

    struct Fixture {
        users: Arc<MemoryUserStore>,
        mailer: Arc<RecordingMailer>,
        auth: AuthService,
        recovery: RecoveryService,
    }

    async fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let auth = AuthService::new(users.clone(), test_jwt_keys());
        let recovery = RecoveryService::new(
            users.clone(),
            mailer.clone(),
            &RecoveryConfig {
                token_ttl_minutes: 60,
                frontend_url: "https://todo.example/".into(),
            },
        )
        .unwrap();
        auth.register(RegisterRequest {
            username: "ana".into(),
            email: "a@x.com".into(),
            password: "p1".into(),
            last_name: None,
            age: None,
        })
        .await
        .unwrap();
        Fixture {
            users,
            mailer,
            auth,
            recovery,
        }
    }

    fn token_from_link(html: &str) -> String {
        let start = html.find("token=").expect("token param") + "token=".len();
        html[start..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect()
    }

    #[test]
    fn tokens_are_random_and_hashed() {
        let a = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, generate_token());
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), a);
    }

    #[tokio::test]
    async fn recovery_round_trip_is_single_use() {
        let f = fixture().await;
        let msg = f.recovery.request_recovery("A@x.com").await.unwrap();
        assert_eq!(msg, RECOVERY_MESSAGE);

        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@x.com");
        assert!(sent[0].html.contains("https://todo.example/reset-password?token="));
        let token = token_from_link(&sent[0].html);

        // Only the hash is stored.
        let stored = f.users.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(
            f.users.reset_token_hash(stored.id).await,
            Some(hash_token(&token))
        );

        f.recovery.reset_password(&token, "a@x.com", "p2").await.unwrap();
        let replay = f.recovery.reset_password(&token, "a@x.com", "p3").await;
        assert!(matches!(replay, Err(AppError::InvalidOrExpiredToken)));

        let login = |password: &str| LoginRequest {
            email: "a@x.com".into(),
            password: password.into(),
        };
        assert!(f.auth.authenticate(login("p2")).await.is_ok());
        assert!(f.auth.authenticate(login("p1")).await.is_err());

        assert!(f.users.reset_token_hash(stored.id).await.is_none());
    }

    #[tokio::test]
    async fn unknown_email_gets_same_answer_and_no_mail() {
        let f = fixture().await;
        let msg = f.recovery.request_recovery("ghost@x.com").await.unwrap();
        assert_eq!(msg, RECOVERY_MESSAGE);
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let f = fixture().await;
        let user = f.users.find_by_email("a@x.com").await.unwrap().unwrap();
        let token = generate_token();
        f.users
            .store_reset_token(
                user.id,
                &hash_token(&token),
                OffsetDateTime::now_utc() - Duration::minutes(1),
            )
            .await
            .unwrap();

        let res = f.recovery.reset_password(&token, "a@x.com", "p2").await;
        assert!(matches!(res, Err(AppError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn token_is_bound_to_its_email() {
        let f = fixture().await;
        f.auth
            .register(RegisterRequest {
                username: "bo".into(),
                email: "b@x.com".into(),
                password: "pb".into(),
                last_name: None,
                age: None,
            })
            .await
            .unwrap();
        f.recovery.request_recovery("a@x.com").await.unwrap();
        let token = token_from_link(&f.mailer.sent()[0].html);

        let res = f.recovery.reset_password(&token, "b@x.com", "hijack").await;
        assert!(matches!(res, Err(AppError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn malformed_email_gets_same_answer_and_no_mail() {
        let f = fixture().await;
        let msg = f.recovery.request_recovery("not-an-email").await.unwrap();
        assert_eq!(msg, RECOVERY_MESSAGE);
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn token_store_failure_is_not_reported() {
        let f = fixture().await;
        f.users.fail_next_reset_write();
        let msg = f.recovery.request_recovery("a@x.com").await.unwrap();
        assert_eq!(msg, RECOVERY_MESSAGE);
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn mail_failure_is_not_reported() {
        let f = fixture().await;
        f.mailer.fail_next();
        let msg = f.recovery.request_recovery("a@x.com").await.unwrap();
        assert_eq!(msg, RECOVERY_MESSAGE);
    }
}
