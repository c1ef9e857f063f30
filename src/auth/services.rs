use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{AuthResponse, LoginRequest, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::UserStore,
    repo_types::{NewUser, ProfilePatch, PublicUser},
};
use crate::error::{AppError, AppResult};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Blank optional strings are treated as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn check_age(age: Option<i32>) -> AppResult<Option<i32>> {
    match age {
        Some(a) if a < 0 => Err(AppError::Validation("age must not be negative".into())),
        other => Ok(other),
    }
}

/// Registration, login and profile access over a `UserStore`.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> AppResult<PublicUser> {
        let username = req.username.trim().to_string();
        if username.is_empty() {
            return Err(AppError::Validation("username is required".into()));
        }
        let email = normalize_email(&req.email);
        if !is_valid_email(&email) {
            warn!("invalid email");
            return Err(AppError::Validation("Invalid email".into()));
        }
        if req.password.is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }
        let age = check_age(req.age)?;

        if self.users.find_by_email(&email).await?.is_some() {
            warn!("email already registered");
            return Err(AppError::DuplicateEmail);
        }

        let password_hash = hash_password(&req.password)?;
        let new = NewUser {
            username,
            last_name: non_blank(req.last_name),
            age,
            email,
            password_hash,
        };

        // A concurrent registration can still win between the lookup and the insert.
        let user = self
            .users
            .create(new)
            .await?
            .ok_or(AppError::DuplicateEmail)?;

        info!(user_id = %user.id, "user registered");
        Ok(user.into())
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn authenticate(&self, req: LoginRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&req.email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            warn!("login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(&req.password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.keys.sign_access(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }

    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: Uuid) -> AppResult<PublicUser> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(PublicUser::from)
            .ok_or(AppError::UserNotFound)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        patch: ProfilePatch,
    ) -> AppResult<PublicUser> {
        if matches!(&patch.username, Some(u) if u.trim().is_empty()) {
            return Err(AppError::Validation("username must not be blank".into()));
        }
        let patch = ProfilePatch {
            username: patch.username.map(|u| u.trim().to_string()),
            last_name: non_blank(patch.last_name),
            age: check_age(patch.age)?,
        };
        let user = self
            .users
            .update_profile(user_id, patch)
            .await?
            .ok_or(AppError::UserNotFound)?;
        info!(user_id = %user.id, "profile updated");
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryUserStore;
    use crate::state::test_jwt_keys;

    fn service() -> AuthService {
        AuthService::new(Arc::new(MemoryUserStore::default()), test_jwt_keys())
    }

    fn register_req(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            last_name: None,
            age: None,
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("no at.com"));
        assert_eq!(normalize_email("  Ana@X.COM "), "ana@x.com");
    }

    #[tokio::test]
    async fn register_then_login_yields_token_for_same_user() {
        let svc = service();
        let user = svc.register(register_req("ana", "a@x.com", "p1")).await.unwrap();
        assert_eq!(user.username, "ana");

        let auth = svc
            .authenticate(LoginRequest {
                email: "a@x.com".into(),
                password: "p1".into(),
            })
            .await
            .unwrap();
        assert_eq!(auth.user.id, user.id);
        assert_eq!(test_jwt_keys().verify(&auth.token).unwrap(), user.id);
    }

    #[tokio::test]
    async fn duplicate_email_fails_regardless_of_username() {
        let svc = service();
        svc.register(register_req("ana", "a@x.com", "p1")).await.unwrap();
        let err = svc
            .register(register_req("someone-else", " A@X.com", "p2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let svc = service();
        svc.register(register_req("ana", "a@x.com", "p1")).await.unwrap();

        let wrong_password = svc
            .authenticate(LoginRequest {
                email: "a@x.com".into(),
                password: "nope".into(),
            })
            .await
            .unwrap_err();
        let unknown_email = svc
            .authenticate(LoginRequest {
                email: "b@x.com".into(),
                password: "p1".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn register_validates_input() {
        let svc = service();
        let cases = [
            register_req(" ", "a@x.com", "p1"),
            register_req("ana", "not-an-email", "p1"),
            register_req("ana", "a@x.com", ""),
        ];
        for req in cases {
            assert!(matches!(svc.register(req).await, Err(AppError::Validation(_))));
        }
        let mut negative_age = register_req("ana", "a@x.com", "p1");
        negative_age.age = Some(-1);
        assert!(matches!(svc.register(negative_age).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn profile_update_keeps_untouched_fields() {
        let svc = service();
        let mut req = register_req("ana", "a@x.com", "p1");
        req.age = Some(30);
        let user = svc.register(req).await.unwrap();

        let updated = svc
            .update_profile(
                user.id,
                ProfilePatch {
                    last_name: Some("Lopez".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.username, "ana");
        assert_eq!(updated.last_name.as_deref(), Some("Lopez"));
        assert_eq!(updated.age, Some(30));
        assert_eq!(updated.email, "a@x.com");
    }

    #[tokio::test]
    async fn profile_of_missing_user_is_not_found() {
        let err = service().profile(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::UserNotFound));
    }
}
