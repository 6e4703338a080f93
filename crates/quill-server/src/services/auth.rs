//! Authentication service

use crate::storage::RevokedTokens;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use quill_core::ports::Storage;
use quill_core::Validate;
use quill_core::{
    Id, NewUser, ProfileUpdate, QuillError, Result, Role, User, UserLogin, UserPatch,
    UserRegistration,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct AuthService {
    storage: Arc<dyn Storage>,
    jwt_secret: String,
    token_ttl: Duration,
    revoked: RevokedTokens,
}

/// A user together with a freshly issued bearer token
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: i64,    // expiration time
    pub iat: i64,    // issued at
    pub jti: String, // token id, used for revocation
}

impl Claims {
    pub fn user_id(&self) -> Result<Id> {
        self.sub
            .parse()
            .map_err(|_| QuillError::AuthenticationFailed("Invalid token subject".to_string()))
    }
}

impl AuthService {
    pub fn new(storage: Arc<dyn Storage>, jwt_secret: String, token_ttl: Duration) -> Self {
        Self {
            storage,
            jwt_secret,
            token_ttl,
            revoked: RevokedTokens::new(),
        }
    }

    /// Create an account. The first account on an empty store becomes admin.
    pub async fn register(&self, registration: UserRegistration) -> Result<AuthSession> {
        registration.validate()?;

        if self
            .storage
            .user_by_username(&registration.username)
            .await?
            .is_some()
        {
            return Err(QuillError::Conflict("Username already exists".to_string()));
        }
        if self
            .storage
            .user_by_email(&registration.email)
            .await?
            .is_some()
        {
            return Err(QuillError::Conflict("Email already registered".to_string()));
        }

        let user = self
            .storage
            .create_user(NewUser {
                username: registration.username,
                email: registration.email,
                password_hash: hash_password(&registration.password)?,
                // the store promotes the very first account to admin
                role: Role::Author,
                display_name: registration.display_name,
                bio: registration.bio,
                profile_image: registration.profile_image,
            })
            .await?;

        info!("Registered user {} ({}) as {}", user.id, user.username, user.role);
        let token = self.issue_token(user.id)?;
        Ok(AuthSession { user, token })
    }

    pub async fn login(&self, login: UserLogin) -> Result<AuthSession> {
        let user = self.storage.user_by_username(&login.username).await?;

        if let Some(user) = user {
            if verify_password(&login.password, &user.password_hash)? {
                let token = self.issue_token(user.id)?;
                return Ok(AuthSession { user, token });
            }
        }

        warn!("Failed login for: {}", login.username);
        Err(QuillError::AuthenticationFailed(
            "Invalid username or password".to_string(),
        ))
    }

    pub fn issue_token(&self, user_id: Id) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + self.token_ttl).timestamp(),
            iat: now.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| QuillError::Unknown(format!("Failed to sign token: {}", e)))
    }

    /// Decode a bearer token, rejecting expired and revoked ones
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| QuillError::AuthenticationFailed(format!("Invalid token: {}", e)))?;

        if self.revoked.is_revoked(&token_data.claims.jti) {
            return Err(QuillError::AuthenticationFailed(
                "Token has been revoked".to_string(),
            ));
        }
        Ok(token_data.claims)
    }

    /// Revoke the token until it would have expired
    pub fn logout(&self, claims: &Claims) {
        let remaining = claims.exp - Utc::now().timestamp();
        if remaining > 0 {
            self.revoked
                .revoke(claims.jti.clone(), std::time::Duration::from_secs(remaining as u64));
        }
        debug!(
            "Revoked token for user {} ({} revoked)",
            claims.sub,
            self.revoked.len()
        );
    }

    /// Apply a profile edit; a new password is re-hashed
    pub async fn update_profile(&self, user_id: Id, update: ProfileUpdate) -> Result<User> {
        update.validate()?;

        if let Some(email) = &update.email {
            if let Some(other) = self.storage.user_by_email(email).await? {
                if other.id != user_id {
                    return Err(QuillError::Conflict("Email already registered".to_string()));
                }
            }
        }

        let password_hash = match &update.password {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let patch = UserPatch {
            email: update.email,
            password_hash,
            role: None,
            display_name: update.display_name,
            bio: update.bio,
            profile_image: update.profile_image,
        };

        self.storage
            .update_user(user_id, patch)
            .await?
            .ok_or_else(|| QuillError::not_found("user", user_id))
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| QuillError::Unknown(format!("Failed to hash password: {}", e)))
}

fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| QuillError::Unknown(format!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryStorage::new()),
            "test-secret".to_string(),
            Duration::hours(1),
        )
    }

    fn registration(username: &str, email: &str) -> UserRegistration {
        UserRegistration {
            username: username.to_string(),
            email: email.to_string(),
            password: "correct horse".to_string(),
            display_name: None,
            bio: None,
            profile_image: None,
        }
    }

    #[tokio::test]
    async fn test_first_user_is_admin() {
        let auth = service();

        let first = auth.register(registration("alice", "alice@example.com")).await.unwrap();
        let second = auth.register(registration("bob", "bob@example.com")).await.unwrap();

        assert_eq!(first.user.role, Role::Admin);
        assert_eq!(second.user.role, Role::Author);
        assert_ne!(first.user.password_hash, "correct horse");
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let auth = service();
        auth.register(registration("alice", "alice@example.com")).await.unwrap();

        let err = auth
            .register(registration("alice", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::Conflict(_)));

        let err = auth
            .register(registration("alicia", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login() {
        let auth = service();
        let registered = auth.register(registration("alice", "alice@example.com")).await.unwrap();

        let session = auth
            .login(UserLogin {
                username: "alice".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.user.id, registered.user.id);

        let claims = auth.validate_token(&session.token).unwrap();
        assert_eq!(claims.user_id().unwrap(), registered.user.id);

        let err = auth
            .login(UserLogin {
                username: "alice".to_string(),
                password: "wrong password".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::AuthenticationFailed(_)));

        let err = auth
            .login(UserLogin {
                username: "nobody".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let auth = service();
        let session = auth.register(registration("alice", "alice@example.com")).await.unwrap();
        let other = auth.issue_token(session.user.id).unwrap();

        let claims = tokio_test::assert_ok!(auth.validate_token(&session.token));
        auth.logout(&claims);

        assert!(auth.validate_token(&session.token).is_err());
        assert!(auth.validate_token(&other).is_ok());
    }

    #[tokio::test]
    async fn test_tampered_token_is_rejected() {
        let auth = service();
        let token = auth.issue_token(1).unwrap();

        let other = AuthService::new(
            Arc::new(MemoryStorage::new()),
            "another-secret".to_string(),
            Duration::hours(1),
        );
        assert!(other.validate_token(&token).is_err());
        assert!(auth.validate_token("not-a-token").is_err());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let auth = service();
        let session = auth.register(registration("alice", "alice@example.com")).await.unwrap();
        auth.register(registration("bob", "bob@example.com")).await.unwrap();

        let update = ProfileUpdate {
            display_name: Some(Some("Alice A.".to_string())),
            password: Some("new password".to_string()),
            ..Default::default()
        };
        let user = auth.update_profile(session.user.id, update).await.unwrap();
        assert_eq!(user.byline(), "Alice A.");

        auth.login(UserLogin {
            username: "alice".to_string(),
            password: "new password".to_string(),
        })
        .await
        .unwrap();

        let update = ProfileUpdate {
            email: Some("bob@example.com".to_string()),
            ..Default::default()
        };
        let err = auth.update_profile(session.user.id, update).await.unwrap_err();
        assert!(matches!(err, QuillError::Conflict(_)));
    }
}
