use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use sha2::{Digest, Sha256};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    config::Config,
    db::tenant::schema_name,
    models::{
        auth::{Claims, RefreshClaims},
        user::{LoginResponse, User, UserProfile, UserRole},
    },
    services::metrics::LOGINS_COUNTER,
};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name,
    role::TEXT as role, is_active, created_at, updated_at";

/// Token lifetimes and signing secrets, taken from `Config`.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_days: u64,
}

impl From<&Config> for TokenSettings {
    fn from(c: &Config) -> Self {
        Self {
            access_secret: c.jwt_secret.clone(),
            refresh_secret: c.jwt_refresh_secret.clone(),
            access_ttl_seconds: c.jwt_expiry_seconds,
            refresh_ttl_days: c.jwt_refresh_expiry_days,
        }
    }
}

/// Login and refresh failures. Everything except `Other` is the caller's fault.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid or expired refresh token")]
    InvalidToken,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::Other(e.into())
    }
}

pub struct AuthService;

impl AuthService {
    /// Verify credentials and issue an access/refresh token pair.
    pub async fn login(
        pool: &PgPool,
        tenant: &str,
        email: &str,
        password: &str,
        tokens: &TokenSettings,
    ) -> Result<LoginResponse, AuthError> {
        let schema = schema_name(tenant);
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM {schema}.users WHERE email = $1 AND is_active = TRUE"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

        // Same message for unknown email and bad password
        let user = match user {
            Some(u) if bcrypt::verify(password, &u.password_hash).unwrap_or(false) => u,
            _ => {
                LOGINS_COUNTER.with_label_values(&[tenant, "failure"]).inc();
                return Err(AuthError::InvalidCredentials);
            }
        };

        LOGINS_COUNTER.with_label_values(&[tenant, "success"]).inc();
        let mut conn = pool.acquire().await?;
        Ok(Self::issue_pair(&mut *conn, &schema, tenant, user, tokens).await?)
    }

    /// Rotate a refresh token: revoke it and issue a new pair.
    ///
    /// The revoke is a conditional UPDATE, so of two concurrent calls with the
    /// same token only one gets a row back. The new pair is written in the
    /// same transaction.
    pub async fn refresh(
        pool: &PgPool,
        tenant: &str,
        refresh_token_str: &str,
        tokens: &TokenSettings,
    ) -> Result<LoginResponse, AuthError> {
        let rc = Self::decode_refresh_token(refresh_token_str, &tokens.refresh_secret)
            .map_err(|_| AuthError::InvalidToken)?;
        let (jti, user_id) = rc.ids().ok_or(AuthError::InvalidToken)?;

        let schema = schema_name(tenant);
        let mut tx = pool.begin().await?;

        let revoked: Option<Uuid> = sqlx::query_scalar(&format!(
            "UPDATE {schema}.refresh_tokens SET revoked = TRUE
             WHERE id = $1 AND user_id = $2 AND token_hash = $3
               AND revoked = FALSE AND expires_at > NOW()
             RETURNING id"
        ))
        .bind(jti)
        .bind(user_id)
        .bind(hash_token(refresh_token_str))
        .fetch_optional(&mut *tx)
        .await?;
        if revoked.is_none() {
            return Err(AuthError::InvalidToken);
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM {schema}.users WHERE id = $1 AND is_active = TRUE"
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AuthError::InvalidToken)?;

        let pair = Self::issue_pair(&mut *tx, &schema, tenant, user, tokens).await?;
        tx.commit().await?;
        Ok(pair)
    }

    /// Revoke a refresh token. Unknown or malformed tokens are ignored.
    pub async fn logout(
        pool: &PgPool,
        tenant: &str,
        refresh_token_str: &str,
        refresh_secret: &str,
    ) -> anyhow::Result<()> {
        let Ok(rc) = Self::decode_refresh_token(refresh_token_str, refresh_secret) else {
            return Ok(());
        };
        let Ok(jti) = rc.jti.parse::<Uuid>() else {
            return Ok(());
        };
        let schema = schema_name(tenant);
        sqlx::query(&format!(
            "UPDATE {schema}.refresh_tokens SET revoked = TRUE WHERE id = $1"
        ))
        .bind(jti)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn me(pool: &PgPool, tenant: &str, user_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let schema = schema_name(tenant);
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM {schema}.users WHERE id = $1 AND is_active = TRUE"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(user.map(UserProfile::from))
    }

    async fn issue_pair(
        conn: &mut PgConnection,
        schema: &str,
        tenant: &str,
        user: User,
        tokens: &TokenSettings,
    ) -> anyhow::Result<LoginResponse> {
        let role: UserRole = user.role.parse().unwrap_or(UserRole::Member);
        let access_token = Self::generate_access_token(
            user.id,
            role,
            tenant,
            &tokens.access_secret,
            tokens.access_ttl_seconds,
        )?;
        let (refresh_token, jti) =
            Self::generate_refresh_token(&user.id, &tokens.refresh_secret, tokens.refresh_ttl_days)?;

        let expires_at = Utc::now() + chrono::Duration::days(tokens.refresh_ttl_days as i64);
        sqlx::query(&format!(
            "INSERT INTO {schema}.refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)"
        ))
        .bind(jti)
        .bind(user.id)
        .bind(hash_token(&refresh_token))
        .bind(expires_at)
        .execute(conn)
        .await?;

        Ok(LoginResponse {
            access_token,
            refresh_token,
            user: user.into(),
        })
    }

    pub fn generate_access_token(
        user_id: Uuid,
        role: UserRole,
        tenant: &str,
        secret: &str,
        ttl_seconds: u64,
    ) -> anyhow::Result<String> {
        let claims = Claims::new(user_id, role, tenant, ttl_seconds);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }

    fn generate_refresh_token(
        user_id: &Uuid,
        secret: &str,
        ttl_days: u64,
    ) -> anyhow::Result<(String, Uuid)> {
        let jti = Uuid::new_v4();
        let claims = RefreshClaims::new(*user_id, jti, ttl_days);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok((token, jti))
    }

    fn decode_refresh_token(token: &str, secret: &str) -> anyhow::Result<RefreshClaims> {
        use jsonwebtoken::{decode, DecodingKey, Validation};

        let key = DecodingKey::from_secret(secret.as_bytes());
        let data = decode::<RefreshClaims>(token, &key, &Validation::new(Algorithm::HS256))?;
        Ok(data.claims)
    }
}

/// Refresh tokens are stored as a SHA-256 hex digest, never in clear.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
