use sqlx::PgPool;

use crate::{
    db::tenant::schema_name,
    models::user::{CreateUserRequest, User, UserProfile, UserRole},
};

pub struct UserService;

impl UserService {
    pub async fn list(pool: &PgPool, tenant: &str) -> anyhow::Result<Vec<UserProfile>> {
        let schema = schema_name(tenant);
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT id, email, password_hash, first_name, last_name, role::TEXT as role,
                    is_active, created_at, updated_at
             FROM {schema}.users
             WHERE is_active = TRUE
             ORDER BY last_name, first_name"
        ))
        .fetch_all(pool)
        .await?;
        Ok(users.into_iter().map(UserProfile::from).collect())
    }

    /// Returns `None` when the email is already taken.
    pub async fn create(
        pool: &PgPool,
        tenant: &str,
        req: &CreateUserRequest,
    ) -> anyhow::Result<Option<UserProfile>> {
        let schema = schema_name(tenant);
        let role = req.role.unwrap_or(UserRole::Member);
        if role == UserRole::SuperAdmin {
            anyhow::bail!("super_admin cannot be assigned to tenant users");
        }
        let hash = bcrypt::hash(&req.password, 12)?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO {schema}.users (email, password_hash, first_name, last_name, role)
             VALUES ($1, $2, $3, $4, $5::{schema}.user_role)
             ON CONFLICT (email) DO NOTHING
             RETURNING id, email, password_hash, first_name, last_name, role::TEXT as role,
                       is_active, created_at, updated_at"
        ))
        .bind(req.email.trim().to_lowercase())
        .bind(hash)
        .bind(req.first_name.trim())
        .bind(req.last_name.trim())
        .bind(role.to_string())
        .fetch_optional(pool)
        .await?;
        Ok(user.map(UserProfile::from))
    }
}
