use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    db::tenant::{is_valid_slug, provision_tenant_schema, schema_name},
    models::{
        tenant::{CreateTenantRequest, Tenant},
        user::UserRole,
    },
};

const MAX_NAME_LEN: usize = 255;
const MAX_EMAIL_LEN: usize = 255;
const MAX_PERSON_NAME_LEN: usize = 128;
const MIN_PASSWORD_LEN: usize = 8;

/// Tenant failures the caller should map to a 4xx.
#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Invalid slug: use 2-63 lowercase letters, digits or hyphens")]
    InvalidSlug,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Tenant '{0}' already exists")]
    AlreadyExists(String),
    #[error("Tenant '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for TenantError {
    fn from(e: sqlx::Error) -> Self {
        TenantError::Other(e.into())
    }
}

pub struct TenantService;

impl TenantService {
    pub async fn list(pool: &PgPool) -> anyhow::Result<Vec<Tenant>> {
        let rows = sqlx::query_as::<_, Tenant>("SELECT * FROM public.tenants ORDER BY slug")
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Register the tenant, provision its schema and create its first admin.
    /// Runs in one transaction: if any step fails nothing is left behind and
    /// the slug stays free.
    pub async fn create(pool: &PgPool, req: &CreateTenantRequest) -> Result<Tenant, TenantError> {
        let slug = validate_create(req)?;
        let password_hash = bcrypt::hash(&req.admin_password, 12).map_err(anyhow::Error::from)?;

        let mut tx = pool.begin().await?;

        let tenant = sqlx::query_as::<_, Tenant>(
            "INSERT INTO public.tenants (slug, name) VALUES ($1, $2)
             ON CONFLICT (slug) DO NOTHING
             RETURNING *",
        )
        .bind(&slug)
        .bind(req.name.trim())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| TenantError::AlreadyExists(slug.clone()))?;

        provision_tenant_schema(&mut *tx, &slug).await?;
        let admin_id = Self::create_admin(&mut *tx, &slug, req, &password_hash).await?;

        tx.commit().await?;
        tracing::info!(tenant = %slug, %admin_id, "tenant provisioned");

        Ok(tenant)
    }

    /// Re-run schema provisioning for a tenant that is already registered.
    pub async fn reprovision(pool: &PgPool, slug: &str) -> Result<(), TenantError> {
        let slug = slug.trim().to_lowercase();
        if !is_valid_slug(&slug) {
            return Err(TenantError::InvalidSlug);
        }

        let mut conn = pool.acquire().await?;
        let known: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM public.tenants WHERE slug = $1)")
                .bind(&slug)
                .fetch_one(&mut *conn)
                .await?;
        if !known {
            return Err(TenantError::NotFound(slug));
        }

        provision_tenant_schema(&mut *conn, &slug).await?;
        tracing::info!(tenant = %slug, schema = %schema_name(&slug), "tenant re-provisioned");
        Ok(())
    }

    async fn create_admin(
        conn: &mut PgConnection,
        slug: &str,
        req: &CreateTenantRequest,
        password_hash: &str,
    ) -> anyhow::Result<Uuid> {
        let schema = schema_name(slug);
        let id: Uuid = sqlx::query_scalar(&format!(
            "INSERT INTO {schema}.users (email, password_hash, first_name, last_name, role)
             VALUES ($1, $2, $3, $4, $5::{schema}.user_role)
             RETURNING id"
        ))
        .bind(req.admin_email.trim().to_lowercase())
        .bind(password_hash)
        .bind(req.admin_first_name.as_deref().map(str::trim).unwrap_or("Admin"))
        .bind(req.admin_last_name.as_deref().map(str::trim).unwrap_or(""))
        .bind(UserRole::Admin.to_string())
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    /// Soft-delete: the schema is kept, requests for the tenant get 403.
    pub async fn deactivate(pool: &PgPool, slug: &str) -> anyhow::Result<bool> {
        let updated = sqlx::query(
            "UPDATE public.tenants SET is_active = FALSE, updated_at = NOW() WHERE slug = $1",
        )
        .bind(slug)
        .execute(pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn name(pool: &PgPool, slug: &str) -> anyhow::Result<Option<String>> {
        let name = sqlx::query_scalar(
            "SELECT name FROM public.tenants WHERE slug = $1 AND is_active = TRUE",
        )
        .bind(slug)
        .fetch_optional(pool)
        .await?;
        Ok(name)
    }
}

/// Check a creation request against the column limits. Returns the normalised slug.
fn validate_create(req: &CreateTenantRequest) -> Result<String, TenantError> {
    let slug = req.slug.trim().to_lowercase();
    if !is_valid_slug(&slug) {
        return Err(TenantError::InvalidSlug);
    }

    let invalid = |msg: &str| TenantError::InvalidInput(msg.to_string());

    let name = req.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(invalid("Name is required (max 255 characters)"));
    }

    let email = req.admin_email.trim();
    if !email.contains('@') || email.len() > MAX_EMAIL_LEN {
        return Err(invalid("A valid admin email is required"));
    }

    if req.admin_password.len() < MIN_PASSWORD_LEN {
        return Err(invalid("Admin password must be at least 8 characters"));
    }

    let too_long = |s: &Option<String>| {
        s.as_deref()
            .is_some_and(|v| v.trim().chars().count() > MAX_PERSON_NAME_LEN)
    };
    if too_long(&req.admin_first_name) || too_long(&req.admin_last_name) {
        return Err(invalid("Admin name must be at most 128 characters"));
    }

    Ok(slug)
}
