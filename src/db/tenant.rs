use sqlx::{Executor, PgConnection};

/// Provision a per-tenant PostgreSQL schema with all required tables.
/// Called when a tenant is created and again for every active tenant at startup.
/// Takes a connection so tenant creation can run it inside its transaction.
pub async fn provision_tenant_schema(conn: &mut PgConnection, slug: &str) -> anyhow::Result<()> {
    if !is_valid_slug(slug) {
        anyhow::bail!("refusing to provision invalid tenant slug {slug:?}");
    }
    let schema = schema_name(slug);

    // --- Create schema ---
    conn.execute(sqlx::raw_sql(&format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\"")))
        .await?;

    // --- Enum: user_role ---
    conn.execute(sqlx::raw_sql(&format!(
        "DO $$ BEGIN
           IF NOT EXISTS (
             SELECT 1 FROM pg_type t
             JOIN pg_namespace n ON n.oid = t.typnamespace
             WHERE t.typname = 'user_role' AND n.nspname = '{schema}'
           ) THEN
             CREATE TYPE \"{schema}\".user_role AS ENUM
               ('super_admin','admin','editor','member');
           END IF;
         END $$"
    )))
    .await?;

    // --- Users ---
    conn.execute(sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".users (
            id               UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            email            VARCHAR(255) UNIQUE NOT NULL,
            password_hash    TEXT NOT NULL,
            first_name       VARCHAR(128) NOT NULL,
            last_name        VARCHAR(128) NOT NULL,
            role             "{schema}".user_role NOT NULL DEFAULT 'member',
            is_active        BOOLEAN NOT NULL DEFAULT TRUE,
            created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    )))
    .await?;

    // --- Refresh tokens ---
    conn.execute(sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".refresh_tokens (
            id           UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            user_id      UUID NOT NULL REFERENCES "{schema}".users(id) ON DELETE CASCADE,
            token_hash   TEXT NOT NULL,
            expires_at   TIMESTAMPTZ NOT NULL,
            revoked      BOOLEAN NOT NULL DEFAULT FALSE,
            created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    )))
    .await?;

    // --- Announcements ---
    conn.execute(sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".announcements (
            id           UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            title        VARCHAR(200) NOT NULL,
            content      TEXT NOT NULL,
            video_url    TEXT,
            cta_url      TEXT,
            is_active    BOOLEAN NOT NULL DEFAULT TRUE,
            created_by   UUID REFERENCES "{schema}".users(id) ON DELETE SET NULL,
            created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    )))
    .await?;

    conn.execute(sqlx::raw_sql(&format!(
        r#"CREATE INDEX IF NOT EXISTS idx_announcements_active_created
           ON "{schema}".announcements (is_active, created_at DESC)"#
    )))
    .await?;

    // --- Announcement views ---
    conn.execute(sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".announcement_views (
            announcement_id UUID NOT NULL REFERENCES "{schema}".announcements(id) ON DELETE CASCADE,
            user_id         UUID NOT NULL REFERENCES "{schema}".users(id) ON DELETE CASCADE,
            viewed_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (announcement_id, user_id)
        )"#
    )))
    .await?;

    // --- Audit log ---
    conn.execute(sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".audit_log (
            id             UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            user_id        UUID,
            action         VARCHAR(64) NOT NULL,
            resource_type  VARCHAR(64),
            resource_id    TEXT,
            ip_address     VARCHAR(64) NOT NULL DEFAULT 'unknown',
            created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    )))
    .await?;

    Ok(())
}

/// Lowercase ASCII letters, digits and inner hyphens, 2 to 63 characters.
/// Slugs are interpolated into schema-qualified SQL, so nothing else may pass.
pub fn is_valid_slug(s: &str) -> bool {
    let len = s.len();
    (2..=63).contains(&len)
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

/// Postgres schema holding a tenant's tables. Only call with a valid slug.
pub fn schema_name(slug: &str) -> String {
    format!("tenant_{}", slug.to_lowercase().replace('-', "_"))
}
