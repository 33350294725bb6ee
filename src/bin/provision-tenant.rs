/// Create a tenant, provision its schema and its first admin account.
///
/// Usage: provision-tenant --slug acme --name "Acme Corp" --admin-email ops@acme.test
///   --admin-password  : optional, a random one is generated and printed otherwise
///   --reprovision     : only re-run the idempotent schema provisioning for --slug

use clap::Parser;
use rand::{distributions::Alphanumeric, Rng};
use sqlx::postgres::PgPoolOptions;

use noticeboard_api::{
    db,
    models::tenant::CreateTenantRequest,
    services::tenants::TenantService,
};

#[derive(Parser)]
#[command(name = "provision-tenant", about = "Create or re-provision a noticeboard tenant")]
struct Args {
    /// Tenant slug (subdomain)
    #[arg(long)]
    slug: String,

    /// Display name
    #[arg(long, required_unless_present = "reprovision")]
    name: Option<String>,

    /// Email of the first admin
    #[arg(long, required_unless_present = "reprovision")]
    admin_email: Option<String>,

    #[arg(long)]
    admin_password: Option<String>,

    #[arg(long)]
    reprovision: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    db::run_migrations(&pool).await?;

    if args.reprovision {
        TenantService::reprovision(&pool, &args.slug).await?;
        return Ok(());
    }

    let generated = args.admin_password.is_none();
    let admin_password = args.admin_password.unwrap_or_else(|| {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(20)
            .map(char::from)
            .collect()
    });

    let req = CreateTenantRequest {
        slug: args.slug,
        name: args.name.unwrap_or_default(),
        admin_email: args.admin_email.unwrap_or_default(),
        admin_password: admin_password.clone(),
        admin_first_name: None,
        admin_last_name: None,
    };

    let tenant = TenantService::create(&pool, &req).await?;
    tracing::info!("Created tenant {} ({})", tenant.slug, tenant.id);
    if generated {
        println!("Admin password for {}: {}", req.admin_email, admin_password);
    }

    Ok(())
}
