use carebook::{
    auth::AuthService,
    config::Settings,
    domain::{
        CreateFacilityRequest, CreatePlanRequest, CreateUserRequest, FacilityStatus, PlanInterval,
        UserRole,
    },
    repository::{
        FacilityRepository, SqliteFacilityRepository, SqliteSubscriptionPlanRepository,
        SqliteUserRepository, SubscriptionPlanRepository, UserRepository,
    },
};
use clap::Parser;
use fake::{
    faker::{
        address::en::CityName,
        company::en::CompanyName,
        internet::en::SafeEmail,
        name::en::{FirstName, LastName},
    },
    Fake,
};
use sqlx::sqlite::SqlitePoolOptions;

/// Populates a development database and prints bearer tokens for the
/// seeded accounts.
#[derive(Parser, Debug)]
#[command(name = "seed", version)]
struct Args {
    /// Database URL; defaults to the configured one.
    #[arg(long)]
    database_url: Option<String>,

    /// Facilities to create for the seeded organization.
    #[arg(long, default_value_t = 3)]
    facilities: usize,

    /// Connected account id to mark the organization as onboarded with.
    #[arg(long, default_value = "acct_seed_organization")]
    stripe_account: String,
}

fn fake_user(role: UserRole) -> CreateUserRequest {
    CreateUserRequest {
        email: SafeEmail().fake(),
        first_name: FirstName().fake(),
        last_name: LastName().fake(),
        role,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let settings = Settings::new().unwrap_or_default();

    println!("🌱 Starting database seeding...");

    let database_url = args.database_url.unwrap_or(settings.database.url.clone());
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    // Run migrations first
    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let user_repo = SqliteUserRepository::new(db_pool.clone());
    let facility_repo = SqliteFacilityRepository::new(db_pool.clone());
    let plan_repo = SqliteSubscriptionPlanRepository::new(db_pool.clone());
    let auth = AuthService::new(&settings.auth.jwt_secret, settings.auth.token_ttl_hours);

    println!("👥 Creating users...");
    let admin = user_repo.create(fake_user(UserRole::Admin)).await?;
    let organization = user_repo.create(fake_user(UserRole::Organization)).await?;
    let user = user_repo.create(fake_user(UserRole::User)).await?;

    // The organization can take bookings straight away
    user_repo.attach_stripe_account(organization.id, &args.stripe_account).await?;
    user_repo.set_onboarding_status(organization.id, true).await?;
    println!("  ✅ Created admin, organization ({}) and user", args.stripe_account);

    println!("🏢 Creating facilities...");
    for _ in 0..args.facilities {
        let facility = facility_repo
            .create(CreateFacilityRequest {
                owner_id: organization.id,
                name: format!("{} Care Center", CompanyName().fake::<String>()),
                location: CityName().fake(),
                price_cents: (50..500).fake::<i64>() * 100,
                status: FacilityStatus::Approved,
            })
            .await?;
        println!("  ✅ {} ({}) at {} cents", facility.name, facility.id, facility.price_cents);
    }

    println!("💳 Creating subscription plans...");
    for (name, price_cents, features) in [
        ("Basic", 999, vec!["1 facility listing"]),
        ("Standard", 2999, vec!["5 facility listings", "Priority placement"]),
        ("Premium", 9999, vec!["Unlimited listings", "Priority placement", "Analytics"]),
    ] {
        if plan_repo.find_by_name(name).await?.is_some() {
            println!("  ⏭️  Plan {} already exists", name);
            continue;
        }
        let plan = plan_repo
            .create(CreatePlanRequest {
                name: name.to_string(),
                description: Some(format!("{} plan", name)),
                price_cents,
                currency: None,
                interval: Some(PlanInterval::Monthly),
                is_active: Some(true),
                features: features.into_iter().map(String::from).collect(),
            })
            .await?;
        println!("  ✅ {} ({})", plan.name, plan.id);
    }

    println!();
    println!("🔑 Bearer tokens:");
    for (label, account) in [("admin", &admin), ("organization", &organization), ("user", &user)] {
        let token = auth.issue_token(account.id, account.role)?;
        println!("  {} <{}>: {}", label, account.email, token);
    }

    println!();
    println!("✨ Database seeding completed!");

    Ok(())
}
