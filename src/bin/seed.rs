use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum_marketplace_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin123", "admin").await?;
    let buyer_id = ensure_user(&pool, "buyer@example.com", "buyer123", "user").await?;
    let vendor_id = ensure_user(&pool, "vendor@example.com", "vendor123", "user").await?;

    let store_id = ensure_store(&pool, vendor_id, "Demo Outfitters").await?;
    seed_products(&pool, store_id).await?;

    println!("Seed completed. Admin: {admin_id}, Buyer: {buyer_id}, Vendor: {vendor_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    // If user already exists, fetch id
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_store(pool: &sqlx::PgPool, owner_id: Uuid, name: &str) -> anyhow::Result<Uuid> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO stores (id, owner_id, name, description, status)
        VALUES ($1, $2, $3, $4, 'active')
        ON CONFLICT (owner_id) DO UPDATE SET status = 'active'
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(name)
    .bind("Seeded demo store")
    .fetch_optional(pool)
    .await?;

    let store_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM stores WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured store {name}");
    Ok(store_id)
}

async fn seed_products(pool: &sqlx::PgPool, store_id: Uuid) -> anyhow::Result<()> {
    let products = vec![
        ("Axum Hoodie", "Warm hoodie for Rustaceans", 5500, 50),
        ("Ferris Mug", "Coffee tastes better with Ferris", 1200, 100),
        ("Rust Sticker Pack", "Decorate your laptop", 500, 200),
        ("E-book: Async Rust", "Learn async Rust patterns", 2500, 75),
    ];

    for (name, desc, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, store_id, name, description, price, stock, in_stock)
            VALUES ($1, $2, $3, $4, $5, $6, $6 > 0)
            ON CONFLICT (store_id, name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(store_id)
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
