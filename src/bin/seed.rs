use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use kasir_pos_api::{
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

    let staff_id = ensure_staff(&pool, "kasir@miegaok.id", "kasir123", "Kasir Utama").await?;
    seed_products(&pool).await?;

    println!("Seed completed. Staff ID: {staff_id}");
    Ok(())
}

async fn ensure_staff(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    full_name: &str,
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
        VALUES ($1, $2, $3, 'staff')
        ON CONFLICT (email) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .fetch_optional(pool)
    .await?;

    // If the user already exists, fetch the id instead.
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

    sqlx::query(
        r#"
        INSERT INTO staff_profiles (id, full_name)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET full_name = EXCLUDED.full_name
        "#,
    )
    .bind(user_id)
    .bind(full_name)
    .execute(pool)
    .await?;

    println!("Ensured staff account {email}");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        ("Mie Gaok Original", 12000_i64, Some("Mie")),
        ("Mie Gaok Special", 15000, Some("Mie")),
        ("Mie Ayam Bakso", 15000, Some("Mie")),
        ("Bakso Sapi", 10000, Some("Bakso")),
        ("Es Teh Manis", 5000, Some("Minuman")),
        ("Es Jeruk", 6000, Some("Minuman")),
        ("Kerupuk", 2000, Some("Tambahan")),
    ];

    for (name, price, category) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, category)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(price)
        .bind(category)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
