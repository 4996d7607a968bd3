use axum_marketplace_api::{
    cache::Cache,
    config::{AppConfig, PaymentConfig},
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::{AddToCartRequest, SetQuantityRequest},
        checkout::CheckoutRequest,
    },
    entity::{
        products::ActiveModel as ProductActive, stores::ActiveModel as StoreActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    notify::Mailer,
    payments::PaymentClient,
    services::{cart_service, checkout_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;

// The checkout builder's fail-fast chain (availability, then minimum
// charge, then price sanity) and the distinct-product cart cap. Every case
// fails before the payment provider is contacted, so no HTTP stub is needed.
#[tokio::test]
async fn checkout_validation_chain_and_cart_cap() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let buyer_id = create_user(&state, "buyer@example.com").await?;
    let vendor_id = create_user(&state, "vendor@example.com").await?;
    let store_id = create_store(&state, vendor_id, "Validation Store").await?;
    let address_id = create_address(&state, buyer_id).await?;

    let buyer = AuthUser {
        user_id: buyer_id,
        role: "user".into(),
    };
    let request = || CheckoutRequest { address_id };

    // An address the buyer does not own is rejected before anything else
    let err = checkout_service::create_session(
        &state,
        &buyer,
        CheckoutRequest {
            address_id: Uuid::new_v4(),
        },
    )
    .await
    .expect_err("unknown address must fail");
    assert!(matches!(err, AppError::Validation(_)));

    // An empty cart cannot start a session
    let err = checkout_service::create_session(&state, &buyer, request())
        .await
        .expect_err("empty cart must fail");
    assert!(matches!(err, AppError::Validation(_)));

    // Availability is checked before the minimum charge: an out-of-stock
    // item with a tiny total reports ITEM_UNAVAILABLE, not BELOW_MINIMUM.
    let sold_out = create_product(&state, store_id, "Sold Out", 10, 0).await?;
    add(&state, &buyer, sold_out, 1).await?;
    let err = checkout_service::create_session(&state, &buyer, request())
        .await
        .expect_err("sold-out item must fail");
    assert!(matches!(err, AppError::ItemUnavailable(_)));
    cart_service::clear_cart(&state, &buyer).await?;

    // Wanting more than the shelf holds is just as unavailable
    let scarce = create_product(&state, store_id, "Scarce", 1000, 2).await?;
    add(&state, &buyer, scarce, 3).await?;
    let err = checkout_service::create_session(&state, &buyer, request())
        .await
        .expect_err("over-stock quantity must fail");
    assert!(matches!(err, AppError::ItemUnavailable(_)));
    cart_service::clear_cart(&state, &buyer).await?;

    // A total under the configured minimum cannot be charged
    let cheap = create_product(&state, store_id, "Cheap", 10, 5).await?;
    add(&state, &buyer, cheap, 1).await?;
    let err = checkout_service::create_session(&state, &buyer, request())
        .await
        .expect_err("sub-minimum total must fail");
    assert!(matches!(
        err,
        AppError::BelowMinimumCharge {
            total: 10,
            minimum: 50
        }
    ));
    cart_service::clear_cart(&state, &buyer).await?;

    // A non-positive unit price fails even when the total clears the bar
    let free = create_product(&state, store_id, "Free", 0, 5).await?;
    let normal = create_product(&state, store_id, "Normal", 100, 5).await?;
    add(&state, &buyer, free, 1).await?;
    add(&state, &buyer, normal, 1).await?;
    let err = checkout_service::create_session(&state, &buyer, request())
        .await
        .expect_err("zero price must fail");
    assert!(matches!(err, AppError::InvalidPrice(id) if id == free));
    cart_service::clear_cart(&state, &buyer).await?;

    // Cart cap: the 51st distinct product is refused, but growing the
    // quantity of something already in the cart is not.
    let mut first = None;
    for n in 0..50 {
        let id = create_product(&state, store_id, &format!("Bulk {n}"), 100, 10).await?;
        first.get_or_insert(id);
        add(&state, &buyer, id, 1).await?;
    }
    let straw = create_product(&state, store_id, "One Too Many", 100, 10).await?;
    let err = add(&state, &buyer, straw, 1)
        .await
        .expect_err("51st distinct product must fail");
    assert!(matches!(err, AppError::CartLimitExceeded(50)));

    let first = first.unwrap();
    let bumped = add(&state, &buyer, first, 1).await?;
    assert_eq!(bumped.data.unwrap().unwrap().quantity, 2);

    // Setting a quantity directly leaves an audit trail like every other
    // cart mutation.
    cart_service::set_quantity(&state, &buyer, first, SetQuantityRequest { quantity: 4 }).await?;
    let (audited,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM audit_logs WHERE user_id = $1 AND action = 'cart_set_quantity'",
    )
    .bind(buyer_id)
    .fetch_one(&state.pool)
    .await?;
    assert_eq!(audited, 1);

    Ok(())
}

async fn add(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    delta: i32,
) -> Result<
    axum_marketplace_api::response::ApiResponse<Option<axum_marketplace_api::models::CartItem>>,
    AppError,
> {
    cart_service::add_to_cart(state, user, AddToCartRequest { product_id, delta }).await
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, cart_items, payment_events, reviews, addresses, audit_logs, products, stores, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    let payment = PaymentConfig {
        api_base: "http://127.0.0.1:9".to_string(),
        secret_key: "sk_test".to_string(),
        webhook_secret: "whsec_test".to_string(),
        minimum_charge: 50,
        success_url: "http://localhost/success".to_string(),
        cancel_url: "http://localhost/cart".to_string(),
    };
    let config = AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: "test-secret".to_string(),
        payment: payment.clone(),
        smtp: None,
    };

    Ok(AppState {
        pool,
        orm,
        payments: PaymentClient::new(payment),
        mailer: Mailer::disabled(),
        cache: Cache::new(),
        config,
    })
}

async fn create_user(state: &AppState, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set("user".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_store(state: &AppState, owner_id: Uuid, name: &str) -> anyhow::Result<Uuid> {
    let store = StoreActive {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner_id),
        name: Set(name.to_string()),
        description: Set(None),
        status: Set("active".to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(store.id)
}

async fn create_address(state: &AppState, user_id: Uuid) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO addresses (id, user_id, recipient, line1, city, postal_code, country)
        VALUES ($1, $2, 'Buyer', '1 Main St', 'Springfield', '12345', 'US')
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(&state.pool)
    .await?;

    Ok(id)
}

async fn create_product(
    state: &AppState,
    store_id: Uuid,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        store_id: Set(store_id),
        name: Set(name.to_string()),
        description: Set(None),
        price: Set(price),
        stock: Set(stock),
        in_stock: Set(stock > 0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}
