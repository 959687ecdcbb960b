//! Checkout and after-sales invariants against a real database.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -p emporium-db -- --ignored
//!
//! Every test creates its own products, coupons and deals under a random tag,
//! so the suite can share a database with other runs.

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use tokio::task::JoinSet;

use emporium_core::pricing::{OrderTotals, PricedLine};
use emporium_core::{
    CouponId, DealId, Email, InventoryItemId, OrderStatus, PaymentStatus, ProductId,
    ShippingMethodId,
};
use emporium_db::{
    InventoryRepository, MIGRATOR, NewOrder, NewOrderLine, NewReturn, OrderRepository,
    RepositoryError, ReturnRepository, ShippingAddress, StatusChange, create_pool,
};

const UNIT_PRICE: i64 = 1000;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = create_pool(&SecretString::from(url)).await.expect("connect");
    MIGRATOR.run(&pool).await.expect("migrate");
    pool
}

fn tag() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(10)
        .collect::<String>()
        .to_uppercase()
}

async fn product(pool: &PgPool, tag: &str) -> ProductId {
    sqlx::query_scalar(
        "INSERT INTO shop.products (name, slug, sku, price, status) \
         VALUES ($1, $2, $3, $4, 'active') RETURNING id",
    )
    .bind(format!("Lamp {tag}"))
    .bind(format!("lamp-{}", tag.to_lowercase()))
    .bind(format!("LAMP-{tag}"))
    .bind(Decimal::new(UNIT_PRICE, 2))
    .fetch_one(pool)
    .await
    .expect("insert product")
}

async fn stock(pool: &PgPool, product_id: ProductId, location: &str, quantity: i32) -> InventoryItemId {
    sqlx::query_scalar(
        "INSERT INTO shop.inventory_items (product_id, location, quantity) \
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(product_id)
    .bind(location)
    .bind(quantity)
    .fetch_one(pool)
    .await
    .expect("insert stock")
}

async fn shipping_method(pool: &PgPool, tag: &str) -> ShippingMethodId {
    sqlx::query_scalar(
        "INSERT INTO shop.shipping_methods (name, base_rate) VALUES ($1, 0) RETURNING id",
    )
    .bind(format!("Courier {tag}"))
    .fetch_one(pool)
    .await
    .expect("insert shipping method")
}

async fn coupon(pool: &PgPool, code: &str, max_uses: i32) -> CouponId {
    sqlx::query_scalar(
        "INSERT INTO shop.coupons (code, discount_type, value, max_uses) \
         VALUES ($1, 'fixed_amount', 1, $2) RETURNING id",
    )
    .bind(code)
    .bind(max_uses)
    .fetch_one(pool)
    .await
    .expect("insert coupon")
}

async fn deal(pool: &PgPool, product_id: ProductId, quantity_limit: i32) -> DealId {
    sqlx::query_scalar(
        "INSERT INTO shop.deals (title, product_id, deal_price, starts_at, ends_at, quantity_limit) \
         VALUES ('Flash', $1, $2, NOW() - INTERVAL '1 hour', NOW() + INTERVAL '1 hour', $3) \
         RETURNING id",
    )
    .bind(product_id)
    .bind(Decimal::new(UNIT_PRICE, 2))
    .bind(quantity_limit)
    .fetch_one(pool)
    .await
    .expect("insert deal")
}

/// `(on hand, reserved)` summed over every location of a product.
async fn counters(pool: &PgPool, product_id: ProductId) -> (i64, i64) {
    sqlx::query_as(
        "SELECT COALESCE(SUM(quantity), 0)::BIGINT, COALESCE(SUM(reserved), 0)::BIGINT \
         FROM shop.inventory_items WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_one(pool)
    .await
    .expect("read counters")
}

fn order_for(
    product_id: ProductId,
    quantity: i32,
    shipping_method_id: ShippingMethodId,
    deal_id: Option<DealId>,
    coupon: Option<(CouponId, String)>,
) -> NewOrder {
    let line = PricedLine {
        product_id,
        product_name: "Lamp".to_string(),
        sku: "LAMP".to_string(),
        unit_price: Decimal::new(UNIT_PRICE, 2),
        quantity,
        from_deal: deal_id.is_some(),
    };
    let subtotal = line.line_total();
    NewOrder {
        email: Email::parse("buyer@example.org").expect("email"),
        shipping_address: ShippingAddress {
            customer_name: "Test Buyer".to_string(),
            address_line1: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
            ..ShippingAddress::default()
        },
        shipping_method_id,
        shipping_method_name: "Courier".to_string(),
        coupon,
        totals: OrderTotals {
            subtotal,
            discount_total: Decimal::ZERO,
            shipping_total: Decimal::ZERO,
            total: subtotal,
        },
        notes: None,
        lines: vec![NewOrderLine { line, deal_id }],
    }
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_order_reserves_stock() {
    let pool = pool().await;
    let tag = tag();
    let product_id = product(&pool, &tag).await;
    stock(&pool, product_id, "main", 10).await;
    let method = shipping_method(&pool, &tag).await;

    let order = OrderRepository::new(&pool)
        .create_with_items(&order_for(product_id, 4, method, None, None))
        .await
        .expect("order placed");

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(counters(&pool, product_id).await, (10, 4));
    let level = InventoryRepository::new(&pool)
        .available_for_product(product_id)
        .await
        .expect("stock level");
    assert_eq!(level.available, 6);
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_order_spans_locations() {
    let pool = pool().await;
    let tag = tag();
    let product_id = product(&pool, &tag).await;
    stock(&pool, product_id, "north", 3).await;
    stock(&pool, product_id, "south", 3).await;
    let method = shipping_method(&pool, &tag).await;

    let level = InventoryRepository::new(&pool)
        .available_for_product(product_id)
        .await
        .expect("stock level");
    assert_eq!(level.available, 6);

    OrderRepository::new(&pool)
        .create_with_items(&order_for(product_id, 5, method, None, None))
        .await
        .expect("five units fit across two locations");
    assert_eq!(counters(&pool, product_id).await, (6, 5));

    let err = OrderRepository::new(&pool)
        .create_with_items(&order_for(product_id, 2, method, None, None))
        .await
        .expect_err("only one unit left");
    assert!(matches!(err, RepositoryError::Conflict(_)), "{err:?}");
    assert_eq!(counters(&pool, product_id).await, (6, 5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires DATABASE_URL"]
async fn test_concurrent_checkouts_do_not_oversell() {
    let pool = pool().await;
    let tag = tag();
    let product_id = product(&pool, &tag).await;
    stock(&pool, product_id, "main", 5).await;
    let method = shipping_method(&pool, &tag).await;

    let mut set = JoinSet::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let order = order_for(product_id, 1, method, None, None);
        set.spawn(async move { OrderRepository::new(&pool).create_with_items(&order).await });
    }
    let mut placed = 0;
    while let Some(result) = set.join_next().await {
        match result.expect("task") {
            Ok(_) => placed += 1,
            Err(RepositoryError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    assert_eq!(placed, 5);
    assert_eq!(counters(&pool, product_id).await, (5, 5));
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_cancel_releases_and_ship_consumes_every_location() {
    let pool = pool().await;
    let tag = tag();
    let product_id = product(&pool, &tag).await;
    stock(&pool, product_id, "north", 3).await;
    stock(&pool, product_id, "south", 3).await;
    let method = shipping_method(&pool, &tag).await;
    let orders = OrderRepository::new(&pool);

    let cancelled = orders
        .create_with_items(&order_for(product_id, 5, method, None, None))
        .await
        .expect("order placed");
    orders
        .update_status(cancelled.id, OrderStatus::Cancelled)
        .await
        .expect("cancel");
    assert_eq!(counters(&pool, product_id).await, (6, 0));

    let shipped = orders
        .create_with_items(&order_for(product_id, 5, method, None, None))
        .await
        .expect("order placed");
    orders
        .update_status(shipped.id, OrderStatus::Processing)
        .await
        .expect("processing");
    orders
        .update_status(shipped.id, OrderStatus::Shipped)
        .await
        .expect("ship");
    assert_eq!(counters(&pool, product_id).await, (1, 0));
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_coupon_max_uses_enforced() {
    let pool = pool().await;
    let tag = tag();
    let product_id = product(&pool, &tag).await;
    stock(&pool, product_id, "main", 10).await;
    let method = shipping_method(&pool, &tag).await;
    let code = format!("ONCE{tag}");
    let coupon_id = coupon(&pool, &code, 1).await;
    let orders = OrderRepository::new(&pool);

    orders
        .create_with_items(&order_for(product_id, 1, method, None, Some((coupon_id, code.clone()))))
        .await
        .expect("first use");
    let err = orders
        .create_with_items(&order_for(product_id, 1, method, None, Some((coupon_id, code))))
        .await
        .expect_err("second use");
    assert!(matches!(err, RepositoryError::Conflict(ref msg) if msg.contains("coupon")), "{err:?}");

    let used: i32 = sqlx::query_scalar("SELECT used_count FROM shop.coupons WHERE id = $1")
        .bind(coupon_id)
        .fetch_one(&pool)
        .await
        .expect("used count");
    assert_eq!(used, 1);
    // The rejected order's reservation was rolled back.
    assert_eq!(counters(&pool, product_id).await, (10, 1));
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_deal_quantity_limit_enforced() {
    let pool = pool().await;
    let tag = tag();
    let product_id = product(&pool, &tag).await;
    stock(&pool, product_id, "main", 10).await;
    let method = shipping_method(&pool, &tag).await;
    let deal_id = deal(&pool, product_id, 3).await;
    let orders = OrderRepository::new(&pool);

    orders
        .create_with_items(&order_for(product_id, 2, method, Some(deal_id), None))
        .await
        .expect("within limit");
    let err = orders
        .create_with_items(&order_for(product_id, 2, method, Some(deal_id), None))
        .await
        .expect_err("over limit");
    assert!(matches!(err, RepositoryError::Conflict(_)), "{err:?}");

    let sold: i32 = sqlx::query_scalar("SELECT sold_count FROM shop.deals WHERE id = $1")
        .bind(deal_id)
        .fetch_one(&pool)
        .await
        .expect("sold count");
    assert_eq!(sold, 2);
    assert_eq!(counters(&pool, product_id).await, (10, 2));
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_rejected_payment_move_keeps_order_status() {
    let pool = pool().await;
    let tag = tag();
    let product_id = product(&pool, &tag).await;
    stock(&pool, product_id, "main", 3).await;
    let method = shipping_method(&pool, &tag).await;
    let orders = OrderRepository::new(&pool);

    let order = orders
        .create_with_items(&order_for(product_id, 1, method, None, None))
        .await
        .expect("order placed");
    let change = StatusChange {
        status: Some(OrderStatus::Processing),
        payment_status: Some(PaymentStatus::Refunded),
    };
    let err = orders
        .apply_status_change(order.id, change)
        .await
        .expect_err("refund of unpaid order");
    assert!(matches!(err, RepositoryError::Validation(_)), "{err:?}");

    let current = orders.get(order.id).await.expect("get").expect("order");
    assert_eq!(current.status, OrderStatus::Pending);
    assert_eq!(current.payment_status, PaymentStatus::Pending);

    let change = StatusChange {
        status: Some(OrderStatus::Processing),
        payment_status: Some(PaymentStatus::Paid),
    };
    let updated = orders
        .apply_status_change(order.id, change)
        .await
        .expect("both moves");
    assert_eq!(updated.status, OrderStatus::Processing);
    assert!(updated.paid_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires DATABASE_URL"]
async fn test_concurrent_returns_open_only_one() {
    let pool = pool().await;
    let tag = tag();
    let product_id = product(&pool, &tag).await;
    stock(&pool, product_id, "main", 3).await;
    let method = shipping_method(&pool, &tag).await;
    let orders = OrderRepository::new(&pool);

    let order = orders
        .create_with_items(&order_for(product_id, 1, method, None, None))
        .await
        .expect("order placed");
    for next in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
        orders.update_status(order.id, next).await.expect("advance order");
    }

    let mut set = JoinSet::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let request = NewReturn {
            order_number: order.order_number.clone(),
            email: "buyer@example.org".to_string(),
            reason: "Arrived scratched".to_string(),
            details: None,
        };
        set.spawn(async move { ReturnRepository::new(&pool).create(&request).await });
    }
    let mut opened = 0;
    while let Some(result) = set.join_next().await {
        match result.expect("task") {
            Ok(_) => opened += 1,
            Err(RepositoryError::Conflict(msg)) => {
                assert_eq!(msg, "a return is already open for this order");
            }
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    assert_eq!(opened, 1);

    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM shop.returns \
         WHERE order_id = $1 AND status IN ('requested', 'approved', 'received')",
    )
    .bind(order.id)
    .fetch_one(&pool)
    .await
    .expect("count returns");
    assert_eq!(open, 1);
}
