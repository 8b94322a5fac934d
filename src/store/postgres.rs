//! PostgreSQL stores. Documents that are only ever read whole (cart items,
//! order line items, address snapshots) are kept as JSONB.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::{CartStore, CatalogStore, OrderStore};
use crate::{
    domain::{
        aggregates::{Cart, CartItem, LineItemSnapshot, Order, OrderStatus, Product, ShippingAddress},
        value_objects::OrderNumber,
    },
    EcommerceError, Result,
};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    slug: String,
    image: Option<String>,
    mrp: Decimal,
    discount: i16,
    stock: i32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = EcommerceError;
    fn try_from(row: ProductRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            image: row.image,
            mrp: row.mrp,
            discount: u8::try_from(row.discount).map_err(|e| EcommerceError::Storage(e.to_string()))?,
            stock: u32::try_from(row.stock).map_err(|e| EcommerceError::Storage(e.to_string()))?,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    customer_id: Uuid,
    items: Json<Vec<CartItem>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            items: row.items.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_id: String,
    customer_id: Uuid,
    payment_session_id: Option<String>,
    shipping_address: Json<ShippingAddress>,
    contact_email: String,
    line_items: Json<Vec<LineItemSnapshot>>,
    total: Decimal,
    payment_method: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = EcommerceError;
    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            order_id: OrderNumber::parse(row.order_id).map_err(|e| EcommerceError::Storage(e.to_string()))?,
            customer_id: row.customer_id,
            payment_session_id: row.payment_session_id,
            shipping_address: row.shipping_address.0,
            contact_email: row.contact_email,
            line_items: row.line_items.0,
            total: row.total,
            payment_method: row.payment_method.parse().map_err(EcommerceError::Storage)?,
            status: row.status.parse().map_err(|e: crate::domain::aggregates::OrderError| {
                EcommerceError::Storage(e.to_string())
            })?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, order_id, customer_id, payment_session_id, shipping_address, contact_email, \
     line_items, total, payment_method, status, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PgCatalogStore {
    db: PgPool,
}

impl PgCatalogStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn get_product(&self, id: Uuid) -> Result<Product> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(EcommerceError::NotFound("product"))?
            .try_into()
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        let stock = i32::try_from(product.stock).map_err(|e| EcommerceError::Validation(e.to_string()))?;
        sqlx::query(
            "INSERT INTO products (id, name, slug, image, mrp, discount, stock, active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, slug = EXCLUDED.slug, image = EXCLUDED.image, \
             mrp = EXCLUDED.mrp, discount = EXCLUDED.discount, stock = EXCLUDED.stock, active = EXCLUDED.active, \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.image)
        .bind(product.mrp)
        .bind(i16::from(product.discount))
        .bind(stock)
        .bind(product.active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PgCartStore {
    db: PgPool,
}

impl PgCartStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn get(&self, cart_id: Uuid) -> Result<Cart> {
        sqlx::query_as::<_, CartRow>("SELECT * FROM carts WHERE id = $1")
            .bind(cart_id)
            .fetch_optional(&self.db)
            .await?
            .map(Cart::from)
            .ok_or(EcommerceError::NotFound("cart"))
    }

    async fn find_by_customer(&self, customer_id: Uuid) -> Result<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>("SELECT * FROM carts WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Cart::from))
    }

    async fn find_or_create(&self, customer_id: Uuid) -> Result<Cart> {
        sqlx::query(
            "INSERT INTO carts (id, customer_id, items, created_at, updated_at) \
             VALUES ($1, $2, '[]'::jsonb, NOW(), NOW()) ON CONFLICT (customer_id) DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(customer_id)
        .execute(&self.db)
        .await?;
        let row = sqlx::query_as::<_, CartRow>("SELECT * FROM carts WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(&self.db)
            .await?;
        Ok(row.into())
    }

    async fn save(&self, cart: &Cart) -> Result<()> {
        sqlx::query(
            "INSERT INTO carts (id, customer_id, items, created_at, updated_at) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET items = EXCLUDED.items, updated_at = EXCLUDED.updated_at",
        )
        .bind(cart.id)
        .bind(cart.customer_id)
        .bind(Json(&cart.items))
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn clear_items(&self, cart_id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE carts SET items = '[]'::jsonb, updated_at = NOW() WHERE id = $1")
            .bind(cart_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EcommerceError::NotFound("cart"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PgOrderStore {
    db: PgPool,
}

impl PgOrderStore {
    pub fn new(db: PgPool) -> Self { Self { db } }

    async fn find_one(&self, column: &str, value: &str) -> Result<Order> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {column} = $1"))
            .bind(value)
            .fetch_optional(&self.db)
            .await?
            .ok_or(EcommerceError::NotFound("order"))?
            .try_into()
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(order.id)
        .bind(order.order_id.as_str())
        .bind(order.customer_id)
        .bind(&order.payment_session_id)
        .bind(Json(&order.shipping_address))
        .bind(&order.contact_email)
        .bind(Json(&order.line_items))
        .bind(order.total)
        .bind(order.payment_method.as_str())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Order> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(EcommerceError::NotFound("order"))?
            .try_into()
    }

    async fn find_by_order_id(&self, order_id: &OrderNumber) -> Result<Order> {
        self.find_one("order_id", order_id.as_str()).await
    }

    async fn find_by_payment_session_id(&self, session_id: &str) -> Result<Order> {
        self.find_one("payment_session_id", session_id).await
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(customer_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(Order::try_from)
        .collect()
    }

    async fn list(&self, page: u32, per_page: u32) -> Result<(Vec<Order>, u64)> {
        let offset = i64::from(page.max(1) - 1) * i64::from(per_page);
        let orders = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(Order::try_from)
        .collect::<Result<Vec<_>>>()?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(&self.db).await?;
        Ok((orders, u64::try_from(total.0).unwrap_or_default()))
    }

    async fn update_status(&self, id: Uuid, expected: &[OrderStatus], status: OrderStatus) -> Result<bool> {
        let expected: Vec<String> = expected.iter().map(|s| s.as_str().to_string()).collect();
        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = NOW() WHERE id = $1 AND status = ANY($2)",
        )
        .bind(id)
        .bind(expected)
        .bind(status.as_str())
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
