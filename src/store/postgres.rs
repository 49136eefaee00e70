use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult, StoreTx};
use crate::domain::aggregates::{
    Category, Contact, Listing, Order, OrderLine, OrderStatus, OrderSummary, Parameter, Product, ProductInfo,
    ProductParameter, Shop,
};
use crate::domain::value_objects::Price;

const LISTING_SELECT: &str = "SELECT pi.id, p.name AS product, c.name AS category, s.name AS shop, \
     pi.name, pi.quantity, pi.price, pi.price_rrc \
     FROM product_infos pi \
     JOIN products p ON p.id = pi.product_id \
     JOIN categories c ON c.id = p.category_id \
     JOIN shops s ON s.id = pi.shop_id";

const PRODUCT_INFO_SELECT: &str = "SELECT id, product_id, shop_id, name, quantity, price, price_rrc FROM product_infos";

const UNIQUE_VIOLATION: &str = "23505";

#[derive(sqlx::FromRow)]
struct ListingRow { id: Uuid, product: String, category: String, shop: String, name: String, quantity: i32, price: Decimal, price_rrc: Decimal }

#[derive(sqlx::FromRow)]
struct ProductInfoRow { id: Uuid, product_id: Uuid, shop_id: Uuid, name: String, quantity: i32, price: Decimal, price_rrc: Decimal }

#[derive(sqlx::FromRow)]
struct ContactRow { id: Uuid, user_id: Uuid, kind: String, value: String, created_at: DateTime<Utc> }

#[derive(sqlx::FromRow)]
struct OrderRow { id: Uuid, dt: DateTime<Utc>, status: String, contact_id: Option<Uuid> }

#[derive(sqlx::FromRow)]
struct OrderLineRow { order_id: Uuid, product_info_id: Uuid, product: String, shop: String, quantity: i32, price: Decimal }

fn stock_from_db(q: i32) -> StoreResult<u32> {
    u32::try_from(q).map_err(|_| StoreError::Corrupt(format!("negative quantity {q}")))
}

fn stock_to_db(q: u32) -> StoreResult<i32> {
    i32::try_from(q).map_err(|_| StoreError::Corrupt(format!("quantity {q} exceeds column range")))
}

fn price_from_db(p: Decimal) -> StoreResult<Price> {
    Price::new(p).map_err(|e| StoreError::Corrupt(format!("{e}: {p}")))
}

/// Maps SQLSTATE 23505 to `UniqueViolation` so callers can retry upserts.
fn write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::UniqueViolation(db.constraint().unwrap_or("unique key").to_string());
        }
    }
    StoreError::Database(e)
}

impl TryFrom<ListingRow> for Listing {
    type Error = StoreError;
    fn try_from(r: ListingRow) -> StoreResult<Self> {
        Ok(Listing {
            id: r.id, product: r.product, category: r.category, shop: r.shop, name: r.name,
            quantity: stock_from_db(r.quantity)?, price: r.price, price_rrc: r.price_rrc,
        })
    }
}

impl TryFrom<ProductInfoRow> for ProductInfo {
    type Error = StoreError;
    fn try_from(r: ProductInfoRow) -> StoreResult<Self> {
        Ok(ProductInfo {
            id: r.id, product_id: r.product_id, shop_id: r.shop_id, name: r.name,
            quantity: stock_from_db(r.quantity)?, price: price_from_db(r.price)?, price_rrc: price_from_db(r.price_rrc)?,
        })
    }
}

impl TryFrom<ContactRow> for Contact {
    type Error = StoreError;
    fn try_from(r: ContactRow) -> StoreResult<Self> {
        let kind = r.kind.parse().map_err(StoreError::Corrupt)?;
        Ok(Contact { id: r.id, user_id: r.user_id, kind, value: r.value, created_at: r.created_at })
    }
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(db: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(db).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn list_available(&self) -> StoreResult<Vec<Listing>> {
        let sql = format!("{LISTING_SELECT} WHERE pi.quantity > 0 ORDER BY p.name, s.name");
        sqlx::query_as::<_, ListingRow>(&sql)
            .fetch_all(&self.db).await?
            .into_iter().map(Listing::try_from).collect()
    }

    async fn listings(&self, ids: &[Uuid]) -> StoreResult<Vec<Listing>> {
        let sql = format!("{LISTING_SELECT} WHERE pi.id = ANY($1)");
        sqlx::query_as::<_, ListingRow>(&sql)
            .bind(ids)
            .fetch_all(&self.db).await?
            .into_iter().map(Listing::try_from).collect()
    }

    async fn parameters_for(&self, product_info_id: Uuid) -> StoreResult<BTreeMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT p.name, pp.value FROM product_parameters pp JOIN parameters p ON p.id = pp.parameter_id WHERE pp.product_info_id = $1",
        )
        .bind(product_info_id)
        .fetch_all(&self.db).await?;
        Ok(rows.into_iter().collect())
    }

    async fn orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<OrderSummary>> {
        let orders = sqlx::query_as::<_, OrderRow>(
            "SELECT id, dt, status, contact_id FROM orders WHERE user_id = $1 ORDER BY dt DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db).await?;
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let lines = sqlx::query_as::<_, OrderLineRow>(
            "SELECT oi.order_id, oi.product_info_id, p.name AS product, s.name AS shop, oi.quantity, oi.price \
             FROM order_items oi \
             JOIN product_infos pi ON pi.id = oi.product_info_id \
             JOIN products p ON p.id = pi.product_id \
             JOIN shops s ON s.id = pi.shop_id \
             WHERE oi.order_id = ANY($1) ORDER BY oi.id",
        )
        .bind(&ids)
        .fetch_all(&self.db).await?;

        let mut by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for l in lines {
            by_order.entry(l.order_id).or_default().push(OrderLine {
                product_info: l.product_info_id,
                product: l.product,
                shop: l.shop,
                quantity: stock_from_db(l.quantity)?,
                price: l.price,
            });
        }
        orders
            .into_iter()
            .map(|o| {
                let status: OrderStatus = o.status.parse().map_err(|e| StoreError::Corrupt(format!("{e}")))?;
                OrderSummary::new(o.id, o.dt, status, o.contact_id, by_order.remove(&o.id).unwrap_or_default())
                    .map_err(|e| StoreError::Corrupt(format!("order {}: {e}", o.id)))
            })
            .collect()
    }

    async fn insert_contact(&self, contact: &Contact) -> StoreResult<()> {
        sqlx::query("INSERT INTO contacts (id, user_id, kind, value, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(contact.id).bind(contact.user_id).bind(contact.kind.as_str()).bind(&contact.value).bind(contact.created_at)
            .execute(&self.db).await.map_err(write_error)?;
        Ok(())
    }

    async fn contacts_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Contact>> {
        sqlx::query_as::<_, ContactRow>("SELECT id, user_id, kind, value, created_at FROM contacts WHERE user_id = $1 ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.db).await?
            .into_iter().map(Contact::try_from).collect()
    }

    async fn find_contact(&self, id: Uuid) -> StoreResult<Option<Contact>> {
        sqlx::query_as::<_, ContactRow>("SELECT id, user_id, kind, value, created_at FROM contacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db).await?
            .map(Contact::try_from).transpose()
    }

    async fn delete_contact(&self, id: Uuid) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM contacts WHERE id = $1").bind(id).execute(&self.db).await?;
        Ok(done.rows_affected() > 0)
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn contact(&mut self, id: Uuid) -> StoreResult<Option<Contact>> {
        sqlx::query_as::<_, ContactRow>("SELECT id, user_id, kind, value, created_at FROM contacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx).await?
            .map(Contact::try_from).transpose()
    }

    async fn lock_product_info(&mut self, id: Uuid) -> StoreResult<Option<ProductInfo>> {
        let sql = format!("{PRODUCT_INFO_SELECT} WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ProductInfoRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx).await?
            .map(ProductInfo::try_from).transpose()
    }

    async fn lock_product_info_by_key(&mut self, product_id: Uuid, shop_id: Uuid) -> StoreResult<Option<ProductInfo>> {
        let sql = format!("{PRODUCT_INFO_SELECT} WHERE product_id = $1 AND shop_id = $2 FOR UPDATE");
        sqlx::query_as::<_, ProductInfoRow>(&sql)
            .bind(product_id).bind(shop_id)
            .fetch_optional(&mut *self.tx).await?
            .map(ProductInfo::try_from).transpose()
    }

    async fn insert_product_info(&mut self, info: &ProductInfo) -> StoreResult<()> {
        sqlx::query("INSERT INTO product_infos (id, product_id, shop_id, name, quantity, price, price_rrc) VALUES ($1, $2, $3, $4, $5, $6, $7)")
            .bind(info.id).bind(info.product_id).bind(info.shop_id).bind(&info.name)
            .bind(stock_to_db(info.quantity)?).bind(info.price.amount()).bind(info.price_rrc.amount())
            .execute(&mut *self.tx).await.map_err(write_error)?;
        Ok(())
    }

    async fn update_product_info(&mut self, info: &ProductInfo) -> StoreResult<()> {
        sqlx::query("UPDATE product_infos SET name = $2, quantity = $3, price = $4, price_rrc = $5 WHERE id = $1")
            .bind(info.id).bind(&info.name).bind(stock_to_db(info.quantity)?)
            .bind(info.price.amount()).bind(info.price_rrc.amount())
            .execute(&mut *self.tx).await.map_err(write_error)?;
        Ok(())
    }

    async fn set_product_info_quantity(&mut self, id: Uuid, quantity: u32) -> StoreResult<()> {
        sqlx::query("UPDATE product_infos SET quantity = $2 WHERE id = $1")
            .bind(id).bind(stock_to_db(quantity)?)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        sqlx::query("INSERT INTO orders (id, user_id, dt, status, contact_id) VALUES ($1, $2, $3, $4, $5)")
            .bind(order.id()).bind(order.user_id()).bind(order.dt()).bind(order.status().as_str()).bind(order.contact_id())
            .execute(&mut *self.tx).await.map_err(write_error)?;
        for item in order.items() {
            sqlx::query("INSERT INTO order_items (id, order_id, product_info_id, quantity, price) VALUES ($1, $2, $3, $4, $5)")
                .bind(item.id).bind(item.order_id).bind(item.product_info_id)
                .bind(stock_to_db(item.quantity.value())?).bind(item.price.amount())
                .execute(&mut *self.tx).await.map_err(write_error)?;
        }
        Ok(())
    }

    async fn find_shop(&mut self, name: &str) -> StoreResult<Option<Shop>> {
        let row: Option<(Uuid, String, Option<String>)> = sqlx::query_as("SELECT id, name, url FROM shops WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.tx).await?;
        Ok(row.map(|(id, name, url)| Shop { id, name, url }))
    }

    async fn insert_shop(&mut self, shop: &Shop) -> StoreResult<()> {
        sqlx::query("INSERT INTO shops (id, name, url) VALUES ($1, $2, $3)")
            .bind(shop.id).bind(&shop.name).bind(&shop.url)
            .execute(&mut *self.tx).await.map_err(write_error)?;
        Ok(())
    }

    async fn find_category(&mut self, name: &str) -> StoreResult<Option<Category>> {
        let row: Option<(Uuid, String)> = sqlx::query_as("SELECT id, name FROM categories WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.tx).await?;
        Ok(row.map(|(id, name)| Category { id, name }))
    }

    async fn insert_category(&mut self, category: &Category) -> StoreResult<()> {
        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
            .bind(category.id).bind(&category.name)
            .execute(&mut *self.tx).await.map_err(write_error)?;
        Ok(())
    }

    async fn link_category_to_shop(&mut self, category_id: Uuid, shop_id: Uuid) -> StoreResult<()> {
        sqlx::query("INSERT INTO shop_categories (shop_id, category_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(shop_id).bind(category_id)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn find_product(&mut self, name: &str, category_id: Uuid) -> StoreResult<Option<Product>> {
        let row: Option<(Uuid, String, Uuid)> = sqlx::query_as("SELECT id, name, category_id FROM products WHERE name = $1 AND category_id = $2")
            .bind(name).bind(category_id)
            .fetch_optional(&mut *self.tx).await?;
        Ok(row.map(|(id, name, category_id)| Product { id, name, category_id }))
    }

    async fn insert_product(&mut self, product: &Product) -> StoreResult<()> {
        sqlx::query("INSERT INTO products (id, name, category_id) VALUES ($1, $2, $3)")
            .bind(product.id).bind(&product.name).bind(product.category_id)
            .execute(&mut *self.tx).await.map_err(write_error)?;
        Ok(())
    }

    async fn find_parameter(&mut self, name: &str) -> StoreResult<Option<Parameter>> {
        let row: Option<(Uuid, String)> = sqlx::query_as("SELECT id, name FROM parameters WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.tx).await?;
        Ok(row.map(|(id, name)| Parameter { id, name }))
    }

    async fn insert_parameter(&mut self, parameter: &Parameter) -> StoreResult<()> {
        sqlx::query("INSERT INTO parameters (id, name) VALUES ($1, $2)")
            .bind(parameter.id).bind(&parameter.name)
            .execute(&mut *self.tx).await.map_err(write_error)?;
        Ok(())
    }

    async fn find_product_parameter(&mut self, product_info_id: Uuid, parameter_id: Uuid) -> StoreResult<Option<ProductParameter>> {
        let row: Option<(Uuid, Uuid, Uuid, String)> = sqlx::query_as(
            "SELECT id, product_info_id, parameter_id, value FROM product_parameters WHERE product_info_id = $1 AND parameter_id = $2",
        )
        .bind(product_info_id).bind(parameter_id)
        .fetch_optional(&mut *self.tx).await?;
        Ok(row.map(|(id, product_info_id, parameter_id, value)| ProductParameter { id, product_info_id, parameter_id, value }))
    }

    async fn insert_product_parameter(&mut self, pp: &ProductParameter) -> StoreResult<()> {
        sqlx::query("INSERT INTO product_parameters (id, product_info_id, parameter_id, value) VALUES ($1, $2, $3, $4)")
            .bind(pp.id).bind(pp.product_info_id).bind(pp.parameter_id).bind(&pp.value)
            .execute(&mut *self.tx).await.map_err(write_error)?;
        Ok(())
    }

    async fn set_product_parameter_value(&mut self, id: Uuid, value: &str) -> StoreResult<()> {
        sqlx::query("UPDATE product_parameters SET value = $2 WHERE id = $1")
            .bind(id).bind(value)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let PgTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
