use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CommissionId, CommissionRate, CommissionStatus, GrantId, Money, OrderId, ProductId, ServiceId,
    UserId,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartLine, Commission, CommissionUpdate, DownloadGrant, MAX_CART_QUANTITY, Product, Result,
    SettledOrderItem, StoreError, VendorAccount, Version, WishlistEntry, WishlistToggle,
    store::{CartStore, CatalogStore, CommissionStore, GrantStore, LedgerStore, WishlistStore},
};

const CART_COLUMNS: &str = "owner_id, product_id, quantity, created_at, updated_at";
const COMMISSION_COLUMNS: &str = "id, customer_id, vendor_id, service_id, title, description, budget, deadline, status, notes, delivery_files, version, created_at, updated_at";
const GRANT_COLUMNS: &str =
    "id, owner_id, product_id, asset_url, download_count, max_downloads, expires_at, created_at";

/// PostgreSQL-backed store implementation.
///
/// Each primitive is a single statement, or a single transaction where the
/// statement cannot express the whole read-modify-write.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
        Ok(CartLine {
            owner_id: UserId::from_uuid(row.try_get("owner_id")?),
            product_id: ProductId::from_uuid(row.try_get("product_id")?),
            quantity: to_u32(row.try_get("quantity")?)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_commission(row: PgRow) -> Result<Commission> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<CommissionStatus>()
            .map_err(|e| StoreError::InvalidValue(e.to_string()))?;

        Ok(Commission {
            id: CommissionId::from_uuid(row.try_get("id")?),
            customer_id: UserId::from_uuid(row.try_get("customer_id")?),
            vendor_id: UserId::from_uuid(row.try_get("vendor_id")?),
            service_id: row
                .try_get::<Option<Uuid>, _>("service_id")?
                .map(ServiceId::from_uuid),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            budget: Money::new(row.try_get("budget")?),
            deadline: row.try_get("deadline")?,
            status,
            notes: row.try_get("notes")?,
            delivery_files: row.try_get("delivery_files")?,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_grant(row: PgRow) -> Result<DownloadGrant> {
        Ok(DownloadGrant {
            id: GrantId::from_uuid(row.try_get("id")?),
            owner_id: UserId::from_uuid(row.try_get("owner_id")?),
            product_id: ProductId::from_uuid(row.try_get("product_id")?),
            asset_url: row.try_get("asset_url")?,
            download_count: to_u32(row.try_get("download_count")?)?,
            max_downloads: to_u32(row.try_get("max_downloads")?)?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_settled_item(row: PgRow) -> Result<SettledOrderItem> {
        Ok(SettledOrderItem {
            order_id: OrderId::from_uuid(row.try_get("order_id")?),
            product_id: ProductId::from_uuid(row.try_get("product_id")?),
            vendor_id: UserId::from_uuid(row.try_get("vendor_id")?),
            product_name: row.try_get("product_name")?,
            quantity: to_u32(row.try_get("quantity")?)?,
            unit_price: Money::new(row.try_get("unit_price")?),
            commission_rate: CommissionRate::from_bps(to_u32(
                row.try_get("commission_rate_bps")?,
            )?),
            settled_at: row.try_get("settled_at")?,
        })
    }
}

fn to_u32(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidValue(format!("negative count: {value}")))
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::InvalidValue(format!("count too large: {value}")))
}

/// Maps a unique-constraint violation to `UniqueViolation`, anything else to `Database`.
fn map_unique(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::UniqueViolation {
            constraint: db_err.constraint().unwrap_or("unknown").to_string(),
        };
    }
    StoreError::Database(e)
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn upsert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, vendor_id, name, price, active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                vendor_id = EXCLUDED.vendor_id,
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                active = EXCLUDED.active
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.vendor_id.as_uuid())
        .bind(&product.name)
        .bind(product.price.amount())
        .bind(product.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row: Option<PgRow> =
            sqlx::query("SELECT id, vendor_id, name, price, active FROM products WHERE id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(Product {
                id: ProductId::from_uuid(row.try_get("id")?),
                vendor_id: UserId::from_uuid(row.try_get("vendor_id")?),
                name: row.try_get("name")?,
                price: Money::new(row.try_get("price")?),
                active: row.try_get("active")?,
            })),
            None => Ok(None),
        }
    }

    async fn live_prices(&self, product_ids: &[ProductId]) -> Result<HashMap<ProductId, Money>> {
        let ids: Vec<Uuid> = product_ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query("SELECT id, price FROM products WHERE id = ANY($1) AND active")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok::<_, StoreError>((
                    ProductId::from_uuid(row.try_get("id")?),
                    Money::new(row.try_get("price")?),
                ))
            })
            .collect()
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn add_cart_quantity(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<CartLine> {
        let limit = StoreError::QuantityLimit {
            max: MAX_CART_QUANTITY,
        };
        if quantity > MAX_CART_QUANTITY {
            return Err(limit);
        }

        // The conflict branch updates nothing when the sum would pass the
        // limit, so no row comes back.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO cart_lines (owner_id, product_id, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (owner_id, product_id) DO UPDATE SET
                quantity = cart_lines.quantity + EXCLUDED.quantity,
                updated_at = EXCLUDED.updated_at
            WHERE cart_lines.quantity + EXCLUDED.quantity <= $5
            RETURNING {CART_COLUMNS}
            "#
        ))
        .bind(owner_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(to_i32(quantity)?)
        .bind(now)
        .bind(to_i32(MAX_CART_QUANTITY)?)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_cart_line(row),
            None => Err(limit),
        }
    }

    async fn set_cart_quantity(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<CartLine>> {
        if quantity <= 0 {
            self.remove_cart_line(owner_id, product_id).await?;
            return Ok(None);
        }
        if quantity > i64::from(MAX_CART_QUANTITY) {
            return Err(StoreError::QuantityLimit {
                max: MAX_CART_QUANTITY,
            });
        }
        let quantity = quantity as i32;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO cart_lines (owner_id, product_id, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (owner_id, product_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                updated_at = EXCLUDED.updated_at
            RETURNING {CART_COLUMNS}
            "#
        ))
        .bind(owner_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(quantity)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_cart_line(row).map(Some)
    }

    async fn remove_cart_line(&self, owner_id: UserId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE owner_id = $1 AND product_id = $2")
            .bind(owner_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, owner_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE owner_id = $1")
            .bind(owner_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn cart_lines(&self, owner_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM cart_lines WHERE owner_id = $1 ORDER BY created_at ASC, product_id ASC"
        ))
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_cart_line).collect()
    }
}

#[async_trait]
impl WishlistStore for PostgresStore {
    async fn toggle_wishlist_entry(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<WishlistToggle> {
        let mut tx = self.pool.begin().await?;

        let deleted =
            sqlx::query("DELETE FROM wishlist_entries WHERE owner_id = $1 AND product_id = $2")
                .bind(owner_id.as_uuid())
                .bind(product_id.as_uuid())
                .execute(&mut *tx)
                .await?
                .rows_affected();

        if deleted > 0 {
            tx.commit().await?;
            return Ok(WishlistToggle::Removed);
        }

        sqlx::query(
            "INSERT INTO wishlist_entries (owner_id, product_id, created_at) VALUES ($1, $2, $3)",
        )
        .bind(owner_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_unique)?;

        tx.commit().await?;
        Ok(WishlistToggle::Added(WishlistEntry {
            owner_id,
            product_id,
            created_at: now,
        }))
    }

    async fn wishlist_entries(&self, owner_id: UserId) -> Result<Vec<WishlistEntry>> {
        let rows = sqlx::query(
            "SELECT owner_id, product_id, created_at FROM wishlist_entries WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok::<_, StoreError>(WishlistEntry {
                    owner_id: UserId::from_uuid(row.try_get("owner_id")?),
                    product_id: ProductId::from_uuid(row.try_get("product_id")?),
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CommissionStore for PostgresStore {
    async fn insert_commission(&self, commission: Commission) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO commissions ({COMMISSION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(commission.id.as_uuid())
        .bind(commission.customer_id.as_uuid())
        .bind(commission.vendor_id.as_uuid())
        .bind(commission.service_id.map(|id| id.as_uuid()))
        .bind(&commission.title)
        .bind(&commission.description)
        .bind(commission.budget.amount())
        .bind(commission.deadline)
        .bind(commission.status.as_str())
        .bind(&commission.notes)
        .bind(&commission.delivery_files)
        .bind(commission.version.as_i64())
        .bind(commission.created_at)
        .bind(commission.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;

        Ok(())
    }

    async fn get_commission(&self, id: CommissionId) -> Result<Option<Commission>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_commission).transpose()
    }

    async fn commissions_for_user(&self, user_id: UserId) -> Result<Vec<Commission>> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions WHERE customer_id = $1 OR vendor_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_commission).collect()
    }

    async fn update_commission_if_version(
        &self,
        id: CommissionId,
        expected: Version,
        update: CommissionUpdate,
    ) -> Result<Commission> {
        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            UPDATE commissions SET
                status = $1,
                notes = COALESCE($2, notes),
                delivery_files = delivery_files || $3,
                updated_at = $4,
                version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING {COMMISSION_COLUMNS}
            "#
        ))
        .bind(update.status.as_str())
        .bind(&update.notes)
        .bind(&update.delivery_files)
        .bind(update.updated_at)
        .bind(id.as_uuid())
        .bind(expected.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_commission(row);
        }

        // No row changed: either the commission is gone or the version moved on
        let actual: Option<i64> =
            sqlx::query_scalar("SELECT version FROM commissions WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match actual {
            Some(actual) => Err(StoreError::ConcurrencyConflict {
                entity: "commission",
                id: id.to_string(),
                expected,
                actual: Version::new(actual),
            }),
            None => Err(StoreError::NotFound {
                entity: "commission",
                id: id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl GrantStore for PostgresStore {
    async fn insert_grant(&self, grant: DownloadGrant) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO download_grants ({GRANT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(grant.id.as_uuid())
        .bind(grant.owner_id.as_uuid())
        .bind(grant.product_id.as_uuid())
        .bind(&grant.asset_url)
        .bind(to_i32(grant.download_count)?)
        .bind(to_i32(grant.max_downloads)?)
        .bind(grant.expires_at)
        .bind(grant.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;

        Ok(())
    }

    async fn get_grant(&self, id: GrantId) -> Result<Option<DownloadGrant>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {GRANT_COLUMNS} FROM download_grants WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_grant).transpose()
    }

    async fn grants_for_owner(&self, owner_id: UserId) -> Result<Vec<DownloadGrant>> {
        let rows = sqlx::query(&format!(
            "SELECT {GRANT_COLUMNS} FROM download_grants WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_grant).collect()
    }

    async fn increment_download_if_available(&self, id: GrantId) -> Result<Option<DownloadGrant>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            UPDATE download_grants
            SET download_count = download_count + 1
            WHERE id = $1 AND download_count < max_downloads
            RETURNING {GRANT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_grant).transpose()
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn upsert_vendor_account(&self, account: VendorAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vendor_accounts (vendor_id, commission_rate_bps, total_sales)
            VALUES ($1, $2, $3)
            ON CONFLICT (vendor_id) DO UPDATE SET
                commission_rate_bps = EXCLUDED.commission_rate_bps,
                total_sales = EXCLUDED.total_sales
            "#,
        )
        .bind(account.vendor_id.as_uuid())
        .bind(to_i32(account.commission_rate.bps())?)
        .bind(account.total_sales.amount())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn vendor_account(&self, vendor_id: UserId) -> Result<Option<VendorAccount>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT vendor_id, commission_rate_bps, total_sales FROM vendor_accounts WHERE vendor_id = $1",
        )
        .bind(vendor_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(VendorAccount {
                vendor_id: UserId::from_uuid(row.try_get("vendor_id")?),
                commission_rate: CommissionRate::from_bps(to_u32(
                    row.try_get("commission_rate_bps")?,
                )?),
                total_sales: Money::new(row.try_get("total_sales")?),
            })),
            None => Ok(None),
        }
    }

    async fn record_settled_item(&self, item: SettledOrderItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settled_order_items
                (order_id, product_id, vendor_id, product_name, quantity, unit_price, commission_rate_bps, settled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(item.vendor_id.as_uuid())
        .bind(&item.product_name)
        .bind(to_i32(item.quantity)?)
        .bind(item.unit_price.amount())
        .bind(to_i32(item.commission_rate.bps())?)
        .bind(item.settled_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn settled_items_for_vendor(&self, vendor_id: UserId) -> Result<Vec<SettledOrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, vendor_id, product_name, quantity, unit_price, commission_rate_bps, settled_at
            FROM settled_order_items
            WHERE vendor_id = $1
            "#,
        )
        .bind(vendor_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_settled_item).collect()
    }
}
