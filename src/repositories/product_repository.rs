//! Repository for the catalog projection used to resolve earnings owners

use crate::error::RepositoryError;
use crate::models::{Product, ProductKind};
use sqlx::PgPool;
use uuid::Uuid;

pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, product: &Product) -> Result<Product, RepositoryError> {
        let created = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, kind, instructor_id, title, list_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, kind, instructor_id, title, list_price, created_at
            "#,
        )
        .bind(product.id)
        .bind(&product.kind)
        .bind(product.instructor_id)
        .bind(&product.title)
        .bind(product.list_price)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, kind, instructor_id, title, list_price, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Resolve the instructor who owns a product. The line item carries the
    /// product kind tag, so resolution is a single keyed lookup.
    pub async fn find_owner(
        &self,
        product_id: Uuid,
        kind: ProductKind,
    ) -> Result<Option<Uuid>, RepositoryError> {
        let owner = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT instructor_id
            FROM products
            WHERE id = $1 AND kind = $2
            "#,
        )
        .bind(product_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner)
    }
}
