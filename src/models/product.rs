use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of sellable product. A sale line item points at exactly one of
/// these; resolving the owning instructor is a dispatch over this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    Course,
    Project,
}

impl ProductKind {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "course" => Ok(ProductKind::Course),
            "project" => Ok(ProductKind::Project),
            _ => Err(format!("Invalid product kind: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Course => "course",
            ProductKind::Project => "project",
        }
    }
}

impl From<ProductKind> for String {
    fn from(kind: ProductKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Minimal catalog projection: just enough to resolve a line item to the
/// instructor who earns from it. Catalog content itself lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub kind: String, // Stored as TEXT, use ProductKind enum for type safety
    pub instructor_id: Uuid,
    pub title: String,
    pub list_price: Decimal,
    pub created_at: NaiveDateTime,
}

impl Product {
    pub fn new(kind: ProductKind, instructor_id: Uuid, title: String, list_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.as_str().to_string(),
            instructor_id,
            title,
            list_price,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn kind_enum(&self) -> Result<ProductKind, String> {
        ProductKind::from_str(&self.kind)
    }
}
