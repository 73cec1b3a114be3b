use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_category_enum", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ProductCategory {
  Printing,
  Packaging,
  BusinessCards,
  Banners,
  Brochures,
  Boxes,
  Bags,
  Labels,
}

impl ProductCategory {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProductCategory::Printing => "printing",
      ProductCategory::Packaging => "packaging",
      ProductCategory::BusinessCards => "business-cards",
      ProductCategory::Banners => "banners",
      ProductCategory::Brochures => "brochures",
      ProductCategory::Boxes => "boxes",
      ProductCategory::Bags => "bags",
      ProductCategory::Labels => "labels",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomOptionKind {
  Text,
  Select,
  Color,
  File,
}

/// A customization a buyer may choose for a product, priced from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOption {
  pub name: String,
  #[serde(rename = "type")]
  pub kind: CustomOptionKind,
  #[serde(default)]
  pub options: Vec<String>,
  #[serde(default)]
  pub required: bool,
  pub additional_cost: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: Uuid,
  pub name: String,
  pub description: String,
  pub category: ProductCategory,
  pub price: Decimal,
  pub compare_price: Option<Decimal>,
  pub stock: i32,
  pub min_order_quantity: i32,
  pub customizable: bool,
  pub custom_options: Json<Vec<CustomOption>>,
  pub is_active: bool,
  pub featured: bool,
  pub tags: Vec<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
