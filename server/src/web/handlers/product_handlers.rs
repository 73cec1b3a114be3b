use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{page_window, total_pages};
use crate::errors::AppError;
use crate::models::{CustomOption, Product, ProductCategory};
use crate::state::AppState;
use crate::web::extractors::AdminUser;

#[derive(Deserialize, Debug)]
pub struct ListProductsQuery {
  pub page: Option<i64>,
  pub limit: Option<i64>,
  pub category: Option<ProductCategory>,
  pub search: Option<String>,
  pub featured: Option<bool>,
  #[serde(rename = "minPrice")]
  pub min_price: Option<Decimal>,
  #[serde(rename = "maxPrice")]
  pub max_price: Option<Decimal>,
  pub sort: Option<String>,
  pub order: Option<String>,
}

fn apply_product_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ListProductsQuery) {
  builder.push(" WHERE is_active = TRUE");
  if let Some(category) = query.category {
    builder.push(" AND category = ").push_bind(category);
  }
  if let Some(search) = &query.search {
    let pattern = format!("%{}%", search);
    builder
      .push(" AND (name ILIKE ")
      .push_bind(pattern.clone())
      .push(" OR description ILIKE ")
      .push_bind(pattern.clone())
      .push(" OR array_to_string(tags, ' ') ILIKE ")
      .push_bind(pattern)
      .push(")");
  }
  if query.featured == Some(true) {
    builder.push(" AND featured = TRUE");
  }
  if let Some(min_price) = query.min_price {
    builder.push(" AND price >= ").push_bind(min_price);
  }
  if let Some(max_price) = query.max_price {
    builder.push(" AND price <= ").push_bind(max_price);
  }
}

#[instrument(name = "handler::list_products", skip(app_state, query))]
pub async fn list_products_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ListProductsQuery>,
) -> Result<HttpResponse, AppError> {
  let (page, limit, offset) = page_window(query.page, query.limit, 12);

  // Sort keys are whitelisted; anything else falls back to name.
  let sort_column = match query.sort.as_deref() {
    Some("price") => "price",
    Some("createdAt") => "created_at",
    Some("featured") => "featured",
    _ => "name",
  };
  let sort_direction = match query.order.as_deref() {
    Some("desc") => "DESC",
    _ => "ASC",
  };

  let mut data_query = QueryBuilder::<Postgres>::new("SELECT * FROM products");
  apply_product_filters(&mut data_query, &query);
  data_query
    .push(" ORDER BY ")
    .push(sort_column)
    .push(" ")
    .push(sort_direction)
    .push(" LIMIT ")
    .push_bind(limit)
    .push(" OFFSET ")
    .push_bind(offset);
  let products: Vec<Product> = data_query.build_query_as().fetch_all(&app_state.db_pool).await?;

  let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
  apply_product_filters(&mut count_query, &query);
  let (total,): (i64,) = count_query.build_query_as().fetch_one(&app_state.db_pool).await?;

  Ok(HttpResponse::Ok().json(json!({
    "products": products,
    "totalPages": total_pages(total, limit),
    "currentPage": page,
    "total": total
  })))
}

#[instrument(name = "handler::get_product", skip(app_state, path), fields(product_id = %path.as_ref()))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let product_id = path.into_inner();

  let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1 AND is_active = TRUE")
    .bind(product_id)
    .fetch_optional(&app_state.db_pool)
    .await?;

  match product {
    Some(product) => Ok(HttpResponse::Ok().json(product)),
    None => {
      warn!("Product {} not found.", product_id);
      Err(AppError::NotFound(format!("Product not found: {}", product_id)))
    }
  }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
  pub name: String,
  pub description: String,
  pub category: ProductCategory,
  pub price: Decimal,
  pub compare_price: Option<Decimal>,
  pub stock: i32,
  #[serde(default = "default_min_order_quantity")]
  pub min_order_quantity: i32,
  #[serde(default)]
  pub customizable: bool,
  #[serde(default)]
  pub custom_options: Vec<CustomOption>,
  #[serde(default)]
  pub featured: bool,
  #[serde(default)]
  pub tags: Vec<String>,
}

fn default_min_order_quantity() -> i32 {
  1
}

#[instrument(name = "handler::create_product", skip(app_state, payload, _admin))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreateProductRequest>,
  _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();

  if payload.name.trim().len() < 3 {
    return Err(AppError::Validation("Product name must be at least 3 characters".to_string()));
  }
  if payload.description.trim().is_empty() {
    return Err(AppError::Validation("Product description is required".to_string()));
  }
  if payload.price < Decimal::ZERO {
    return Err(AppError::Validation("Price must be a non-negative number".to_string()));
  }
  if payload.stock < 0 {
    return Err(AppError::Validation("Stock must be a non-negative number".to_string()));
  }
  if payload.min_order_quantity < 1 {
    return Err(AppError::Validation("Minimum order quantity must be at least 1".to_string()));
  }

  let product: Product = sqlx::query_as(
    "INSERT INTO products \
       (name, description, category, price, compare_price, stock, min_order_quantity, customizable, custom_options, featured, tags) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
     RETURNING *",
  )
  .bind(payload.name.trim())
  .bind(payload.description.trim())
  .bind(payload.category)
  .bind(payload.price)
  .bind(payload.compare_price)
  .bind(payload.stock)
  .bind(payload.min_order_quantity)
  .bind(payload.customizable)
  .bind(Json(&payload.custom_options))
  .bind(payload.featured)
  .bind(&payload.tags)
  .fetch_one(&app_state.db_pool)
  .await?;

  info!(product_id = %product.id, "Product created");
  Ok(HttpResponse::Created().json(json!({
    "message": "Product created successfully",
    "product": product
  })))
}
