use crate::config::AppConfig;
use crate::services::payment_gateway::PaymentGateway;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub db_pool: PgPool,
  pub payment_gateway: Arc<dyn PaymentGateway>,
  pub config: Arc<AppConfig>,
}
