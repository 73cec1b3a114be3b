//! Request-identity extractors.
//!
//! Authentication proper is an external collaborator; these extractors are
//! the seam it plugs into. The dev/test implementation trusts an
//! `X-User-ID` header for user identity and an `X-Admin-Key` header checked
//! against configuration for admin routes.

use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    if let Some(user_id_header) = req.headers().get("X-User-ID") {
      if let Ok(user_id_str) = user_id_header.to_str() {
        if let Ok(user_id) = Uuid::parse_str(user_id_str) {
          return ready(Ok(AuthenticatedUser { user_id }));
        }
      }
    }
    warn!("AuthenticatedUser extractor: Missing or invalid X-User-ID header.");
    ready(Err(AppError::Auth(
      "User authentication required. Missing or invalid X-User-ID header.".to_string(),
    )))
  }
}

#[derive(Debug, Clone, Copy)]
pub struct AdminUser;

impl FromRequest for AdminUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
      return ready(Err(AppError::Internal("Application state missing".to_string())));
    };

    let presented = req.headers().get("X-Admin-Key").and_then(|value| value.to_str().ok());
    if presented == Some(state.config.admin_api_key.as_str()) {
      ready(Ok(AdminUser))
    } else {
      warn!("AdminUser extractor: Missing or invalid X-Admin-Key header.");
      ready(Err(AppError::Forbidden("Admin access required".to_string())))
    }
  }
}
