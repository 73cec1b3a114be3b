use actix_web::web;

use crate::web::handlers;

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({
    "message": "Planet Scribbles API is running!",
    "timestamp": chrono::Utc::now().to_rfc3339()
  }))
}

// Called in `main.rs` to configure services for the Actix App.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/products")
          .route("", web::get().to(handlers::product_handlers::list_products_handler))
          .route("", web::post().to(handlers::product_handlers::create_product_handler))
          .route("/{product_id}", web::get().to(handlers::product_handlers::get_product_handler)),
      )
      .service(
        web::scope("/events")
          .route("", web::get().to(handlers::event_handlers::list_events_handler))
          .route("", web::post().to(handlers::event_handlers::create_event_handler))
          .route("/{event_id}", web::get().to(handlers::event_handlers::get_event_handler))
          .route("/{event_id}/register", web::post().to(handlers::event_handlers::register_handler))
          .route(
            "/{event_id}/register",
            web::delete().to(handlers::event_handlers::unregister_handler),
          ),
      )
      .service(
        web::scope("/meetups")
          .route("", web::get().to(handlers::meetup_handlers::list_meetups_handler))
          .route("", web::post().to(handlers::meetup_handlers::create_meetup_handler))
          .route("/{meetup_id}", web::get().to(handlers::meetup_handlers::get_meetup_handler))
          .route("/{meetup_id}/join", web::post().to(handlers::meetup_handlers::join_handler))
          .route("/{meetup_id}/join", web::delete().to(handlers::meetup_handlers::leave_handler)),
      )
      .service(
        web::scope("/offers")
          .route("", web::get().to(handlers::offer_handlers::list_offers_handler))
          .route("", web::post().to(handlers::offer_handlers::create_offer_handler))
          // Registered before the catch-all `{code}` path.
          .route("/validate", web::post().to(handlers::offer_handlers::validate_offer_handler))
          .route("/{code}", web::get().to(handlers::offer_handlers::get_offer_handler)),
      )
      .service(
        web::scope("/orders")
          .route("", web::post().to(handlers::order_handlers::create_order_handler))
          .route("", web::get().to(handlers::order_handlers::list_orders_handler))
          .route("/{order_id}", web::get().to(handlers::order_handlers::get_order_handler))
          .route("/{order_id}/cancel", web::put().to(handlers::order_handlers::cancel_order_handler)),
      )
      .service(
        web::scope("/payment")
          .route("/create-intent", web::post().to(handlers::payment_handlers::create_intent_handler))
          .route("/confirm", web::post().to(handlers::payment_handlers::confirm_payment_handler))
          .route("/webhook", web::post().to(handlers::payment_handlers::webhook_handler)),
      ),
  );
}
