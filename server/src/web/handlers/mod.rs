pub mod event_handlers;
pub mod meetup_handlers;
pub mod offer_handlers;
pub mod order_handlers;
pub mod payment_handlers;
pub mod product_handlers;

/// Normalizes `page`/`limit` query parameters into a `(page, limit, offset)`
/// window.
pub(crate) fn page_window(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64, i64) {
  let page = page.unwrap_or(1).max(1);
  let limit = limit.unwrap_or(default_limit).clamp(1, 100);
  (page, limit, (page - 1) * limit)
}

pub(crate) fn total_pages(total: i64, limit: i64) -> i64 {
  (total + limit - 1) / limit
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_window_defaults_and_clamps() {
    assert_eq!(page_window(None, None, 12), (1, 12, 0));
    assert_eq!(page_window(Some(3), Some(10), 12), (3, 10, 20));
    assert_eq!(page_window(Some(0), Some(1000), 12), (1, 100, 0));
  }

  #[test]
  fn total_pages_rounds_up() {
    assert_eq!(total_pages(0, 10), 0);
    assert_eq!(total_pages(25, 10), 3);
    assert_eq!(total_pages(30, 10), 3);
  }
}
