//! Order history

use crate::client::ShopverseClient;
use crate::error::ApiResult;
use serde::{Deserialize, Serialize};

/// Orders API interface
#[derive(Clone)]
pub struct OrdersApi {
    client: ShopverseClient,
}

impl OrdersApi {
    /// Create a new orders API interface
    pub(crate) fn new(client: ShopverseClient) -> Self {
        Self { client }
    }

    /// List a user's orders, newest first, optionally filtered by status
    pub async fn list(&self, access_token: &str, user_id: &str, status: Option<&str>) -> ApiResult<Vec<Order>> {
        self.client
            .get_authorized(&orders_path(user_id, status), access_token)
            .await
    }
}

fn orders_path(user_id: &str, status: Option<&str>) -> String {
    let mut path = format!("rest/v1/orders?select=*&user_id=eq.{user_id}");
    if let Some(status) = status {
        path.push_str("&status=eq.");
        path.push_str(status);
    }
    path.push_str("&order=order_date.desc");
    path
}

/// Row of the `orders` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier
    pub order_id: String,
    /// Owner
    pub user_id: String,
    /// Discount applied to the order
    #[serde(default)]
    pub total_discount: f64,
    /// Amount charged
    #[serde(default)]
    pub total_price: f64,
    /// Fulfilment status, e.g. `PENDING` or `DELIVERED`
    pub status: String,
    /// Placement time (RFC 3339)
    pub order_date: String,
    /// Delivery address
    pub address: Option<String>,
    /// Line items, present when selected with an embedded resource
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// Line item of an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product identifier
    pub product_id: String,
    /// Display name
    pub name: Option<String>,
    /// Units ordered
    pub quantity: u32,
    /// Unit price
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::test_support::MockServer;
    use shopverse_core::retry::RetryConfig;

    #[test]
    fn test_orders_path() {
        assert_eq!(
            orders_path("u1", None),
            "rest/v1/orders?select=*&user_id=eq.u1&order=order_date.desc"
        );
        assert_eq!(
            orders_path("u1", Some("DELIVERED")),
            "rest/v1/orders?select=*&user_id=eq.u1&status=eq.DELIVERED&order=order_date.desc"
        );
    }

    #[tokio::test]
    async fn test_list_orders() {
        let server = MockServer::start(vec![(
            200,
            r#"[{"order_id":"o-2","user_id":"u1","total_discount":0,"total_price":42.5,
                 "status":"SHIPPED","order_date":"2024-05-02T09:00:00Z","address":"1 Main St"},
                {"order_id":"o-1","user_id":"u1","total_price":10,
                 "status":"DELIVERED","order_date":"2024-04-30T09:00:00Z","address":null}]"#,
        )])
        .await;
        let config = ClientConfig::development()
            .with_base_url(server.url())
            .with_retry(RetryConfig::no_retry());
        let orders = ShopverseClient::with_config(config)
            .unwrap()
            .orders()
            .list("jwt", "u1", None)
            .await
            .unwrap();

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_id, "o-2");
        assert!((orders[0].total_price - 42.5).abs() < f64::EPSILON);
        assert!(orders[1].address.is_none());
        assert!(orders[1].items.is_empty());
    }
}
