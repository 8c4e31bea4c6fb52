//! `OrderPort` over HTTP to the Order service (spec §6 `Order.GetOrderById`,
//! §4.4 step 1). Retry/deadline policy lives in `infra::retry`, shared with
//! the Course client.

use {
    crate::domain::error::ServiceError,
    crate::infra::retry::with_retry,
    crate::ports::order::{Order, OrderPort},
    async_trait::async_trait,
    std::time::Duration,
};

const DEADLINE: Duration = Duration::from_secs(10);
const ATTEMPTS: u32 = 3;

pub struct HttpOrderClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpOrderClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl OrderPort for HttpOrderClient {
    async fn get_order_by_id(&self, order_id: &str, user_id: &str) -> Result<Order, ServiceError> {
        with_retry(ATTEMPTS, DEADLINE, || async {
            let resp = self
                .http
                .get(format!("{}/orders/{}", self.base_url, order_id))
                .query(&[("userId", user_id)])
                .send()
                .await
                .map_err(|e| ServiceError::Timeout(format!("order lookup: {e}")))?;

            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(ServiceError::NotFound(format!("order {order_id} not found")));
            }

            resp.error_for_status()
                .map_err(|e| ServiceError::Timeout(format!("order lookup: {e}")))?
                .json::<Order>()
                .await
                .map_err(|e| ServiceError::InternalUnknown(format!("order decode: {e}")))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::order::OrderStatus;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn fetches_and_decodes_an_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/order-1"))
            .and(query_param("userId", "user-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order-1",
                "amount": { "total": 5000, "currency": "USD", "salesTax": null, "discount": null },
                "status": "created",
                "items": [{ "courseId": "course-1", "price": 5000, "currency": "USD" }],
            })))
            .mount(&server)
            .await;

        let client = HttpOrderClient::new(server.uri());
        let order = client.get_order_by_id("order-1", "user-1").await.unwrap();

        assert_eq!(order.id, "order-1");
        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.amount.total, 5000);
        assert_eq!(order.items.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_retried_then_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpOrderClient::new(server.uri());
        let err = client.get_order_by_id("missing", "user-1").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
