use {crate::domain::error::ServiceError, async_trait::async_trait, serde::{Deserialize, Serialize}};

/// Order lifecycle states the Order service reports (spec §4.4 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Processing,
    Pending,
    PendingPayment,
    Completed,
    Cancelled,
    Other,
}

impl OrderStatus {
    /// Order states `CreatePayment` may act on (spec §4.4 step 1).
    pub fn is_payable(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Processing | Self::Pending | Self::PendingPayment
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAmount {
    pub total: i64,
    pub currency: String,
    pub sales_tax: Option<i64>,
    pub discount: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub course_id: String,
    pub price: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub amount: OrderAmount,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
}

/// Cross-service RPC client port (spec §6 `Order.GetOrderById`). Calls
/// through this port race a 10s deadline and retry 2× exponential at the
/// use-case layer (spec §4.4 step 1, §5).
#[async_trait]
pub trait OrderPort: Send + Sync {
    async fn get_order_by_id(&self, order_id: &str, user_id: &str) -> Result<Order, ServiceError>;
}
