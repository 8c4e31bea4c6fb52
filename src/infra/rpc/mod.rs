pub mod course_client;
pub mod exchange_client;
pub mod order_client;

pub use course_client::HttpCourseClient;
pub use exchange_client::FrankfurterExchangeClient;
pub use order_client::HttpOrderClient;
