pub mod paypal;
pub mod razorpay;
pub mod stripe;

pub use paypal::PaypalAdapter;
pub use razorpay::RazorpayAdapter;
pub use stripe::StripeAdapter;
