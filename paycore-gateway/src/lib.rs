//! # Paycore Gateway
//!
//! Processor adapter for the payment core: the Stripe REST client behind the
//! `PaymentProcessor` port, plus HMAC webhook signatures used both to verify
//! inbound deliveries and to sign relayed outbound events.

pub mod signature;
pub mod stripe;

use std::sync::LazyLock;

use regex::Regex;

pub use stripe::{GatewayConfig, StripeGateway};

static TEST_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+_test_\w+").expect("valid test key pattern"));

/// Whether `key` is a processor test-mode key (e.g. `sk_test_...`).
pub fn is_test_key(key: &str) -> bool {
    TEST_KEY.is_match(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_test_key() {
        assert!(is_test_key("sk_test_51Habc"));
        assert!(is_test_key("rk_test_x"));
        assert!(!is_test_key("sk_live_51Habc"));
        assert!(!is_test_key(""));
    }
}
