use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// An order together with its delivery, payment and line items. The whole
/// struct is the unit of consistency: it is persisted atomically and cached
/// as one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Order {
    #[validate(length(min = 1, message = "order_uid cannot be empty"))]
    pub order_uid: String,

    #[validate(length(min = 1, message = "track_number cannot be empty"))]
    pub track_number: String,

    pub entry: String,

    #[validate(nested)]
    pub delivery: Delivery,

    #[validate(nested)]
    pub payment: Payment,

    #[validate(length(min = 1, message = "order must have at least one item"), nested)]
    pub items: Vec<Item>,

    pub locale: String,

    #[serde(default)]
    pub internal_signature: String,

    #[validate(length(min = 1, message = "customer_id cannot be empty"))]
    pub customer_id: String,

    pub delivery_service: String,

    pub shardkey: String,

    pub sm_id: i32,

    pub date_created: DateTime<Utc>,

    pub oof_shard: String,
}

/// Delivery details, exactly one per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Delivery {
    #[validate(length(min = 2, max = 100, message = "name must be 2-100 characters"))]
    pub name: String,

    #[validate(length(min = 5, max = 20, message = "phone must be 5-20 characters"))]
    pub phone: String,

    #[validate(length(min = 5, max = 10, message = "zip must be 5-10 characters"))]
    pub zip: String,

    #[validate(length(min = 2, max = 50, message = "city must be 2-50 characters"))]
    pub city: String,

    #[validate(length(min = 5, max = 200, message = "address must be 5-200 characters"))]
    pub address: String,

    #[validate(length(min = 2, max = 50, message = "region must be 2-50 characters"))]
    pub region: String,

    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
}

/// Payment details, exactly one per order, keyed by `order_uid` in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Payment {
    #[validate(length(min = 1, message = "transaction cannot be empty"))]
    pub transaction: String,

    #[serde(default)]
    pub request_id: String,

    #[validate(length(min = 3, max = 3, message = "currency must be a 3-letter code"))]
    pub currency: String,

    #[validate(length(min = 1, message = "provider cannot be empty"))]
    pub provider: String,

    #[validate(range(min = 0, message = "amount cannot be negative"))]
    pub amount: i64,

    /// Unix timestamp (seconds) of the payment.
    #[validate(range(min = 1, message = "payment_dt must be a positive timestamp"))]
    pub payment_dt: i64,

    pub bank: String,

    #[validate(range(min = 0, message = "delivery_cost cannot be negative"))]
    pub delivery_cost: i64,

    #[validate(range(min = 0, message = "goods_total cannot be negative"))]
    pub goods_total: i64,

    #[validate(range(min = 0, message = "custom_fee cannot be negative"))]
    pub custom_fee: i64,
}

/// A single line item; an order carries one or more, order preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Item {
    #[validate(range(min = 1, message = "chrt_id must be positive"))]
    pub chrt_id: i64,

    pub track_number: String,

    #[validate(range(min = 0, message = "price cannot be negative"))]
    pub price: i64,

    #[validate(length(min = 1, message = "rid cannot be empty"))]
    pub rid: String,

    #[validate(length(min = 1, message = "item name cannot be empty"))]
    pub name: String,

    pub sale: i32,

    pub size: String,

    #[validate(range(min = 0, message = "total_price cannot be negative"))]
    pub total_price: i64,

    pub nm_id: i64,

    pub brand: String,

    pub status: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_order as make_order;

    fn sample_order() -> Order {
        make_order("b563feb7b2b84b6test")
    }

    #[test]
    fn test_valid_order_passes_validation() {
        assert!(sample_order().validate().is_ok());
    }

    #[test]
    fn test_empty_order_uid_fails() {
        let mut order = sample_order();
        order.order_uid = String::new();
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_no_items_fails() {
        let mut order = sample_order();
        order.items.clear();
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_invalid_email_fails() {
        let mut order = sample_order();
        order.delivery.email = "not-an-email".to_string();
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_invalid_item_fails() {
        let mut order = sample_order();
        order.items[0].rid = String::new();
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_negative_amount_fails() {
        let mut order = sample_order();
        order.payment.amount = -1;
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let order = sample_order();
        let json = serde_json::to_string(&order).unwrap();
        let decoded: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, decoded);
    }

    #[test]
    fn test_decodes_wire_format_field_names() {
        let json = serde_json::to_value(sample_order()).unwrap();
        assert!(json.get("order_uid").is_some());
        assert!(json.get("track_number").is_some());
        assert!(json.get("shardkey").is_some());
        assert!(json["payment"].get("payment_dt").is_some());
        assert!(json["items"][0].get("chrt_id").is_some());
    }
}
