//! Builders for realistic order aggregates, shared by tests across the
//! workspace.

use chrono::{TimeZone, Utc};

use crate::{Delivery, Item, Order, Payment};

/// A line item that passes validation.
pub fn sample_item(rid: &str) -> Item {
    Item {
        chrt_id: 9934930,
        track_number: "WBILMTESTTRACK".to_string(),
        price: 453,
        rid: rid.to_string(),
        name: "Mascaras".to_string(),
        sale: 30,
        size: "0".to_string(),
        total_price: 317,
        nm_id: 2389212,
        brand: "Vivienne Sabo".to_string(),
        status: 202,
    }
}

/// A complete aggregate with one item that passes validation.
pub fn sample_order(order_uid: &str) -> Order {
    sample_order_with_items(order_uid, 1)
}

/// A complete aggregate with `item_count` distinct items.
pub fn sample_order_with_items(order_uid: &str, item_count: usize) -> Order {
    let items = (0..item_count)
        .map(|i| sample_item(&format!("{}-rid-{}", order_uid, i)))
        .collect();

    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: order_uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1637907727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items,
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: Utc
            .with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
            .single()
            .expect("valid constant timestamp"),
        oof_shard: "1".to_string(),
    }
}
