//! Produces synthetic but valid order aggregates onto the ingest topic,
//! for manual testing and load generation.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use common::telemetry::{init_telemetry, TelemetryConfig};
use domain::{Delivery, Item, Order, Payment};
use rand::rngs::ThreadRng;
use rand::Rng;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::{error, info};
use uuid::Uuid;

const LOCALES: [&str; 3] = ["en", "ru", "es"];
const CURRENCIES: [&str; 3] = ["USD", "RUB", "EUR"];
const PROVIDERS: [&str; 3] = ["wbpay", "paypal", "stripe"];
const BANKS: [&str; 3] = ["alpha", "sber", "tinkoff"];
const CARRIERS: [&str; 4] = ["meest", "ups", "fedex", "dhl"];
const BRANDS: [&str; 4] = ["Vivienne Sabo", "Acme", "Contoso", "Globex"];
const PRODUCTS: [&str; 4] = ["Mascaras", "Lipstick", "Sneakers", "Backpack"];

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_telemetry(TelemetryConfig {
        service_name: "order-generator".to_string(),
        log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        json_output: false,
    });

    let brokers = std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    let topic = std::env::var("KAFKA_TOPIC").unwrap_or_else(|_| "orders".to_string());
    let count: usize = std::env::var("ORDERS_COUNT")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .unwrap_or(10);

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("message.timeout.ms", "5000")
        .set("acks", "all")
        .set("retries", "3")
        .create()?;

    info!("Producing {} orders to topic '{}' via {}", count, topic, brokers);

    let mut sent = 0u64;
    let mut failed = 0u64;

    for _ in 0..count {
        let order = random_order();
        let payload = serde_json::to_string(&order)?;

        let record = FutureRecord::to(&topic)
            .key(&order.order_uid)
            .payload(&payload);

        match producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
        {
            Ok((partition, offset)) => {
                sent += 1;
                info!(
                    "order {} sent to partition {}, offset {}",
                    order.order_uid, partition, offset
                );
            }
            Err((e, _)) => {
                failed += 1;
                error!("failed to send order {}: {}", order.order_uid, e);
            }
        }
    }

    info!("Done: {} sent, {} failed", sent, failed);
    Ok(())
}

fn pick<'a>(rng: &mut ThreadRng, values: &[&'a str]) -> &'a str {
    values[rng.gen_range(0..values.len())]
}

fn random_track(rng: &mut ThreadRng) -> String {
    (0..10).map(|_| rng.gen_range(b'A'..=b'Z') as char).collect()
}

fn random_item(rng: &mut ThreadRng, track_number: &str) -> Item {
    let price = rng.gen_range(100..5000);
    let sale = rng.gen_range(0..50);
    Item {
        chrt_id: rng.gen_range(1_000_000..9_999_999),
        track_number: track_number.to_string(),
        price,
        rid: Uuid::new_v4().simple().to_string(),
        name: pick(rng, &PRODUCTS).to_string(),
        sale,
        size: rng.gen_range(0..6).to_string(),
        total_price: price * i64::from(100 - sale) / 100,
        nm_id: rng.gen_range(1_000_000..9_999_999),
        brand: pick(rng, &BRANDS).to_string(),
        status: rng.gen_range(100..400),
    }
}

fn random_order() -> Order {
    let mut rng = rand::thread_rng();

    let order_uid = Uuid::new_v4().simple().to_string();
    let track_number = random_track(&mut rng);

    let item_count = rng.gen_range(1..=5);
    let items: Vec<Item> = (0..item_count)
        .map(|_| random_item(&mut rng, &track_number))
        .collect();

    let goods_total: i64 = items.iter().map(|item| item.total_price).sum();
    let delivery_cost = rng.gen_range(100..2000);

    Order {
        order_uid: order_uid.clone(),
        track_number,
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: format!("+{}", rng.gen_range(10_000_000_000u64..99_999_999_999)),
            zip: rng.gen_range(10000..99999).to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: format!("customer{}@example.com", rng.gen_range(1..10_000)),
        },
        payment: Payment {
            transaction: order_uid.clone(),
            request_id: String::new(),
            currency: pick(&mut rng, &CURRENCIES).to_string(),
            provider: pick(&mut rng, &PROVIDERS).to_string(),
            amount: goods_total + delivery_cost,
            payment_dt: Utc::now().timestamp(),
            bank: pick(&mut rng, &BANKS).to_string(),
            delivery_cost,
            goods_total,
            custom_fee: 0,
        },
        items,
        locale: pick(&mut rng, &LOCALES).to_string(),
        internal_signature: String::new(),
        customer_id: Uuid::new_v4().simple().to_string(),
        delivery_service: pick(&mut rng, &CARRIERS).to_string(),
        shardkey: rng.gen_range(1..10).to_string(),
        sm_id: rng.gen_range(1..100),
        date_created: Utc::now(),
        oof_shard: rng.gen_range(1..10).to_string(),
    }
}
