use futures_util::StreamExt;
use serde_json::json;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

/// Scenario driver: a series of normal readings, one multi-abnormal reading,
/// then an emergency signal, while watching the coordinator channel for the
/// pushes they trigger. Needs a seeded elder uuid in ELDER_ID.
#[tokio::main]
async fn main() {
    let base = std::env::var("VITALGUARD_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".into());
    let elder_id = std::env::var("ELDER_ID").expect("ELDER_ID must be set to a seeded elder uuid");

    // 1. Watch the coordinator channel
    let ws_base = base.replacen("http", "ws", 1);
    let ws_url = Url::parse(&format!("{ws_base}/ws?channel=coordinators")).unwrap();

    println!("🔌 Connecting to VitalGuard coordinator channel...");
    let (ws_stream, _) = connect_async(ws_url.to_string())
        .await
        .expect("Failed to connect");
    let (_write, mut read) = ws_stream.split();

    tokio::spawn(async move {
        while let Some(Ok(Message::Text(text))) = read.next().await {
            println!("📟 Coordinator push: {text}");
        }
    });

    println!("✅ Connected! Starting scenario...");
    let client = reqwest::Client::new();

    // 2. Loop 1: Normal vitals
    for i in 1..=5 {
        let packet = json!({
            "elder_id": elder_id,
            "heart_rate": 70 + i,
            "systolic": 118,
            "diastolic": 76,
            "temperature": 98.4,
            "oxygen_saturation": 97
        });
        let response = client
            .post(format!("{base}/api/measurements"))
            .json(&packet)
            .send()
            .await
            .expect("measurement request failed");
        println!("🚶 Normal reading sent ({i}/5) -> {}", response.status());
        sleep(Duration::from_millis(500)).await;
    }

    // 3. One reading with three abnormal fields at once
    println!("⚠️ SENDING ABNORMAL VITALS!");
    let packet = json!({
        "elder_id": elder_id,
        "heart_rate": 125,
        "systolic": 150,
        "diastolic": 95,
        "oxygen_saturation": 93
    });
    let response = client
        .post(format!("{base}/api/measurements"))
        .json(&packet)
        .send()
        .await
        .expect("measurement request failed");
    println!(
        "🔴 Alert response: {}",
        response.text().await.unwrap_or_default()
    );

    // 4. Emergency signal, deliberately in a producer's loose shape
    println!("🚨 SENDING EMERGENCY SIGNAL!");
    let packet = json!({
        "elderId": elder_id,
        "alertType": "heart_attack",
        "location": {"lat": 6.9271, "lng": 79.8612, "address": "12 Temple Road"}
    });
    let response = client
        .post(format!("{base}/api/emergency"))
        .json(&packet)
        .send()
        .await
        .expect("emergency request failed");
    println!(
        "🚑 Emergency response: {}",
        response.text().await.unwrap_or_default()
    );

    // Give the coordinator pushes a moment to print
    sleep(Duration::from_secs(5)).await;
    println!("🛑 Simulation finished.");
}
