use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use ulid::Ulid;

use parkpass::booking::{today, BookingService};
use parkpass::captcha::UpstreamVerified;
use parkpass::config::{BookingConfig, NotifyConfig};
use parkpass::model::{Facility, FacilityKey, FacilityType, Park, PassType, SlotCapacity};
use parkpass::notify::LogNotifier;
use parkpass::server;
use parkpass::store::Store;

const PARK: &str = "Golden Ears";
const FACILITY: &str = "West Canyon";

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server(max: u32) -> (SocketAddr, Arc<Store>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("parkpass_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let store = Arc::new(Store::open(dir.join("parkpass.wal")).unwrap());
    store
        .put_park(Park {
            name: PARK.into(),
            visible: true,
            map_link: None,
            bc_parks_link: None,
        })
        .await
        .unwrap();
    let booking_times: BTreeMap<_, _> = [PassType::AM, PassType::PM, PassType::DAY]
        .into_iter()
        .map(|t| (t, SlotCapacity { max }))
        .collect();
    store
        .put_facility(Facility {
            park_name: PARK.into(),
            name: FACILITY.into(),
            facility_type: FacilityType::Trail,
            booking_times,
            booking_days_ahead: None,
            booking_opening_hour: None,
        })
        .await
        .unwrap();

    let notify = NotifyConfig {
        public_frontend: "https://reserve.example.ca".into(),
        cancellation_route: "/cancel".into(),
        ..NotifyConfig::default()
    };
    let service = Arc::new(BookingService::new(
        store.clone(),
        Arc::new(LogNotifier),
        Arc::new(UpstreamVerified),
        BookingConfig::default(),
        notify,
    ));

    tokio::spawn(server::serve(
        listener,
        service,
        64,
        Duration::from_secs(1),
        std::future::pending(),
    ));

    (addr, store)
}

async fn connect(addr: SocketAddr) -> Framed<TcpStream, LinesCodec> {
    let socket = TcpStream::connect(addr).await.unwrap();
    Framed::new(socket, LinesCodec::new())
}

async fn send(conn: &mut Framed<TcpStream, LinesCodec>, body: &str) -> Value {
    conn.send(body.to_string()).await.unwrap();
    let line = tokio::time::timeout(Duration::from_secs(5), conn.next())
        .await
        .expect("response timed out")
        .expect("connection closed")
        .unwrap();
    serde_json::from_str(&line).unwrap()
}

fn tomorrow() -> NaiveDate {
    today(Utc::now(), BookingConfig::default().timezone)
        .checked_add_days(Days::new(1))
        .unwrap()
}

fn booking(email: &str, guests: u32) -> String {
    json!({
        "parkName": PARK,
        "firstName": "Mary",
        "lastName": "Jackson",
        "facilityName": FACILITY,
        "facilityType": "Trail",
        "email": email,
        "date": tomorrow().to_string(),
        "type": "PM",
        "numberOfGuests": guests,
        "captchaJwt": "token"
    })
    .to_string()
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn warmup_and_bad_request() {
    let (addr, _store) = start_test_server(10).await;
    let mut conn = connect(addr).await;

    let warm = send(&mut conn, r#"{"warmup":true}"#).await;
    assert_eq!(warm, json!({"statusCode": 200, "body": {}}));

    let bad = send(&mut conn, "{nope").await;
    assert_eq!(bad["statusCode"], 400);
    assert_eq!(bad["body"]["title"], "Bad Request");
}

#[tokio::test]
async fn books_over_the_wire() {
    let (addr, store) = start_test_server(10).await;
    let mut conn = connect(addr).await;

    let resp = send(&mut conn, &booking("mary@example.com", 2)).await;
    assert_eq!(resp["statusCode"], 200);
    assert_eq!(resp["body"]["pk"], format!("pass::{PARK}"));
    assert_eq!(resp["body"]["numberOfGuests"], 2);
    assert_eq!(resp["body"]["passStatus"], "reserved");

    let key = FacilityKey::new(PARK, FACILITY);
    assert_eq!(store.reserved_count(&key, tomorrow(), PassType::PM).await, Some(2));

    let dup = send(&mut conn, &booking("mary@example.com", 1)).await;
    assert_eq!(dup["statusCode"], 400);
    assert_eq!(
        dup["body"]["title"],
        "This email account already has a reservation for this booking time."
    );
}

#[tokio::test]
async fn many_clients_share_one_slot() {
    let (addr, store) = start_test_server(6).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        handles.push(tokio::spawn(async move {
            let mut conn = connect(addr).await;
            send(&mut conn, &booking(&format!("client{i}@example.com"), 1)).await
        }));
    }

    let mut ok = 0;
    for h in handles {
        let resp = h.await.unwrap();
        match resp["statusCode"].as_u64() {
            Some(200) => ok += 1,
            Some(400) => assert_eq!(
                resp["body"]["title"],
                "Sorry, we are unable to fill your specific request."
            ),
            other => panic!("unexpected status {other:?}"),
        }
    }
    assert_eq!(ok, 6);

    let key = FacilityKey::new(PARK, FACILITY);
    assert_eq!(store.reserved_count(&key, tomorrow(), PassType::PM).await, Some(6));
    assert_eq!(store.pass_count(PARK).await, 6);
}

#[tokio::test]
async fn oversized_line_is_rejected() {
    let (addr, _store) = start_test_server(10).await;
    let mut conn = connect(addr).await;

    let huge = format!(r#"{{"parkName":"{}"}}"#, "x".repeat(parkpass::limits::MAX_FRAME_LEN + 1));
    let resp = send(&mut conn, &huge).await;
    assert_eq!(resp["statusCode"], 400);
}
