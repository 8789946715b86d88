use super::*;
use crate::dispatcher::Dispatcher;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tower::ServiceExt;
use wablast_core::config::{DispatchConfig, WhatsAppConfig};
use wablast_core::message::StagedMedia;
use wablast_store::MediaStager;

// -----------------------------------------------------------------------
// Mock client
// -----------------------------------------------------------------------

/// Records sends; rejects handles listed in `reject`.
#[derive(Default)]
struct MockClient {
    ready: AtomicBool,
    reject: HashSet<String>,
    sent: Mutex<Vec<(String, String, Option<String>)>>,
}

#[async_trait]
impl MessagingClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn initialize(&self) -> Result<(), BlastError> {
        Ok(())
    }

    async fn send_text(&self, handle: &str, text: &str) -> Result<(), BlastError> {
        if self.reject.contains(handle) {
            return Err(BlastError::Client("not a whatsapp user".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((handle.to_string(), text.to_string(), None));
        Ok(())
    }

    async fn send_media(
        &self,
        handle: &str,
        media: &StagedMedia,
        caption: &str,
    ) -> Result<(), BlastError> {
        self.sent.lock().unwrap().push((
            handle.to_string(),
            caption.to_string(),
            Some(media.file_name.clone()),
        ));
        Ok(())
    }

    async fn is_registered_user(&self, handle: &str) -> Result<bool, BlastError> {
        if handle == "error@c.us" {
            return Err(BlastError::Client("lookup failed".into()));
        }
        Ok(!self.reject.contains(handle))
    }

    async fn logout(&self) -> Result<(), BlastError> {
        self.ready.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// -----------------------------------------------------------------------
// Test helpers
// -----------------------------------------------------------------------

struct Fixture {
    app: Router,
    client: Arc<MockClient>,
    store: Store,
    dispatcher: Arc<Dispatcher>,
    _tmp: tempfile::TempDir,
}

async fn fixture_with(api_key: &str, ready: bool, reject: &[&str]) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let client = Arc::new(MockClient {
        ready: AtomicBool::new(ready),
        reject: reject.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });
    let store = Store::in_memory().await.unwrap();
    let settings = Arc::new(SettingsFile::for_data_dir(tmp.path()).await.unwrap());
    let dispatcher = Arc::new(Dispatcher::new(
        client.clone(),
        Arc::new(store.clone()),
        MediaStager::for_data_dir(tmp.path()),
        &DispatchConfig::default(),
    ));
    // Unreachable bridge: only used for events and QR state.
    let bridge = Arc::new(
        WhatsAppBridge::new(&WhatsAppConfig {
            bridge_url: "http://127.0.0.1:9".into(),
            bridge_token: String::new(),
            request_timeout_secs: 1,
        })
        .unwrap(),
    );
    let config = ApiConfig {
        api_key: api_key.to_string(),
        ..ApiConfig::default()
    };
    let state = ApiState::new(
        dispatcher.clone(),
        client.clone(),
        Some(bridge),
        store.clone(),
        settings,
        &config,
    );
    Fixture {
        app: build_router(state, 4 * 1024 * 1024),
        client,
        store,
        dispatcher,
        _tmp: tmp,
    }
}

async fn fixture() -> Fixture {
    fixture_with("", true, &[]).await
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

/// Parse response body as JSON.
async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    (status, body_json(resp).await)
}

// -----------------------------------------------------------------------
// Auth and health
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_health_no_auth() {
    let f = fixture().await;
    let (status, json) = call(&f.app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["whatsapp"], "connected");
}

#[tokio::test]
async fn test_health_valid_auth() {
    let f = fixture_with("secret", true, &[]).await;
    let req = Request::get("/api/health")
        .header("Authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&f.app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_bad_or_missing_auth_rejected() {
    let f = fixture_with("secret", true, &[]).await;
    let req = Request::get("/api/messages")
        .header("Authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, json) = call(&f.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let (status, _) = call(
        &f.app,
        json_request("POST", "/api/send", json!({"numbers": ["1"], "message": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(f.client.sent.lock().unwrap().is_empty());
}

#[test]
fn test_constant_time_eq() {
    assert!(constant_time_eq("abc", "abc"));
    assert!(!constant_time_eq("abc", "abd"));
    assert!(!constant_time_eq("abc", "abcd"));
}

// -----------------------------------------------------------------------
// Sending
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_send_json_success() {
    let f = fixture().await;
    let (status, json) = call(
        &f.app,
        json_request(
            "POST",
            "/api/send",
            json!({"numbers": ["6281234567890", " 0812 "], "message": "hello"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["summary"]["total"], 2);
    assert_eq!(json["summary"]["success"], 2);
    assert_eq!(json["summary"]["failed"], 0);
    assert_eq!(json["results"][0]["phone"], "6281234567890@c.us");
    assert_eq!(json["results"][1]["phone"], "0812@c.us");
    assert!(json.get("unrecorded").is_none());
    assert_eq!(f.store.outcome_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_send_partial_failure() {
    let f = fixture_with("", true, &["000@c.us"]).await;
    let (status, json) = call(
        &f.app,
        json_request(
            "POST",
            "/api/send",
            json!({"numbers": ["111", "000", "333"], "message": "promo"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary"]["success"], 2);
    assert_eq!(json["summary"]["failed"], 1);
    assert_eq!(json["results"][1]["phone"], "000");
    assert_eq!(json["results"][1]["status"], "failed");
    assert_eq!(json["results"][1]["error"], "not a whatsapp user");
}

#[tokio::test]
async fn test_failed_recipient_echoes_trimmed_input() {
    let f = fixture_with("", true, &["000@c.us"]).await;
    let (status, json) = call(
        &f.app,
        json_request("POST", "/api/send", json!({"numbers": ["  000\t"], "message": "m"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"][0]["status"], "failed");
    assert_eq!(json["results"][0]["phone"], "000");
}

#[tokio::test]
async fn test_send_validation() {
    let f = fixture().await;

    let cases = [
        json!({"numbers": [], "message": "hi"}),
        json!({"numbers": ["  ", ""], "message": "hi"}),
        json!({"numbers": ["1"], "message": "   "}),
        json!({"message": "hi"}),
    ];
    for body in cases {
        let (status, json) = call(&f.app, json_request("POST", "/api/send", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
    }

    let req = Request::post("/api/send")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = call(&f.app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(f.store.outcome_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_send_respects_max_blast_size() {
    let f = fixture().await;
    let (status, _) = call(
        &f.app,
        json_request("POST", "/api/settings", json!({"maxBlastSize": "2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = call(
        &f.app,
        json_request("POST", "/api/send", json!({"numbers": ["1", "2", "3"], "message": "m"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("too many recipients"));
}

#[tokio::test]
async fn test_send_not_ready_is_503() {
    let f = fixture_with("", false, &[]).await;
    let (status, json) = call(
        &f.app,
        json_request("POST", "/api/send", json!({"numbers": ["1"], "message": "m"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["success"], false);
    assert_eq!(f.store.outcome_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_send_multipart_with_media() {
    let f = fixture().await;
    let boundary = "wablast-test-boundary";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"numbers\"\r\n\r\n\
         [\"6281\",\"6282\"]\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"message\"\r\n\r\n\
         \r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"media\"; filename=\"promo.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         PNGDATA\r\n\
         --{b}--\r\n",
        b = boundary
    );
    let req = Request::post("/api/send")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, json) = call(&f.app, req).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["summary"]["success"], 2);
    let media = json["results"][0]["media"].as_str().unwrap().to_string();
    assert!(media.ends_with(".png"));
    assert_eq!(json["results"][1]["media"], media.as_str());

    let sent = f.client.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(_, caption, m)| caption.is_empty() && m.is_some()));
}

#[test]
fn test_parse_numbers_formats() {
    assert_eq!(
        messages::parse_numbers(r#"["1","2"]"#),
        vec!["1".to_string(), "2".to_string()]
    );
    assert_eq!(
        messages::parse_numbers("0812, 0813\n0814;"),
        vec!["0812", "0813", "0814"]
    );
    assert!(messages::parse_numbers("").is_empty());
}

// -----------------------------------------------------------------------
// History
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_messages_history_and_purge() {
    let f = fixture().await;
    call(
        &f.app,
        json_request("POST", "/api/send", json!({"numbers": ["1", "2"], "message": "m"})),
    )
    .await;
    f.dispatcher.record_inbound("1@c.us", "balas").await;

    let (_, json) = call(&f.app, get("/api/messages")).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["messages"].as_array().unwrap().len(), 3);

    let (_, json) = call(&f.app, get("/api/messages?phone=1@c.us")).await;
    let thread = json["messages"].as_array().unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0]["direction"], "outgoing");
    assert_eq!(thread[1]["direction"], "incoming");
    assert_eq!(thread[1]["status"], "received");

    let (_, json) = call(&f.app, get("/api/messages/success-count")).await;
    assert_eq!(json["count"], 2);

    let (status, json) = call(
        &f.app,
        Request::delete("/api/messages").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"], 3);
    assert_eq!(f.store.outcome_count().await.unwrap(), 0);
}

// -----------------------------------------------------------------------
// Session
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_status_shows_qr_until_connected() {
    let f = fixture_with("", false, &[]).await;

    let (_, json) = call(&f.app, get("/api/status")).await;
    assert_eq!(json["connected"], false);
    assert!(json["qrCode"].is_null());

    let (status, _) = call(
        &f.app,
        json_request("POST", "/api/whatsapp/events", json!({"type": "qr", "qr": "2@xyz"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = call(&f.app, get("/api/status")).await;
    assert_eq!(json["qrCode"], "2@xyz");

    f.client.ready.store(true, Ordering::SeqCst);
    let (_, json) = call(&f.app, get("/api/status")).await;
    assert_eq!(json["connected"], true);
    assert!(json["qrCode"].is_null());
}

#[tokio::test]
async fn test_qr_png() {
    let f = fixture_with("", false, &[]).await;
    let resp = f.app.clone().oneshot(get("/api/status/qr.png")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    call(
        &f.app,
        json_request("POST", "/api/whatsapp/events", json!({"type": "qr", "qr": "2@xyz"})),
    )
    .await;

    let resp = f.app.clone().oneshot(get("/api/status/qr.png")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "image/png");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..4], &[0x89, 0x50, 0x4E, 0x47]);
}

#[tokio::test]
async fn test_unknown_event_rejected() {
    let f = fixture().await;
    let (status, _) = call(
        &f.app,
        json_request("POST", "/api/whatsapp/events", json!({"type": "typing"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout() {
    let f = fixture().await;
    let (status, json) = call(
        &f.app,
        Request::post("/api/logout").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(!f.client.ready.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_check_whatsapp() {
    let f = fixture_with("", true, &["000@c.us"]).await;
    let (status, json) = call(
        &f.app,
        json_request(
            "POST",
            "/api/check-whatsapp",
            json!({"numbers": ["6281", "000", "error"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results[0], json!({"number": "6281", "exists": true}));
    assert_eq!(results[1]["exists"], false);
    assert!(results[1].get("error").is_none());
    assert_eq!(results[2]["exists"], false);
    assert!(results[2]["error"].as_str().unwrap().contains("lookup failed"));
}

#[tokio::test]
async fn test_check_whatsapp_not_ready() {
    let f = fixture_with("", false, &[]).await;
    let (status, _) = call(
        &f.app,
        json_request("POST", "/api/check-whatsapp", json!({"numbers": ["1"]})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// -----------------------------------------------------------------------
// Contacts
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_contacts_crud() {
    let f = fixture().await;
    let (status, json) = call(
        &f.app,
        json_request(
            "POST",
            "/api/contacts",
            json!([
                {"name": "Budi", "phone": "0812"},
                {"name": "Sari", "phone": "0813"},
                {"name": "Dup", "phone": "0812"}
            ]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[2]["status"], "failed");

    let (_, json) = call(
        &f.app,
        json_request("POST", "/api/contacts", json!({"name": "Tono", "phone": "0814"})),
    )
    .await;
    assert_eq!(json["results"][0]["status"], "success");

    let (_, json) = call(&f.app, get("/api/contacts/count")).await;
    assert_eq!(json["count"], 3);

    let (_, json) = call(&f.app, get("/api/contacts")).await;
    let contacts = json["contacts"].as_array().unwrap();
    assert_eq!(contacts.len(), 3);
    let id = contacts[0]["id"].as_i64().unwrap();

    let del = |uri: String| Request::delete(uri).body(Body::empty()).unwrap();
    let (status, _) = call(&f.app, del(format!("/api/contacts/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&f.app, del(format!("/api/contacts/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = call(&f.app, del("/api/contacts".into())).await;
    assert_eq!(json["deleted"], 2);
}

#[tokio::test]
async fn test_contacts_import_keeps_valid_rows() {
    let f = fixture().await;
    let (status, json) = call(
        &f.app,
        json_request(
            "POST",
            "/api/contacts",
            json!([
                {"name": "A", "phone": 6281234567890u64},
                {"phone": "62811"},
                {"name": "B", "phone": "628555"}
            ]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    let results = json["results"].as_array().unwrap();
    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[0]["phone"], "6281234567890");
    assert_eq!(results[1]["status"], "failed");
    assert_eq!(results[2]["status"], "success");

    let (_, json) = call(&f.app, get("/api/contacts/count")).await;
    assert_eq!(json["count"], 2);
}

#[tokio::test]
async fn test_random_numbers() {
    let f = fixture().await;
    let (status, json) = call(&f.app, get("/api/numbers/random?count=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["numbers"].as_array().unwrap().len(), 5);

    for bad in ["/api/numbers/random?count=0", "/api/numbers/random?count=1001", "/api/numbers/random?count=abc"] {
        let (status, _) = call(&f.app, get(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
    }
}

// -----------------------------------------------------------------------
// Settings and login
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_settings_round_trip() {
    let f = fixture().await;
    let (_, json) = call(&f.app, get("/api/settings")).await;
    assert_eq!(json["settings"]["messageDelay"], 2);
    assert_eq!(json["settings"]["maxBlastSize"], 100);

    let (status, json) = call(
        &f.app,
        json_request(
            "POST",
            "/api/settings",
            json!({
                "defaultMessage": "Halo",
                "autoReply": true,
                "autoReplyMessage": "Terima kasih",
                "notificationSound": false,
                "messageDelay": "5",
                "maxBlastSize": "50"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["settings"]["messageDelay"], 5);
    assert_eq!(f.dispatcher.message_delay(), Duration::from_secs(5));

    let (_, json) = call(&f.app, get("/api/settings")).await;
    assert_eq!(json["settings"]["maxBlastSize"], 50);
    assert_eq!(json["settings"]["autoReply"], true);
    assert!(json["settings"].get("passwordHash").is_none());

    let (status, _) = call(
        &f.app,
        json_request("POST", "/api/settings", json!({"maxBlastSize": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_password_and_login() {
    let f = fixture().await;
    let (_, json) = call(&f.app, get("/api/settings/password")).await;
    assert_eq!(json["hasPassword"], false);

    let (status, _) = call(
        &f.app,
        json_request("POST", "/api/settings/password", json!({"newPassword": "rahasia"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = call(&f.app, get("/api/settings/password")).await;
    assert_eq!(json["hasPassword"], true);

    let (status, _) = call(
        &f.app,
        json_request("POST", "/api/login", json!({"password": "rahasia"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = call(
        &f.app,
        json_request("POST", "/api/login", json!({"password": "salah"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let (status, _) = call(
        &f.app,
        json_request(
            "POST",
            "/api/settings/password",
            json!({"currentPassword": "salah", "newPassword": "baru"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
