use chrono::{Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct RankSummary {
    id: String,
    level: u8,
}

#[derive(Debug, Deserialize)]
struct HabitView {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RankView {
    current_days: u32,
    current_rank: RankSummary,
    goal_days: u32,
    percentage: f64,
    remaining_resets: u32,
    habit: HabitView,
}

#[derive(Debug, Deserialize)]
struct SwitchHabitResponse {
    had_previous_progress: bool,
    profile: RankView,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_path(name: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("opidas_http_{}_{}_{name}", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/ranks")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_opidas"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", unique_path("state.json"))
        .env("APP_HISTORY_PATH", unique_path("history.jsonl"))
        .env("OPIDAS_RESET_POLICY", "decrement")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

fn unique_user(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{nanos}")
}

async fn onboard(client: &Client, server: &TestServer, user_id: &str, days_ago: i64) -> reqwest::Response {
    // Slightly under `days_ago` days so the rounded-up count lands on it exactly.
    let relapse = Utc::now() - ChronoDuration::days(days_ago) + ChronoDuration::hours(1);
    client
        .post(format!("{}/api/profiles", server.base_url))
        .json(&json!({
            "user_id": user_id,
            "first_name": "Ana",
            "last_name": "Rodriguez",
            "habit": "fumar",
            "last_relapse_at": relapse.to_rfc3339(),
        }))
        .send()
        .await
        .unwrap()
}

async fn profile(client: &Client, server: &TestServer, user_id: &str) -> RankView {
    client
        .get(format!("{}/api/profiles/{user_id}", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_onboarding_reports_rank_progress() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let user_id = unique_user("onboard");

    let response = onboard(&client, &server, &user_id, 7).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let view = profile(&client, &server, &user_id).await;
    assert_eq!(view.current_days, 7);
    assert_eq!(view.current_rank.id, "recruta");
    assert_eq!(view.goal_days, 10);
    assert!((view.percentage - 70.0).abs() < 1e-9);
    assert_eq!(view.remaining_resets, 5);

    let again = onboard(&client, &server, &user_id, 7).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn http_future_relapse_is_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let user_id = unique_user("future");

    let response = onboard(&client, &server, &user_id, -3).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_relapse_date");

    let missing = client
        .get(format!("{}/api/profiles/{user_id}", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_reset_spends_tokens_until_exhausted() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let user_id = unique_user("reset");
    onboard(&client, &server, &user_id, 45).await;

    for expected in (0..5).rev() {
        let view: RankView = client
            .post(format!("{}/api/profiles/{user_id}/reset", server.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view.current_days, 0);
        assert_eq!(view.current_rank.level, 0);
        assert_eq!(view.remaining_resets, expected);
    }

    let exhausted = client
        .post(format!("{}/api/profiles/{user_id}/reset", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(exhausted.status(), StatusCode::CONFLICT);
    let body: Value = exhausted.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_resets");
}

#[tokio::test]
async fn http_switch_habit_round_trip_keeps_progress() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let user_id = unique_user("switch");
    onboard(&client, &server, &user_id, 20).await;

    let switch = |habit: &'static str| {
        let client = client.clone();
        let url = format!("{}/api/profiles/{user_id}/habit", server.base_url);
        async move {
            client
                .post(url)
                .json(&json!({ "habit": habit }))
                .send()
                .await
                .unwrap()
        }
    };

    let away: SwitchHabitResponse = switch("bebida").await.json().await.unwrap();
    assert!(!away.had_previous_progress);
    assert_eq!(away.profile.habit.id, "bebida");
    assert_eq!(away.profile.current_days, 0);

    let back: SwitchHabitResponse = switch("fumar").await.json().await.unwrap();
    assert!(back.had_previous_progress);
    assert_eq!(back.profile.current_days, 20);
    assert_eq!(back.profile.current_rank.id, "soldado");

    let unknown = switch("xadrez").await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_ladder_and_episodes() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let user_id = unique_user("ladder");
    onboard(&client, &server, &user_id, 30).await;

    let ladder: Vec<Value> = client
        .get(format!("{}/api/profiles/{user_id}/ranks", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let unlocked: Vec<&str> = ladder
        .iter()
        .filter(|entry| entry["locked"] == false)
        .filter_map(|entry| entry["id"].as_str())
        .collect();
    assert_eq!(unlocked, vec!["cabo", "soldado", "recruta"]);

    let progress: Value = client
        .put(format!("{}/api/profiles/{user_id}/episodes/2", server.base_url))
        .json(&json!({ "progress": 150.0 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(progress["2"], 100.0);

    let access: Value = client
        .get(format!("{}/api/profiles/{user_id}/access", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(access["granted"], true);
    assert_eq!(access["reason"], "granted");
}
