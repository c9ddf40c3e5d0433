#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use eightsleep_pod::{DeviceApi, DeviceStatus, Error, Level, Result, Side};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

const OPEN_PERMITS: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Status,
    On(Side),
    Off(Side),
    Level(Side, Level),
    Json(String),
}

/// In-memory vendor backend. Writes are applied to the stored status so a
/// later poll sees them. A held fake parks every call until `release`.
pub struct FakeApi {
    status: Mutex<Value>,
    metrics: Mutex<Value>,
    calls: Mutex<Vec<Call>>,
    gate: Semaphore,
    fail_all: Mutex<Option<Error>>,
    fail_writes: Mutex<Option<Error>>,
}

impl FakeApi {
    pub fn new(status: Value) -> Arc<Self> {
        Arc::new(Self::with_permits(status, OPEN_PERMITS))
    }

    pub fn held(status: Value) -> Arc<Self> {
        Arc::new(Self::with_permits(status, 0))
    }

    fn with_permits(status: Value, permits: usize) -> Self {
        Self {
            status: Mutex::new(status),
            metrics: Mutex::new(json!({})),
            calls: Mutex::new(Vec::new()),
            gate: Semaphore::new(permits),
            fail_all: Mutex::new(None),
            fail_writes: Mutex::new(None),
        }
    }

    pub fn release(&self) {
        self.gate.add_permits(OPEN_PERMITS);
    }

    pub fn set_status(&self, status: Value) {
        *self.status.lock() = status;
    }

    pub fn set_metrics(&self, metrics: Value) {
        *self.metrics.lock() = metrics;
    }

    pub fn fail_all(&self, error: Option<Error>) {
        *self.fail_all.lock() = error;
    }

    pub fn fail_writes(&self, error: Option<Error>) {
        *self.fail_writes.lock() = error;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|c| !matches!(c, Call::Status | Call::Json(_)))
            .cloned()
            .collect()
    }

    async fn enter(&self, call: Call) -> Result<()> {
        let write = !matches!(call, Call::Status | Call::Json(_));
        self.calls.lock().push(call);
        let _permit = self.gate.acquire().await.expect("gate closed");
        if let Some(e) = self.fail_all.lock().clone() {
            return Err(e);
        }
        if write && let Some(e) = self.fail_writes.lock().clone() {
            return Err(e);
        }
        Ok(())
    }

    fn update_side(&self, side: Side, f: impl FnOnce(&mut serde_json::Map<String, Value>)) {
        let mut status = self.status.lock();
        if let Some(Value::Object(entry)) = status.get_mut(side.as_api_str()) {
            f(entry);
        }
    }
}

#[async_trait]
impl DeviceApi for FakeApi {
    async fn device_status(&self, _device_id: &str) -> Result<DeviceStatus> {
        self.enter(Call::Status).await?;
        Ok(DeviceStatus::new(self.status.lock().clone()))
    }

    async fn set_side_on(&self, _device_id: &str, side: Side) -> Result<()> {
        self.enter(Call::On(side)).await?;
        self.update_side(side, |entry| {
            let cooling = entry
                .get("currentTargetLevel")
                .and_then(|v| v.as_i64())
                .is_some_and(|l| l < 0);
            let activity = if cooling { "cooling" } else { "heating" };
            entry.insert("currentActivity".into(), json!(activity));
        });
        Ok(())
    }

    async fn set_side_off(&self, _device_id: &str, side: Side) -> Result<()> {
        self.enter(Call::Off(side)).await?;
        self.update_side(side, |entry| {
            entry.insert("currentActivity".into(), json!("off"));
        });
        Ok(())
    }

    async fn set_side_level(&self, _device_id: &str, side: Side, level: Level) -> Result<()> {
        self.enter(Call::Level(side, level)).await?;
        self.update_side(side, |entry| {
            entry.insert("currentTargetLevel".into(), json!(level.value()));
        });
        Ok(())
    }

    async fn json(&self, path: &str, _expected_status: u16) -> Result<Value> {
        self.enter(Call::Json(path.to_string())).await?;
        Ok(self.metrics.lock().clone())
    }
}

pub fn side_status(activity: &str, level: i32) -> Value {
    json!({ "currentActivity": activity, "currentTargetLevel": level })
}

pub fn solo(activity: &str, level: i32) -> Value {
    json!({ "solo": side_status(activity, level) })
}

pub fn split(left: (&str, i32), right: (&str, i32)) -> Value {
    json!({
        "left": side_status(left.0, left.1),
        "right": side_status(right.0, right.1),
    })
}

pub fn room_temperature(values: &[f64]) -> Value {
    let samples: Vec<Value> = values.iter().map(|v| json!({ "value": v })).collect();
    json!({ "metrics": { "roomTemperature": { "timeseries": samples } } })
}

pub fn server_error() -> Error {
    Error::UnexpectedStatus {
        path: "v1/devices/dev-1/status".to_string(),
        status: 503,
        expected: 200,
    }
}

/// Let every future in the surrounding `join!` start, then open the gate.
pub async fn release_after_yield(api: &FakeApi) {
    tokio::task::yield_now().await;
    api.release();
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
