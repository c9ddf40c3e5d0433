use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::client::DeviceApi;
use crate::coalesce::{Coalescer, Eviction};
use crate::protocol::{ambient_metrics_path, latest_room_temperature};
use crate::types::{DeviceStatus, Level, Side, SideStatus};
use crate::{Error, Result};

const AMBIENT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Command/query surface for one device. Concurrent status reads share one
/// vendor fetch, and rapid repeated writes collapse into one in-flight call
/// per key.
pub struct Pod {
    api: Arc<dyn DeviceApi>,
    device_id: Arc<str>,
    status: Coalescer<(), DeviceStatus>,
    on_off: Coalescer<Side, ()>,
    levels: Coalescer<(Side, Level), ()>,
    ambient: Coalescer<(), f64>,
}

impl Pod {
    pub fn new(api: Arc<dyn DeviceApi>, device_id: impl Into<Arc<str>>) -> Self {
        Self {
            api,
            device_id: device_id.into(),
            status: Coalescer::new("device_status"),
            on_off: Coalescer::new("on_off").with_eviction(Eviction::Latest),
            levels: Coalescer::new("set_level").with_eviction(Eviction::Latest),
            ambient: Coalescer::new("ambient").with_max_age(AMBIENT_MAX_AGE),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Whole-device status. Every side of the device shares this fetch.
    pub async fn device_status(&self) -> Result<DeviceStatus> {
        let api = self.api.clone();
        let device_id = self.device_id.clone();
        self.status
            .get_or_compute((), move || async move { api.device_status(&device_id).await })
            .await
    }

    pub async fn status(&self, side: Side) -> Result<SideStatus> {
        let device_status = self.device_status().await?;
        device_status.side(side).ok_or_else(|| Error::InvalidStatus {
            device_status: device_status.into_raw(),
            side,
        })
    }

    pub async fn is_on(&self, side: Side) -> Result<bool> {
        Ok(self.status(side).await?.is_on())
    }

    pub async fn level(&self, side: Side) -> Result<Level> {
        Ok(self.status(side).await?.level())
    }

    /// Shares the on/off cache with [`Pod::turn_off`]: a call for a side
    /// joins whatever on/off call is still in flight for that side.
    pub async fn turn_on(&self, side: Side) -> Result<()> {
        let api = self.api.clone();
        let device_id = self.device_id.clone();
        debug!(device_id = %self.device_id, side = %side, "turn on");
        self.on_off
            .get_or_compute(side, move || async move { api.set_side_on(&device_id, side).await })
            .await
    }

    pub async fn turn_off(&self, side: Side) -> Result<()> {
        let api = self.api.clone();
        let device_id = self.device_id.clone();
        debug!(device_id = %self.device_id, side = %side, "turn off");
        self.on_off
            .get_or_compute(side, move || async move { api.set_side_off(&device_id, side).await })
            .await
    }

    /// Only identical `(side, level)` requests coalesce; a different level
    /// starts a new call and stops tracking the previous one.
    pub async fn set_level(&self, side: Side, level: Level) -> Result<()> {
        let api = self.api.clone();
        let device_id = self.device_id.clone();
        debug!(device_id = %self.device_id, side = %side, level = level.value(), "set level");
        self.levels
            .get_or_compute((side, level), move || async move {
                api.set_side_level(&device_id, side, level).await
            })
            .await
    }

    /// Most recent room temperature over the last hour, 0 if there are no
    /// samples. Cached for an hour.
    pub async fn ambient_temperature(&self) -> Result<f64> {
        let api = self.api.clone();
        let device_id = self.device_id.clone();
        self.ambient
            .get_or_compute((), move || async move {
                let path = ambient_metrics_path(&device_id, Utc::now());
                let body = api.json(&path, 200).await?;
                Ok(latest_room_temperature(&body))
            })
            .await
    }
}

impl std::fmt::Debug for Pod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pod")
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}
