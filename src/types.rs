use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Granularity of a level, matching the host's rotation-speed step.
pub const LEVEL_STEP: i32 = 10;
pub const LEVEL_MAX: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    #[default]
    Solo,
}

impl Side {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Solo => "solo",
        }
    }

    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            "solo" => Some(Side::Solo),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// What a side is doing. Only `Off` means the side is off; the target level
/// may still hold a stale nonzero value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Activity {
    Off,
    Heating,
    Cooling,
    Other(String),
}

impl Activity {
    pub fn as_api_str(&self) -> &str {
        match self {
            Activity::Off => "off",
            Activity::Heating => "heating",
            Activity::Cooling => "cooling",
            Activity::Other(s) => s,
        }
    }

    pub fn from_api_str(s: &str) -> Self {
        match s {
            "off" => Activity::Off,
            "heating" => Activity::Heating,
            "cooling" => Activity::Cooling,
            other => Activity::Other(other.to_string()),
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self, Activity::Off)
    }
}

impl From<String> for Activity {
    fn from(s: String) -> Self {
        Activity::from_api_str(&s)
    }
}

impl From<Activity> for String {
    fn from(a: Activity) -> Self {
        a.as_api_str().to_string()
    }
}

/// Signed target level. Positive heats, negative cools, the magnitude is the
/// intensity in steps of [`LEVEL_STEP`]. Values are not validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level(i32);

impl Level {
    pub const IDLE: Level = Level(0);

    pub fn new(value: i32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn magnitude(&self) -> i32 {
        self.0.abs()
    }

    pub fn is_idle(&self) -> bool {
        self.0 == 0
    }

    pub fn signum(&self) -> i32 {
        self.0.signum()
    }

    /// Round an unsigned rotation speed (0..=100) to the nearest step.
    pub fn from_rotation_speed(speed: f64) -> Self {
        let steps = (speed / f64::from(LEVEL_STEP)).round() as i32;
        Self((steps * LEVEL_STEP).clamp(0, LEVEL_MAX))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideStatus {
    pub current_activity: Activity,
    #[serde(default)]
    pub current_target_level: Option<Level>,
}

impl SideStatus {
    pub fn is_on(&self) -> bool {
        !self.current_activity.is_off()
    }

    pub fn level(&self) -> Level {
        self.current_target_level.unwrap_or_default()
    }
}

/// Whole-device status as returned by the vendor, keyed by side name.
/// Kept raw so a malformed body can travel with the error that rejects it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceStatus(Value);

impl DeviceStatus {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn side(&self, side: Side) -> Option<SideStatus> {
        let entry = self.0.get(side.as_api_str())?;
        serde_json::from_value(entry.clone()).ok()
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn into_raw(self) -> Value {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeatCoolMode {
    #[default]
    Heat,
    Cool,
}

impl HeatCoolMode {
    pub fn factor(&self) -> i32 {
        match self {
            HeatCoolMode::Heat => 1,
            HeatCoolMode::Cool => -1,
        }
    }

    /// The mode a nonzero level implies; `None` for idle.
    pub fn from_level(level: Level) -> Option<Self> {
        match level.signum() {
            1 => Some(HeatCoolMode::Heat),
            -1 => Some(HeatCoolMode::Cool),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationDirection {
    #[default]
    Clockwise,
    CounterClockwise,
}

impl RotationDirection {
    pub fn factor(&self) -> i32 {
        match self {
            RotationDirection::Clockwise => 1,
            RotationDirection::CounterClockwise => -1,
        }
    }

    pub fn from_level(level: Level) -> Option<Self> {
        match level.signum() {
            1 => Some(RotationDirection::Clockwise),
            -1 => Some(RotationDirection::CounterClockwise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorInfo {
    #[serde(default)]
    pub sku_name: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
}

/// Device record as discovered, stored in accessory context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    #[serde(default)]
    pub left_user_id: Option<String>,
    #[serde(default)]
    pub right_user_id: Option<String>,
    #[serde(default)]
    pub sensor_info: Option<SensorInfo>,
}

impl DeviceInfo {
    pub fn is_split(&self) -> bool {
        self.left_user_id != self.right_user_id
    }
}
