use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::host::{
    AccessoryService, Characteristic, CharacteristicValue, ServiceKind, invalid_value,
};
use crate::level::{HeaterCoolerState, Intent, heater_cooler_state, with_factor};
use crate::pod::Pod;
use crate::types::{HeatCoolMode, Level, Side};
use crate::{Error, Result};

const TARGET_AUTO: i64 = 0;
const TARGET_HEAT: i64 = 1;
const TARGET_COOL: i64 = 2;
const DISPLAY_CELSIUS: i64 = 0;

const CHARACTERISTICS: &[Characteristic] = &[
    Characteristic::Active,
    Characteristic::CurrentHeaterCoolerState,
    Characteristic::TargetHeaterCoolerState,
    Characteristic::CurrentTemperature,
    Characteristic::TargetTemperature,
    Characteristic::TemperatureDisplayUnits,
    Characteristic::RotationSpeed,
];

fn mode_code(mode: HeatCoolMode) -> i64 {
    match mode {
        HeatCoolMode::Heat => TARGET_HEAT,
        HeatCoolMode::Cool => TARGET_COOL,
    }
}

/// Heater/cooler presentation of one side. The level's magnitude is the
/// rotation speed; its sign comes from the heat/cool mode, which is kept
/// locally so an idle level does not lose it.
pub struct HeaterCooler {
    pod: Arc<Pod>,
    side: Side,
    mode: Mutex<Intent<HeatCoolMode>>,
}

impl HeaterCooler {
    pub fn new(pod: Arc<Pod>, side: Side) -> Self {
        Self {
            pod,
            side,
            mode: Mutex::new(Intent::new(HeatCoolMode::Heat)),
        }
    }

    pub fn mode(&self) -> HeatCoolMode {
        self.mode.lock().current()
    }

    fn observe(&self, level: Level) {
        self.mode.lock().confirm(HeatCoolMode::from_level(level));
    }

    pub async fn active(&self) -> Result<bool> {
        self.pod.is_on(self.side).await
    }

    pub async fn set_active(&self, on: bool) -> Result<bool> {
        if on {
            self.pod.turn_on(self.side).await?;
        } else {
            self.pod.turn_off(self.side).await?;
        }
        Ok(on)
    }

    pub async fn current_state(&self) -> Result<HeaterCoolerState> {
        let status = self.pod.status(self.side).await?;
        self.observe(status.level());
        Ok(heater_cooler_state(&status))
    }

    /// `None` while the side is off (reported to the host as auto).
    pub async fn target_state(&self) -> Result<Option<HeatCoolMode>> {
        let status = self.pod.status(self.side).await?;
        if !status.is_on() {
            return Ok(None);
        }
        self.observe(status.level());
        Ok(Some(self.mode()))
    }

    /// Switch heat/cool. `None` (auto) leaves the mode unchanged. The level
    /// is rewritten under the new sign only when that changes it; a failed
    /// write rolls the mode back.
    pub async fn set_target_state(&self, requested: Option<HeatCoolMode>) -> Result<HeatCoolMode> {
        let level = self.pod.level(self.side).await?;
        self.observe(level);

        let (previous, mode) = {
            let mut intent = self.mode.lock();
            let previous = requested.map(|m| intent.desire(m));
            (previous, intent.current())
        };

        let next = with_factor(level, mode.factor());
        if next == level {
            return Ok(mode);
        }

        debug!(side = %self.side, from = level.value(), to = next.value(), "mode changes level sign");
        if let Err(e) = self.pod.set_level(self.side, next).await {
            if let Some(previous) = previous {
                self.mode.lock().restore(previous);
            }
            return Err(e);
        }
        Ok(mode)
    }

    pub async fn rotation_speed(&self) -> Result<i32> {
        let level = self.pod.level(self.side).await?;
        self.observe(level);
        Ok(level.magnitude())
    }

    pub async fn set_rotation_speed(&self, speed: f64) -> Result<i32> {
        let level = with_factor(Level::from_rotation_speed(speed), self.mode().factor());
        debug!(side = %self.side, speed, level = level.value(), "rotation speed to level");
        self.pod.set_level(self.side, level).await?;
        Ok(level.magnitude())
    }

    pub async fn current_temperature(&self) -> Result<f64> {
        self.pod.ambient_temperature().await
    }
}

#[async_trait]
impl AccessoryService for HeaterCooler {
    fn service(&self) -> ServiceKind {
        ServiceKind::HeaterCooler
    }

    fn characteristics(&self) -> &'static [Characteristic] {
        CHARACTERISTICS
    }

    async fn get(&self, characteristic: Characteristic) -> Result<CharacteristicValue> {
        match characteristic {
            Characteristic::Active => Ok(i64::from(self.active().await?).into()),
            Characteristic::CurrentHeaterCoolerState => {
                Ok(self.current_state().await?.as_homekit().into())
            }
            Characteristic::TargetHeaterCoolerState => {
                let code = self.target_state().await?.map_or(TARGET_AUTO, mode_code);
                Ok(code.into())
            }
            Characteristic::CurrentTemperature => Ok(self.current_temperature().await?.into()),
            Characteristic::TargetTemperature | Characteristic::RotationSpeed => {
                Ok(self.rotation_speed().await?.into())
            }
            Characteristic::TemperatureDisplayUnits => Ok(DISPLAY_CELSIUS.into()),
            other => Err(Error::UnsupportedCharacteristic(other)),
        }
    }

    async fn set(
        &self,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> Result<CharacteristicValue> {
        match characteristic {
            Characteristic::Active => {
                let on = self.set_active(value.as_bool()).await?;
                Ok(i64::from(on).into())
            }
            Characteristic::TargetHeaterCoolerState => {
                let requested = match value.as_i64() {
                    Some(TARGET_AUTO) => None,
                    Some(TARGET_HEAT) => Some(HeatCoolMode::Heat),
                    Some(TARGET_COOL) => Some(HeatCoolMode::Cool),
                    _ => return Err(invalid_value(characteristic, value)),
                };
                Ok(mode_code(self.set_target_state(requested).await?).into())
            }
            Characteristic::RotationSpeed => {
                Ok(self.set_rotation_speed(value.as_f64()).await?.into())
            }
            other => Err(Error::UnsupportedCharacteristic(other)),
        }
    }
}
