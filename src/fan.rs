use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::host::{
    AccessoryService, Characteristic, CharacteristicValue, ServiceKind, invalid_value,
};
use crate::level::{
    DirectionMapping, Intent, rotation_direction_code, rotation_direction_from_code, with_factor,
};
use crate::pod::Pod;
use crate::types::{Level, RotationDirection, Side};
use crate::{Error, Result};

const CHARACTERISTICS: &[Characteristic] = &[
    Characteristic::On,
    Characteristic::RotationSpeed,
    Characteristic::RotationDirection,
];

/// Fan presentation of one side: speed is the level's magnitude and the
/// rotation direction carries its sign, per the chosen [`DirectionMapping`].
pub struct Fan {
    pod: Arc<Pod>,
    side: Side,
    mapping: DirectionMapping,
    direction: Mutex<Intent<RotationDirection>>,
}

impl Fan {
    /// Clockwise heats, counter-clockwise cools.
    pub fn new(pod: Arc<Pod>, side: Side) -> Self {
        Self::with_mapping(pod, side, DirectionMapping::Sign)
    }

    /// Direction value used as `direction - 1`. See [`DirectionMapping::Toggle`].
    pub fn toggle(pod: Arc<Pod>, side: Side) -> Self {
        Self::with_mapping(pod, side, DirectionMapping::Toggle)
    }

    pub fn with_mapping(pod: Arc<Pod>, side: Side, mapping: DirectionMapping) -> Self {
        Self {
            pod,
            side,
            mapping,
            direction: Mutex::new(Intent::new(RotationDirection::Clockwise)),
        }
    }

    pub fn mapping(&self) -> DirectionMapping {
        self.mapping
    }

    fn observe(&self, level: Level) {
        self.direction.lock().confirm(self.mapping.direction_for(level));
    }

    fn factor(&self) -> i32 {
        self.mapping.factor(self.direction.lock().current())
    }

    pub async fn on(&self) -> Result<bool> {
        self.pod.is_on(self.side).await
    }

    pub async fn set_on(&self, on: bool) -> Result<bool> {
        if on {
            self.pod.turn_on(self.side).await?;
        } else {
            self.pod.turn_off(self.side).await?;
        }
        Ok(on)
    }

    pub async fn rotation_speed(&self) -> Result<i32> {
        let level = self.pod.level(self.side).await?;
        self.observe(level);
        Ok(level.magnitude())
    }

    pub async fn set_rotation_speed(&self, speed: f64) -> Result<i32> {
        let level = with_factor(Level::from_rotation_speed(speed), self.factor());
        debug!(side = %self.side, speed, level = level.value(), "rotation speed to level");
        self.pod.set_level(self.side, level).await?;
        Ok(level.magnitude())
    }

    /// Derived from the level sign when it has one, else the last requested
    /// direction.
    pub async fn rotation_direction(&self) -> Result<RotationDirection> {
        let level = self.pod.level(self.side).await?;
        self.observe(level);
        Ok(self.direction.lock().current())
    }

    /// Store the direction and push the level recomputed under it. The sign
    /// mapping makes no vendor call at level 0; the toggle mapping always
    /// pushes. A failed write rolls the direction back.
    pub async fn set_rotation_direction(&self, direction: RotationDirection) -> Result<RotationDirection> {
        let level = self.pod.level(self.side).await?;
        self.observe(level);
        let previous = self.direction.lock().desire(direction);

        if self.mapping == DirectionMapping::Sign && level.is_idle() {
            return Ok(direction);
        }
        let next = with_factor(level, self.mapping.factor(direction));

        debug!(side = %self.side, from = level.value(), to = next.value(), "direction changes level");
        if let Err(e) = self.pod.set_level(self.side, next).await {
            self.direction.lock().restore(previous);
            return Err(e);
        }
        Ok(direction)
    }
}

#[async_trait]
impl AccessoryService for Fan {
    fn service(&self) -> ServiceKind {
        ServiceKind::Fan
    }

    fn characteristics(&self) -> &'static [Characteristic] {
        CHARACTERISTICS
    }

    async fn get(&self, characteristic: Characteristic) -> Result<CharacteristicValue> {
        match characteristic {
            Characteristic::On => Ok(self.on().await?.into()),
            Characteristic::RotationSpeed => Ok(self.rotation_speed().await?.into()),
            Characteristic::RotationDirection => {
                Ok(rotation_direction_code(self.rotation_direction().await?).into())
            }
            other => Err(Error::UnsupportedCharacteristic(other)),
        }
    }

    async fn set(
        &self,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> Result<CharacteristicValue> {
        match characteristic {
            Characteristic::On => Ok(self.set_on(value.as_bool()).await?.into()),
            Characteristic::RotationSpeed => {
                Ok(self.set_rotation_speed(value.as_f64()).await?.into())
            }
            Characteristic::RotationDirection => {
                let direction = value
                    .as_i64()
                    .and_then(rotation_direction_from_code)
                    .ok_or_else(|| invalid_value(characteristic, value))?;
                let direction = self.set_rotation_direction(direction).await?;
                Ok(rotation_direction_code(direction).into())
            }
            other => Err(Error::UnsupportedCharacteristic(other)),
        }
    }
}
