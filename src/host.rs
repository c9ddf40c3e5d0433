use std::fmt;

use async_trait::async_trait;
use tracing::{error, info};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    Active,
    CurrentHeaterCoolerState,
    TargetHeaterCoolerState,
    CurrentTemperature,
    TargetTemperature,
    TemperatureDisplayUnits,
    RotationSpeed,
    RotationDirection,
    On,
}

impl Characteristic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Characteristic::Active => "Active",
            Characteristic::CurrentHeaterCoolerState => "CurrentHeaterCoolerState",
            Characteristic::TargetHeaterCoolerState => "TargetHeaterCoolerState",
            Characteristic::CurrentTemperature => "CurrentTemperature",
            Characteristic::TargetTemperature => "TargetTemperature",
            Characteristic::TemperatureDisplayUnits => "TemperatureDisplayUnits",
            Characteristic::RotationSpeed => "RotationSpeed",
            Characteristic::RotationDirection => "RotationDirection",
            Characteristic::On => "On",
        }
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value as carried by the host for a characteristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CharacteristicValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl CharacteristicValue {
    /// Nonzero numbers count as true.
    pub fn as_bool(&self) -> bool {
        match *self {
            CharacteristicValue::Bool(b) => b,
            CharacteristicValue::Int(i) => i != 0,
            CharacteristicValue::Float(f) => f != 0.0,
        }
    }

    /// Integral value, if this is one.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            CharacteristicValue::Bool(b) => Some(i64::from(b)),
            CharacteristicValue::Int(i) => Some(i),
            CharacteristicValue::Float(f) if f.fract() == 0.0 => Some(f as i64),
            CharacteristicValue::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            CharacteristicValue::Bool(b) => f64::from(u8::from(b)),
            CharacteristicValue::Int(i) => i as f64,
            CharacteristicValue::Float(f) => f,
        }
    }
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacteristicValue::Bool(b) => write!(f, "{b}"),
            CharacteristicValue::Int(i) => write!(f, "{i}"),
            CharacteristicValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for CharacteristicValue {
    fn from(b: bool) -> Self {
        CharacteristicValue::Bool(b)
    }
}

impl From<i64> for CharacteristicValue {
    fn from(i: i64) -> Self {
        CharacteristicValue::Int(i)
    }
}

impl From<i32> for CharacteristicValue {
    fn from(i: i32) -> Self {
        CharacteristicValue::Int(i64::from(i))
    }
}

impl From<f64> for CharacteristicValue {
    fn from(f: f64) -> Self {
        CharacteristicValue::Float(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    HeaterCooler,
    Fan,
}

/// One accessory service whose characteristics the host reads and writes.
#[async_trait]
pub trait AccessoryService: Send + Sync {
    fn service(&self) -> ServiceKind;

    fn characteristics(&self) -> &'static [Characteristic];

    async fn get(&self, characteristic: Characteristic) -> Result<CharacteristicValue>;

    /// Returns the value the host should now show.
    async fn set(
        &self,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> Result<CharacteristicValue>;
}

pub(crate) fn invalid_value(characteristic: Characteristic, value: CharacteristicValue) -> Error {
    Error::InvalidValue {
        characteristic,
        value: value.to_string(),
    }
}

/// Serve a host read, finishing through `done` whether or not it failed.
pub async fn handle_get<F>(service: &dyn AccessoryService, characteristic: Characteristic, done: F)
where
    F: FnOnce(Result<CharacteristicValue>),
{
    info!(%characteristic, "get");
    let result = service.get(characteristic).await;
    match result {
        Ok(ref value) => info!(%characteristic, %value, "get ->"),
        Err(ref e) => error!(%characteristic, error = %e, "get failed"),
    }
    done(result);
}

/// Serve a host write, finishing through `done` whether or not it failed.
pub async fn handle_set<F>(
    service: &dyn AccessoryService,
    characteristic: Characteristic,
    value: CharacteristicValue,
    done: F,
) where
    F: FnOnce(Result<CharacteristicValue>),
{
    info!(%characteristic, %value, "set");
    let result = service.set(characteristic, value).await;
    match result {
        Ok(ref shown) => info!(%characteristic, value = %shown, "set ->"),
        Err(ref e) => error!(%characteristic, error = %e, "set failed"),
    }
    done(result);
}
