//! Conversions between the device's signed level and the unsigned
//! magnitude plus mode/direction the accessory services expose.
//!
//! Everything here is stateless except [`Intent`], which is plain data the
//! presentations keep behind their own lock.

use crate::types::{Level, RotationDirection, SideStatus};

/// HomeKit `CurrentHeaterCoolerState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterCoolerState {
    Inactive,
    Idle,
    Heating,
    Cooling,
}

impl HeaterCoolerState {
    pub fn as_homekit(&self) -> i64 {
        match self {
            HeaterCoolerState::Inactive => 0,
            HeaterCoolerState::Idle => 1,
            HeaterCoolerState::Heating => 2,
            HeaterCoolerState::Cooling => 3,
        }
    }
}

/// Activity `off` wins over any level; otherwise the level's sign decides.
pub fn heater_cooler_state(status: &SideStatus) -> HeaterCoolerState {
    if !status.is_on() {
        return HeaterCoolerState::Inactive;
    }
    match status.level().signum() {
        0 => HeaterCoolerState::Idle,
        1 => HeaterCoolerState::Heating,
        _ => HeaterCoolerState::Cooling,
    }
}

/// Keep the magnitude of `level` and replace its sign with `factor`.
pub fn with_factor(level: Level, factor: i32) -> Level {
    Level::new(level.magnitude() * factor)
}

/// How a fan service's rotation direction maps onto the level sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionMapping {
    /// Clockwise heats, counter-clockwise cools.
    Sign,
    /// Factor is `direction - 1` on the HomeKit value: clockwise (0) cools
    /// and counter-clockwise (1) always forces the level to zero. Known
    /// issue kept as deployed; needs product clarification.
    Toggle,
}

impl DirectionMapping {
    pub fn factor(&self, direction: RotationDirection) -> i32 {
        match self {
            DirectionMapping::Sign => direction.factor(),
            DirectionMapping::Toggle => rotation_direction_code(direction) as i32 - 1,
        }
    }

    /// The direction a level implies, if the level carries one.
    pub fn direction_for(&self, level: Level) -> Option<RotationDirection> {
        match self {
            DirectionMapping::Sign => RotationDirection::from_level(level),
            DirectionMapping::Toggle if level.signum() < 0 => Some(RotationDirection::Clockwise),
            DirectionMapping::Toggle => None,
        }
    }
}

pub fn rotation_direction_code(direction: RotationDirection) -> i64 {
    match direction {
        RotationDirection::Clockwise => 0,
        RotationDirection::CounterClockwise => 1,
    }
}

pub fn rotation_direction_from_code(code: i64) -> Option<RotationDirection> {
    match code {
        0 => Some(RotationDirection::Clockwise),
        1 => Some(RotationDirection::CounterClockwise),
        _ => None,
    }
}

/// Locally requested value next to the value last confirmed by a status
/// poll. A confirmation always wins and discards the pending request;
/// polls that carry no information (idle level) leave both alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent<T> {
    desired: Option<T>,
    confirmed: Option<T>,
    default: T,
}

impl<T: Copy> Intent<T> {
    pub fn new(default: T) -> Self {
        Self {
            desired: None,
            confirmed: None,
            default,
        }
    }

    pub fn current(&self) -> T {
        self.desired.or(self.confirmed).unwrap_or(self.default)
    }

    /// Record a request, returning the previous request for [`Intent::restore`].
    pub fn desire(&mut self, value: T) -> Option<T> {
        self.desired.replace(value)
    }

    pub fn restore(&mut self, previous: Option<T>) {
        self.desired = previous;
    }

    pub fn confirm(&mut self, observed: Option<T>) {
        if let Some(value) = observed {
            self.confirmed = Some(value);
            self.desired = None;
        }
    }
}
