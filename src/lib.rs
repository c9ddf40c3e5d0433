mod client;
mod coalesce;
mod diff;
mod error;
mod fan;
mod heater_cooler;
mod host;
mod level;
mod logger;
mod platform;
mod pod;
mod protocol;
mod types;

pub use client::{DeviceApi, EightSleepClient, EightSleepClientBuilder, OAuthClient, Session};
pub use coalesce::{Coalescer, Eviction};
pub use error::{Error, Result};
pub use fan::Fan;
pub use heater_cooler::HeaterCooler;
pub use host::{
    AccessoryService, Characteristic, CharacteristicValue, ServiceKind, handle_get, handle_set,
};
pub use level::{DirectionMapping, HeaterCoolerState, Intent, heater_cooler_state, with_factor};
pub use logger::MessageLogMode;
pub use platform::{
    Accessory, AccessoryContext, AccessoryInformation, AccessoryLayout, AccessoryPlan,
    OAuthClientConfig, PlannedAccessory, PlatformConfig, Presentation, accessory_id,
    accessory_layout, plan_accessories, resolve_session,
};
pub use pod::Pod;
pub use protocol::DEFAULT_BASE_URL;
pub use types::*;
