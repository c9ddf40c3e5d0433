use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::{DeviceApi, EightSleepClient, EightSleepClientBuilder, OAuthClient, Session};
use crate::fan::Fan;
use crate::heater_cooler::HeaterCooler;
use crate::host::{AccessoryService, Characteristic, CharacteristicValue, handle_get, handle_set};
use crate::pod::Pod;
use crate::types::{DeviceInfo, Side};
use crate::{Error, Result};

pub const MANUFACTURER: &str = "Eightsleep";
const UNKNOWN: &str = "unknown";

/// Namespace for accessory ids, so the same device side always maps to the
/// same id across restarts.
const ACCESSORY_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_83c2_5e0d_4b7a_9c61_2f8e_0d34_b7a5);

/// Which service an accessory exposes. Each accessory uses exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Presentation {
    #[default]
    HeaterCooler,
    ToggleFan,
    Fan,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OAuthClientConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

/// Plugin configuration as written by the user in the host config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub oauth_client: Option<OAuthClientConfig>,
    #[serde(default)]
    pub presentation: Presentation,
}

impl PlatformConfig {
    /// The configured oauth client. Both id and secret are required once
    /// either is given.
    pub fn oauth_client(&self) -> Result<Option<OAuthClient>> {
        let Some(config) = self.oauth_client.as_ref() else {
            return Ok(None);
        };
        match (&config.id, &config.secret) {
            (Some(id), Some(secret)) => Ok(Some(OAuthClient {
                id: id.clone(),
                secret: secret.clone(),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(Error::InvalidConfig("oauthClient.secret is missing".into())),
            (None, Some(_)) => Err(Error::InvalidConfig("oauthClient.id is missing".into())),
        }
    }

    /// Whether `session` was created for these credentials. Oauth fields
    /// are only compared when configured.
    pub fn matches(&self, session: &Session) -> bool {
        let oauth = self.oauth_client.as_ref();
        let cached = session.oauth_client.as_ref();
        let id_ok = match oauth.and_then(|o| o.id.as_ref()) {
            Some(id) => cached.is_some_and(|c| &c.id == id),
            None => true,
        };
        let secret_ok = match oauth.and_then(|o| o.secret.as_ref()) {
            Some(secret) => cached.is_some_and(|c| &c.secret == secret),
            None => true,
        };
        self.email == session.email && self.password == session.password && id_ok && secret_ok
    }
}

/// Reuse a persisted session when it belongs to the configured account,
/// otherwise start a fresh one.
pub fn resolve_session(config: &PlatformConfig, cached: Option<&Session>) -> Result<Session> {
    let oauth_client = config.oauth_client()?;
    match cached {
        Some(session) if config.matches(session) => {
            debug!(email = %session.email, "reusing cached session");
            Ok(session.clone())
        }
        _ => Ok(Session::new(&config.email, &config.password).with_oauth_client(oauth_client)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryLayout {
    pub id: Uuid,
    pub side: Side,
    pub display_name: String,
}

pub fn accessory_id(key: &str) -> Uuid {
    Uuid::new_v5(&ACCESSORY_NAMESPACE, key.as_bytes())
}

/// One accessory per side of a split bed, else one for the whole bed.
pub fn accessory_layout(device: &DeviceInfo) -> Vec<AccessoryLayout> {
    let id = &device.device_id;
    let sides: &[(&str, Side, &str)] = if device.is_split() {
        &[("left", Side::Left, "Pod Left"), ("right", Side::Right, "Pod Right")]
    } else {
        &[("both", Side::Solo, "Pod")]
    };
    sides
        .iter()
        .map(|(suffix, side, name)| AccessoryLayout {
            id: accessory_id(&format!("{id}:{suffix}")),
            side: *side,
            display_name: name.to_string(),
        })
        .collect()
}

/// Everything persisted with an accessory to rebuild it after a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryContext {
    #[serde(rename = "clientApiJSON", alias = "apiClientJSON")]
    pub session: Session,
    pub device: DeviceInfo,
    pub display_name: String,
    #[serde(default)]
    pub side: Side,
    #[serde(default)]
    pub presentation: Presentation,
}

impl AccessoryContext {
    pub fn client_builder(&self) -> EightSleepClientBuilder {
        EightSleepClient::builder(self.session.clone())
    }

    /// Fresh client, pod, and service from persisted state.
    pub fn rehydrate(&self) -> Result<Accessory> {
        let client = self.client_builder().build()?;
        Ok(Accessory::new(self, Arc::new(client)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInformation {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
}

impl AccessoryInformation {
    pub fn from_device(device: &DeviceInfo) -> Self {
        let info = device.sensor_info.as_ref();
        Self {
            manufacturer: MANUFACTURER.to_string(),
            model: info
                .and_then(|i| i.sku_name.clone())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            serial_number: info
                .and_then(|i| i.serial_number.clone())
                .unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

/// A live accessory: its pod controller and the one service it exposes.
pub struct Accessory {
    pub display_name: String,
    pub side: Side,
    pub information: AccessoryInformation,
    pod: Arc<Pod>,
    service: Box<dyn AccessoryService>,
}

impl Accessory {
    pub fn new(context: &AccessoryContext, api: Arc<dyn DeviceApi>) -> Self {
        let pod = Arc::new(Pod::new(api, context.device.device_id.as_str()));
        let side = context.side;
        let service: Box<dyn AccessoryService> = match context.presentation {
            Presentation::HeaterCooler => Box::new(HeaterCooler::new(pod.clone(), side)),
            Presentation::ToggleFan => Box::new(Fan::toggle(pod.clone(), side)),
            Presentation::Fan => Box::new(Fan::new(pod.clone(), side)),
        };
        Self {
            display_name: context.display_name.clone(),
            side,
            information: AccessoryInformation::from_device(&context.device),
            pod,
            service,
        }
    }

    pub fn pod(&self) -> &Arc<Pod> {
        &self.pod
    }

    pub fn service(&self) -> &dyn AccessoryService {
        self.service.as_ref()
    }

    pub async fn get<F>(&self, characteristic: Characteristic, done: F)
    where
        F: FnOnce(Result<CharacteristicValue>),
    {
        handle_get(self.service(), characteristic, done).await;
    }

    pub async fn set<F>(&self, characteristic: Characteristic, value: CharacteristicValue, done: F)
    where
        F: FnOnce(Result<CharacteristicValue>),
    {
        handle_set(self.service(), characteristic, value, done).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAccessory {
    pub id: Uuid,
    pub context: AccessoryContext,
}

/// What to do with the host's accessories after discovery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessoryPlan {
    /// Not known to the host yet.
    pub register: Vec<PlannedAccessory>,
    /// Already cached by the host; context refreshed.
    pub restore: Vec<PlannedAccessory>,
    /// Cached ids no discovered device accounts for.
    pub unregister: Vec<Uuid>,
}

pub fn plan_accessories(
    session: &Session,
    devices: &[DeviceInfo],
    cached: &[Uuid],
    presentation: Presentation,
) -> AccessoryPlan {
    let cached_ids: HashSet<Uuid> = cached.iter().copied().collect();
    let mut seen = HashSet::new();
    let mut plan = AccessoryPlan::default();

    for device in devices {
        for layout in accessory_layout(device) {
            seen.insert(layout.id);
            let planned = PlannedAccessory {
                id: layout.id,
                context: AccessoryContext {
                    session: session.clone(),
                    device: device.clone(),
                    display_name: layout.display_name.clone(),
                    side: layout.side,
                    presentation,
                },
            };
            if cached_ids.contains(&layout.id) {
                info!(name = %layout.display_name, "restoring existing accessory");
                plan.restore.push(planned);
            } else {
                info!(name = %layout.display_name, "adding new accessory");
                plan.register.push(planned);
            }
        }
    }

    plan.unregister = cached.iter().copied().filter(|id| !seen.contains(id)).collect();
    plan
}
