use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{RwLock, broadcast};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::geo::client::{Geocoder, NominatimGeocoder, Offline, OsrmRouter, RouteDistance};
use crate::models::location::{DriverLocation, TrackingUpdate};
use crate::models::merchant::Merchant;
use crate::models::message::Message;
use crate::models::order::Order;
use crate::models::product::Product;
use crate::models::user::{Role, User};
use crate::models::zone::DeliveryZone;
use crate::notify::ChannelSender;
use crate::notify::placeholder::{EmailSender, SmsSender};
use crate::notify::push::HttpPushSender;
use crate::observability::metrics::Metrics;

/// External integrations, injected so tests can substitute stubs.
#[derive(Clone)]
pub struct Services {
    pub geocoder: Arc<dyn Geocoder>,
    pub routing: Arc<dyn RouteDistance>,
    pub senders: Vec<Arc<dyn ChannelSender>>,
}

impl Services {
    pub fn from_config(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.http_timeout_secs);

        Self {
            geocoder: Arc::new(NominatimGeocoder::new(config.geocoder_url.clone(), timeout)),
            routing: Arc::new(OsrmRouter::new(config.routing_url.clone(), timeout)),
            senders: vec![
                Arc::new(HttpPushSender::new(
                    config.push_url.clone(),
                    config.push_api_key.clone(),
                    timeout,
                )),
                Arc::new(SmsSender),
                Arc::new(EmailSender),
            ],
        }
    }

    /// Geo lookups always fail and push is unconfigured; SMS and email log only.
    pub fn offline() -> Self {
        Self {
            geocoder: Arc::new(Offline),
            routing: Arc::new(Offline),
            senders: vec![
                Arc::new(HttpPushSender::new(None, None, Duration::from_secs(1))),
                Arc::new(SmsSender),
                Arc::new(EmailSender),
            ],
        }
    }
}

pub struct AppState {
    pub config: Config,
    pub users: DashMap<Uuid, User>,
    pub merchants: DashMap<Uuid, Merchant>,
    pub products: DashMap<Uuid, Product>,
    pub orders: DashMap<Uuid, Order>,
    pub zones: DashMap<Uuid, DeliveryZone>,
    pub messages: DashMap<Uuid, Message>,
    pub driver_locations: DashMap<Uuid, DriverLocation>,
    pub tracking: DashMap<Uuid, TrackingUpdate>,
    pub tracking_tx: broadcast::Sender<TrackingUpdate>,
    /// Order mutations and location fixes hold a read guard; cascading deletes
    /// and registrations take the write guard so their checks and writes are
    /// not interleaved with other activity.
    pub write_gate: RwLock<()>,
    pub services: Services,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config, services: Services) -> Self {
        let (tracking_tx, _unused_rx) = broadcast::channel(config.event_buffer_size.max(1));

        Self {
            config,
            users: DashMap::new(),
            merchants: DashMap::new(),
            products: DashMap::new(),
            orders: DashMap::new(),
            zones: DashMap::new(),
            messages: DashMap::new(),
            driver_locations: DashMap::new(),
            tracking: DashMap::new(),
            tracking_tx,
            write_gate: RwLock::new(()),
            services,
            metrics: Metrics::new(),
        }
    }

    /// Creates the configured super admin account, if any, and returns its id.
    pub fn bootstrap_admin(&self) -> Option<Uuid> {
        let phone = self.config.admin_phone.clone()?;

        if let Some(existing) = self.users.iter().find(|entry| entry.phone == phone) {
            return Some(existing.id);
        }

        let mut admin = User::new(self.config.admin_name.clone(), phone, None);
        admin.grant(Role::SuperAdmin);
        let id = admin.id;
        self.users.insert(id, admin);

        info!(user_id = %id, "bootstrap super admin created");
        Some(id)
    }
}
