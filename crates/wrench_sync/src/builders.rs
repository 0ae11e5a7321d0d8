//! Entity request builders
//!
//! Map a CMMS entity plus a verb onto `{method, url, data}` and hand the
//! result to the queue. No network or storage access happens here beyond
//! the shared append.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::clock::Clock;
use crate::engine::SyncEngine;
use crate::mutation::{Method, QueuedMutation};
use crate::storage::Storage;
use crate::transport::Transport;
use crate::SyncError;

/// Server-side collections a technician can edit offline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Assets,
    Departments,
    Locations,
    WorkOrders,
    PreventiveMaintenance,
    Parts,
    PurchaseOrders,
    Vendors,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Assets,
        Collection::Departments,
        Collection::Locations,
        Collection::WorkOrders,
        Collection::PreventiveMaintenance,
        Collection::Parts,
        Collection::PurchaseOrders,
        Collection::Vendors,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Collection::Assets => "/api/assets",
            Collection::Departments => "/api/departments",
            Collection::Locations => "/api/locations",
            Collection::WorkOrders => "/api/work-orders",
            Collection::PreventiveMaintenance => "/api/preventive-maintenance",
            Collection::Parts => "/api/parts",
            Collection::PurchaseOrders => "/api/purchase-orders",
            Collection::Vendors => "/api/vendors",
        }
    }

    /// Singular name recorded in `meta.entityType`
    pub fn entity_type(&self) -> &'static str {
        match self {
            Collection::Assets => "asset",
            Collection::Departments => "department",
            Collection::Locations => "location",
            Collection::WorkOrders => "work-order",
            Collection::PreventiveMaintenance => "pm-schedule",
            Collection::Parts => "part",
            Collection::PurchaseOrders => "purchase-order",
            Collection::Vendors => "vendor",
        }
    }

    /// Build the queued form of `verb` applied to `entity`
    pub fn request<E: Serialize + ?Sized>(&self, verb: Verb, entity: &E) -> crate::Result<QueuedMutation> {
        let data = serde_json::to_value(entity)?;
        let id = entity_id(&data)?;

        let (method, url) = match (verb, id.as_deref()) {
            (Verb::Create, _) => (Method::Post, self.prefix().to_string()),
            (Verb::Update, Some(id)) => (Method::Put, format!("{}/{}", self.prefix(), id)),
            (Verb::Delete, Some(id)) => (Method::Delete, format!("{}/{}", self.prefix(), id)),
            (_, None) => {
                return Err(SyncError::InvalidEntity(format!(
                    "{} of a {} needs an `id` or `_id`",
                    verb,
                    self.entity_type()
                )))
            }
        };

        let mutation = QueuedMutation::new(method, url, data);
        Ok(match id {
            Some(id) => mutation.with_meta(self.entity_type(), id),
            None => mutation,
        })
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_start_matches("/api/"))
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase().replace('_', "-");
        Collection::ALL
            .into_iter()
            .find(|c| c.to_string() == wanted || c.entity_type() == wanted)
            .ok_or_else(|| format!("unknown collection: {}", s))
    }
}

/// What the technician did to the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
        })
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Verb::Create),
            "update" => Ok(Verb::Update),
            "delete" => Ok(Verb::Delete),
            other => Err(format!("unknown verb: {}", other)),
        }
    }
}

// `id` first, then the document store's `_id`
fn entity_id(data: &Value) -> crate::Result<Option<String>> {
    let raw = match data.get("id").filter(|v| !v.is_null()).or_else(|| data.get("_id")) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Ok(None),
    };
    if raw.contains('/') || raw.chars().any(char::is_whitespace) {
        return Err(SyncError::InvalidEntity(format!("id {:?} cannot be used in a URL", raw)));
    }
    Ok(Some(raw))
}

impl<S, T, C> SyncEngine<S, T, C>
where
    S: Storage + 'static,
    T: Transport + 'static,
    C: Clock + 'static,
{
    /// Build and append the request for `verb` on `entity` in `collection`
    pub async fn enqueue<E: Serialize + ?Sized>(
        &self,
        collection: Collection,
        verb: Verb,
        entity: &E,
    ) -> crate::Result<QueuedMutation> {
        let mutation = collection.request(verb, entity)?;
        self.add(mutation).await
    }

    pub async fn enqueue_asset_request<E: Serialize + ?Sized>(&self, verb: Verb, entity: &E) -> crate::Result<QueuedMutation> {
        self.enqueue(Collection::Assets, verb, entity).await
    }

    pub async fn enqueue_department_request<E: Serialize + ?Sized>(&self, verb: Verb, entity: &E) -> crate::Result<QueuedMutation> {
        self.enqueue(Collection::Departments, verb, entity).await
    }

    pub async fn enqueue_location_request<E: Serialize + ?Sized>(&self, verb: Verb, entity: &E) -> crate::Result<QueuedMutation> {
        self.enqueue(Collection::Locations, verb, entity).await
    }

    pub async fn enqueue_work_order_request<E: Serialize + ?Sized>(&self, verb: Verb, entity: &E) -> crate::Result<QueuedMutation> {
        self.enqueue(Collection::WorkOrders, verb, entity).await
    }

    pub async fn enqueue_preventive_maintenance_request<E: Serialize + ?Sized>(&self, verb: Verb, entity: &E) -> crate::Result<QueuedMutation> {
        self.enqueue(Collection::PreventiveMaintenance, verb, entity).await
    }

    pub async fn enqueue_part_request<E: Serialize + ?Sized>(&self, verb: Verb, entity: &E) -> crate::Result<QueuedMutation> {
        self.enqueue(Collection::Parts, verb, entity).await
    }

    pub async fn enqueue_purchase_order_request<E: Serialize + ?Sized>(&self, verb: Verb, entity: &E) -> crate::Result<QueuedMutation> {
        self.enqueue(Collection::PurchaseOrders, verb, entity).await
    }

    pub async fn enqueue_vendor_request<E: Serialize + ?Sized>(&self, verb: Verb, entity: &E) -> crate::Result<QueuedMutation> {
        self.enqueue(Collection::Vendors, verb, entity).await
    }
}
