//! Gyms, local and external.

use crate::error::{ModelError, ModelResult};
use crate::id::EntityId;
use serde::{Deserialize, Serialize};

/// A gym. Search results from the place provider carry an `external_id`
/// and no local `id` until saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gym {
    /// Local id, absent for unsaved search results.
    #[serde(default)]
    pub id: Option<EntityId>,
    /// Place-provider id.
    #[serde(default)]
    pub external_id: Option<String>,
    /// Display name.
    pub name: String,
    /// Street address.
    #[serde(default)]
    pub address: String,
    /// Latitude.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Members this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Gym {
    /// Returns true once the gym has been saved locally.
    pub fn is_local(&self) -> bool {
        self.id.is_some()
    }

    /// Local id, or an error for an unsaved search result.
    pub fn local_id(&self) -> ModelResult<&EntityId> {
        self.id.as_ref().ok_or(ModelError::MissingLocalId)
    }
}

/// Gym search filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GymSearch {
    /// Free text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Latitude of the search centre.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    /// Longitude of the search centre.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    /// Radius in metres.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<u32>,
}
