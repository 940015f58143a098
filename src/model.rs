//! Data models for the container visualization.
//!
//! This module defines the records delivered by the storage backend:
//! - `ContainerSnapshot`: a container with its extents and items
//! - `PlacedItem`: a cargo item, optionally positioned inside the container
//! - `ApiEnvelope`: the `{ success, data, error }` wrapper every backend reply uses
//!
//! Positions and dimensions here are *logical* coordinates: x = width,
//! y = depth (0 is the open face), z = height. The scene module remaps them
//! to render axes.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::Vec3;

/// Validation error for snapshot data.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Helper function to validate a single dimension.
fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_dims(dims: (f64, f64, f64), prefix: &str) -> Result<(), ValidationError> {
    validate_dimension(dims.0, &format!("{prefix} width"))?;
    validate_dimension(dims.1, &format!("{prefix} depth"))?;
    validate_dimension(dims.2, &format!("{prefix} height"))?;
    Ok(())
}

/// Standard reply wrapper of the storage backend.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A cargo item as delivered by `GET /api/containers/{id}`.
///
/// # Fields
/// * `id` - Unique within its container
/// * `width`/`depth`/`height` - Unrotated dimensions in cm
/// * `rotated` - Width and depth are swapped when placed
/// * `x_pos`/`y_pos`/`z_pos` - Min corner inside the container; `None` means unplaced
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "001",
    "name": "Food Packet",
    "width": 10.0, "depth": 10.0, "height": 20.0,
    "rotated": false,
    "x_pos": 0.0, "y_pos": 0.0, "z_pos": 0.0,
    "priority": 80,
    "is_waste": false,
    "is_expired": false
}))]
pub struct PlacedItem {
    pub id: String,
    pub name: String,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
    #[serde(default)]
    pub rotated: bool,
    #[serde(default)]
    pub x_pos: Option<f64>,
    #[serde(default)]
    pub y_pos: Option<f64>,
    #[serde(default)]
    pub z_pos: Option<f64>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub is_waste: bool,
    #[serde(default)]
    pub is_expired: bool,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub usage_limit: Option<i64>,
    #[serde(default)]
    pub uses_remaining: Option<i64>,
}

impl PlacedItem {
    /// Returns the stored min-corner position if all three coordinates are
    /// present and finite.
    ///
    /// A zero coordinate is a valid position.
    pub fn position(&self) -> Option<Vec3> {
        match (self.x_pos, self.y_pos, self.z_pos) {
            (Some(x), Some(y), Some(z)) if x.is_finite() && y.is_finite() && z.is_finite() => {
                Some(Vec3::new(x, y, z))
            }
            _ => None,
        }
    }

    /// Dimensions as placed (width and depth swapped when rotated).
    #[inline]
    pub fn placed_dims(&self) -> Vec3 {
        if self.rotated {
            Vec3::new(self.depth, self.width, self.height)
        } else {
            Vec3::new(self.width, self.depth, self.height)
        }
    }

    /// Checks whether the item can become part of a scene.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidIdentifier(
                "item id must not be empty".to_string(),
            ));
        }
        validate_dims((self.width, self.depth, self.height), "Item")
    }
}

/// Immutable container value fetched once per visualization session.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ContainerSnapshot {
    pub id: String,
    #[serde(default)]
    pub zone_name: Option<String>,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
    #[serde(default)]
    pub items: Vec<PlacedItem>,
}

impl ContainerSnapshot {
    /// Validates the container extents.
    ///
    /// Items are not validated here; invalid items are skipped by the scene builder.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidIdentifier(
                "container id must not be empty".to_string(),
            ));
        }
        validate_dims((self.width, self.depth, self.height), "Container")
    }

    /// Logical dimensions (width, depth, height).
    #[inline]
    pub fn dims(&self) -> Vec3 {
        Vec3::new(self.width, self.depth, self.height)
    }
}
