//! Manifest document.
//!
//! The manifest is owned by the control plane's schema, not by this crate, so
//! it is kept as raw JSON and only the paths the engine needs are touched:
//!
//! ```text
//! manifest.apis.<domain>.endpoint.uri                    (default region)
//! manifest.apis.<domain>.regions.<region>.endpoint.uri   (other regions)
//! manifest.publishingInformation.locales.<locale>.name   (application name)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{Endpoint, RegionCode};

/// Manifest document, preserving every field it does not interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(Value);

impl Default for Manifest {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl Manifest {
    /// Wrap a parsed manifest document.
    #[must_use]
    pub fn new(document: Value) -> Self {
        Self(document)
    }

    /// The raw document.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Endpoint registered for a domain and region.
    #[must_use]
    pub fn endpoint(&self, domain: &str, region: &RegionCode) -> Option<Endpoint> {
        let api = self.0.get("manifest")?.get("apis")?.get(domain)?;
        let holder = if region.is_default() {
            api
        } else {
            api.get("regions")?.get(region.as_str())?
        };
        holder
            .get("endpoint")?
            .get("uri")?
            .as_str()
            .map(Endpoint::new)
    }

    /// Register an endpoint for a domain and region, creating any missing
    /// intermediate objects.
    pub fn set_endpoint(&mut self, domain: &str, region: &RegionCode, endpoint: &Endpoint) {
        let api = object_at(&mut self.0, &["manifest", "apis", domain]);
        let holder = if region.is_default() {
            api
        } else {
            object_at(api, &["regions", region.as_str()])
        };
        let slot = object_at(holder, &["endpoint"]);
        if let Value::Object(map) = slot {
            map.insert("uri".to_owned(), Value::String(endpoint.url.clone()));
        }
    }

    /// Declared application name from the first locale that has one.
    #[must_use]
    pub fn app_name(&self) -> Option<&str> {
        self.0
            .get("manifest")?
            .get("publishingInformation")?
            .get("locales")?
            .as_object()?
            .values()
            .find_map(|locale| locale.get("name").and_then(Value::as_str))
    }
}

/// Walk `keys` from `value`, replacing anything that is not an object.
fn object_at<'a>(value: &'a mut Value, keys: &[&str]) -> &'a mut Value {
    let mut current = value;
    for key in keys {
        current = child_object(current, key);
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    current
}

/// Object-valued child of `value` at `key`, created as needed.
fn child_object<'a>(value: &'a mut Value, key: &str) -> &'a mut Value {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map
            .entry(key.to_owned())
            .or_insert_with(|| Value::Object(Map::new())),
        other => other,
    }
}
