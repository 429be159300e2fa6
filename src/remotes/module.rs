//! Loaded remote modules
//!
//! An exposed module is either a route array or an object mapping named
//! exports (`authRoutes`, `accountRoutes`, `cloudRoutes`) to route arrays.
//! Extraction never probes arbitrary shapes: it goes through [`RemoteModule::routes`],
//! which defaults to an empty table.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::RemoteError;
use crate::routes::RouteDef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteModule {
    /// The module itself is the route array
    Routes(Vec<RouteDef>),
    /// Named route arrays
    Keyed(BTreeMap<String, Vec<RouteDef>>),
}

/// Replace a conventional `{ "default": ... }` wrapper with its contents
pub fn unwrap_default_export(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("default") => {
            map.remove("default").unwrap_or(Value::Null)
        }
        other => other,
    }
}

impl RemoteModule {
    /// Interpret a raw loaded module. `key` is only used for diagnostics.
    pub fn from_value(key: &str, value: Value) -> Result<Self, RemoteError> {
        match unwrap_default_export(value) {
            array @ Value::Array(_) => serde_json::from_value(array)
                .map(RemoteModule::Routes)
                .map_err(|e| RemoteError::InvalidModule {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            Value::Object(map) => {
                let mut keyed = BTreeMap::new();
                for (name, member) in map {
                    match serde_json::from_value::<Vec<RouteDef>>(member) {
                        Ok(routes) => {
                            keyed.insert(name, routes);
                        }
                        Err(e) => {
                            tracing::debug!(key, export = %name, error = %e, "Skipping non-route export");
                        }
                    }
                }
                Ok(RemoteModule::Keyed(keyed))
            }
            other => Err(RemoteError::InvalidModule {
                key: key.to_string(),
                reason: format!("expected an array or object, found {}", kind_of(&other)),
            }),
        }
    }

    /// Routes for `data_key`; anything that does not resolve is an empty table
    pub fn routes(&self, data_key: Option<&str>) -> Vec<RouteDef> {
        match (self, data_key) {
            (RemoteModule::Routes(routes), None) => routes.clone(),
            (RemoteModule::Keyed(map), Some(key)) => map.get(key).cloned().unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Export names (empty for a bare route array)
    pub fn exports(&self) -> Vec<&str> {
        match self {
            RemoteModule::Routes(_) => Vec::new(),
            RemoteModule::Keyed(map) => map.keys().map(String::as_str).collect(),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_array_module() {
        let module = RemoteModule::from_value(
            "VrittiCloud/routes",
            json!([{ "path": "companies", "element": "CompaniesPage" }]),
        )
        .unwrap();
        assert_eq!(module.routes(None).len(), 1);
        assert!(module.routes(Some("cloudRoutes")).is_empty());
    }

    #[test]
    fn test_default_export_is_unwrapped() {
        let module = RemoteModule::from_value(
            "VrittiAuth/routes",
            json!({ "default": { "authRoutes": [{ "path": "login", "element": "Login" }] } }),
        )
        .unwrap();
        assert_eq!(module.exports(), vec!["authRoutes"]);
        assert_eq!(
            module.routes(Some("authRoutes"))[0].element.as_deref(),
            Some("Login")
        );
    }

    #[test]
    fn test_missing_key_is_empty() {
        let module = RemoteModule::from_value(
            "VrittiAuth/routes",
            json!({ "authRoutes": [], "version": "1.2.0" }),
        )
        .unwrap();
        // non-route exports are dropped
        assert_eq!(module.exports(), vec!["authRoutes"]);
        assert!(module.routes(Some("accountRoutes")).is_empty());
        assert!(module.routes(None).is_empty());
    }

    #[test]
    fn test_scalar_module_is_invalid() {
        let err = RemoteModule::from_value("VrittiAuth/routes", json!("routes")).unwrap_err();
        assert!(matches!(err, RemoteError::InvalidModule { .. }));
    }
}
