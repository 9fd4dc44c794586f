//! `CellRegistry` — maps cell-type names to model factories.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ConfigError;

use super::model::CellModel;

/// A shared, immutable cell model.
pub type SharedModel<S> = Arc<dyn CellModel<S>>;

type Factory<S> = Box<dyn Fn(&Value) -> Result<SharedModel<S>, String> + Send + Sync>;

/// Registry of the cell types a scenario may name.
///
/// The lattice builder asks the registry for a model every time it meets a
/// distinct `(cell type, parameters)` pair. New cell types are added by
/// registering a factory; the kernel itself never changes.
pub struct CellRegistry<S> {
    factories: BTreeMap<String, Factory<S>>,
}

impl<S: 'static> CellRegistry<S> {
    /// An empty registry.
    pub fn new() -> Self {
        CellRegistry {
            factories: BTreeMap::new(),
        }
    }

    /// Register a raw factory. The factory receives the merged parameter
    /// block for the cell and returns a message on rejection.
    ///
    /// Registering a name twice replaces the earlier factory.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<SharedModel<S>, String> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Register a cell type whose parameters deserialize into `C`.
    ///
    /// Use `#[serde(deny_unknown_fields)]` on `C` so that misspelled
    /// parameters are rejected instead of silently defaulted.
    pub fn register_typed<C, M, F>(&mut self, name: impl Into<String>, ctor: F) -> &mut Self
    where
        C: DeserializeOwned,
        M: CellModel<S> + 'static,
        F: Fn(C) -> Result<M, String> + Send + Sync + 'static,
    {
        self.register(name, move |params: &Value| {
            let params = if params.is_null() {
                Value::Object(Default::default())
            } else {
                params.clone()
            };
            let config: C = serde_json::from_value(params).map_err(|e| e.to_string())?;
            let model = ctor(config)?;
            Ok(Arc::new(model) as SharedModel<S>)
        })
    }

    /// Instantiate `cell_type` with `params`.
    ///
    /// `location` names the cell or region being built and is carried into
    /// the error.
    pub fn create(
        &self,
        cell_type: &str,
        params: &Value,
        location: &str,
    ) -> Result<SharedModel<S>, ConfigError> {
        let factory =
            self.factories
                .get(cell_type)
                .ok_or_else(|| ConfigError::UnknownCellType {
                    cell_type: cell_type.to_string(),
                    location: location.to_string(),
                })?;
        factory(params).map_err(|message| ConfigError::InvalidParameters {
            cell_type: cell_type.to_string(),
            location: location.to_string(),
            message,
        })
    }

    pub fn contains(&self, cell_type: &str) -> bool {
        self.factories.contains_key(cell_type)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<S: 'static> Default for CellRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for CellRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::cell::model::{FnModel, NeighborView};
    use crate::error::CellError;

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Offset {
        #[serde(default)]
        by: i32,
    }

    struct AddOffset(i32);

    impl CellModel<i32> for AddOffset {
        fn transition(&self, state: &i32, _n: &NeighborView<i32>) -> Result<i32, CellError> {
            Ok(state + self.0)
        }
    }

    fn registry() -> CellRegistry<i32> {
        let mut reg = CellRegistry::new();
        reg.register_typed("offset", |c: Offset| Ok(AddOffset(c.by)));
        reg
    }

    #[test]
    fn test_create_known_type() {
        let reg = registry();
        let model = reg.create("offset", &json!({ "by": 2 }), "cell (0)").unwrap();
        assert_eq!(model.transition(&1, &NeighborView::empty()).unwrap(), 3);
    }

    #[test]
    fn test_missing_params_means_defaults() {
        let reg = registry();
        let model = reg.create("offset", &Value::Null, "cell (0)").unwrap();
        assert_eq!(model.transition(&1, &NeighborView::empty()).unwrap(), 1);
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let reg = registry();
        let err = reg.create("CO2_cell", &json!({}), "cell (4,4)").err().unwrap();
        assert_eq!(
            err,
            ConfigError::UnknownCellType {
                cell_type: "CO2_cell".into(),
                location: "cell (4,4)".into(),
            }
        );
    }

    #[test]
    fn test_unknown_parameter_is_rejected() {
        let reg = registry();
        let err = reg.create("offset", &json!({ "bye": 2 }), "region 0").err().unwrap();
        assert!(matches!(err, ConfigError::InvalidParameters { .. }));
        assert!(err.to_string().contains("bye"));
    }

    #[test]
    fn test_raw_factory_and_names() {
        let mut reg = registry();
        reg.register("identity", |_params: &Value| {
            Ok(Arc::new(FnModel::new(|s: &i32, _n: &NeighborView<i32>| Ok(*s))) as SharedModel<i32>)
        });
        assert!(reg.contains("identity"));
        assert_eq!(reg.names(), vec!["identity", "offset"]);
        assert_eq!(reg.len(), 2);
    }
}
