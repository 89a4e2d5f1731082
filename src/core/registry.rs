use crate::core::{HookRef, HookValue};
use crate::error::{HookError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a hook out of the constructor arguments passed to `set_hook`.
pub type HookConstructor = Arc<dyn Fn(&[HookValue]) -> Result<HookRef> + Send + Sync>;

/// Maps identifiers to hook constructors so hooks can be attached by name.
///
/// A registry is injected into a hook through
/// [`HookOptions::registry`](crate::HookOptions::registry).
#[derive(Clone, Default)]
pub struct HookRegistry {
    constructors: HashMap<String, HookConstructor>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor under `identifier`, replacing any previous one.
    pub fn register<F>(&mut self, identifier: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&[HookValue]) -> Result<HookRef> + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        if self.constructors.contains_key(&identifier) {
            log::warn!(
                "Warning: Identifier {} was found in the registry, Overwriting key {}.",
                &identifier,
                &identifier
            );
        }
        self.constructors.insert(identifier, Arc::new(constructor));
        self
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.constructors.contains_key(identifier)
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.constructors.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Instantiates the hook registered under `identifier` with `args`.
    pub fn resolve(&self, identifier: &str, args: &[HookValue]) -> Result<HookRef> {
        let constructor = self
            .constructors
            .get(identifier)
            .ok_or_else(|| HookError::UnknownHook(identifier.to_string()))?;

        constructor(args).map_err(|e| HookError::Construction {
            identifier: identifier.to_string(),
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hook::{Hook, Passthrough};
    use crate::core::options::HookOptions;
    use serde_json::json;

    fn named_passthrough(args: &[HookValue]) -> Result<HookRef> {
        let name = args
            .first()
            .and_then(|v| v.as_str())
            .ok_or_else(|| HookError::failed("expected a name argument"))?;
        Ok(Arc::new(Hook::with_options(
            Passthrough,
            HookOptions::new().name(name),
        )))
    }

    #[test]
    fn test_resolve_registered_identifier() {
        let mut registry = HookRegistry::new();
        registry.register("named", named_passthrough);

        let hook = registry.resolve("named", &[json!("audit")]).unwrap();
        assert_eq!(hook.name(), "audit");
    }

    #[test]
    fn test_resolve_unknown_identifier() {
        let registry = HookRegistry::new();
        let err = registry.resolve("missing", &[]).err().unwrap();
        assert!(matches!(err, HookError::UnknownHook(id) if id == "missing"));
    }

    #[test]
    fn test_constructor_failure_is_wrapped() {
        let mut registry = HookRegistry::new();
        registry.register("named", named_passthrough);

        let err = registry.resolve("named", &[]).err().unwrap();
        match err {
            HookError::Construction { identifier, source } => {
                assert_eq!(identifier, "named");
                assert_eq!(source.to_string(), "expected a name argument");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_identifiers_are_sorted() {
        let mut registry = HookRegistry::new();
        registry
            .register("zeta", named_passthrough)
            .register("alpha", named_passthrough);

        assert!(registry.contains("zeta"));
        assert!(!registry.contains("beta"));
        assert_eq!(registry.identifiers(), vec!["alpha", "zeta"]);
    }
}
