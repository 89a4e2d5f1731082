use crate::core::registry::HookRegistry;
use crate::core::{HookValue, Settings};
use std::sync::Arc;

/// Key under which a hook's name lives in its settings.
pub const NAME_KEY: &str = "name";

/// Caller-supplied configuration for a hook or anchor.
///
/// Everything here is optional; whatever is missing falls back to the
/// type-level defaults when the settings are merged.
#[derive(Clone, Default)]
pub struct HookOptions {
    pub(crate) name: Option<String>,
    pub(crate) settings: Settings,
    pub(crate) registry: Option<Arc<HookRegistry>>,
}

impl HookOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the default name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds one setting. Later calls with the same key win.
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<HookValue>) -> Self {
        let key = key.into();
        if key == NAME_KEY {
            log::warn!("Setting '{}' through `setting`; use `name` instead.", NAME_KEY);
        }
        self.settings.insert(key, value.into());
        self
    }

    /// Injects the registry used to resolve hooks attached by identifier.
    pub fn registry(mut self, registry: Arc<HookRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Merges `defaults` and these options into the final settings map.
    ///
    /// Caller values win on conflict. The resulting map always carries a
    /// string `name`, which is also returned.
    pub(crate) fn merge(&self, default_name: &str, defaults: Settings) -> (String, Settings) {
        let mut settings = Settings::new();
        settings.insert(NAME_KEY.to_string(), default_name.into());
        settings.extend(defaults);
        settings.extend(self.settings.clone());
        if let Some(name) = &self.name {
            settings.insert(NAME_KEY.to_string(), name.clone().into());
        }

        let name = match settings.get(NAME_KEY) {
            Some(HookValue::String(name)) if !name.is_empty() => name.clone(),
            other => {
                log::warn!(
                    "Ignoring invalid hook name {:?}, falling back to '{}'.",
                    other,
                    default_name
                );
                default_name.to_string()
            }
        };
        settings.insert(NAME_KEY.to_string(), name.clone().into());
        (name, settings)
    }
}

/// Builds options out of a JSON object, e.g. `json!({"name": "audit", "level": 2})`.
///
/// The `name` key is only honoured when it is a non-empty string. Anything that
/// is not a JSON object yields empty options.
impl From<HookValue> for HookOptions {
    fn from(value: HookValue) -> Self {
        let mut options = HookOptions::new();
        match value {
            HookValue::Object(map) => {
                for (key, value) in map {
                    if key == NAME_KEY {
                        match value {
                            HookValue::String(name) if !name.is_empty() => options.name = Some(name),
                            other => log::warn!("Ignoring non-string hook name: {}", other),
                        }
                    } else {
                        options.settings.insert(key, value);
                    }
                }
            }
            HookValue::Null => {}
            other => log::warn!("Hook options must be a JSON object, got: {}", other),
        }
        options
    }
}

impl std::fmt::Debug for HookOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookOptions")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("registry", &self.registry.as_ref().map(|r| r.identifiers()))
            .finish()
    }
}
