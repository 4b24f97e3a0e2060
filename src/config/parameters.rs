use anyhow::{bail, Result};
use serde_json::Value;
use std::rc::Rc;

use super::ConfigObject;

/// Live value of a parameter's input field while provisioning runs
///
/// The field itself belongs to the provisioning portal; a parameter only holds a
/// handle to it until the values have been harvested.
pub trait ParameterBinding {
    fn current_value(&self) -> String;
}

/// Application parameter shown on the provisioning page
pub struct ConfigParameter {
    id: String,
    label: String,
    default_value: String,
    max_length: usize,
    current_value: Option<String>,
    binding: Option<Rc<dyn ParameterBinding>>,
}

impl ConfigParameter {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn default_value(&self) -> &str {
        &self.default_value
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// What the portal field starts with: the application's value once
    /// seeded, the default before that
    pub fn initial_value(&self) -> &str {
        self.current_value.as_deref().unwrap_or(&self.default_value)
    }

    pub fn attach_binding(&mut self, binding: Rc<dyn ParameterBinding>) {
        self.binding = Some(binding);
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Current value of the bound field, releasing the binding
    fn take_value(&mut self) -> String {
        match self.binding.take() {
            Some(binding) => binding.current_value(),
            None => {
                log::warn!("Parameter '{}' has no input field, keeping '{}'", self.id, self.initial_value());
                self.initial_value().to_string()
            }
        }
    }
}

impl std::fmt::Debug for ConfigParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigParameter")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("default_value", &self.default_value)
            .field("max_length", &self.max_length)
            .field("current_value", &self.current_value)
            .field("bound", &self.binding.is_some())
            .finish()
    }
}

/// Parameters registered by the application before provisioning
#[derive(Debug, Default)]
pub struct ParameterSet {
    params: Vec<ConfigParameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter. `id` becomes the JSON key and an HTTP form field
    /// name, so it must be unique and limited to letters, digits, `-` and `_`.
    pub fn add_parameter(
        &mut self,
        id: &str,
        label: &str,
        default_value: &str,
        max_length: usize,
    ) -> Result<()> {
        if id.is_empty() {
            bail!("Parameter id must not be empty");
        }
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            bail!("Parameter id '{}' contains invalid character '{}'", id, bad);
        }
        if self.get(id).is_some() {
            bail!("Parameter '{}' is already registered", id);
        }
        if max_length == 0 {
            bail!("Parameter '{}' needs a maximum length", id);
        }
        if default_value.len() > max_length {
            log::warn!(
                "Default for '{}' is longer than {} characters and will be cut by the portal",
                id,
                max_length
            );
        }

        log::debug!("Adding parameter: {}={}", id, default_value);
        self.params.push(ConfigParameter {
            id: id.to_string(),
            label: label.to_string(),
            default_value: default_value.to_string(),
            max_length,
            current_value: None,
            binding: None,
        });
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ConfigParameter> {
        self.params.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigParameter> {
        self.params.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ConfigParameter> {
        self.params.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Pre-fill the portal fields from the application's current configuration
    ///
    /// Strings are taken as they are, other scalars in their JSON text form.
    /// Parameters without a matching key keep their default.
    pub fn seed(&mut self, current: &ConfigObject) {
        for param in self.params.iter_mut() {
            let value = match current.get(&param.id) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            param.current_value = Some(value);
        }
    }

    /// Collect `{id: value}` from the input fields and drop every binding
    pub fn harvest(&mut self) -> ConfigObject {
        let mut json = ConfigObject::new();
        for param in self.params.iter_mut() {
            let value = param.take_value();
            json.insert(param.id.clone(), Value::String(value));
        }
        json
    }
}
