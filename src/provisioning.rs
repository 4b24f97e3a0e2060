//! Seam to the network provisioning portal
//!
//! The portal (captive portal, credential storage, connection handling) lives
//! outside this crate. It shows one input field per registered parameter and
//! reports back whether the user submitted new values.

use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::{ParameterBinding, ParameterSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalMode {
    /// Connect with stored credentials, open the portal only if that fails
    AutoConnect,
    /// Open the portal right away
    ConfigPortal,
}

/// Result of one provisioning run
///
/// Handed to [`crate::config::ConfigManager::save`], which consumes it.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct ProvisioningOutcome {
    connected: bool,
    config_submitted: bool,
}

impl ProvisioningOutcome {
    pub fn new(connected: bool, config_submitted: bool) -> Self {
        Self {
            connected,
            config_submitted,
        }
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    /// The user saved the portal form during this run
    pub fn config_submitted(&self) -> bool {
        self.config_submitted
    }
}

pub trait Provisioner {
    /// Run provisioning until the device is online or the portal gives up.
    /// Every parameter gets a binding to its input field.
    fn provision(&mut self, mode: PortalMode, params: &mut ParameterSet) -> Result<ProvisioningOutcome>;
}

/// Text input owned by a portal, pre-filled with the parameter default
#[derive(Debug)]
pub struct FormField {
    value: RefCell<String>,
    max_length: usize,
}

impl FormField {
    pub fn new(default_value: &str, max_length: usize) -> Rc<Self> {
        let field = Rc::new(Self {
            value: RefCell::new(String::new()),
            max_length,
        });
        field.set(default_value);
        field
    }

    /// Store user input, cut to the field's maximum length
    pub fn set(&self, input: &str) {
        *self.value.borrow_mut() = input.chars().take(self.max_length).collect();
    }
}

impl ParameterBinding for FormField {
    fn current_value(&self) -> String {
        self.value.borrow().clone()
    }
}

/// Portal stand-in that answers with preset values
#[derive(Debug, Default)]
pub struct ScriptedProvisioner {
    submissions: HashMap<String, String>,
    connect: bool,
    fields: Vec<Rc<FormField>>,
    runs: Vec<PortalMode>,
}

impl ScriptedProvisioner {
    /// Connects without the user submitting anything
    pub fn connecting() -> Self {
        Self {
            connect: true,
            ..Default::default()
        }
    }

    /// Never gets a connection
    pub fn offline() -> Self {
        Self::default()
    }

    /// Value the "user" types into the field `id`
    pub fn with_value(mut self, id: &str, value: &str) -> Self {
        self.submissions.insert(id.to_string(), value.to_string());
        self
    }

    /// Modes of every run so far
    pub fn runs(&self) -> &[PortalMode] {
        &self.runs
    }

    /// Drop the portal's fields, as when the portal shuts down
    pub fn teardown(&mut self) {
        self.fields.clear();
    }
}

impl Provisioner for ScriptedProvisioner {
    fn provision(&mut self, mode: PortalMode, params: &mut ParameterSet) -> Result<ProvisioningOutcome> {
        self.runs.push(mode);
        self.fields.clear();

        for param in params.iter_mut() {
            let field = FormField::new(param.initial_value(), param.max_length());
            if let Some(value) = self.submissions.get(param.id()) {
                field.set(value);
            }
            param.attach_binding(field.clone());
            self.fields.push(field);
        }

        let submitted = !self.submissions.is_empty();
        if submitted {
            log::debug!("Should save config");
        }
        Ok(ProvisioningOutcome::new(self.connect, submitted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_field_truncates() {
        let field = FormField::new("default", 4);
        assert_eq!(field.current_value(), "defa");
        field.set("ab");
        assert_eq!(field.current_value(), "ab");
    }

    #[test]
    fn test_scripted_provisioner_binds_every_parameter() {
        let mut params = ParameterSet::new();
        params.add_parameter("ssid", "SSID", "x", 32).unwrap();
        params.add_parameter("token", "API token", "", 16).unwrap();

        let mut portal = ScriptedProvisioner::connecting().with_value("ssid", "myssid");
        let outcome = portal.provision(PortalMode::ConfigPortal, &mut params).unwrap();

        assert!(outcome.connected());
        assert!(outcome.config_submitted());
        assert!(params.iter().all(|p| p.is_bound()));
        assert_eq!(portal.runs(), &[PortalMode::ConfigPortal]);

        let json = params.harvest();
        assert_eq!(json["ssid"], "myssid");
        assert_eq!(json["token"], "");
    }

    #[test]
    fn test_nothing_submitted() {
        let mut params = ParameterSet::new();
        let mut portal = ScriptedProvisioner::offline();
        let outcome = portal.provision(PortalMode::AutoConnect, &mut params).unwrap();
        assert_eq!(outcome, ProvisioningOutcome::new(false, false));
    }
}
