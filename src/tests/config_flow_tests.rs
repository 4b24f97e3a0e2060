use anyhow::{bail, Result};
use serde_json::Value;

use super::Flash;
use crate::config::ParameterSet;
use crate::json_path::NOT_FOUND;
use crate::provisioning::{PortalMode, ProvisioningOutcome, Provisioner, ScriptedProvisioner};
use crate::system::storage::ConfigFile;
use crate::system::ResetCause;
use crate::BeginOutcome;

fn stored(flash: &Flash) -> Value {
    serde_json::from_slice(&flash.files.contents().unwrap()).unwrap()
}

#[test]
fn test_harvest_save_reload_roundtrip() {
    let flash = Flash::default();
    let mut device = flash.boot(ResetCause::PowerOn);
    let mut portal = ScriptedProvisioner::connecting().with_value("ssid", "myssid");
    device.begin(&mut portal).unwrap();
    portal.teardown();

    assert_eq!(device.app().ssid, "myssid");
    assert!(device.parameters().iter().all(|p| !p.is_bound()));
    assert_eq!(stored(&flash)["ssid"], "myssid");

    let mut device = flash.boot(ResetCause::SoftwareCpu);
    let outcome = device.begin(&mut ScriptedProvisioner::connecting()).unwrap();

    assert_eq!(
        outcome,
        BeginOutcome::Ready {
            connected: true,
            config_loaded: true,
            config_saved: false,
        }
    );
    // Loaded from the record, then again from the untouched portal fields
    assert_eq!(device.app().loads, 2);
    assert_eq!(device.app().ssid, "myssid");
    assert_eq!(stored(&flash)["ssid"], "myssid");

    device.save_config().unwrap();
    assert_eq!(stored(&flash)["ssid"], "myssid");
}

#[test]
fn test_partial_submission_keeps_other_stored_fields() {
    let flash = Flash::default();
    flash
        .boot(ResetCause::PowerOn)
        .begin(
            &mut ScriptedProvisioner::connecting()
                .with_value("ssid", "home")
                .with_value("token", "t1"),
        )
        .unwrap();

    let mut device = flash.boot(ResetCause::SoftwareCpu);
    let mut portal = ScriptedProvisioner::connecting().with_value("token", "t2");
    device.begin(&mut portal).unwrap();

    assert_eq!(device.app().ssid, "home");
    assert_eq!(device.app().token, "t2");
    assert_eq!(stored(&flash), serde_json::json!({ "ssid": "home", "token": "t2" }));
    assert_eq!(device.parameters().get("ssid").unwrap().initial_value(), "home");
}

#[test]
fn test_submitted_values_replace_stored_record() {
    let flash = Flash::default();
    flash.files.write(br#"{"ssid":"old","extra":1}"#).unwrap();

    let mut device = flash.boot(ResetCause::SoftwareCpu);
    device
        .begin(&mut ScriptedProvisioner::connecting().with_value("ssid", "new"))
        .unwrap();

    assert_eq!(device.app().ssid, "new");
    // The record is rebuilt from the application, nothing is merged
    assert_eq!(stored(&flash), serde_json::json!({ "ssid": "new", "token": "" }));
}

#[test]
fn test_unsubmitted_portal_leaves_record_untouched() {
    let flash = Flash::default();
    flash.files.write(br#"{"ssid":"old","extra":1}"#).unwrap();

    flash
        .boot(ResetCause::SoftwareCpu)
        .begin(&mut ScriptedProvisioner::connecting())
        .unwrap();

    assert_eq!(stored(&flash)["extra"], 1);
}

#[test]
fn test_malformed_record_keeps_defaults() {
    let flash = Flash::default();
    flash.files.write(b"{not json").unwrap();

    let mut device = flash.boot(ResetCause::SoftwareCpu);
    let outcome = device.begin(&mut ScriptedProvisioner::offline()).unwrap();

    assert!(matches!(outcome, BeginOutcome::Ready { config_loaded: false, .. }));
    assert_eq!(device.app().ssid, "x");
    assert_eq!(device.app().loads, 1);
}

#[test]
fn test_unmounted_filesystem_skips_load_and_save() {
    let flash = Flash::default();
    flash.files.set_unavailable(true);

    let mut device = flash.boot(ResetCause::SoftwareCpu);
    let outcome = device
        .begin(&mut ScriptedProvisioner::connecting().with_value("ssid", "myssid"))
        .unwrap();

    assert_eq!(
        outcome,
        BeginOutcome::Ready {
            connected: true,
            config_loaded: false,
            config_saved: false,
        }
    );
    assert_eq!(device.app().ssid, "myssid");
}

#[test]
fn test_save_config_writes_current_state() {
    let flash = Flash::default();
    let mut device = flash.boot(ResetCause::SoftwareCpu);
    device.begin(&mut ScriptedProvisioner::offline()).unwrap();

    device.app_mut().ssid = "changed".to_string();
    device.save_config().unwrap();

    assert_eq!(stored(&flash)["ssid"], "changed");
}

struct BrokenPortal;

impl Provisioner for BrokenPortal {
    fn provision(&mut self, _mode: PortalMode, _params: &mut ParameterSet) -> Result<ProvisioningOutcome> {
        bail!("radio init failed")
    }
}

#[test]
fn test_provisioner_error_is_returned() {
    let flash = Flash::default();
    let mut device = flash.boot(ResetCause::SoftwareCpu);
    assert!(device.begin(&mut BrokenPortal).is_err());
    assert_eq!(flash.files.contents(), None);
}

#[test]
fn test_parse_json_on_sensor_payload() {
    let flash = Flash::default();
    let device = flash.boot(ResetCause::PowerOn);
    let payload = r#"{"sensors":[{"id":"t1","value":21.5},{"id":"h1","value":40}]}"#;

    assert_eq!(device.parse_json(payload, "$.sensors[0].value"), 21.5);
    assert_eq!(device.parse_json(payload, "sensors[1].value"), 40.0);
    assert_eq!(device.parse_json(payload, "$.sensors[0].id"), NOT_FOUND);
    assert_eq!(device.parse_json(payload, "$.sensors[9].value"), NOT_FOUND);
}
