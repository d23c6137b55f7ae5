//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (companion app,
//! backend poll, serial console) that the
//! [`FeederService`](super::service::FeederService) interprets and acts upon.
//!
//! The backend speaks two small JSON documents:
//!
//! - the command poll response `{"Command": "DispenseNow_10"}`
//! - the feeder document `{"TrapMode": "TAG_BASED", "FeedFoodConfiguration": "{...}"}`

use serde::Deserialize;

use crate::access::TagId;
use crate::config::{FeederConfig, TrapMode};
use crate::error::{Error, Result};

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Run a manual dispense session for this many grams.
    DispenseNow { grams: u32 },

    /// Abort the running dispense session.
    CancelDispense,

    /// Replace the schedule with already-parsed `("HH:MM", grams)` pairs.
    LoadSchedule(Vec<(String, u32)>),

    /// Replace the schedule from a raw JSON document.
    LoadScheduleJson(String),

    /// Switch the gate opening policy.
    SetTrapMode(TrapMode),

    /// Replace the two registered tags.
    SetRegisteredTags([TagId; 2]),

    /// Hot-reload configuration.
    UpdateConfig(FeederConfig),

    /// Re-fetch the feeder document from the backend (handled by the host loop).
    ReloadConfig,
}

impl AppCommand {
    /// Parse a remote command string.
    ///
    /// | String            | Command                       |
    /// |-------------------|-------------------------------|
    /// | `DispenseNow_<g>` | `DispenseNow { grams: g }`    |
    /// | `UpdateFeeder`    | `ReloadConfig`                |
    pub fn from_remote(s: &str) -> Option<Self> {
        let s = s.trim();
        if s == "UpdateFeeder" {
            return Some(Self::ReloadConfig);
        }
        let grams = s.strip_prefix("DispenseNow_")?.parse::<u32>().ok()?;
        (grams > 0).then_some(Self::DispenseNow { grams })
    }
}

#[derive(Deserialize)]
struct CommandResponse {
    #[serde(rename = "Command")]
    command: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

/// Parse the backend command-poll response.
///
/// `Ok(None)` for an empty poll, an API error, or an unknown command.
pub fn parse_command_response(json: &str) -> Result<Option<AppCommand>> {
    if json.trim().is_empty() {
        return Ok(None);
    }
    let resp: CommandResponse = serde_json::from_str(json).map_err(|_| Error::ConfigParse)?;
    if let Some(e) = resp.error.or(resp.message) {
        log::warn!("Command poll: API error '{}'", e);
        return Ok(None);
    }
    Ok(resp.command.as_deref().and_then(AppCommand::from_remote))
}

#[derive(Deserialize)]
struct FeederDocument {
    #[serde(rename = "TrapMode")]
    trap_mode: Option<String>,
    #[serde(rename = "FeedFoodConfiguration")]
    feed_food_configuration: Option<String>,
    error: Option<String>,
}

/// Translate the backend feeder document into commands.
///
/// The schedule travels as a JSON string nested inside the document.
pub fn parse_feeder_document(json: &str) -> Result<Vec<AppCommand>> {
    let doc: FeederDocument = serde_json::from_str(json).map_err(|_| Error::ConfigParse)?;
    if let Some(e) = doc.error {
        log::warn!("Feeder document: API error '{}'", e);
        return Err(Error::ConfigParse);
    }

    let mut cmds = Vec::new();
    if let Some(mode) = doc.trap_mode.as_deref().and_then(TrapMode::from_remote) {
        cmds.push(AppCommand::SetTrapMode(mode));
    }
    if let Some(schedule) = doc.feed_food_configuration {
        cmds.push(AppCommand::LoadScheduleJson(schedule));
    }
    Ok(cmds)
}
