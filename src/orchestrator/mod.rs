//! Application-level orchestration.
//!
//! This module owns the run lifecycle (validate/start/stop) and the command
//! loop that bridges UI intents to it. UI/CLI layers call into this module
//! to keep responsibilities separated.

mod controller;
mod driver;

pub(crate) use controller::RunController;
pub(crate) use driver::{run_driver, PanelForm, UiCommand};
