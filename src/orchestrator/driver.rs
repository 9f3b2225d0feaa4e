//! Command loop bridging UI intents to the controller.
//!
//! Multiplexes UI commands against the in-flight share task so a stop can
//! be observed while a batch call is still on the wire. The share response
//! is atomic; a stop only flips local state, and the response is still
//! handled when it lands.

use crate::backend::{BackendError, ShareBackend, ShareResponse};
use crate::model::{parse_count, parse_delay, Level, PanelEvent, RunRequest};
use crate::orchestrator::controller::{ControllerError, RunController};
use crate::storage::{ConfigStore, PanelConfig};
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers to drive the panel.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Validate,
    Start,
    Stop,
    SaveConfig,
    Quit,
}

/// Current form values the panel runs with, assembled from CLI flags and
/// the persisted configuration at launch. Count and delay stay raw here;
/// they are parsed permissively when a run request is built.
#[derive(Debug, Clone)]
pub(crate) struct PanelForm {
    pub appstate_raw: String,
    pub message: String,
    pub link: String,
    pub count: String,
    pub delay: String,
}

impl PanelForm {
    /// Build the immutable run input for one batch, fresh for every start.
    /// The credential blob must parse; count/delay fall back to defaults.
    pub(crate) fn run_request(&self) -> Result<RunRequest, ControllerError> {
        let raw = self.appstate_raw.trim();
        if raw.is_empty() {
            return Err(ControllerError::MalformedInput {
                reason: "credential blob is empty".into(),
            });
        }
        let appstate = serde_json::from_str(raw).map_err(|e| ControllerError::MalformedInput {
            reason: e.to_string(),
        })?;
        Ok(RunRequest::from_raw(
            appstate,
            self.message.clone(),
            self.link.clone(),
            &self.count,
            &self.delay,
        ))
    }

    pub(crate) fn to_config(&self) -> PanelConfig {
        PanelConfig {
            message: self.message.clone(),
            url: self.link.clone(),
            count: parse_count(&self.count),
            delay: parse_delay(&self.delay),
        }
    }
}

/// Drive the controller from UI commands and surface every outcome as
/// events. Runs until Quit or until the command channel closes.
pub(crate) async fn run_driver<B>(
    mut controller: RunController<B>,
    backend: B,
    form: PanelForm,
    config_store: ConfigStore,
    events: UnboundedSender<PanelEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()>
where
    B: ShareBackend + Clone + Send + Sync + 'static,
{
    let mut in_flight: Option<tokio::task::JoinHandle<Result<ShareResponse, BackendError>>> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Validate) => {
                        // Failures already logged/notified by the controller.
                        let _ = controller.validate(&form.appstate_raw).await;
                    }
                    Some(UiCommand::Start) => {
                        match form.run_request() {
                            Ok(req) => {
                                if controller.begin_run(&req).is_ok() {
                                    let backend = backend.clone();
                                    in_flight = Some(tokio::spawn(async move {
                                        backend.share(&req).await
                                    }));
                                }
                            }
                            Err(e) => {
                                let _ = events.send(PanelEvent::Log {
                                    level: Level::Error,
                                    message: format!("Batch run failed: {e}"),
                                });
                                let _ = events.send(PanelEvent::Notice {
                                    level: Level::Error,
                                    message: "Batch run failed to start".into(),
                                });
                            }
                        }
                    }
                    Some(UiCommand::Stop) => controller.stop(),
                    Some(UiCommand::SaveConfig) => {
                        match config_store.save(&form.to_config()) {
                            Ok(path) => {
                                let _ = events.send(PanelEvent::Log {
                                    level: Level::Info,
                                    message: format!("Configuration saved to {}", path.display()),
                                });
                                let _ = events.send(PanelEvent::Notice {
                                    level: Level::Success,
                                    message: "Configuration saved".into(),
                                });
                            }
                            Err(e) => {
                                let _ = events.send(PanelEvent::Log {
                                    level: Level::Error,
                                    message: format!("Saving configuration failed: {e:#}"),
                                });
                                let _ = events.send(PanelEvent::Notice {
                                    level: Level::Error,
                                    message: "Saving configuration failed".into(),
                                });
                            }
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        // The share task cannot be cancelled meaningfully;
                        // abort it so it does not outlive the panel.
                        if let Some(handle) = in_flight.take() {
                            handle.abort();
                        }
                        break;
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise
            // it can be dropped when another branch is chosen and completion
            // is never observed.
            maybe_done = async {
                if let Some(handle) = in_flight.as_mut() {
                    Some(handle.await)
                } else {
                    futures::future::pending().await
                }
            } => {
                if let Some(join_res) = maybe_done {
                    in_flight = None;
                    let outcome = match join_res {
                        Ok(outcome) => outcome,
                        Err(e) => Err(BackendError::Transport(format!("share task failed: {e}"))),
                    };
                    let _ = controller.finish_run(outcome);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn form(appstate: &str) -> PanelForm {
        PanelForm {
            appstate_raw: appstate.into(),
            message: "hi".into(),
            link: "http://x".into(),
            count: "3".into(),
            delay: "7".into(),
        }
    }

    #[test]
    fn run_request_parses_the_blob_fresh() {
        let req = form(r#"[{"key": "c_user"}]"#).run_request().unwrap();
        assert!(req.appstate.is_array());
        assert_eq!(req.count, 3);
        assert_eq!(req.delay_secs, 7);
    }

    #[test]
    fn run_request_rejects_empty_and_malformed_blobs() {
        assert_matches!(
            form("").run_request(),
            Err(ControllerError::MalformedInput { .. })
        );
        assert_matches!(
            form("{oops").run_request(),
            Err(ControllerError::MalformedInput { .. })
        );
    }

    #[test]
    fn garbage_numbers_fall_back_at_run_start() {
        let mut f = form("{}");
        f.count = "lots".into();
        f.delay = "-1".into();
        let req = f.run_request().unwrap();
        assert_eq!(req.count, crate::model::DEFAULT_COUNT);
        assert_eq!(req.delay_secs, crate::model::DEFAULT_DELAY_SECS);
    }

    #[test]
    fn form_round_trips_into_config() {
        let cfg = form("{}").to_config();
        assert_eq!(cfg.message, "hi");
        assert_eq!(cfg.url, "http://x");
        assert_eq!(cfg.count, 3);
        assert_eq!(cfg.delay, 7);
    }
}
