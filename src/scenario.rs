//! Scripted navigation runs against the in-memory history
//!
//! A script is a TOML list of steps:
//!
//! ```toml
//! [[steps]]
//! action = "push"
//! screen = "list"
//!
//! [[steps]]
//! action = "push"
//! screen = "detail"
//! params = { id = "42" }
//!
//! [[steps]]
//! action = "pop"
//! ```
//!
//! `back` and `forward` simulate the platform's own controls, so they reach
//! the screens through the `statePopped` path instead of a pop future.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::task::Poll;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::nav::{AppState, MemoryHistory, NavState, NavigationState, Params, StateChange};
use crate::screen::{LifecycleEvent, ScreenEvent, ScreenManager};

/// One navigation action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    Push {
        screen: String,
        #[serde(default)]
        params: Option<Params>,
    },
    Replace {
        screen: String,
        #[serde(default)]
        params: Option<Params>,
    },
    ChangeParams {
        #[serde(default)]
        params: Option<Params>,
    },
    Pop,
    Back,
    Forward,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// What happened during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Lifecycle events in firing order
    pub events: Vec<LifecycleEvent>,
    /// Every `stateChanged` payload in order
    pub changes: Vec<StateChange>,
    /// Display tokens of the application's entries up to the current one
    pub stack: Vec<String>,
    /// Top of stack after the last step
    pub current: Option<NavState>,
}

impl Script {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {:?}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("Failed to parse script: {:?}", path))
    }

    /// Names of all screens the script pushes or replaces
    pub fn screen_names(&self) -> BTreeSet<&str> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Push { screen, .. } | Step::Replace { screen, .. } => Some(screen.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Run every step in order, stopping at the first failure
    pub async fn run(&self, config: &Config) -> Result<Transcript> {
        let (history, mut driver) = MemoryHistory::with_delay(config.history.notify_delay());
        let nav = NavigationState::new(Box::new(history.clone()), &config.app_address)?;
        let manager = ScreenManager::new(nav.clone());

        let events = Arc::new(Mutex::new(Vec::<LifecycleEvent>::new()));
        for screen in self.screen_names() {
            for kind in ScreenEvent::ALL {
                let events = Arc::clone(&events);
                manager.add_screen_event(screen, kind, move |event| {
                    events.lock().unwrap_or_else(|e| e.into_inner()).push(event.clone());
                    Ok(())
                });
            }
        }

        let changes = Arc::new(Mutex::new(Vec::<StateChange>::new()));
        {
            let changes = Arc::clone(&changes);
            nav.on(
                crate::nav::STATE_CHANGED,
                Box::new(move |change: &StateChange| -> anyhow::Result<()> {
                    changes.lock().unwrap_or_else(|e| e.into_inner()).push(change.clone());
                    Ok(())
                }),
            );
        }

        for (index, step) in self.steps.iter().enumerate() {
            let number = index + 1;
            debug!("Scenario step {}: {:?}", number, step);
            match step {
                Step::Push { screen, params } => {
                    manager
                        .push_screen(screen, params.clone())
                        .with_context(|| format!("step {}: push '{}'", number, screen))?;
                }
                Step::Replace { screen, params } => {
                    manager
                        .replace_screen(screen, params.clone())
                        .with_context(|| format!("step {}: replace with '{}'", number, screen))?;
                }
                Step::ChangeParams { params } => {
                    manager
                        .change_params(params.clone())
                        .with_context(|| format!("step {}: change params", number))?;
                }
                Step::Pop => {
                    let popping = manager.pop_screen();
                    futures::pin_mut!(popping);
                    // The first poll issues the pop, so an immediate failure surfaces
                    // before waiting on the driver
                    if let Poll::Ready(result) = futures::poll!(popping.as_mut()) {
                        result.with_context(|| format!("step {}: pop", number))?;
                    } else {
                        driver.deliver_next().await;
                        popping
                            .await
                            .with_context(|| format!("step {}: pop", number))?;
                    }
                }
                Step::Back => {
                    history
                        .back()
                        .with_context(|| format!("step {}: platform back", number))?;
                    driver.deliver_next().await;
                }
                Step::Forward => {
                    history
                        .forward()
                        .with_context(|| format!("step {}: platform forward", number))?;
                    driver.deliver_next().await;
                }
            }
        }

        let stack = history
            .active_entries()
            .into_iter()
            .filter(|entry| entry.record.is_some())
            .map(|entry| entry.display_token)
            .collect();
        let current = manager.current_screen();
        drop(manager);

        let events = std::mem::take(&mut *events.lock().unwrap_or_else(|e| e.into_inner()));
        let changes = std::mem::take(&mut *changes.lock().unwrap_or_else(|e| e.into_inner()));
        info!("Scenario finished after {} step(s)", self.steps.len());

        Ok(Transcript {
            events,
            changes,
            stack,
            current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        let script = Script::from_toml_str(
            r#"
            [[steps]]
            action = "push"
            screen = "list"

            [[steps]]
            action = "change-params"
            params = { page = "2" }

            [[steps]]
            action = "back"
            "#,
        )
        .unwrap();

        assert_eq!(
            script.steps,
            vec![
                Step::Push {
                    screen: "list".into(),
                    params: None
                },
                Step::ChangeParams {
                    params: Some(crate::nav::params([("page", "2")]))
                },
                Step::Back,
            ]
        );
        assert_eq!(script.screen_names().into_iter().collect::<Vec<_>>(), vec!["list"]);
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(Script::from_toml_str("[[steps]]\naction = \"teleport\"\n").is_err());
    }

    #[tokio::test]
    async fn test_failed_pop_does_not_hang() {
        let script = Script {
            steps: vec![Step::Pop],
        };
        let err = script.run(&Config::default()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("step 1: pop"));
    }
}
