//! UI resume state helpers.
//!
//! Every helper stamps `lastActivity` and persists, except
//! [`SessionManager::add_completed_step`] when the step is already recorded.

use super::manager::SessionManager;
use super::model::{AppState, AppStatePatch};
use crate::error::{Result, SessionError};
use serde_json::{Map, Value};
use tracing::debug;

impl SessionManager {
    /// Current app state, with `lastActivity` defaulted to now when unset.
    pub fn current_app_state(&self) -> AppState {
        let mut state = self.session.app_state.clone();
        if state.last_activity.is_none() {
            state.last_activity = Some(self.clock.now());
        }
        state
    }

    /// Applies the `Some` fields of `patch` and persists.
    pub async fn update_app_state(&mut self, patch: AppStatePatch) -> AppState {
        let state = &mut self.session.app_state;
        if let Some(page) = patch.current_page {
            state.current_page = Some(page);
        }
        if let Some(started) = patch.navigation_started {
            state.navigation_started = started;
        }
        if let Some(form) = patch.pickup_form_data {
            state.pickup_form_data = form;
        }
        if let Some(steps) = patch.completed_steps {
            state.completed_steps = steps.into_iter().collect();
        }
        self.touch_activity();
        self.save().await;
        self.session.app_state.clone()
    }

    pub async fn set_current_page(&mut self, page: impl Into<String>) {
        self.session.app_state.current_page = Some(page.into());
        self.touch_activity();
        self.save().await;
    }

    pub async fn set_navigation_started(&mut self, started: bool) {
        self.session.app_state.navigation_started = started;
        self.touch_activity();
        self.save().await;
    }

    /// Merges `form` into the stored pickup form, key by key.
    pub async fn update_pickup_form_data(&mut self, form: Map<String, Value>) {
        self.session.app_state.pickup_form_data.extend(form);
        self.touch_activity();
        self.save().await;
    }

    /// Records a completed step.
    ///
    /// # Returns
    ///
    /// `false` if the step was already recorded; nothing is saved then.
    pub async fn add_completed_step(&mut self, step: impl Into<String>) -> bool {
        if !self.session.app_state.completed_steps.insert(step.into()) {
            return false;
        }
        self.touch_activity();
        self.save().await;
        true
    }

    pub(super) fn touch_activity(&mut self) {
        self.session.app_state.last_activity = Some(self.clock.now());
    }

    /// Overlays an app state received from the backend on the local one.
    ///
    /// Top-level keys of `remote` replace local ones; keys may be camelCase
    /// or snake_case. Does not persist.
    pub(super) fn merge_remote_app_state(&mut self, remote: Value) -> Result<()> {
        let Value::Object(remote) = remote else {
            return Err(SessionError::MalformedResponse(
                "app_state is not an object".to_string(),
            ));
        };
        let Value::Object(mut local) = serde_json::to_value(&self.session.app_state)? else {
            return Err(SessionError::MalformedResponse(
                "local app state did not serialize to an object".to_string(),
            ));
        };

        for (key, value) in remote {
            local.insert(camel_case(&key), value);
        }

        self.session.app_state = serde_json::from_value(Value::Object(local))?;
        debug!("[Session] Merged remote app state");
        Ok(())
    }
}

fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
