//! Navigation state values and the history record they are stored as

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NavError, Result};

/// Screen parameters, kept in key order so display tokens are deterministic
pub type Params = BTreeMap<String, String>;

/// Build a [`Params`] map from key/value pairs
pub fn params<I, K, V>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// One entry of the logical screen stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavState {
    name: String,
    params: Option<Params>,
}

impl NavState {
    /// Fails with [`NavError::InvalidArgument`] if `name` is empty or blank
    pub fn new(name: impl Into<String>, params: Option<Params>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, params })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> Option<&Params> {
        self.params.as_ref()
    }

    /// Look up a single parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.as_ref()?.get(key).map(String::as_str)
    }
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(NavError::InvalidArgument(
            "cannot build state without a screen name".to_string(),
        ));
    }
    Ok(())
}

/// Direction of a history traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    Back,
    Forward,
}

/// Old and new top of stack around a confirmed transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub old_state: Option<NavState>,
    pub new_state: Option<NavState>,
    /// Set when the transition was a back/forward traversal, `None` for
    /// push and replace
    pub traversal: Option<Traversal>,
}

impl StateChange {
    pub fn old_name(&self) -> Option<&str> {
        self.old_state.as_ref().map(NavState::name)
    }

    pub fn new_name(&self) -> Option<&str> {
        self.new_state.as_ref().map(NavState::name)
    }
}

/// Serialized form of a [`NavState`] as handed to the history backend.
///
/// The backend treats it as opaque; `app_base` identifies records written by
/// this application so foreign entries decode as "outside the app". `depth`
/// is the entry's position in the application's stack, which tells a forward
/// traversal from a back one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub app_base: String,
    pub display_token: String,
    pub name: String,
    #[serde(default)]
    pub params: Option<Params>,
    #[serde(default)]
    pub depth: usize,
}

impl StateRecord {
    pub fn new(app_base: &str, display_token: String, state: &NavState, depth: usize) -> Self {
        Self {
            app_base: app_base.to_string(),
            display_token,
            name: state.name.clone(),
            params: state.params.clone(),
            depth,
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse a backend record written for `app_base`
    pub fn parse(value: &Value, app_base: &str) -> Option<Self> {
        let record: StateRecord = serde_json::from_value(value.clone()).ok()?;
        (record.app_base == app_base).then_some(record)
    }

    pub fn into_state(self) -> Option<NavState> {
        NavState::new(self.name, self.params).ok()
    }

    /// Decode a backend record. Returns `None` for records that belong to a
    /// different application address or do not describe a screen.
    pub fn decode(value: &Value, app_base: &str) -> Option<NavState> {
        Self::parse(value, app_base)?.into_state()
    }
}
