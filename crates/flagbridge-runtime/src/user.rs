//! User facade

use crate::error::BridgeResult;
use crate::ffi::handle::{HandleKind, NativeHandle};
use crate::ffi::marshal::encode_json;
use crate::ffi::Bridge;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// User attributes as sent to the engine
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UserData {
    #[serde(rename = "userID", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "customIDs", skip_serializing_if = "Option::is_none")]
    pub custom_ids: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "userAgent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(rename = "appVersion", skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<HashMap<String, Value>>,
    #[serde(rename = "privateAttributes", skip_serializing_if = "Option::is_none")]
    pub private_attributes: Option<HashMap<String, Value>>,
    #[serde(rename = "statsigEnvironment", skip_serializing_if = "Option::is_none")]
    pub environment: Option<HashMap<String, String>>,
}

/// Builder for [`User`]
#[derive(Debug, Clone, Default)]
pub struct UserBuilder {
    data: UserData,
}

impl UserBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.data.user_id = Some(user_id.into());
        self
    }

    pub fn custom_id(mut self, id_type: impl Into<String>, id: impl Into<String>) -> Self {
        self.data
            .custom_ids
            .get_or_insert_with(HashMap::new)
            .insert(id_type.into(), id.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.data.email = Some(email.into());
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.data.ip = Some(ip.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.data.user_agent = Some(user_agent.into());
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.data.country = Some(country.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.data.locale = Some(locale.into());
        self
    }

    pub fn app_version(mut self, app_version: impl Into<String>) -> Self {
        self.data.app_version = Some(app_version.into());
        self
    }

    pub fn custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data
            .custom
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn private_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data
            .private_attributes
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Environment tier, e.g. `"staging"`
    pub fn environment_tier(mut self, tier: impl Into<String>) -> Self {
        self.data
            .environment
            .get_or_insert_with(HashMap::new)
            .insert("tier".to_string(), tier.into());
        self
    }

    pub fn data(&self) -> &UserData {
        &self.data
    }

    /// Create the native user through the process-wide bridge.
    pub fn build(self) -> BridgeResult<User> {
        self.build_in(Bridge::global()?)
    }

    pub fn build_in(self, bridge: &Bridge) -> BridgeResult<User> {
        let json = encode_json(&self.data, "user")?;
        let api = bridge.api();
        let raw = unsafe { (api.user_create_from_data)(json.as_ptr()) };
        let handle = NativeHandle::new(raw, HandleKind::User, api.user_release)?;
        Ok(User {
            handle,
            data: self.data,
        })
    }
}

/// A user known to the native engine
#[derive(Debug)]
pub struct User {
    handle: NativeHandle,
    data: UserData,
}

impl User {
    pub fn builder() -> UserBuilder {
        UserBuilder::new()
    }

    /// Shorthand for a user with only a user id.
    pub fn with_user_id(user_id: impl Into<String>) -> BridgeResult<User> {
        UserBuilder::new().user_id(user_id).build()
    }

    pub fn data(&self) -> &UserData {
        &self.data
    }

    /// Native handle, `0` once released
    pub fn raw(&self) -> u64 {
        self.handle.raw()
    }

    /// Release the native user. Later queries with it return defaults.
    pub fn release(&self) -> bool {
        self.handle.release()
    }
}
