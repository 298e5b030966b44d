//! Runtime configuration embedded in the host page.
//!
//! The page carries a `<script id="tapestry-config" type="application/json">`
//! element; every field is optional.

use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;
use wasm_bindgen::JsCast;
use web_sys::{HtmlScriptElement, Window};

use crate::store::StoreOptions;

/// Id of the script element holding the JSON config.
pub const CONFIG_ELEMENT_ID: &str = "tapestry-config";

/// Where projects are persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
	/// The HTTP project API.
	#[default]
	Remote,
	/// Browser `localStorage` only.
	Local,
}

/// Page-level settings. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TapestryConfig {
	/// Base URL of the project and weave API.
	pub api_base_url: String,
	/// Where projects are kept.
	pub storage: StorageKind,
	/// Sent as `Authorization: Bearer` when set.
	pub bearer_token: Option<String>,
	/// Autosave quiet period in milliseconds.
	pub autosave_quiet_ms: u64,
	/// Name for implicitly created projects.
	pub default_project_name: String,
}

impl Default for TapestryConfig {
	fn default() -> Self {
		let options = StoreOptions::default();
		Self {
			api_base_url: "http://localhost:3000".to_string(),
			storage: StorageKind::Remote,
			bearer_token: None,
			autosave_quiet_ms: u64::try_from(options.autosave_quiet.as_millis()).unwrap_or(u64::MAX),
			default_project_name: options.default_project_name,
		}
	}
}

impl TapestryConfig {
	/// Parse a config document. Malformed JSON falls back to defaults.
	pub fn from_json(text: &str) -> Self {
		match serde_json::from_str(text) {
			Ok(config) => config,
			Err(e) => {
				warn!("tapestry: failed to parse config, using defaults: {}", e);
				Self::default()
			}
		}
	}

	/// Read the config element from the current document, if there is one.
	pub fn from_document() -> Self {
		match read_config_text() {
			Some(text) => {
				let config = Self::from_json(&text);
				info!(
					"tapestry: config loaded ({:?} storage, {})",
					config.storage, config.api_base_url
				);
				config
			}
			None => Self::default(),
		}
	}

	/// Store tunables derived from this config.
	pub fn store_options(&self) -> StoreOptions {
		StoreOptions {
			autosave_quiet: Duration::from_millis(self.autosave_quiet_ms),
			default_project_name: self.default_project_name.clone(),
		}
	}
}

fn read_config_text() -> Option<String> {
	let window: Window = web_sys::window()?;
	let document = window.document()?;
	let element = document.get_element_by_id(CONFIG_ELEMENT_ID)?;
	let script: HtmlScriptElement = element.dyn_into().ok()?;
	script.text().ok()
}
