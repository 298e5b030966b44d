//! Backend collaborators: project persistence and the conversational "weave"
//! endpoint.
//!
//! The store only talks to [`ProjectBackend`]. Two implementations ship:
//! [`http::HttpBackend`] for the Tapestry server and [`local::LocalBackend`]
//! for the offline cache in browser storage. [`any::AnyBackend`] picks one
//! at startup.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TapestryError};
use crate::model::{ChatMessage, Edge, Node, PerspectiveType, Project, ProjectSummary};

pub mod any;
pub mod http;
pub mod local;

/// Graph and chat payload of a project, as stored and as saved.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectData {
	/// Entities.
	pub nodes: Vec<Node>,
	/// Relations.
	pub edges: Vec<Edge>,
	/// Conversation log.
	pub messages: Vec<ChatMessage>,
	/// Perspective to reopen with.
	pub active_perspective: PerspectiveType,
}

/// Body of a save request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SavePayload {
	/// Project being saved.
	pub id: String,
	/// Project name.
	pub name: String,
	/// Full graph and chat state.
	pub data: ProjectData,
}

/// Conversational update request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeaveRequest {
	/// The new user message.
	pub message: String,
	/// Current entities.
	pub nodes: Vec<Node>,
	/// Current relations.
	pub edges: Vec<Edge>,
	/// Log before `message`.
	pub history: Vec<ChatMessage>,
}

/// Conversational update response. Its graph replaces the store's graph.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeaveResponse {
	/// Assistant answer appended to the log.
	pub reply: String,
	/// Replacement entities.
	pub nodes: Vec<Node>,
	/// Replacement relations.
	pub edges: Vec<Edge>,
}

/// Project as returned by the load endpoint.
///
/// Graph fields may be nested under `data` or sit at the top level; nested
/// values win. Every graph field is decoded leniently so one corrupt field
/// degrades to an empty default instead of failing the load.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
	/// Project id.
	pub id: String,
	/// Project name.
	pub name: String,
	/// Nested graph payload.
	#[serde(default)]
	pub data: Option<Value>,
	/// Top-level entities.
	#[serde(default)]
	pub nodes: Option<Value>,
	/// Top-level relations.
	#[serde(default)]
	pub edges: Option<Value>,
	/// Top-level conversation log.
	#[serde(default)]
	pub messages: Option<Value>,
	/// Top-level perspective.
	#[serde(default)]
	pub active_perspective: Option<Value>,
}

impl ProjectRecord {
	/// Resolve into a [`Project`], nested fields first.
	pub fn into_project(self) -> Project {
		let data = self.data.unwrap_or(Value::Null);
		let pick = |field: &str, top: Option<Value>| -> Option<Value> {
			data.get(field)
				.filter(|v| !v.is_null())
				.cloned()
				.or(top.filter(|v| !v.is_null()))
		};

		let nodes = pick("nodes", self.nodes);
		let edges = pick("edges", self.edges);
		let messages = pick("messages", self.messages);
		let perspective = pick("activePerspective", self.active_perspective);

		Project {
			nodes: decode_or_default(&self.id, "nodes", nodes),
			edges: decode_or_default(&self.id, "edges", edges),
			messages: decode_or_default(&self.id, "messages", messages),
			perspective: decode_or_default(&self.id, "activePerspective", perspective),
			id: self.id,
			name: self.name,
		}
	}
}

pub(crate) fn decode_or_default<T: DeserializeOwned + Default>(
	project: &str,
	field: &str,
	value: Option<Value>,
) -> T {
	let Some(value) = value else {
		return T::default();
	};
	serde_json::from_value(value).unwrap_or_else(|e| {
		log::warn!("tapestry: project {project} has malformed {field}, using empty: {e}");
		T::default()
	})
}

/// Project persistence and conversational updates.
///
/// All futures run on the single UI thread, so nothing here needs `Send`.
#[allow(async_fn_in_trait)]
pub trait ProjectBackend {
	/// Known projects, most recently updated first.
	async fn list_projects(&self) -> Result<Vec<ProjectSummary>>;

	async fn create_project(&self, name: &str) -> Result<ProjectSummary>;

	async fn load_project(&self, id: &str) -> Result<Project>;

	/// Overwrites the stored project. Last writer wins.
	async fn save_project(&self, payload: &SavePayload) -> Result<()>;

	async fn delete_project(&self, id: &str) -> Result<()>;

	async fn weave(&self, _request: &WeaveRequest) -> Result<WeaveResponse> {
		Err(TapestryError::Unsupported("weave"))
	}

	/// Remember which project is open so the next session can reopen it.
	async fn remember_active(&self, _id: Option<&str>) -> Result<()> {
		Ok(())
	}

	async fn last_active(&self) -> Result<Option<String>> {
		Ok(None)
	}
}
