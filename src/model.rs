//! Graph model: the entity and value types shared by the store, the backend
//! collaborators and the canvas.
//!
//! Field names serialize in camelCase so payloads match what the backend and
//! the local cache already hold.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Open attribute map attached to every node.
pub type Attributes = Map<String, Value>;

/// Category of a node. Drives the node color on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
	/// Someone in the world.
	Person,
	/// A location; map-eligible when it has coordinates.
	Place,
	/// An object, artifact or concept.
	Thing,
	/// Something that happened; timeline-eligible with a timestamp.
	Event,
	/// Any category the backend invents that we do not know about yet.
	#[serde(other)]
	Unknown,
}

/// A knowledge-graph entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
	/// Unique within a project. Edges reference nodes by this id.
	pub id: String,
	/// Display name drawn under the node.
	pub label: String,
	/// Category, serialized as `type`.
	#[serde(rename = "type")]
	pub kind: NodeType,
	/// Free-text description.
	#[serde(default)]
	pub description: Option<String>,
	/// Recognized keys: `coordinates`, `timestamp`, `locationType`,
	/// `extraInfo`. Everything else is passed through untouched.
	#[serde(default)]
	pub attributes: Attributes,
}

impl Node {
	/// Node without description or attributes.
	pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeType) -> Self {
		Self {
			id: id.into(),
			label: label.into(),
			kind,
			description: None,
			attributes: Attributes::new(),
		}
	}

	/// Builder-style attribute setter.
	pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
		self.attributes.insert(key.into(), value);
		self
	}

	/// True when the `coordinates` attribute holds a usable value.
	pub fn has_coordinates(&self) -> bool {
		self.attributes.get("coordinates").is_some_and(is_set)
	}

	/// True when the `timestamp` attribute holds a usable value. An empty
	/// string counts as no timestamp.
	pub fn has_timestamp(&self) -> bool {
		self.attributes.get("timestamp").is_some_and(is_set)
	}

	/// The `timestamp` attribute when it is a non-empty string.
	pub fn timestamp(&self) -> Option<&str> {
		self.attributes
			.get("timestamp")
			.and_then(Value::as_str)
			.filter(|s| !s.is_empty())
	}
}

/// Attribute presence: null, `false`, zero and `""` all mean unset.
fn is_set(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
		Value::String(s) => !s.is_empty(),
		Value::Array(_) | Value::Object(_) => true,
	}
}

/// A typed relation between two nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
	/// Unique within a project.
	pub id: String,
	/// Id of the node the relation starts at.
	pub source_id: String,
	/// Id of the node the relation points to.
	pub target_id: String,
	/// Semantic relation label, e.g. "lives in".
	pub predicate: String,
}

impl Edge {
	/// Edge from `source_id` to `target_id`.
	pub fn new(
		id: impl Into<String>,
		source_id: impl Into<String>,
		target_id: impl Into<String>,
		predicate: impl Into<String>,
	) -> Self {
		Self {
			id: id.into(),
			source_id: source_id.into(),
			target_id: target_id.into(),
			predicate: predicate.into(),
		}
	}
}

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
	/// Typed by the person building the world.
	User,
	/// Reply from the weave endpoint.
	Assistant,
}

/// One entry of the append-only conversation log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
	/// Who wrote it.
	pub role: ChatRole,
	/// Message text.
	pub content: String,
	/// Epoch milliseconds.
	pub timestamp: f64,
}

/// Visual projection of the graph. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PerspectiveType {
	/// Force-directed graph, the only perspective the canvas renders.
	#[default]
	Abstract,
	/// Places plotted by their coordinates.
	Map,
	/// Dated nodes in chronological order.
	Timeline,
	/// Kinship view.
	FamilyTree,
	/// Tabular listing.
	Ledger,
}

impl PerspectiveType {
	/// Every perspective, in switcher order.
	pub const ALL: [PerspectiveType; 5] = [
		PerspectiveType::Abstract,
		PerspectiveType::Map,
		PerspectiveType::Timeline,
		PerspectiveType::FamilyTree,
		PerspectiveType::Ledger,
	];

	/// Wire name, e.g. `family-tree`.
	pub fn as_str(self) -> &'static str {
		match self {
			PerspectiveType::Abstract => "abstract",
			PerspectiveType::Map => "map",
			PerspectiveType::Timeline => "timeline",
			PerspectiveType::FamilyTree => "family-tree",
			PerspectiveType::Ledger => "ledger",
		}
	}

	/// Label for the perspective switcher.
	pub fn display_name(self) -> &'static str {
		match self {
			PerspectiveType::Abstract => "Graph",
			PerspectiveType::Map => "Map",
			PerspectiveType::Timeline => "Timeline",
			PerspectiveType::FamilyTree => "Family Tree",
			PerspectiveType::Ledger => "Ledger",
		}
	}
}

impl fmt::Display for PerspectiveType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PerspectiveType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		PerspectiveType::ALL
			.into_iter()
			.find(|p| p.as_str() == s)
			.ok_or_else(|| format!("unknown perspective: {s}"))
	}
}

// Stored payloads may carry perspectives this build does not know, or none.
impl<'de> Deserialize<'de> for PerspectiveType {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = Option::<String>::deserialize(deserializer)?;
		Ok(raw
			.and_then(|s| s.parse().ok())
			.unwrap_or_default())
	}
}

/// The unit of persistence: one named world with its graph and chat log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
	/// Backend-assigned id.
	pub id: String,
	/// Human-readable name.
	pub name: String,
	/// Perspective active when last saved.
	pub perspective: PerspectiveType,
	/// Entities.
	pub nodes: Vec<Node>,
	/// Relations.
	pub edges: Vec<Edge>,
	/// Conversation log.
	pub messages: Vec<ChatMessage>,
}

/// List-level view of a project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
	/// Project id.
	pub id: String,
	/// Project name.
	pub name: String,
	/// Last modification time as reported by the backend.
	#[serde(default, alias = "updated_at")]
	pub updated_at: Option<String>,
}
