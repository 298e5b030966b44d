//! Offline project cache in a key/value store (browser `localStorage`).
//!
//! Layout under a key prefix:
//! - `{prefix}:projects`: JSON list of [`ProjectSummary`], most recent first
//! - `{prefix}:active`: id of the project last opened
//! - `{prefix}:project:{id}`: JSON [`ProjectData`] blob

use std::cell::RefCell;
use std::collections::HashMap;

use super::{ProjectBackend, ProjectData, SavePayload};
use crate::error::{Result, TapestryError};
use crate::model::{Project, ProjectSummary};

/// Minimal string key/value storage.
pub trait KeyValueStorage {
	/// Value under `key`, if any.
	fn get(&self, key: &str) -> Result<Option<String>>;
	/// Store `value` under `key`, replacing what was there.
	fn set(&self, key: &str, value: &str) -> Result<()>;
	/// Drop `key`. Missing keys are not an error.
	fn remove(&self, key: &str) -> Result<()>;
}

/// In-process storage, used when the browser refuses `localStorage`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
	entries: RefCell<HashMap<String, String>>,
}

impl KeyValueStorage for MemoryStorage {
	fn get(&self, key: &str) -> Result<Option<String>> {
		Ok(self.entries.borrow().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		self.entries
			.borrow_mut()
			.insert(key.to_string(), value.to_string());
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<()> {
		self.entries.borrow_mut().remove(key);
		Ok(())
	}
}

/// `window.localStorage`.
#[derive(Clone, Debug)]
pub struct BrowserStorage {
	storage: web_sys::Storage,
}

impl BrowserStorage {
	/// Open the window's `localStorage`; fails outside a browser or when the
	/// user disabled storage.
	pub fn local() -> Result<Self> {
		let window =
			web_sys::window().ok_or_else(|| TapestryError::Storage("no window".to_string()))?;
		let storage = window
			.local_storage()
			.map_err(|e| TapestryError::Storage(format!("{e:?}")))?
			.ok_or_else(|| TapestryError::Storage("localStorage disabled".to_string()))?;
		Ok(Self { storage })
	}
}

impl KeyValueStorage for BrowserStorage {
	fn get(&self, key: &str) -> Result<Option<String>> {
		self.storage
			.get_item(key)
			.map_err(|e| TapestryError::Storage(format!("{e:?}")))
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		self.storage
			.set_item(key, value)
			.map_err(|e| TapestryError::Storage(format!("{e:?}")))
	}

	fn remove(&self, key: &str) -> Result<()> {
		self.storage
			.remove_item(key)
			.map_err(|e| TapestryError::Storage(format!("{e:?}")))
	}
}

/// [`ProjectBackend`] persisting everything into a [`KeyValueStorage`].
#[derive(Debug)]
pub struct LocalBackend<S> {
	storage: S,
	prefix: String,
}

impl<S: KeyValueStorage> LocalBackend<S> {
	/// Cache rooted at the `tapestry` key prefix.
	pub fn new(storage: S) -> Self {
		Self {
			storage,
			prefix: "tapestry".to_string(),
		}
	}

	#[cfg(test)]
	fn storage(&self) -> &S {
		&self.storage
	}

	fn index_key(&self) -> String {
		format!("{}:projects", self.prefix)
	}

	fn active_key(&self) -> String {
		format!("{}:active", self.prefix)
	}

	fn project_key(&self, id: &str) -> String {
		format!("{}:project:{id}", self.prefix)
	}

	/// A corrupt index is treated as empty rather than locking the user out.
	fn read_index(&self) -> Result<Vec<ProjectSummary>> {
		let Some(raw) = self.storage.get(&self.index_key())? else {
			return Ok(Vec::new());
		};
		Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
			log::warn!("tapestry: project index is corrupt, starting fresh: {e}");
			Vec::new()
		}))
	}

	fn write_index(&self, index: &[ProjectSummary]) -> Result<()> {
		self.storage
			.set(&self.index_key(), &serde_json::to_string(index)?)
	}

	fn write_data(&self, id: &str, data: &ProjectData) -> Result<()> {
		self.storage
			.set(&self.project_key(id), &serde_json::to_string(data)?)
	}
}

impl<S: KeyValueStorage> ProjectBackend for LocalBackend<S> {
	async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
		self.read_index()
	}

	async fn create_project(&self, name: &str) -> Result<ProjectSummary> {
		let summary = ProjectSummary {
			id: uuid::Uuid::new_v4().to_string(),
			name: name.to_string(),
			updated_at: None,
		};
		self.write_data(&summary.id, &ProjectData::default())?;
		let mut index = self.read_index()?;
		index.insert(0, summary.clone());
		self.write_index(&index)?;
		Ok(summary)
	}

	async fn load_project(&self, id: &str) -> Result<Project> {
		let index = self.read_index()?;
		let summary = index
			.iter()
			.find(|p| p.id == id)
			.ok_or_else(|| TapestryError::ProjectNotFound(id.to_string()))?;

		let data: ProjectData = match self.storage.get(&self.project_key(id))? {
			Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
				log::warn!("tapestry: cached project {id} is corrupt, loading empty: {e}");
				ProjectData::default()
			}),
			None => ProjectData::default(),
		};

		Ok(Project {
			id: summary.id.clone(),
			name: summary.name.clone(),
			perspective: data.active_perspective,
			nodes: data.nodes,
			edges: data.edges,
			messages: data.messages,
		})
	}

	async fn save_project(&self, payload: &SavePayload) -> Result<()> {
		let mut index = self.read_index()?;
		let pos = index
			.iter()
			.position(|p| p.id == payload.id)
			.ok_or_else(|| TapestryError::ProjectNotFound(payload.id.clone()))?;

		self.write_data(&payload.id, &payload.data)?;

		// Most recently saved first.
		let mut summary = index.remove(pos);
		summary.name = payload.name.clone();
		index.insert(0, summary);
		self.write_index(&index)
	}

	async fn delete_project(&self, id: &str) -> Result<()> {
		let mut index = self.read_index()?;
		let before = index.len();
		index.retain(|p| p.id != id);
		if index.len() == before {
			return Err(TapestryError::ProjectNotFound(id.to_string()));
		}
		self.write_index(&index)?;
		self.storage.remove(&self.project_key(id))?;
		if self.storage.get(&self.active_key())?.as_deref() == Some(id) {
			self.storage.remove(&self.active_key())?;
		}
		Ok(())
	}

	async fn remember_active(&self, id: Option<&str>) -> Result<()> {
		match id {
			Some(id) => self.storage.set(&self.active_key(), id),
			None => self.storage.remove(&self.active_key()),
		}
	}

	async fn last_active(&self) -> Result<Option<String>> {
		self.storage.get(&self.active_key())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{Node, NodeType, PerspectiveType};
	use futures::executor::block_on;

	fn backend() -> LocalBackend<MemoryStorage> {
		LocalBackend::new(MemoryStorage::default())
	}

	#[test]
	fn create_save_load_round_trip() {
		let backend = backend();
		block_on(async {
			let created = backend.create_project("Realm").await.unwrap();
			let data = ProjectData {
				nodes: vec![Node::new("n1", "Bob", NodeType::Person)],
				active_perspective: PerspectiveType::Timeline,
				..ProjectData::default()
			};
			backend
				.save_project(&SavePayload {
					id: created.id.clone(),
					name: "Realm II".into(),
					data,
				})
				.await
				.unwrap();

			let loaded = backend.load_project(&created.id).await.unwrap();
			assert_eq!(loaded.name, "Realm II");
			assert_eq!(loaded.nodes.len(), 1);
			assert_eq!(loaded.perspective, PerspectiveType::Timeline);
		});
	}

	#[test]
	fn list_is_most_recently_saved_first() {
		let backend = backend();
		block_on(async {
			let a = backend.create_project("A").await.unwrap();
			let b = backend.create_project("B").await.unwrap();
			let names: Vec<_> = backend
				.list_projects()
				.await
				.unwrap()
				.into_iter()
				.map(|p| p.name)
				.collect();
			assert_eq!(names, vec!["B", "A"]);

			backend
				.save_project(&SavePayload {
					id: a.id.clone(),
					name: "A".into(),
					data: ProjectData::default(),
				})
				.await
				.unwrap();
			let first = backend.list_projects().await.unwrap().remove(0);
			assert_eq!(first.id, a.id);
			assert_ne!(first.id, b.id);
		});
	}

	#[test]
	fn corrupt_blob_loads_as_empty_project() {
		let backend = backend();
		block_on(async {
			let created = backend.create_project("Realm").await.unwrap();
			backend
				.storage()
				.set(&format!("tapestry:project:{}", created.id), "{not json")
				.unwrap();
			let loaded = backend.load_project(&created.id).await.unwrap();
			assert_eq!(loaded.name, "Realm");
			assert!(loaded.nodes.is_empty());
			assert_eq!(loaded.perspective, PerspectiveType::Abstract);
		});
	}

	#[test]
	fn missing_project_is_not_found() {
		let backend = backend();
		block_on(async {
			assert!(matches!(
				backend.load_project("nope").await,
				Err(TapestryError::ProjectNotFound(_))
			));
			assert!(matches!(
				backend.delete_project("nope").await,
				Err(TapestryError::ProjectNotFound(_))
			));
		});
	}

	#[test]
	fn deleting_active_project_clears_pointer() {
		let backend = backend();
		block_on(async {
			let created = backend.create_project("Realm").await.unwrap();
			backend.remember_active(Some(&created.id)).await.unwrap();
			assert_eq!(backend.last_active().await.unwrap(), Some(created.id.clone()));
			backend.delete_project(&created.id).await.unwrap();
			assert_eq!(backend.last_active().await.unwrap(), None);
			assert!(backend.list_projects().await.unwrap().is_empty());
		});
	}
}
