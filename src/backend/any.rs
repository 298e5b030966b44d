//! Backend chosen at startup from [`TapestryConfig`].

use super::http::HttpBackend;
use super::local::{BrowserStorage, LocalBackend, MemoryStorage};
use super::{ProjectBackend, SavePayload, WeaveRequest, WeaveResponse};
use crate::config::{StorageKind, TapestryConfig};
use crate::error::Result;
use crate::model::{Project, ProjectSummary};

/// Where project records live.
pub enum ProjectStorage {
	/// HTTP API; the active-project pointer stays in browser storage when
	/// there is any.
	Remote {
		/// Project API client.
		http: HttpBackend,
		/// Keeper of the last-active project id.
		pointer: Option<LocalBackend<BrowserStorage>>,
	},
	/// Browser `localStorage`.
	Local(LocalBackend<BrowserStorage>),
	/// Used when `localStorage` is unavailable; nothing outlives the page.
	Memory(LocalBackend<MemoryStorage>),
}

/// Project storage of either kind plus the HTTP weave endpoint, which is
/// always remote.
pub struct AnyBackend {
	/// Project persistence.
	pub storage: ProjectStorage,
	/// Chat endpoint.
	pub weaver: HttpBackend,
}

impl AnyBackend {
	/// Pick storage per [`TapestryConfig::storage`]; local mode degrades to
	/// memory when `localStorage` is unavailable.
	pub fn from_config(config: &TapestryConfig) -> Self {
		let http = HttpBackend::new(config.api_base_url.clone())
			.with_bearer_token(config.bearer_token.clone());
		let browser = match BrowserStorage::local() {
			Ok(storage) => Some(LocalBackend::new(storage)),
			Err(e) => {
				log::warn!("tapestry: {e}");
				None
			}
		};
		let storage = match (config.storage, browser) {
			(StorageKind::Remote, pointer) => ProjectStorage::Remote {
				http: http.clone(),
				pointer,
			},
			(StorageKind::Local, Some(local)) => ProjectStorage::Local(local),
			(StorageKind::Local, None) => {
				log::warn!("tapestry: falling back to in-memory projects");
				ProjectStorage::Memory(LocalBackend::new(MemoryStorage::default()))
			}
		};
		Self {
			storage,
			weaver: http,
		}
	}
}

macro_rules! delegate {
	($self:ident, $b:ident => $call:expr) => {
		match &$self.storage {
			ProjectStorage::Remote { http: $b, .. } => $call,
			ProjectStorage::Local($b) => $call,
			ProjectStorage::Memory($b) => $call,
		}
	};
}

impl ProjectBackend for AnyBackend {
	async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
		delegate!(self, b => b.list_projects().await)
	}

	async fn create_project(&self, name: &str) -> Result<ProjectSummary> {
		delegate!(self, b => b.create_project(name).await)
	}

	async fn load_project(&self, id: &str) -> Result<Project> {
		delegate!(self, b => b.load_project(id).await)
	}

	async fn save_project(&self, payload: &SavePayload) -> Result<()> {
		delegate!(self, b => b.save_project(payload).await)
	}

	async fn delete_project(&self, id: &str) -> Result<()> {
		delegate!(self, b => b.delete_project(id).await)
	}

	async fn weave(&self, request: &WeaveRequest) -> Result<WeaveResponse> {
		self.weaver.weave(request).await
	}

	async fn remember_active(&self, id: Option<&str>) -> Result<()> {
		match &self.storage {
			ProjectStorage::Remote { pointer: Some(p), .. } => p.remember_active(id).await,
			ProjectStorage::Remote { pointer: None, .. } => Ok(()),
			ProjectStorage::Local(b) => b.remember_active(id).await,
			ProjectStorage::Memory(b) => b.remember_active(id).await,
		}
	}

	async fn last_active(&self) -> Result<Option<String>> {
		match &self.storage {
			ProjectStorage::Remote { pointer: Some(p), .. } => p.last_active().await,
			ProjectStorage::Remote { pointer: None, .. } => Ok(None),
			ProjectStorage::Local(b) => b.last_active().await,
			ProjectStorage::Memory(b) => b.last_active().await,
		}
	}
}
