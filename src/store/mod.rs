//! The authoritative graph state for the active project.
//!
//! [`TapestryStore`] is a cheap, clonable handle over shared single-threaded
//! state. Every mutation goes through one commit path:
//!
//! 1. apply the change,
//! 2. recompute the [`Projection`],
//! 3. hand the saveable snapshot to the autosave debouncer,
//! 4. notify subscribers (the canvas reconciles its simulation there).
//!
//! Backend round trips are `async` and never hold a borrow across an await,
//! so mutations keep flowing while a load, save or chat request is in flight.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::future::{AbortHandle, Abortable, Aborted};

use crate::backend::{ProjectBackend, ProjectData, WeaveRequest};
use crate::error::Result;
use crate::model::{
	ChatMessage, ChatRole, Edge, Node, PerspectiveType, Project, ProjectSummary,
};
use crate::projector::Projection;
use crate::runtime::Runtime;

mod autosave;

pub use autosave::SaveSnapshot;
use autosave::Autosave;

/// Project name shown while nothing is open.
pub const NO_PROJECT_NAME: &str = "No Project Selected";

/// Everything observable about the store.
#[derive(Clone, Debug, PartialEq)]
pub struct TapestryState {
	/// Active project, `None` before one is opened or while a deleted one
	/// is replaced.
	pub project_id: Option<String>,
	/// Name of the active project.
	pub project_name: String,
	/// Known projects, as last listed.
	pub project_list: Vec<ProjectSummary>,
	/// Entities, unique by id.
	pub nodes: Vec<Node>,
	/// Relations. May reference missing nodes.
	pub edges: Vec<Edge>,
	/// Append-only conversation log.
	pub messages: Vec<ChatMessage>,
	/// Perspective currently shown.
	pub active_perspective: PerspectiveType,
	/// A load, create, delete or chat round trip is running.
	pub is_loading: bool,
	/// At least one autosave is in flight.
	pub is_saving: bool,
	/// Message of the last failed backend operation, cleared on success.
	pub last_error: Option<String>,
	/// Derived views, always in sync with `nodes`/`edges`/`messages`.
	pub projection: Projection,
}

impl Default for TapestryState {
	fn default() -> Self {
		Self {
			project_id: None,
			project_name: NO_PROJECT_NAME.to_string(),
			project_list: Vec::new(),
			nodes: Vec::new(),
			edges: Vec::new(),
			messages: Vec::new(),
			active_perspective: PerspectiveType::Abstract,
			is_loading: false,
			is_saving: false,
			last_error: None,
			projection: Projection::default(),
		}
	}
}

impl TapestryState {
	/// The persisted part of the state.
	pub fn save_snapshot(&self) -> SaveSnapshot {
		SaveSnapshot {
			id: self.project_id.clone(),
			name: self.project_name.clone(),
			data: ProjectData {
				nodes: self.nodes.clone(),
				edges: self.edges.clone(),
				messages: self.messages.clone(),
				active_perspective: self.active_perspective,
			},
		}
	}

	fn clear_project(&mut self) {
		self.project_id = None;
		self.project_name = NO_PROJECT_NAME.to_string();
		self.nodes.clear();
		self.edges.clear();
		self.messages.clear();
		self.active_perspective = PerspectiveType::Abstract;
	}
}

/// Tunables for [`TapestryStore`].
#[derive(Clone, Debug)]
pub struct StoreOptions {
	/// Inactivity required before an autosave fires.
	pub autosave_quiet: Duration,
	/// Name used when a project has to be created implicitly.
	pub default_project_name: String,
}

impl Default for StoreOptions {
	fn default() -> Self {
		Self {
			autosave_quiet: Duration::from_millis(2000),
			default_project_name: "Untitled Tapestry".to_string(),
		}
	}
}

/// What happened to a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatOutcome {
	/// Blank input, nothing sent.
	Ignored,
	/// The reply and its graph were applied.
	Applied,
	/// A newer request or a project switch arrived first; reply discarded.
	Superseded,
}

/// Handle returned by [`TapestryStore::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&TapestryState)>;

/// Whether a commit counts as a user edit or as freshly loaded data.
#[derive(Clone, Copy, PartialEq, Eq)]
enum SavePolicy {
	Schedule,
	Rebase,
}

struct Inner<B> {
	backend: Rc<B>,
	runtime: Rc<dyn Runtime>,
	options: StoreOptions,
	state: RefCell<TapestryState>,
	autosave: RefCell<Autosave>,
	listeners: RefCell<Vec<(ListenerId, Listener)>>,
	next_listener: Cell<u64>,
	chat_ticket: Cell<u64>,
	saves_in_flight: Cell<usize>,
	/// Project id and abort handle of the most recently started save.
	latest_save: RefCell<Option<(String, AbortHandle)>>,
}

/// Shared handle to the graph store.
pub struct TapestryStore<B> {
	inner: Rc<Inner<B>>,
}

impl<B> Clone for TapestryStore<B> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<B: ProjectBackend + 'static> TapestryStore<B> {
	/// Store with default [`StoreOptions`].
	pub fn new(backend: B, runtime: Rc<dyn Runtime>) -> Self {
		Self::with_options(backend, runtime, StoreOptions::default())
	}

	/// Empty store with no active project.
	pub fn with_options(backend: B, runtime: Rc<dyn Runtime>, options: StoreOptions) -> Self {
		let state = TapestryState::default();
		let mut autosave = Autosave::default();
		autosave.rebase(state.save_snapshot());
		Self {
			inner: Rc::new(Inner {
				backend: Rc::new(backend),
				runtime,
				options,
				state: RefCell::new(state),
				autosave: RefCell::new(autosave),
				listeners: RefCell::new(Vec::new()),
				next_listener: Cell::new(0),
				chat_ticket: Cell::new(0),
				saves_in_flight: Cell::new(0),
				latest_save: RefCell::new(None),
			}),
		}
	}

	/// The backend collaborator.
	pub fn backend(&self) -> &B {
		&self.inner.backend
	}

	// ---- reads ----

	/// Borrow the state for the duration of `f`. Do not call store methods
	/// from inside `f`.
	pub fn with_state<R>(&self, f: impl FnOnce(&TapestryState) -> R) -> R {
		f(&self.inner.state.borrow())
	}

	/// Clone of the whole state.
	pub fn snapshot(&self) -> TapestryState {
		self.inner.state.borrow().clone()
	}

	/// Active project id.
	pub fn project_id(&self) -> Option<String> {
		self.with_state(|s| s.project_id.clone())
	}

	/// Current entities.
	pub fn nodes(&self) -> Vec<Node> {
		self.with_state(|s| s.nodes.clone())
	}

	/// Current relations.
	pub fn edges(&self) -> Vec<Edge> {
		self.with_state(|s| s.edges.clone())
	}

	/// Current conversation log.
	pub fn messages(&self) -> Vec<ChatMessage> {
		self.with_state(|s| s.messages.clone())
	}

	/// Active perspective.
	pub fn perspective(&self) -> PerspectiveType {
		self.with_state(|s| s.active_perspective)
	}

	/// Current derived views.
	pub fn projection(&self) -> Projection {
		self.with_state(|s| s.projection.clone())
	}

	// ---- subscriptions ----

	/// Register a listener called after every commit. Listeners run while
	/// the state is borrowed and must not mutate the store synchronously.
	pub fn subscribe(&self, listener: impl Fn(&TapestryState) + 'static) -> ListenerId {
		let id = ListenerId(self.inner.next_listener.get());
		self.inner.next_listener.set(id.0 + 1);
		self.inner
			.listeners
			.borrow_mut()
			.push((id, Rc::new(listener)));
		id
	}

	/// Remove a listener; unknown ids are ignored.
	pub fn unsubscribe(&self, id: ListenerId) {
		self.inner.listeners.borrow_mut().retain(|(l, _)| *l != id);
	}

	// ---- synchronous mutations ----

	/// Swap the whole graph. Dangling edges are kept; consumers filter them.
	pub fn replace_graph(&self, nodes: Vec<Node>, edges: Vec<Edge>) {
		self.commit(SavePolicy::Schedule, |s| {
			s.nodes = nodes;
			s.edges = edges;
		});
	}

	/// Append to the log, stamped with the runtime clock.
	pub fn append_message(&self, role: ChatRole, content: impl Into<String>) {
		let message = ChatMessage {
			role,
			content: content.into(),
			timestamp: self.inner.runtime.now_ms(),
		};
		self.commit(SavePolicy::Schedule, |s| s.messages.push(message));
	}

	/// Switch the active perspective. Persisted like any edit.
	pub fn set_perspective(&self, perspective: PerspectiveType) {
		self.commit(SavePolicy::Schedule, |s| s.active_perspective = perspective);
	}

	/// Set the loading flag. Never schedules a save.
	pub fn set_loading(&self, loading: bool) {
		self.commit(SavePolicy::Schedule, |s| s.is_loading = loading);
	}

	/// Set the saving flag. Never schedules a save.
	pub fn set_saving(&self, saving: bool) {
		self.commit(SavePolicy::Schedule, |s| s.is_saving = saving);
	}

	/// Back to the initial empty session. Any pending autosave is dropped.
	pub fn reset(&self) {
		self.inner.chat_ticket.set(self.inner.chat_ticket.get() + 1);
		self.inner.autosave.borrow_mut().debouncer.cancel_if(|_| true);
		self.commit(SavePolicy::Rebase, |s| *s = TapestryState::default());
	}

	// ---- backend round trips ----

	/// Refresh the project list from the backend.
	pub async fn load_project_list(&self) -> Result<Vec<ProjectSummary>> {
		match self.inner.backend.list_projects().await {
			Ok(list) => {
				self.commit(SavePolicy::Schedule, |s| s.project_list = list.clone());
				Ok(list)
			}
			Err(e) => {
				log::error!("tapestry: failed to load projects: {e}");
				self.commit(SavePolicy::Schedule, |s| s.last_error = Some(e.to_string()));
				Err(e)
			}
		}
	}

	/// Create a project on the backend and make it the active one.
	pub async fn create_project(&self, name: &str) -> Result<()> {
		let name = match name.trim() {
			"" => self.inner.options.default_project_name.clone(),
			trimmed => trimmed.to_string(),
		};
		self.set_loading(true);
		let summary = match self.inner.backend.create_project(&name).await {
			Ok(summary) => summary,
			Err(e) => return self.fail("create project", e),
		};
		log::info!("tapestry: created project {} ({})", summary.name, summary.id);
		self.install(Project {
			id: summary.id.clone(),
			name: summary.name.clone(),
			..Project::default()
		});
		self.commit(SavePolicy::Schedule, |s| {
			if !s.project_list.iter().any(|p| p.id == summary.id) {
				s.project_list.insert(0, summary);
			}
		});
		Ok(())
	}

	/// Fetch a project and replace the active one with it. On failure the
	/// current project stays displayed.
	pub async fn load_project(&self, id: &str) -> Result<()> {
		self.set_loading(true);
		match self.inner.backend.load_project(id).await {
			Ok(project) => {
				log::info!(
					"tapestry: loaded project {} ({} nodes, {} edges)",
					project.id,
					project.nodes.len(),
					project.edges.len()
				);
				self.install(project);
				Ok(())
			}
			Err(e) => self.fail("load project", e),
		}
	}

	/// Load `id` unless it is already active.
	pub async fn switch_project(&self, id: &str) -> Result<()> {
		if self.project_id().as_deref() == Some(id) {
			return Ok(());
		}
		self.load_project(id).await
	}

	/// Delete a project. Deleting the active one falls through to the first
	/// remaining project, or a fresh default one when none are left.
	pub async fn delete_project(&self, id: &str) -> Result<()> {
		self.set_loading(true);
		if let Err(e) = self.inner.backend.delete_project(id).await {
			return self.fail("delete project", e);
		}
		log::info!("tapestry: deleted project {id}");

		self.inner
			.autosave
			.borrow_mut()
			.debouncer
			.cancel_if(|s| s.id.as_deref() == Some(id));

		let was_active = self.project_id().as_deref() == Some(id);
		if !was_active {
			self.commit(SavePolicy::Schedule, |s| {
				s.project_list.retain(|p| p.id != id);
				s.is_loading = false;
			});
			return Ok(());
		}

		// Never point at the deleted id, not even while the fallback loads.
		self.inner.chat_ticket.set(self.inner.chat_ticket.get() + 1);
		self.commit(SavePolicy::Rebase, |s| {
			s.project_list.retain(|p| p.id != id);
			s.clear_project();
		});

		let fallback = self.with_state(|s| s.project_list.first().map(|p| p.id.clone()));
		if let Some(next) = fallback {
			if self.load_project(&next).await.is_ok() {
				return Ok(());
			}
			log::warn!("tapestry: fallback project {next} failed to load, creating a new one");
		}
		let name = self.inner.options.default_project_name.clone();
		self.create_project(&name).await
	}

	/// Reopen the last active project, else the first known one, else a new
	/// default project.
	pub async fn restore_session(&self) -> Result<()> {
		let list = self.load_project_list().await?;
		let last = self.inner.backend.last_active().await.unwrap_or_else(|e| {
			log::warn!("tapestry: could not read last active project: {e}");
			None
		});
		let target = last
			.filter(|id| list.iter().any(|p| &p.id == id))
			.or_else(|| list.first().map(|p| p.id.clone()));
		match target {
			Some(id) => self.load_project(&id).await,
			None => {
				let name = self.inner.options.default_project_name.clone();
				self.create_project(&name).await
			}
		}
	}

	/// Send a chat message through the weave endpoint and apply the reply.
	///
	/// The returned graph replaces the store graph wholesale; edits made
	/// while the request was in flight are overwritten. A reply that lost
	/// the race to a newer message or a project switch is dropped.
	pub async fn send_message(&self, content: &str) -> Result<ChatOutcome> {
		let content = content.trim();
		if content.is_empty() {
			return Ok(ChatOutcome::Ignored);
		}

		let (request, project_id) = self.with_state(|s| {
			(
				WeaveRequest {
					message: content.to_string(),
					nodes: s.nodes.clone(),
					edges: s.edges.clone(),
					history: s.messages.clone(),
				},
				s.project_id.clone(),
			)
		});
		self.append_message(ChatRole::User, content);

		let ticket = self.inner.chat_ticket.get() + 1;
		self.inner.chat_ticket.set(ticket);
		self.set_loading(true);

		let result = self.inner.backend.weave(&request).await;

		if self.inner.chat_ticket.get() != ticket || self.project_id() != project_id {
			log::warn!("tapestry: discarding stale chat reply");
			return Ok(ChatOutcome::Superseded);
		}

		match result {
			Ok(response) => {
				self.replace_graph(response.nodes, response.edges);
				self.append_message(ChatRole::Assistant, response.reply);
				self.commit(SavePolicy::Schedule, |s| {
					s.is_loading = false;
					s.last_error = None;
				});
				Ok(ChatOutcome::Applied)
			}
			Err(e) => self.fail("weave", e),
		}
	}

	// ---- internals ----

	fn install(&self, project: Project) {
		// Replies to requests made against the previous project are stale.
		self.inner.chat_ticket.set(self.inner.chat_ticket.get() + 1);
		let id = project.id.clone();
		self.commit(SavePolicy::Rebase, move |s| {
			s.project_id = Some(project.id);
			s.project_name = project.name;
			s.nodes = project.nodes;
			s.edges = project.edges;
			s.messages = project.messages;
			s.active_perspective = project.perspective;
			s.is_loading = false;
			s.last_error = None;
		});

		let backend = self.inner.backend.clone();
		self.inner.runtime.spawn_local(Box::pin(async move {
			if let Err(e) = backend.remember_active(Some(&id)).await {
				log::warn!("tapestry: could not remember active project: {e}");
			}
		}));
	}

	fn fail<T>(&self, what: &str, error: crate::error::TapestryError) -> Result<T> {
		log::error!("tapestry: failed to {what}: {error}");
		let message = format!("Failed to {what}: {error}");
		self.commit(SavePolicy::Schedule, |s| {
			s.is_loading = false;
			s.last_error = Some(message);
		});
		Err(error)
	}

	fn commit(&self, policy: SavePolicy, f: impl FnOnce(&mut TapestryState)) {
		let snapshot = {
			let mut state = self.inner.state.borrow_mut();
			f(&mut state);
			state.projection = Projection::compute(&state.nodes, &state.edges, &state.messages);
			state.save_snapshot()
		};

		match policy {
			SavePolicy::Schedule => {
				let ticket = self.inner.autosave.borrow_mut().observe(snapshot);
				if let Some(ticket) = ticket {
					self.arm_autosave(ticket);
				}
			}
			SavePolicy::Rebase => {
				let pending = self.inner.autosave.borrow_mut().rebase(snapshot);
				if let Some(pending) = pending {
					// Edits to the project being left still get written.
					self.persist(pending);
				}
			}
		}

		let listeners: Vec<Listener> = self
			.inner
			.listeners
			.borrow()
			.iter()
			.map(|(_, l)| l.clone())
			.collect();
		let state = self.inner.state.borrow();
		for listener in listeners {
			listener(&state);
		}
	}

	fn arm_autosave(&self, ticket: u64) {
		let weak: Weak<Inner<B>> = Rc::downgrade(&self.inner);
		let quiet = self.inner.options.autosave_quiet;
		self.inner.runtime.set_timeout(
			quiet,
			Box::new(move || {
				let Some(inner) = weak.upgrade() else {
					return;
				};
				let store = TapestryStore { inner };
				let due = store.inner.autosave.borrow_mut().debouncer.fire(ticket);
				if let Some(snapshot) = due {
					store.persist(snapshot);
				}
			}),
		);
	}

	/// Start writing `snapshot`. A save of the same project that is still in
	/// flight is aborted so an older snapshot can never land last. Saves of
	/// a project being left run to completion.
	fn persist(&self, snapshot: SaveSnapshot) {
		let Some(payload) = snapshot.into_payload() else {
			log::debug!("tapestry: no active project, skipping auto-save");
			return;
		};
		let (handle, registration) = AbortHandle::new_pair();
		let previous = self
			.inner
			.latest_save
			.borrow_mut()
			.replace((payload.id.clone(), handle));
		if let Some((id, previous)) = previous {
			if id == payload.id {
				previous.abort();
			}
		}

		self.inner.saves_in_flight.set(self.inner.saves_in_flight.get() + 1);
		self.set_saving(true);

		let store = self.clone();
		self.inner.runtime.spawn_local(Box::pin(async move {
			let id = payload.id.clone();
			log::info!("tapestry: auto-saving project {id}");
			let backend = store.inner.backend.clone();
			let save = async move { backend.save_project(&payload).await };
			match Abortable::new(save, registration).await {
				Ok(Ok(())) => {}
				Ok(Err(e)) => log::error!("tapestry: auto-save failed: {e}"),
				Err(Aborted) => log::debug!("tapestry: auto-save of {id} superseded"),
			}

			let remaining = store.inner.saves_in_flight.get().saturating_sub(1);
			store.inner.saves_in_flight.set(remaining);
			if remaining == 0 {
				store.set_saving(false);
			}
		}));
	}
}

#[cfg(test)]
mod tests;
