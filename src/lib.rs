//! tapestry-graph: collaborative world-building on a force-directed canvas.
//!
//! The crate holds the graph model of a project (entities, relationships, chat
//! log), an observable store that persists it with a debounced autosave, the
//! derived perspective views and a WASM canvas that lays the graph out with a
//! force simulation.

use std::rc::Rc;

use leptos::prelude::*;
use leptos_meta::*;
use log::{Level, info, warn};

pub mod backend;
pub mod components;
pub mod config;
pub mod error;
pub mod model;
pub mod projector;
pub mod runtime;
pub mod store;

pub use backend::any::AnyBackend;
pub use components::force_graph::{GraphView, TapestryCanvas};
pub use config::TapestryConfig;
pub use error::{Result, TapestryError};
pub use store::{TapestryState, TapestryStore};

use components::shell::{
	ChatInput, PerspectiveSwitcher, ProjectBar, ShellStatus, StatsOverlay, graph_view,
};
use model::PerspectiveType;
use runtime::BrowserRuntime;

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("tapestry: logging initialized");
}

/// Run a store operation in the background; failures are already logged and
/// recorded in the store state.
fn spawn_op<F>(what: &'static str, fut: F)
where
	F: std::future::Future<Output = Result<()>> + 'static,
{
	leptos::task::spawn_local(async move {
		if fut.await.is_err() {
			warn!("tapestry: {what} did not complete");
		}
	});
}

/// Main application component.
/// Builds the store from the page config, restores the last session and
/// renders the canvas with its chrome.
#[component]
pub fn App() -> impl IntoView {
	provide_meta_context();

	let config = TapestryConfig::from_document();
	let store = TapestryStore::with_options(
		AnyBackend::from_config(&config),
		Rc::new(BrowserRuntime),
		config.store_options(),
	);

	let graph = RwSignal::new(GraphView::default());
	let status = RwSignal::new(ShellStatus::default());
	store.subscribe(move |state| {
		let next = graph_view(state);
		if graph.with_untracked(|g| *g != next) {
			graph.set(next);
		}
		let next = ShellStatus::from_state(state);
		if status.with_untracked(|s| *s != next) {
			status.set(next);
		}
	});

	let s = store.clone();
	spawn_op("session restore", async move { s.restore_session().await });

	let s = store.clone();
	let on_switch = move |id: String| {
		let s = s.clone();
		spawn_op("project switch", async move { s.switch_project(&id).await });
	};
	let s = store.clone();
	let on_create = move |_: ()| {
		let s = s.clone();
		spawn_op("project create", async move { s.create_project("").await });
	};
	let s = store.clone();
	let on_delete = move |id: String| {
		let s = s.clone();
		spawn_op("project delete", async move { s.delete_project(&id).await });
	};
	let s = store.clone();
	let on_select = move |p: PerspectiveType| s.set_perspective(p);
	let s = store.clone();
	let on_send = move |text: String| {
		let s = s.clone();
		spawn_op("chat", async move { s.send_message(&text).await.map(|_| ()) });
	};

	let busy = Signal::derive(move || status.with(|s| s.is_loading));

	view! {
		<Html attr:lang="en" attr:dir="ltr" attr:data-theme="light" />
		<Title text="Tapestry" />
		<Meta charset="UTF-8" />
		<Meta name="viewport" content="width=device-width, initial-scale=1.0" />

		<div class="fullscreen-graph">
			<TapestryCanvas view=graph fullscreen=true />
			<StatsOverlay status=status />
			<ProjectBar status=status on_switch=on_switch on_create=on_create on_delete=on_delete />
			<PerspectiveSwitcher status=status on_select=on_select />
			<ChatInput busy=busy on_send=on_send />
		</div>
	}
}
