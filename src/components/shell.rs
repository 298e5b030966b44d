//! Application chrome around the canvas: project bar, stats, perspective
//! switcher and chat box.

use leptos::callback::{Callable, UnsyncCallback};
use leptos::prelude::*;

use crate::model::{PerspectiveType, ProjectSummary};
use crate::projector::{Counts, Projection};
use crate::store::TapestryState;

use super::force_graph::GraphView;

/// The slice of store state the chrome displays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShellStatus {
	/// Active project, if any.
	pub project_id: Option<String>,
	/// Shown as the overlay title.
	pub project_name: String,
	/// Entries of the project picker.
	pub projects: Vec<ProjectSummary>,
	/// Highlighted switcher button.
	pub perspective: PerspectiveType,
	/// World statistics.
	pub counts: Counts,
	/// Number of map-eligible nodes.
	pub map_nodes: usize,
	/// Number of nodes on the timeline.
	pub timeline_nodes: usize,
	/// A load or chat request is running.
	pub is_loading: bool,
	/// An autosave is running.
	pub is_saving: bool,
	/// Last failure message.
	pub last_error: Option<String>,
}

impl ShellStatus {
	/// Pick the displayed fields out of a store state.
	pub fn from_state(state: &TapestryState) -> Self {
		let Projection {
			map_eligible,
			timeline_ordered,
			counts,
		} = &state.projection;
		Self {
			project_id: state.project_id.clone(),
			project_name: state.project_name.clone(),
			projects: state.project_list.clone(),
			perspective: state.active_perspective,
			counts: *counts,
			map_nodes: map_eligible.len(),
			timeline_nodes: timeline_ordered.len(),
			is_loading: state.is_loading,
			is_saving: state.is_saving,
			last_error: state.last_error.clone(),
		}
	}
}

/// Canvas input for a store state.
pub fn graph_view(state: &TapestryState) -> GraphView {
	GraphView {
		nodes: state.nodes.clone(),
		edges: state.edges.clone(),
		perspective: state.active_perspective,
	}
}

/// Project picker with create and delete buttons.
#[component]
pub fn ProjectBar(
	#[prop(into)] status: Signal<ShellStatus>,
	#[prop(into)] on_switch: UnsyncCallback<String>,
	#[prop(into)] on_create: UnsyncCallback<()>,
	#[prop(into)] on_delete: UnsyncCallback<String>,
) -> impl IntoView {
	let options = move || {
		status
			.get()
			.projects
			.into_iter()
			.map(|p| view! { <option value=p.id.clone()>{p.name}</option> })
			.collect_view()
	};
	let selected = move || status.get().project_id.unwrap_or_default();

	view! {
		<div class="project-bar">
			<select
				prop:value=selected
				on:change=move |ev| on_switch.run(event_target_value(&ev))
			>
				{options}
			</select>
			<button on:click=move |_| on_create.run(())>"New"</button>
			<button
				disabled=move || status.get().project_id.is_none()
				on:click=move |_| {
					if let Some(id) = status.get_untracked().project_id {
						on_delete.run(id);
					}
				}
			>
				"Delete"
			</button>
			<span class="save-state">
				{move || if status.get().is_saving { "Saving…" } else { "" }}
			</span>
		</div>
	}
}

/// Title, world statistics and the last error.
#[component]
pub fn StatsOverlay(#[prop(into)] status: Signal<ShellStatus>) -> impl IntoView {
	view! {
		<div class="graph-overlay">
			<h1>{move || status.get().project_name}</h1>
			<p class="stats">
				{move || {
					let c = status.get().counts;
					format!("{} entities · {} links · {} messages", c.nodes, c.edges, c.messages)
				}}
			</p>
			<Show when=move || status.get().counts.is_empty>
				<p class="subtitle">"Describe your world in the chat to start weaving."</p>
			</Show>
			<Show when=move || status.get().last_error.is_some()>
				<p class="error">{move || status.get().last_error.unwrap_or_default()}</p>
			</Show>
		</div>
	}
}

/// One button per perspective, plus a summary for the ones the canvas
/// does not draw.
#[component]
pub fn PerspectiveSwitcher(
	#[prop(into)] status: Signal<ShellStatus>,
	#[prop(into)] on_select: UnsyncCallback<PerspectiveType>,
) -> impl IntoView {
	let buttons = PerspectiveType::ALL
		.into_iter()
		.map(|p| {
			let on_select = on_select.clone();
			view! {
				<button
					class:active=move || status.get().perspective == p
					on:click=move |_| on_select.run(p)
				>
					{p.display_name()}
				</button>
			}
		})
		.collect_view();

	// Only the abstract perspective has a renderer; the rest show a summary.
	let summary = move || {
		let s = status.get();
		match s.perspective {
			PerspectiveType::Abstract => String::new(),
			PerspectiveType::Map => format!("{} entities have coordinates", s.map_nodes),
			PerspectiveType::Timeline => format!("{} entities have a date", s.timeline_nodes),
			other => format!("{} view is not available yet", other.display_name()),
		}
	};

	view! {
		<div class="perspectives">
			{buttons}
			<p class="perspective-summary">{summary}</p>
		</div>
	}
}

/// Message box feeding the weave endpoint. Blank input is not sent.
#[component]
pub fn ChatInput(
	#[prop(into)] busy: Signal<bool>,
	#[prop(into)] on_send: UnsyncCallback<String>,
) -> impl IntoView {
	let draft = RwSignal::new(String::new());

	view! {
		<form
			class="chat-input"
			on:submit=move |ev| {
				ev.prevent_default();
				let text = draft.get_untracked();
				if text.trim().is_empty() {
					return;
				}
				draft.set(String::new());
				on_send.run(text);
			}
		>
			<input
				type="text"
				placeholder="Tell me about your world…"
				prop:value=move || draft.get()
				on:input=move |ev| draft.set(event_target_value(&ev))
			/>
			<button type="submit" disabled=move || busy.get()>
				"Weave"
			</button>
		</form>
	}
}
