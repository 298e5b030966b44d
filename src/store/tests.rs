use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use futures::channel::oneshot;
use futures::executor::block_on;
use futures::future::LocalBoxFuture;

use super::*;
use crate::backend::local::{LocalBackend, MemoryStorage};
use crate::backend::{SavePayload, WeaveResponse};
use crate::error::TapestryError;
use crate::model::NodeType;
use crate::runtime::manual::ManualRuntime;

/// Local cache backend with knobs for failures, a save log, and gated saves
/// and weave replies.
struct MockBackend {
	local: LocalBackend<MemoryStorage>,
	saves: RefCell<Vec<SavePayload>>,
	fail_saves: Cell<bool>,
	fail_loads: Cell<bool>,
	weave_requests: RefCell<Vec<WeaveRequest>>,
	weave_replies: RefCell<VecDeque<oneshot::Receiver<WeaveResponse>>>,
	save_gates: RefCell<VecDeque<oneshot::Receiver<()>>>,
}

impl MockBackend {
	fn new() -> Self {
		Self {
			local: LocalBackend::new(MemoryStorage::default()),
			saves: RefCell::new(Vec::new()),
			fail_saves: Cell::new(false),
			fail_loads: Cell::new(false),
			weave_requests: RefCell::new(Vec::new()),
			weave_replies: RefCell::new(VecDeque::new()),
			save_gates: RefCell::new(VecDeque::new()),
		}
	}

	/// Queue a save gate; the next save call writes only once it opens.
	fn gate_save(&self) -> oneshot::Sender<()> {
		let (tx, rx) = oneshot::channel();
		self.save_gates.borrow_mut().push_back(rx);
		tx
	}

	/// Nodes actually written for `id`.
	fn persisted_nodes(&self, id: &str) -> Vec<Node> {
		block_on(self.local.load_project(id))
			.map(|p| p.nodes)
			.unwrap_or_default()
	}

	/// Queue a reply gate; the next weave call waits on it.
	fn gate_reply(&self) -> oneshot::Sender<WeaveResponse> {
		let (tx, rx) = oneshot::channel();
		self.weave_replies.borrow_mut().push_back(rx);
		tx
	}
}

impl ProjectBackend for MockBackend {
	async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
		self.local.list_projects().await
	}

	async fn create_project(&self, name: &str) -> Result<ProjectSummary> {
		self.local.create_project(name).await
	}

	async fn load_project(&self, id: &str) -> Result<Project> {
		if self.fail_loads.get() {
			return Err(TapestryError::Storage("offline".into()));
		}
		self.local.load_project(id).await
	}

	async fn save_project(&self, payload: &SavePayload) -> Result<()> {
		self.saves.borrow_mut().push(payload.clone());
		let gate = self.save_gates.borrow_mut().pop_front();
		if let Some(rx) = gate {
			rx.await.map_err(|_| TapestryError::Storage("save dropped".into()))?;
		}
		if self.fail_saves.get() {
			return Err(TapestryError::Storage("disk full".into()));
		}
		self.local.save_project(payload).await
	}

	async fn delete_project(&self, id: &str) -> Result<()> {
		self.local.delete_project(id).await
	}

	async fn weave(&self, request: &WeaveRequest) -> Result<WeaveResponse> {
		self.weave_requests.borrow_mut().push(request.clone());
		let gate = self.weave_replies.borrow_mut().pop_front();
		match gate {
			Some(rx) => rx.await.map_err(|_| TapestryError::Unsupported("weave")),
			None => Err(TapestryError::Unsupported("weave")),
		}
	}

	async fn remember_active(&self, id: Option<&str>) -> Result<()> {
		self.local.remember_active(id).await
	}

	async fn last_active(&self) -> Result<Option<String>> {
		self.local.last_active().await
	}
}

fn setup() -> (TapestryStore<MockBackend>, ManualRuntime) {
	let rt = ManualRuntime::new();
	let store = TapestryStore::new(MockBackend::new(), Rc::new(rt.clone()));
	(store, rt)
}

fn run<T>(rt: &ManualRuntime, fut: impl std::future::Future<Output = T>) -> T {
	let out = block_on(fut);
	rt.run_until_stalled();
	out
}

fn spawn(rt: &ManualRuntime, fut: impl std::future::Future<Output = ()> + 'static) {
	let boxed: LocalBoxFuture<'static, ()> = Box::pin(fut);
	rt.spawn_local(boxed);
	rt.run_until_stalled();
}

fn bob() -> Node {
	Node::new("n1", "Bob", NodeType::Person)
}

fn saves(store: &TapestryStore<MockBackend>) -> Vec<SavePayload> {
	store.backend().saves.borrow().clone()
}

const QUIET: Duration = Duration::from_millis(2000);

#[test]
fn mutations_recompute_projection_before_listeners_run() {
	let (store, _rt) = setup();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let sink = seen.clone();
	store.subscribe(move |s| sink.borrow_mut().push(s.projection.counts.nodes));

	store.replace_graph(vec![bob()], vec![]);
	store.replace_graph(vec![], vec![]);
	assert_eq!(*seen.borrow(), vec![1, 0]);
}

#[test]
fn unsubscribed_listener_is_not_called() {
	let (store, _rt) = setup();
	let hits = Rc::new(Cell::new(0));
	let counter = hits.clone();
	let id = store.subscribe(move |_| counter.set(counter.get() + 1));
	store.set_loading(true);
	store.unsubscribe(id);
	store.set_loading(false);
	assert_eq!(hits.get(), 1);
}

#[test]
fn messages_append_in_order_with_timestamps() {
	let (store, rt) = setup();
	store.append_message(ChatRole::User, "one");
	rt.advance(Duration::from_millis(5));
	store.append_message(ChatRole::User, "one");
	let messages = store.messages();
	assert_eq!(messages.len(), 2);
	assert!(messages[0].timestamp < messages[1].timestamp);
}

#[test]
fn dangling_edges_stay_in_the_store() {
	let (store, _rt) = setup();
	let edges = vec![Edge::new("e1", "n1", "ghost", "haunts")];
	store.replace_graph(vec![bob()], edges.clone());
	assert_eq!(store.edges(), edges);
}

#[test]
fn rapid_mutations_produce_one_save_with_final_state() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();
	assert!(saves(&store).is_empty());

	store.replace_graph(vec![bob()], vec![]);
	rt.advance(Duration::from_millis(500));
	store.append_message(ChatRole::User, "hello");
	rt.advance(Duration::from_millis(500));
	store.set_perspective(PerspectiveType::Timeline);
	rt.advance(QUIET - Duration::from_millis(1));
	assert!(saves(&store).is_empty());

	rt.advance(Duration::from_millis(1));
	let saves = saves(&store);
	assert_eq!(saves.len(), 1);
	assert_eq!(saves[0].name, "Realm");
	assert_eq!(saves[0].data.nodes, vec![bob()]);
	assert_eq!(saves[0].data.messages.len(), 1);
	assert_eq!(saves[0].data.active_perspective, PerspectiveType::Timeline);
	assert!(!store.snapshot().is_saving);
}

#[test]
fn spaced_mutations_save_once_each() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();

	store.replace_graph(vec![bob()], vec![]);
	rt.advance(QUIET + Duration::from_millis(100));
	store.set_perspective(PerspectiveType::Map);
	rt.advance(QUIET + Duration::from_millis(100));

	let saves = saves(&store);
	assert_eq!(saves.len(), 2);
	assert_eq!(saves[0].data.active_perspective, PerspectiveType::Abstract);
	assert_eq!(saves[1].data.active_perspective, PerspectiveType::Map);
}

#[test]
fn flags_alone_never_schedule_a_save() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();
	store.set_loading(true);
	store.set_saving(true);
	store.set_saving(false);
	rt.advance(QUIET * 2);
	assert!(saves(&store).is_empty());
}

#[test]
fn no_save_without_active_project() {
	let (store, rt) = setup();
	store.replace_graph(vec![bob()], vec![]);
	rt.advance(QUIET * 2);
	assert!(saves(&store).is_empty());
}

#[test]
fn failed_save_clears_flag_and_keeps_edits() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();
	store.backend().fail_saves.set(true);

	store.replace_graph(vec![bob()], vec![]);
	rt.advance(QUIET);
	assert_eq!(saves(&store).len(), 1);
	let state = store.snapshot();
	assert!(!state.is_saving);
	assert_eq!(state.nodes, vec![bob()]);

	// No retry on its own.
	rt.advance(QUIET * 3);
	assert_eq!(saves(&store).len(), 1);
}

#[test]
fn newer_save_aborts_older_one_still_in_flight() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();
	let id = store.project_id().unwrap();
	let first_gate = store.backend().gate_save();
	let second_gate = store.backend().gate_save();

	store.replace_graph(vec![Node::new("old", "Old", NodeType::Thing)], vec![]);
	rt.advance(QUIET);
	assert!(store.snapshot().is_saving);
	store.replace_graph(vec![Node::new("new", "New", NodeType::Thing)], vec![]);
	rt.advance(QUIET);
	assert_eq!(saves(&store).len(), 2);

	second_gate.send(()).unwrap();
	rt.run_until_stalled();
	// The older request was dropped when the newer one started.
	assert!(first_gate.send(()).is_err());
	rt.run_until_stalled();

	let persisted: Vec<_> = store
		.backend()
		.persisted_nodes(&id)
		.into_iter()
		.map(|n| n.id)
		.collect();
	assert_eq!(persisted, vec!["new"]);
	assert!(!store.snapshot().is_saving);
}

#[test]
fn saving_flag_stays_up_until_latest_save_finishes() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();
	let _first_gate = store.backend().gate_save();
	let second_gate = store.backend().gate_save();

	store.replace_graph(vec![bob()], vec![]);
	rt.advance(QUIET);
	store.set_perspective(PerspectiveType::Map);
	rt.advance(QUIET);
	// The aborted first save has wound down; the second is still pending.
	assert!(store.snapshot().is_saving);

	second_gate.send(()).unwrap();
	rt.run_until_stalled();
	assert!(!store.snapshot().is_saving);
}

#[test]
fn save_of_project_being_left_is_not_aborted() {
	let (store, rt) = setup();
	run(&rt, store.create_project("First")).unwrap();
	let first = store.project_id().unwrap();
	run(&rt, store.create_project("Second")).unwrap();
	let second = store.project_id().unwrap();
	run(&rt, store.switch_project(&first)).unwrap();

	let flush_gate = store.backend().gate_save();
	store.replace_graph(vec![bob()], vec![]);
	run(&rt, store.switch_project(&second)).unwrap();
	store.replace_graph(vec![Node::new("n2", "Ann", NodeType::Person)], vec![]);
	rt.advance(QUIET);
	assert!(store.snapshot().is_saving);

	flush_gate.send(()).unwrap();
	rt.run_until_stalled();
	assert_eq!(store.backend().persisted_nodes(&first), vec![bob()]);
	assert_eq!(store.backend().persisted_nodes(&second).len(), 1);
	assert!(!store.snapshot().is_saving);
}

#[test]
fn switching_projects_flushes_pending_edits_of_the_old_one() {
	let (store, rt) = setup();
	run(&rt, store.create_project("First")).unwrap();
	let first = store.project_id().unwrap();
	run(&rt, store.create_project("Second")).unwrap();
	let second = store.project_id().unwrap();

	run(&rt, store.switch_project(&first)).unwrap();
	store.replace_graph(vec![bob()], vec![]);
	run(&rt, store.switch_project(&second)).unwrap();

	let written = saves(&store);
	assert_eq!(written.len(), 1);
	assert_eq!(written[0].id, first);
	assert_eq!(written[0].data.nodes, vec![bob()]);

	// The second project starts clean and nothing else fires later.
	assert!(store.nodes().is_empty());
	rt.advance(QUIET * 2);
	assert_eq!(saves(&store).len(), 1);
}

#[test]
fn load_replaces_everything() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Empty")).unwrap();
	let empty = store.project_id().unwrap();

	run(&rt, store.create_project("Full")).unwrap();
	store.replace_graph(vec![bob()], vec![Edge::new("e", "n1", "n1", "is")]);
	store.append_message(ChatRole::User, "hi");
	store.set_perspective(PerspectiveType::Ledger);
	rt.advance(QUIET);

	run(&rt, store.load_project(&empty)).unwrap();
	let state = store.snapshot();
	assert_eq!(state.project_name, "Empty");
	assert!(state.nodes.is_empty());
	assert!(state.edges.is_empty());
	assert!(state.messages.is_empty());
	assert_eq!(state.active_perspective, PerspectiveType::Abstract);
	assert!(!state.is_loading);
}

#[test]
fn failed_load_keeps_current_project_and_surfaces_error() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();
	let id = store.project_id();
	store.replace_graph(vec![bob()], vec![]);

	store.backend().fail_loads.set(true);
	assert!(run(&rt, store.load_project("elsewhere")).is_err());

	let state = store.snapshot();
	assert_eq!(state.project_id, id);
	assert_eq!(state.nodes, vec![bob()]);
	assert!(!state.is_loading);
	assert!(state.last_error.is_some());
}

#[test]
fn switching_to_active_project_is_a_no_op() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();
	let id = store.project_id().unwrap();
	store.replace_graph(vec![bob()], vec![]);
	run(&rt, store.switch_project(&id)).unwrap();
	assert_eq!(store.nodes(), vec![bob()]);
}

#[test]
fn blank_name_uses_default() {
	let (store, rt) = setup();
	run(&rt, store.create_project("   ")).unwrap();
	assert_eq!(store.snapshot().project_name, "Untitled Tapestry");
	assert_eq!(store.snapshot().project_list.len(), 1);
}

#[test]
fn deleting_sole_active_project_creates_default() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();
	let doomed = store.project_id().unwrap();
	store.replace_graph(vec![bob()], vec![]);

	run(&rt, store.delete_project(&doomed)).unwrap();

	let state = store.snapshot();
	let active = state.project_id.clone().expect("an active project");
	assert_ne!(active, doomed);
	assert_eq!(state.project_name, "Untitled Tapestry");
	assert!(state.nodes.is_empty());
	assert!(state.edges.is_empty());
	assert!(state.messages.is_empty());
	assert_eq!(state.project_list.len(), 1);
	assert_eq!(state.project_list[0].id, active);

	// The pending edit for the deleted project is dropped, not saved.
	rt.advance(QUIET * 2);
	assert!(saves(&store).iter().all(|s| s.id != doomed));
}

#[test]
fn deleting_active_project_falls_back_to_first_remaining() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Keeper")).unwrap();
	let keeper = store.project_id().unwrap();
	run(&rt, store.create_project("Doomed")).unwrap();
	let doomed = store.project_id().unwrap();

	run(&rt, store.delete_project(&doomed)).unwrap();
	let state = store.snapshot();
	assert_eq!(state.project_id, Some(keeper));
	assert_eq!(state.project_name, "Keeper");
	assert_eq!(state.project_list.len(), 1);
}

#[test]
fn deleting_other_project_keeps_active() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Other")).unwrap();
	let other = store.project_id().unwrap();
	run(&rt, store.create_project("Mine")).unwrap();
	let mine = store.project_id();
	store.replace_graph(vec![bob()], vec![]);

	run(&rt, store.delete_project(&other)).unwrap();
	let state = store.snapshot();
	assert_eq!(state.project_id, mine);
	assert_eq!(state.nodes, vec![bob()]);
	assert_eq!(state.project_list.len(), 1);
}

#[test]
fn deleting_unknown_project_leaves_pointer_alone() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();
	let id = store.project_id();
	let err = run(&rt, store.delete_project("missing")).unwrap_err();
	assert!(matches!(err, TapestryError::ProjectNotFound(_)));
	assert_eq!(store.project_id(), id);
	assert!(store.snapshot().last_error.is_some());
}

#[test]
fn restore_session_reopens_last_active_project() {
	let (store, rt) = setup();
	run(&rt, store.create_project("A")).unwrap();
	let a = store.project_id().unwrap();
	run(&rt, store.create_project("B")).unwrap();
	run(&rt, store.switch_project(&a)).unwrap();

	store.reset();
	assert_eq!(store.project_id(), None);
	assert_eq!(store.snapshot().project_name, NO_PROJECT_NAME);

	run(&rt, store.restore_session()).unwrap();
	assert_eq!(store.project_id(), Some(a));
	assert_eq!(store.snapshot().project_list.len(), 2);
}

#[test]
fn restore_session_with_nothing_stored_creates_default() {
	let (store, rt) = setup();
	run(&rt, store.restore_session()).unwrap();
	assert!(store.project_id().is_some());
	assert_eq!(store.snapshot().project_name, "Untitled Tapestry");
}

#[test]
fn chat_round_trip_replaces_graph_and_logs_both_messages() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();

	let gate = store.backend().gate_reply();
	let outcome = Rc::new(Cell::new(None));
	let (s, out) = (store.clone(), outcome.clone());
	spawn(&rt, async move {
		out.set(Some(s.send_message("Hello").await.unwrap()));
	});
	assert!(store.snapshot().is_loading);

	gate.send(WeaveResponse {
		reply: "Hi".into(),
		nodes: vec![bob()],
		edges: vec![],
	})
	.unwrap();
	rt.run_until_stalled();

	assert_eq!(outcome.get(), Some(ChatOutcome::Applied));
	let state = store.snapshot();
	assert_eq!(state.nodes, vec![bob()]);
	let log: Vec<_> = state
		.messages
		.iter()
		.map(|m| (m.role, m.content.as_str()))
		.collect();
	assert_eq!(
		log,
		vec![(ChatRole::User, "Hello"), (ChatRole::Assistant, "Hi")]
	);
	assert!(!state.is_loading);

	let request = &store.backend().weave_requests.borrow()[0];
	assert_eq!(request.message, "Hello");
	assert!(request.history.is_empty());
}

#[test]
fn stale_chat_reply_does_not_overwrite_newer_one() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();

	let first_gate = store.backend().gate_reply();
	let second_gate = store.backend().gate_reply();
	let outcomes = Rc::new(RefCell::new(Vec::new()));

	for text in ["first", "second"] {
		let (s, out) = (store.clone(), outcomes.clone());
		spawn(&rt, async move {
			let outcome = s.send_message(text).await.unwrap();
			out.borrow_mut().push((text, outcome));
		});
	}

	second_gate
		.send(WeaveResponse {
			reply: "second reply".into(),
			nodes: vec![bob()],
			edges: vec![],
		})
		.unwrap();
	rt.run_until_stalled();
	first_gate
		.send(WeaveResponse {
			reply: "first reply".into(),
			nodes: vec![Node::new("old", "Old", NodeType::Thing)],
			edges: vec![],
		})
		.unwrap();
	rt.run_until_stalled();

	assert_eq!(
		*outcomes.borrow(),
		vec![
			("second", ChatOutcome::Applied),
			("first", ChatOutcome::Superseded)
		]
	);
	assert_eq!(store.nodes(), vec![bob()]);
	assert!(!store.snapshot().is_loading);
	let replies: Vec<_> = store
		.messages()
		.into_iter()
		.filter(|m| m.role == ChatRole::Assistant)
		.map(|m| m.content)
		.collect();
	assert_eq!(replies, vec!["second reply"]);
}

#[test]
fn superseded_reply_leaves_newer_request_loading() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();
	let first_gate = store.backend().gate_reply();
	let second_gate = store.backend().gate_reply();

	for text in ["first", "second"] {
		let s = store.clone();
		spawn(&rt, async move {
			s.send_message(text).await.unwrap();
		});
	}
	first_gate
		.send(WeaveResponse {
			reply: "first reply".into(),
			nodes: vec![Node::new("old", "Old", NodeType::Thing)],
			edges: vec![],
		})
		.unwrap();
	rt.run_until_stalled();
	let state = store.snapshot();
	assert!(state.is_loading);
	assert!(state.nodes.is_empty());

	second_gate
		.send(WeaveResponse {
			reply: "second reply".into(),
			nodes: vec![bob()],
			edges: vec![],
		})
		.unwrap();
	rt.run_until_stalled();
	let state = store.snapshot();
	assert!(!state.is_loading);
	assert_eq!(state.nodes, vec![bob()]);
}

#[test]
fn chat_reply_after_reset_is_discarded() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Realm")).unwrap();
	let gate = store.backend().gate_reply();
	let s = store.clone();
	spawn(&rt, async move {
		assert_eq!(s.send_message("Hello").await.unwrap(), ChatOutcome::Superseded);
	});
	assert!(store.snapshot().is_loading);

	store.reset();
	gate.send(WeaveResponse {
		reply: "Hi".into(),
		nodes: vec![bob()],
		edges: vec![],
	})
	.unwrap();
	rt.run_until_stalled();

	let state = store.snapshot();
	assert!(!state.is_loading);
	assert!(state.nodes.is_empty());
	assert!(state.messages.is_empty());
	assert_eq!(state.project_id, None);
}

#[test]
fn chat_reply_after_project_switch_is_discarded() {
	let (store, rt) = setup();
	run(&rt, store.create_project("Other")).unwrap();
	let other = store.project_id().unwrap();
	run(&rt, store.create_project("Realm")).unwrap();

	let gate = store.backend().gate_reply();
	let s = store.clone();
	spawn(&rt, async move {
		assert_eq!(s.send_message("Hello").await.unwrap(), ChatOutcome::Superseded);
	});
	run(&rt, store.switch_project(&other)).unwrap();
	gate.send(WeaveResponse {
		reply: "Hi".into(),
		nodes: vec![bob()],
		edges: vec![],
	})
	.unwrap();
	rt.run_until_stalled();

	assert_eq!(store.project_id(), Some(other));
	assert!(store.nodes().is_empty());
}

#[test]
fn blank_chat_input_is_ignored() {
	let (store, rt) = setup();
	assert_eq!(run(&rt, store.send_message("   ")).unwrap(), ChatOutcome::Ignored);
	assert!(store.messages().is_empty());
	assert!(store.backend().weave_requests.borrow().is_empty());
}

#[test]
fn failed_chat_keeps_user_message_and_graph() {
	let (store, rt) = setup();
	store.replace_graph(vec![bob()], vec![]);
	// No gate queued: the mock weave fails.
	assert!(run(&rt, store.send_message("Hello")).is_err());
	let state = store.snapshot();
	assert_eq!(state.nodes, vec![bob()]);
	assert_eq!(state.messages.len(), 1);
	assert!(!state.is_loading);
	assert!(state.last_error.is_some());
}
