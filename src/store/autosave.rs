//! Debounce-and-supersede bookkeeping for autosave.
//!
//! Every push hands out a ticket. The timer armed for that push presents the
//! ticket when it fires; only the newest ticket yields the pending value, so
//! stale timers are no-ops and no explicit timer cancellation is needed.

use crate::backend::{ProjectData, SavePayload};

/// The part of the store that gets persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveSnapshot {
	/// Active project, `None` when nothing is open.
	pub id: Option<String>,
	/// Project name at snapshot time.
	pub name: String,
	/// Graph, chat log and perspective.
	pub data: ProjectData,
}

impl SaveSnapshot {
	/// `None` while no project is active.
	pub fn into_payload(self) -> Option<SavePayload> {
		Some(SavePayload {
			id: self.id?,
			name: self.name,
			data: self.data,
		})
	}
}

/// Latest-value holder for a debounced action. Timing lives with the caller;
/// this only decides which timer is still current.
#[derive(Debug)]
pub struct Debouncer<T> {
	ticket: u64,
	pending: Option<T>,
}

impl<T> Default for Debouncer<T> {
	fn default() -> Self {
		Self {
			ticket: 0,
			pending: None,
		}
	}
}

impl<T> Debouncer<T> {
	/// Replace whatever is pending. Returns the ticket the new timer must
	/// present.
	pub fn push(&mut self, value: T) -> u64 {
		self.ticket += 1;
		self.pending = Some(value);
		self.ticket
	}

	/// Called by a timer. Yields the pending value only for the latest ticket.
	pub fn fire(&mut self, ticket: u64) -> Option<T> {
		if ticket != self.ticket {
			return None;
		}
		self.pending.take()
	}

	/// Take the pending value now; outstanding timers become stale.
	pub fn flush(&mut self) -> Option<T> {
		self.ticket += 1;
		self.pending.take()
	}

	/// Drop the pending value if it matches.
	pub fn cancel_if(&mut self, pred: impl FnOnce(&T) -> bool) {
		if self.pending.as_ref().is_some_and(pred) {
			self.ticket += 1;
			self.pending = None;
		}
	}

	#[cfg(test)]
	fn pending(&self) -> Option<&T> {
		self.pending.as_ref()
	}
}

/// Debouncer plus the last snapshot seen, so unchanged state never schedules.
#[derive(Debug, Default)]
pub struct Autosave {
	pub debouncer: Debouncer<SaveSnapshot>,
	last_seen: Option<SaveSnapshot>,
}

impl Autosave {
	/// Record `snapshot`; returns a ticket when it differs from the last one.
	pub fn observe(&mut self, snapshot: SaveSnapshot) -> Option<u64> {
		if self.last_seen.as_ref() == Some(&snapshot) {
			return None;
		}
		self.last_seen = Some(snapshot.clone());
		Some(self.debouncer.push(snapshot))
	}

	/// Accept `snapshot` as already persisted. Returns whatever was pending
	/// so the caller can still write it out.
	pub fn rebase(&mut self, snapshot: SaveSnapshot) -> Option<SaveSnapshot> {
		self.last_seen = Some(snapshot);
		self.debouncer.flush()
	}
}
