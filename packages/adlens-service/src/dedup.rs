use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use tokio::sync::watch;

/// Identity of one fetch: the normalized query plus the 1-based page number.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PageKey {
	pub query: String,
	pub page: u32,
}

/// How an in-flight fetch ended, as seen by its followers. Failures travel
/// as rendered messages; followers surface them without retrying.
pub type FetchOutcome = Result<(), String>;

type Slot = watch::Receiver<Option<FetchOutcome>>;
type SlotMap = Arc<Mutex<HashMap<PageKey, Slot>>>;

/// Collapses concurrent fetches of the same key into one network call. The
/// first caller becomes the leader and owns the fetch; everyone else gets a
/// follower handle that resolves when the leader finishes.
#[derive(Default)]
pub struct InFlightRegistry {
	slots: SlotMap,
}
impl InFlightRegistry {
	pub fn join(&self, key: &PageKey) -> Ticket {
		let mut slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());

		if let Some(slot) = slots.get(key) {
			return Ticket::Follower(slot.clone());
		}

		let (tx, rx) = watch::channel(None);

		slots.insert(key.clone(), rx);

		Ticket::Leader(LeaderGuard { key: key.clone(), slots: self.slots.clone(), tx })
	}
}

pub enum Ticket {
	Leader(LeaderGuard),
	Follower(Slot),
}

/// Ownership of one in-flight key. Dropping the guard releases the key; a
/// guard dropped without [`LeaderGuard::finish`] reports the fetch as
/// abandoned so followers never hang.
pub struct LeaderGuard {
	key: PageKey,
	slots: SlotMap,
	tx: watch::Sender<Option<FetchOutcome>>,
}
impl LeaderGuard {
	pub fn finish(&self, outcome: FetchOutcome) {
		let _ = self.tx.send(Some(outcome));
	}
}
impl Drop for LeaderGuard {
	fn drop(&mut self) {
		self.tx.send_if_modified(|slot| {
			if slot.is_some() {
				return false;
			}

			*slot = Some(Err("Fetch was abandoned before it finished.".to_string()));

			true
		});

		let mut slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());

		slots.remove(&self.key);
	}
}

pub async fn wait_for_outcome(mut slot: Slot) -> FetchOutcome {
	loop {
		if let Some(outcome) = slot.borrow_and_update().clone() {
			return outcome;
		}
		if slot.changed().await.is_err() {
			let outcome = slot.borrow().clone();

			return outcome
				.unwrap_or_else(|| Err("Fetch was abandoned before it finished.".to_string()));
		}
	}
}
