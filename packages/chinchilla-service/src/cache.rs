use std::{
	collections::{HashMap, VecDeque},
	sync::Mutex,
};

/// A bounded map that evicts in insertion order once `capacity` is reached.
///
/// Shared across requests. Poisoned locks are recovered; readers may see stale entries.
pub struct ResultCache<V> {
	capacity: usize,
	inner: Mutex<CacheInner<V>>,
}
impl<V> ResultCache<V>
where
	V: Clone,
{
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity: capacity.max(1),
			inner: Mutex::new(CacheInner { entries: HashMap::new(), order: VecDeque::new() }),
		}
	}

	pub fn get(&self, key: &str) -> Option<V> {
		let inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());

		inner.entries.get(key).cloned()
	}

	/// Re-inserting an existing key replaces the value without refreshing its position.
	pub fn insert(&self, key: String, value: V) {
		let mut inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());

		if let Some(slot) = inner.entries.get_mut(&key) {
			*slot = value;

			return;
		}

		while inner.entries.len() >= self.capacity {
			let Some(oldest) = inner.order.pop_front() else { break };

			inner.entries.remove(&oldest);
		}

		inner.order.push_back(key.clone());
		inner.entries.insert(key, value);
	}

	pub fn len(&self) -> usize {
		self.inner.lock().unwrap_or_else(|err| err.into_inner()).entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

struct CacheInner<V> {
	entries: HashMap<String, V>,
	order: VecDeque<String>,
}

/// Stable key for a scanned message and its optional sender.
pub fn scan_key(query: &str, sender: Option<&str>) -> String {
	let mut hasher = blake3::Hasher::new();

	hasher.update(query.trim().as_bytes());
	hasher.update(b"|");
	hasher.update(sender.unwrap_or_default().trim().as_bytes());

	hasher.finalize().to_hex().to_string()
}
