//! Key rotation: iterate credentials within a model before advancing to
//! the next configured model. State lives behind a `parking_lot::Mutex`
//! and every critical section is a plain field read/write, never held
//! across an `.await`.

use parking_lot::Mutex;

use crate::provider::ApiKey;

/// One configured model and the credentials available for it.
#[derive(Debug, Clone)]
pub struct ModelKeys {
	pub model: String,
	pub keys: Vec<ApiKey>,
}

struct Cursor {
	model_idx: usize,
	key_idx: usize,
}

/// Round-robins through `(model, key)` pairs: keys within the current
/// model first, then the next model's keys. [`KeyRing::rotate`] is the
/// only way the cursor advances; [`KeyRing::current`] is a pure read.
pub struct KeyRing {
	models: Vec<ModelKeys>,
	cursor: Mutex<Cursor>,
}

impl KeyRing {
	pub fn new(models: Vec<ModelKeys>) -> Self {
		assert!(!models.is_empty(), "key ring needs at least one model");
		assert!(models.iter().all(|m| !m.keys.is_empty()), "every model needs at least one key");
		Self { models, cursor: Mutex::new(Cursor { model_idx: 0, key_idx: 0 }) }
	}

	/// The total number of `(model, key)` pairs, the bound on how many
	/// times a single logical request can rotate before every credential
	/// has been tried once.
	pub fn total_keys(&self) -> usize {
		self.models.iter().map(|m| m.keys.len()).sum()
	}

	/// The model and key the next request should use.
	pub fn current(&self) -> (String, ApiKey) {
		let cursor = self.cursor.lock();
		let model = &self.models[cursor.model_idx];
		(model.model.clone(), model.keys[cursor.key_idx].clone())
	}

	/// Advances past the current key: to the next key in this model, or
	/// to the first key of the next model once this model's keys are
	/// exhausted, wrapping back to the first model after the last.
	pub fn rotate(&self) {
		let mut cursor = self.cursor.lock();
		let current_model_len = self.models[cursor.model_idx].keys.len();
		if cursor.key_idx + 1 < current_model_len {
			cursor.key_idx += 1;
		} else {
			cursor.model_idx = (cursor.model_idx + 1) % self.models.len();
			cursor.key_idx = 0;
		}
	}
}
