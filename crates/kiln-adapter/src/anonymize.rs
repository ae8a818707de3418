//! The anonymization boundary every adapter is expected to call before an
//! `Entry` leaves its `read_entries()` implementation (`spec.md` §4.11,
//! S6). Kept in core so namespace handling is implemented once rather
//! than reinvented per adapter.

use uuid::Uuid;

/// Deterministically maps a raw identity (a name, a phone number, an
/// account handle) to an opaque `author_id`, scoped to a namespace the
/// adapter chooses (e.g. `"whatsapp:family-group"`, `"tenant:X"`).
///
/// The namespace label is itself hashed into a UUID via
/// [`Uuid::NAMESPACE_DNS`] rather than used directly, so two adapters
/// that pick the same human-readable label always derive the same
/// anonymization space without needing to agree on a shared UUID
/// constant up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anonymizer {
	namespace: Uuid,
}

impl Anonymizer {
	pub fn new(namespace_label: &str) -> Self {
		Self { namespace: Uuid::new_v5(&Uuid::NAMESPACE_DNS, namespace_label.as_bytes()) }
	}

	/// Maps `raw_identity` to a stable opaque identifier. Calling this
	/// twice with the same input and namespace always yields the same
	/// output; the raw identity never appears in the result.
	pub fn anonymize(&self, raw_identity: &str) -> String {
		Uuid::new_v5(&self.namespace, raw_identity.as_bytes()).to_string()
	}
}
