//! The input adapter contract (`spec.md` §4.11, §6): the only interface
//! the pipeline core consumes from a source-format parser. A real parser
//! (WhatsApp export, Slack export, ...) lives outside this workspace and
//! implements this trait; this crate only defines the contract and the
//! test doubles used to exercise the runner without one.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use kiln_model::document::Document;
use kiln_model::entry::Entry;

use crate::error::AdapterError;
use crate::metadata::AdapterMetadata;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
	/// Entries ordered by timestamp, already anonymized at this boundary.
	/// The core trusts this ordering and this privacy guarantee; it never
	/// re-sorts or re-anonymizes what it receives.
	fn read_entries(&self) -> Result<Box<dyn Iterator<Item = Entry> + Send + '_>, AdapterError>;

	fn get_metadata(&self) -> AdapterMetadata;

	/// Materializes media referenced by entries (by `media_refs`) into
	/// `Media` documents under `target_dir`. Optional: adapters whose
	/// source has no media, or that resolve media references lazily
	/// elsewhere, can rely on the default no-op.
	async fn extract_media(&self, _root: &Path, _target_dir: &Path) -> Result<BTreeMap<String, Document>, AdapterError> {
		Ok(BTreeMap::new())
	}
}
