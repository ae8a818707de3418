/// Descriptive, non-authoritative information about an adapter instance,
/// exposed to the runner for logging and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterMetadata {
	pub source_name: String,
	pub adapter_version: String,
	pub ir_schema_version: String,
}

impl AdapterMetadata {
	pub fn new(source_name: impl Into<String>, adapter_version: impl Into<String>, ir_schema_version: impl Into<String>) -> Self {
		Self {
			source_name: source_name.into(),
			adapter_version: adapter_version.into(),
			ir_schema_version: ir_schema_version.into(),
		}
	}
}
