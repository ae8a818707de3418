//! The writer agent (C8): assembles a prompt for one window, checks the
//! L3 semantic cache, invokes the LLM with a small tool surface when the
//! cache misses, parses zero or more posts out of the structured
//! response, and persists + reindexes each one.
//!
//! One execution path: there is no flag that swaps the template loader
//! for a hardcoded prompt, and no fallback model — [`WriterAgent::new`]'s
//! required arguments are the only way to configure this crate
//! (`spec.md` §4.8).

mod error;
mod prompt;
mod response;
mod tool;

pub use error::WriterError;
pub use prompt::{PromptSections, assemble_prompt};
pub use response::{RawPost, RawWriterResponse};
pub use tool::{PipelineContext, PipelineMetadata, WriterTool};

use std::collections::BTreeSet;
use std::sync::Arc;

use kiln_cache::{CacheKey, CacheManager};
use kiln_llm::{LlmClient, Message, Provider, RequestSettings, Role};
use kiln_model::document::{ContentType, DocType, Document};
use kiln_model::slug::{disambiguate, slugify};
use kiln_model::window::Window;
use kiln_rag::RagIndex;
use kiln_repo::DocumentRepository;
use serde_json::Map;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Date strings containing one of these are rejected as ranges rather
/// than a single canonical date (`spec.md` §4.8). Chosen to avoid
/// false-positives on ordinary hyphenated dates like `2026-01-01`.
const DATE_RANGE_MARKERS: [&str; 4] = [" to ", "..", " – ", " — "];
const DEFAULT_MAX_TOOL_ITERATIONS: usize = 4;

/// The system instructions template's sole required input. Swapping this
/// out is the only supported way to change the writer's voice — there is
/// no second, hardcoded prompt path.
pub struct WriterPrompts {
	pub system_instructions: String,
}

/// Drives generation for one window: cache check, prompt assembly, the
/// tool-calling loop, response parsing, and persistence + RAG reindex.
pub struct WriterAgent<P: Provider> {
	client: Arc<LlmClient<P>>,
	rag: Arc<RagIndex<P>>,
	cache: CacheManager,
	repo: DocumentRepository,
	prompts: WriterPrompts,
	prompt_version: String,
	max_tool_iterations: usize,
}

impl<P: Provider> WriterAgent<P> {
	pub fn new(client: Arc<LlmClient<P>>, rag: Arc<RagIndex<P>>, cache: CacheManager, repo: DocumentRepository, prompts: WriterPrompts, prompt_version: impl Into<String>) -> Self {
		Self { client, rag, cache, repo, prompts, prompt_version: prompt_version.into(), max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS }
	}

	pub fn with_max_tool_iterations(mut self, n: usize) -> Self {
		self.max_tool_iterations = n;
		self
	}

	/// Generates (or replays from cache) the posts for `window`, persists
	/// each one, and enqueues it for RAG reindexing. Returns the persisted
	/// `Post` documents, in the order the model produced them.
	#[instrument(skip(self, window, enrichments, retrieved, profiles, context, cancellation), fields(window = %window.label))]
	pub async fn generate_for_window(
		&self,
		window: &Window,
		enrichments: &[Document],
		retrieved: &[Document],
		profiles: &[Document],
		context: &dyn PipelineContext,
		cancellation: &CancellationToken,
	) -> Result<Vec<Document>, WriterError> {
		let cache_key = CacheKey::for_writer_output(&fingerprint_window(window), &fingerprint_documents(enrichments), &fingerprint_documents(retrieved), &self.prompt_version);

		let (raw_posts, from_cache) = match self.cache.get(&cache_key).await? {
			Some(bytes) => {
				debug!("writer output cache hit, skipping LLM call");
				(serde_json::from_slice::<Vec<RawPost>>(&bytes)?, true)
			}
			None => (self.invoke_writer(window, profiles, retrieved, context, cancellation).await?, false),
		};

		// Validate every post before caching the raw output: the cache entry
		// is replayed on a retry of this window, so writing it before
		// `materialize_post` validates would let a rejected post (e.g.
		// `DateRangeRejected`) come back byte-for-byte on every future
		// attempt, with no way for the window to ever succeed.
		let mut documents = Vec::with_capacity(raw_posts.len());
		for raw in raw_posts.iter().cloned() {
			let doc = self.materialize_post(raw, window).await?;
			self.repo.upsert(&doc).await?;
			documents.push(doc);
		}
		if !from_cache {
			self.cache.put(&cache_key, &serde_json::to_vec(&raw_posts)?, None).await?;
		}
		if !documents.is_empty() {
			self.rag.index_documents(&documents, cancellation).await?;
		}
		Ok(documents)
	}

	/// The tool-calling loop: request, dispatch every tool call the model
	/// asked for, and repeat until it answers with no further tool calls
	/// or the iteration budget is exhausted.
	async fn invoke_writer(&self, window: &Window, profiles: &[Document], retrieved: &[Document], context: &dyn PipelineContext, cancellation: &CancellationToken) -> Result<Vec<RawPost>, WriterError> {
		let sections = prompt::assemble_prompt(&self.prompts.system_instructions, window, profiles, retrieved)?;
		let mut messages = vec![Message::new(Role::System, sections.system), Message::new(Role::User, sections.user)];

		for _ in 0..self.max_tool_iterations {
			let response = self.client.request(&messages, &RequestSettings::default(), cancellation).await?;
			if response.tool_calls.is_empty() {
				let parsed: RawWriterResponse = serde_json::from_str(&response.content)?;
				return Ok(parsed.posts);
			}

			messages.push(Message::new(Role::Assistant, response.content.clone()));
			for call in &response.tool_calls {
				let tool = WriterTool::parse(&call.name, &call.arguments).ok_or_else(|| WriterError::UnknownTool(call.name.clone()))?;
				let result = tool.dispatch(context).await?;
				messages.push(Message::new(Role::Tool, result.to_string()));
			}
		}

		Err(WriterError::ToolBudgetExceeded(self.max_tool_iterations))
	}

	/// Builds the persisted `Post` document for one raw model output.
	/// `date` is validated but never trusted: the canonical date is
	/// always the window's start time (`spec.md` §4.8).
	async fn materialize_post(&self, raw: RawPost, window: &Window) -> Result<Document, WriterError> {
		if let Some(date) = &raw.date {
			reject_date_range(date)?;
		}
		let canonical_date = window.start_time;
		let slug = self.unique_slug(&raw.title).await?;
		let authors: BTreeSet<String> = if raw.authors.is_empty() { window.entries.iter().map(|e| e.author_id.clone()).collect() } else { raw.authors.into_iter().collect() };
		let metadata = Map::from_iter([("prompt_version".to_string(), serde_json::Value::String(self.prompt_version.clone()))]);

		Ok(Document::new(slug, DocType::Post, raw.title, canonical_date, canonical_date, authors, raw.body, ContentType::Markdown, None, Some(window.label.clone()), metadata)?)
	}

	/// Derives a post id via [`slugify`], the single legal derivation path
	/// (`kiln_model::slug`), disambiguating against any already-persisted
	/// post sharing the same slug from a different window.
	async fn unique_slug(&self, title: &str) -> Result<String, WriterError> {
		let base = slugify(title);
		let mut n = 0u32;
		loop {
			let candidate = disambiguate(&base, n);
			if self.repo.get(&candidate, DocType::Post).await?.is_none() {
				return Ok(candidate);
			}
			n += 1;
		}
	}
}

fn reject_date_range(date: &str) -> Result<(), WriterError> {
	if DATE_RANGE_MARKERS.iter().any(|marker| date.contains(marker)) {
		return Err(WriterError::DateRangeRejected(date.to_string()));
	}
	Ok(())
}

fn fingerprint_window(window: &Window) -> String {
	let mut hasher = Sha256::new();
	hasher.update(window.label.as_bytes());
	for entry in &window.entries {
		hasher.update(entry.id.as_bytes());
		hasher.update(b"\0");
		hasher.update(entry.content.as_bytes());
		hasher.update(b"\0");
	}
	hex_encode(&hasher.finalize())
}

fn fingerprint_documents(docs: &[Document]) -> String {
	let mut ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
	ids.sort_unstable();
	let mut hasher = Sha256::new();
	for id in ids {
		hasher.update(id.as_bytes());
		hasher.update(b"\0");
	}
	hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
	use std::fmt::Write;
	bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
		write!(acc, "{b:02x}").unwrap();
		acc
	})
}
