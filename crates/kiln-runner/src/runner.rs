//! The pipeline orchestrator (`spec.md` §4.10): drives an adapter's
//! entry stream through windowing, enrichment, retrieval, writer
//! invocation, and the run/checkpoint commit boundary, one window at a
//! time.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kiln_adapter::SourceAdapter;
use kiln_cache::CacheManager;
use kiln_config::{PipelineConfig, ResumeMode};
use kiln_enrich::{EnrichmentKind, EnrichmentTask, ProfileInput, ProfileWorker, TaskStore, UrlMediaEnricher};
use kiln_llm::Provider;
use kiln_model::document::{DocType, Document};
use kiln_model::entry::Entry;
use kiln_model::error::PipelineError;
use kiln_model::run::RunStatus;
use kiln_model::window::Window;
use kiln_rag::RagIndex;
use kiln_repo::DocumentRepository;
use kiln_runtracker::RunTracker;
use kiln_window::{Checkpoint, create_windows, load_checkpoint, save_checkpoint, split_into_n_parts};
use kiln_writer::{PipelineMetadata, WriterAgent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::context::RunnerContext;
use crate::error;
use crate::state::QueuedWindow;

const DEFAULT_RETRIEVAL_TOP_K: usize = 8;
const DEFAULT_MIN_SIMILARITY: f32 = 0.0;

/// Outcome of a single run, returned after the run reaches a terminal
/// status.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
	pub run_id: String,
	pub status: RunStatus,
	pub windows_committed: usize,
	pub documents_persisted: usize,
}

struct PreparedRun {
	run_id: String,
	resume_after: Option<DateTime<Utc>>,
}

enum WindowOutcome {
	Done { documents: Vec<Document> },
	SplitPending { children: Vec<QueuedWindow> },
}

/// Orchestrates one pipeline invocation end to end. Every collaborator
/// is constructed once by the caller and handed in fully formed — this
/// type owns no I/O setup of its own, matching `spec.md` §4.7's
/// centralized-instantiation rule for the workers it drives between
/// windows.
pub struct PipelineRunner<P: Provider> {
	adapter: Arc<dyn SourceAdapter>,
	config: PipelineConfig,
	checkpoint_path: PathBuf,
	media_root: PathBuf,
	media_target_dir: PathBuf,
	repo: DocumentRepository,
	tracker: RunTracker,
	cache: CacheManager,
	tasks: TaskStore,
	rag: Arc<RagIndex<P>>,
	writer: WriterAgent<P>,
	url_media_enricher: UrlMediaEnricher<P>,
	profile_worker: ProfileWorker<P>,
}

#[allow(clippy::too_many_arguments)]
impl<P: Provider> PipelineRunner<P> {
	pub fn new(
		adapter: Arc<dyn SourceAdapter>,
		config: PipelineConfig,
		checkpoint_path: PathBuf,
		media_root: PathBuf,
		media_target_dir: PathBuf,
		repo: DocumentRepository,
		tracker: RunTracker,
		cache: CacheManager,
		tasks: TaskStore,
		rag: Arc<RagIndex<P>>,
		writer: WriterAgent<P>,
		url_media_enricher: UrlMediaEnricher<P>,
		profile_worker: ProfileWorker<P>,
	) -> Self {
		Self {
			adapter,
			config,
			checkpoint_path,
			media_root,
			media_target_dir,
			repo,
			tracker,
			cache,
			tasks,
			rag,
			writer,
			url_media_enricher,
			profile_worker,
		}
	}

	/// Runs the pipeline to completion (or to the first error, or to
	/// cancellation), finishing the run record in every case before
	/// returning.
	#[instrument(skip(self, cancellation), fields(source = %self.config.source))]
	pub async fn run(&self, cancellation: &CancellationToken) -> Result<RunSummary, PipelineError> {
		let prepared = self.prepare().await?;
		let entries: Vec<Entry> = self.adapter.read_entries().map_err(error::from_adapter)?.collect();
		let mut queue = self.build_queue(&entries, prepared.resume_after)?;

		let mut windows_committed = 0usize;
		let mut documents_persisted = 0usize;

		while let Some(item) = queue.pop_front() {
			let window_label = item.window.label.clone();
			match self.process_queued_window(item, &prepared.run_id, cancellation).await {
				Ok(WindowOutcome::Done { documents }) => {
					windows_committed += 1;
					documents_persisted += documents.len();
				}
				Ok(WindowOutcome::SplitPending { children }) => {
					for child in children.into_iter().rev() {
						queue.push_front(child);
					}
				}
				Err(PipelineError::Cancelled) => {
					self.tracker.finish(&prepared.run_id, RunStatus::Cancelled, None).await.map_err(error::from_runtracker)?;
					info!(run_id = %prepared.run_id, "run cancelled");
					return Ok(RunSummary { run_id: prepared.run_id, status: RunStatus::Cancelled, windows_committed, documents_persisted });
				}
				Err(err) if err.is_run_fatal() => {
					let summary = err.to_string();
					self.tracker.finish(&prepared.run_id, RunStatus::Failed, Some(summary)).await.map_err(error::from_runtracker)?;
					warn!(run_id = %prepared.run_id, error = %err, "run failed");
					return Err(err);
				}
				Err(err) => {
					// Window-scoped failure (`spec.md` §7, e.g. `RepositoryError`):
					// the cursor hasn't advanced past this window, so it's still
					// reachable on the next invocation. Stop processing the rest
					// of the queue rather than committing a later window out of
					// order, which would strand this one behind the checkpoint
					// forever.
					let aborts = self.tracker.record_window_abort(&prepared.run_id).await.map_err(error::from_runtracker)?;
					warn!(run_id = %prepared.run_id, window = %window_label, error = %err, aborts, "window aborted, cursor not advanced");

					if aborts >= self.config.window_abort_threshold {
						let summary = format!(
							"{aborts} consecutive window(s) aborted without a commit, exceeding the configured threshold ({}); last error: {err}",
							self.config.window_abort_threshold
						);
						self.tracker.finish(&prepared.run_id, RunStatus::Failed, Some(summary)).await.map_err(error::from_runtracker)?;
						warn!(run_id = %prepared.run_id, error = %err, "run failed: window abort threshold exceeded");
						return Err(err);
					}

					info!(run_id = %prepared.run_id, windows_committed, documents_persisted, "run left running; recoverable on next invocation");
					return Ok(RunSummary { run_id: prepared.run_id, status: RunStatus::Running, windows_committed, documents_persisted });
				}
			}
		}

		self.tracker.finish(&prepared.run_id, RunStatus::Succeeded, None).await.map_err(error::from_runtracker)?;
		info!(run_id = %prepared.run_id, windows_committed, documents_persisted, "run succeeded");
		Ok(RunSummary { run_id: prepared.run_id, status: RunStatus::Succeeded, windows_committed, documents_persisted })
	}

	/// Cascades any requested cache refresh, then obtains or creates the
	/// `Run` record and the resumption cursor (`spec.md` §4.9, §4.10).
	async fn prepare(&self) -> Result<PreparedRun, PipelineError> {
		self.cache.refresh(self.config.refresh).await.map_err(error::from_cache)?;

		let fingerprint = self.config.fingerprint();
		let checkpoint = match self.config.resume {
			ResumeMode::Resume => load_checkpoint(&self.checkpoint_path).map_err(error::from_checkpoint)?,
			ResumeMode::FromScratch => None,
		};

		let run_id = match self.config.resume {
			ResumeMode::Resume => match self.tracker.latest(&fingerprint).await.map_err(error::from_runtracker)? {
				Some(run) if !run.status.is_terminal() => {
					if run.status == RunStatus::Pending {
						self.tracker.start(&run.run_id).await.map_err(error::from_runtracker)?;
					}
					debug!(run_id = %run.run_id, cursor = ?run.cursor, "resuming run");
					run.run_id
				}
				_ => self.start_new_run(&fingerprint).await?,
			},
			ResumeMode::FromScratch => self.start_new_run(&fingerprint).await?,
		};

		Ok(PreparedRun { run_id, resume_after: checkpoint.map(|c| c.resume_after) })
	}

	async fn start_new_run(&self, fingerprint: &str) -> Result<String, PipelineError> {
		let run_id = self.tracker.create_run(fingerprint).await.map_err(error::from_runtracker)?;
		self.tracker.start(&run_id).await.map_err(error::from_runtracker)?;
		Ok(run_id)
	}

	/// Filters out entries already committed by a prior invocation, then
	/// windows the remainder.
	fn build_queue(&self, entries: &[Entry], resume_after: Option<DateTime<Utc>>) -> Result<VecDeque<QueuedWindow>, PipelineError> {
		let filtered: Vec<Entry> = match resume_after {
			Some(ts) => entries.iter().filter(|e| e.timestamp > ts).cloned().collect(),
			None => entries.to_vec(),
		};
		let windows = create_windows(&filtered, self.config.window.size, self.config.window.unit, self.config.window.overlap_ratio).map_err(error::from_window)?;
		Ok(windows.into_iter().map(|w| QueuedWindow::new(w, 0)).collect())
	}

	/// Runs one queued window through enrichment, retrieval, and writer
	/// invocation, splitting it and re-queueing the parts if it overflows
	/// the prompt size budget.
	async fn process_queued_window(&self, item: QueuedWindow, run_id: &str, cancellation: &CancellationToken) -> Result<WindowOutcome, PipelineError> {
		if cancellation.is_cancelled() {
			return Err(PipelineError::Cancelled);
		}

		let media_docs = self.extract_media(&item.window).await?;
		let enrichments = self.enrich_window(&item.window, &media_docs, cancellation).await?;
		let retrieved = self.retrieve_context(&item.window, cancellation).await?;
		let profiles = self.recent_profiles(&item.window).await?;

		match self.invoke_writer(&item.window, &enrichments, &retrieved, &profiles, run_id, cancellation).await {
			Ok(documents) => {
				self.drain_background(&item.window, cancellation).await?;
				self.commit_window(run_id, &item.window).await?;
				Ok(WindowOutcome::Done { documents })
			}
			Err(PipelineError::PromptTooLarge { estimated_size, limit }) => self.split_or_fail(item, estimated_size, limit),
			Err(other) => Err(other),
		}
	}

	fn split_or_fail(&self, item: QueuedWindow, estimated_size: usize, limit: usize) -> Result<WindowOutcome, PipelineError> {
		let can_split = item.depth < self.config.max_split_depth && item.window.size() >= 2 * self.config.min_window_size;
		if !can_split {
			return Err(PipelineError::Fatal(format!(
				"window {} exceeded the prompt size limit ({estimated_size} > {limit}) and its split budget is exhausted at depth {}",
				item.window.label, item.depth
			)));
		}
		let parts = split_into_n_parts(&item.window, self.config.split_parts).map_err(error::from_window)?;
		debug!(window = %item.window.label, parts = parts.len(), depth = item.depth, "window split on prompt overflow");
		Ok(WindowOutcome::SplitPending { children: parts.into_iter().map(|w| QueuedWindow::new(w, item.depth + 1)).collect() })
	}

	/// Materializes media referenced by this window's entries, persists
	/// each one, enqueues URL/media enrichment tasks, runs the enricher,
	/// and returns the resulting `Enrichment` documents for the writer.
	async fn enrich_window(&self, window: &Window, media_docs: &[Document], cancellation: &CancellationToken) -> Result<Vec<Document>, PipelineError> {
		for doc in media_docs {
			self.repo.upsert(doc).await.map_err(error::from_repo)?;
		}

		let media_tasks = media_docs.iter().map(|doc| EnrichmentTask {
			id: format!("media:{}", doc.id),
			kind: EnrichmentKind::Media,
			asset_uri: doc.content_body.clone(),
			parent_media_id: Some(doc.id.clone()),
		});
		let url_tasks = window.entries.iter().flat_map(|e| e.links.iter()).collect::<BTreeSet<_>>().into_iter().map(|link| EnrichmentTask {
			id: format!("url:{link}"),
			kind: EnrichmentKind::Url,
			asset_uri: link.clone(),
			parent_media_id: None,
		});
		let tasks: Vec<EnrichmentTask> = media_tasks.chain(url_tasks).collect();
		let task_ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();

		if !tasks.is_empty() {
			self.tasks.enqueue(&tasks).await.map_err(error::from_enrich)?;
		}
		self.url_media_enricher.run(cancellation).await.map_err(error::from_enrich)?;

		let mut enrichments = Vec::with_capacity(task_ids.len());
		for task_id in task_ids {
			if let Some(doc) = self.repo.get(&format!("enrichment:{task_id}"), DocType::Enrichment).await.map_err(error::from_repo)? {
				enrichments.push(doc);
			}
		}
		Ok(enrichments)
	}

	/// Only the subset of extracted media referenced by this window's
	/// entries: `SourceAdapter::extract_media` is adapter-scoped, not
	/// window-scoped, so the runner filters down to what this window
	/// actually needs.
	async fn extract_media(&self, window: &Window) -> Result<Vec<Document>, PipelineError> {
		let media = self.adapter.extract_media(&self.media_root, &self.media_target_dir).await.map_err(error::from_adapter)?;
		let refs: BTreeSet<&String> = window.entries.iter().flat_map(|e| e.media_refs.iter()).collect();
		Ok(media.into_iter().filter(|(reference, _)| refs.contains(reference)).map(|(_, doc)| doc).collect())
	}

	/// Retrieves the most semantically relevant already-published posts
	/// for this window's content, via the RAG index.
	async fn retrieve_context(&self, window: &Window, cancellation: &CancellationToken) -> Result<Vec<Document>, PipelineError> {
		let query: String = window.entries.iter().map(|e| e.content.as_str()).collect::<Vec<_>>().join("\n");
		if query.trim().is_empty() {
			return Ok(Vec::new());
		}
		let hits = self.rag.search(&query, DEFAULT_RETRIEVAL_TOP_K, DEFAULT_MIN_SIMILARITY, cancellation).await.map_err(error::from_rag)?;
		let mut docs = Vec::with_capacity(hits.len());
		for hit in hits {
			if let Some(doc) = self.repo.get(&hit.doc_id, DocType::Post).await.map_err(error::from_repo)? {
				docs.push(doc);
			}
		}
		Ok(docs)
	}

	/// Existing `Profile` documents for authors present in this window,
	/// handed to the writer as context distinct from the fresh profile
	/// updates `drain_background` produces for the *next* window.
	async fn recent_profiles(&self, window: &Window) -> Result<Vec<Document>, PipelineError> {
		let mut seen = BTreeSet::new();
		let mut profiles = Vec::new();
		for entry in &window.entries {
			if seen.insert(entry.author_id.clone())
				&& let Some(doc) = self.repo.get(&entry.author_id, DocType::Profile).await.map_err(error::from_repo)?
			{
				profiles.push(doc);
			}
		}
		Ok(profiles)
	}

	/// Rejects windows over the configured prompt size budget before
	/// ever calling the writer (`spec.md` §4.10's overflow detection);
	/// otherwise delegates to [`WriterAgent::generate_for_window`].
	async fn invoke_writer(
		&self,
		window: &Window,
		enrichments: &[Document],
		retrieved: &[Document],
		profiles: &[Document],
		run_id: &str,
		cancellation: &CancellationToken,
	) -> Result<Vec<Document>, PipelineError> {
		let estimated_size = window.byte_size();
		if estimated_size > self.config.max_prompt_size {
			return Err(PipelineError::PromptTooLarge { estimated_size, limit: self.config.max_prompt_size });
		}

		let metadata = PipelineMetadata {
			run_id: run_id.to_string(),
			window_label: window.label.clone(),
			config_fingerprint: self.config.fingerprint(),
			source: self.config.source.clone(),
		};
		let context = RunnerContext::new(self.rag.clone(), self.repo.clone(), metadata, cancellation.clone());

		self.writer
			.generate_for_window(window, enrichments, retrieved, profiles, &context, cancellation)
			.await
			.map_err(error::from_writer)
	}

	/// Catches up any enrichment left pending after this window's own
	/// pass (e.g. a re-enqueued failure), then refreshes author profiles
	/// touched by this window (`spec.md` §4.10.f).
	async fn drain_background(&self, window: &Window, cancellation: &CancellationToken) -> Result<(), PipelineError> {
		self.url_media_enricher.run(cancellation).await.map_err(error::from_enrich)?;

		let inputs = profile_inputs_for(window);
		if !inputs.is_empty() {
			self.profile_worker.run(&inputs, cancellation).await.map_err(error::from_enrich)?;
		}
		Ok(())
	}

	/// Durably checkpoints the window label, then advances the run
	/// tracker's cursor, in that order: resumption reads the checkpoint
	/// file, not the tracker's cursor, so a failure here must not advance
	/// the tracker past what's actually been checkpointed (`spec.md`
	/// §4.9/§6/§7). A crash between the two leaves the checkpoint ahead of
	/// the tracker; the next resume still re-derives its run from the
	/// checkpoint and the tracker simply records a fresh one.
	async fn commit_window(&self, run_id: &str, window: &Window) -> Result<(), PipelineError> {
		// Checkpoint file first: if this fails the tracker's cursor must
		// not have moved yet, or a `RepositoryError` here would advance the
		// cursor in violation of spec.md §7's "do not advance cursor" policy.
		let checkpoint = Checkpoint::new(window.label.clone(), window.end_time);
		save_checkpoint(&self.checkpoint_path, &checkpoint).map_err(error::from_checkpoint)?;
		self.tracker.advance(run_id, &window.label).await.map_err(error::from_runtracker)?;
		Ok(())
	}
}

fn profile_inputs_for(window: &Window) -> Vec<ProfileInput> {
	let mut by_author: BTreeMap<String, Vec<String>> = BTreeMap::new();
	for entry in &window.entries {
		by_author.entry(entry.author_id.clone()).or_default().push(entry.content.clone());
	}
	by_author.into_iter().map(|(author_id, recent_contributions)| ProfileInput { author_id, recent_contributions }).collect()
}
