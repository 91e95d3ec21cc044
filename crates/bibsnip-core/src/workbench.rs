//! Session-plus-document orchestration.
//!
//! The workbench is the single-threaded owner of mutable pipeline state
//! (active document, context window, style hint); background analysis runs
//! in spawned tasks that post [`WorkbenchEvent`]s back over a channel.
//! Every open bumps a generation counter and events carry the generation
//! they were computed against, so a fast second open simply orphans the
//! first open's in-flight results.

use std::path::Path;
use std::sync::Arc;

use bibsnip_llm::Session;
use tokio::sync::mpsc;

use crate::backend::{BackendError, DocumentBackend};
use crate::citation;
use crate::document::TextAccessor;
use crate::parse::BibRange;
use crate::range::resolve_bibliography_range;
use crate::style::{self, detect_citation_style};

/// Result of one background analysis task.
#[derive(Debug, Clone)]
pub enum WorkbenchEvent {
    ContextNarrowed { generation: u64, range: BibRange },
    NarrowingFailed { generation: u64, detail: String },
    StyleDetected { generation: u64, style: String },
    StyleUnavailable { generation: u64, detail: String },
}

impl WorkbenchEvent {
    pub fn generation(&self) -> u64 {
        match self {
            WorkbenchEvent::ContextNarrowed { generation, .. }
            | WorkbenchEvent::NarrowingFailed { generation, .. }
            | WorkbenchEvent::StyleDetected { generation, .. }
            | WorkbenchEvent::StyleUnavailable { generation, .. } => *generation,
        }
    }
}

pub struct Workbench {
    session: Arc<Session>,
    accessor: TextAccessor,
    context: String,
    style_hint: Option<String>,
    generation: u64,
}

impl Workbench {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            accessor: TextAccessor::new(),
            context: String::new(),
            style_hint: None,
            generation: 0,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn accessor(&self) -> &TextAccessor {
        &self.accessor
    }

    /// The context window currently supplied to resolution requests.
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn style_hint(&self) -> Option<&str> {
        self.style_hint.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Open (or replace) the active document: the previous handle, context
    /// window, and style hint are all superseded, and in-flight background
    /// results for them become stale.
    pub fn open_document(
        &mut self,
        backend: &dyn DocumentBackend,
        path: &Path,
    ) -> Result<(), BackendError> {
        self.accessor.open(backend, path)?;
        self.generation += 1;
        self.context = self.accessor.full_text();
        self.style_hint = None;
        tracing::info!(
            generation = self.generation,
            pages = self.accessor.page_count(),
            chars = self.context.len(),
            "document opened, full-text context installed"
        );
        Ok(())
    }

    /// Spawn range narrowing and style detection for the current document.
    /// Results arrive on `tx`; feed them back through [`apply_event`].
    ///
    /// [`apply_event`]: Workbench::apply_event
    pub fn spawn_background_analysis(&self, tx: mpsc::Sender<WorkbenchEvent>) {
        let generation = self.generation;

        let session = Arc::clone(&self.session);
        let full_text = self.context.clone();
        let tx_narrow = tx.clone();
        tokio::spawn(async move {
            let event = narrow_task(&session, &full_text, generation).await;
            let _ = tx_narrow.send(event).await;
        });

        let session = Arc::clone(&self.session);
        let early_text = self.accessor.text_in_range(1, style::STYLE_PROBE_PAGES);
        tokio::spawn(async move {
            let event = style_task(&session, &early_text, generation).await;
            let _ = tx.send(event).await;
        });
    }

    /// Apply a background result to the pipeline state. Returns a status
    /// line for display, or `None` when the event was stale and dropped.
    pub fn apply_event(&mut self, event: WorkbenchEvent) -> Option<String> {
        if event.generation() != self.generation {
            tracing::debug!(
                event_generation = event.generation(),
                current = self.generation,
                "dropping stale background result"
            );
            return None;
        }
        match event {
            WorkbenchEvent::ContextNarrowed { range, .. } => {
                let narrowed = self.accessor.text_in_range(range.start, range.end);
                if narrowed.is_empty() {
                    return Some(
                        "Bibliography auto-locate returned an empty range (using full text)."
                            .to_string(),
                    );
                }
                self.context = narrowed;
                Some(format!(
                    "Context narrowed to pages {}-{}.",
                    range.start, range.end
                ))
            }
            WorkbenchEvent::NarrowingFailed { detail, .. } => {
                tracing::warn!(detail = %detail, "bibliography narrowing failed");
                Some("Bibliography auto-locate failed (using full text).".to_string())
            }
            WorkbenchEvent::StyleDetected { style, .. } => {
                let line = format!("Citation style: {style}");
                self.style_hint = Some(style);
                Some(line)
            }
            WorkbenchEvent::StyleUnavailable { detail, .. } => {
                tracing::warn!(detail = %detail, "style detection failed");
                None
            }
        }
    }

    /// Resolve one drag-selection against the current context window.
    ///
    /// Never fails: every gateway error is converted to a `%` comment block
    /// suitable for appending to the output log.
    pub async fn resolve_selection(&self, selection: &str) -> String {
        match citation::resolve_citation(
            &self.session,
            selection,
            &self.context,
            self.style_hint.as_deref(),
        )
        .await
        {
            Ok(block) => block,
            Err(e) => {
                tracing::warn!(error = %e, "citation resolution failed");
                citation::error_comment(&e)
            }
        }
    }
}

/// Background half of context narrowing; pure with respect to workbench
/// state so a stale result cannot touch anything.
pub async fn narrow_task(session: &Session, full_text: &str, generation: u64) -> WorkbenchEvent {
    match resolve_bibliography_range(session, full_text).await {
        Ok(Some(range)) => WorkbenchEvent::ContextNarrowed { generation, range },
        Ok(None) => WorkbenchEvent::NarrowingFailed {
            generation,
            detail: "no references section reported".to_string(),
        },
        Err(e) => WorkbenchEvent::NarrowingFailed {
            generation,
            detail: e.to_string(),
        },
    }
}

/// Background half of style detection.
pub async fn style_task(session: &Session, early_text: &str, generation: u64) -> WorkbenchEvent {
    match detect_citation_style(session, early_text).await {
        Ok(style) => WorkbenchEvent::StyleDetected { generation, style },
        Err(e) => WorkbenchEvent::StyleUnavailable {
            generation,
            detail: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use bibsnip_llm::Provider;
    use bibsnip_llm::mock::{MockProvider, MockReply};
    use std::path::PathBuf;

    fn workbench_with(mock: MockProvider) -> Workbench {
        let session = Session::with_backend(
            Box::new(mock),
            Provider::OpenAi,
            "sk-test",
            "gpt-4o",
        );
        Workbench::new(Arc::new(session))
    }

    fn path() -> PathBuf {
        PathBuf::from("paper.pdf")
    }

    #[tokio::test]
    async fn open_installs_full_text_context() {
        let mut wb = workbench_with(MockProvider::new(MockReply::Text("unused".into())));
        wb.open_document(&FakeBackend::numbered(3), &path()).unwrap();
        assert_eq!(wb.generation(), 1);
        assert!(wb.context().contains("--- Page 1 ---"));
        assert!(wb.context().contains("--- Page 3 ---"));
        assert_eq!(wb.style_hint(), None);
    }

    #[tokio::test]
    async fn narrowing_replaces_the_context_window() {
        let mut wb = workbench_with(MockProvider::new(MockReply::Text(
            r#"{"start_page": 30, "end_page": 38, "reason": "references"}"#.into(),
        )));
        wb.open_document(&FakeBackend::numbered(40), &path()).unwrap();
        let full = wb.context().to_string();

        let event = narrow_task(wb.session(), &full, wb.generation()).await;
        let status = wb.apply_event(event).unwrap();
        assert_eq!(status, "Context narrowed to pages 30-38.");

        // Exactly pages 30-38, the full-document context is discarded.
        assert_eq!(wb.context(), wb.accessor().text_in_range(30, 38));
        assert!(wb.context().contains("--- Page 30 ---"));
        assert!(wb.context().contains("--- Page 38 ---"));
        assert!(!wb.context().contains("--- Page 29 ---"));
        assert!(!wb.context().contains("--- Page 39 ---"));
    }

    #[tokio::test]
    async fn failed_narrowing_keeps_full_text() {
        let mut wb = workbench_with(MockProvider::new(MockReply::Text(
            "no references here".into(),
        )));
        wb.open_document(&FakeBackend::numbered(10), &path()).unwrap();
        let full = wb.context().to_string();

        let event = narrow_task(wb.session(), &full, wb.generation()).await;
        let status = wb.apply_event(event).unwrap();
        assert!(status.contains("using full text"));
        assert_eq!(wb.context(), full);
    }

    #[tokio::test]
    async fn gateway_failure_during_narrowing_keeps_full_text() {
        let mut wb = workbench_with(MockProvider::new(MockReply::RateLimited));
        wb.open_document(&FakeBackend::numbered(10), &path()).unwrap();
        let full = wb.context().to_string();

        let event = narrow_task(wb.session(), &full, wb.generation()).await;
        wb.apply_event(event).unwrap();
        assert_eq!(wb.context(), full);
    }

    #[tokio::test]
    async fn stale_results_are_dropped_after_a_second_open() {
        let mut wb = workbench_with(MockProvider::new(MockReply::Text(
            r#"{"start_page": 2, "end_page": 3}"#.into(),
        )));
        wb.open_document(&FakeBackend::numbered(5), &path()).unwrap();
        let first_generation = wb.generation();
        let first_full = wb.context().to_string();

        // The first document's narrowing completes only after a second open.
        let stale = narrow_task(wb.session(), &first_full, first_generation).await;
        wb.open_document(&FakeBackend::numbered(8), &path()).unwrap();
        let second_full = wb.context().to_string();

        assert_eq!(wb.apply_event(stale), None);
        assert_eq!(wb.context(), second_full);
    }

    #[tokio::test]
    async fn style_event_sets_the_hint() {
        let mut wb = workbench_with(MockProvider::new(MockReply::Text(
            "Numeric Brackets".into(),
        )));
        wb.open_document(&FakeBackend::numbered(6), &path()).unwrap();

        let early = wb.accessor().text_in_range(1, style::STYLE_PROBE_PAGES);
        let event = style_task(wb.session(), &early, wb.generation()).await;
        let status = wb.apply_event(event).unwrap();
        assert_eq!(status, "Citation style: Numeric Brackets");
        assert_eq!(wb.style_hint(), Some("Numeric Brackets"));
    }

    #[tokio::test]
    async fn spawned_analysis_reports_over_the_channel() {
        let mock = MockProvider::with_sequence(vec![
            MockReply::Text(r#"{"start_page": 2, "end_page": 3}"#.into()),
            MockReply::Text("Author-Year".into()),
        ]);
        let mut wb = workbench_with(mock);
        wb.open_document(&FakeBackend::numbered(4), &path()).unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        wb.spawn_background_analysis(tx);

        let mut applied = 0;
        while let Some(event) = rx.recv().await {
            wb.apply_event(event);
            applied += 1;
        }
        // Both tasks reported and the channel closed when their senders dropped.
        assert_eq!(applied, 2);
    }

    #[tokio::test]
    async fn rate_limited_resolution_yields_a_comment_line() {
        let mut wb = workbench_with(MockProvider::new(MockReply::RateLimited));
        wb.open_document(&FakeBackend::numbered(2), &path()).unwrap();

        let out = wb.resolve_selection("[1]").await;
        assert!(out.starts_with('%'));
        assert!(out.to_lowercase().contains("rate limit"));
    }

    #[tokio::test]
    async fn sentinel_flows_through_resolve_selection() {
        let wb = workbench_with(MockProvider::new(MockReply::Text("unused".into())));
        let out = wb.resolve_selection("Fig. 2 shows...").await;
        assert_eq!(out, citation::NO_HANDLE_SENTINEL);
    }
}
