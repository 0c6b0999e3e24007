//! Shared helpers for integration tests.
//!
//! Provides scripted and gated stage executors, workflow and `AppState`
//! construction, and ephemeral mock servers for third-party APIs, so test
//! modules can focus on behaviour rather than boilerplate.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use futures_util::future;
use futures_util::stream::{self, StreamExt};
use nexus_research::api::AppState;
use nexus_research::config::{GlobalConfig, TranscriptionConfig};
use nexus_research::models::session::SessionConfig;
use nexus_research::orchestrator::Workflow;
use nexus_research::persistence::{CheckpointStore, MemoryCheckpointStore};
use nexus_research::render::{PdfRenderer, RenderFuture};
use nexus_research::stages::{
    InterruptSignal, OutlineStages, ResultKey, StageContext, StageEvent, StageExecutor,
    StageGraph, StageStream,
};
use nexus_research::transcribe::Transcriber;
use nexus_research::{AppError, Result};
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// One scripted step of a [`ScriptedStages`] run.
#[derive(Debug, Clone)]
pub enum Step {
    Event(StageEvent),
    Fail(String),
}

pub fn progress(text: &str) -> Step {
    Step::Event(StageEvent::Progress(text.into()))
}

pub fn interrupt(prompt: &str, plan: Option<&str>) -> Step {
    Step::Event(StageEvent::Interrupt(InterruptSignal {
        prompt: prompt.into(),
        plan: plan.map(str::to_owned),
    }))
}

pub fn completion(key: ResultKey, payload: &str) -> Step {
    Step::Event(StageEvent::Completion {
        key,
        payload: payload.into(),
    })
}

/// Executor replaying a fixed script, counting how many events were pulled
/// and recording every context it was started with.
pub struct ScriptedStages {
    script: Vec<Step>,
    polled: Arc<AtomicUsize>,
    contexts: Mutex<Vec<StageContext>>,
}

impl ScriptedStages {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script,
            polled: Arc::new(AtomicUsize::new(0)),
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn polled(&self) -> usize {
        self.polled.load(Ordering::SeqCst)
    }

    pub fn contexts(&self) -> Vec<StageContext> {
        self.contexts.lock().unwrap().clone()
    }
}

impl StageExecutor for ScriptedStages {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn run(&self, context: StageContext) -> StageStream {
        self.contexts.lock().unwrap().push(context);
        let polled = Arc::clone(&self.polled);
        stream::iter(self.script.clone())
            .map(move |step| {
                polled.fetch_add(1, Ordering::SeqCst);
                match step {
                    Step::Event(event) => Ok(event),
                    Step::Fail(msg) => Err(AppError::Stage(msg)),
                }
            })
            .boxed()
    }
}

/// Outline executor that parks every run until released.
///
/// `entered` is notified once the run is being polled; the run proceeds
/// after `release` is notified.
#[derive(Default)]
pub struct GatedStages {
    inner: OutlineStages,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedStages {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl StageExecutor for GatedStages {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn run(&self, context: StageContext) -> StageStream {
        let entered = Arc::clone(&self.entered);
        let release = Arc::clone(&self.release);
        let inner = self.inner.run(context);
        stream::once(async move {
            entered.notify_one();
            release.notified().await;
        })
        .filter_map(|()| future::ready(None::<Result<StageEvent>>))
        .chain(inner)
        .boxed()
    }
}

pub fn outline() -> Arc<dyn StageExecutor> {
    Arc::new(OutlineStages::new())
}

/// Workflow over an in-memory store whose graph builder always yields
/// `graph`.
pub fn workflow_with(graph: StageGraph) -> Arc<Workflow> {
    workflow_with_store(graph, Arc::new(MemoryCheckpointStore::default()))
}

pub fn workflow_with_store(graph: StageGraph, store: Arc<dyn CheckpointStore>) -> Arc<Workflow> {
    Arc::new(
        Workflow::new(
            store,
            SessionConfig::default(),
            Arc::new(move || Ok(graph.clone())),
        )
        .expect("workflow builds"),
    )
}

/// Workflow driven entirely by the offline outline executor.
pub fn outline_workflow() -> Arc<Workflow> {
    workflow_with(StageGraph::uniform(outline()))
}

/// Renderer returning a fixed fake PDF, or failing when told to.
pub struct FakePdf {
    pub fail: bool,
}

pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n% fake document\n%%EOF\n";

impl PdfRenderer for FakePdf {
    fn render(&self, html: String) -> RenderFuture<'_> {
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                return Err(AppError::Render("converter crashed".into()));
            }
            assert!(html.contains("<html>"), "renderer receives an HTML document");
            Ok(FAKE_PDF.to_vec())
        })
    }
}

/// Application state around `workflow` with a fake PDF renderer.
pub fn app_state(workflow: Arc<Workflow>, transcription: TranscriptionConfig) -> Arc<AppState> {
    Arc::new(AppState {
        config: GlobalConfig::default(),
        workflow,
        transcriber: Transcriber::new(transcription),
        renderer: Arc::new(FakePdf { fail: false }),
    })
}

/// Router over the outline workflow with no transcription key.
pub fn outline_router() -> Router {
    let state = app_state(outline_workflow(), TranscriptionConfig::default());
    nexus_research::api::build_router(state).expect("router builds")
}

/// Serve `router` on an ephemeral local port and return its address.
pub async fn spawn_mock(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server");
    });
    addr
}
