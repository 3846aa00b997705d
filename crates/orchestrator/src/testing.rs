//! In-memory collaborators for orchestrator tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use events::EventBus;
use pagecraft_core::{GenerationContext, SessionMetadata, SessionSnapshot};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::emitter::OrderedEventEmitter;
use crate::error::{OrchestratorError, Result};
use crate::generator::ContentGenerator;
use crate::orchestrator::SectionOrchestrator;
use crate::persister::Persister;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorCall {
    pub section: String,
    pub feedback: Option<String>,
    pub previous_content: Option<String>,
}

/// Generator that answers from per-section scripts.
///
/// Unscripted calls succeed with `<section>{name} v{n}</section>`, where `n`
/// counts calls for that section. A held generator parks every call until
/// [`ScriptedGenerator::release`] hands out permits.
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<String, VecDeque<std::result::Result<String, String>>>>,
    calls: Mutex<Vec<GeneratorCall>>,
    gate: Semaphore,
    held: bool,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
            held: false,
        }
    }

    pub fn held() -> Self {
        Self {
            held: true,
            ..Self::new()
        }
    }

    pub fn respond_with(&self, section: &str, content: &str) {
        self.push(section, Ok(content.to_string()));
    }

    pub fn fail_next(&self, section: &str, reason: &str) {
        self.push(section, Err(reason.to_string()));
    }

    pub fn release(&self, calls: usize) {
        self.gate.add_permits(calls);
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn push(&self, section: &str, outcome: std::result::Result<String, String>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(section.to_string())
            .or_default()
            .push_back(outcome);
    }

    async fn respond(&self, call: GeneratorCall) -> Result<String> {
        let section = call.section.clone();
        let nth = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.iter().filter(|c| c.section == section).count()
        };

        if self.held {
            self.gate
                .acquire()
                .await
                .map_err(|e| OrchestratorError::generation(&section, e))?
                .forget();
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&section)
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(Ok(content)) => Ok(content),
            Some(Err(reason)) => Err(OrchestratorError::generation(&section, reason)),
            None => Ok(format!("<section>{section} v{nth}</section>")),
        }
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, section_name: &str, _context: &GenerationContext) -> Result<String> {
        self.respond(GeneratorCall {
            section: section_name.to_string(),
            feedback: None,
            previous_content: None,
        })
        .await
    }

    async fn regenerate(
        &self,
        section_name: &str,
        _context: &GenerationContext,
        feedback: &str,
        previous_content: &str,
    ) -> Result<String> {
        self.respond(GeneratorCall {
            section: section_name.to_string(),
            feedback: Some(feedback.to_string()),
            previous_content: Some(previous_content.to_string()),
        })
        .await
    }
}

/// Persister that records everything and fails on demand.
///
/// After [`RecordingPersister::hold_saves`] every save parks until
/// [`RecordingPersister::release_saves`] hands out permits.
pub struct RecordingPersister {
    saved: Mutex<Vec<(Uuid, String, String)>>,
    finalized: Mutex<Vec<SessionMetadata>>,
    fail_saves: AtomicBool,
    fail_finalize: AtomicBool,
    hold_saves: AtomicBool,
    pending_saves: AtomicUsize,
    save_gate: Semaphore,
}

impl Default for RecordingPersister {
    fn default() -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            finalized: Mutex::new(Vec::new()),
            fail_saves: AtomicBool::new(false),
            fail_finalize: AtomicBool::new(false),
            hold_saves: AtomicBool::new(false),
            pending_saves: AtomicUsize::new(0),
            save_gate: Semaphore::new(0),
        }
    }
}

impl RecordingPersister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold_saves(&self) {
        self.hold_saves.store(true, Ordering::SeqCst);
    }

    pub fn release_saves(&self, saves: usize) {
        self.save_gate.add_permits(saves);
    }

    /// Saves currently parked on the gate.
    pub fn pending_saves(&self) -> usize {
        self.pending_saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_finalize(&self, fail: bool) {
        self.fail_finalize.store(fail, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Vec<(Uuid, String, String)> {
        self.saved.lock().unwrap().clone()
    }

    pub fn finalized(&self) -> Vec<SessionMetadata> {
        self.finalized.lock().unwrap().clone()
    }
}

#[async_trait]
impl Persister for RecordingPersister {
    async fn save(&self, session_id: Uuid, section_name: &str, content: &str) -> Result<()> {
        if self.hold_saves.load(Ordering::SeqCst) {
            self.pending_saves.fetch_add(1, Ordering::SeqCst);
            let permit = self.save_gate.acquire().await;
            self.pending_saves.fetch_sub(1, Ordering::SeqCst);
            permit
                .map_err(|e| OrchestratorError::persistence(section_name, e))?
                .forget();
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(OrchestratorError::persistence(section_name, "disk full"));
        }
        self.saved.lock().unwrap().push((
            session_id,
            section_name.to_string(),
            content.to_string(),
        ));
        Ok(())
    }

    async fn finalize(&self, metadata: &SessionMetadata) -> Result<()> {
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(OrchestratorError::finalize_failed("disk full"));
        }
        self.finalized.lock().unwrap().push(metadata.clone());
        Ok(())
    }
}

pub struct Harness {
    pub orchestrator: SectionOrchestrator,
    pub generator: Arc<ScriptedGenerator>,
    pub persister: Arc<RecordingPersister>,
    pub bus: EventBus,
}

impl Harness {
    pub fn new(generator: ScriptedGenerator) -> Self {
        let generator = Arc::new(generator);
        let persister = Arc::new(RecordingPersister::new());
        let bus = EventBus::new();
        let orchestrator = SectionOrchestrator::new(
            generator.clone(),
            persister.clone(),
            OrderedEventEmitter::new(bus.clone()),
        );

        Self {
            orchestrator,
            generator,
            persister,
            bus,
        }
    }

    /// Poll the snapshot until `condition` holds.
    pub async fn wait_until(&self, condition: impl Fn(&SessionSnapshot) -> bool) -> SessionSnapshot {
        for _ in 0..400 {
            if let Ok(snapshot) = self.orchestrator.snapshot() {
                if condition(&snapshot) {
                    return snapshot;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "condition not met; last snapshot: {:?}",
            self.orchestrator.snapshot()
        );
    }

    /// Wait until `section` is under review.
    pub async fn wait_for_review(&self, section: &str) -> SessionSnapshot {
        self.wait_until(|s| s.review.as_ref().is_some_and(|r| r.name == section))
            .await
    }
}

pub async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}
