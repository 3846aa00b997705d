use std::sync::{Arc, Mutex, PoisonError};

use events::Event;
use pagecraft_core::{GenerationContext, SectionSpec, SessionMetadata, SessionPhase, SessionSnapshot};
use tokio::runtime::Handle;
use tokio::sync::MutexGuard;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::emitter::OrderedEventEmitter;
use crate::error::{OrchestratorError, Result};
use crate::generator::ContentGenerator;
use crate::persister::Persister;
use crate::reconciler::{ReconcileAction, Reconciler};
use crate::resources::GenerationGuard;
use crate::session_store::{GenerationKind, GenerationRequest, GenerationTicket, Session};

/// What happened to a generator result once it reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    /// Content stored; the section awaits approval.
    Ready,
    /// Automatic generation failed and the pipeline moved past the section.
    Skipped(String),
    /// Regeneration failed and the previous content is back under review.
    Restored(String),
    /// The ticket no longer matched the session; nothing changed.
    Discarded,
}

struct Inner {
    store: Mutex<Option<Session>>,
    /// Serializes caller operations that commit across an await point.
    /// `start` and `reset` never take it.
    commit: tokio::sync::Mutex<()>,
    generator: Arc<dyn ContentGenerator>,
    persister: Arc<dyn Persister>,
    events: OrderedEventEmitter,
}

/// Drives one section generation session at a time.
///
/// Cheap to clone; clones share the same session. Every mutation is followed
/// by [`SectionOrchestrator::reconcile`], which re-derives the next step from
/// the current state and dispatches it on the tokio runtime.
#[derive(Clone)]
pub struct SectionOrchestrator {
    inner: Arc<Inner>,
}

impl SectionOrchestrator {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        persister: Arc<dyn Persister>,
        events: OrderedEventEmitter,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(None),
                commit: tokio::sync::Mutex::new(()),
                generator,
                persister,
                events,
            }),
        }
    }

    pub fn events(&self) -> &OrderedEventEmitter {
        &self.inner.events
    }

    /// Begin a new session; the reconcile loop takes it from there.
    ///
    /// A finished (`Complete` or `Failed`) session is replaced. A session
    /// that is still running must be reset first. Never waits on the commit
    /// lock: the swap happens under the store lock, and operations still
    /// committing against the old session re-check its id.
    pub async fn start(
        &self,
        sections: Vec<SectionSpec>,
        context: GenerationContext,
    ) -> Result<Uuid> {
        let session = Session::start(sections, context)?;
        let session_id = session.id();

        self.with_store(|slot| {
            if let Some(existing) = slot.as_ref() {
                if existing.phase().is_active() {
                    return Err(OrchestratorError::precondition(
                        "start",
                        format!("session {} is still {}", existing.id(), existing.phase()),
                    ));
                }
            }

            self.emit(Event::SessionStarted {
                session_id,
                section_count: session.len(),
            });
            *slot = Some(session);
            Ok(())
        })?;

        info!(session_id = %session_id, "Session started");
        self.reconcile();
        Ok(session_id)
    }

    /// Re-evaluate the guard and dispatch whatever it yields.
    ///
    /// Never blocks: generator and finalize calls run on spawned tasks and
    /// re-enter through [`SectionOrchestrator::on_generation_result`].
    pub fn reconcile(&self) {
        let Ok(handle) = Handle::try_current() else {
            warn!("Reconcile called outside a tokio runtime; nothing dispatched");
            return;
        };

        let action = self.with_store(|slot| {
            let Some(session) = slot.as_mut() else {
                return ReconcileAction::Idle;
            };

            let action = Reconciler::evaluate(session);
            match &action {
                ReconcileAction::Generate(request) => self.emit(Event::SectionGenerating {
                    session_id: request.ticket.session_id,
                    section: request.ticket.section.clone(),
                    attempt: request.ticket.attempt,
                    regeneration: false,
                }),
                ReconcileAction::Finalize(metadata) => self.emit(Event::SessionFinalizing {
                    session_id: metadata.session_id,
                }),
                ReconcileAction::Idle => {}
            }
            action
        });

        match action {
            ReconcileAction::Idle => {}
            ReconcileAction::Generate(request) => {
                info!(
                    session_id = %request.ticket.session_id,
                    section = %request.ticket.section,
                    attempt = request.ticket.attempt,
                    "Generating section"
                );
                let orchestrator = self.clone();
                handle.spawn(async move {
                    orchestrator.run_generation(request).await;
                });
            }
            ReconcileAction::Finalize(metadata) => {
                info!(session_id = %metadata.session_id, "All sections processed, finalizing");
                let orchestrator = self.clone();
                handle.spawn(async move {
                    // Outcome is recorded on the session and broadcast.
                    let _ = orchestrator.run_finalize(metadata).await;
                });
            }
        }
    }

    /// Re-entry point for a completed generator call.
    ///
    /// Results whose ticket no longer matches the session are dropped.
    pub fn on_generation_result(&self, ticket: GenerationTicket, result: Result<String>) {
        self.settle(&ticket, result);
    }

    /// Persist the section under review and advance past it.
    ///
    /// On a persister error nothing changes and the call can be retried.
    pub async fn approve(&self) -> Result<()> {
        let _commit = self.try_commit("approve")?;
        let (session_id, item) =
            self.with_session(|s| Ok((s.id(), s.review_item("approve")?)))?;

        if let Err(e) = self
            .inner
            .persister
            .save(session_id, &item.name, &item.content)
            .await
        {
            let e = match e {
                OrchestratorError::PersistenceFailure { .. } => e,
                other => OrchestratorError::persistence(&item.name, other),
            };
            error!(session_id = %session_id, section = %item.name, error = %e, "Failed to save approved section");
            self.emit(Event::Error {
                message: e.to_string(),
                context: Some(format!("approve '{}'", item.name)),
            });
            return Err(e);
        }

        self.with_session(|s| {
            if s.id() != session_id {
                return Err(OrchestratorError::precondition(
                    "approve",
                    "session was replaced while saving",
                ));
            }
            s.mark_approved()?;
            self.emit(Event::SectionApproved {
                session_id,
                section: item.name.clone(),
                progress: s.progress(),
            });
            info!(session_id = %session_id, section = %item.name, progress = s.progress(), "Section approved");
            Ok(())
        })?;

        self.reconcile();
        Ok(())
    }

    /// Throw away the candidate content; the loop generates the section again.
    pub fn reject(&self) -> Result<()> {
        let _commit = self.try_commit("reject")?;
        self.with_session(|s| {
            s.reject_current()?;
            if let Some(section) = s.current() {
                info!(session_id = %s.id(), section = %section.name, "Section rejected");
                self.emit(Event::SectionRejected {
                    session_id: s.id(),
                    section: section.name.clone(),
                });
            }
            Ok(())
        })?;

        self.reconcile();
        Ok(())
    }

    /// Regenerate the section under review using `feedback`.
    ///
    /// Waits for the generator. On failure the previous content is kept under
    /// review and the failure is returned.
    pub async fn regenerate(&self, feedback: &str) -> Result<()> {
        let _commit = self.try_commit("regenerate")?;
        let request = self.with_session(|s| {
            let request = s.begin_regeneration(feedback)?;
            self.emit(Event::SectionGenerating {
                session_id: request.ticket.session_id,
                section: request.ticket.section.clone(),
                attempt: request.ticket.attempt,
                regeneration: true,
            });
            Ok(request)
        })?;
        let section = request.ticket.section.clone();
        info!(session_id = %request.ticket.session_id, section = %section, "Regenerating section");

        // A spawned task keeps settling the ticket even if this future is dropped.
        let orchestrator = self.clone();
        let settled = tokio::spawn(async move { orchestrator.run_generation(request).await })
            .await
            .map_err(|e| OrchestratorError::generation(&section, e))?;

        match settled {
            Settled::Ready => Ok(()),
            Settled::Restored(reason) => Err(OrchestratorError::GenerationFailure { section, reason }),
            Settled::Skipped(_) | Settled::Discarded => Err(OrchestratorError::precondition(
                "regenerate",
                "session changed while regenerating",
            )),
        }
    }

    /// Discard the current session in any phase.
    ///
    /// A generator call still in flight resolves into a discarded result.
    pub fn reset(&self) -> Result<()> {
        let session = self.with_store(|slot| slot.take()).ok_or(OrchestratorError::NoSession)?;

        info!(session_id = %session.id(), phase = %session.phase(), "Session reset");
        self.emit(Event::SessionReset {
            session_id: session.id(),
        });
        Ok(())
    }

    /// Run finalization again after it failed; approved sections are not re-saved.
    pub async fn retry_finalize(&self) -> Result<()> {
        let _commit = self.try_commit("retry finalize")?;
        let metadata = self.with_session(|s| {
            if s.phase() != SessionPhase::Failed {
                return Err(OrchestratorError::precondition(
                    "retry finalize",
                    format!("session is {}", s.phase()),
                ));
            }
            let metadata = s.begin_finalize()?;
            self.emit(Event::SessionFinalizing {
                session_id: metadata.session_id,
            });
            Ok(metadata)
        })?;

        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.run_finalize(metadata).await })
            .await
            .map_err(OrchestratorError::finalize_failed)?
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        self.with_session(|s| Ok(s.snapshot()))
    }

    pub fn has_session(&self) -> bool {
        self.with_store(|slot| slot.is_some())
    }

    /// Apply a generator result to the session and reconcile.
    pub(crate) fn settle(&self, ticket: &GenerationTicket, result: Result<String>) -> Settled {
        let settled = self.apply_result(ticket, result);
        if settled != Settled::Discarded {
            self.reconcile();
        }
        settled
    }

    async fn run_generation(&self, request: GenerationRequest) -> Settled {
        let guard = GenerationGuard::new(self.clone(), request.ticket.clone());
        let name = request.ticket.section.as_str();

        let result = match &request.kind {
            GenerationKind::Initial => self.inner.generator.generate(name, &request.context).await,
            GenerationKind::Regeneration {
                feedback,
                previous_content,
            } => {
                self.inner
                    .generator
                    .regenerate(name, &request.context, feedback, previous_content)
                    .await
            }
        };

        guard.complete(result)
    }

    fn apply_result(&self, ticket: &GenerationTicket, result: Result<String>) -> Settled {
        self.with_store(|slot| {
            let Some(session) = slot.as_mut().filter(|s| s.is_current(ticket)) else {
                warn!(
                    session_id = %ticket.session_id,
                    section = %ticket.section,
                    attempt = ticket.attempt,
                    "Discarding stale generation result"
                );
                return Settled::Discarded;
            };
            let session_id = session.id();

            let failure = match result.and_then(|content| session.complete_generation(ticket, content)) {
                Ok(()) => {
                    info!(session_id = %session_id, section = %ticket.section, "Section ready for review");
                    self.emit(Event::SectionReady {
                        session_id,
                        section: ticket.section.clone(),
                    });
                    return Settled::Ready;
                }
                Err(e) => failure_reason(e),
            };

            if ticket.regeneration {
                if let Err(e) = session.restore_after_failed_regeneration(ticket) {
                    error!(session_id = %session_id, section = %ticket.section, error = %e, "Could not restore section after failed regeneration");
                    return Settled::Discarded;
                }
                warn!(session_id = %session_id, section = %ticket.section, reason = %failure, "Regeneration failed, previous content kept");
                self.emit(Event::RegenerationFailed {
                    session_id,
                    section: ticket.section.clone(),
                    reason: failure.clone(),
                });
                Settled::Restored(failure)
            } else {
                if let Err(e) = session.skip_current(ticket, &failure) {
                    error!(session_id = %session_id, section = %ticket.section, error = %e, "Could not skip failed section");
                    return Settled::Discarded;
                }
                warn!(session_id = %session_id, section = %ticket.section, reason = %failure, "Generation failed, moving on");
                self.emit(Event::SectionSkipped {
                    session_id,
                    section: ticket.section.clone(),
                    reason: failure.clone(),
                });
                Settled::Skipped(failure)
            }
        })
    }

    async fn run_finalize(&self, metadata: SessionMetadata) -> Result<()> {
        let session_id = metadata.session_id;
        let result = self.inner.persister.finalize(&metadata).await;

        self.with_store(|slot| -> Result<()> {
            let Some(session) = slot.as_mut().filter(|s| s.id() == session_id) else {
                debug!(session_id = %session_id, "Session gone before finalization finished");
                return Ok(());
            };

            match &result {
                Ok(()) => {
                    session.complete()?;
                    info!(session_id = %session_id, progress = session.progress(), "Session complete");
                    self.emit(Event::SessionCompleted {
                        session_id,
                        progress: session.progress(),
                    });
                }
                Err(e) => {
                    error!(session_id = %session_id, error = %e, "Finalization failed");
                    session.fail(e.to_string())?;
                    self.emit(Event::SessionFailed {
                        session_id,
                        reason: e.to_string(),
                    });
                }
            }
            Ok(())
        })?;

        result
    }

    fn emit(&self, event: Event) {
        self.inner.events.emit(event);
    }

    fn try_commit(&self, operation: &'static str) -> Result<MutexGuard<'_, ()>> {
        self.inner.commit.try_lock().map_err(|_| {
            OrchestratorError::precondition(operation, "another operation is still being committed")
        })
    }

    /// Run `f` against the store. The lock is never held across an await.
    fn with_store<R>(&self, f: impl FnOnce(&mut Option<Session>) -> R) -> R {
        let mut store = self
            .inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> Result<R>) -> Result<R> {
        self.with_store(|slot| match slot.as_mut() {
            Some(session) => f(session),
            None => Err(OrchestratorError::NoSession),
        })
    }
}

fn failure_reason(err: OrchestratorError) -> String {
    match err {
        OrchestratorError::GenerationFailure { reason, .. } => reason,
        other => other.to_string(),
    }
}
