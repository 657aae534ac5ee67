//! The store's processing loop and effect scheduler.
//!
//! One task owns the reducer, the environment and the cancellation
//! registry. Everything that touches them arrives as an [`Envelope`] on a
//! single unbounded mailbox, which makes the loop the store's only
//! serialization point:
//!
//! - external actions (`Dispatch`) and effect results (`Feedback`) are
//!   reduced one at a time, each followed by its synchronous sends;
//! - effect tasks report back with `Feedback`, `Register`, `Cancel` and
//!   `Finished`;
//! - a result from a task that is no longer registered (cancelled, or torn
//!   down with its screen) is discarded here, never reduced.

use crate::store::Shared;
use crate::{EffectTracking, Outstanding};
use futures::StreamExt;
use futures::future::join_all;
use popseoul_core::{Effect, EffectId, Reducer};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

pub(crate) type TaskId = u64;

/// Messages understood by the processing loop
pub(crate) enum Envelope<A> {
    /// Action sent through [`crate::Store::send`]
    Dispatch {
        action: A,
        tracking: EffectTracking,
        ack: oneshot::Sender<()>,
    },
    /// Action produced by a running effect task
    Feedback { task: TaskId, action: A },
    /// A running task reached a nested cancellable effect
    Register {
        task: TaskId,
        id: EffectId,
        cancel_in_flight: bool,
    },
    /// Cancel everything registered under an identity
    Cancel(EffectId),
    /// A task ended: completed, panicked or aborted
    Finished { task: TaskId },
    /// Cancel every running task
    CancelAll,
    /// Last store handle dropped
    Close,
}

struct TaskEntry {
    abort: AbortHandle,
    ids: Vec<EffectId>,
    tracking: Option<EffectTracking>,
}

/// Running effect tasks, indexed by task and by cancellation identity
#[derive(Default)]
struct Registry {
    tasks: HashMap<TaskId, TaskEntry>,
    by_id: HashMap<EffectId, HashSet<TaskId>>,
}

impl Registry {
    fn insert(&mut self, task: TaskId, entry: TaskEntry) {
        for id in &entry.ids {
            self.by_id.entry(id.clone()).or_default().insert(task);
        }
        self.tasks.insert(task, entry);
    }

    fn is_live(&self, task: TaskId) -> bool {
        self.tasks.contains_key(&task)
    }

    fn register(&mut self, task: TaskId, id: EffectId) {
        if let Some(entry) = self.tasks.get_mut(&task) {
            if !entry.ids.contains(&id) {
                entry.ids.push(id.clone());
                self.by_id.entry(id).or_default().insert(task);
            }
        }
    }

    /// Forget a task. Returns its entry when it was still registered.
    fn remove(&mut self, task: TaskId) -> Option<TaskEntry> {
        let entry = self.tasks.remove(&task)?;
        for id in &entry.ids {
            if let Some(tasks) = self.by_id.get_mut(id) {
                tasks.remove(&task);
                if tasks.is_empty() {
                    self.by_id.remove(id);
                }
            }
        }
        Some(entry)
    }

    fn tasks_under(&self, id: &EffectId) -> Vec<TaskId> {
        self.by_id
            .get(id)
            .map(|tasks| tasks.iter().copied().collect())
            .unwrap_or_default()
    }

    fn all_tasks(&self) -> Vec<TaskId> {
        self.tasks.keys().copied().collect()
    }
}

/// Context handed to a running effect task
struct TaskContext<A> {
    task: TaskId,
    tx: mpsc::UnboundedSender<Envelope<A>>,
    outstanding: Arc<Outstanding>,
}

impl<A> TaskContext<A> {
    fn deliver(&self, action: A) {
        self.outstanding.begin();
        if self
            .tx
            .send(Envelope::Feedback {
                task: self.task,
                action,
            })
            .is_err()
        {
            self.outstanding.end();
        }
    }

    fn register(&self, id: EffectId, cancel_in_flight: bool) {
        let _ = self.tx.send(Envelope::Register {
            task: self.task,
            id,
            cancel_in_flight,
        });
    }

    fn cancel(&self, id: EffectId) {
        let _ = self.tx.send(Envelope::Cancel(id));
    }
}

/// Reports task end to the loop, including on panic and abort
struct FinishGuard<A> {
    task: TaskId,
    tx: mpsc::UnboundedSender<Envelope<A>>,
}

impl<A> Drop for FinishGuard<A> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!(task = self.task, "Effect task panicked");
            metrics::counter!("store.effects.panicked").increment(1);
        }
        let _ = self.tx.send(Envelope::Finished { task: self.task });
    }
}

/// Run an effect to completion inside a task
fn drive<A>(effect: Effect<A>, ctx: &TaskContext<A>) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>
where
    A: Send + 'static,
{
    Box::pin(async move {
        match effect {
            Effect::None => {},
            Effect::Send(action) => ctx.deliver(action),
            Effect::Future(fut) => {
                if let Some(action) = fut.await {
                    ctx.deliver(action);
                } else {
                    tracing::trace!("Effect::Future completed with no action");
                }
            },
            Effect::Delay { duration, action } => {
                tokio::time::sleep(duration).await;
                ctx.deliver(*action);
            },
            Effect::Stream(mut stream) => {
                let mut count = 0usize;
                while let Some(action) = stream.next().await {
                    count += 1;
                    ctx.deliver(action);
                }
                tracing::trace!(items = count, "Effect::Stream completed");
            },
            Effect::Parallel(effects) => {
                join_all(effects.into_iter().map(|effect| drive(effect, ctx))).await;
            },
            Effect::Sequential(effects) => {
                for effect in effects {
                    drive(effect, ctx).await;
                }
            },
            Effect::Cancellable {
                id,
                cancel_in_flight,
                effect,
            } => {
                ctx.register(id, cancel_in_flight);
                drive(*effect, ctx).await;
            },
            Effect::Cancel(id) => ctx.cancel(id),
        }
    })
}

/// Owner of reducer, environment and registry
pub(crate) struct Scheduler<S, A, R, E> {
    shared: Arc<Shared<S, A>>,
    reducer: R,
    environment: E,
    tx: mpsc::UnboundedSender<Envelope<A>>,
    registry: Registry,
    next_task: TaskId,
}

impl<S, A, R, E> Scheduler<S, A, R, E>
where
    S: Send + Sync + 'static,
    A: Clone + Send + 'static,
    R: Reducer<State = S, Action = A, Environment = E> + Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new(
        shared: Arc<Shared<S, A>>,
        reducer: R,
        environment: E,
        tx: mpsc::UnboundedSender<Envelope<A>>,
    ) -> Self {
        Self {
            shared,
            reducer,
            environment,
            tx,
            registry: Registry::default(),
            next_task: 0,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Envelope<A>>) {
        tracing::debug!("Store loop started");
        while let Some(envelope) = rx.recv().await {
            match envelope {
                Envelope::Dispatch {
                    action,
                    tracking,
                    ack,
                } => {
                    self.process(action, Some(&tracking), false).await;
                    let _ = ack.send(());
                    self.shared.outstanding.end();
                },
                Envelope::Feedback { task, action } => {
                    if self.registry.is_live(task) {
                        self.process(action, None, true).await;
                    } else {
                        tracing::debug!(task, "Discarding action from cancelled effect");
                        metrics::counter!("store.actions.discarded").increment(1);
                    }
                    self.shared.outstanding.end();
                },
                Envelope::Register {
                    task,
                    id,
                    cancel_in_flight,
                } => {
                    if cancel_in_flight {
                        self.cancel_except(&id, Some(task));
                    }
                    self.registry.register(task, id);
                },
                Envelope::Cancel(id) => self.cancel(&id),
                Envelope::Finished { task } => {
                    if let Some(entry) = self.registry.remove(task) {
                        self.release(entry);
                    }
                },
                Envelope::CancelAll => self.cancel_all(),
                Envelope::Close => {
                    self.cancel_all();
                    break;
                },
            }
        }
        tracing::debug!("Store loop stopped");
    }

    /// Reduce one action and every synchronous send it produces
    async fn process(&mut self, action: A, tracking: Option<&EffectTracking>, broadcast: bool) {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.state.write().await;
        tracing::trace!("Acquired write lock on state");

        let mut queue = VecDeque::new();
        let mut pending = Some((action, broadcast));
        let mut synchronous = 0usize;

        while let Some((action, broadcast)) = pending.take() {
            if broadcast {
                let _ = shared.actions.send(action.clone());
            }

            let span = tracing::debug_span!("reducer_execution");
            let effects = {
                let _enter = span.enter();
                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut state, action, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds").record(start.elapsed().as_secs_f64());
                effects
            };

            tracing::trace!("Reducer completed, returned {} effects", effects.len());
            for effect in effects {
                self.schedule(effect, &[], tracking, &mut queue);
            }

            if let Some(next) = queue.pop_front() {
                if synchronous >= shared.config.max_synchronous_sends {
                    tracing::warn!(
                        dropped = queue.len() + 1,
                        limit = shared.config.max_synchronous_sends,
                        "Synchronous send limit reached, dropping remaining actions"
                    );
                    metrics::counter!("store.actions.dropped").increment(1);
                    queue.clear();
                } else {
                    synchronous += 1;
                    pending = Some((next, true));
                }
            }
        }

        drop(state);
        shared.revision.send_modify(|revision| *revision += 1);
    }

    /// Start an effect, recording cancellation identities in `lineage`
    fn schedule(
        &mut self,
        effect: Effect<A>,
        lineage: &[EffectId],
        tracking: Option<&EffectTracking>,
        queue: &mut VecDeque<A>,
    ) {
        match effect {
            Effect::None => {},
            Effect::Send(action) => {
                metrics::counter!("store.effects.executed", "type" => "send").increment(1);
                queue.push_back(action);
            },
            Effect::Parallel(effects) => {
                metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                for effect in effects {
                    self.schedule(effect, lineage, tracking, queue);
                }
            },
            Effect::Cancellable {
                id,
                cancel_in_flight,
                effect,
            } => {
                if cancel_in_flight {
                    self.cancel(&id);
                }
                let mut lineage = lineage.to_vec();
                if !lineage.contains(&id) {
                    lineage.push(id);
                }
                self.schedule(*effect, &lineage, tracking, queue);
            },
            Effect::Cancel(id) => self.cancel(&id),
            effect @ (Effect::Future(_) | Effect::Delay { .. } | Effect::Stream(_) | Effect::Sequential(_)) => {
                self.spawn(effect, lineage, tracking);
            },
        }
    }

    fn spawn(&mut self, effect: Effect<A>, lineage: &[EffectId], tracking: Option<&EffectTracking>) {
        let kind = match &effect {
            Effect::Future(_) => "future",
            Effect::Delay { .. } => "delay",
            Effect::Stream(_) => "stream",
            _ => "sequential",
        };
        tracing::trace!(kind, ids = ?lineage, "Spawning effect");
        metrics::counter!("store.effects.executed", "type" => kind).increment(1);

        let task = self.next_task;
        self.next_task += 1;

        self.shared.outstanding.begin();
        if let Some(tracking) = tracking {
            tracking.increment();
        }

        let ctx = TaskContext {
            task,
            tx: self.tx.clone(),
            outstanding: Arc::clone(&self.shared.outstanding),
        };
        let guard = FinishGuard {
            task,
            tx: self.tx.clone(),
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            drive(effect, &ctx).await;
        });

        self.registry.insert(
            task,
            TaskEntry {
                abort: handle.abort_handle(),
                ids: lineage.to_vec(),
                tracking: tracking.cloned(),
            },
        );
    }

    fn cancel(&mut self, id: &EffectId) {
        self.cancel_except(id, None);
    }

    fn cancel_except(&mut self, id: &EffectId, keep: Option<TaskId>) {
        let tasks = self.registry.tasks_under(id);
        let mut cancelled = 0usize;
        for task in tasks.into_iter().filter(|task| Some(*task) != keep) {
            if let Some(entry) = self.registry.remove(task) {
                entry.abort.abort();
                self.release(entry);
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::debug!(%id, cancelled, "Cancelled effects");
            metrics::counter!("store.effects.cancelled").increment(cancelled as u64);
        }
    }

    fn cancel_all(&mut self) {
        for task in self.registry.all_tasks() {
            if let Some(entry) = self.registry.remove(task) {
                entry.abort.abort();
                self.release(entry);
            }
        }
    }

    fn release(&self, entry: TaskEntry) {
        if let Some(tracking) = entry.tracking {
            tracking.decrement();
        }
        self.shared.outstanding.end();
    }
}
