//! Task driver for a [`Reconciler`].
//!
//! Each [`SyncController`] runs one tokio task that owns the reconciler and
//! processes, one at a time: commands from the handle, identity changes,
//! snapshots from the current subscription, the debounce deadline and write
//! acknowledgements. Writes are committed in order by a separate writer task,
//! so snapshots can arrive while a write is still in flight.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::feature::Feature;
use super::reconciler::{Effect, FeatureView, Phase, Reconciler};
use crate::error::AppError;
use crate::identity::Session;
use crate::store::{
    DocPath, Document, RemoteStore, Snapshot, StoreError, Subscription, Write,
};

enum Command<F: Feature> {
    Apply {
        op: F::Op,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    SetKey(F::Key),
    Flush {
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    Shutdown,
}

enum WriteJob {
    Commit {
        epoch: u64,
        writes: Vec<Write>,
    },
    Ensure {
        epoch: u64,
        path: DocPath,
        data: Document,
    },
}

struct WriteAck {
    epoch: u64,
    result: Result<Option<u64>, StoreError>,
}

/// Handle to a running feature controller.
///
/// Dropping the handle stops the task; pending debounced edits are discarded.
pub struct SyncController<F: Feature> {
    commands: mpsc::UnboundedSender<Command<F>>,
    view: watch::Receiver<FeatureView<F::Buffer>>,
    task: Option<JoinHandle<()>>,
}

impl<F: Feature> SyncController<F> {
    /// Starts the controller task. Must be called inside a tokio runtime.
    pub fn spawn(
        feature: F,
        store: Arc<dyn RemoteStore>,
        mut identity: watch::Receiver<Option<Session>>,
        key: F::Key,
    ) -> Self {
        let mut reconciler = Reconciler::new(feature, key);
        let initial = reconciler.set_session(identity.borrow_and_update().clone());
        let (view_tx, view_rx) = watch::channel(reconciler.view());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_writer(Arc::clone(&store), write_rx, ack_tx));

        let driver = Driver {
            reconciler,
            store,
            identity,
            identity_closed: false,
            commands: command_rx,
            view: view_tx,
            subscription: None,
            deadline: None,
            writes: write_tx,
            acks: ack_rx,
            flush_waiters: Vec::new(),
        };
        let task = tokio::spawn(driver.run(initial));

        Self {
            commands: command_tx,
            view: view_rx,
            task: Some(task),
        }
    }

    /// Applies a local mutation. Returns once the buffer reflects it; use
    /// [`SyncController::flush`] to wait for persistence.
    pub async fn apply(&self, op: F::Op) -> Result<(), AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Apply { op, reply })?;
        rx.await.map_err(|_| stopped())?
    }

    pub fn set_key(&self, key: F::Key) -> Result<(), AppError> {
        self.send(Command::SetKey(key))
    }

    /// Writes pending debounced edits now and waits until no write is in flight.
    /// Fails with the feature's current error, if it has one.
    pub async fn flush(&self) -> Result<(), AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Flush { reply })?;
        rx.await.map_err(|_| stopped())?
    }

    pub fn view(&self) -> FeatureView<F::Buffer> {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<FeatureView<F::Buffer>> {
        self.view.clone()
    }

    /// Waits until the feature has left `Loading` or hit an error.
    pub async fn ready(&self) -> FeatureView<F::Buffer> {
        let mut rx = self.view.clone();
        let result = rx
            .wait_for(|view| view.phase != Phase::Loading || view.error.is_some())
            .await
            .map(|view| view.clone());
        match result {
            Ok(view) => view,
            Err(_) => self.view(),
        }
    }

    /// Stops the task without flushing. The subscription is released.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, command: Command<F>) -> Result<(), AppError> {
        self.commands.send(command).map_err(|_| stopped())
    }
}

impl<F: Feature> Drop for SyncController<F> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn stopped() -> AppError {
    AppError::UpstreamUnavailable("controller stopped".to_string())
}

struct Driver<F: Feature> {
    reconciler: Reconciler<F>,
    store: Arc<dyn RemoteStore>,
    identity: watch::Receiver<Option<Session>>,
    identity_closed: bool,
    commands: mpsc::UnboundedReceiver<Command<F>>,
    view: watch::Sender<FeatureView<F::Buffer>>,
    subscription: Option<(u64, Subscription)>,
    deadline: Option<Instant>,
    writes: mpsc::UnboundedSender<WriteJob>,
    acks: mpsc::UnboundedReceiver<WriteAck>,
    flush_waiters: Vec<oneshot::Sender<Result<(), AppError>>>,
}

impl<F: Feature> Driver<F> {
    async fn run(mut self, initial: Vec<Effect>) {
        self.execute(initial).await;
        self.publish();

        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                changed = self.identity.changed(), if !self.identity_closed => {
                    if changed.is_err() {
                        self.identity_closed = true;
                        continue;
                    }
                    let session = self.identity.borrow_and_update().clone();
                    let effects = self.reconciler.set_session(session);
                    self.execute(effects).await;
                }
                (epoch, item) = next_snapshot(&mut self.subscription) => {
                    self.handle_snapshot(epoch, item).await;
                }
                _ = sleep_until(deadline), if deadline.is_some() => {
                    self.deadline = None;
                    let effects = self.reconciler.on_debounce_elapsed();
                    self.execute(effects).await;
                }
                Some(ack) = self.acks.recv() => {
                    let effects = self.reconciler.on_write_ack(ack.epoch, ack.result);
                    self.execute(effects).await;
                }
            }
            self.answer_flush_waiters();
            self.publish();
        }

        tracing::debug!(feature = F::NAME, "controller stopped");
    }

    async fn handle_command(&mut self, command: Command<F>) {
        match command {
            Command::Apply { op, reply } => {
                let result = self.reconciler.apply(op, Utc::now());
                let result = match result {
                    Ok(effects) => {
                        self.execute(effects).await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::SetKey(key) => {
                let effects = self.reconciler.set_key(key);
                self.execute(effects).await;
            }
            Command::Flush { reply } => {
                let effects = self.reconciler.flush_now();
                self.execute(effects).await;
                self.flush_waiters.push(reply);
            }
            Command::Shutdown => {}
        }
    }

    async fn handle_snapshot(&mut self, epoch: u64, item: Option<Result<Snapshot, StoreError>>) {
        match item {
            Some(item) => {
                let effects = self.reconciler.on_snapshot(epoch, item);
                self.execute(effects).await;
            }
            None => {
                // The store closed the subscription.
                self.subscription = None;
                let effects = self.reconciler.on_snapshot(
                    epoch,
                    Err(StoreError::Unavailable("subscription closed".to_string())),
                );
                self.execute(effects).await;
            }
        }
    }

    async fn execute(&mut self, effects: Vec<Effect>) {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Unsubscribe => {
                    self.subscription = None;
                }
                Effect::Subscribe { epoch, query } => {
                    match self.store.subscribe(query).await {
                        Ok(subscription) => self.subscription = Some((epoch, subscription)),
                        Err(e) => self.reconciler.on_subscribe_failed(epoch, e),
                    }
                }
                Effect::EnsureDocument { epoch, path, data } => {
                    queue.extend(self.enqueue(WriteJob::Ensure { epoch, path, data }));
                }
                Effect::Commit { epoch, writes } => {
                    queue.extend(self.enqueue(WriteJob::Commit { epoch, writes }));
                }
                Effect::ArmTimer(delay) => {
                    self.deadline = Some(Instant::now() + delay);
                }
                Effect::CancelTimer => {
                    self.deadline = None;
                }
            }
        }
    }

    /// Hands a job to the writer task. Returns follow-up effects when the
    /// writer is gone and the job fails on the spot.
    fn enqueue(&mut self, job: WriteJob) -> Vec<Effect> {
        let epoch = match &job {
            WriteJob::Commit { epoch, .. } | WriteJob::Ensure { epoch, .. } => *epoch,
        };
        match self.writes.send(job) {
            Ok(()) => Vec::new(),
            Err(_) => {
                tracing::error!(feature = F::NAME, "writer task gone");
                self.reconciler.on_write_ack(
                    epoch,
                    Err(StoreError::Unavailable("writer stopped".to_string())),
                )
            }
        }
    }

    fn answer_flush_waiters(&mut self) {
        if self.flush_waiters.is_empty() || !self.reconciler.is_settled() {
            return;
        }
        // The error outlives the write that caused it until the next edit.
        let result = match self.reconciler.error() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        };
        for waiter in self.flush_waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
    }

    fn publish(&self) {
        let view = self.reconciler.view();
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

async fn next_snapshot(
    subscription: &mut Option<(u64, Subscription)>,
) -> (u64, Option<Result<Snapshot, StoreError>>) {
    match subscription {
        Some((epoch, subscription)) => (*epoch, subscription.next().await),
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Commits jobs one at a time, in the order they were issued.
async fn run_writer(
    store: Arc<dyn RemoteStore>,
    mut jobs: mpsc::UnboundedReceiver<WriteJob>,
    acks: mpsc::UnboundedSender<WriteAck>,
) {
    while let Some(job) = jobs.recv().await {
        let (epoch, result) = match job {
            WriteJob::Commit { epoch, writes } => {
                let count = writes.len();
                let result = store.commit(writes).await.map(Some);
                tracing::debug!(epoch, writes = count, ok = result.is_ok(), "commit finished");
                (epoch, result)
            }
            WriteJob::Ensure { epoch, path, data } => {
                let result = match store.get(&path).await {
                    Ok(Some(_)) => Ok(None),
                    Ok(None) => {
                        tracing::debug!(path = %path, "creating default document");
                        store
                            .commit(vec![Write::Create { path, data }])
                            .await
                            .map(Some)
                    }
                    Err(e) => Err(e),
                };
                (epoch, result)
            }
        };
        if acks.send(WriteAck { epoch, result }).is_err() {
            break;
        }
    }
}
