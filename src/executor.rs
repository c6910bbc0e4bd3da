use futures::{
    future::{BoxFuture, FutureExt},
    task::{waker_ref, ArcWake, Context, Poll},
};
use futures_channel::oneshot;
use queues::{IsQueue, Queue};
use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
};

use crate::{TbError, TbResult};

// One ready queue per simulation, so independent simulations never share tasks.
pub(crate) struct ReadyQueue(Mutex<Queue<Arc<Task>>>);

impl ReadyQueue {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(ReadyQueue(Mutex::new(Queue::new())))
    }

    pub(crate) fn schedule(&self, task: Arc<Task>) {
        self.0
            .lock()
            .unwrap()
            .add(task)
            .expect("Error queueing task.");
    }

    fn next_task(&self) -> Option<Arc<Task>> {
        self.0.lock().unwrap().remove().ok()
    }

    pub(crate) fn clear(&self) {
        *self.0.lock().unwrap() = Queue::new();
    }

    /// Polls ready tasks until none is left.
    #[inline]
    pub(crate) fn run_once(&self) {
        while let Some(task) = self.next_task() {
            process_task(task);
        }
    }
}

#[inline]
fn process_task(task: Arc<Task>) {
    if *task.state.lock().unwrap() != TaskState::Pending {
        // cancelled tasks are dropped once all references disappear
        return;
    }

    let mut fut_slot = task.future.lock().unwrap();
    // a task woken twice in the same cycle may already have completed
    if let Some(mut fut) = fut_slot.take() {
        let waker = waker_ref(&task);
        let context = &mut Context::from_waker(&waker);
        match fut.as_mut().poll(context) {
            Poll::Pending => {
                *fut_slot = Some(fut);
            }
            Poll::Ready(result) => {
                *task.state.lock().unwrap() = TaskState::Done;
                if let Some(tx) = task.join_tx.lock().unwrap().take() {
                    // the join handle may have been dropped already
                    let _ = tx.send(result);
                }
            }
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
enum TaskState {
    Pending,
    Done,
    Cancelled,
}

pub struct Task {
    future: Mutex<Option<BoxFuture<'static, TbResult>>>,
    state: Mutex<TaskState>,
    name: String,
    join_tx: Mutex<Option<oneshot::Sender<TbResult>>>,
    queue: Arc<ReadyQueue>,
}

impl Task {
    pub(crate) fn spawn_from_future(
        queue: &Arc<ReadyQueue>,
        future: impl Future<Output = TbResult> + Send + 'static,
        name: &str,
    ) -> JoinHandle {
        let (task, join_handle) = Task::new(queue, future.boxed(), name);
        queue.schedule(task);
        join_handle
    }

    fn new(
        queue: &Arc<ReadyQueue>,
        fut: BoxFuture<'static, TbResult>,
        name: &str,
    ) -> (Arc<Self>, JoinHandle) {
        let (tx, rx) = oneshot::channel::<TbResult>();
        let task = Arc::new(Self {
            future: Mutex::new(Some(fut)),
            state: Mutex::new(TaskState::Pending),
            name: name.to_string(),
            join_tx: Mutex::new(Some(tx)),
            queue: queue.clone(),
        });
        let join_handle = JoinHandle {
            join_rx: rx,
            awaited_task: Some(task.clone()),
        };
        (task, join_handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel(&self) {
        // the executor drops a cancelled task without polling it again
        *self.state.lock().unwrap() = TaskState::Cancelled;
        // the slot is locked while the task polls itself
        if let Ok(mut fut) = self.future.try_lock() {
            fut.take();
        }
        self.join_tx.lock().unwrap().take();
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.queue.schedule(arc_self.clone());
    }
}

pub struct JoinHandle {
    awaited_task: Option<Arc<Task>>,
    join_rx: oneshot::Receiver<TbResult>,
}

impl JoinHandle {
    pub fn cancel(mut self) {
        if let Some(task) = self.awaited_task.take() {
            task.cancel();
        }
    }

    /// Takes the task result if it is already available.
    pub fn try_result(&mut self) -> Option<TbResult> {
        match self.join_rx.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(_) => Some(Err(TbError::TaskCancelled)),
        }
    }
}

impl Future for JoinHandle {
    type Output = TbResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TbError::TaskCancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
