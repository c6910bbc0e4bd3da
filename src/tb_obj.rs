use std::sync::{Arc, Mutex, MutexGuard};

// TbObj lets testbench tasks share objects (scoreboard, statistics, channel
// state). Tasks are cooperative, so the lock is never contended inside a
// simulation: a failing try_lock means an object was borrowed twice.
pub struct TbObj<T>(Arc<Mutex<T>>);

impl<T> TbObj<T> {
    pub fn new(data: T) -> TbObj<T> {
        TbObj(Arc::new(Mutex::new(data)))
    }
    pub fn get(&self) -> MutexGuard<T> {
        (*self.0)
            .try_lock()
            .expect("TbObj is already borrowed by another task")
    }
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.get();
        f(&mut guard)
    }
}

impl<T: Clone> TbObj<T> {
    pub fn snapshot(&self) -> T {
        self.get().clone()
    }
}

impl<T> Clone for TbObj<T> {
    fn clone(&self) -> Self {
        TbObj(self.0.clone())
    }
}
