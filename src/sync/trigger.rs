/// Decides, on every solved-count change, whether to flush now.
///
/// The controller calls this synchronously after each confirmed solve.
pub trait SyncTrigger: Send {
    /// True if the queue should be flushed now.
    fn on_solve_count_changed(&mut self, count: u64) -> bool;
}

/// Flushes after every `every`-th lifetime solve. `0` disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EveryNthSolve {
    every: u64,
}

impl EveryNthSolve {
    /// Trigger firing on multiples of `every`.
    pub fn new(every: u64) -> Self {
        Self { every }
    }
}

impl SyncTrigger for EveryNthSolve {
    fn on_solve_count_changed(&mut self, count: u64) -> bool {
        self.every != 0 && count != 0 && count % self.every == 0
    }
}
