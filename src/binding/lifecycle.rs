//! Cleanup tasks tied to a binding's lifetime

/// A deferred cleanup action
pub type CleanupTask = Box<dyn FnOnce() + Send>;

/// Ordered list of cleanup tasks, run once at teardown
#[derive(Default)]
pub struct Lifecycle {
    tasks: Vec<CleanupTask>,
    torn_down: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. After teardown the task runs immediately.
    pub fn add<F>(&mut self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.torn_down {
            task();
            return;
        }
        self.tasks.push(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Run every task in registration order. Returns how many ran.
    pub fn run(&mut self) -> usize {
        self.torn_down = true;
        let tasks = std::mem::take(&mut self.tasks);
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("tasks", &self.tasks.len())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
