use std::time::Duration;

/// Rolling window of per-frame update costs checked against a budget.
#[derive(Debug, Clone)]
pub struct FrameBudget {
    budget: Duration,
    history: Vec<Duration>,
    next: usize,
    filled: bool,
    over_budget: u64,
}

impl FrameBudget {
    pub fn new(budget: Duration, window: usize) -> Self {
        Self {
            budget,
            history: vec![Duration::ZERO; window.max(1)],
            next: 0,
            filled: false,
            over_budget: 0,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Record one frame. Returns `true` if it went over budget.
    pub fn record(&mut self, cost: Duration) -> bool {
        self.history[self.next] = cost;
        self.next = (self.next + 1) % self.history.len();
        if self.next == 0 {
            self.filled = true;
        }
        let over = cost > self.budget;
        if over {
            self.over_budget += 1;
        }
        over
    }

    fn window(&self) -> &[Duration] {
        if self.filled {
            &self.history
        } else {
            &self.history[..self.next]
        }
    }

    pub fn count(&self) -> usize {
        self.window().len()
    }

    pub fn average(&self) -> Duration {
        let window = self.window();
        if window.is_empty() {
            return Duration::ZERO;
        }
        window.iter().sum::<Duration>() / window.len() as u32
    }

    pub fn worst(&self) -> Duration {
        self.window().iter().copied().max().unwrap_or(Duration::ZERO)
    }

    /// Frames over budget since creation, not just in the window.
    pub fn over_budget_frames(&self) -> u64 {
        self.over_budget
    }
}
