use serde::Serialize;

use crate::task::Task;

/// Completion counters over a task collection.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  Serialize,
  PartialEq,
  Eq,
)]
pub struct Stats {
  pub total:      usize,
  pub completed:  usize,
  /// Rounded to the nearest whole percent, halves rounding up.
  pub percentage: u8
}

impl Stats {
  pub fn from_tasks(
    tasks: &[Task]
  ) -> Self {
    let total = tasks.len();
    let completed = tasks
      .iter()
      .filter(|t| t.completed)
      .count();
    Self {
      total,
      completed,
      percentage: percentage(
        completed, total
      )
    }
  }

  pub fn active(&self) -> usize {
    self.total - self.completed
  }
}

fn percentage(
  completed: usize,
  total: usize
) -> u8 {
  if total == 0 {
    return 0;
  }
  let rounded = (completed * 200 + total)
    / (total * 2);
  rounded.min(100) as u8
}
