//! Draw-with-cooldown pool.
//!
//! A pool hands out items from one fixed list and remembers when each was
//! handed out. An item allocated less than (or exactly) one cooldown ago is
//! on cooldown; everything else is eligible. Expired allocations are dropped
//! lazily on the next successful draw, there is no background sweep.
//!
//! When every item is on cooldown the draw is rejected with the time left
//! until the oldest allocation expires. The pool is never reset wholesale.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::catalog::Item;

/// One hour, the cooldown the bot has always used.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3600);

/// Every item of the pool is currently on cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolExhausted {
    /// Time until the earliest-expiring allocation frees up.
    pub remaining: Duration,
}

impl fmt::Display for PoolExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "all items are on cooldown, retry in {}",
            format_wait(self.remaining)
        )
    }
}

impl std::error::Error for PoolExhausted {}

/// Format a wait as `<minutes>m <seconds>s`, truncated to whole seconds.
pub fn format_wait(wait: Duration) -> String {
    let secs = wait.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

/// A fixed list plus its allocation record.
#[derive(Debug, Clone)]
pub struct CooldownPool {
    items: Vec<Item>,
    cooldown: Duration,
    allocated: HashMap<Item, DateTime<Utc>>,
}

impl CooldownPool {
    pub fn new(items: Vec<Item>, cooldown: Duration) -> Self {
        Self {
            items,
            cooldown,
            allocated: HashMap::new(),
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Draw one eligible item.
    ///
    /// `pick` receives the number of eligible candidates and returns the
    /// index to take; out-of-range answers are clamped to the last candidate.
    /// The allocation record is only touched when an item is handed out.
    pub fn draw<F>(&mut self, now: DateTime<Utc>, pick: F) -> Result<Item, PoolExhausted>
    where
        F: FnOnce(usize) -> usize,
    {
        let candidates: Vec<&Item> = self
            .items
            .iter()
            .filter(|item| !self.is_on_cooldown(item, now))
            .collect();

        if candidates.is_empty() {
            return Err(PoolExhausted {
                remaining: self.remaining(now),
            });
        }

        let index = pick(candidates.len()).min(candidates.len() - 1);
        let chosen = candidates[index].clone();

        self.purge_expired(now);
        self.allocated.insert(chosen.clone(), now);
        Ok(chosen)
    }

    /// Items that could be drawn at `now`, in list order.
    pub fn eligible(&self, now: DateTime<Utc>) -> Vec<Item> {
        self.items
            .iter()
            .filter(|item| !self.is_on_cooldown(item, now))
            .cloned()
            .collect()
    }

    /// Ordered snapshot of the allocation record.
    pub fn allocations(&self) -> BTreeMap<Item, DateTime<Utc>> {
        self.allocated
            .iter()
            .map(|(item, at)| (item.clone(), *at))
            .collect()
    }

    fn is_on_cooldown(&self, item: &Item, now: DateTime<Utc>) -> bool {
        self.allocated
            .get(item)
            .is_some_and(|at| age(*at, now) <= self.cooldown)
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) {
        let cooldown = self.cooldown;
        self.allocated.retain(|_, at| age(*at, now) <= cooldown);
    }

    fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.allocated
            .values()
            .min()
            .map(|oldest| self.cooldown.saturating_sub(age(*oldest, now)))
            .unwrap_or_default()
    }
}

// A clock that stepped backwards counts as "just allocated".
fn age(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(at)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
