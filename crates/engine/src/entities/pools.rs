//! Cooldown pools entity.
//!
//! Wraps one domain `CooldownPool` per list with the injected clock and
//! random source. Each draw holds only its own pool's mutex for the duration
//! of the read-modify-write, so draws on different lists never contend.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lucie_domain::{Catalog, CooldownPool, Item, PoolExhausted, PoolKind};

use crate::infrastructure::ports::{ClockPort, RandomPort};

/// Trait and flaw pools, tracked independently.
pub struct Pools {
    traits: Mutex<CooldownPool>,
    flaws: Mutex<CooldownPool>,
    clock: Arc<dyn ClockPort>,
    random: Arc<dyn RandomPort>,
}

impl Pools {
    pub fn new(
        catalog: &Catalog,
        cooldown: Duration,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        let pool = |kind| Mutex::new(CooldownPool::new(catalog.items(kind).to_vec(), cooldown));
        Self {
            traits: pool(PoolKind::Trait),
            flaws: pool(PoolKind::Flaw),
            clock,
            random,
        }
    }

    /// Draw one eligible item from the given list.
    pub fn draw(&self, kind: PoolKind) -> Result<Item, PoolExhausted> {
        let now = self.clock.now();
        let random = &self.random;
        let result = self.lock(kind).draw(now, |len| random.pick_index(len));

        match &result {
            Ok(item) => tracing::debug!(pool = %kind, item = %item, "Item drawn"),
            Err(e) => tracing::debug!(
                pool = %kind,
                remaining_secs = e.remaining.as_secs(),
                "Pool exhausted"
            ),
        }
        result
    }

    /// Items drawable right now from the given list.
    pub fn eligible(&self, kind: PoolKind) -> Vec<Item> {
        let now = self.clock.now();
        self.lock(kind).eligible(now)
    }

    /// Snapshot of the allocation record for the given list.
    pub fn allocations(&self, kind: PoolKind) -> BTreeMap<Item, DateTime<Utc>> {
        self.lock(kind).allocations()
    }

    // A panic inside `draw` happens before the record is written, so a
    // poisoned pool is still consistent.
    fn lock(&self, kind: PoolKind) -> MutexGuard<'_, CooldownPool> {
        let pool = match kind {
            PoolKind::Trait => &self.traits,
            PoolKind::Flaw => &self.flaws,
        };
        pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
