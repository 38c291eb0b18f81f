//! Per-requester draw serializer.
//!
//! One draw at a time per requester, and each command event handled at most
//! once. The dedup window is deliberately coarse: once more than `capacity`
//! event ids have been seen, the whole set is forgotten.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use lucie_domain::{EventId, Item, PoolKind, RequesterId};

use crate::entities::Pools;
use crate::infrastructure::ports::ChatContext;

pub const DEFAULT_DEDUP_CAPACITY: usize = 1000;

// =============================================================================
// Processed Events
// =============================================================================

/// Event ids already handled.
pub struct ProcessedEvents {
    seen: Mutex<HashSet<EventId>>,
    capacity: usize,
}

impl ProcessedEvents {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            capacity,
        }
    }

    /// Record `event_id`; returns `false` if it was already recorded.
    pub fn check_and_insert(&self, event_id: &EventId) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if !seen.insert(event_id.clone()) {
            return false;
        }
        if seen.len() > self.capacity {
            tracing::debug!(capacity = self.capacity, "Processed event set full, clearing");
            seen.clear();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProcessedEvents {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

// =============================================================================
// Requester Locks
// =============================================================================

/// Capacity-1 semaphore per requester.
#[derive(Default)]
pub struct RequesterLocks {
    in_flight: Arc<DashMap<RequesterId, bool>>,
}

impl RequesterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the requester's slot, or `None` if a draw is already running.
    pub fn try_acquire(&self, requester: &RequesterId) -> Option<RequesterGuard> {
        let mut busy = self.in_flight.entry(requester.clone()).or_insert(false);
        if *busy {
            return None;
        }
        *busy = true;
        drop(busy);

        Some(RequesterGuard {
            in_flight: Arc::clone(&self.in_flight),
            requester: requester.clone(),
        })
    }

    pub fn is_locked(&self, requester: &RequesterId) -> bool {
        self.in_flight
            .get(requester)
            .is_some_and(|busy| *busy)
    }
}

/// Releases the requester's slot when dropped, including during unwinding.
pub struct RequesterGuard {
    in_flight: Arc<DashMap<RequesterId, bool>>,
    requester: RequesterId,
}

impl RequesterGuard {
    pub fn requester(&self) -> &RequesterId {
        &self.requester
    }
}

impl Drop for RequesterGuard {
    fn drop(&mut self) {
        if let Some(mut busy) = self.in_flight.get_mut(&self.requester) {
            *busy = false;
        }
        tracing::trace!(requester = %self.requester, "Requester lock released");
    }
}

// =============================================================================
// Serializer
// =============================================================================

/// Result of one draw command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawResult {
    /// Event already handled; nothing happens and nothing is sent.
    Ignored,
    /// Issued outside a group context; refused silently.
    NotInGuild,
    /// The requester already has a draw in flight.
    Busy,
    Success { trait_item: Item, flaw: Item },
    /// One of the pools is fully on cooldown.
    CooldownActive { kind: PoolKind, remaining: Duration },
}

pub struct DrawSerializer {
    pools: Arc<Pools>,
    processed: ProcessedEvents,
    locks: RequesterLocks,
}

impl DrawSerializer {
    pub fn new(pools: Arc<Pools>, dedup_capacity: usize) -> Self {
        Self {
            pools,
            processed: ProcessedEvents::new(dedup_capacity),
            locks: RequesterLocks::new(),
        }
    }

    /// Handle one delivery of the draw command, releasing the requester's
    /// slot before returning.
    pub fn handle(
        &self,
        requester: &RequesterId,
        event_id: &EventId,
        context: &ChatContext,
    ) -> DrawResult {
        match self.admit(requester, event_id, context) {
            Ok(guard) => self.draw(&guard),
            Err(refused) => refused,
        }
    }

    /// Dedup, group-context check, then claim the requester's slot.
    ///
    /// On success the slot stays claimed until the returned guard is dropped,
    /// so callers hold it across the reply. Refusals are `Ignored`,
    /// `NotInGuild` or `Busy`.
    pub fn admit(
        &self,
        requester: &RequesterId,
        event_id: &EventId,
        context: &ChatContext,
    ) -> Result<RequesterGuard, DrawResult> {
        if !self.processed.check_and_insert(event_id) {
            tracing::warn!(event_id = %event_id, "Event already processed, ignoring");
            return Err(DrawResult::Ignored);
        }

        if !context.is_guild() {
            tracing::debug!(requester = %requester, "Command ignored outside a guild");
            return Err(DrawResult::NotInGuild);
        }

        let Some(guard) = self.locks.try_acquire(requester) else {
            tracing::warn!(requester = %requester, "Draw already in progress");
            return Err(DrawResult::Busy);
        };
        tracing::debug!(requester = %requester, "Requester lock acquired");
        Ok(guard)
    }

    /// Draw a trait then a flaw for the requester holding `guard`.
    ///
    /// Contains no suspension points. A trait drawn before the flaw pool
    /// turns out exhausted stays allocated.
    pub fn draw(&self, guard: &RequesterGuard) -> DrawResult {
        let trait_item = match self.pools.draw(PoolKind::Trait) {
            Ok(item) => item,
            Err(e) => return cooldown_active(PoolKind::Trait, e.remaining),
        };
        let flaw = match self.pools.draw(PoolKind::Flaw) {
            Ok(item) => item,
            Err(e) => return cooldown_active(PoolKind::Flaw, e.remaining),
        };

        tracing::debug!(requester = %guard.requester(), "Draw complete");
        DrawResult::Success { trait_item, flaw }
    }

    pub fn pools(&self) -> &Pools {
        &self.pools
    }

    pub fn locks(&self) -> &RequesterLocks {
        &self.locks
    }

    pub fn processed(&self) -> &ProcessedEvents {
        &self.processed
    }
}

fn cooldown_active(kind: PoolKind, remaining: Duration) -> DrawResult {
    tracing::info!(pool = %kind, remaining_secs = remaining.as_secs(), "Pool on cooldown");
    DrawResult::CooldownActive { kind, remaining }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::{FixedClock, FixedRandom};
    use crate::infrastructure::ports::{ClockPort, RandomPort};
    use chrono::{DateTime, TimeZone, Utc};
    use lucie_domain::{Catalog, GuildId, DEFAULT_COOLDOWN};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap()
    }

    fn guild() -> ChatContext {
        ChatContext::Guild(GuildId::from("g1"))
    }

    fn catalog(traits: &[&str], flaws: &[&str]) -> Catalog {
        Catalog::new(
            traits.iter().copied().map(Item::from).collect(),
            flaws.iter().copied().map(Item::from).collect(),
        )
        .unwrap()
    }

    fn serializer_with(catalog: Catalog, random: Arc<dyn RandomPort>) -> DrawSerializer {
        let clock: Arc<dyn ClockPort> = Arc::new(FixedClock(fixed_time()));
        let pools = Arc::new(Pools::new(&catalog, DEFAULT_COOLDOWN, clock, random));
        DrawSerializer::new(pools, DEFAULT_DEDUP_CAPACITY)
    }

    fn serializer(traits: &[&str], flaws: &[&str]) -> DrawSerializer {
        serializer_with(catalog(traits, flaws), Arc::new(FixedRandom(0)))
    }

    /// Answers index 0 until the given call, then panics.
    struct PanicOnCall {
        calls: AtomicUsize,
        panic_on: usize,
    }

    impl RandomPort for PanicOnCall {
        fn pick_index(&self, _len: usize) -> usize {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.panic_on {
                panic!("random source failed");
            }
            0
        }
    }

    #[test]
    fn draws_trait_and_flaw() {
        let serializer = serializer(&["A", "B"], &["X", "Y"]);
        let u1 = RequesterId::from("u1");

        let result = serializer.handle(&u1, &EventId::from("e1"), &guild());

        assert_eq!(
            result,
            DrawResult::Success {
                trait_item: Item::from("A"),
                flaw: Item::from("X"),
            }
        );
        assert!(!serializer.locks().is_locked(&u1));
    }

    #[test]
    fn duplicate_event_draws_once() {
        let serializer = serializer(&["A", "B"], &["X", "Y"]);
        let u1 = RequesterId::from("u1");
        let e1 = EventId::from("e1");

        assert!(matches!(
            serializer.handle(&u1, &e1, &guild()),
            DrawResult::Success { .. }
        ));
        let traits_after_first = serializer.pools().allocations(PoolKind::Trait);
        let flaws_after_first = serializer.pools().allocations(PoolKind::Flaw);

        assert_eq!(serializer.handle(&u1, &e1, &guild()), DrawResult::Ignored);
        assert_eq!(serializer.pools().allocations(PoolKind::Trait), traits_after_first);
        assert_eq!(serializer.pools().allocations(PoolKind::Flaw), flaws_after_first);
        assert_eq!(traits_after_first.len(), 1);
    }

    #[test]
    fn busy_requester_performs_no_draw() {
        let serializer = serializer(&["A", "B"], &["X", "Y"]);
        let u1 = RequesterId::from("u1");

        let guard = serializer.locks().try_acquire(&u1).unwrap();
        let result = serializer.handle(&u1, &EventId::from("e2"), &guild());

        assert_eq!(result, DrawResult::Busy);
        assert!(serializer.pools().allocations(PoolKind::Trait).is_empty());
        assert!(serializer.pools().allocations(PoolKind::Flaw).is_empty());

        drop(guard);
        assert!(!serializer.locks().is_locked(&u1));
        assert!(matches!(
            serializer.handle(&u1, &EventId::from("e3"), &guild()),
            DrawResult::Success { .. }
        ));
    }

    #[test]
    fn other_requesters_are_not_blocked() {
        let serializer = serializer(&["A", "B"], &["X", "Y"]);
        let _guard = serializer.locks().try_acquire(&RequesterId::from("u1")).unwrap();

        let result = serializer.handle(&RequesterId::from("u2"), &EventId::from("e1"), &guild());
        assert!(matches!(result, DrawResult::Success { .. }));
    }

    #[test]
    fn direct_messages_are_refused_before_locking() {
        let serializer = serializer(&["A"], &["X"]);
        let u1 = RequesterId::from("u1");

        let result = serializer.handle(&u1, &EventId::from("e1"), &ChatContext::Direct);

        assert_eq!(result, DrawResult::NotInGuild);
        assert!(serializer.pools().allocations(PoolKind::Trait).is_empty());
        // The event still counts as processed
        assert_eq!(
            serializer.handle(&u1, &EventId::from("e1"), &guild()),
            DrawResult::Ignored
        );
    }

    #[test]
    fn exhausted_flaw_keeps_trait_allocated() {
        let serializer = serializer(&["A", "B"], &["X"]);
        let u1 = RequesterId::from("u1");

        serializer.handle(&u1, &EventId::from("e1"), &guild());
        let result = serializer.handle(&u1, &EventId::from("e2"), &guild());

        assert_eq!(
            result,
            DrawResult::CooldownActive {
                kind: PoolKind::Flaw,
                remaining: DEFAULT_COOLDOWN,
            }
        );
        let traits = serializer.pools().allocations(PoolKind::Trait);
        assert!(traits.contains_key(&Item::from("A")));
        assert!(traits.contains_key(&Item::from("B")));
        assert!(!serializer.locks().is_locked(&u1));
    }

    #[test]
    fn exhausted_trait_skips_flaw_draw() {
        let serializer = serializer(&["A"], &["X", "Y"]);
        let u1 = RequesterId::from("u1");

        serializer.handle(&u1, &EventId::from("e1"), &guild());
        let result = serializer.handle(&u1, &EventId::from("e2"), &guild());

        assert!(matches!(
            result,
            DrawResult::CooldownActive { kind: PoolKind::Trait, .. }
        ));
        assert_eq!(serializer.pools().allocations(PoolKind::Flaw).len(), 1);
    }

    #[test]
    fn panic_during_flaw_draw_releases_lock() {
        let random = Arc::new(PanicOnCall {
            calls: AtomicUsize::new(0),
            panic_on: 2,
        });
        let serializer = serializer_with(catalog(&["A", "B"], &["X", "Y"]), random);
        let u1 = RequesterId::from("u1");

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            serializer.handle(&u1, &EventId::from("e1"), &guild())
        }));

        assert!(outcome.is_err());
        assert!(!serializer.locks().is_locked(&u1));
        assert!(serializer
            .pools()
            .allocations(PoolKind::Trait)
            .contains_key(&Item::from("A")));
        assert!(serializer.pools().allocations(PoolKind::Flaw).is_empty());

        // Poisoned flaw pool is still usable afterwards
        let result = serializer.handle(&u1, &EventId::from("e2"), &guild());
        assert_eq!(
            result,
            DrawResult::Success {
                trait_item: Item::from("B"),
                flaw: Item::from("X"),
            }
        );
    }

    #[test]
    fn processed_events_clear_past_capacity() {
        let processed = ProcessedEvents::new(3);
        for id in ["e1", "e2", "e3"] {
            assert!(processed.check_and_insert(&EventId::from(id)));
        }
        assert_eq!(processed.len(), 3);
        assert!(!processed.check_and_insert(&EventId::from("e1")));

        // Fourth id overflows the window
        assert!(processed.check_and_insert(&EventId::from("e4")));
        assert!(processed.is_empty());
        assert!(processed.check_and_insert(&EventId::from("e1")));
    }

    #[test]
    fn admitted_requester_stays_locked_until_guard_drops() {
        let serializer = serializer(&["A", "B"], &["X", "Y"]);
        let u1 = RequesterId::from("u1");

        let guard = serializer
            .admit(&u1, &EventId::from("e1"), &guild())
            .unwrap();
        assert!(matches!(serializer.draw(&guard), DrawResult::Success { .. }));
        assert!(serializer.locks().is_locked(&u1));

        // Second click while the first reply is still going out
        assert_eq!(
            serializer.handle(&u1, &EventId::from("e2"), &guild()),
            DrawResult::Busy
        );
        assert_eq!(serializer.pools().allocations(PoolKind::Trait).len(), 1);

        drop(guard);
        assert!(!serializer.locks().is_locked(&u1));
    }

    #[test]
    fn admit_refuses_without_claiming_the_slot() {
        let serializer = serializer(&["A"], &["X"]);
        let u1 = RequesterId::from("u1");

        let refused = serializer.admit(&u1, &EventId::from("e1"), &ChatContext::Direct);
        assert!(matches!(refused, Err(DrawResult::NotInGuild)));
        assert!(!serializer.locks().is_locked(&u1));
    }

    #[test]
    fn guard_releases_only_its_requester() {
        let locks = RequesterLocks::new();
        let u1 = RequesterId::from("u1");
        let u2 = RequesterId::from("u2");

        let g1 = locks.try_acquire(&u1).unwrap();
        let _g2 = locks.try_acquire(&u2).unwrap();
        assert!(locks.try_acquire(&u1).is_none());

        drop(g1);
        assert!(!locks.is_locked(&u1));
        assert!(locks.is_locked(&u2));
    }
}
