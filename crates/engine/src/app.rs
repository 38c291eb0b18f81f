//! Application state and composition.

use std::sync::Arc;
use std::time::Duration;

use lucie_domain::Catalog;

use crate::entities::Pools;
use crate::infrastructure::ports::{ChatPort, ClockPort, RandomPort};
use crate::use_cases::draw::{DrawSerializer, LucieCommand};

/// Main application state.
///
/// Built once per process and shared by reference with the gateway.
pub struct App {
    pub pools: Arc<Pools>,
    pub serializer: Arc<DrawSerializer>,
    pub lucie: Arc<LucieCommand>,
}

impl App {
    pub fn new(
        catalog: &Catalog,
        cooldown: Duration,
        dedup_capacity: usize,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
        chat: Arc<dyn ChatPort>,
    ) -> Self {
        let pools = Arc::new(Pools::new(catalog, cooldown, clock, random));
        let serializer = Arc::new(DrawSerializer::new(pools.clone(), dedup_capacity));
        let lucie = Arc::new(LucieCommand::new(serializer.clone(), chat));

        Self {
            pools,
            serializer,
            lucie,
        }
    }
}
