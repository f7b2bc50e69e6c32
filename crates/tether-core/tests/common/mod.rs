//! Shared test rig: a binder wired to the deterministic simulation
//! doubles with the strong, enumerable owner store.

use std::sync::Arc;

use tether_core::binder::BinderConfig;
use tether_core::registry::StrongOwnerStore;
use tether_core::simulation::{ManualHost, ManualScheduler};
use tether_core::{LifecycleHost, PrimitiveScheduler, TaskBinder};

pub struct Rig {
    pub scheduler: Arc<ManualScheduler>,
    pub host: Arc<ManualHost>,
    pub binder: TaskBinder,
}

pub fn rig() -> Rig {
    rig_with_config(BinderConfig::default())
}

pub fn rig_with_config(config: BinderConfig) -> Rig {
    let scheduler = Arc::new(ManualScheduler::new());
    let host = Arc::new(ManualHost::new());
    let binder = TaskBinder::with_store(
        Arc::clone(&scheduler) as Arc<dyn PrimitiveScheduler>,
        Arc::clone(&host) as Arc<dyn LifecycleHost>,
        config,
        Box::new(StrongOwnerStore::new()),
    );
    Rig {
        scheduler,
        host,
        binder,
    }
}
