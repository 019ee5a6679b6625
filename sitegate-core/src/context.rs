use crate::cache::ResolutionCache;
use crate::events::EventBus;

/// State shared by the manager and every entity it hands out.
///
/// Entities hold this rather than the manager itself so the identity maps
/// never form a reference cycle with the entities they contain.
#[derive(Debug, Default)]
pub struct EngineContext {
    pub events: EventBus,
    pub cache: ResolutionCache,
}
