//! Per-strategy factories building a table of actors.
//!
//! Every factory seats `count` actors around a ring of `count` resources,
//! resource `i` being shared by actors `i` and `i + 1`. At least two actors
//! are required so that no actor is wired to the same resource twice.

use std::sync::Arc;

use tracing::debug;

use crate::actor::Actor;
use crate::config::ActorConfig;
use crate::context::SimContext;
use crate::error::TableError;
use crate::resource::Resource;
use crate::strategy::{
    ArbitratedStrategy, Arbitrator, HierarchyStrategy, NaiveStrategy, OptimisticStrategy,
    StrategyKind, TokenPassingStrategy, TokenResource,
};
use crate::types::ActorId;

/// Builds the actors of one table for one strategy.
pub trait ActorFactory: Send + Sync {
    /// The strategy every created actor uses.
    fn kind(&self) -> StrategyKind;

    /// Create `count` actors and the resources they share.
    fn create_actors(
        &self,
        ctx: &SimContext,
        count: u32,
        config: &ActorConfig,
    ) -> Result<Vec<Actor>, TableError>;
}

impl StrategyKind {
    /// The factory for this strategy.
    pub fn factory(&self) -> Box<dyn ActorFactory> {
        match self {
            StrategyKind::Naive => Box::new(NaiveFactory),
            StrategyKind::Hierarchy => Box::new(HierarchyFactory),
            StrategyKind::Arbitrated => Box::new(ArbitratedFactory),
            StrategyKind::Optimistic => Box::new(OptimisticFactory),
            StrategyKind::TokenPassing => Box::new(TokenPassingFactory),
        }
    }
}

fn check_count(kind: StrategyKind, count: u32) -> Result<usize, TableError> {
    if count < 2 {
        return Err(TableError::InvalidActorCount {
            strategy: kind,
            count,
        });
    }
    Ok(count as usize)
}

/// Seat `count` actors on a ring of plain resources. Actor `i` is wired to
/// resources `i` and `(i + 1) % count`, in that order.
fn seat_ring(
    ctx: &SimContext,
    kind: StrategyKind,
    count: u32,
    config: &ActorConfig,
    mut build: impl FnMut(ActorId, Vec<Arc<Resource>>) -> Actor,
) -> Result<Vec<Actor>, TableError> {
    let count = check_count(kind, count)?;
    let resources: Vec<_> = (0..count).map(|_| Resource::new(ctx)).collect();

    let actors = (0..count)
        .map(|i| {
            let id = ctx.next_actor_id();
            let pair = vec![
                Arc::clone(&resources[i]),
                Arc::clone(&resources[(i + 1) % count]),
            ];
            build(id, pair)
        })
        .collect::<Vec<_>>();

    debug!(strategy = %kind, actors = count, ?config, "table seated");
    Ok(actors)
}

/// Factory for [`NaiveStrategy`] actors.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveFactory;

impl ActorFactory for NaiveFactory {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Naive
    }

    fn create_actors(
        &self,
        ctx: &SimContext,
        count: u32,
        config: &ActorConfig,
    ) -> Result<Vec<Actor>, TableError> {
        seat_ring(ctx, self.kind(), count, config, |id, pair| {
            let strategy =
                NaiveStrategy::new(id, pair, config.naive_lock_timeout, config.reach_delay);
            Actor::new(id, Box::new(strategy), config.clone())
        })
    }
}

/// Factory for [`HierarchyStrategy`] actors.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyFactory;

impl ActorFactory for HierarchyFactory {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hierarchy
    }

    fn create_actors(
        &self,
        ctx: &SimContext,
        count: u32,
        config: &ActorConfig,
    ) -> Result<Vec<Actor>, TableError> {
        seat_ring(ctx, self.kind(), count, config, |id, pair| {
            let strategy = HierarchyStrategy::new(id, pair, config.reach_delay);
            Actor::new(id, Box::new(strategy), config.clone())
        })
    }
}

/// Factory for [`ArbitratedStrategy`] actors sharing one [`Arbitrator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ArbitratedFactory;

impl ActorFactory for ArbitratedFactory {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Arbitrated
    }

    fn create_actors(
        &self,
        ctx: &SimContext,
        count: u32,
        config: &ActorConfig,
    ) -> Result<Vec<Actor>, TableError> {
        let arbitrator = Arbitrator::new();
        seat_ring(ctx, self.kind(), count, config, |id, pair| {
            let strategy =
                ArbitratedStrategy::new(id, pair, Arc::clone(&arbitrator), config.reach_delay);
            Actor::new(id, Box::new(strategy), config.clone())
        })
    }
}

/// Factory for [`OptimisticStrategy`] actors.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimisticFactory;

impl ActorFactory for OptimisticFactory {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Optimistic
    }

    fn create_actors(
        &self,
        ctx: &SimContext,
        count: u32,
        config: &ActorConfig,
    ) -> Result<Vec<Actor>, TableError> {
        seat_ring(ctx, self.kind(), count, config, |id, pair| {
            let strategy = OptimisticStrategy::new(id, pair);
            Actor::new(id, Box::new(strategy), config.clone())
        })
    }
}

/// Factory for [`TokenPassingStrategy`] actors.
///
/// Resource `i` is shared by actors `i` and `(i + 1) % count` and starts
/// dirty, owned by whichever of the two has the smaller id. Actor `j` is
/// wired to resources `j - 1` and `j`; actor 0 to resources `0` and
/// `count - 1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenPassingFactory;

impl ActorFactory for TokenPassingFactory {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TokenPassing
    }

    fn create_actors(
        &self,
        ctx: &SimContext,
        count: u32,
        config: &ActorConfig,
    ) -> Result<Vec<Actor>, TableError> {
        let count = check_count(self.kind(), count)?;
        let ids: Vec<ActorId> = (0..count).map(|_| ctx.next_actor_id()).collect();

        let mut wired: Vec<Vec<Arc<TokenResource>>> = vec![Vec::with_capacity(2); count];
        for i in 0..count {
            let next = (i + 1) % count;
            let resource = TokenResource::new(ctx, [ids[i], ids[next]]);
            wired[i].push(Arc::clone(&resource));
            wired[next].push(resource);
        }

        let actors = ids
            .into_iter()
            .zip(wired)
            .map(|(id, resources)| {
                let strategy = TokenPassingStrategy::new(id, resources);
                Actor::new(id, Box::new(strategy), config.clone())
            })
            .collect::<Vec<_>>();

        debug!(strategy = %self.kind(), actors = count, ?config, "table seated");
        Ok(actors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_every_factory_rejects_a_single_actor() {
        let ctx = SimContext::new();
        for kind in StrategyKind::ALL {
            let err = kind
                .factory()
                .create_actors(&ctx, 1, &ActorConfig::default())
                .unwrap_err();
            assert!(matches!(err, TableError::InvalidActorCount { count: 1, .. }));
        }
    }

    #[test]
    fn test_every_resource_is_shared_by_two_actors() {
        for kind in StrategyKind::ALL {
            let ctx = SimContext::new();
            let actors = kind
                .factory()
                .create_actors(&ctx, 5, &ActorConfig::default())
                .expect("create");
            assert_eq!(actors.len(), 5);
            assert_eq!(ctx.resources_created(), 5);

            let mut sharing: HashMap<_, u32> = HashMap::new();
            for actor in &actors {
                assert_eq!(actor.kind(), kind);
                assert_eq!(actor.resources().len(), 2);
                for id in actor.resources() {
                    *sharing.entry(*id).or_default() += 1;
                }
            }
            assert!(sharing.values().all(|n| *n == 2), "{kind}: {sharing:?}");
        }
    }

    #[test]
    fn test_hierarchy_orders_wrap_around_pair() {
        let ctx = SimContext::new();
        let actors = HierarchyFactory
            .create_actors(&ctx, 3, &ActorConfig::default())
            .expect("create");
        let last = actors.last().expect("actors");
        let ids = last.resources();
        assert!(ids[0] < ids[1]);
    }
}
