//! Category routers: one per entity kind.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    EntityRouter, LifecycleError, OptionOrderLifecycle, OptionPositionLifecycle, Outcome,
    SpotLifecycle,
};
use crate::api::MonitoringApi;
use crate::models::{Category, Entity, EntityKind, KlineUpdate};
use crate::store::StateStore;

/// Routes positions to their category's lifecycle service.
pub struct PositionRouter<A, S> {
    option: OptionPositionLifecycle<A, S>,
    spot: SpotLifecycle,
}

impl<A, S> PositionRouter<A, S>
where
    A: MonitoringApi,
    S: StateStore,
{
    /// Build the router and its services from injected clients.
    #[must_use]
    pub fn new(api: Arc<A>, store: Arc<S>) -> Self {
        Self {
            option: OptionPositionLifecycle::new(api, store),
            spot: SpotLifecycle::new(EntityKind::Position),
        }
    }
}

#[async_trait]
impl<A, S> EntityRouter for PositionRouter<A, S>
where
    A: MonitoringApi,
    S: StateStore,
{
    async fn route(
        &self,
        entity: &Entity,
        kline: &KlineUpdate,
    ) -> Result<Outcome, LifecycleError> {
        match entity.category {
            Category::Option => self.option.handle(entity, kline).await,
            Category::Spot => self.spot.handle(entity, kline),
        }
    }
}

/// Routes orders to their category's lifecycle service.
pub struct OrderRouter<A, S> {
    option: OptionOrderLifecycle<A, S>,
    spot: SpotLifecycle,
}

impl<A, S> OrderRouter<A, S>
where
    A: MonitoringApi,
    S: StateStore,
{
    /// Build the router and its services from injected clients.
    #[must_use]
    pub fn new(api: Arc<A>, store: Arc<S>) -> Self {
        Self {
            option: OptionOrderLifecycle::new(api, store),
            spot: SpotLifecycle::new(EntityKind::Order),
        }
    }
}

#[async_trait]
impl<A, S> EntityRouter for OrderRouter<A, S>
where
    A: MonitoringApi,
    S: StateStore,
{
    async fn route(
        &self,
        entity: &Entity,
        kline: &KlineUpdate,
    ) -> Result<Outcome, LifecycleError> {
        match entity.category {
            Category::Option => self.option.handle(entity, kline).await,
            Category::Spot => self.spot.handle(entity, kline),
        }
    }
}
