use std::collections::{BTreeMap, VecDeque};

use engine::EntityId;
use tracing::debug;

use super::game_mode::GameMode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum GameEvent {
    EnemyDefeated { enemy: EntityId },
    EnemiesAllDefeated,
    SlimeCollected { total: u32 },
    SceneExited,
    PlayerDefeated,
    ModeChanging(GameMode),
    ModeChanged(GameMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum GameEventKind {
    EnemyDefeated,
    EnemiesAllDefeated,
    SlimeCollected,
    SceneExited,
    PlayerDefeated,
    ModeChanging,
    ModeChanged,
}

impl GameEvent {
    pub(crate) fn kind(self) -> GameEventKind {
        match self {
            Self::EnemyDefeated { .. } => GameEventKind::EnemyDefeated,
            Self::EnemiesAllDefeated => GameEventKind::EnemiesAllDefeated,
            Self::SlimeCollected { .. } => GameEventKind::SlimeCollected,
            Self::SceneExited => GameEventKind::SceneExited,
            Self::PlayerDefeated => GameEventKind::PlayerDefeated,
            Self::ModeChanging(_) => GameEventKind::ModeChanging,
            Self::ModeChanged(_) => GameEventKind::ModeChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Delivery {
    pub(crate) subscription: SubscriptionId,
    pub(crate) event: GameEvent,
}

/// Process-wide publish/subscribe hub. Publishing only queues; `dispatch` hands each
/// queued event to every subscriber of its kind, in registration order.
#[derive(Debug, Default)]
pub(crate) struct EventBus {
    next_subscription: u64,
    subscriptions: Vec<(SubscriptionId, GameEventKind)>,
    queued: VecDeque<GameEvent>,
    published_counts: BTreeMap<GameEventKind, u64>,
}

impl EventBus {
    pub(crate) fn subscribe(&mut self, kind: GameEventKind) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription = self.next_subscription.saturating_add(1);
        self.subscriptions.push((id, kind));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|(candidate, _)| *candidate != id);
        self.subscriptions.len() != before
    }

    #[cfg(test)]
    pub(crate) fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.iter().any(|(candidate, _)| *candidate == id)
    }

    pub(crate) fn subscriber_count(&self, kind: GameEventKind) -> usize {
        self.subscriptions
            .iter()
            .filter(|(_, candidate)| *candidate == kind)
            .count()
    }

    pub(crate) fn total_subscribers(&self) -> usize {
        self.subscriptions.len()
    }

    pub(crate) fn publish(&mut self, event: GameEvent) {
        *self.published_counts.entry(event.kind()).or_default() += 1;
        self.queued.push_back(event);
    }

    pub(crate) fn published_count(&self, kind: GameEventKind) -> u64 {
        self.published_counts.get(&kind).copied().unwrap_or(0)
    }

    pub(crate) fn has_queued(&self) -> bool {
        !self.queued.is_empty()
    }

    /// Drains the queue. Events published while the caller handles these deliveries
    /// wait for the next dispatch. Events nobody listens to are dropped.
    pub(crate) fn dispatch(&mut self) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        while let Some(event) = self.queued.pop_front() {
            let before = deliveries.len();
            deliveries.extend(
                self.subscriptions
                    .iter()
                    .filter(|(_, kind)| *kind == event.kind())
                    .map(|(subscription, _)| Delivery {
                        subscription: *subscription,
                        event,
                    }),
            );
            if deliveries.len() == before {
                debug!(kind = ?event.kind(), "event_without_subscribers");
            }
        }
        deliveries
    }
}
