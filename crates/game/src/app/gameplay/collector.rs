use engine::{EffectQueue, Vec2};
use tracing::debug;

use super::events::{Delivery, EventBus, GameEvent, GameEventKind, SubscriptionId};
use super::health::PlayerHealth;
use super::session::SessionStore;

/// Slime currency and food pickups.
#[derive(Debug)]
pub(crate) struct PlayerCollector {
    slime_count: u32,
    food_hp_boost: u32,
    collect_sound: String,
    eat_sound: String,
    subscription: Option<SubscriptionId>,
}

impl PlayerCollector {
    pub(crate) fn from_session(
        session: &SessionStore,
        food_hp_boost: u32,
        collect_sound: &str,
        eat_sound: &str,
    ) -> Self {
        Self {
            slime_count: session.slime_count(),
            food_hp_boost,
            collect_sound: collect_sound.to_string(),
            eat_sound: eat_sound.to_string(),
            subscription: None,
        }
    }

    pub(crate) fn enable(&mut self, bus: &mut EventBus) {
        if self.subscription.is_none() {
            self.subscription = Some(bus.subscribe(GameEventKind::SceneExited));
        }
    }

    pub(crate) fn disable(&mut self, bus: &mut EventBus) {
        if let Some(id) = self.subscription.take() {
            bus.unsubscribe(id);
        }
    }

    pub(crate) fn slime_count(&self) -> u32 {
        self.slime_count
    }

    pub(crate) fn collect_slime(
        &mut self,
        position: Vec2,
        effects: &mut EffectQueue,
        bus: &mut EventBus,
    ) -> u32 {
        self.slime_count = self.slime_count.saturating_add(1);
        effects.play_sound(&self.collect_sound, position);
        bus.publish(GameEvent::SlimeCollected {
            total: self.slime_count,
        });
        self.slime_count
    }

    pub(crate) fn eat_food(
        &self,
        health: &mut PlayerHealth,
        position: Vec2,
        effects: &mut EffectQueue,
    ) -> u32 {
        effects.play_sound(&self.eat_sound, position);
        health.heal(self.food_hp_boost)
    }

    /// All or nothing: either `amount` slimes are spent or the count is untouched.
    pub(crate) fn spend_slimes(&mut self, amount: u32) -> bool {
        if self.slime_count < amount {
            debug!(have = self.slime_count, need = amount, "slime_spend_refused");
            return false;
        }
        self.slime_count -= amount;
        true
    }

    pub(crate) fn on_delivery(&self, delivery: &Delivery, session: &mut SessionStore) -> bool {
        if Some(delivery.subscription) != self.subscription {
            return false;
        }
        if delivery.event == GameEvent::SceneExited {
            session.record_slime_count(self.slime_count);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::gameplay::health::DamageOutcome;

    fn collector(session: &SessionStore) -> PlayerCollector {
        PlayerCollector::from_session(session, 3, "slime_collect", "food_eat")
    }

    #[test]
    fn spend_is_atomic() {
        let mut session = SessionStore::default();
        session.record_slime_count(2);
        let mut collector = collector(&session);

        assert!(!collector.spend_slimes(3));
        assert_eq!(collector.slime_count(), 2);
        assert!(collector.spend_slimes(2));
        assert_eq!(collector.slime_count(), 0);
        assert!(collector.spend_slimes(0));
    }

    #[test]
    fn collecting_publishes_running_total() {
        let session = SessionStore::default();
        let mut collector = collector(&session);
        let mut bus = EventBus::default();
        let mut effects = EffectQueue::default();
        bus.subscribe(GameEventKind::SlimeCollected);

        collector.collect_slime(Vec2::ZERO, &mut effects, &mut bus);
        collector.collect_slime(Vec2::ZERO, &mut effects, &mut bus);

        let totals: Vec<GameEvent> = bus.dispatch().into_iter().map(|d| d.event).collect();
        assert_eq!(
            totals,
            vec![
                GameEvent::SlimeCollected { total: 1 },
                GameEvent::SlimeCollected { total: 2 }
            ]
        );
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn food_heals_up_to_max() {
        let session = SessionStore::default();
        let collector = collector(&session);
        let mut health = PlayerHealth::from_session(&session, "player_hurt");
        let mut effects = EffectQueue::default();
        let mut bus = EventBus::default();
        assert_eq!(health.self_damage(4, &mut bus), DamageOutcome::Hurt { remaining: 8 });

        assert_eq!(collector.eat_food(&mut health, Vec2::ZERO, &mut effects), 11);
        assert_eq!(collector.eat_food(&mut health, Vec2::ZERO, &mut effects), 14);
        assert_eq!(collector.eat_food(&mut health, Vec2::ZERO, &mut effects), 15);
    }

    #[test]
    fn scene_exit_writes_slime_count() {
        let mut session = SessionStore::default();
        let mut collector = collector(&session);
        let mut bus = EventBus::default();
        let mut effects = EffectQueue::default();
        collector.enable(&mut bus);

        collector.collect_slime(Vec2::ZERO, &mut effects, &mut bus);
        bus.publish(GameEvent::SceneExited);
        for delivery in bus.dispatch() {
            collector.on_delivery(&delivery, &mut session);
        }
        collector.disable(&mut bus);

        assert_eq!(session.slime_count(), 1);
        assert_eq!(bus.total_subscribers(), 0);
    }
}
