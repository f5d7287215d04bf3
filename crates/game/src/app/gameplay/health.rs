use engine::{EffectQueue, Vec2};

use super::events::{Delivery, EventBus, GameEvent, GameEventKind, SubscriptionId};
use super::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DamageOutcome {
    Hurt { remaining: u32 },
    /// This hit took hp from above zero to zero.
    CrossedZero,
    /// Already at zero; nothing changed.
    AlreadyDown,
}

/// Bounded hit points. Zero is reported once per downward crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Health {
    hp: u32,
    max_hp: u32,
}

impl Health {
    pub(crate) fn new(hp: u32, max_hp: u32) -> Self {
        Self {
            hp: hp.min(max_hp),
            max_hp,
        }
    }

    pub(crate) fn full(max_hp: u32) -> Self {
        Self::new(max_hp, max_hp)
    }

    pub(crate) fn hp(&self) -> u32 {
        self.hp
    }

    pub(crate) fn max_hp(&self) -> u32 {
        self.max_hp
    }

    #[cfg(test)]
    pub(crate) fn is_down(&self) -> bool {
        self.hp == 0
    }

    pub(crate) fn damage(&mut self, amount: u32) -> DamageOutcome {
        if self.hp == 0 {
            return DamageOutcome::AlreadyDown;
        }
        self.hp = self.hp.saturating_sub(amount);
        if self.hp == 0 {
            DamageOutcome::CrossedZero
        } else {
            DamageOutcome::Hurt { remaining: self.hp }
        }
    }

    pub(crate) fn heal(&mut self, amount: u32) -> u32 {
        self.hp = self.hp.saturating_add(amount).min(self.max_hp);
        self.hp
    }
}

/// The player's health, seeded from the session and written back at scene exit.
#[derive(Debug)]
pub(crate) struct PlayerHealth {
    health: Health,
    hurt_sound: String,
    subscription: Option<SubscriptionId>,
}

impl PlayerHealth {
    pub(crate) fn from_session(session: &SessionStore, hurt_sound: &str) -> Self {
        Self {
            health: Health::new(session.hp(), session.max_hp()),
            hurt_sound: hurt_sound.to_string(),
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

    pub(crate) fn health(&self) -> &Health {
        &self.health
    }

    /// Damage from an external source: plays the hurt sound and raises
    /// `PlayerDefeated` when this hit reaches zero.
    pub(crate) fn damage(
        &mut self,
        amount: u32,
        position: Vec2,
        effects: &mut EffectQueue,
        bus: &mut EventBus,
    ) -> DamageOutcome {
        let outcome = self.health.damage(amount);
        if outcome != DamageOutcome::AlreadyDown {
            effects.play_sound(&self.hurt_sound, position);
        }
        if outcome == DamageOutcome::CrossedZero {
            bus.publish(GameEvent::PlayerDefeated);
        }
        outcome
    }

    /// Silent self-inflicted cost, such as firing a shot.
    pub(crate) fn self_damage(&mut self, amount: u32, bus: &mut EventBus) -> DamageOutcome {
        let outcome = self.health.damage(amount);
        if outcome == DamageOutcome::CrossedZero {
            bus.publish(GameEvent::PlayerDefeated);
        }
        outcome
    }

    pub(crate) fn heal(&mut self, amount: u32) -> u32 {
        self.health.heal(amount)
    }

    /// Returns `true` when the delivery was addressed to this component.
    pub(crate) fn on_delivery(&self, delivery: &Delivery, session: &mut SessionStore) -> bool {
        if Some(delivery.subscription) != self.subscription {
            return false;
        }
        if delivery.event == GameEvent::SceneExited {
            session.record_player_health(self.health.hp(), self.health.max_hp());
        }
        true
    }
}
