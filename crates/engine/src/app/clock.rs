use super::scene::EntityId;

/// Scaled simulation time. A timescale of zero freezes simulation time while real
/// time keeps flowing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimClock {
    timescale: f32,
    sim_elapsed: f64,
    real_elapsed: f64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            timescale: 1.0,
            sim_elapsed: 0.0,
            real_elapsed: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    pub real_dt: f32,
    pub sim_dt: f32,
}

impl FrameTime {
    pub fn new(real_dt: f32, sim_dt: f32) -> Self {
        Self { real_dt, sim_dt }
    }

    pub fn unscaled(dt: f32) -> Self {
        Self::new(dt, dt)
    }
}

impl SimClock {
    pub fn timescale(&self) -> f32 {
        self.timescale
    }

    pub fn set_timescale(&mut self, timescale: f32) {
        self.timescale = if timescale.is_finite() {
            timescale.max(0.0)
        } else {
            1.0
        };
    }

    pub fn is_frozen(&self) -> bool {
        self.timescale <= 0.0
    }

    pub fn sim_elapsed(&self) -> f64 {
        self.sim_elapsed
    }

    pub fn real_elapsed(&self) -> f64 {
        self.real_elapsed
    }

    pub fn advance(&mut self, real_dt: f32) -> FrameTime {
        let real_dt = if real_dt.is_finite() { real_dt.max(0.0) } else { 0.0 };
        let sim_dt = real_dt * self.timescale;
        self.real_elapsed += real_dt as f64;
        self.sim_elapsed += sim_dt as f64;
        FrameTime { real_dt, sim_dt }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockKind {
    /// Scaled time; stops while the timescale is zero.
    Simulation,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduledId(u64);

#[derive(Debug)]
struct ScheduledEntry<T> {
    id: ScheduledId,
    owner: Option<EntityId>,
    clock: ClockKind,
    remaining: f32,
    payload: T,
}

/// Delayed continuations. Entries owned by an entity can be cancelled together when
/// that entity is destroyed, so nothing fires for an object that no longer exists.
#[derive(Debug)]
pub struct Scheduler<T> {
    next_id: u64,
    entries: Vec<ScheduledEntry<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn schedule(
        &mut self,
        owner: Option<EntityId>,
        clock: ClockKind,
        delay_seconds: f32,
        payload: T,
    ) -> ScheduledId {
        let id = ScheduledId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        let remaining = if delay_seconds.is_finite() {
            delay_seconds.max(0.0)
        } else {
            0.0
        };
        self.entries.push(ScheduledEntry {
            id,
            owner,
            clock,
            remaining,
            payload,
        });
        id
    }

    pub fn cancel(&mut self, id: ScheduledId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn cancel_owner(&mut self, owner: EntityId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.owner != Some(owner));
        before - self.entries.len()
    }

    pub fn is_pending(&self, id: ScheduledId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Advances every entry on its own clock and returns the payloads that came due,
    /// earliest first, ties broken by scheduling order.
    pub fn advance(&mut self, time: FrameTime) -> Vec<T> {
        for entry in &mut self.entries {
            let dt = match entry.clock {
                ClockKind::Simulation => time.sim_dt,
                ClockKind::Real => time.real_dt,
            };
            entry.remaining -= dt;
        }

        let (mut due, pending): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|entry| entry.remaining <= 0.0);
        self.entries = pending;

        due.sort_by(|left, right| {
            left.remaining
                .total_cmp(&right.remaining)
                .then(left.id.cmp(&right.id))
        });
        due.into_iter().map(|entry| entry.payload).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timescale_freezes_sim_time_only() {
        let mut clock = SimClock::default();
        clock.set_timescale(0.0);
        let frame = clock.advance(0.5);

        assert_eq!(frame.sim_dt, 0.0);
        assert_eq!(frame.real_dt, 0.5);
        assert!(clock.is_frozen());
        assert_eq!(clock.sim_elapsed(), 0.0);
        assert_eq!(clock.real_elapsed(), 0.5);
    }

    #[test]
    fn timescale_rejects_negative_and_nan() {
        let mut clock = SimClock::default();
        clock.set_timescale(-2.0);
        assert_eq!(clock.timescale(), 0.0);
        clock.set_timescale(f32::NAN);
        assert_eq!(clock.timescale(), 1.0);
    }

    #[test]
    fn real_clock_entries_fire_while_simulation_is_frozen() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(None, ClockKind::Real, 1.0, "real");
        scheduler.schedule(None, ClockKind::Simulation, 1.0, "sim");

        let due = scheduler.advance(FrameTime::new(1.0, 0.0));
        assert_eq!(due, vec!["real"]);
        assert_eq!(scheduler.len(), 1);

        let due = scheduler.advance(FrameTime::unscaled(1.0));
        assert_eq!(due, vec!["sim"]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn due_entries_come_out_in_due_order() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(None, ClockKind::Simulation, 0.3, 3);
        scheduler.schedule(None, ClockKind::Simulation, 0.1, 1);
        scheduler.schedule(None, ClockKind::Simulation, 0.1, 2);

        assert_eq!(scheduler.advance(FrameTime::unscaled(0.5)), vec![1, 2, 3]);
    }

    #[test]
    fn cancel_owner_drops_only_that_owners_entries() {
        let mut scheduler = Scheduler::default();
        let kept = scheduler.schedule(Some(EntityId(1)), ClockKind::Simulation, 1.0, 'a');
        scheduler.schedule(Some(EntityId(2)), ClockKind::Simulation, 1.0, 'b');
        scheduler.schedule(Some(EntityId(2)), ClockKind::Real, 1.0, 'c');

        assert_eq!(scheduler.cancel_owner(EntityId(2)), 2);
        assert!(scheduler.is_pending(kept));
        assert!(scheduler.cancel(kept));
        assert!(!scheduler.cancel(kept));
    }
}
