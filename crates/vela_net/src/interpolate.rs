//! # Snapshot Interpolation
//!
//! Remote entities render a fixed delay behind the newest snapshot so
//! there is almost always a pair of known states to blend between:
//!
//! ```text
//! snapshots:   s0────s1────s2────s3      (arrival times)
//! render time:            ▲  now - delay
//!                    lerp(s1, s2, t)
//! ```
//!
//! Numeric leaves interpolate linearly; discrete leaves (strings, bools,
//! lists) hold the earlier snapshot's value until the later one is
//! reached. With a single buffered state, or a render time outside the
//! buffered range, the nearest state wins.

use std::collections::{HashMap, VecDeque};

use vela_core::EntityId;

use crate::protocol::Value;

/// Buffered snapshots kept per entity.
const MAX_BUFFERED: usize = 5;
/// Default render delay in milliseconds.
pub const DEFAULT_DELAY_MS: f64 = 100.0;

/// Client-side snapshot buffer and interpolator.
pub struct SnapshotInterpolator {
    delay_ms: f64,
    buffers: HashMap<EntityId, VecDeque<(f64, Value)>>,
    /// Rolling estimate of snapshot age on arrival, milliseconds.
    latency_ms: f64,
}

impl SnapshotInterpolator {
    /// Creates an interpolator rendering `delay_ms` behind real time.
    #[must_use]
    pub fn new(delay_ms: f64) -> Self {
        Self {
            delay_ms,
            buffers: HashMap::new(),
            latency_ms: 0.0,
        }
    }

    /// Buffers one entity state stamped with its server send time.
    pub fn add_snapshot(&mut self, entity: EntityId, timestamp_ms: f64, state: Value, now_ms: f64) {
        let buffer = self.buffers.entry(entity).or_default();
        buffer.push_back((timestamp_ms, state));
        while buffer.len() > MAX_BUFFERED {
            buffer.pop_front();
        }
        // Rolling average, biased toward history.
        self.latency_ms = self.latency_ms * 0.9 + (now_ms - timestamp_ms) * 0.1;
    }

    /// Drops an entity's buffer (it left the interest set or the world).
    pub fn remove_entity(&mut self, entity: EntityId) {
        self.buffers.remove(&entity);
    }

    /// Interpolated state for every buffered entity at `now - delay`.
    #[must_use]
    pub fn update(&self, now_ms: f64) -> Vec<(EntityId, Value)> {
        let render_time = now_ms - self.delay_ms;
        self.buffers
            .iter()
            .filter_map(|(entity, buffer)| {
                interpolate_buffer(buffer, render_time).map(|state| (*entity, state))
            })
            .collect()
    }

    /// Current rolling latency estimate, milliseconds.
    #[must_use]
    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    /// Entities with at least one buffered state.
    #[must_use]
    pub fn tracked_entities(&self) -> usize {
        self.buffers.len()
    }
}

impl Default for SnapshotInterpolator {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_MS)
    }
}

fn interpolate_buffer(buffer: &VecDeque<(f64, Value)>, render_time: f64) -> Option<Value> {
    let (first_ts, first) = buffer.front()?;
    let (last_ts, last) = buffer.back()?;

    if render_time <= *first_ts {
        return Some(first.clone());
    }
    if render_time >= *last_ts {
        return Some(last.clone());
    }

    for pair in buffer.iter().zip(buffer.iter().skip(1)) {
        let ((from_ts, from), (to_ts, to)) = pair;
        if render_time >= *from_ts && render_time <= *to_ts {
            let span = to_ts - from_ts;
            let t = if span > 0.0 {
                (render_time - from_ts) / span
            } else {
                1.0
            };
            return Some(lerp_value(from, to, t));
        }
    }
    Some(last.clone())
}

/// Recursive blend: numbers lerp, maps recurse, everything else holds
/// the earlier value.
fn lerp_value(from: &Value, to: &Value, t: f64) -> Value {
    match (from, to) {
        (Value::F64(a), Value::F64(b)) => Value::F64(a + (b - a) * t),
        (Value::Map(a), Value::Map(b)) => Value::Map(
            a.iter()
                .map(|(key, from_value)| {
                    let blended = match b.get(key) {
                        Some(to_value) => lerp_value(from_value, to_value, t),
                        None => from_value.clone(),
                    };
                    (key.clone(), blended)
                })
                .collect(),
        ),
        _ => from.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: f64) -> Value {
        Value::map([(
            "position".to_owned(),
            Value::map([("x".to_owned(), Value::F64(x))]),
        )])
    }

    fn x_of(state: &Value) -> f64 {
        state
            .get("position")
            .and_then(|p| p.get("x"))
            .and_then(Value::as_f64)
            .unwrap()
    }

    #[test]
    fn test_midpoint_interpolation() {
        let mut interp = SnapshotInterpolator::new(100.0);
        let e = EntityId(1);
        interp.add_snapshot(e, 1000.0, pos(0.0), 1010.0);
        interp.add_snapshot(e, 1100.0, pos(10.0), 1110.0);

        // render time = 1150 - 100 = 1050, halfway between snapshots
        let states = interp.update(1150.0);
        assert_eq!(states.len(), 1);
        assert!((x_of(&states[0].1) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_render_past_latest_clamps() {
        let mut interp = SnapshotInterpolator::new(100.0);
        let e = EntityId(1);
        interp.add_snapshot(e, 1000.0, pos(3.0), 1000.0);

        let states = interp.update(5000.0);
        assert!((x_of(&states[0].1) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_buffer_bounded_to_five() {
        let mut interp = SnapshotInterpolator::new(100.0);
        let e = EntityId(1);
        for i in 0..10 {
            interp.add_snapshot(e, f64::from(i) * 100.0, pos(f64::from(i)), f64::from(i) * 100.0);
        }

        // Oldest surviving snapshot is i=5; rendering earlier clamps to it.
        let states = interp.update(0.0);
        assert!((x_of(&states[0].1) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_discrete_fields_hold_earlier_value() {
        let mut interp = SnapshotInterpolator::new(0.0);
        let e = EntityId(1);
        interp.add_snapshot(
            e,
            0.0,
            Value::map([("status".to_owned(), Value::Str("idle".to_owned()))]),
            0.0,
        );
        interp.add_snapshot(
            e,
            100.0,
            Value::map([("status".to_owned(), Value::Str("jumping".to_owned()))]),
            100.0,
        );

        let states = interp.update(50.0);
        assert_eq!(
            states[0].1.get("status"),
            Some(&Value::Str("idle".to_owned()))
        );
    }

    #[test]
    fn test_latency_average_tracks_arrivals() {
        let mut interp = SnapshotInterpolator::new(100.0);
        let e = EntityId(1);
        for i in 0..50 {
            let ts = f64::from(i) * 100.0;
            interp.add_snapshot(e, ts, pos(0.0), ts + 40.0);
        }
        assert!((interp.latency_ms() - 40.0).abs() < 1.0);
    }

    #[test]
    fn test_removed_entity_not_reported() {
        let mut interp = SnapshotInterpolator::new(100.0);
        let e = EntityId(1);
        interp.add_snapshot(e, 0.0, pos(0.0), 0.0);
        interp.remove_entity(e);
        assert!(interp.update(200.0).is_empty());
        assert_eq!(interp.tracked_entities(), 0);
    }
}
