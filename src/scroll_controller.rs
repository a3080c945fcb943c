//! Authoritative scroll position, smooth animation, direction, and
//! at-top/at-bottom queries (§4.6).
//!
//! The animation itself is modelled as the idle → running → idle state
//! machine called out in §9: a single nullable `Animation`, replaced
//! wholesale by any new scroll (programmatic or user-initiated), which is
//! how "user input wins" (§5 ordering guarantees) falls out for free.

use crate::event_bus::Direction;
use crate::size_cache::SizeCache;

/// Where to align a target item within the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Align the item's leading edge with the viewport's leading edge.
    Start,
    /// Center the item within the viewport.
    Center,
    /// Align the item's trailing edge with the viewport's trailing edge.
    End,
}

/// How a `scrollToIndex` call should move the scroll position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollBehavior {
    /// Jump immediately.
    Auto,
    /// Animate over `duration_ms` with ease-in-out-quad.
    Smooth {
        /// Animation length in milliseconds.
        duration_ms: f64,
    },
}

/// A single idle→running→idle smooth-scroll animation.
#[derive(Debug, Clone, Copy)]
struct Animation {
    from: f64,
    to: f64,
    start_time_ms: f64,
    duration_ms: f64,
}

fn ease_in_out_quad(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u / 2.0
    }
}

/// The authoritative scroll position and its animation state.
#[derive(Debug, Clone)]
pub struct ScrollController {
    position: f64,
    last_position: f64,
    container_size: f64,
    direction: Direction,
    wrap: bool,
    animation: Option<Animation>,
}

impl ScrollController {
    /// Construct a controller at position 0.
    pub fn new(container_size: f64, wrap: bool) -> Self {
        Self {
            position: 0.0,
            last_position: 0.0,
            container_size,
            direction: Direction::Down,
            wrap,
            animation: None,
        }
    }

    /// Current authoritative scroll position.
    pub fn position(&self) -> f64 { self.position }

    /// Most recent scroll direction.
    pub fn direction(&self) -> Direction { self.direction }

    /// Whether any smooth-scroll animation is in flight.
    pub fn is_animating(&self) -> bool { self.animation.is_some() }

    /// Update the viewport's main-axis size (e.g. on container resize).
    pub fn set_container_size(&mut self, size: f64) { self.container_size = size; }

    /// Whether `scrollToIndex` should wrap indices modulo `total`.
    pub fn set_wrap(&mut self, wrap: bool) { self.wrap = wrap; }

    /// Directly set the scroll position (user-initiated or programmatic,
    /// non-smooth). Cancels any in-flight animation: "user input wins".
    pub fn set_position(&mut self, position: f64, total_size: f64) {
        self.animation = None;
        self.write_position(position, total_size);
    }

    fn write_position(&mut self, position: f64, total_size: f64) {
        let clamped = clamp_position(position, self.container_size, total_size);
        self.last_position = self.position;
        self.direction = if clamped > self.position { Direction::Down } else { Direction::Up };
        self.position = clamped;
    }

    /// Whether the controller is at the very start of the scrollable range.
    pub fn is_at_top(&self) -> bool { self.position <= 0.0 }

    /// Whether the controller is within `threshold` pixels of the end.
    pub fn is_at_bottom(&self, total_size: f64, threshold: f64) -> bool {
        let max = max_scroll(self.container_size, total_size);
        max - self.position <= threshold
    }

    /// Cancel any in-flight smooth-scroll animation.
    pub fn cancel_scroll(&mut self) { self.animation = None; }

    /// Compute the target scroll position for `scrollToIndex(index, align)`,
    /// per §4.6. Pure and deterministic (§8 property 2, scenario S2).
    pub fn target_for_index(&self, cache: &SizeCache, index: usize, align: Align) -> f64 {
        let total = cache.total();
        if total == 0 {
            return 0.0;
        }
        let index = if self.wrap { index % total } else { index.min(total - 1) };
        let item_offset = cache.offset(index);
        let item_size = cache.size(index);
        let raw = match align {
            Align::Start => item_offset,
            Align::Center => item_offset - (self.container_size - item_size) / 2.0,
            Align::End => item_offset - self.container_size + item_size,
        };
        clamp_position(raw, self.container_size, cache.total_size())
    }

    /// Begin (or immediately perform) a `scrollToIndex`. For
    /// [`ScrollBehavior::Auto`] the position is written synchronously.
    /// For [`ScrollBehavior::Smooth`] an animation is armed; advance it
    /// with [`ScrollController::tick`].
    pub fn scroll_to_index(&mut self, cache: &SizeCache, index: usize, align: Align, behavior: ScrollBehavior, now_ms: f64) {
        let target = self.target_for_index(cache, index, align);
        match behavior {
            ScrollBehavior::Auto => self.set_position(target, cache.total_size()),
            ScrollBehavior::Smooth { duration_ms } => {
                self.animation = Some(Animation {
                    from: self.position,
                    to: target,
                    start_time_ms: now_ms,
                    duration_ms: duration_ms.max(1.0),
                });
            }
        }
    }

    /// Advance the in-flight animation to `now_ms`, writing the new
    /// position. Returns `true` while the animation is still running,
    /// `false` once it completed (or there was none) — at which point
    /// the final value has been written exactly and the animation slot
    /// is cleared.
    pub fn tick(&mut self, now_ms: f64, total_size: f64) -> bool {
        let Some(anim) = self.animation else { return false };
        let elapsed = (now_ms - anim.start_time_ms).max(0.0);
        let t = (elapsed / anim.duration_ms).min(1.0);
        let eased = ease_in_out_quad(t);
        let next = anim.from + (anim.to - anim.from) * eased;

        if (anim.to - next).abs() < 1.0 || t >= 1.0 {
            self.write_position(anim.to, total_size);
            self.animation = None;
            return false;
        }
        self.write_position(next, total_size);
        true
    }
}

fn max_scroll(container_size: f64, total_size: f64) -> f64 { (total_size - container_size).max(0.0) }

fn clamp_position(position: f64, container_size: f64, total_size: f64) -> f64 {
    position.clamp(0.0, max_scroll(container_size, total_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> SizeCache { SizeCache::uniform(40.0, 100) }

    #[test]
    fn s2_scroll_to_middle_center() {
        let cache = list();
        let ctrl = ScrollController::new(600.0, false);
        let target = ctrl.target_for_index(&cache, 50, Align::Center);
        assert_eq!(target, 1720.0);
    }

    #[test]
    fn scroll_to_index_round_trip_start() {
        let cache = list();
        let mut ctrl = ScrollController::new(600.0, false);
        ctrl.scroll_to_index(&cache, 10, Align::Start, ScrollBehavior::Auto, 0.0);
        assert_eq!(cache.index_at(ctrl.position()), 10);
    }

    #[test]
    fn direction_tracks_previous_position() {
        let cache = list();
        let mut ctrl = ScrollController::new(600.0, false);
        ctrl.set_position(100.0, cache.total_size());
        assert_eq!(ctrl.direction(), Direction::Down);
        ctrl.set_position(0.0, cache.total_size());
        assert_eq!(ctrl.direction(), Direction::Up);
    }

    #[test]
    fn smooth_animation_completes_at_exact_target() {
        let cache = list();
        let mut ctrl = ScrollController::new(600.0, false);
        ctrl.scroll_to_index(&cache, 99, Align::Start, ScrollBehavior::Smooth { duration_ms: 100.0 }, 0.0);
        assert!(ctrl.is_animating());
        let mut running = true;
        let mut t = 0.0;
        while running && t <= 200.0 {
            t += 16.0;
            running = ctrl.tick(t, cache.total_size());
        }
        assert!(!ctrl.is_animating());
        assert_eq!(ctrl.position(), cache.offset(99));
    }

    #[test]
    fn new_scroll_cancels_in_flight_animation() {
        let cache = list();
        let mut ctrl = ScrollController::new(600.0, false);
        ctrl.scroll_to_index(&cache, 99, Align::Start, ScrollBehavior::Smooth { duration_ms: 1000.0 }, 0.0);
        assert!(ctrl.is_animating());
        ctrl.set_position(5.0, cache.total_size());
        assert!(!ctrl.is_animating());
    }

    #[test]
    fn at_top_and_at_bottom() {
        let cache = list();
        let mut ctrl = ScrollController::new(600.0, false);
        assert!(ctrl.is_at_top());
        ctrl.set_position(cache.total_size(), cache.total_size());
        assert!(ctrl.is_at_bottom(cache.total_size(), 1.0));
    }

    #[test]
    fn wrap_mode_wraps_index_before_offset_lookup() {
        let cache = list();
        let mut ctrl = ScrollController::new(600.0, true);
        ctrl.set_wrap(true);
        let target = ctrl.target_for_index(&cache, 150, Align::Start); // 150 % 100 = 50
        assert_eq!(target, cache.offset(50));
    }
}
