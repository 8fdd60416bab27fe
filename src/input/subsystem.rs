//! The input subsystem handle: an opaque object constructed by
//! `InputSubsystem::init` and torn down by `.cleanup()` (or simply
//! dropped), holding the ring buffer, the coalescing slot, and the
//! cached input state.
//!
//! Double-init is rejected via one process-wide atomic flag, the
//! smallest amount of hidden global state that can still guarantee only
//! one subsystem is live at a time, which matters because platform input
//! callbacks are themselves global and can only feed one instance. The
//! actual data lives in the `InputSubsystem` value the caller owns, not
//! behind further globals.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{QueueError, Result};

use super::coalesce::CoalesceSlot;
use super::event::{
    ButtonCode, EventType, InputEvent, JoystickDetail, KeyCode, KeyboardDetail, MouseDetail,
    TextDetail, TouchDetail, TouchId,
};
use super::ring::RingBuffer;

static INPUT_LIVE: AtomicBool = AtomicBool::new(false);

/// Construction-time configuration for an [`InputSubsystem`]. No
/// environment variables are read: the core has no configuration surface
/// of its own, so this is a typed config struct in place of scattered
/// constructor arguments rather than an environment-driven setup.
#[derive(Debug, Clone, Copy)]
pub struct InputConfig {
    /// Ring buffer array length; usable capacity is this minus one.
    pub ring_capacity: usize,
    pub coalesce: bool,
    pub text_buffer_capacity: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            ring_capacity: 256,
            coalesce: true,
            text_buffer_capacity: 128,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

/// A point-in-time copy of the cached input state: button vectors,
/// last-key-pressed, accumulated scroll deltas, the touch table, and the
/// text-input buffer.
#[derive(Debug, Default, Clone)]
pub struct InputSnapshot {
    pub buttons: HashMap<(EventType, ButtonCode), bool>,
    pub last_key: Option<KeyCode>,
    pub scroll_delta: (f32, f32),
    pub touches: HashMap<TouchId, TouchPoint>,
}

#[derive(Default)]
struct CachedState {
    buttons: HashMap<(EventType, ButtonCode), bool>,
    last_key: Option<KeyCode>,
    scroll_delta: (f32, f32),
    touches: HashMap<TouchId, TouchPoint>,
    text_buffer: VecDeque<char>,
}

pub struct InputSubsystem {
    ring: RingBuffer,
    coalesce: Option<CoalesceSlot>,
    state: Mutex<CachedState>,
    text_buffer_capacity: usize,
}

impl InputSubsystem {
    /// Construct and activate a subsystem. Rejected with
    /// `InvalidArgument` if one is already live; this library never
    /// aborts the process.
    pub fn init(config: InputConfig) -> Result<Self> {
        if INPUT_LIVE.swap(true, Ordering::AcqRel) {
            return Err(QueueError::InvalidArgument(
                "input subsystem already initialized",
            ));
        }
        Ok(InputSubsystem {
            ring: RingBuffer::new(config.ring_capacity.max(2)),
            coalesce: config.coalesce.then(CoalesceSlot::new),
            state: Mutex::new(CachedState::default()),
            text_buffer_capacity: config.text_buffer_capacity,
        })
    }

    /// Explicit counterpart to `init`. `Drop` does the same thing, so
    /// this is purely for callers that want the teardown to be visible
    /// at the call site.
    pub fn cleanup(self) {
        drop(self)
    }

    /// Backend entry point: `receive_event`. Performs no validation of
    /// event contents beyond dispatch on the type/detail tags.
    pub fn receive_event(&self, event: InputEvent) {
        let to_push = match &self.coalesce {
            Some(slot) => slot.offer(event, &self.ring),
            None => Some(event),
        };
        if let Some(event) = to_push {
            if !self.ring.push(event) {
                log::warn!(
                    "input ring buffer full ({} slots), dropping a {:?} event",
                    self.ring.usable_capacity(),
                    event.event_type()
                );
            }
        }
    }

    /// Polling entry point: flushes any pending coalesced event, drains
    /// the ring, updates the cached state, and invokes `callback` once
    /// per drained event.
    pub fn update(&self, mut callback: Option<&mut dyn FnMut(&InputEvent)>) {
        if let Some(slot) = &self.coalesce {
            slot.flush(&self.ring);
        }
        while let Some(event) = self.ring.pop() {
            self.apply(&event);
            if let Some(cb) = callback.as_deref_mut() {
                cb(&event);
            }
        }
    }

    fn apply(&self, event: &InputEvent) {
        let mut state = self.state.lock().unwrap();
        match event {
            InputEvent::Keyboard { detail, record, .. } => match detail {
                KeyboardDetail::KeyDown => {
                    state.buttons.insert((EventType::Keyboard, record.key), true);
                    state.last_key = Some(record.key);
                }
                KeyboardDetail::KeyUp => {
                    state.buttons.insert((EventType::Keyboard, record.key), false);
                }
            },
            InputEvent::Mouse { detail, record, .. } => match detail {
                MouseDetail::ButtonDown => {
                    if let Some(b) = record.button {
                        state.buttons.insert((EventType::Mouse, b), true);
                    }
                }
                MouseDetail::ButtonUp => {
                    if let Some(b) = record.button {
                        state.buttons.insert((EventType::Mouse, b), false);
                    }
                }
                MouseDetail::Scroll => {
                    state.scroll_delta.0 += record.dx;
                    state.scroll_delta.1 += record.dy;
                }
                MouseDetail::Move => {}
            },
            InputEvent::Joystick { detail, record, .. } => match detail {
                JoystickDetail::ButtonDown => {
                    if let Some(b) = record.button {
                        state.buttons.insert((EventType::Joystick, b), true);
                    }
                }
                JoystickDetail::ButtonUp => {
                    if let Some(b) = record.button {
                        state.buttons.insert((EventType::Joystick, b), false);
                    }
                }
                JoystickDetail::StickChange => {}
            },
            InputEvent::Touch { detail, record, .. } => match detail {
                TouchDetail::Down | TouchDetail::Move => {
                    state
                        .touches
                        .insert(record.id, TouchPoint { x: record.x, y: record.y });
                }
                TouchDetail::Up => {
                    state.touches.remove(&record.id);
                }
            },
            InputEvent::Text { detail, record, .. } => {
                let capacity = self.text_buffer_capacity;
                match detail {
                    TextDetail::Char => {
                        if state.text_buffer.len() >= capacity {
                            log::warn!(
                                "text input buffer full ({capacity} chars unread), dropping new character"
                            );
                        } else {
                            state.text_buffer.push_back(record.ch);
                        }
                    }
                    TextDetail::Done => match state.text_buffer.back_mut() {
                        Some(last) => *last = record.ch,
                        None => {
                            log::warn!("text input Done event with no buffered character to replace");
                        }
                    },
                }
            }
            InputEvent::Memory { .. } => {}
        }
    }

    /// A point-in-time copy of the cached state. Does not reset
    /// `scroll_delta`; see [`InputSubsystem::take_scroll_delta`] for the
    /// accumulated, reset-on-read variant.
    pub fn snapshot(&self) -> InputSnapshot {
        let state = self.state.lock().unwrap();
        InputSnapshot {
            buttons: state.buttons.clone(),
            last_key: state.last_key,
            scroll_delta: state.scroll_delta,
            touches: state.touches.clone(),
        }
    }

    /// Read and reset the accumulated scroll delta.
    pub fn take_scroll_delta(&self) -> (f32, f32) {
        let mut state = self.state.lock().unwrap();
        std::mem::take(&mut state.scroll_delta)
    }

    /// Drain the text-input buffer as a `String`. Callers that drain
    /// promptly never see characters dropped for a full buffer.
    pub fn take_text_input(&self) -> String {
        let mut state = self.state.lock().unwrap();
        state.text_buffer.drain(..).collect()
    }

    pub fn is_button_down(&self, kind: EventType, code: ButtonCode) -> bool {
        let state = self.state.lock().unwrap();
        state.buttons.get(&(kind, code)).copied().unwrap_or(false)
    }
}

impl Drop for InputSubsystem {
    fn drop(&mut self) {
        INPUT_LIVE.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::event::{KeyboardRecord, MouseRecord, TextRecord};

    #[test]
    fn double_init_is_rejected() {
        let first = InputSubsystem::init(InputConfig::default()).unwrap();
        let second = InputSubsystem::init(InputConfig::default());
        assert!(second.is_err());
        drop(first);
        // Once the first is dropped, init must succeed again.
        let third = InputSubsystem::init(InputConfig::default());
        assert!(third.is_ok());
    }

    #[test]
    fn coalescing_enabled_collapses_to_the_last_event() {
        let sys = InputSubsystem::init(InputConfig {
            ring_capacity: 256,
            coalesce: true,
            text_buffer_capacity: 32,
        })
        .unwrap();

        for i in 0..100u64 {
            sys.receive_event(InputEvent::Mouse {
                detail: MouseDetail::Move,
                timestamp: i,
                record: MouseRecord { x: i as f32, y: 0.0, dx: 0.0, dy: 0.0, button: None },
            });
        }

        let mut seen = Vec::new();
        sys.update(Some(&mut |event: &InputEvent| seen.push(event.timestamp())));

        assert_eq!(seen, vec![99], "coalescing must collapse to exactly the last event");
    }

    #[test]
    fn coalescing_disabled_delivers_every_event_up_to_ring_capacity() {
        let sys = InputSubsystem::init(InputConfig {
            ring_capacity: 256,
            coalesce: false,
            text_buffer_capacity: 32,
        })
        .unwrap();

        for i in 0..100u64 {
            sys.receive_event(InputEvent::Mouse {
                detail: MouseDetail::Move,
                timestamp: i,
                record: MouseRecord { x: i as f32, y: 0.0, dx: 0.0, dy: 0.0, button: None },
            });
        }

        let mut seen = Vec::new();
        sys.update(Some(&mut |event: &InputEvent| seen.push(event.timestamp())));
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn keyboard_updates_last_key_and_button_state() {
        let sys = InputSubsystem::init(InputConfig::default()).unwrap();
        sys.receive_event(InputEvent::Keyboard {
            detail: KeyboardDetail::KeyDown,
            timestamp: 1,
            record: KeyboardRecord { key: 65 },
        });
        sys.update(None);
        let snap = sys.snapshot();
        assert_eq!(snap.last_key, Some(65));
        assert!(sys.is_button_down(EventType::Keyboard, 65));
    }

    #[test]
    fn text_buffer_drops_newest_when_full() {
        let sys = InputSubsystem::init(InputConfig {
            ring_capacity: 64,
            coalesce: true,
            text_buffer_capacity: 2,
        })
        .unwrap();
        for ch in ['a', 'b', 'c'] {
            sys.receive_event(InputEvent::Text {
                detail: TextDetail::Char,
                timestamp: 0,
                record: TextRecord { ch },
            });
        }
        sys.update(None);
        assert_eq!(sys.take_text_input(), "ab");
    }

    #[test]
    fn text_done_replaces_last_character() {
        let sys = InputSubsystem::init(InputConfig::default()).unwrap();
        sys.receive_event(InputEvent::Text {
            detail: TextDetail::Char,
            timestamp: 0,
            record: TextRecord { ch: 'a' },
        });
        sys.receive_event(InputEvent::Text {
            detail: TextDetail::Done,
            timestamp: 1,
            record: TextRecord { ch: 'z' },
        });
        sys.update(None);
        assert_eq!(sys.take_text_input(), "z");
    }
}
