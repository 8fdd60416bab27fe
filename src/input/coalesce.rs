//! The mutex-protected coalescing slot: movement-type events
//! (`Joystick.StickChange`, `Mouse.Move`, `Touch.Move`) are held here,
//! keyed by `(type, detail, device, index/id)`, instead of being written
//! straight into the ring.
//!
//! The coalescing key is deliberately asymmetric: a single mouse pointer
//! shares one slot regardless of device, a joystick slot is keyed by
//! device+stick index, and a touch slot is keyed by touch id.

use std::sync::Mutex;

use super::event::{InputEvent, JoystickDetail, MouseDetail, TouchDetail};
use super::ring::RingBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoalesceKey {
    tag: u8,
    device: u32,
    sub_id: u32,
}

impl CoalesceKey {
    fn for_event(event: &InputEvent) -> Option<CoalesceKey> {
        match event {
            InputEvent::Joystick {
                detail: JoystickDetail::StickChange,
                record,
                ..
            } => Some(CoalesceKey {
                tag: 0,
                device: record.device,
                sub_id: record.index,
            }),
            InputEvent::Mouse {
                detail: MouseDetail::Move,
                ..
            } => Some(CoalesceKey {
                tag: 1,
                device: 0,
                sub_id: 0,
            }),
            InputEvent::Touch {
                detail: TouchDetail::Move,
                record,
                ..
            } => Some(CoalesceKey {
                tag: 2,
                device: 0,
                sub_id: record.id,
            }),
            _ => None,
        }
    }
}

pub struct CoalesceSlot {
    pending: Mutex<Option<(CoalesceKey, InputEvent)>>,
}

impl CoalesceSlot {
    pub fn new() -> Self {
        CoalesceSlot {
            pending: Mutex::new(None),
        }
    }

    /// Offer `event` for coalescing. Non-movement events bypass the slot
    /// entirely and come back out unchanged, for the caller to push
    /// straight into `ring`. A movement event with the same key as
    /// whatever's already pending overwrites it in place; a different key
    /// flushes the old occupant into `ring` first.
    ///
    /// Returns `Some(event)` when the caller still needs to push it
    /// (bypass case), `None` when this call has fully handled it.
    pub fn offer(&self, event: InputEvent, ring: &RingBuffer) -> Option<InputEvent> {
        let key = CoalesceKey::for_event(&event)?;
        let mut pending = self.pending.lock().unwrap();
        match pending.take() {
            Some((previous_key, _previous_event)) if previous_key == key => {
                *pending = Some((key, event));
            }
            Some((_, previous_event)) => {
                if !ring.push(previous_event) {
                    log::warn!("input ring buffer full, dropping flushed coalesced event");
                }
                *pending = Some((key, event));
            }
            None => {
                *pending = Some((key, event));
            }
        }
        None
    }

    pub fn flush(&self, ring: &RingBuffer) {
        let mut pending = self.pending.lock().unwrap();
        if let Some((_, event)) = pending.take() {
            if !ring.push(event) {
                log::warn!("input ring buffer full, dropping flushed coalesced event");
            }
        }
    }
}

impl Default for CoalesceSlot {
    fn default() -> Self {
        Self::new()
    }
}
