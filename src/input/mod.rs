//! The input-event ring buffer and coalescing slot, and the subsystem
//! handle that wires them up for producers (platform input backends) and
//! consumers (the `update` polling call).

mod coalesce;
mod event;
mod ring;
mod subsystem;

pub use event::{
    ButtonCode, DeviceId, EventType, InputEvent, JoystickDetail, JoystickRecord, KeyCode,
    KeyboardDetail, KeyboardRecord, MemoryDetail, MemoryRecord, MouseDetail, MouseRecord,
    TextDetail, TextRecord, TouchDetail, TouchId, TouchRecord,
};
pub use ring::RingBuffer;
pub use subsystem::{InputConfig, InputSnapshot, InputSubsystem, TouchPoint};
