//! Core traits and types for cycle-accurate emulation.
//!
//! Everything derives from the master crystal. CPUs count their own cycles
//! while driving the bus; peripherals catch up to the CPU's cycle count.
//! Machines implement [`Bus`] for their memory manager and expose state
//! through [`Observable`] and [`Snapshot`].

mod battery;
mod bus;
mod clock;
mod cpu;
mod error;
mod memory;
mod observable;
mod savestate;
mod snapshot;
mod ticks;
mod video;

pub use battery::{BatteryStore, FileBatteryStore, MemoryBatteryStore};
pub use bus::{Bus, SimpleBus};
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use error::{BatteryError, LoadRomError, SaveStateError};
pub use memory::{AddressInfo, MemoryOperation, MemoryOperationType, MemoryType};
pub use observable::{Observable, Value};
pub use savestate::{begin_load, begin_save, ConsoleId, FORMAT_VERSION, SAVE_STATE_MAGIC};
pub use snapshot::{Serializer, Snapshot, StreamMode};
pub use ticks::Ticks;
pub use video::{FrameInfo, PixelFormat, Rotation, SampleBuffer};
