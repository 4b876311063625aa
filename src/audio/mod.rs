//! Audio subsystem module

pub mod buffer;
pub mod clock;
pub mod device;
pub mod format;
pub mod manual;
#[cfg(feature = "playback")]
pub mod output;
pub mod seek;

pub use buffer::{BufferQueue, SampleBuffer};
pub use clock::{PlaybackClock, SharedClock};
pub use device::{CompletionHandler, OutputDevice, OutputDeviceInfo};
#[cfg(feature = "playback")]
pub use device::{find_output_device, list_output_devices};
pub use format::{AudioFormat, SampleFormat};
pub use manual::{DeviceEvent, ManualOutput};
#[cfg(feature = "playback")]
pub use output::{CpalOutput, OutputStats};
pub use seek::{PlannedBuffer, SeekPlan, SeekPoint};
