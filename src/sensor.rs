use crate::{Device, Error, IoWire, OneWireBus};
use embedded_hal::delay::DelayNs;

/// Trigger/wait/read seam for 1-Wire sensors, so a host loop can poll
/// mixed sensor types uniformly.
pub trait Sensor: Device {
    /// returns the milliseconds required to wait until the measurement finished
    fn start_measurement<W: IoWire>(
        &self,
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<u16, Error<W::Error>>;

    /// returns the measured value
    fn read_measurement<W: IoWire>(
        &self,
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<f32, Error<W::Error>>;

    fn read_measurement_raw<W: IoWire>(
        &self,
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<u16, Error<W::Error>>;
}
