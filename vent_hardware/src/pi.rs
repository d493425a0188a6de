//! Raspberry Pi peripherals (rppal) behind the `hardware` feature.
//!
//! - Hardware PWM channels drive the fans.
//! - Tach edges arrive through a GPIO falling-edge interrupt; the callback
//!   gets a monotonic microsecond timestamp and forwards it to whatever
//!   capture logic the caller supplies, keeping this crate core-free.
//! - The control dial reads through an MCP3008 on SPI0 (the Pi has no
//!   on-chip ADC).
//! - Enable switches are active-low inputs with pull-ups.
//! - `/dev/watchdog` provides the external watchdog.

use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::time::Instant;

use rppal::gpio::{Gpio, Trigger};
use rppal::pwm::{Channel, Polarity, Pwm};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::trace;

use crate::error::{HwError, Result};
use vent_traits::{AdcInput, PwmOutput, SwitchInput, Watchdog};

/// PWM frequency for fan drive outputs.
const PWM_HZ: f64 = 25_000.0;

/// Hardware PWM fan output.
pub struct PiPwm {
    pwm: Pwm,
}

impl PiPwm {
    pub fn new(channel: u8) -> Result<Self> {
        let channel = match channel {
            0 => Channel::Pwm0,
            _ => Channel::Pwm1,
        };
        let pwm = Pwm::with_frequency(channel, PWM_HZ, 0.0, Polarity::Normal, true)
            .map_err(|e| HwError::Pwm(e.to_string()))?;
        Ok(Self { pwm })
    }
}

impl PwmOutput for PiPwm {
    fn set_duty(&mut self, duty: u16) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        let cycle = f64::from(duty) / f64::from(u16::MAX);
        self.pwm
            .set_duty_cycle(cycle)
            .map_err(|e| Box::new(HwError::Pwm(e.to_string())) as _)
    }
}

/// GPIO falling-edge tach input. Holding the struct keeps the async
/// interrupt registered; dropping it unhooks the pin.
pub struct PiEdgeInput {
    _pin: rppal::gpio::InputPin,
}

impl PiEdgeInput {
    /// `on_edge` runs in the interrupt thread with a monotonic microsecond
    /// timestamp; it must not block.
    pub fn new(pin: u8, mut on_edge: impl FnMut(u64) + Send + 'static) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pin = gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input_pullup();
        let origin = Instant::now();
        pin.set_async_interrupt(Trigger::FallingEdge, move |_level| {
            on_edge(origin.elapsed().as_micros() as u64);
        })
        .map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self { _pin: pin })
    }
}

/// MCP3008 10-bit ADC on SPI0, scaled up to the 16-bit sample range.
pub struct Mcp3008 {
    spi: Spi,
    channel: u8,
}

impl Mcp3008 {
    pub fn new(channel: u8) -> Result<Self> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, 1_350_000, Mode::Mode0)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self {
            spi,
            channel: channel & 7,
        })
    }
}

impl AdcInput for Mcp3008 {
    fn read_u16(&mut self) -> std::result::Result<u16, Box<dyn Error + Send + Sync>> {
        // Start bit, single-ended channel select, one clock byte.
        let tx = [1u8, (8 | self.channel) << 4, 0];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| Box::new(HwError::Spi(e.to_string())) as Box<dyn Error + Send + Sync>)?;
        let raw10 = (u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]);
        trace!(raw10, "mcp3008 sample");
        Ok(raw10 << 6)
    }
}

/// Active-low enable switch with the internal pull-up.
pub struct PiSwitch {
    pin: rppal::gpio::InputPin,
}

impl PiSwitch {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input_pullup();
        Ok(Self { pin })
    }
}

impl SwitchInput for PiSwitch {
    fn is_on(&mut self) -> std::result::Result<bool, Box<dyn Error + Send + Sync>> {
        Ok(self.pin.is_low())
    }
}

/// `/dev/watchdog` feeder. The kernel resets the board if feeds stop.
pub struct PiWatchdog {
    dev: File,
}

impl PiWatchdog {
    pub fn open() -> Result<Self> {
        let dev = OpenOptions::new().write(true).open("/dev/watchdog")?;
        Ok(Self { dev })
    }
}

impl Watchdog for PiWatchdog {
    fn feed(&mut self) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        self.dev
            .write_all(b"1")
            .map_err(|e| Box::new(HwError::Io(e)) as _)
    }
}
