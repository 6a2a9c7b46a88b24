//! PIO interrupt bindings, one per PIO block.

use embassy_rp::bind_interrupts;
#[cfg(feature = "pico2")]
use embassy_rp::peripherals::PIO2;
use embassy_rp::peripherals::{PIO0, PIO1};
use embassy_rp::pio::InterruptHandler;

bind_interrupts!(pub struct Pio0Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

bind_interrupts!(pub struct Pio1Irqs {
    PIO1_IRQ_0 => InterruptHandler<PIO1>;
});

#[cfg(feature = "pico2")]
bind_interrupts!(pub struct Pio2Irqs {
    PIO2_IRQ_0 => InterruptHandler<PIO2>;
});
