//! WS2812 output on an RP2040/RP2350 PIO state machine fed by DMA.
//!
//! One [`Ws2812Program`] is loaded per PIO block and shared by up to four [`PioRunOutput`]s, one per
//! state machine. Each output consumes words from [`PioWordEncoder`](crate::encoder::PioWordEncoder).

use core::pin::pin;

use embassy_rp::Peri;
use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::dma::{AnyChannel, Channel};
use embassy_rp::pio::{
    Common, Config, FifoJoin, Instance, LoadedProgram, PioPin, ShiftConfig, ShiftDirection,
    StateMachine,
};
use embassy_time::{Duration, Timer};
use fixed::types::U24F8;

use crate::output::{RunOutput, TimerDelay, TransmitOutcome, WaitPolicy, wait_done_with_retry};

// Cycles of each phase of one bit; 10 cycles per bit at 8 MHz gives 800 kbit/s.
const T1: u8 = 2;
const T2: u8 = 5;
const T3: u8 = 3;
const CYCLES_PER_BIT: u32 = (T1 + T2 + T3) as u32;

/// Line held low after a frame so the LEDs latch it.
pub const RESET_LATCH: Duration = Duration::from_micros(55);

/// Time to shift out one pixel (24 bits at 800 kbit/s).
pub const PIXEL_TIME: Duration = Duration::from_micros(30);

/// The WS2812 bit-timing program, loaded once into a PIO block's instruction memory.
pub struct Ws2812Program<'d, PIO: Instance> {
    program: LoadedProgram<'d, PIO>,
}

impl<'d, PIO: Instance> Ws2812Program<'d, PIO> {
    /// Assemble the program and load it into `common`.
    pub fn new(common: &mut Common<'d, PIO>) -> Self {
        let side_set = ::pio::SideSet::new(false, 1, false);
        let mut assembler: ::pio::Assembler<32> = ::pio::Assembler::new_with_side_set(side_set);

        let mut wrap_target = assembler.label();
        let mut wrap_source = assembler.label();
        let mut do_zero = assembler.label();
        assembler.set_with_side_set(::pio::SetDestination::PINDIRS, 1, 0);
        assembler.bind(&mut wrap_target);
        // Do stop bit
        assembler.out_with_delay_and_side_set(::pio::OutDestination::X, 1, T3 - 1, 0);
        // Do start bit
        assembler.jmp_with_delay_and_side_set(
            ::pio::JmpCondition::XIsZero,
            &mut do_zero,
            T1 - 1,
            1,
        );
        // Do data bit = 1
        assembler.jmp_with_delay_and_side_set(
            ::pio::JmpCondition::Always,
            &mut wrap_target,
            T2 - 1,
            1,
        );
        assembler.bind(&mut do_zero);
        // Do data bit = 0
        assembler.nop_with_delay_and_side_set(T2 - 1, 0);
        assembler.bind(&mut wrap_source);

        let assembled = assembler.assemble_with_wrap(wrap_source, wrap_target);
        Self {
            program: common.load_program(&assembled),
        }
    }
}

/// One channel driven by PIO state machine `SM` of `PIO`.
pub struct PioRunOutput<'d, PIO: Instance, const SM: usize> {
    state_machine: StateMachine<'d, PIO, SM>,
    dma: Peri<'d, AnyChannel>,
}

impl<'d, PIO: Instance, const SM: usize> PioRunOutput<'d, PIO, SM> {
    /// Configure `state_machine` to run `program` on `pin`, fed from `dma`.
    pub fn new(
        common: &mut Common<'d, PIO>,
        mut state_machine: StateMachine<'d, PIO, SM>,
        dma: Peri<'d, impl Channel>,
        pin: Peri<'d, impl PioPin>,
        program: &Ws2812Program<'d, PIO>,
    ) -> Self {
        let out_pin = common.make_pio_pin(pin);
        let mut config = Config::default();
        config.set_out_pins(&[&out_pin]);
        config.set_set_pins(&[&out_pin]);
        config.use_program(&program.program, &[&out_pin]);

        config.clock_divider = clock_divider(clk_sys_freq());

        config.fifo_join = FifoJoin::TxOnly;
        config.shift_out = ShiftConfig {
            auto_fill: true,
            threshold: 24,
            direction: ShiftDirection::Left,
        };

        state_machine.set_config(&config);
        state_machine.set_enable(true);

        Self {
            state_machine,
            dma: dma.into(),
        }
    }
}

impl<PIO: Instance, const SM: usize> RunOutput<u32> for PioRunOutput<'_, PIO, SM> {
    async fn transmit(&mut self, words: &[u32]) -> TransmitOutcome {
        let transfer_time = PIXEL_TIME
            .checked_mul(u32::try_from(words.len()).unwrap_or(u32::MAX))
            .unwrap_or(Duration::MAX);
        let policy = WaitPolicy::DEFAULT.with_transfer_time(transfer_time);

        let outcome = {
            let mut transfer = pin!(
                self.state_machine
                    .tx()
                    .dma_push(self.dma.reborrow(), words, false)
            );
            wait_done_with_retry(&mut transfer, &mut TimerDelay, policy).await
        };

        Timer::after(RESET_LATCH).await;
        outcome
    }
}

/// Divider that clocks the state machine at `CYCLES_PER_BIT` cycles per 800 kHz bit.
fn clock_divider(sys_hz: u32) -> U24F8 {
    let clock_khz = U24F8::saturating_from_num(sys_hz.div_euclid(1000));
    let bit_khz = U24F8::from_num(800).saturating_mul_int(CYCLES_PER_BIT);
    clock_khz.checked_div(bit_khz).unwrap_or(U24F8::MAX)
}
