#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]

//! Three 20-pixel runs on GPIO 12, 13 and 14 driven from PIO0.
//!
//! A local task stands in for the UDP sender: it submits a moving dot on every run at about
//! 30 frames per second. The output task runs the startup flash, then the transmit loop.

use core::{convert::Infallible, panic};

use embassy_executor::Spawner;
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::Pio;
use embassy_time::{Duration, Ticker};
use pixel_envoy::{
    Error, Result,
    channel_config::{BYTES_PER_PIXEL, Channel, ChannelConfig},
    encoder::PioWordEncoder,
    frame_assembly::{FRAME_HEADER_LEN, FrameAssembly},
    output::{
        TimerDelay,
        pio::{PioRunOutput, Ws2812Program},
    },
    pio_irqs::Pio0Irqs,
    scheduler::{OutputScheduler, SchedulerConfig},
    startup::run_startup_sequence,
};
use {defmt_rtt as _, panic_probe as _};

const MAX_PIXELS: usize = 20;
const RUNS: ChannelConfig<3> = ChannelConfig::new([
    Channel::new(MAX_PIXELS, 12),
    Channel::new(MAX_PIXELS, 13),
    Channel::new(MAX_PIXELS, 14),
]);

static ASSEMBLY: FrameAssembly<3, MAX_PIXELS> = FrameAssembly::new(RUNS);

type Outputs = (
    PioRunOutput<'static, PIO0, 0>,
    PioRunOutput<'static, PIO0, 1>,
    PioRunOutput<'static, PIO0, 2>,
);
type Scheduler =
    OutputScheduler<'static, PioWordEncoder, Outputs, TimerDelay, 3, MAX_PIXELS, MAX_PIXELS>;

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());

    let Pio {
        mut common,
        sm0,
        sm1,
        sm2,
        ..
    } = Pio::new(p.PIO0, Pio0Irqs);
    let program = Ws2812Program::new(&mut common);
    let outputs = (
        PioRunOutput::new(&mut common, sm0, p.DMA_CH0, p.PIN_12, &program),
        PioRunOutput::new(&mut common, sm1, p.DMA_CH1, p.PIN_13, &program),
        PioRunOutput::new(&mut common, sm2, p.DMA_CH2, p.PIN_14, &program),
    );
    let scheduler = OutputScheduler::new(
        &ASSEMBLY,
        PioWordEncoder,
        outputs,
        TimerDelay,
        SchedulerConfig::DEFAULT,
    );

    spawner
        .spawn(output_task(scheduler))
        .map_err(Error::TaskSpawn)?;
    spawner.spawn(pattern_task()).map_err(Error::TaskSpawn)?;

    let mut ticker = Ticker::every(Duration::from_secs(1));
    loop {
        ticker.next().await;
        defmt::info!("{}", ASSEMBLY.telemetry().take());
    }
}

#[embassy_executor::task]
async fn output_task(mut scheduler: Scheduler) -> ! {
    run_startup_sequence(RUNS.len(), &mut scheduler).await;
    scheduler.run().await
}

#[embassy_executor::task]
async fn pattern_task() -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(33));
    let mut frame_id: u32 = 1;
    let mut packet = [0_u8; FRAME_HEADER_LEN + MAX_PIXELS * BYTES_PER_PIXEL];
    loop {
        for channel in RUNS.channels() {
            let (header, pixels) = packet.split_at_mut(FRAME_HEADER_LEN);
            header.copy_from_slice(&frame_id.to_be_bytes());
            pixels.fill(0);
            let dot = usize::try_from(frame_id)
                .unwrap_or(0)
                .wrapping_add(channel.index().wrapping_mul(5))
                .checked_rem(channel.pixel_count())
                .unwrap_or(0);
            if let Some(pixel) = pixels.chunks_exact_mut(BYTES_PER_PIXEL).nth(dot) {
                pixel.copy_from_slice(&[0, 32, 96]);
            }
            let len = FRAME_HEADER_LEN.saturating_add(channel.pixel_bytes());
            if let Some(bytes) = packet.get(..len) {
                ASSEMBLY.submit(channel.index(), bytes);
            }
        }
        frame_id = frame_id.wrapping_add(1).max(1);
        ticker.next().await;
    }
}
