#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]
#![allow(clippy::future_not_send, reason = "single-threaded")]

//! Three 20-pixel runs on GPIO 12, 13 and 14, fed over UDP on a Pico W.
//!
//! Joins the Wi-Fi network named at build time (`WIFI_SSID`, `WIFI_PASSWORD`) with the static
//! address from [`NetworkConfig::DEFAULT`]. Channel `n` listens on port `49600 + n`, status
//! records go to the sender every second, and any datagram on port 49700 restarts the board.
//!
//! The Wi-Fi chip takes PIO0 and DMA channel 0, so the runs use PIO1.

use core::{convert::Infallible, panic};

use cyw43::JoinOptions;
use cyw43_pio::{DEFAULT_CLOCK_DIVIDER, PioSpi};
use embassy_executor::Spawner;
use embassy_net::{Ipv4Address, Ipv4Cidr, Stack, StackResources, StaticConfigV4};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIO0, PIO1};
use embassy_rp::pio::Pio;
use embassy_time::{Duration, Ticker, Timer};
use heapless::Vec;
use pixel_envoy::{
    Error, Result,
    channel_config::{Channel, ChannelConfig, NetworkConfig},
    control::control_loop,
    encoder::PioWordEncoder,
    frame_assembly::FrameAssembly,
    output::{
        TimerDelay,
        pio::{PioRunOutput, Ws2812Program},
    },
    pio_irqs::{Pio0Irqs, Pio1Irqs},
    receiver::receiver_loop,
    scheduler::{OutputScheduler, SchedulerConfig},
    startup::run_startup_sequence,
    status::status_loop,
};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

const MAX_PIXELS: usize = 20;
const RUNS: ChannelConfig<3> = ChannelConfig::new([
    Channel::new(MAX_PIXELS, 12),
    Channel::new(MAX_PIXELS, 13),
    Channel::new(MAX_PIXELS, 14),
]);
static NETWORK: NetworkConfig = NetworkConfig::DEFAULT;

static ASSEMBLY: FrameAssembly<3, MAX_PIXELS> = FrameAssembly::new(RUNS);

const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
    Some(ssid) => ssid,
    None => "pixel-envoy",
};
const WIFI_PASSWORD: &str = match option_env!("WIFI_PASSWORD") {
    Some(password) => password,
    None => "",
};

type Outputs = (
    PioRunOutput<'static, PIO1, 0>,
    PioRunOutput<'static, PIO1, 1>,
    PioRunOutput<'static, PIO1, 2>,
);
type Scheduler =
    OutputScheduler<'static, PioWordEncoder, Outputs, TimerDelay, 3, MAX_PIXELS, MAX_PIXELS>;
type WifiSpi = PioSpi<'static, PIO0, 0, DMA_CH0>;

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());
    NETWORK.validate(&RUNS)?;

    // Outputs first, so the startup flash runs while Wi-Fi joins.
    let Pio {
        mut common,
        sm0,
        sm1,
        sm2,
        ..
    } = Pio::new(p.PIO1, Pio1Irqs);
    let program = Ws2812Program::new(&mut common);
    let outputs = (
        PioRunOutput::new(&mut common, sm0, p.DMA_CH1, p.PIN_12, &program),
        PioRunOutput::new(&mut common, sm1, p.DMA_CH2, p.PIN_13, &program),
        PioRunOutput::new(&mut common, sm2, p.DMA_CH3, p.PIN_14, &program),
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

    // Wi-Fi chip on the Pico W's fixed pins.
    let power = Output::new(p.PIN_23, Level::Low);
    let chip_select = Output::new(p.PIN_25, Level::High);
    let mut wifi_pio = Pio::new(p.PIO0, Pio0Irqs);
    let spi = PioSpi::new(
        &mut wifi_pio.common,
        wifi_pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        wifi_pio.irq0,
        chip_select,
        p.PIN_24,
        p.PIN_29,
        p.DMA_CH0,
    );
    static WIFI_STATE: StaticCell<cyw43::State> = StaticCell::new();
    let wifi_state = WIFI_STATE.init(cyw43::State::new());
    let (net_device, mut control, wifi_runner) =
        cyw43::new(wifi_state, power, spi, cyw43_firmware::CYW43_43439A0).await;
    spawner.spawn(wifi_task(wifi_runner)).map_err(Error::TaskSpawn)?;
    control.init(cyw43_firmware::CYW43_43439A0_CLM).await;
    control
        .set_power_management(cyw43::PowerManagementMode::None)
        .await;

    let [a, b, c, d] = NETWORK.address;
    let config = embassy_net::Config::ipv4_static(StaticConfigV4 {
        address: Ipv4Cidr::new(Ipv4Address::new(a, b, c, d), 24),
        gateway: None,
        dns_servers: Vec::new(),
    });
    static RESOURCES: StaticCell<StackResources<6>> = StaticCell::new();
    static STACK: StaticCell<Stack<'static>> = StaticCell::new();
    let (stack, net_runner) = embassy_net::new(
        net_device,
        config,
        RESOURCES.init(StackResources::new()),
        0x5EED_F00D_u64,
    );
    let stack = &*STACK.init(stack);
    spawner.spawn(net_task(net_runner)).map_err(Error::TaskSpawn)?;

    while let Err(err) = control
        .join(WIFI_SSID, JoinOptions::new(WIFI_PASSWORD.as_bytes()))
        .await
    {
        defmt::warn!("join failed with status {}; retrying", err.status);
        Timer::after_secs(1).await;
    }
    stack.wait_config_up().await;
    defmt::info!("network up at {}", NETWORK.address);

    for channel in RUNS.channels() {
        let port = NETWORK
            .channel_port(channel.index())
            .ok_or(Error::PortOutOfRange {
                channel: channel.index(),
            })?;
        spawner
            .spawn(receiver_task(stack, channel.index(), port))
            .map_err(Error::TaskSpawn)?;
    }
    spawner.spawn(status_task(stack)).map_err(Error::TaskSpawn)?;
    if let Some(port) = NETWORK.control_port() {
        spawner
            .spawn(control_task(stack, port))
            .map_err(Error::TaskSpawn)?;
    }

    let mut ticker = Ticker::every(Duration::from_secs(10));
    loop {
        ticker.next().await;
        defmt::info!("link up: {}", stack.is_link_up());
    }
}

#[embassy_executor::task]
async fn output_task(mut scheduler: Scheduler) -> ! {
    run_startup_sequence(RUNS.len(), &mut scheduler).await;
    scheduler.run().await
}

#[embassy_executor::task]
async fn wifi_task(runner: cyw43::Runner<'static, Output<'static>, WifiSpi>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

#[embassy_executor::task(pool_size = 3)]
async fn receiver_task(stack: &'static Stack<'static>, channel: usize, port: u16) -> ! {
    let Err(err) = receiver_loop(stack, &ASSEMBLY, channel, port).await;
    panic!("{err}");
}

#[embassy_executor::task]
async fn status_task(stack: &'static Stack<'static>) -> ! {
    let Err(err) = status_loop(stack, &ASSEMBLY, &NETWORK).await;
    panic!("{err}");
}

#[embassy_executor::task]
async fn control_task(stack: &'static Stack<'static>, port: u16) -> ! {
    let Err(err) = control_loop(stack, port).await;
    panic!("{err}");
}
