#![allow(missing_docs)]
//! Host-level tests of the whole pipeline: packets in, encoded runs out.

use embassy_futures::block_on;
use embassy_time::Duration;
use pixel_envoy::{
    channel_config::{Channel, ChannelConfig},
    encoder::{GrbByteEncoder, PulseCode, PulseEncoder},
    frame_assembly::{Admission, FrameAssembly, FrameId, RejectReason},
    output::{
        TransmitOutcome,
        recording::{CountingDelay, RecordingOutput},
    },
    scheduler::{OutputScheduler, SchedulerConfig, StepOutcome},
    startup::{STARTUP_COLOR, run_startup_sequence},
    telemetry::Counters,
};

const RUNS: ChannelConfig<2> = ChannelConfig::new([Channel::new(3, 12), Channel::new(1, 13)]);
const AFTER_GRACE: Duration = Duration::from_secs(2);

type ByteScheduler<'a> =
    OutputScheduler<'a, GrbByteEncoder, [RecordingOutput<u8>; 2], CountingDelay, 2, 3, 9>;

fn packet(frame_id: u32, pixels: &[[u8; 3]]) -> Vec<u8> {
    let mut packet = frame_id.to_be_bytes().to_vec();
    packet.extend(pixels.iter().flatten());
    packet
}

fn byte_scheduler(assembly: &FrameAssembly<2, 3>) -> ByteScheduler<'_> {
    OutputScheduler::new(
        assembly,
        GrbByteEncoder,
        [RecordingOutput::new(), RecordingOutput::new()],
        CountingDelay::default(),
        SchedulerConfig::DEFAULT,
    )
}

fn id(raw: u32) -> FrameId {
    FrameId::new(raw).unwrap()
}

#[test]
fn complete_frame_reaches_every_run_in_grb_order() {
    let assembly = FrameAssembly::new(RUNS);
    let mut scheduler = byte_scheduler(&assembly);

    assembly.submit(0, &packet(7, &[[10, 20, 30], [40, 50, 60], [70, 80, 90]]));
    assert_eq!(
        block_on(scheduler.step(AFTER_GRACE)),
        StepOutcome::Blanked,
        "half a frame is never shown"
    );
    assembly.submit(1, &packet(7, &[[1, 2, 3]]));

    assert_eq!(
        block_on(scheduler.step(AFTER_GRACE)),
        StepOutcome::Applied(id(7))
    );
    let outputs = scheduler.outputs();
    assert_eq!(
        outputs[0].last(),
        Some(&[20, 10, 30, 50, 40, 60, 80, 70, 90][..])
    );
    assert_eq!(outputs[1].last(), Some(&[2, 1, 3][..]));
    assert_eq!(
        assembly.telemetry().take(),
        Counters {
            received: 2,
            completed: 1,
            applied: 1,
            dropped: 0,
        }
    );
}

#[test]
fn late_packets_for_a_shown_frame_are_dropped() {
    let assembly = FrameAssembly::new(RUNS);
    let mut scheduler = byte_scheduler(&assembly);

    for frame_id in [4, 5] {
        assembly.submit(0, &packet(frame_id, &[[frame_id as u8; 3]; 3]));
        assembly.submit(1, &packet(frame_id, &[[frame_id as u8; 3]]));
    }
    assert_eq!(
        block_on(scheduler.step(AFTER_GRACE)),
        StepOutcome::Applied(id(5))
    );

    assert_eq!(
        assembly.submit(1, &packet(4, &[[9; 3]])),
        Admission::Rejected(RejectReason::Stale)
    );
    assert_eq!(block_on(scheduler.step(AFTER_GRACE)), StepOutcome::Idle);
    assert_eq!(scheduler.outputs()[0].transmissions().len(), 1);
}

#[test]
fn malformed_packets_change_nothing_on_the_strips() {
    let assembly = FrameAssembly::new(RUNS);
    let mut scheduler = byte_scheduler(&assembly);

    assembly.submit(0, &packet(1, &[[5; 3]; 3]));
    assembly.submit(1, &packet(1, &[[5; 3]]));
    block_on(scheduler.step(AFTER_GRACE));

    let short = packet(2, &[[6; 3]; 2]);
    assert_eq!(
        assembly.submit(0, &short),
        Admission::Rejected(RejectReason::BadLength {
            expected: 13,
            actual: 10,
        })
    );
    assert_eq!(
        assembly.submit(0, &[0, 0]),
        Admission::Rejected(RejectReason::BadLength {
            expected: 13,
            actual: 2,
        })
    );
    assert_eq!(
        assembly.submit(2, &packet(2, &[[6; 3]])),
        Admission::Rejected(RejectReason::UnknownChannel)
    );
    assert_eq!(
        assembly.submit(1, &packet(0, &[[6; 3]])),
        Admission::Rejected(RejectReason::ReservedFrameId)
    );

    assert_eq!(block_on(scheduler.step(AFTER_GRACE)), StepOutcome::Idle);
    assert_eq!(scheduler.outputs()[0].last(), Some(&[5; 9][..]));
    assert_eq!(assembly.telemetry().take().dropped, 4);
}

#[test]
fn sender_restart_with_wrapped_ids_keeps_playing() {
    let assembly = FrameAssembly::new(RUNS);
    let mut scheduler = byte_scheduler(&assembly);

    for frame_id in [u32::MAX - 1, u32::MAX, 1] {
        assembly.submit(0, &packet(frame_id, &[[3; 3]; 3]));
        assembly.submit(1, &packet(frame_id, &[[3; 3]]));
        assert_eq!(
            block_on(scheduler.step(AFTER_GRACE)),
            StepOutcome::Applied(id(frame_id))
        );
    }
    assert_eq!(assembly.telemetry().peek().applied, 3);
}

#[test_log::test]
fn stuck_run_does_not_hold_back_the_others() {
    let assembly = FrameAssembly::new(RUNS);
    let mut stuck = RecordingOutput::new();
    stuck.fail_next_waits(5);
    let mut scheduler: ByteScheduler<'_> = OutputScheduler::new(
        &assembly,
        GrbByteEncoder,
        [RecordingOutput::new(), stuck],
        CountingDelay::default(),
        SchedulerConfig::DEFAULT,
    );

    assembly.submit(0, &packet(3, &[[1; 3]; 3]));
    assembly.submit(1, &packet(3, &[[2; 3]]));
    assert_eq!(
        block_on(scheduler.step(AFTER_GRACE)),
        StepOutcome::Applied(id(3))
    );

    let outputs = scheduler.outputs();
    assert_eq!(outputs[0].outcomes(), &[TransmitOutcome::Done]);
    assert_eq!(outputs[1].outcomes(), &[TransmitOutcome::TimedOut]);
    assert_eq!(outputs[1].retry_delays(), 5);
    assert_eq!(scheduler.last_applied(), Some(id(3)));
}

#[test]
fn custom_grace_and_startup_flash_then_frames() {
    let assembly = FrameAssembly::new(RUNS);
    let mut scheduler: ByteScheduler<'_> = OutputScheduler::new(
        &assembly,
        GrbByteEncoder,
        [RecordingOutput::new(), RecordingOutput::new()],
        CountingDelay::default(),
        SchedulerConfig {
            poll_interval: Duration::from_millis(5),
            blackout_grace: Duration::from_millis(200),
        },
    );

    block_on(run_startup_sequence(RUNS.len(), &mut scheduler));
    let [green, red, blue] = [STARTUP_COLOR.g, STARTUP_COLOR.r, STARTUP_COLOR.b];
    let first_run = scheduler.outputs()[0].transmissions();
    assert_eq!(
        first_run.first().map(Vec::as_slice),
        Some(&[green, red, blue, green, red, blue, green, red, blue][..])
    );
    assert_eq!(first_run.get(1).map(Vec::as_slice), Some(&[0; 9][..]));
    assert_eq!(
        scheduler.outputs()[1].transmissions().first().map(Vec::as_slice),
        Some(&[0; 3][..]),
        "other runs stay dark while one flashes"
    );

    assembly.submit(0, &packet(1, &[[8; 3]; 3]));
    assembly.submit(1, &packet(1, &[[8; 3]]));
    assert_eq!(
        block_on(scheduler.step(Duration::from_millis(150))),
        StepOutcome::Holding
    );
    assert_eq!(
        block_on(scheduler.step(Duration::from_millis(200))),
        StepOutcome::Applied(id(1))
    );
}

#[test]
fn pulse_backend_emits_one_code_per_bit() {
    const ONE_PIXEL: ChannelConfig<1> = ChannelConfig::new([Channel::new(1, 12)]);
    let assembly = FrameAssembly::<1, 1>::new(ONE_PIXEL);
    let mut scheduler: OutputScheduler<
        '_,
        PulseEncoder,
        [RecordingOutput<PulseCode>; 1],
        CountingDelay,
        1,
        1,
        24,
    > = OutputScheduler::new(
        &assembly,
        PulseEncoder,
        [RecordingOutput::new()],
        CountingDelay::default(),
        SchedulerConfig::DEFAULT,
    );

    assembly.submit(0, &packet(1, &[[0xFF, 0x00, 0x81]]));
    assert_eq!(
        block_on(scheduler.step(AFTER_GRACE)),
        StepOutcome::Applied(id(1))
    );

    let codes = scheduler.outputs()[0].last().unwrap();
    assert_eq!(codes.len(), 24);
    let (green, rest) = codes.split_at(8);
    let (red, blue) = rest.split_at(8);
    assert!(green.iter().all(|code| *code == PulseCode::ZERO));
    assert!(red.iter().all(|code| *code == PulseCode::ONE));
    let blue_bits: Vec<bool> = blue.iter().map(|code| *code == PulseCode::ONE).collect();
    assert_eq!(
        blue_bits,
        [true, false, false, false, false, false, false, true]
    );
}
