#![allow(missing_docs)]
//! One producer thread per channel and a reader racing them over a shared assembly.

use std::sync::Barrier;
use std::thread;

use pixel_envoy::{
    channel_config::{Channel, ChannelConfig},
    frame_assembly::{Admission, FrameAssembly, FrameId, FramePixels},
    telemetry::Counters,
};

const RUNS: ChannelConfig<3> = ChannelConfig::new([
    Channel::new(16, 2),
    Channel::new(8, 3),
    Channel::new(12, 4),
]);
const FRAMES: u32 = 300;

fn shade(frame_id: u32) -> u8 {
    u8::try_from(frame_id % 251).unwrap()
}

#[test]
fn readers_never_see_a_torn_frame() {
    let assembly = FrameAssembly::<3, 16>::new(RUNS);
    let barrier = Barrier::new(RUNS.len());

    let seen = thread::scope(|scope| {
        for channel in RUNS.channels() {
            let (assembly, barrier) = (&assembly, &barrier);
            scope.spawn(move || {
                for frame_id in 1..=FRAMES {
                    let mut packet = frame_id.to_be_bytes().to_vec();
                    packet.resize(packet.len() + channel.pixel_bytes(), shade(frame_id));
                    assembly.submit(channel.index(), &packet);
                    barrier.wait();
                }
            });
        }

        let reader = scope.spawn(|| {
            let mut pixels: FramePixels<3, 16> = [[[0; 3]; 16]; 3];
            let mut last: Option<FrameId> = None;
            let mut seen = Vec::new();
            while last.is_none_or(|id| id.get() < FRAMES) {
                let Some(frame_id) = assembly.copy_newest_complete(last, &mut pixels) else {
                    thread::yield_now();
                    continue;
                };
                for channel in RUNS.channels() {
                    let run = &pixels[channel.index()][..channel.pixel_count()];
                    assert!(
                        run.as_flattened().iter().all(|byte| *byte == shade(frame_id.get())),
                        "frame {} channel {} mixes frames",
                        frame_id.get(),
                        channel.index()
                    );
                }
                seen.push(frame_id.get());
                last = Some(frame_id);
            }
            seen
        });

        reader.join().unwrap()
    });

    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(seen.last(), Some(&FRAMES));
    assert_eq!(
        assembly.telemetry().take(),
        Counters {
            received: 3 * FRAMES,
            completed: FRAMES,
            applied: 0,
            dropped: 0,
        }
    );
}

#[test]
fn interleaved_channels_complete_every_frame_once() {
    let assembly = FrameAssembly::<3, 16>::new(RUNS);
    let barrier = Barrier::new(RUNS.len());

    let completions: u32 = thread::scope(|scope| {
        let handles: Vec<_> = RUNS
            .channels()
            .iter()
            .map(|channel| {
                let (assembly, barrier) = (&assembly, &barrier);
                scope.spawn(move || {
                    let mut completed = 0;
                    for frame_id in 1..=FRAMES {
                        let mut packet = frame_id.to_be_bytes().to_vec();
                        packet.resize(packet.len() + channel.pixel_bytes(), 0);
                        if let Admission::Accepted {
                            completed: true,
                            ..
                        } = assembly.submit(channel.index(), &packet)
                        {
                            completed += 1;
                        }
                        barrier.wait();
                    }
                    completed
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).sum()
    });

    assert_eq!(completions, FRAMES);
    assert_eq!(
        assembly.newest_complete_frame_id().map(FrameId::get),
        Some(FRAMES)
    );
}
