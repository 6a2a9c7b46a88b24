#![allow(missing_docs)]
//! Configuration errors as an application would report them.

use pixel_envoy::{
    Error,
    channel_config::{
        Channel, ChannelConfig, MAX_PIXELS_PER_CHANNEL, NetworkConfig, PORT_BASE_DEFAULT, Side,
    },
};

#[test]
fn errors_name_the_offending_channel() {
    let err = ChannelConfig::try_new([
        Channel::new(20, 12),
        Channel::new(MAX_PIXELS_PER_CHANNEL + 1, 13),
    ])
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "channel 1 has 401 pixels; expected 1..=400"
    );

    let err = ChannelConfig::try_new([Channel::new(20, 200)]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "channel 0 uses GPIO 200, which the board does not have"
    );
}

#[test]
fn largest_layout_is_accepted() {
    let config = ChannelConfig::try_new([Channel::new(MAX_PIXELS_PER_CHANNEL, 0); 32]).unwrap();
    assert_eq!(config.total_pixels(), 32 * MAX_PIXELS_PER_CHANNEL);
    assert_eq!(config.max_pixel_count(), MAX_PIXELS_PER_CHANNEL);
    assert_eq!(config.channel(31).map(Channel::index), Some(31));
    assert!(config.channel(32).is_none());
}

#[test]
fn control_port_may_not_shadow_a_channel() {
    let channels = ChannelConfig::new([Channel::new(4, 0), Channel::new(4, 1), Channel::new(4, 2)]);
    let network = NetworkConfig {
        side: Side::Right,
        control_port_offset: 2,
        ..NetworkConfig::DEFAULT
    };
    assert_eq!(network.control_port(), Some(PORT_BASE_DEFAULT + 2));
    let err = network.validate(&channels).unwrap_err();
    assert!(matches!(err, Error::PortOutOfRange { channel: 2 }));
    assert_eq!(
        err.to_string(),
        "channel 2 has no valid UDP port above the port base"
    );
}
