//! End-to-end: wire bytes through the link into the snapshot, and
//! configuration persistence over arbitrary valid settings.

use evdash_core::config::{LinkConfig, SkipRuleConfig, MAX_CONFIG_SIZE};
use evdash_core::{LinkStatus, ReceiverConfig, TelemetryLink};
use evdash_hal::SliceSource;
use evdash_protocol::{encode_frame, FieldId, FieldUpdate, MAX_SKIP_RULES};
use proptest::prelude::*;

fn arb_update() -> impl Strategy<Value = FieldUpdate> {
    prop_oneof![
        any::<u8>().prop_map(FieldUpdate::StateOfCharge),
        any::<u16>().prop_map(|volts_x100| FieldUpdate::Voltage { volts_x100 }),
        any::<u16>().prop_map(|kmh_x10| FieldUpdate::Speed { kmh_x10 }),
        any::<u16>().prop_map(|km_x10| FieldUpdate::Trip { km_x10 }),
        any::<u32>().prop_map(|km_x10| FieldUpdate::Odometer { km_x10 }),
    ]
}

fn arb_rule() -> impl Strategy<Value = SkipRuleConfig> {
    (any::<u8>(), any::<u8>(), 1u8..=4).prop_map(|(a, b, width)| SkipRuleConfig {
        first: a.min(b),
        last: a.max(b),
        width,
    })
}

fn arb_config() -> impl Strategy<Value = ReceiverConfig> {
    (
        1u32..=1_000_000,
        1u32..10_000,
        1u32..10_000,
        1u8..=4,
        prop::collection::vec(arb_rule(), 0..=MAX_SKIP_RULES),
    )
        .prop_map(|(baudrate, idle, extra, default_skip_width, rules)| {
            let mut config = ReceiverConfig {
                link: LinkConfig {
                    baudrate,
                    idle_reset_ms: idle,
                    stale_after_ms: idle + extra,
                },
                ..ReceiverConfig::default()
            };
            config.decoder.default_skip_width = default_skip_width;
            config.decoder.skip_rules.clear();
            for rule in rules {
                config.decoder.skip_rules.push(rule).unwrap();
            }
            config
        })
}

proptest! {
    #[test]
    fn prop_snapshot_holds_last_value(
        frames in prop::collection::vec(prop::collection::vec(arb_update(), 3..10), 1..6)
    ) {
        let mut stream = Vec::new();
        for updates in &frames {
            stream.extend_from_slice(&encode_frame([0, 0, 0], updates).unwrap());
        }

        let mut link: TelemetryLink<_> =
            TelemetryLink::new(SliceSource::new(&stream), &ReceiverConfig::default()).unwrap();
        let report = link.service(1).unwrap();
        prop_assert_eq!(report.batches, frames.len());
        prop_assert_eq!(report.status, LinkStatus::Live);

        let snapshot = link.snapshot();
        for id in FieldId::ALL {
            let last = frames.iter().flatten().filter(|u| u.id() == id).last().copied();
            prop_assert_eq!(snapshot.get(id), last);
        }
    }

    #[test]
    fn prop_config_binary_roundtrip(config in arb_config()) {
        prop_assert_eq!(config.validate(), Ok(()));

        let mut buf = [0u8; MAX_CONFIG_SIZE];
        let len = config.to_bytes(&mut buf).unwrap().len();
        prop_assert_eq!(ReceiverConfig::from_bytes(&buf[..len]).unwrap(), config);
    }
}
