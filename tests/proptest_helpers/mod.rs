#![allow(dead_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use rawbids::bids::BidsEntities;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// A valid entity label.
pub fn arb_label() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,8}"
}

/// A label with at least one character that is not allowed.
pub fn arb_bad_label() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{0,4}[-_ ./]{1}[A-Za-z0-9]{0,4}"
}

/// A suffix such as `meg`, `eeg.vhdr` or `channels.tsv`.
pub fn arb_suffix() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("meg"), Just("eeg"), Just("ieeg"), Just("events"), Just("channels")],
        prop::option::of("[a-z]{2,4}"),
    )
        .prop_map(|(kind, ext)| match ext {
            Some(ext) => format!("{}.{}", kind, ext),
            None => kind.to_string(),
        })
}

/// A complete identifier set with every optional entity independently present or absent.
pub fn arb_entities() -> impl Strategy<Value = BidsEntities> {
    (
        arb_label(),
        prop::option::of(arb_label()),
        prop::option::of(arb_label()),
        prop::option::of(arb_label()),
        prop::option::of(arb_label()),
        arb_suffix(),
    )
        .prop_map(|(subject, session, task, acquisition, run, suffix)| BidsEntities {
            subject: Some(subject),
            session,
            task,
            acquisition,
            run,
            suffix,
        })
}
