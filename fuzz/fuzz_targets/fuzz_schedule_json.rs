//! Fuzz target: schedule document parsing
//!
//! Feeds arbitrary text through `parse_schedule_json` and loads whatever
//! parses into a `ScheduleStore`.  The store must come out sorted and
//! within capacity, and a midnight re-arm must leave only invalid slots
//! flagged.
//!
//! cargo fuzz run fuzz_schedule_json

#![no_main]

use libfuzzer_sys::fuzz_target;
use petfeeder::schedule::{parse_schedule_json, ScheduleStore, MAX_ENTRIES};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(items) = parse_schedule_json(text) else {
        return;
    };

    let mut store = ScheduleStore::new();
    store.load(items);
    assert!(store.len() <= MAX_ENTRIES);
    assert!(store
        .entries()
        .windows(2)
        .all(|w| w[0].time_of_day <= w[1].time_of_day));

    store.reset_dispense_status(0);
    for e in store.entries() {
        assert_eq!(e.dispensed_today, !e.is_valid());
    }
});
