//! End-to-end composition scenarios against the public API.

use ostinato_core::types::time::time;
use ostinato_core::types::{parse, resolve_deferred, span_cycles, PatternBuilder};

#[test]
fn parse_is_total_and_left_to_right() {
    let events = parse("bd sn bd sn");
    assert_eq!(events.len(), 4);
    let times: Vec<_> = events.iter().map(|e| e.time).collect();
    assert_eq!(
        times,
        vec![time(0, 4), time(1, 4), time(2, 4), time(3, 4)]
    );
    assert!(parse("").is_empty());
}

#[test]
fn two_bar_pattern_folds_over_cycles() {
    // bar one: four on the floor, bar two: reversed snares
    let pattern = PatternBuilder::from_source("bd*4")
        .append(PatternBuilder::from_source("sn sn ~ sn").rev());
    let events = pattern.resolve();

    assert_eq!(span_cycles(&events), 2);
    let first_bar: Vec<_> = events.iter().filter(|e| e.cycle() == 0).collect();
    let second_bar: Vec<_> = events.iter().filter(|e| e.cycle() == 1).collect();
    assert_eq!(first_bar.len(), 4);
    assert_eq!(second_bar.len(), 3);
    assert!(second_bar.iter().all(|e| e.sample == "sn"));
}

#[test]
fn layered_pattern_with_parameters_and_variation() {
    let bass = PatternBuilder::from_source("bass ~ bass ~")
        .note("c2 g2")
        .gain(0.9);
    let hats = PatternBuilder::from_source("hh*4")
        .lpf(6000.0)
        .every(2, |p| p.fast(2.0));
    let pattern = PatternBuilder::stack(vec![bass.into(), hats.into()]);
    let resolved = pattern.resolve();
    assert_eq!(resolved.len(), 6);

    // bass events carry their bound notes and gain
    let bass_events: Vec<_> = resolved.iter().filter(|e| e.sample == "bass").collect();
    assert_eq!(bass_events.len(), 2);
    assert_eq!(bass_events[0].musical["note"], 36.0);
    assert_eq!(bass_events[1].musical["note"], 43.0);
    assert!(bass_events.iter().all(|e| e.gain == Some(0.9)));

    // the hat variation compresses each hat only on even cycles
    let on_even = resolve_deferred(&resolved, 0);
    let on_odd = resolve_deferred(&resolved, 1);
    assert!(on_even
        .iter()
        .filter(|e| e.sample == "hh")
        .all(|e| e.duration == time(1, 8)));
    assert!(on_odd
        .iter()
        .filter(|e| e.sample == "hh")
        .all(|e| e.duration == time(1, 4)));
}

#[test]
fn structure_borrows_rhythm_only() {
    let pattern = PatternBuilder::structure("x ~ ~ x ~ x ~ ~", "bd sn hh");
    let events = pattern.resolve();
    let samples: Vec<_> = events.iter().map(|e| e.sample.as_str()).collect();
    assert_eq!(samples, vec!["bd", "sn", "hh"]);
    assert_eq!(events[1].time, time(3, 8));
    assert!(events.iter().all(|e| e.duration == time(1, 8)));
    assert_eq!(span_cycles(&events), 1);
}
