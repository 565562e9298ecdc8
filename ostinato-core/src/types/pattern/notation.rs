//! Mini-notation parser.
//!
//! The grammar is deliberately flat: whitespace-separated tokens, `~` for a
//! rest, `name*count` for equal repetitions within one token's slot. Each
//! token occupies an equal slice of the cycle in left-to-right order.
//! Parsing is total; malformed input degrades to the emptiest reasonable
//! interpretation instead of failing.

use crate::diag;
use crate::types::event::{Event, REST};
use crate::types::time::Time;

/// Parse a notation string into events confined to one cycle.
///
/// With `k` tokens, token `i` owns the slice `[i/k, (i+1)/k)`. A rest
/// produces no event but still advances the cursor, so the rhythmic
/// position of the following tokens is preserved.
pub fn parse(notation: &str) -> Vec<Event> {
    let tokens: Vec<&str> = notation.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let slice = Time::new(1, tokens.len() as i64);
    let mut events = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let start = slice * i as i64;
        if *token == REST {
            continue;
        }

        match token.split_once('*') {
            Some((name, count)) => {
                let count = repeat_count(token, count);
                if name == REST || name.is_empty() {
                    continue;
                }
                let sub = slice / count;
                for j in 0..count {
                    events.push(Event::new(name, start + sub * j, sub));
                }
            }
            None => events.push(Event::new(*token, start, slice)),
        }
    }

    events
}

/// Repetition count for `name*count`, clamped to at least 1. A non-numeric
/// count defaults to 1 with a warning.
fn repeat_count(token: &str, count: &str) -> i64 {
    match count.parse::<i64>() {
        Ok(n) => n.max(1),
        Err(_) => {
            diag::warn(&format!(
                "non-numeric repeat count in '{}', playing once",
                token
            ));
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::time::time;

    #[test]
    fn test_equal_slices() {
        let events = parse("bd sn bd sn");
        assert_eq!(events.len(), 4);
        for (i, e) in events.iter().enumerate() {
            assert_eq!(e.time, time(i as i64, 4));
            assert_eq!(e.duration, time(1, 4));
        }
        assert_eq!(events[1].sample, "sn");
    }

    #[test]
    fn test_rest_advances_cursor() {
        let events = parse("~ sn");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sample, "sn");
        assert_eq!(events[0].time, time(1, 2));
        assert_eq!(events[0].duration, time(1, 2));
    }

    #[test]
    fn test_repetition() {
        let events = parse("bd*4");
        assert_eq!(events.len(), 4);
        for (i, e) in events.iter().enumerate() {
            assert_eq!(e.sample, "bd");
            assert_eq!(e.time, time(i as i64, 4));
            assert_eq!(e.duration, time(1, 4));
        }
    }

    #[test]
    fn test_repetition_inside_slot() {
        let events = parse("bd*2 sn");
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].time, time(0, 1));
        assert_eq!(events[0].duration, time(1, 4));
        assert_eq!(events[1].time, time(1, 4));
        assert_eq!(events[2].time, time(1, 2));
        assert_eq!(events[2].duration, time(1, 2));
    }

    #[test]
    fn test_rest_repetition_is_silent() {
        assert!(parse("~*4").is_empty());
    }

    #[test]
    fn test_bad_repeat_count_defaults_to_one() {
        let events = parse("bd*x sn");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].duration, time(1, 2));
    }

    #[test]
    fn test_zero_count_clamped() {
        let events = parse("bd*0");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("   \t  ").is_empty());
    }
}
