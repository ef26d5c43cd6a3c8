use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::models::{BehaviorState, BucketedSegment, StateLogEntry};
use crate::segmentation::config::BucketConfig;

/// Per-state seconds credited to one bucket, kept in first-occurrence order
/// so the majority vote can break ties deterministically.
#[derive(Debug)]
struct BucketTally {
    start: DateTime<Utc>,
    states: Vec<(BehaviorState, f64)>,
}

impl BucketTally {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            states: Vec::new(),
        }
    }

    fn credit(&mut self, state: BehaviorState, secs: f64) {
        match self.states.iter_mut().find(|(s, _)| *s == state) {
            Some(slot) => slot.1 += secs,
            None => self.states.push((state, secs)),
        }
    }

    /// Most credited seconds wins; on a tie the state seen first in the
    /// bucket keeps the lead.
    fn winner(&self) -> Option<BehaviorState> {
        let mut best: Option<(BehaviorState, f64)> = None;
        for &(state, secs) in &self.states {
            match best {
                Some((_, best_secs)) if secs <= best_secs => {}
                _ => best = Some((state, secs)),
            }
        }
        best.map(|(state, _)| state)
    }
}

/// Start of the bucket containing `timestamp`.
pub fn floor_to_bucket(timestamp: DateTime<Utc>, config: &BucketConfig) -> DateTime<Utc> {
    let width_ms = config.bucket_width_ms();
    let offset = timestamp.timestamp_millis().rem_euclid(width_ms);
    timestamp - Duration::milliseconds(offset)
}

fn secs_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    secs_between(from, to) / 60.0
}

/// Turn the state log for `[start, end)` into majority-voted segments.
///
/// Entries outside the range are ignored. Each entry credits its bucket with
/// the time until the next entry, capped at `max_entry_duration_secs`; the
/// last entry credits `last_entry_secs`. Adjacent buckets with the same
/// winner merge, empty buckets leave gaps, and segment bounds are clipped to
/// the range so segments and gaps partition it exactly.
pub fn build_bucketed_segments(
    entries: &[StateLogEntry],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    config: &BucketConfig,
) -> Vec<BucketedSegment> {
    if end <= start {
        return Vec::new();
    }

    let mut in_range: Vec<&StateLogEntry> = entries
        .iter()
        .filter(|entry| entry.timestamp >= start && entry.timestamp < end)
        .collect();

    if in_range.is_empty() {
        return Vec::new();
    }

    // Stable, so same-timestamp entries keep their log order.
    in_range.sort_by_key(|entry| entry.timestamp);

    let width_ms = config.bucket_width_ms();
    let cap = config.max_entry_duration_secs.max(0.0);

    // Step 1: credit each entry to its bucket
    let mut buckets: BTreeMap<i64, BucketTally> = BTreeMap::new();
    for (i, entry) in in_range.iter().enumerate() {
        let credit = match in_range.get(i + 1) {
            Some(next) => secs_between(entry.timestamp, next.timestamp).min(cap),
            None => config
                .last_entry_secs
                .min(secs_between(entry.timestamp, end))
                .min(cap),
        };

        let index = entry.timestamp.timestamp_millis().div_euclid(width_ms);
        buckets
            .entry(index)
            .or_insert_with(|| BucketTally::new(floor_to_bucket(entry.timestamp, config)))
            .credit(entry.integrated_state, credit.max(0.0));
    }

    // Step 2 + 3: majority vote per bucket, merge adjacent winners
    let mut segments: Vec<BucketedSegment> = Vec::new();
    let mut last_index: Option<i64> = None;

    for (index, tally) in buckets {
        let Some(state) = tally.winner() else {
            continue;
        };

        let bucket_end = tally.start + config.bucket_width();
        let seg_start = tally.start.max(start);
        let seg_end = bucket_end.min(end);

        match segments.last_mut() {
            Some(segment) if segment.state == state && last_index == Some(index - 1) => {
                segment.end_time = seg_end;
                segment.duration_minutes = minutes_between(segment.start_time, seg_end);
                for (s, secs) in tally.states {
                    *segment.breakdown.entry(s).or_insert(0.0) += secs;
                }
            }
            _ => {
                segments.push(BucketedSegment {
                    state,
                    start_time: seg_start,
                    end_time: seg_end,
                    duration_minutes: minutes_between(seg_start, seg_end),
                    breakdown: tally.states.into_iter().collect(),
                });
            }
        }

        last_index = Some(index);
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 2024-02-14 00:00:00 UTC, aligned to a 5-minute boundary.
    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 14, 0, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        base() + Duration::seconds(secs)
    }

    fn entry(secs: i64, state: BehaviorState) -> StateLogEntry {
        StateLogEntry::new(at(secs), state, 1.0)
    }

    fn build(entries: &[StateLogEntry]) -> Vec<BucketedSegment> {
        build_bucketed_segments(entries, base(), at(24 * 3600), &BucketConfig::default())
    }

    /// Logs one entry every `step` seconds in `[from, to)`.
    fn run(from: i64, to: i64, step: i64, state: BehaviorState) -> Vec<StateLogEntry> {
        (from..to).step_by(step as usize).map(|s| entry(s, state)).collect()
    }

    #[test]
    fn empty_log_yields_no_segments() {
        assert!(build(&[]).is_empty());
    }

    #[test]
    fn single_entry_fills_its_bucket() {
        let segments = build(&[entry(0, BehaviorState::Focused)]);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].state, BehaviorState::Focused);
        assert_eq!(segments[0].start_time, base());
        assert_eq!(segments[0].end_time, at(300));
        assert_eq!(segments[0].duration_minutes, 5.0);
        assert_eq!(segments[0].breakdown[&BehaviorState::Focused], 5.0);
    }

    #[test]
    fn majority_vote_by_credited_duration() {
        let segments = build(&[
            entry(0, BehaviorState::Distracted),
            entry(10, BehaviorState::Distracted),
            entry(20, BehaviorState::Distracted),
            entry(30, BehaviorState::Focused),
        ]);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].state, BehaviorState::Distracted);
        assert_eq!(segments[0].breakdown[&BehaviorState::Distracted], 30.0);
        assert_eq!(segments[0].breakdown[&BehaviorState::Focused], 5.0);
    }

    #[test]
    fn tie_goes_to_first_seen_state() {
        // drowsy 10s, focused 10s (the trailing entry credits 5s to away)
        let segments = build(&[
            entry(0, BehaviorState::Drowsy),
            entry(10, BehaviorState::Focused),
            entry(20, BehaviorState::Away),
        ]);
        assert_eq!(segments[0].state, BehaviorState::Drowsy);

        let segments = build(&[
            entry(0, BehaviorState::Focused),
            entry(10, BehaviorState::Drowsy),
            entry(20, BehaviorState::Away),
        ]);
        assert_eq!(segments[0].state, BehaviorState::Focused);
    }

    #[test]
    fn adjacent_same_state_buckets_merge() {
        let segments = build(&[
            entry(0, BehaviorState::Focused),
            entry(10, BehaviorState::Focused),
            entry(300, BehaviorState::Focused),
            entry(310, BehaviorState::Focused),
        ]);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_time, base());
        assert_eq!(segments[0].end_time, at(600));
        assert_eq!(segments[0].duration_minutes, 10.0);
    }

    #[test]
    fn different_winners_stay_separate() {
        let segments = build(&[
            entry(0, BehaviorState::Focused),
            entry(10, BehaviorState::Focused),
            entry(300, BehaviorState::Distracted),
            entry(310, BehaviorState::Distracted),
        ]);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].state, BehaviorState::Focused);
        assert_eq!(segments[1].state, BehaviorState::Distracted);
        assert_eq!(segments[0].end_time, segments[1].start_time);
    }

    #[test]
    fn empty_bucket_leaves_gap_between_same_state() {
        let segments = build(&[entry(0, BehaviorState::Focused), entry(600, BehaviorState::Focused)]);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end_time, at(300));
        assert_eq!(segments[1].start_time, at(600));
    }

    #[test]
    fn entry_credit_is_capped() {
        let segments = build(&[entry(0, BehaviorState::Focused), entry(120, BehaviorState::Focused)]);

        assert_eq!(segments.len(), 1);
        // 30 (capped from 120) + 5 for the last entry
        assert_eq!(segments[0].breakdown_total_secs(), 35.0);
    }

    #[test]
    fn custom_bucket_width() {
        let entries = [entry(0, BehaviorState::Focused), entry(300, BehaviorState::Focused)];
        let segments = build_bucketed_segments(
            &entries,
            base(),
            at(3600),
            &BucketConfig::with_bucket_minutes(10),
        );

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].duration_minutes, 10.0);
        assert_eq!(segments[0].end_time - segments[0].start_time, Duration::minutes(10));
    }

    #[test]
    fn entries_outside_range_are_ignored() {
        let entries = [
            entry(-60, BehaviorState::Drowsy),
            entry(0, BehaviorState::Focused),
            entry(3600, BehaviorState::Drowsy),
        ];
        let segments =
            build_bucketed_segments(&entries, base(), at(3600), &BucketConfig::default());

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].state, BehaviorState::Focused);
        assert!(!segments[0].breakdown.contains_key(&BehaviorState::Drowsy));
    }

    #[test]
    fn segments_are_clipped_to_unaligned_range() {
        let entries = run(0, 600, 5, BehaviorState::Focused);
        let segments =
            build_bucketed_segments(&entries, at(120), at(420), &BucketConfig::default());

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_time, at(120));
        assert_eq!(segments[0].end_time, at(420));
        assert_eq!(segments[0].duration_minutes, 5.0);
    }

    #[test]
    fn unsorted_input_matches_sorted_input() {
        let mut entries = run(0, 900, 5, BehaviorState::Focused);
        entries.extend(run(900, 1200, 5, BehaviorState::Away));
        let sorted = build(&entries);

        entries.reverse();
        assert_eq!(build(&entries), sorted);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let mut entries = run(0, 600, 5, BehaviorState::Focused);
        entries.extend(run(600, 700, 7, BehaviorState::Drowsy));
        entries.extend(run(1500, 1800, 5, BehaviorState::Distracted));

        let first = build(&entries);
        let second = build(&entries);
        assert_eq!(first, second);
    }

    #[test]
    fn segments_and_gaps_partition_the_range() {
        let mut entries = run(130, 700, 5, BehaviorState::Focused);
        entries.extend(run(1200, 1400, 5, BehaviorState::Drowsy));
        entries.extend(run(2400, 2700, 10, BehaviorState::Away));

        let start = at(100);
        let end = at(2650);
        let segments = build_bucketed_segments(&entries, start, end, &BucketConfig::default());

        let mut cursor = start;
        let mut covered = Duration::zero();
        let mut gaps = Duration::zero();
        for segment in &segments {
            assert!(segment.start_time >= cursor, "segments overlap");
            assert!(segment.end_time > segment.start_time);
            gaps = gaps + (segment.start_time - cursor);
            covered = covered + segment.duration();
            cursor = segment.end_time;
        }
        assert!(cursor <= end);
        gaps = gaps + (end - cursor);

        assert_eq!(covered + gaps, end - start);
        assert!(gaps > Duration::zero());
    }

    #[test]
    fn breakdown_is_bounded_by_entry_cap() {
        let cfg = BucketConfig::default();
        let entries = [
            entry(0, BehaviorState::Focused),
            entry(200, BehaviorState::Focused),
            entry(400, BehaviorState::Focused),
        ];
        let segments = build(&entries);

        let total: f64 = segments.iter().map(|s| s.breakdown_total_secs()).sum();
        assert!(total <= entries.len() as f64 * cfg.max_entry_duration_secs);
    }

    #[test]
    fn floor_to_bucket_aligns() {
        let cfg = BucketConfig::default();
        assert_eq!(floor_to_bucket(at(299), &cfg), base());
        assert_eq!(floor_to_bucket(at(300), &cfg), at(300));
        assert_eq!(floor_to_bucket(at(-1), &cfg), at(-300));
    }
}
