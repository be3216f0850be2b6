//! # Telemetry Sampler
//!
//! Polls drive telemetry from the remote link and keeps the most recent readings of each channel
//! in a bounded history, oldest first. Failed polls never touch the history.
//!
//! The history sits behind an `Arc<RwLock<_>>`: the sampler is the only writer, any number of
//! [`HistoryReader`]s can take snapshots from other threads.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    collections::VecDeque,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::trace;
use serde::{Deserialize, Serialize};

use comms_if::{
    eqpt::drive::{Channel, ParseError, TelemetrySample, DUTY_MAX, DUTY_MIN},
    net::{LinkError, RemoteLink},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the telemetry sampler.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryParams {
    /// Maximum number of samples kept per channel.
    pub history_len: usize,
}

/// Bounded histories of the two drive channels.
///
/// Both channels always hold the same number of values, index `i` of each
/// comes from the same sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryHistory {
    left: VecDeque<i32>,
    right: VecDeque<i32>,
    capacity: usize,
    latest: Option<TelemetrySample>,
    num_ok: u64,
    num_failed: u64,
}

/// Owns the write side of the telemetry history.
pub struct TelemetrySampler {
    history: Arc<RwLock<TelemetryHistory>>,
}

/// Read-only handle onto a sampler's history.
#[derive(Clone)]
pub struct HistoryReader {
    history: Arc<RwLock<TelemetryHistory>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors from a telemetry poll. The history is unchanged when one is returned.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum PollError {
    #[error("Telemetry endpoint unreachable: {0}")]
    Unreachable(LinkError),

    #[error("Could not parse telemetry: {0}")]
    Parse(#[from] ParseError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for TelemetryParams {
    fn default() -> Self {
        Self { history_len: 100 }
    }
}

impl From<LinkError> for PollError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::Unreachable(_) => PollError::Unreachable(e),
            LinkError::Malformed(m) => PollError::Parse(ParseError::Malformed(m)),
        }
    }
}

impl TelemetryHistory {
    /// Create an empty history holding at most `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "TelemetryHistory capacity must be > 0");

        Self {
            left: VecDeque::with_capacity(capacity),
            right: VecDeque::with_capacity(capacity),
            capacity,
            latest: None,
            num_ok: 0,
            num_failed: 0,
        }
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: TelemetrySample) {
        if self.left.len() == self.capacity {
            self.left.pop_front();
            self.right.pop_front();
        }

        self.left.push_back(sample.left);
        self.right.push_back(sample.right);
        self.latest = Some(sample);
        self.num_ok += 1;
    }

    /// Count a failed poll.
    pub fn record_failure(&mut self) {
        self.num_failed += 1;
    }

    /// Left channel values, oldest first.
    pub fn left(&self) -> Vec<i32> {
        self.left.iter().copied().collect()
    }

    /// Right channel values, oldest first.
    pub fn right(&self) -> Vec<i32> {
        self.right.iter().copied().collect()
    }

    pub fn channel(&self, channel: Channel) -> Vec<i32> {
        match channel {
            Channel::Left => self.left(),
            Channel::Right => self.right(),
        }
    }

    /// Y axis range for charting a channel.
    ///
    /// Always includes the full duty range, widened to fit any value outside
    /// it.
    pub fn chart_range(&self, channel: Channel) -> (i32, i32) {
        let values = match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        };

        values.iter().fold((DUTY_MIN, DUTY_MAX), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    /// The most recent sample, if any.
    pub fn latest(&self) -> Option<TelemetrySample> {
        self.latest
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of successful polls since creation or the last clear.
    pub fn num_ok(&self) -> u64 {
        self.num_ok
    }

    /// Number of failed polls since creation or the last clear.
    pub fn num_failed(&self) -> u64 {
        self.num_failed
    }

    /// Remove all samples and reset the counters.
    pub fn clear(&mut self) {
        *self = Self::new(self.capacity);
    }
}

impl TelemetrySampler {
    /// Create a sampler with an empty history of at most `history_len`
    /// samples per channel.
    ///
    /// # Panics
    ///
    /// Panics if `history_len` is zero.
    pub fn new(history_len: usize) -> Self {
        Self {
            history: Arc::new(RwLock::new(TelemetryHistory::new(history_len))),
        }
    }

    /// Get a read-only handle onto the history.
    pub fn reader(&self) -> HistoryReader {
        HistoryReader {
            history: self.history.clone(),
        }
    }

    /// Fetch and parse one telemetry payload from the link.
    ///
    /// On success the sample is appended to the history. On failure the
    /// history is untouched, only the failure counter moves.
    pub fn poll(&self, link: &mut dyn RemoteLink) -> Result<TelemetrySample, PollError> {
        let result = link
            .fetch_telemetry()
            .map_err(PollError::from)
            .and_then(|payload| payload.parse().map_err(PollError::from));

        let mut history = self.write();
        match &result {
            Ok(sample) => {
                trace!("Telemetry sample {:?}", sample);
                history.push(*sample);
            }
            Err(_) => history.record_failure(),
        }

        result
    }

    /// Left channel values, oldest first.
    pub fn history_left(&self) -> Vec<i32> {
        self.reader().history_left()
    }

    /// Right channel values, oldest first.
    pub fn history_right(&self) -> Vec<i32> {
        self.reader().history_right()
    }

    /// Empty the history.
    pub fn clear(&self) {
        self.write().clear();
    }

    fn write(&self) -> RwLockWriteGuard<'_, TelemetryHistory> {
        // A panicking writer can't leave the channels out of step, push is
        // the only mutation and it can't fail halfway
        self.history.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl HistoryReader {
    /// Copy of the whole history, consistent across both channels.
    pub fn snapshot(&self) -> TelemetryHistory {
        self.read().clone()
    }

    /// Left channel values, oldest first.
    pub fn history_left(&self) -> Vec<i32> {
        self.read().left()
    }

    /// Right channel values, oldest first.
    pub fn history_right(&self) -> Vec<i32> {
        self.read().right()
    }

    pub fn latest(&self) -> Option<TelemetrySample> {
        self.read().latest()
    }

    fn read(&self) -> RwLockReadGuard<'_, TelemetryHistory> {
        self.history.read().unwrap_or_else(|e| e.into_inner())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::drive::{PayloadFormat, RawTelemetryPayload};

    /// Link which replays canned telemetry responses.
    struct ScriptedLink {
        responses: VecDeque<Result<RawTelemetryPayload, LinkError>>,
    }

    impl ScriptedLink {
        fn new() -> Self {
            Self { responses: VecDeque::new() }
        }

        fn ok(mut self, text: &str) -> Self {
            self.responses.push_back(Ok(RawTelemetryPayload::new(PayloadFormat::Labelled, text)));
            self
        }

        fn comma(mut self, text: &str) -> Self {
            self.responses.push_back(Ok(RawTelemetryPayload::new(PayloadFormat::CommaPair, text)));
            self
        }

        fn err(mut self, e: LinkError) -> Self {
            self.responses.push_back(Err(e));
            self
        }
    }

    impl RemoteLink for ScriptedLink {
        fn set_target(&mut self, _x: i32, _y: i32) -> Result<(), LinkError> {
            Ok(())
        }

        fn stop(&mut self) -> Result<(), LinkError> {
            Ok(())
        }

        fn fetch_telemetry(&mut self) -> Result<RawTelemetryPayload, LinkError> {
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(LinkError::Unreachable("script exhausted".into())))
        }
    }

    fn sample_text(l: i32, r: i32) -> String {
        format!("left: {}<br>right: {}", l, r)
    }

    #[test]
    fn test_poll_appends() {
        let sampler = TelemetrySampler::new(100);
        let mut link = ScriptedLink::new().ok("left: 120<br>right: 80");

        let s = sampler.poll(&mut link).unwrap();

        assert_eq!(s, TelemetrySample { left: 120, right: 80 });
        assert_eq!(sampler.history_left(), vec![120]);
        assert_eq!(sampler.history_right(), vec![80]);
        assert_eq!(sampler.reader().latest(), Some(s));
    }

    #[test]
    fn test_failed_poll_leaves_history() {
        let sampler = TelemetrySampler::new(100);
        let mut link = ScriptedLink::new()
            .ok("left: 1<br>right: 2")
            .ok("left: abc")
            .err(LinkError::Unreachable("timeout".into()))
            .err(LinkError::Malformed("status 500".into()));

        sampler.poll(&mut link).unwrap();
        let before = sampler.reader().snapshot();

        assert!(matches!(sampler.poll(&mut link), Err(PollError::Parse(ParseError::InvalidValue { .. }))));
        assert!(matches!(sampler.poll(&mut link), Err(PollError::Unreachable(_))));
        assert!(matches!(sampler.poll(&mut link), Err(PollError::Parse(ParseError::Malformed(_)))));

        let after = sampler.reader().snapshot();
        assert_eq!(after.left(), before.left());
        assert_eq!(after.right(), before.right());
        assert_eq!(after.latest(), before.latest());
        assert_eq!(after.num_failed(), 3);
        assert_eq!(after.num_ok(), 1);
    }

    #[test]
    fn test_comma_pair_counts() {
        let sampler = TelemetrySampler::new(100);
        let mut link = ScriptedLink::new()
            .comma("1024,-998\r\n")
            .comma("1,x")
            .comma("1,2,3")
            .comma(" 7 , 300 ");

        // Encoder counts are not limited to the duty range
        assert_eq!(
            sampler.poll(&mut link).unwrap(),
            TelemetrySample { left: 1024, right: -998 }
        );

        assert_eq!(
            sampler.poll(&mut link),
            Err(PollError::Parse(ParseError::InvalidValue {
                channel: Channel::Right,
                value: "x".into()
            }))
        );
        assert_eq!(
            sampler.poll(&mut link),
            Err(PollError::Parse(ParseError::BadCommaPair("1,2,3".into())))
        );
        assert_eq!(sampler.history_left(), vec![1024]);
        assert_eq!(sampler.history_right(), vec![-998]);

        sampler.poll(&mut link).unwrap();

        let h = sampler.reader().snapshot();
        assert_eq!(h.left(), vec![1024, 7]);
        assert_eq!(h.right(), vec![-998, 300]);
        assert_eq!((h.num_ok(), h.num_failed()), (2, 2));
        assert_eq!(h.chart_range(Channel::Left), (0, 1024));
        assert_eq!(h.chart_range(Channel::Right), (-998, 300));
    }

    #[test]
    fn test_history_bound_keeps_most_recent() {
        const N: usize = 100;
        const K: usize = 37;

        let sampler = TelemetrySampler::new(N);
        let mut link = ScriptedLink::new();
        for i in 0..(N + K) {
            link = link.ok(&sample_text((i % 256) as i32, 255 - (i % 256) as i32));
            // Failures interleaved should be ignored
            if i % 10 == 0 {
                link = link.ok("garbage");
            }
        }

        while !link.responses.is_empty() {
            let _ = sampler.poll(&mut link);
            assert!(sampler.reader().snapshot().len() <= N);
        }

        let expected_left: Vec<i32> = (K..(N + K)).map(|i| (i % 256) as i32).collect();
        let expected_right: Vec<i32> = expected_left.iter().map(|l| 255 - l).collect();

        assert_eq!(sampler.history_left(), expected_left);
        assert_eq!(sampler.history_right(), expected_right);
    }

    #[test]
    fn test_chart_range() {
        let mut h = TelemetryHistory::new(4);
        assert_eq!(h.chart_range(Channel::Left), (0, 255));

        h.push(TelemetrySample { left: 10, right: -20 });
        h.push(TelemetrySample { left: 300, right: 5 });

        assert_eq!(h.chart_range(Channel::Left), (0, 300));
        assert_eq!(h.chart_range(Channel::Right), (-20, 255));
    }

    #[test]
    fn test_clear() {
        let sampler = TelemetrySampler::new(3);
        let mut link = ScriptedLink::new().ok("left: 1<br>right: 2").ok("nope");
        let _ = sampler.poll(&mut link);
        let _ = sampler.poll(&mut link);

        sampler.clear();

        let h = sampler.reader().snapshot();
        assert!(h.is_empty());
        assert_eq!(h.capacity(), 3);
        assert_eq!(h.latest(), None);
        assert_eq!((h.num_ok(), h.num_failed()), (0, 0));
    }

    #[test]
    fn test_reader_sees_consistent_snapshots() {
        let sampler = TelemetrySampler::new(10);
        let reader = sampler.reader();

        let handle = std::thread::spawn(move || {
            for _ in 0..1000 {
                let h = reader.snapshot();
                assert_eq!(h.left().len(), h.right().len());
                for (l, r) in h.left().iter().zip(h.right().iter()) {
                    assert_eq!(l + r, 255);
                }
            }
        });

        for i in 0..500 {
            let mut link = ScriptedLink::new().ok(&sample_text(i % 256, 255 - i % 256));
            sampler.poll(&mut link).unwrap();
        }

        handle.join().unwrap();
    }
}
