//! Silence-point audio segmentation.
//!
//! `zerocut_core` slices a decoded PCM recording into clips by cutting only
//! at instants where every channel sits near digital silence, so the cuts
//! are inaudible. The pipeline is strictly forward: a single linear scan
//! collects near-silence timestamps, a randomized plan of interval lengths
//! is resolved against them, and the resulting cut points are sliced into
//! segments handed to a caller-supplied [`SegmentSink`]. Decoding,
//! encoding, and file I/O all live outside this crate.

use std::time::Duration;

use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

/// Amplitude below which a 16-bit sample counts as silent.
///
/// Slightly above true zero so dither noise does not hide otherwise silent
/// frames.
pub const DEFAULT_THRESHOLD: i16 = 100;

/// Boxed error type returned by [`SegmentSink`] implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while validating inputs or splitting a recording.
#[derive(Debug, Error)]
pub enum ZeroCutError {
    /// Error returned when the requested cut count is zero.
    #[error("cut count must be greater than zero")]
    InvalidCutCount,

    /// Error returned when the interval bounds are empty or inverted.
    #[error("invalid interval bounds: minimum {min_ms} ms, maximum {max_ms} ms")]
    InvalidIntervalBounds { min_ms: u64, max_ms: u64 },

    /// Error returned when the amplitude threshold is not positive.
    #[error("amplitude threshold must be greater than zero")]
    InvalidThreshold,

    /// Error returned when the naming token is empty.
    #[error("naming token must not be empty")]
    EmptyNamingToken,

    /// Error returned when the sample buffer holds no samples.
    #[error("sample buffer is empty")]
    EmptyBuffer,

    /// Error returned when the channel count is zero.
    #[error("channel count must be greater than zero")]
    InvalidChannelCount,

    /// Error returned when the sample rate is zero.
    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,

    /// Error returned when the buffer does not divide into whole frames.
    #[error("buffer of {samples} samples does not divide into {channels}-channel frames")]
    MalformedBuffer { samples: usize, channels: usize },

    /// Error returned when no frame in the recording qualifies as silent.
    #[error("no silence points found")]
    NoSilencePoints,

    /// Wrapper around failures reported by the segment sink.
    #[error("segment sink error: {0}")]
    Sink(#[source] BoxError),
}

/// Immutable view over an interleaved signed 16-bit PCM recording.
///
/// The buffer is borrowed from the caller and never copied; the core only
/// reads it.
#[derive(Clone, Copy, Debug)]
pub struct PcmBuffer<'a> {
    samples: &'a [i16],
    channels: usize,
    sample_rate: u32,
}

impl<'a> PcmBuffer<'a> {
    /// Wrap a decoded sample slice, validating its shape.
    pub fn new(
        samples: &'a [i16],
        channels: usize,
        sample_rate: u32,
    ) -> Result<Self, ZeroCutError> {
        if channels == 0 {
            return Err(ZeroCutError::InvalidChannelCount);
        }
        if sample_rate == 0 {
            return Err(ZeroCutError::InvalidSampleRate);
        }
        if samples.is_empty() {
            return Err(ZeroCutError::EmptyBuffer);
        }
        if samples.len() % channels != 0 {
            return Err(ZeroCutError::MalformedBuffer {
                samples: samples.len(),
                channels,
            });
        }
        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &'a [i16] {
        self.samples
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (one sample per channel) in the buffer.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Total playable duration, truncated to whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.frame_count() as u64 * 1000 / u64::from(self.sample_rate)
    }

    /// Total playable duration as a [`Duration`].
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms())
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    duration
        .as_millis()
        .min(u128::from(u64::MAX))
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Validated parameters for one segmentation run.
#[derive(Clone, Debug)]
pub struct Config {
    cuts: usize,
    min_interval_ms: u64,
    max_interval_ms: u64,
    offset_ms: i64,
    threshold: i16,
}

impl Config {
    /// Construct a [`Config`] with the default offset and threshold.
    pub fn new(
        cuts: usize,
        min_interval: Duration,
        max_interval: Duration,
    ) -> Result<Self, ZeroCutError> {
        Self::builder(cuts, min_interval, max_interval).build()
    }

    /// Start building a [`Config`].
    pub fn builder(cuts: usize, min_interval: Duration, max_interval: Duration) -> ConfigBuilder {
        ConfigBuilder {
            cuts,
            min_interval,
            max_interval,
            offset_ms: 0,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn cuts(&self) -> usize {
        self.cuts
    }

    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }

    pub fn max_interval_ms(&self) -> u64 {
        self.max_interval_ms
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    pub fn threshold(&self) -> i16 {
        self.threshold
    }
}

/// Builder for [`Config`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    cuts: usize,
    min_interval: Duration,
    max_interval: Duration,
    offset_ms: i64,
    threshold: i16,
}

impl ConfigBuilder {
    /// Signed millisecond shift applied after snapping to a silence point.
    pub fn offset_ms(mut self, offset_ms: i64) -> Self {
        self.offset_ms = offset_ms;
        self
    }

    /// Amplitude below which a sample counts as silent.
    pub fn threshold(mut self, threshold: i16) -> Self {
        self.threshold = threshold;
        self
    }

    /// Validate the collected parameters and produce a [`Config`].
    pub fn build(self) -> Result<Config, ZeroCutError> {
        if self.cuts == 0 {
            return Err(ZeroCutError::InvalidCutCount);
        }
        let min_interval_ms = duration_to_millis(self.min_interval);
        let max_interval_ms = duration_to_millis(self.max_interval);
        if min_interval_ms == 0 || min_interval_ms > max_interval_ms {
            return Err(ZeroCutError::InvalidIntervalBounds {
                min_ms: min_interval_ms,
                max_ms: max_interval_ms,
            });
        }
        if self.threshold <= 0 {
            return Err(ZeroCutError::InvalidThreshold);
        }
        Ok(Config {
            cuts: self.cuts,
            min_interval_ms,
            max_interval_ms,
            offset_ms: self.offset_ms,
            threshold: self.threshold,
        })
    }
}

/// Prefix and token used to derive segment display names.
#[derive(Clone, Debug)]
pub struct Naming {
    prefix: String,
    token: String,
}

impl Naming {
    /// Construct a [`Naming`], rejecting an empty token.
    ///
    /// Defaults for either field are the caller's business, not the core's.
    pub fn new<P: Into<String>, T: Into<String>>(
        prefix: P,
        token: T,
    ) -> Result<Self, ZeroCutError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ZeroCutError::EmptyNamingToken);
        }
        Ok(Self {
            prefix: prefix.into(),
            token,
        })
    }

    /// Display stem for the segment with the given 1-based ordinal, e.g.
    /// `"audio P03"`. The encoding extension is the sink's concern.
    pub fn segment_stem(&self, ordinal: usize) -> String {
        format!("{} {}{:02}", self.prefix, self.token, ordinal)
    }
}

/// Scan the recording for frames where every channel is below `threshold`.
///
/// Returns the ascending sequence of qualifying frame timestamps in
/// fractional milliseconds. A single channel stands in for all channels in
/// mono recordings. An empty result means the recording never falls to
/// near silence; whether that is fatal is the caller's call.
///
/// This is the dominant cost of the pipeline: one pass over the raw slice,
/// no per-frame allocation.
pub fn find_silence_points(buffer: &PcmBuffer<'_>, threshold: i16) -> Vec<f64> {
    let samples = buffer.samples();
    let channels = buffer.channels();
    let rate = f64::from(buffer.sample_rate());
    let magnitude = threshold.unsigned_abs();
    let frame_count = buffer.frame_count();

    let mut points = Vec::new();
    let mut base = 0usize;
    for frame in 0..frame_count {
        let silent = samples[base..base + channels]
            .iter()
            .all(|sample| sample.unsigned_abs() < magnitude);
        if silent {
            points.push(frame as f64 * 1000.0 / rate);
        }
        base += channels;
    }
    debug!(
        "found {} silence point(s) across {} frame(s)",
        points.len(),
        frame_count
    );
    points
}

/// Draw candidate interval lengths between `min_ms` and `max_ms` inclusive.
///
/// Oversamples by two, collapses duplicate draws, and returns a random
/// permutation truncated to `count`. A narrow bound range can therefore
/// yield fewer than `count` intervals, which simply limits how many cuts
/// can be attempted downstream.
pub fn plan_intervals<R>(rng: &mut R, count: usize, min_ms: u64, max_ms: u64) -> Vec<u64>
where
    R: Rng,
{
    let mut draws: Vec<u64> = (0..count.saturating_mul(2))
        .map(|_| rng.random_range(min_ms..=max_ms))
        .collect();
    draws.sort_unstable();
    draws.dedup();
    draws.shuffle(rng);
    draws.truncate(count);
    debug!(
        "planned {} interval(s) in [{min_ms}, {max_ms}] ms",
        draws.len()
    );
    draws
}

/// Convert planned interval lengths into the final cut-point sequence.
///
/// The sequence always starts with the implicit cut at zero. For each
/// interval the resolver looks for the silence timestamp nearest past
/// `cursor + interval`, then shifts it by `offset_ms`. For an ascending
/// candidate set restricted to timestamps strictly greater than the
/// target, the nearest one is exactly the first such timestamp, found
/// here by binary search. Resolution stops at the first interval that
/// cannot be placed: no timestamp past the target, a shifted candidate
/// at or past the end of the recording, or a candidate whose floored
/// value would not advance past the previous cut point (possible with a
/// negative offset).
/// The emitted sequence is strictly increasing by construction.
pub fn resolve_cut_points(
    silence_points: &[f64],
    intervals: &[u64],
    offset_ms: i64,
    total_ms: u64,
) -> Vec<u64> {
    let mut cuts = vec![0u64];
    let mut cursor = 0.0f64;
    let mut last = 0u64;

    for &interval in intervals {
        let target = cursor + interval as f64;
        let next = silence_points.partition_point(|&point| point <= target);
        let Some(&point) = silence_points.get(next) else {
            break;
        };
        let candidate = point + offset_ms as f64;
        if candidate >= total_ms as f64 {
            break;
        }
        let floored = candidate as u64;
        if floored <= last {
            break;
        }
        cuts.push(floored);
        cursor = candidate;
        last = floored;
    }
    debug!(
        "resolved {} cut(s) from {} planned interval(s)",
        cuts.len() - 1,
        intervals.len()
    );
    cuts
}

/// One contiguous clip between two consecutive cut points.
#[derive(Debug)]
pub struct Segment<'a> {
    /// 1-based position of the clip within the run.
    pub ordinal: usize,
    /// Display stem, e.g. `"audio P01"`; the extension is the sink's concern.
    pub name: String,
    /// Start of the clip in milliseconds from the recording start.
    pub start_ms: u64,
    /// Exclusive end of the clip in milliseconds.
    pub end_ms: u64,
    /// Interleaved samples of the clip, verbatim from the source buffer.
    pub samples: &'a [i16],
}

/// Receiver for finished segments.
///
/// Implementations own encoding and persistence; the core only slices and
/// names. Returning an error aborts the run.
pub trait SegmentSink {
    fn emit(&mut self, segment: &Segment<'_>) -> Result<(), BoxError>;
}

/// Progress notifications emitted while a split runs.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Silence detection finished; slicing is about to begin.
    Start {
        total_duration: Duration,
        silence_points: usize,
    },
    /// A segment was emitted; `processed` is the end of that segment.
    Advance {
        ordinal: usize,
        processed: Duration,
    },
    /// The run finished.
    Finish,
}

/// Result summary of a completed split.
#[derive(Clone, Debug)]
pub struct SplitOutcome {
    /// Number of cuts the caller asked for.
    pub requested: usize,
    /// Number of segments actually emitted.
    pub achieved: usize,
    /// Final cut-point sequence, including the implicit leading zero.
    pub cut_points: Vec<u64>,
}

impl SplitOutcome {
    /// Whether fewer segments were produced than requested.
    pub fn is_partial(&self) -> bool {
        self.achieved < self.requested
    }
}

/// Slice the recording at `cut_points` and hand each segment to `sink`.
///
/// Each consecutive pair of cut points becomes one half-open frame range;
/// the samples are passed through verbatim, with no fades or resampling.
/// Audio past the final cut point is dropped. Returns the number of
/// segments emitted.
pub fn export_segments<S, F>(
    buffer: &PcmBuffer<'_>,
    cut_points: &[u64],
    naming: &Naming,
    sink: &mut S,
    mut progress: F,
) -> Result<usize, ZeroCutError>
where
    S: SegmentSink + ?Sized,
    F: FnMut(ProgressEvent),
{
    let channels = buffer.channels();
    let rate = u64::from(buffer.sample_rate());
    let samples = buffer.samples();
    let mut emitted = 0usize;

    for (index, window) in cut_points.windows(2).enumerate() {
        let (start_ms, end_ms) = (window[0], window[1]);
        let start_frame = (start_ms * rate / 1000) as usize;
        let end_frame = ((end_ms * rate / 1000) as usize).min(buffer.frame_count());
        let ordinal = index + 1;
        let segment = Segment {
            ordinal,
            name: naming.segment_stem(ordinal),
            start_ms,
            end_ms,
            samples: &samples[start_frame * channels..end_frame * channels],
        };
        sink.emit(&segment).map_err(ZeroCutError::Sink)?;
        emitted += 1;
        progress(ProgressEvent::Advance {
            ordinal,
            processed: Duration::from_millis(end_ms),
        });
    }
    Ok(emitted)
}

/// Split `buffer` according to `config`, reporting progress through
/// `progress`.
///
/// Runs the full pipeline in order: silence detection, interval planning,
/// cut-point resolution, and export through `sink`. Producing fewer
/// segments than requested is a valid outcome, reported via
/// [`SplitOutcome::is_partial`]; a recording with no silent frame at all
/// is the distinct error [`ZeroCutError::NoSilencePoints`], raised before
/// any planning or slicing happens.
pub fn split_with_progress<R, S, F>(
    buffer: &PcmBuffer<'_>,
    config: &Config,
    naming: &Naming,
    rng: &mut R,
    sink: &mut S,
    mut progress: F,
) -> Result<SplitOutcome, ZeroCutError>
where
    R: Rng,
    S: SegmentSink + ?Sized,
    F: FnMut(ProgressEvent),
{
    let silence_points = find_silence_points(buffer, config.threshold());
    if silence_points.is_empty() {
        return Err(ZeroCutError::NoSilencePoints);
    }
    progress(ProgressEvent::Start {
        total_duration: buffer.duration(),
        silence_points: silence_points.len(),
    });

    let intervals = plan_intervals(
        rng,
        config.cuts(),
        config.min_interval_ms(),
        config.max_interval_ms(),
    );
    let cut_points = resolve_cut_points(
        &silence_points,
        &intervals,
        config.offset_ms(),
        buffer.duration_ms(),
    );

    let achieved = export_segments(buffer, &cut_points, naming, sink, &mut progress)?;
    progress(ProgressEvent::Finish);

    if achieved < config.cuts() {
        warn!("placed {achieved} of {} requested cut(s)", config.cuts());
    }
    Ok(SplitOutcome {
        requested: config.cuts(),
        achieved,
        cut_points,
    })
}

/// Split `buffer` without progress reporting.
pub fn split<R, S>(
    buffer: &PcmBuffer<'_>,
    config: &Config,
    naming: &Naming,
    rng: &mut R,
    sink: &mut S,
) -> Result<SplitOutcome, ZeroCutError>
where
    R: Rng,
    S: SegmentSink + ?Sized,
{
    split_with_progress(buffer, config, naming, rng, sink, |_| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn stereo_frames(frames: &[(i16, i16)]) -> Vec<i16> {
        frames.iter().flat_map(|&(l, r)| [l, r]).collect()
    }

    #[test]
    fn buffer_rejects_invalid_shapes() {
        assert!(matches!(
            PcmBuffer::new(&[], 2, 44_100),
            Err(ZeroCutError::EmptyBuffer)
        ));
        assert!(matches!(
            PcmBuffer::new(&[0, 0, 0], 2, 44_100),
            Err(ZeroCutError::MalformedBuffer {
                samples: 3,
                channels: 2
            })
        ));
        assert!(matches!(
            PcmBuffer::new(&[0, 0], 0, 44_100),
            Err(ZeroCutError::InvalidChannelCount)
        ));
        assert!(matches!(
            PcmBuffer::new(&[0, 0], 2, 0),
            Err(ZeroCutError::InvalidSampleRate)
        ));
    }

    #[test]
    fn buffer_reports_frame_count_and_duration() {
        let samples = vec![0i16; 8_000 * 2];
        let buffer = PcmBuffer::new(&samples, 2, 8_000).unwrap();
        assert_eq!(buffer.frame_count(), 8_000);
        assert_eq!(buffer.duration_ms(), 1_000);
    }

    #[test]
    fn config_validates_parameters() {
        let minute = Duration::from_secs(60);
        assert!(matches!(
            Config::new(0, minute, minute),
            Err(ZeroCutError::InvalidCutCount)
        ));
        assert!(matches!(
            Config::new(3, Duration::from_secs(120), minute),
            Err(ZeroCutError::InvalidIntervalBounds { .. })
        ));
        assert!(matches!(
            Config::new(3, Duration::ZERO, minute),
            Err(ZeroCutError::InvalidIntervalBounds { .. })
        ));
        assert!(matches!(
            Config::builder(3, minute, minute).threshold(0).build(),
            Err(ZeroCutError::InvalidThreshold)
        ));

        let config = Config::builder(3, minute, minute)
            .offset_ms(-250)
            .threshold(50)
            .build()
            .unwrap();
        assert_eq!(config.min_interval_ms(), 60_000);
        assert_eq!(config.offset_ms(), -250);
        assert_eq!(config.threshold(), 50);
    }

    #[test]
    fn naming_formats_zero_padded_ordinals() {
        let naming = Naming::new("audio", "P").unwrap();
        assert_eq!(naming.segment_stem(3), "audio P03");
        assert_eq!(naming.segment_stem(12), "audio P12");
        assert_eq!(naming.segment_stem(100), "audio P100");
    }

    #[test]
    fn naming_rejects_empty_token() {
        assert!(matches!(
            Naming::new("audio", ""),
            Err(ZeroCutError::EmptyNamingToken)
        ));
    }

    #[test]
    fn detector_reports_exactly_the_silent_frames() {
        let mut frames = vec![(2_000i16, -2_000i16); 50];
        for &index in &[5usize, 12, 40] {
            frames[index] = (40, -60);
        }
        let samples = stereo_frames(&frames);
        let buffer = PcmBuffer::new(&samples, 2, 1_000).unwrap();

        let points = find_silence_points(&buffer, DEFAULT_THRESHOLD);
        assert_eq!(points, vec![5.0, 12.0, 40.0]);
    }

    #[test]
    fn detector_requires_every_channel_to_be_silent() {
        // Left channel silent, right channel loud: the frame must not count.
        let samples = stereo_frames(&[(10, 5_000); 20]);
        let buffer = PcmBuffer::new(&samples, 2, 1_000).unwrap();
        assert!(find_silence_points(&buffer, DEFAULT_THRESHOLD).is_empty());
    }

    #[test]
    fn detector_handles_mono_and_extreme_amplitudes() {
        let samples = vec![i16::MIN, 0, i16::MAX, 99];
        let buffer = PcmBuffer::new(&samples, 1, 1_000).unwrap();
        let points = find_silence_points(&buffer, DEFAULT_THRESHOLD);
        assert_eq!(points, vec![1.0, 3.0]);
    }

    #[test]
    fn planner_respects_bounds_and_count() {
        let mut rng = StdRng::seed_from_u64(7);
        let intervals = plan_intervals(&mut rng, 10, 500, 1_500);
        assert!(intervals.len() <= 10);
        assert!(!intervals.is_empty());
        assert!(intervals.iter().all(|&ms| (500..=1_500).contains(&ms)));

        let mut sorted = intervals.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), intervals.len(), "duplicates must collapse");
    }

    #[test]
    fn planner_collapses_a_degenerate_range_to_one_interval() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(plan_intervals(&mut rng, 5, 60_000, 60_000), vec![60_000]);
    }

    #[test]
    fn planner_is_deterministic_under_a_seeded_rng() {
        let mut first = StdRng::seed_from_u64(42);
        let mut second = StdRng::seed_from_u64(42);
        assert_eq!(
            plan_intervals(&mut first, 8, 100, 900),
            plan_intervals(&mut second, 8, 100, 900)
        );
    }

    #[test]
    fn resolver_snaps_to_the_nearest_point_past_the_target() {
        let silence = [100.0, 450.0, 460.0, 900.0];
        let cuts = resolve_cut_points(&silence, &[400, 400], 0, 2_000);
        // First target 400 snaps to 450; second target 850 snaps to 900.
        assert_eq!(cuts, vec![0, 450, 900]);
    }

    #[test]
    fn resolver_applies_the_offset_before_flooring() {
        let silence = [500.5];
        let cuts = resolve_cut_points(&silence, &[400], 30, 2_000);
        assert_eq!(cuts, vec![0, 530]);
    }

    #[test]
    fn resolver_stops_when_no_point_lies_past_the_target() {
        let silence = [100.0, 200.0];
        let cuts = resolve_cut_points(&silence, &[300, 300], 0, 2_000);
        assert_eq!(cuts, vec![0]);
    }

    #[test]
    fn resolver_stops_at_the_end_of_the_recording() {
        // Five 60 s intervals, but only two silence points are reachable
        // before the audio runs out.
        let silence = [61_000.0, 125_000.0, 190_000.0];
        let cuts = resolve_cut_points(
            &silence,
            &[60_000, 60_000, 60_000, 60_000, 60_000],
            0,
            180_000,
        );
        assert_eq!(cuts, vec![0, 61_000, 125_000]);
    }

    #[test]
    fn resolver_never_continues_past_a_failed_interval() {
        // The second interval fails; the third would fit but must not run.
        let silence = [500.0, 10_000.0];
        let cuts = resolve_cut_points(&silence, &[400, 600, 400], 0, 1_000);
        assert_eq!(cuts, vec![0, 500]);
    }

    #[test]
    fn resolver_rejects_a_candidate_pushed_back_onto_the_cursor() {
        // A large negative offset would pull the second cut at or before
        // the first; the resolver must stop rather than emit a duplicate.
        let silence = [500.0, 500.4];
        let cuts = resolve_cut_points(&silence, &[499, 1], -1, 2_000);
        assert_eq!(cuts, vec![0, 499]);
    }

    #[test]
    fn resolver_rejects_a_negative_first_candidate() {
        let silence = [100.0, 600.0];
        let cuts = resolve_cut_points(&silence, &[50], -200, 2_000);
        assert_eq!(cuts, vec![0]);
    }

    #[test]
    fn resolver_output_is_strictly_increasing() {
        let silence: Vec<f64> = (1..200).map(|i| i as f64 * 37.5).collect();
        let cuts = resolve_cut_points(&silence, &[100, 150, 100, 200, 120], -20, 7_000);
        assert!(cuts.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
