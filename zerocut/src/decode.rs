use std::fs::File;
use std::path::Path;

use log::debug;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Errors that can occur while decoding the input file.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Wrapper around errors produced by the Symphonia decoding library.
    #[error(transparent)]
    Symphonia(#[from] SymphoniaError),

    /// Wrapper around IO errors encountered while reading the input.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error returned when the container does not expose any default track.
    #[error("input stream does not provide a default track")]
    MissingDefaultTrack,

    /// Error returned when the decoder track lacks a sample rate.
    #[error("input stream does not advertise a sample rate")]
    MissingSampleRate,

    /// Error returned when the decoder track lacks a channel layout.
    #[error("input stream does not advertise a channel layout")]
    MissingChannels,

    /// Error returned when the codec of the track cannot be handled.
    #[error("unsupported codec")]
    UnsupportedCodec,

    /// Error returned when the stream decodes to zero frames.
    #[error("input stream decoded to zero frames")]
    EmptyStream,
}

/// A fully decoded recording, interleaved 16-bit PCM.
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub channels: usize,
    pub sample_rate: u32,
}

/// Decode the whole input file into interleaved 16-bit PCM.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut reader = probed.format;

    let track = reader
        .default_track()
        .ok_or(DecodeError::MissingDefaultTrack)?;
    if track.codec_params.codec == CODEC_TYPE_NULL {
        return Err(DecodeError::UnsupportedCodec);
    }
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::MissingSampleRate)?;
    let channels = track
        .codec_params
        .channels
        .ok_or(DecodeError::MissingChannels)?
        .count();

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<i16> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<i16>> = None;

    while let Ok(packet) = reader.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec())
                });
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::EmptyStream);
    }

    debug!(
        "decoded {} sample(s), {} channel(s) at {} Hz",
        samples.len(),
        channels,
        sample_rate
    );
    Ok(DecodedAudio {
        samples,
        channels,
        sample_rate,
    })
}
