mod cli;
mod decode;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use indicatif::{HumanDuration, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use zerocut_core::{
    split_with_progress, BoxError, Config, Naming, PcmBuffer, ProgressEvent, Segment, SegmentSink,
    SplitOutcome,
};

use crate::cli::{build_cli, DEFAULT_PREFIX, DEFAULT_TOKEN};
use crate::decode::decode_file;

/// Sink that writes one 16-bit PCM WAV file per segment.
struct WavSink {
    output_dir: PathBuf,
    spec: hound::WavSpec,
    overwrite: bool,
}

impl WavSink {
    fn new(output_dir: &Path, channels: u16, sample_rate: u32, overwrite: bool) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            spec: hound::WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            },
            overwrite,
        }
    }
}

impl SegmentSink for WavSink {
    fn emit(&mut self, segment: &Segment<'_>) -> Result<(), BoxError> {
        let path = self.output_dir.join(format!("{}.wav", segment.name));
        if !self.overwrite && path.exists() {
            return Err(format!("output file already exists: {}", path.display()).into());
        }

        let mut writer = hound::WavWriter::create(&path, self.spec)?;
        for &sample in segment.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        info!("wrote {}", path.display());
        Ok(())
    }
}

/// Sink that records what would be written, for `--dry-run`.
#[derive(Default)]
struct PlanSink {
    planned: Vec<(String, u64, u64)>,
}

impl SegmentSink for PlanSink {
    fn emit(&mut self, segment: &Segment<'_>) -> Result<(), BoxError> {
        self.planned
            .push((segment.name.clone(), segment.start_ms, segment.end_ms));
        Ok(())
    }
}

fn report_partial(outcome: &SplitOutcome) {
    if outcome.is_partial() {
        eprintln!(
            "Note: achieved {} of {} requested cut(s); the recording ran out of usable silence points.",
            outcome.achieved, outcome.requested
        );
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = build_cli().get_matches();

    let input_path = matches
        .get_one::<PathBuf>("file_path")
        .expect("required argument");
    if !input_path.is_file() {
        return Err(anyhow!(
            "input file does not exist: {}",
            input_path.display()
        ));
    }

    let output_dir = matches
        .get_one::<PathBuf>("output")
        .expect("defaulted argument");
    if !output_dir.is_dir() {
        return Err(anyhow!(
            "output directory does not exist: {}",
            output_dir.display()
        ));
    }

    let cuts = *matches.get_one::<u64>("cuts").expect("defaulted argument") as usize;
    let min_interval = *matches
        .get_one::<Duration>("min-interval")
        .expect("defaulted argument");
    let max_interval = *matches
        .get_one::<Duration>("max-interval")
        .expect("defaulted argument");
    let offset_ms = *matches.get_one::<i64>("offset").expect("defaulted argument");
    let threshold = *matches
        .get_one::<i16>("threshold")
        .expect("defaulted argument");
    let prefix = matches
        .get_one::<String>("prefix")
        .cloned()
        .unwrap_or_else(|| DEFAULT_PREFIX.to_owned());
    let token = matches
        .get_one::<String>("token")
        .cloned()
        .unwrap_or_else(|| DEFAULT_TOKEN.to_owned());
    let seed = matches.get_one::<u64>("seed").copied();
    let overwrite = matches.get_flag("overwrite");
    let dry_run = matches.get_flag("dry-run");

    let config = Config::builder(cuts, min_interval, max_interval)
        .offset_ms(offset_ms)
        .threshold(threshold)
        .build()
        .context("invalid segmentation parameters")?;
    let naming = Naming::new(prefix, token).context("invalid naming options")?;

    let audio = decode_file(input_path)
        .with_context(|| format!("failed to decode '{}'", input_path.display()))?;
    let buffer = PcmBuffer::new(&audio.samples, audio.channels, audio.sample_rate)
        .context("decoded stream is not splittable")?;
    info!(
        "decoded {} channel(s) at {} Hz, {}",
        audio.channels,
        audio.sample_rate,
        HumanDuration(buffer.duration())
    );

    let mut rng: StdRng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    if dry_run {
        let mut sink = PlanSink::default();
        let outcome =
            split_with_progress(&buffer, &config, &naming, &mut rng, &mut sink, |_| {})
                .with_context(|| format!("failed to split '{}'", input_path.display()))?;

        println!("Dry run: would write {} clip(s):", sink.planned.len());
        for (name, start_ms, end_ms) in &sink.planned {
            println!("  {name}.wav  [{start_ms} ms .. {end_ms} ms)");
        }
        report_partial(&outcome);
        return Ok(());
    }

    let progress = ProgressBar::new(0);
    progress.set_draw_target(ProgressDrawTarget::stderr());
    let bar_style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let mut sink = WavSink::new(
        output_dir,
        audio.channels as u16,
        audio.sample_rate,
        overwrite,
    );

    let progress_handle = progress.clone();
    let result = split_with_progress(
        &buffer,
        &config,
        &naming,
        &mut rng,
        &mut sink,
        move |event| match event {
            ProgressEvent::Start {
                total_duration,
                silence_points,
            } => {
                progress_handle.set_style(bar_style.clone());
                progress_handle.set_length(total_duration.as_millis().max(1) as u64);
                progress_handle.enable_steady_tick(Duration::from_millis(100));
                progress_handle.set_message(format!(
                    "0 / {} ({silence_points} silence points)",
                    HumanDuration(total_duration)
                ));
            }
            ProgressEvent::Advance { processed, .. } => {
                progress_handle.set_position(processed.as_millis() as u64);
                progress_handle.set_message(format!("{}", HumanDuration(processed)));
            }
            ProgressEvent::Finish => {
                progress_handle.set_message(String::from("Completed"));
            }
        },
    )
    .with_context(|| format!("failed to split '{}'", input_path.display()));

    progress.finish_and_clear();

    let outcome = result?;
    println!(
        "Wrote {} clip(s) to {}",
        outcome.achieved,
        output_dir.display()
    );
    report_partial(&outcome);

    Ok(())
}
