//! File-based chain processing command.
//!
//! The chain is prepared here on the control thread, then moved to a
//! dedicated audio thread that runs it fragment by fragment. `--set` updates
//! are published from the control thread while audio runs; the audio thread
//! pauses at each scheduled update until it has been applied, so an update
//! at time `t` reaches the first fragment starting at or after `t`.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use cadence_config::{ChainFile, StageRegistry};
use cadence_core::{Domain, Fragment, ProcessingChain, StageControl};
use cadence_io::{FragmentSink, FragmentSource, WavSpec, read_wav, write_wav};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use super::common::{ParamUpdate, check_updates, linear_to_db, parse_update, peak, rms};

#[derive(Args)]
pub struct ProcessArgs {
    /// Input WAV file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Chain file (TOML)
    #[arg(short, long)]
    chain: PathBuf,

    /// Parameter update applied while processing (e.g. "echo.feedback=0.6@2.5")
    #[arg(long = "set", value_name = "STAGE.PARAM=VALUE[@SECONDS]", value_parser = parse_update)]
    updates: Vec<ParamUpdate>,

    /// Keep the chain latency at the start of the output
    #[arg(long)]
    no_compensate: bool,

    /// Print per-stage processing load
    #[arg(long)]
    profile: bool,

    /// Output bit depth (16, 24, or 32)
    #[arg(long, default_value = "32")]
    bit_depth: u16,
}

/// State shared between the control and audio threads.
struct Transport {
    /// Frames handed to the chain so far.
    position: AtomicUsize,
    /// The audio thread does not start a fragment at or beyond this frame.
    horizon: AtomicUsize,
    running: AtomicBool,
}

pub fn run(args: ProcessArgs) -> anyhow::Result<()> {
    println!("Reading {}...", args.input.display());
    let recording = read_wav(&args.input)?;
    let spec = recording.spec;
    let channels = usize::from(spec.channels);
    println!(
        "  {} frames, {} ch, {} Hz, {:.2}s",
        recording.frames(),
        channels,
        spec.sample_rate,
        recording.seconds()
    );
    let samples = recording.samples;

    let mut file = ChainFile::load(&args.chain)?;
    if file.channels != channels || file.sample_rate != spec.sample_rate {
        tracing::info!(
            file_channels = file.channels,
            file_sample_rate = file.sample_rate,
            "chain shape taken from input file"
        );
        file.channels = channels;
        file.sample_rate = spec.sample_rate;
    }

    let registry = StageRegistry::new();
    let mut chain = file.build(&registry)?.with_profiling(args.profile);
    let output = chain.prepare(file.descriptor())?;
    if output.domain != Domain::Waveform {
        anyhow::bail!("chain output is a spectrum; set output_domain = \"waveform\"");
    }
    let out_spec = WavSpec {
        channels: u16::try_from(output.channels)?,
        sample_rate: spec.sample_rate,
        bits_per_sample: args.bit_depth,
    };
    out_spec.validate()?;

    let controls = chain.controls();
    check_updates(&args.updates, &controls)?;
    let mut pending: VecDeque<ParamUpdate> = {
        let mut updates = args.updates.clone();
        updates.sort_by(|a, b| a.at.total_cmp(&b.at));
        updates.into()
    };

    let latency = if args.no_compensate { 0 } else { chain.latency() };
    let input_rms = rms(&samples);
    let input_peak = peak(&samples);

    let source = FragmentSource::new(samples, channels, file.fragment_size).with_tail(latency);
    let sink = FragmentSink::new(output.channels, latency, source.frames());
    let fragments = source.fragments();

    println!(
        "Processing with {} stage(s), latency {} frames...",
        chain.len(),
        chain.latency()
    );

    let transport = Arc::new(Transport {
        position: AtomicUsize::new(0),
        horizon: AtomicUsize::new(next_horizon(&pending, spec.sample_rate)),
        running: AtomicBool::new(true),
    });

    let t = Arc::clone(&transport);
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        t.running.store(false, Ordering::SeqCst);
    })?;

    let audio = {
        let transport = Arc::clone(&transport);
        thread::Builder::new()
            .name("cadence-audio".to_string())
            .spawn(move || audio_thread(chain, source, sink, &transport))?
    };

    let pb = ProgressBar::new(fragments as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    // Control loop: publish due updates, then move the horizon on.
    loop {
        let position = transport.position.load(Ordering::Acquire);
        while let Some(update) = pending.front()
            && update.frame(spec.sample_rate) <= position
        {
            apply(update, &controls);
            pending.pop_front();
        }
        transport
            .horizon
            .store(next_horizon(&pending, spec.sample_rate), Ordering::Release);

        pb.set_position((position / file.fragment_size.max(1)).min(fragments) as u64);
        if audio.is_finished() {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }

    let (output_samples, mut chain) = audio
        .join()
        .map_err(|_| anyhow::anyhow!("audio thread panicked"))??;
    pb.finish_with_message("done");

    if args.profile {
        print_profile(&chain, &file);
    }
    chain.release();

    if !transport.running.load(Ordering::SeqCst) {
        println!("Interrupted; writing partial output.");
    }

    println!("\nStats:");
    println!(
        "  Input:  RMS {:.1} dB, Peak {:.1} dB",
        linear_to_db(input_rms),
        linear_to_db(input_peak)
    );
    println!(
        "  Output: RMS {:.1} dB, Peak {:.1} dB",
        linear_to_db(rms(&output_samples)),
        linear_to_db(peak(&output_samples))
    );

    println!("\nWriting {}...", args.output.display());
    write_wav(&args.output, &output_samples, out_spec)?;
    println!("Done!");

    Ok(())
}

fn next_horizon(pending: &VecDeque<ParamUpdate>, sample_rate: u32) -> usize {
    pending
        .front()
        .map_or(usize::MAX, |update| update.frame(sample_rate))
}

fn apply(update: &ParamUpdate, controls: &[Arc<dyn StageControl>]) {
    let Some(control) = controls.iter().find(|c| c.stage() == update.stage) else {
        return;
    };
    match control.set(&update.param, update.value.clone()) {
        Ok(()) => tracing::info!(
            stage = %update.stage,
            param = %update.param,
            value = %update.value,
            at = update.at,
            "parameter updated"
        ),
        Err(err) => {
            tracing::warn!(%err, "parameter update rejected");
            eprintln!("warning: {err}");
        }
    }
}

fn audio_thread(
    mut chain: ProcessingChain,
    mut source: FragmentSource,
    mut sink: FragmentSink,
    transport: &Transport,
) -> Result<(Vec<f32>, ProcessingChain), cadence_io::Error> {
    let Some(input) = chain.input_descriptor() else {
        return Err(cadence_io::Error::NotPrepared);
    };
    let mut fragment = Fragment::for_descriptor(&input);

    while transport.running.load(Ordering::Acquire) {
        if source.position() >= transport.horizon.load(Ordering::Acquire) {
            thread::yield_now();
            continue;
        }
        if !source.fill(&mut fragment) {
            break;
        }
        let out = chain.process(&mut fragment)?;
        let waveform = out.as_waveform().ok_or(cadence_io::Error::SpectrumOutput)?;
        sink.push(waveform)?;
        transport.position.store(source.position(), Ordering::Release);
    }

    Ok((sink.into_samples(), chain))
}

fn print_profile(chain: &ProcessingChain, file: &ChainFile) {
    let fragment_seconds = file.descriptor().fragment_seconds();
    println!("\nProfile:");
    println!("  {:20}  {:>8}  {:>10}  {:>7}", "Stage", "Calls", "Avg (us)", "Load %");
    for layout in chain.layout() {
        let Some(profile) = layout.profile else {
            continue;
        };
        let average = if profile.calls == 0 {
            0.0
        } else {
            profile.process.as_secs_f64() * 1e6 / profile.calls as f64
        };
        println!(
            "  {:20}  {:>8}  {:>10.2}  {:>7.2}",
            layout.name,
            profile.calls,
            average,
            profile.load_percent(fragment_seconds)
        );
    }
}
