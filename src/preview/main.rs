// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("asimov-camera-preview requires the 'std' feature");

use asimov_camera_bridge::{
    cli::{self, handle_error, info_user, warn_user},
    shared::{
        CameraError, CameraEvent, CameraListener, ChannelSink, PixelFormat, PreviewConfig,
        WriteTarget,
    },
};
use asimov_module::SysexitsError::{self, *};
use clap::Parser;
use clientele::StandardOptions;
use dogma::Named;
use serde_json::json;
use std::{
    error::Error as StdError,
    io::{self, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

/// Drives a synthetic preview producer through the buffer swap and fetches
/// the latest frame at a separate rate.
#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    #[arg(long, default_value_t = 0)]
    camera: i32,

    #[arg(short, long = "size", value_parser = cli::parse_dimensions, default_value = "640x480")]
    size: (u32, u32),

    #[arg(long, default_value = "nv21")]
    format: PixelFormat,

    /// Producer frame rate in Hz.
    #[arg(short, long, value_parser = cli::parse_frequency, default_value = "30")]
    frequency: f64,

    /// Consumer fetch rate in Hz.
    #[arg(long, value_parser = cli::parse_frequency, default_value = "5")]
    fetch_rate: f64,

    /// Stop after this many fetched frames (0 runs until interrupted).
    #[arg(short = 'n', long, default_value_t = 0)]
    count: u64,

    /// Forward every produced frame to the sink as well.
    #[arg(long)]
    each_frame: bool,

    #[arg(
        value_name = "FORMAT",
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text"
    )]
    output: OutputFormat,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Jsonl,
}

pub fn main() -> Result<SysexitsError, Box<dyn StdError>> {
    asimov_module::dotenv().ok();
    let args = asimov_module::args_os()?;
    let options = Options::parse_from(args);

    if options.flags.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(EX_OK);
    }

    if options.flags.license {
        print!("{}", include_str!("../../UNLICENSE"));
        return Ok(EX_OK);
    }

    #[cfg(feature = "tracing")]
    asimov_module::init_tracing_subscriber(&options.flags).expect("failed to initialize logging");

    let exit_code = match run_preview(&options) {
        Ok(()) => EX_OK,
        Err(err) => handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

fn run_preview(opts: &Options) -> Result<(), CameraError> {
    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit2 = Arc::clone(&quit);
        ctrlc::set_handler(move || {
            quit2.store(true, Ordering::SeqCst);
        })
        .map_err(|e| CameraError::driver("installing the interrupt handler", e))?;
    }

    let (width, height) = opts.size;
    let config = PreviewConfig::new(width, height)
        .with_camera_id(opts.camera)
        .with_pixel_format(opts.format)
        .with_fetch_each_frame(opts.each_frame);

    let (sink, events) = ChannelSink::new(64);
    let sink = Arc::new(sink);
    let listener = Arc::new(CameraListener::new(opts.camera, sink.clone()));

    let seed = listener.start_preview(&config)?;
    info_user(
        &opts.flags,
        &format!(
            "preview {}x{} {} ({} bytes per buffer)",
            width,
            height,
            opts.format,
            listener.preview_buffers().capacity()
        ),
    );

    let producer = {
        let listener = Arc::clone(&listener);
        let quit = Arc::clone(&quit);
        let interval = Duration::from_secs_f64(1.0 / opts.frequency);
        thread::Builder::new()
            .name(format!("preview-{}", opts.camera))
            .spawn(move || produce(&listener, seed, &quit, interval))
            .map_err(|e| CameraError::driver("spawning the preview producer", e))?
    };
    let producer = scopeguard::guard(producer, |handle| {
        quit.store(true, Ordering::SeqCst);
        let _ = handle.join();
    });

    let fetch_interval = Duration::from_secs_f64(1.0 / opts.fetch_rate);
    let mut fetched = 0u64;
    let mut missed = 0u64;
    let mut forwarded = 0u64;

    while !quit.load(Ordering::SeqCst) {
        thread::sleep(fetch_interval);

        for event in events.try_iter() {
            if matches!(event, CameraEvent::FrameFetched { .. }) {
                forwarded += 1;
            }
        }

        let Some(frame) = listener.fetch_last_preview_frame() else {
            missed += 1;
            continue;
        };
        fetched += 1;

        let mut out = io::stdout().lock();
        let written = match opts.output {
            OutputFormat::Text => writeln!(
                &mut out,
                "{}: {}x{} {} {} bytes, first byte {:#04x}",
                frame.timestamp_ns,
                frame.width,
                frame.height,
                frame.pixel_format,
                frame.data.len(),
                frame.data.first().copied().unwrap_or(0),
            ),
            OutputFormat::Jsonl => writeln!(
                &mut out,
                "{}",
                json!({
                    "camera": opts.camera,
                    "timestamp_ns": frame.timestamp_ns,
                    "width": frame.width,
                    "height": frame.height,
                    "format": frame.pixel_format.name(),
                    "bytes": frame.data.len(),
                    "first_byte": frame.data.first().copied().unwrap_or(0),
                })
            ),
        };
        if let Err(err) = written {
            if err.kind() == io::ErrorKind::BrokenPipe {
                break;
            }
            return Err(CameraError::driver("writing a preview line", err));
        }

        if opts.count > 0 && fetched >= opts.count {
            break;
        }
    }

    drop(producer);

    if missed > 0 {
        warn_user(&opts.flags, &format!("{missed} fetches found no new frame"));
    }
    info_user(
        &opts.flags,
        &format!(
            "fetched {fetched} frames, {forwarded} forwarded, {} sink events dropped",
            sink.dropped()
        ),
    );
    Ok(())
}

/// Stands in for the platform camera: fills each lent buffer with the frame
/// counter and hands it back.
fn produce(listener: &CameraListener, seed: WriteTarget, quit: &AtomicBool, interval: Duration) {
    let mut target = Some(seed);
    let mut counter = 0u8;

    while !quit.load(Ordering::SeqCst) {
        thread::sleep(interval);
        let Some(mut buf) = target.take().or_else(|| listener.callback_buffer()) else {
            continue;
        };
        buf.fill(counter);
        counter = counter.wrapping_add(1);
        target = listener.on_preview_frame(buf);
    }
}
