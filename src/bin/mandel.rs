extern crate clap;
extern crate crossbeam;
extern crate failure;
extern crate mandelround;
extern crate num_cpus;
extern crate tracing;
extern crate tracing_subscriber;

use clap::{App, Arg, ArgMatches};
use failure::format_err;
use mandelround::{Coordinator, Engine, EngineConfig, Error, FrameViewer, ViewBounds};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

/// Bounds may be given as four numbers or by preset name.
fn parse_bounds(s: &str) -> Result<ViewBounds, Error> {
    match s.trim() {
        "default" => Ok(ViewBounds::DEFAULT),
        "zoomed" => Ok(ViewBounds::ZOOMED),
        other => other.parse(),
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_number<T: FromStr>(s: &str, err: &str) -> Result<(), String> {
    match T::from_str(s) {
        Ok(_) => Ok(()),
        Err(_) => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + Ord>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_bounds(s: &str) -> Result<(), String> {
    parse_bounds(s)
        .and_then(|bounds| bounds.validate())
        .map_err(|e| e.to_string())
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const THREADS: &str = "threads";
const ITERATIONS: &str = "iterations";
const BOUNDS: &str = "bounds";
const WATCH: &str = "watch";
const POLL: &str = "poll-ms";

fn args<'a>() -> ArgMatches<'a> {
    App::new("mandel")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Round-synchronized Mandelbrot renderer")
        .arg(
            Arg::with_name(OUTPUT)
                .required(false)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .default_value("output.tga")
                .help("File every finished frame is published to"),
        )
        .arg(
            Arg::with_name(SIZE)
                .required(false)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("640x480")
                .validator(|s| validate_pair::<u16>(&s, 'x', "Could not parse output image size"))
                .help("Size of output image"),
        )
        .arg(
            Arg::with_name(THREADS)
                .required(false)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(|s| validate_number::<usize>(&s, "Could not parse thread count"))
                .help("Number of worker threads (defaults to the number of CPUs)"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .required(false)
                .long(ITERATIONS)
                .short("i")
                .takes_value(true)
                .default_value("1000")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        1_000_000,
                        "Could not parse iteration count",
                        "Iteration count must be between 1 and 1000000",
                    )
                })
                .help("Iteration cap per pixel"),
        )
        .arg(
            Arg::with_name(BOUNDS)
                .required(false)
                .long(BOUNDS)
                .short("b")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .allow_hyphen_values(true)
                .validator(|s| validate_bounds(&s))
                .help(
                    "View bounds as left,right,top,bottom or a preset (default, zoomed). \
                     May be repeated; without it bounds are read from stdin",
                ),
        )
        .arg(
            Arg::with_name(WATCH)
                .long(WATCH)
                .short("w")
                .help("Run a viewer that reports every frame it reloads"),
        )
        .arg(
            Arg::with_name(POLL)
                .long(POLL)
                .takes_value(true)
                .default_value("50")
                .validator(|s| validate_number::<u64>(&s, "Could not parse poll interval"))
                .help("Viewer poll interval in milliseconds"),
        )
        .get_matches()
}

fn config_from(matches: &ArgMatches) -> Result<EngineConfig, failure::Error> {
    let (width, height) = matches
        .value_of(SIZE)
        .and_then(|s| parse_pair::<usize>(s, 'x'))
        .ok_or_else(|| format_err!("Error parsing image dimensions"))?;
    let workers = match matches.value_of(THREADS) {
        Some(threads) => usize::from_str(threads)?,
        None => num_cpus::get().min(height).max(1),
    };
    let max_iterations = u32::from_str(matches.value_of(ITERATIONS).unwrap_or("1000"))?;
    let output = PathBuf::from(matches.value_of(OUTPUT).unwrap_or("output.tga"));
    Ok(EngineConfig {
        width,
        height,
        workers,
        max_iterations,
        output,
    })
}

/// Submit each set of bounds in turn, letting every round finish.
fn batch(coordinator: &Coordinator, rounds: &[ViewBounds]) -> Result<(), Error> {
    for bounds in rounds {
        let round = coordinator.submit_bounds(*bounds)?;
        coordinator.wait_for_drain()?;
        println!("round {} published", round);
    }
    Ok(())
}

/// Read bounds from stdin until it closes or the user quits.
fn interactive(coordinator: &Coordinator) -> Result<(), failure::Error> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    println!("Mandelbrot renderer");
    println!("Default: left -2.0, right 1.0, top 1.125, bottom -1.125");
    println!("Zoomed:  left -0.751085, right -0.734975, top 0.118378, bottom 0.134488");
    loop {
        print!("bounds (left right top bottom | default | zoomed | q): ");
        io::stdout().flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "q" || line == "quit" {
            break;
        }
        let bounds = match parse_bounds(line) {
            Ok(bounds) => bounds,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        match coordinator.submit_bounds(bounds) {
            Ok(round) => {
                coordinator.wait_for_drain()?;
                println!("round {} published", round);
            }
            Err(ref e) if e.is_recoverable() => println!("{}", e),
            Err(e) => return Err(e.into()),
        }
    }
    println!();
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<(), failure::Error> {
    let config = config_from(matches)?;
    let engine = Engine::new(config)?;
    let rounds: Vec<ViewBounds> = match matches.values_of(BOUNDS) {
        Some(values) => values.map(parse_bounds).collect::<Result<_, _>>()?,
        None => vec![],
    };
    let poll = Duration::from_millis(u64::from_str(matches.value_of(POLL).unwrap_or("50"))?);
    let watch = matches.is_present(WATCH);

    let freshness = engine.freshness();
    let (stop, stopped) = crossbeam::channel::bounded::<()>(1);
    let outcome = crossbeam::scope(|scope| {
        if watch {
            let stopped = &stopped;
            scope.spawn(move |_| {
                let mut viewer = FrameViewer::new(freshness);
                viewer.watch(poll, stopped, |frame| {
                    let (width, height) = frame.image.dimensions();
                    info!(round = frame.handle.round(), width, height, "viewer reloaded frame");
                });
                match viewer.current() {
                    Some(frame) => info!(round = frame.handle.round(), "viewer stopped"),
                    None => info!("viewer stopped before any frame was published"),
                }
            });
        }
        let result = engine.run(|coordinator| {
            if rounds.is_empty() {
                interactive(coordinator)
            } else {
                batch(coordinator, &rounds).map_err(failure::Error::from)
            }
        });
        drop(stop);
        result
    })
    .map_err(|_| format_err!("viewer thread panicked"))?;
    outcome??;
    Ok(())
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();

    let matches = args();
    if let Err(e) = run(&matches) {
        eprintln!("mandel: {}", e);
        std::process::exit(1);
    }
}
