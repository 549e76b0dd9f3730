use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::path::PathBuf;
use std::sync::mpsc;

use libdiff_tomo::config::Config;
use libdiff_tomo::error::ProcessorError;
use libdiff_tomo::process::{process_reduce, process_sinogram};
use libdiff_tomo::timing::RunSummary;
use libdiff_tomo::worker_status::RunStatus;

/// Arguments shared by the processing subcommands. Each one overrides the matching
/// config field.
fn override_args() -> Vec<Arg> {
    vec![
        Arg::new("output")
            .long("output")
            .short('o')
            .value_parser(value_parser!(PathBuf))
            .help("Output HDF5 file"),
        Arg::new("dir")
            .long("dir")
            .value_parser(value_parser!(PathBuf))
            .help("Directory searched for exposures"),
        Arg::new("prefix")
            .long("prefix")
            .help("File name prefix of the exposures"),
        Arg::new("ext")
            .long("ext")
            .help("File extension of the exposures"),
        Arg::new("ntrans")
            .long("ntrans")
            .value_parser(value_parser!(usize))
            .help("Translation steps per rotation"),
        Arg::new("nrot")
            .long("nrot")
            .value_parser(value_parser!(usize))
            .help("Maximum number of rotations"),
        Arg::new("ndiff")
            .long("ndiff")
            .value_parser(value_parser!(usize))
            .help("Diffraction bins per pattern"),
        Arg::new("offset")
            .long("offset")
            .value_parser(value_parser!(u64))
            .help("Sequence number of the first exposure of the scan"),
        Arg::new("dark")
            .long("dark")
            .action(ArgAction::Append)
            .value_parser(value_parser!(PathBuf))
            .help("Dark frame; may be given multiple times"),
        Arg::new("flat")
            .long("flat")
            .action(ArgAction::Append)
            .value_parser(value_parser!(PathBuf))
            .help("Flat field frame; may be given multiple times"),
        Arg::new("mask")
            .long("mask")
            .value_parser(value_parser!(PathBuf))
            .help("Pixel mask, nonzero pixels are excluded"),
        Arg::new("calibration")
            .long("calibration")
            .value_parser(value_parser!(PathBuf))
            .help("Calibration lookup table"),
        Arg::new("accelerate")
            .long("accelerate")
            .action(ArgAction::SetTrue)
            .help("Integrate in parallel"),
        Arg::new("overwrite")
            .long("overwrite")
            .value_parser(value_parser!(bool))
            .help("Truncate (true) or append to (false) an existing output"),
        Arg::new("files")
            .num_args(0..)
            .value_parser(value_parser!(PathBuf))
            .help("Exposures to process, replacing any input selection from the config"),
    ]
}

fn apply_overrides(config: &mut Config, matches: &ArgMatches) {
    if let Some(path) = matches.get_one::<PathBuf>("output") {
        config.output_path = path.clone();
    }
    if let Some(path) = matches.get_one::<PathBuf>("dir") {
        config.input_directory = Some(path.clone());
    }
    if let Some(prefix) = matches.get_one::<String>("prefix") {
        config.input_prefix = prefix.clone();
    }
    if let Some(ext) = matches.get_one::<String>("ext") {
        config.input_extension = ext.clone();
    }
    if let Some(n) = matches.get_one::<usize>("ntrans") {
        config.n_trans = *n;
    }
    if let Some(n) = matches.get_one::<usize>("nrot") {
        config.n_rot = Some(*n);
    }
    if let Some(n) = matches.get_one::<usize>("ndiff") {
        config.n_diff = *n;
    }
    if let Some(offset) = matches.get_one::<u64>("offset") {
        config.offset = *offset;
    }
    if let Some(darks) = matches.get_many::<PathBuf>("dark") {
        config.dark_files = darks.cloned().collect();
    }
    if let Some(flats) = matches.get_many::<PathBuf>("flat") {
        config.flat_files = flats.cloned().collect();
    }
    if let Some(path) = matches.get_one::<PathBuf>("mask") {
        config.mask_path = Some(path.clone());
    }
    if let Some(path) = matches.get_one::<PathBuf>("calibration") {
        config.calibration_path = Some(path.clone());
    }
    if matches.get_flag("accelerate") {
        config.accelerate = true;
    }
    if let Some(overwrite) = matches.get_one::<bool>("overwrite") {
        config.overwrite = *overwrite;
    }
    if let Some(files) = matches.get_many::<PathBuf>("files") {
        config.input_files = files.cloned().collect();
    }
}

fn log_config(config: &Config) {
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    if !config.input_files.is_empty() {
        log::info!("Input Files: {} given explicitly", config.input_files.len());
    } else if let Some(dir) = &config.input_directory {
        log::info!(
            "Input Directory: {} (prefix '{}', extension '{}')",
            dir.to_string_lossy(),
            config.input_prefix,
            config.input_extension
        );
    }
    if let Some(calibration) = &config.calibration_path {
        log::info!("Calibration Path: {}", calibration.to_string_lossy());
    }
    log::info!(
        "Translations: {} Diffraction Bins: {} Offset: {}",
        config.n_trans,
        config.n_diff,
        config.offset
    );
    if let Some(n_rot) = config.n_rot {
        log::info!("Rotation Limit: {n_rot}");
    }
    log::info!(
        "Darks: {} Flats: {} Mask: {}",
        config.dark_files.len(),
        config.flat_files.len(),
        config.has_mask()
    );
    log::info!("Radial Axis Policy: {:?}", config.radial_axis_policy);
}

fn main() {
    // Create a cli
    let matches = Command::new("diff_tomo_cli")
        .about("Assemble diffraction exposures into a tomography sinogram")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to the configuration file"),
        )
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("sinogram")
                .about("Reduce exposures and assemble them into a sinogram")
                .args(override_args()),
        )
        .subcommand(
            Command::new("reduce")
                .about("Reduce exposures to a stack of 1D patterns")
                .args(override_args()),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    let Some((command, sub_matches)) = matches.subcommand() else {
        return;
    };
    let Some(config_path) = sub_matches
        .get_one::<PathBuf>("path")
        .or_else(|| matches.get_one::<PathBuf>("path"))
        .cloned()
    else {
        log::error!("A configuration path is required (-p/--path).");
        std::process::exit(1);
    };

    if command == "new" {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        if let Err(e) = Config::default().write_config_file(&config_path) {
            log::error!("Could not write template config: {e}");
            std::process::exit(1);
        }
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let mut config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };
    apply_overrides(&mut config, sub_matches);
    log::info!("Config successfully loaded.");
    log_config(&config);

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(0));
    if let Ok(style) =
        ProgressStyle::with_template("{bar:40} {pos}/{len} [{elapsed_precise}] {msg}")
    {
        pb.set_style(style);
    }
    let (tx, rx) = mpsc::channel::<RunStatus>();
    // Spawn the task!
    let is_sinogram = command == "sinogram";
    let handle = std::thread::spawn(move || -> Result<RunSummary, ProcessorError> {
        if is_sinogram {
            process_sinogram(&config, Some(&tx))
        } else {
            process_reduce(&config, Some(&tx))
        }
    });

    // The channel closes when the worker returns
    for status in rx.iter() {
        pb.set_length(status.frames_total as u64);
        pb.set_position(status.frames_done as u64);
        pb.set_message(status.current_file);
    }
    pb.finish_and_clear();

    let failed = match handle.join() {
        Ok(Ok(summary)) => {
            log::info!("Successfully finished {command}: {summary}");
            false
        }
        Ok(Err(e)) => {
            log::error!("Processing failed with error: {e}");
            true
        }
        Err(_) => {
            log::error!("Failed to join processing task!");
            true
        }
    };

    if failed {
        std::process::exit(1);
    }
    log::info!("Done.");
}
