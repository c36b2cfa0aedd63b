use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};
use midi_roll::{
    Args, CodecConfig, Command, Identity, JsonSink, LaneShift, PianoRoll, Preprocessor,
    discover_midi_files, export_midi_file, import_midi_file, parse_boundary, parse_shifts,
};
use std::fs::File;
use std::io::{BufReader, BufWriter};

fn main() -> Result<()> {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(LevelFilter::Debug);
    } else if std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(LevelFilter::Info);
    }
    logger.init();

    let mut config = CodecConfig::default();

    match args.command {
        Command::Encode { midi, output, grid } => {
            grid.apply(&mut config);

            info!("Encoding MIDI file: '{}'...", midi.display());
            let roll = import_midi_file(&midi, &config)
                .with_context(|| format!("Failed to encode {}", midi.display()))?;

            let (measures, slots, lanes) = roll.shape();
            info!(
                "Encoded {} measures of {}x{} with {} active cells..!",
                measures,
                slots,
                lanes,
                roll.active_cells()
            );
            if roll.len() < config.min_measures {
                info!(
                    "Note: fewer than {} measures, preprocessing would ignore this file",
                    config.min_measures
                );
            }

            if let Some(output) = output {
                let file = File::create(&output)
                    .with_context(|| format!("Failed to create {}", output.display()))?;
                serde_json::to_writer(BufWriter::new(file), &roll)?;
                info!("Wrote grid to '{}'", output.display());
            }
        }
        Command::Decode {
            roll,
            output,
            threshold,
            program,
            ticks_per_beat,
            boundary,
        } => {
            let file = File::open(&roll)
                .with_context(|| format!("Failed to open {}", roll.display()))?;
            let grid: PianoRoll = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to read grid from {}", roll.display()))?;
            grid.validate()?;

            config.slots_per_measure = grid.slots_per_measure;
            config.lanes = grid.lanes;
            config.threshold = threshold;
            config.program = program;
            config.ticks_per_beat = ticks_per_beat;
            config.boundary = parse_boundary(&boundary);
            debug!("Decoding with {:?}", config);

            export_midi_file(&output, &grid, &config)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(
                "Decoded {} measures into '{}'..!",
                grid.len(),
                output.display()
            );
        }
        Command::Preprocess {
            root,
            output,
            shift,
            min_measures,
            grid,
        } => {
            grid.apply(&mut config);
            config.min_measures = min_measures;

            info!("Loading songs from '{}'...", root.display());
            let files = discover_midi_files(&root)?;
            let preprocessor = Preprocessor::new(config);
            let mut sink = JsonSink::new(&output);

            let report = match shift.as_deref().map(parse_shifts) {
                Some(shifts) if !shifts.is_empty() => {
                    preprocessor.run(files, &LaneShift::new(shifts), &mut sink)?
                }
                _ => preprocessor.run(files, &Identity, &mut sink)?,
            };

            debug!("{:?}", report);
        }
    }

    Ok(())
}
