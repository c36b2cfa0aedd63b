use crate::midi_importer::import_midi_file;
use crate::model::config::CodecConfig;
use crate::model::roll::{Measure, PianoRoll};
use anyhow::{Context, Result, bail, ensure};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Produces training variants of one file's roll.
pub trait Augmenter {
    fn augment(&self, roll: PianoRoll) -> Vec<PianoRoll>;
}

/// Keeps the roll as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl Augmenter for Identity {
    fn augment(&self, roll: PianoRoll) -> Vec<PianoRoll> {
        vec![roll]
    }
}

/// One variant per lane shift. Shifts that would move a note out of the window are skipped.
#[derive(Debug, Clone)]
pub struct LaneShift {
    shifts: Vec<i32>,
}

impl LaneShift {
    pub fn new(shifts: Vec<i32>) -> Self {
        Self { shifts }
    }
}

impl Augmenter for LaneShift {
    fn augment(&self, roll: PianoRoll) -> Vec<PianoRoll> {
        self.shifts
            .iter()
            .filter_map(|&shift| {
                let variant = roll.transposed(shift);
                if variant.is_none() {
                    debug!("Shift of {} leaves the lane window, skipping variant..!", shift);
                }
                variant
            })
            .collect()
    }
}

/// Receives every variant that survives preprocessing.
pub trait SampleSink {
    fn push(&mut self, roll: &PianoRoll) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Flattened measures plus how many of them each variant contributed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub slots_per_measure: usize,
    pub lanes: usize,
    pub samples: Vec<Measure>,
    pub lengths: Vec<usize>,
}

impl Dataset {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open dataset {}", path.as_ref().display()))?;
        let dataset: Dataset = serde_json::from_reader(BufReader::new(file))?;
        dataset.check()?;
        Ok(dataset)
    }

    fn check(&self) -> Result<()> {
        ensure!(
            self.lengths.iter().sum::<usize>() == self.samples.len(),
            "dataset lengths add up to {} but it holds {} samples",
            self.lengths.iter().sum::<usize>(),
            self.samples.len()
        );
        Ok(())
    }
}

/// Collects variants in memory and writes them as one JSON document on `finish`.
#[derive(Debug)]
pub struct JsonSink {
    path: PathBuf,
    dataset: Dataset,
}

impl JsonSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            dataset: Dataset::default(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}

impl SampleSink for JsonSink {
    fn push(&mut self, roll: &PianoRoll) -> Result<()> {
        if self.dataset.lengths.is_empty() {
            self.dataset.slots_per_measure = roll.slots_per_measure;
            self.dataset.lanes = roll.lanes;
        } else if (self.dataset.slots_per_measure, self.dataset.lanes)
            != (roll.slots_per_measure, roll.lanes)
        {
            bail!(
                "Cannot mix {}x{} rolls into a {}x{} dataset..!",
                roll.slots_per_measure,
                roll.lanes,
                self.dataset.slots_per_measure,
                self.dataset.lanes
            );
        }

        self.dataset.lengths.push(roll.len());
        self.dataset.samples.extend(roll.measures().iter().cloned());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.dataset.check()?;

        info!(
            "Saving {} samples to {}...",
            self.dataset.samples.len(),
            self.path.display()
        );
        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))?;
        serde_json::to_writer(BufWriter::new(file), &self.dataset)?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessReport {
    pub succeeded: usize,
    pub ignored: usize,
    pub failed: usize,
}

impl PreprocessReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.ignored + self.failed
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: CodecConfig,
}

impl Preprocessor {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Encodes every file, drops files that fail or are too short, and hands the
    /// augmented variants to `sink`. Only sink errors abort the batch.
    pub fn run<I, A, S>(&self, files: I, augmenter: &A, sink: &mut S) -> Result<PreprocessReport>
    where
        I: IntoIterator<Item = PathBuf>,
        A: Augmenter + ?Sized,
        S: SampleSink + ?Sized,
    {
        self.config.validate()?;
        let mut report = PreprocessReport::default();

        for path in files {
            let roll = match import_midi_file(&path, &self.config) {
                Ok(roll) => roll,
                Err(why) => {
                    warn!("Failed to encode {}: {}..!", path.display(), why);
                    report.failed += 1;
                    continue;
                }
            };

            if roll.len() < self.config.min_measures {
                warn!(
                    "{} is too short ({} of {} measures), unused..!",
                    path.display(),
                    roll.len(),
                    self.config.min_measures
                );
                report.ignored += 1;
                continue;
            }

            let variants = augmenter.augment(roll);
            for variant in variants.iter() {
                sink.push(variant)?;
            }

            info!("Encoded {} into {} variant(s)", path.display(), variants.len());
            report.succeeded += 1;
        }

        sink.finish()?;
        info!(
            "Done: {} succeeded, {} ignored, {} failed of {} in total",
            report.succeeded,
            report.ignored,
            report.failed,
            report.total()
        );

        Ok(report)
    }
}

/// Every `.mid`/`.midi` file below `root`, sorted.
pub fn discover_midi_files<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.as_ref().to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            // Symlinked directories are not followed.
            if entry.file_type()?.is_dir() {
                pending.push(path);
                continue;
            }

            let is_midi = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi"))
                .unwrap_or(false);
            if is_midi {
                found.push(path);
            }
        }
    }

    found.sort();
    debug!("Found {} MIDI files under {}", found.len(), root.as_ref().display());
    Ok(found)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::midi_exporter::roll_to_midi_bytes;

    fn roll_of(measures: usize, lanes: usize, lane: usize) -> PianoRoll {
        let mut roll = PianoRoll::new(96, lanes);
        for idx in 0..measures {
            roll.ensure_measure(idx).unwrap().set(0, lane, 1);
        }
        roll
    }

    fn write_roll(path: &Path, roll: &PianoRoll) {
        let config = CodecConfig {
            lanes: roll.lanes,
            ..CodecConfig::default()
        };
        fs::write(path, roll_to_midi_bytes(roll, &config).unwrap()).unwrap();
    }

    #[test]
    fn lane_shift_skips_variants_leaving_the_window() {
        let roll = roll_of(2, 96, 94);
        let variants = LaneShift::new(vec![-2, 0, 1, 2]).augment(roll);

        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0].measures()[0].get(0, 92), 1);
        assert_eq!(variants[2].measures()[1].get(0, 95), 1);
    }

    #[test]
    fn sink_tracks_lengths() {
        let mut sink = JsonSink::new("unused.json");
        sink.push(&roll_of(3, 96, 10)).unwrap();
        sink.push(&roll_of(2, 96, 11)).unwrap();

        assert_eq!(sink.dataset().lengths, vec![3, 2]);
        assert_eq!(sink.dataset().samples.len(), 5);
        assert!(sink.push(&roll_of(1, 88, 0)).is_err());
    }

    #[test]
    fn batch_tallies_outcomes() {
        env_logger::try_init().unwrap_or(());

        let root = std::env::temp_dir().join(format!("midi_roll_batch_{}", std::process::id()));
        let nested = root.join("nested");
        fs::create_dir_all(&nested).unwrap();

        write_roll(&root.join("long.mid"), &roll_of(20, 96, 30));
        write_roll(&nested.join("short.MIDI"), &roll_of(2, 96, 30));
        // Pitch 127 is outside the default 96 lane window.
        write_roll(&nested.join("high.mid"), &roll_of(20, 128, 127));
        fs::write(root.join("broken.mid"), b"not a midi file").unwrap();
        fs::write(root.join("notes.txt"), b"ignored").unwrap();

        let files = discover_midi_files(&root).unwrap();
        assert_eq!(files.len(), 4);

        let out = root.join("dataset.json");
        let mut sink = JsonSink::new(&out);
        let report = Preprocessor::new(CodecConfig::default())
            .run(files, &LaneShift::new(vec![-1, 0, 1]), &mut sink)
            .unwrap();

        assert_eq!(
            report,
            PreprocessReport {
                succeeded: 1,
                ignored: 1,
                failed: 2
            }
        );

        let dataset = Dataset::load(&out).unwrap();
        assert_eq!(dataset.lengths, vec![20, 20, 20]);
        assert_eq!(dataset.samples.len(), 60);
        assert_eq!(dataset.samples[20].get(0, 30), 1);

        fs::remove_dir_all(&root).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn discovery_does_not_follow_directory_links() {
        let root = std::env::temp_dir().join(format!("midi_roll_links_{}", std::process::id()));
        let nested = root.join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("song.mid"), b"").unwrap();
        std::os::unix::fs::symlink(&root, nested.join("loop")).unwrap();

        let files = discover_midi_files(&root).unwrap();
        assert_eq!(files, vec![nested.join("song.mid")]);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(discover_midi_files("./no/such/dir").is_err());
    }
}
