//! Training samples per gesture label.
//!
//! The data directory holds one text file per label (`palm.txt`, `fist.txt`,
//! `peace.txt`, `thumbs_up.txt`). Every non-blank line is one feature vector
//! written as comma-separated decimals. Values are written with the shortest
//! representation that parses back to the same `f32`, so a write followed by
//! a load is lossless.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    error::{Error, Result},
    types::{FEATURE_LEN, FeatureVector, GestureLabel},
};

const SAMPLE_EXTENSION: &str = "txt";
const BACKUP_SUFFIX: &str = "_backup";

/// Labelled feature vectors, read-only once loaded.
#[derive(Clone, Debug, Default)]
pub struct SampleStore {
    samples: [Vec<FeatureVector>; GestureLabel::ALL.len()],
}

/// A line of a sample file that could not be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedLine {
    pub line: usize,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub struct LabelReport {
    pub label: GestureLabel,
    pub path: PathBuf,
    pub present: bool,
    pub samples: usize,
    pub malformed: Vec<MalformedLine>,
}

/// What a scan of the data directory found.
#[derive(Clone, Debug)]
pub struct LoadReport {
    pub dir: PathBuf,
    pub labels: Vec<LabelReport>,
    pub unrecognized: Vec<PathBuf>,
}

impl LoadReport {
    pub fn malformed_total(&self) -> usize {
        self.labels.iter().map(|l| l.malformed.len()).sum()
    }

    pub fn total_samples(&self) -> usize {
        self.labels.iter().map(|l| l.samples).sum()
    }

    pub fn missing(&self) -> Vec<GestureLabel> {
        self.labels
            .iter()
            .filter(|l| !l.present)
            .map(|l| l.label)
            .collect()
    }
}

impl SampleStore {
    pub fn from_samples<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (GestureLabel, Vec<FeatureVector>)>,
    {
        let mut store = SampleStore::default();
        for (label, vectors) in entries {
            store.samples[label.index()].extend(vectors);
        }
        store
    }

    /// Loads every label file under `dir`. Fails with
    /// [`Error::NoTrainingData`] when no label has a usable sample.
    pub fn load(dir: &Path) -> Result<(Self, LoadReport)> {
        let (store, report) = Self::scan(dir)?;

        for label in &report.labels {
            if !label.present {
                log::warn!("{} not found, {} is unavailable", label.path.display(), label.label);
            } else if label.samples == 0 {
                log::warn!("no valid samples in {}", label.path.display());
            } else {
                log::info!("loaded {}: {} samples", label.label, label.samples);
            }
            for bad in &label.malformed {
                log::warn!(
                    "skipping malformed sample {}:{}: {}",
                    label.path.display(),
                    bad.line,
                    bad.reason
                );
            }
        }
        for path in &report.unrecognized {
            log::warn!("ignoring {}: not a known gesture label", path.display());
        }
        if report.malformed_total() > 0 {
            log::warn!("skipped {} malformed samples", report.malformed_total());
        }

        if store.is_empty() {
            return Err(Error::NoTrainingData {
                dir: dir.to_path_buf(),
            });
        }
        Ok((store, report))
    }

    /// Reads whatever is present under `dir` without requiring any samples.
    /// A missing directory reads as every label missing.
    pub fn scan(dir: &Path) -> Result<(Self, LoadReport)> {
        let mut store = SampleStore::default();
        let mut labels = Vec::with_capacity(GestureLabel::ALL.len());

        for label in GestureLabel::ALL {
            let path = label_path(dir, label);
            if !path.is_file() {
                labels.push(LabelReport {
                    label,
                    path,
                    present: false,
                    samples: 0,
                    malformed: Vec::new(),
                });
                continue;
            }

            let content = fs::read(&path)?;
            let (vectors, malformed) = parse_samples(&content);
            labels.push(LabelReport {
                label,
                path,
                present: true,
                samples: vectors.len(),
                malformed,
            });
            store.samples[label.index()] = vectors;
        }

        let unrecognized = if dir.is_dir() {
            unrecognized_files(dir)?
        } else {
            Vec::new()
        };

        let report = LoadReport {
            dir: dir.to_path_buf(),
            labels,
            unrecognized,
        };
        Ok((store, report))
    }

    pub fn samples(&self, label: GestureLabel) -> &[FeatureVector] {
        &self.samples[label.index()]
    }

    pub fn len(&self) -> usize {
        self.samples.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn label_counts(&self) -> [(GestureLabel, usize); GestureLabel::ALL.len()] {
        GestureLabel::ALL.map(|label| (label, self.samples(label).len()))
    }

    /// Samples in label enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (GestureLabel, &FeatureVector)> {
        GestureLabel::ALL
            .into_iter()
            .flat_map(move |label| self.samples(label).iter().map(move |v| (label, v)))
    }
}

pub fn label_path(dir: &Path, label: GestureLabel) -> PathBuf {
    dir.join(format!("{}.{SAMPLE_EXTENSION}", label.file_stem()))
}

/// Parses raw file bytes line by line. A line that is not UTF-8 is malformed
/// like any other unparseable line.
fn parse_samples(content: &[u8]) -> (Vec<FeatureVector>, Vec<MalformedLine>) {
    let mut vectors = Vec::new();
    let mut malformed = Vec::new();

    for (idx, raw) in content.split(|b| *b == b'\n').enumerate() {
        let Ok(line) = std::str::from_utf8(raw) else {
            malformed.push(MalformedLine {
                line: idx + 1,
                reason: "not valid UTF-8".to_string(),
            });
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_vector(line) {
            Ok(vector) => vectors.push(vector),
            Err(reason) => malformed.push(MalformedLine {
                line: idx + 1,
                reason,
            }),
        }
    }

    (vectors, malformed)
}

pub(crate) fn parse_vector(line: &str) -> std::result::Result<FeatureVector, String> {
    let values = line
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f32>()
                .map_err(|_| format!("`{}` is not a number", v.trim()))
        })
        .collect::<std::result::Result<Vec<f32>, String>>()?;

    if values.len() != FEATURE_LEN {
        return Err(format!(
            "expected {FEATURE_LEN} values, found {}",
            values.len()
        ));
    }
    FeatureVector::from_slice(&values).ok_or_else(|| "contains a non-finite value".to_string())
}

pub fn format_vector(vector: &FeatureVector) -> String {
    vector
        .as_slice()
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn unrecognized_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SAMPLE_EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let known = GestureLabel::ALL.iter().any(|l| l.file_stem() == stem);
        if !known && !stem.ends_with(BACKUP_SUFFIX) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Writes `samples` to the label's file, replacing it unless `append` is
/// set. Creates the data directory when needed.
pub fn write_label_file(
    dir: &Path,
    label: GestureLabel,
    samples: &[FeatureVector],
    append: bool,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = label_path(dir, label);

    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(&path)?;
    for sample in samples {
        writeln!(file, "{}", format_vector(sample))?;
    }
    file.sync_all()?;

    Ok(path)
}

/// Outcome of regrouping a damaged sample file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepairReport {
    pub samples: usize,
    /// Trailing values that did not fill a whole sample.
    pub dropped_values: usize,
    pub backup: PathBuf,
}

/// Regroups a sample file whose values were split across lines or run
/// together: every value is collected in order and re-emitted `FEATURE_LEN`
/// per line. The original file is copied to `<stem>_backup.txt` first.
pub fn repair_label_file(dir: &Path, label: GestureLabel) -> Result<RepairReport> {
    let path = label_path(dir, label);
    let raw = fs::read(&path)?;

    let backup = dir.join(format!(
        "{}{BACKUP_SUFFIX}.{SAMPLE_EXTENSION}",
        label.file_stem()
    ));
    fs::write(&backup, &raw)?;

    let (lines, dropped_values) = regroup_values(&String::from_utf8_lossy(&raw));
    let mut output = String::new();
    for line in &lines {
        output.push_str(line);
        output.push('\n');
    }
    fs::write(&path, output)?;

    Ok(RepairReport {
        samples: lines.len(),
        dropped_values,
        backup,
    })
}

fn regroup_values(content: &str) -> (Vec<String>, usize) {
    let values: Vec<&str> = content
        .split(|c: char| c == ',' || c == '\n' || c == '\r')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    let chunks = values.chunks_exact(FEATURE_LEN);
    let dropped = chunks.remainder().len();
    let lines = chunks.map(|chunk| chunk.join(",")).collect();
    (lines, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vector(seed: f32) -> FeatureVector {
        let mut values = [0.0f32; FEATURE_LEN];
        for (i, v) in values.iter_mut().enumerate() {
            *v = seed * (i as f32 + 1.0) / 7.0 - 0.3;
        }
        FeatureVector::from(values)
    }

    fn line(values: usize) -> String {
        vec!["0.25"; values].join(",")
    }

    #[test]
    fn write_then_load_is_lossless() {
        let dir = TempDir::new().unwrap();
        let samples = vec![vector(0.1), vector(-1.3), vector(0.123_456_79)];
        write_label_file(dir.path(), GestureLabel::Peace, &samples, false).unwrap();

        let (store, report) = SampleStore::load(dir.path()).unwrap();
        assert_eq!(store.samples(GestureLabel::Peace), samples.as_slice());
        assert_eq!(report.malformed_total(), 0);
        assert_eq!(report.missing().len(), 3);
    }

    #[test]
    fn append_keeps_existing_samples() {
        let dir = TempDir::new().unwrap();
        write_label_file(dir.path(), GestureLabel::Fist, &[vector(0.5)], false).unwrap();
        write_label_file(dir.path(), GestureLabel::Fist, &[vector(0.7)], true).unwrap();

        let (store, _) = SampleStore::load(dir.path()).unwrap();
        assert_eq!(store.samples(GestureLabel::Fist), &[vector(0.5), vector(0.7)]);
    }

    #[test]
    fn malformed_lines_are_skipped_and_counted() {
        let dir = TempDir::new().unwrap();
        let content = format!(
            "{}\n\n{}\n{}\nnot,numbers\n{}\n",
            line(42),
            line(41),
            line(42),
            line(43)
        );
        fs::write(label_path(dir.path(), GestureLabel::Palm), content).unwrap();

        let (store, report) = SampleStore::load(dir.path()).unwrap();
        assert_eq!(store.samples(GestureLabel::Palm).len(), 2);
        assert_eq!(report.malformed_total(), 3);
        let lines: Vec<usize> = report.labels[0].malformed.iter().map(|m| m.line).collect();
        assert_eq!(lines, vec![3, 5, 6]);
    }

    #[test]
    fn invalid_utf8_line_is_malformed_not_fatal() {
        let dir = TempDir::new().unwrap();
        write_label_file(dir.path(), GestureLabel::Palm, &[vector(0.2)], false).unwrap();
        let mut content = format!("{}\r\n", line(42)).into_bytes();
        content.extend_from_slice(b"\xff\xfe,1\n");
        fs::write(label_path(dir.path(), GestureLabel::Fist), content).unwrap();

        let (store, report) = SampleStore::load(dir.path()).unwrap();
        assert_eq!(store.samples(GestureLabel::Palm).len(), 1);
        assert_eq!(store.samples(GestureLabel::Fist).len(), 1);
        assert_eq!(report.malformed_total(), 1);
        assert_eq!(
            report.labels[GestureLabel::Fist.index()].malformed,
            vec![MalformedLine {
                line: 2,
                reason: "not valid UTF-8".to_string(),
            }]
        );
    }

    #[test]
    fn no_usable_samples_is_no_training_data() {
        let dir = TempDir::new().unwrap();
        fs::write(label_path(dir.path(), GestureLabel::Palm), line(10)).unwrap();

        let err = SampleStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::NoTrainingData { .. }));

        let missing = dir.path().join("does-not-exist");
        assert!(matches!(
            SampleStore::load(&missing),
            Err(Error::NoTrainingData { .. })
        ));
    }

    #[test]
    fn unknown_label_files_are_reported() {
        let dir = TempDir::new().unwrap();
        write_label_file(dir.path(), GestureLabel::Palm, &[vector(1.0)], false).unwrap();
        fs::write(dir.path().join("wave.txt"), line(42)).unwrap();
        fs::write(dir.path().join("palm_backup.txt"), line(42)).unwrap();
        fs::write(dir.path().join("notes.md"), "hello").unwrap();

        let (store, report) = SampleStore::load(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(report.unrecognized, vec![dir.path().join("wave.txt")]);
    }

    #[test]
    fn iteration_follows_label_order() {
        let store = SampleStore::from_samples(vec![
            (GestureLabel::ThumbsUp, vec![vector(0.3)]),
            (GestureLabel::Palm, vec![vector(0.1), vector(0.2)]),
        ]);
        let labels: Vec<GestureLabel> = store.iter().map(|(l, _)| l).collect();
        assert_eq!(
            labels,
            vec![GestureLabel::Palm, GestureLabel::Palm, GestureLabel::ThumbsUp]
        );
        assert_eq!(store.label_counts()[3], (GestureLabel::ThumbsUp, 1));
    }

    #[test]
    fn repair_regroups_split_values() {
        let dir = TempDir::new().unwrap();
        let a = format_vector(&vector(0.4));
        let b = format_vector(&vector(0.9));
        // Both samples broken over several lines with stray spaces.
        let broken = format!("{}\n{} , 1.5\n", a.replacen(',', "\n", 5), b);
        let path = label_path(dir.path(), GestureLabel::ThumbsUp);
        fs::write(&path, &broken).unwrap();

        let report = repair_label_file(dir.path(), GestureLabel::ThumbsUp).unwrap();
        assert_eq!(report.samples, 2);
        assert_eq!(report.dropped_values, 1);
        assert_eq!(fs::read_to_string(&report.backup).unwrap(), broken);

        let (store, report) = SampleStore::load(dir.path()).unwrap();
        assert_eq!(
            store.samples(GestureLabel::ThumbsUp),
            &[vector(0.4), vector(0.9)]
        );
        assert!(report.unrecognized.is_empty());
    }
}
