use std::collections::BTreeMap;
use std::path::Path;

use super::analysis::SpectralAnalyzer;
use super::decode::decode_audio;
use crate::error::ExtractError;

/// Feature types in output column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureKind {
    ChromaStft,
    Rms,
    SpectralCentroid,
    SpectralBandwidth,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 4] = [
        FeatureKind::ChromaStft,
        FeatureKind::Rms,
        FeatureKind::SpectralCentroid,
        FeatureKind::SpectralBandwidth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FeatureKind::ChromaStft => "chroma_stft",
            FeatureKind::Rms => "rms",
            FeatureKind::SpectralCentroid => "spectral_centroid",
            FeatureKind::SpectralBandwidth => "spectral_bandwidth",
        }
    }
}

/// Column names of the output table, `filename` first.
pub const FIELDNAMES: [&str; 9] = [
    "filename",
    "chroma_stft_mean",
    "chroma_stft_var",
    "rms_mean",
    "rms_var",
    "spectral_centroid_mean",
    "spectral_centroid_var",
    "spectral_bandwidth_mean",
    "spectral_bandwidth_var",
];

/// 2-D feature matrix, coefficient × time frame, stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureFrame {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl FeatureFrame {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(rows * cols, data.len());
        Self { rows, cols, data }
    }

    /// Single-coefficient frame (one value per time frame).
    pub fn row(values: Vec<f64>) -> Self {
        let cols = values.len();
        Self::new(1, cols, values)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    #[cfg(test)]
    pub fn row_values(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Mean and population variance over every element of the matrix.
    pub fn summarize(&self) -> Summary {
        summarize(self.values())
    }
}

/// Output of one analysis pass.
#[derive(Clone, Debug)]
pub struct FeatureFrames {
    pub chroma_stft: FeatureFrame,
    pub rms: FeatureFrame,
    pub spectral_centroid: FeatureFrame,
    pub spectral_bandwidth: FeatureFrame,
}

impl FeatureFrames {
    pub fn get(&self, kind: FeatureKind) -> &FeatureFrame {
        match kind {
            FeatureKind::ChromaStft => &self.chroma_stft,
            FeatureKind::Rms => &self.rms,
            FeatureKind::SpectralCentroid => &self.spectral_centroid,
            FeatureKind::SpectralBandwidth => &self.spectral_bandwidth,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureKind, &FeatureFrame)> {
        FeatureKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub var: f64,
}

/// Two-pass mean and population variance (divisor N). Empty input gives zeros.
pub fn summarize(values: &[f64]) -> Summary {
    if values.is_empty() {
        return Summary { mean: 0.0, var: 0.0 };
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Summary { mean, var }
}

/// Named feature values for one file, keyed by column name.
pub type FeatureSet = BTreeMap<String, f64>;

/// One output row.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureRecord {
    pub filename: String,
    pub fields: FeatureSet,
}

/// Reduce each frame to `{name}_mean` and `{name}_var`.
pub fn reduce(frames: &FeatureFrames) -> FeatureSet {
    let mut fields = FeatureSet::new();
    for (kind, frame) in frames.iter() {
        let summary = frame.summarize();
        fields.insert(format!("{}_mean", kind.name()), summary.mean);
        fields.insert(format!("{}_var", kind.name()), summary.var);
    }
    fields
}

/// Decode up to `max_duration_secs` of `path`, analyze it and reduce to the
/// eight summary statistics.
pub fn extract_features(
    path: &Path,
    max_duration_secs: f64,
    analyzer: &dyn SpectralAnalyzer,
) -> Result<FeatureSet, ExtractError> {
    let audio = decode_audio(path, max_duration_secs)?;
    let frames = analyzer
        .analyze(&audio)
        .map_err(|source| ExtractError::Analysis {
            path: path.to_path_buf(),
            source,
        })?;
    log::trace!(
        "{}: {:.1}s analyzed, chroma {}x{}",
        path.display(),
        audio.duration_secs(),
        frames.chroma_stft.rows(),
        frames.chroma_stft.cols()
    );
    drop(audio);

    let fields = reduce(&frames);
    if let Some((field, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
        return Err(ExtractError::NonFinite {
            path: path.to_path_buf(),
            field: field.clone(),
        });
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::analysis::StftAnalyzer;
    use crate::audio::decode::AudioData;
    use crate::error::AnalysisError;
    use crate::testutil;

    #[test]
    fn population_variance_over_all_elements() {
        let frame = FeatureFrame::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let s = frame.summarize();
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.var, 1.25);
    }

    #[test]
    fn variance_pools_rows_and_columns() {
        // per-row variance would be 0 for both rows
        let frame = FeatureFrame::new(2, 3, vec![1.0, 1.0, 1.0, 3.0, 3.0, 3.0]);
        let s = frame.summarize();
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.var, 1.0);
    }

    #[test]
    fn field_names_match_schema() {
        let frames = FeatureFrames {
            chroma_stft: FeatureFrame::new(12, 1, vec![0.5; 12]),
            rms: FeatureFrame::row(vec![0.1]),
            spectral_centroid: FeatureFrame::row(vec![1000.0]),
            spectral_bandwidth: FeatureFrame::row(vec![200.0]),
        };
        let fields = reduce(&frames);
        let mut expected: Vec<&str> = FIELDNAMES[1..].to_vec();
        expected.sort();
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(names, expected);
        assert_eq!(fields["spectral_centroid_mean"], 1000.0);
    }

    #[test]
    fn extracts_eight_finite_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        testutil::write_sine(&path, 440.0, 0.5, 22050, 1.0);

        let fields = extract_features(&path, 30.0, &StftAnalyzer::default()).unwrap();
        assert_eq!(fields.len(), 8);
        for (name, value) in &fields {
            assert!(value.is_finite(), "{name} = {value}");
            if name.ends_with("_var") {
                assert!(*value >= 0.0, "{name} = {value}");
            }
        }
        assert!(fields["rms_mean"] > 0.3 && fields["rms_mean"] < 0.4);
    }

    #[test]
    fn dc_file_has_zero_rms_variance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dc.wav");
        testutil::write_dc(&path, 0.5, 16000, 1.0);

        let fields = extract_features(&path, 30.0, &StftAnalyzer::default()).unwrap();
        assert!(fields["rms_var"].abs() < 1e-9);
    }

    #[test]
    fn decode_failure_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"").unwrap();

        let err = extract_features(&path, 30.0, &StftAnalyzer::default()).unwrap_err();
        match err {
            ExtractError::Decode(e) => assert_eq!(e.path, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    struct NanAnalyzer;

    impl SpectralAnalyzer for NanAnalyzer {
        fn analyze(&self, _audio: &AudioData) -> Result<FeatureFrames, AnalysisError> {
            Ok(FeatureFrames {
                chroma_stft: FeatureFrame::row(vec![0.0]),
                rms: FeatureFrame::row(vec![f64::NAN]),
                spectral_centroid: FeatureFrame::row(vec![0.0]),
                spectral_bandwidth: FeatureFrame::row(vec![0.0]),
            })
        }
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        testutil::write_sine(&path, 440.0, 0.5, 8000, 0.2);

        let err = extract_features(&path, 30.0, &NanAnalyzer).unwrap_err();
        assert!(matches!(err, ExtractError::NonFinite { ref field, .. } if field == "rms_mean"));
    }
}
