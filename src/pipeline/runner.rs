// Pipeline orchestration
// Audio file in, beatmap (and optional debug sidecar) out

use std::path::{Path, PathBuf};
use thiserror::Error;

use super::config::{ConfigError, PipelineConfig};
use super::storage::{calculate_sha256, ensure_parent_dir, write_json, StorageError};
use super::trace::{StageLog, StageSummary};
use crate::arranger::assign_lanes_with_config;
use crate::audio::{ingest_wav, AudioError, OnsetDetector, SeparationError, SeparationHandle, SpectralFluxDetector};
use crate::beatmap::{assemble, build_debug_trace, BeatmapMetadata};
use crate::events::{ClassifiedHit, Classifier, ClassifierMode};
use crate::groove::{quantize_hits, resolve_tempo};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Drum separation failed: {0}")]
    Separation(#[from] SeparationError),

    #[error("Failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: StorageError,
    },
}

/// Paths written by one run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub output_path: PathBuf,
    pub debug_path: Option<PathBuf>,
    pub hit_count: usize,
    pub classifier_mode: ClassifierMode,
}

/// Classifier plus the settings it was loaded with
struct LoadedClassifier {
    use_ml: bool,
    model_path: Option<PathBuf>,
    window_secs: f64,
    classifier: Classifier,
}

/// Owns the collaborators and the loaded classifier across runs
pub struct Pipeline {
    separation: SeparationHandle,
    detector: Box<dyn OnsetDetector>,
    classifier: Option<LoadedClassifier>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::new(
            SeparationHandle::default(),
            Box::new(SpectralFluxDetector::default()),
        )
    }
}

impl Pipeline {
    pub fn new(separation: SeparationHandle, detector: Box<dyn OnsetDetector>) -> Self {
        Pipeline {
            separation,
            detector,
            classifier: None,
        }
    }

    /// The classifier for `config`, reloaded only when its settings change
    fn classifier(&mut self, config: &PipelineConfig) -> &Classifier {
        let loaded = match self.classifier.take() {
            Some(loaded)
                if loaded.use_ml == config.use_ml_classifier
                    && loaded.model_path == config.model_path
                    && loaded.window_secs == config.classification_window_secs =>
            {
                loaded
            }
            _ => LoadedClassifier {
                use_ml: config.use_ml_classifier,
                model_path: config.model_path.clone(),
                window_secs: config.classification_window_secs,
                classifier: Classifier::load(
                    config.use_ml_classifier,
                    config.model_path.as_deref(),
                )
                .with_window_secs(config.classification_window_secs),
            },
        };

        &self.classifier.insert(loaded).classifier
    }

    /// Process one audio file into a beatmap.
    ///
    /// The config is validated before anything is read. The debug trace is
    /// written only when `debug_output_path` is given.
    pub fn process(
        &mut self,
        input_path: &Path,
        output_path: &Path,
        config: &PipelineConfig,
        debug_output_path: Option<&Path>,
    ) -> Result<PipelineOutput, PipelineError> {
        config.validate()?;
        let mut stages = StageLog::new();

        let bytes = std::fs::read(input_path).map_err(|source| AudioError::Io {
            path: input_path.display().to_string(),
            source,
        })?;
        let source_sha256 = calculate_sha256(&bytes);
        let audio = ingest_wav(&bytes)?;
        stages.record(StageSummary::with_data(
            "ingest",
            format!(
                "Loaded {} ({:.2}s, {} Hz, {} ch)",
                input_path.display(),
                audio.duration_secs(),
                audio.sample_rate,
                audio.channels
            ),
            serde_json::json!({
                "sample_rate": audio.sample_rate,
                "channels": audio.channels,
                "duration_secs": audio.duration_secs(),
                "sha256": source_sha256,
            }),
        ));

        let mut samples = audio.to_mono();
        let mut sample_rate = audio.sample_rate;
        if config.isolate_drums {
            let (drums, rate) = self.separation.separate(&samples, sample_rate)?;
            samples = drums;
            sample_rate = rate;
            stages.record(StageSummary::new(
                "separation",
                format!("Isolated drum track ({} samples)", samples.len()),
            ));
        }

        let onsets = self
            .detector
            .detect(&samples, sample_rate, config.detection_sensitivity);
        stages.record(StageSummary::with_data(
            "onset_detection",
            format!("Detected {} onsets", onsets.len()),
            serde_json::json!({
                "count": onsets.len(),
                "sensitivity": config.detection_sensitivity,
            }),
        ));

        let classification = self.classifier(config).classify(
            &samples,
            sample_rate,
            &onsets,
            config.confidence_threshold,
        );
        let unknown = classification.hits.iter().filter(|h| h.is_unknown()).count();
        stages.record(StageSummary::with_data(
            "classification",
            format!(
                "Classified {} hits with {} classifier ({} unknown, {} skipped)",
                classification.hits.len(),
                classification.mode,
                unknown,
                classification.skipped.len()
            ),
            serde_json::json!({
                "mode": classification.mode,
                "model_path": classification.model_path,
                "fallback_reason": classification.fallback_reason,
                "hits": classification.hits.len(),
                "unknown": unknown,
                "skipped": classification.skipped.len(),
            }),
        ));

        let hits: Vec<ClassifiedHit> = if config.drop_unknown {
            classification
                .hits
                .iter()
                .filter(|hit| !hit.is_unknown())
                .cloned()
                .collect()
        } else {
            classification.hits.clone()
        };

        let tempo = resolve_tempo(config.bpm, &onsets);
        let quantized = quantize_hits(
            hits,
            config.quantization_grid,
            tempo.bpm,
            config.max_snap_error_ms,
        );
        let unsnapped = quantized.iter().filter(|q| q.unsnapped).count();
        stages.record(StageSummary::with_data(
            "quantization",
            format!(
                "Quantized {} hits to {} at {:.2} BPM ({} unsnapped)",
                quantized.len(),
                config.quantization_grid.notation(),
                tempo.bpm,
                unsnapped
            ),
            serde_json::json!({
                "grid": config.quantization_grid,
                "bpm": tempo.bpm,
                "bpm_source": tempo.source,
                "tempo_confidence": tempo.confidence,
                "unsnapped": unsnapped,
            }),
        ));

        let assignment = assign_lanes_with_config(quantized, &config.alternation);
        stages.record(StageSummary::with_data(
            "lane_assignment",
            format!(
                "Placed {} hits ({} cymbal switches, {} tom switches)",
                assignment.hits.len(),
                assignment.stats.cymbal_switches,
                assignment.stats.tom_switches
            ),
            serde_json::to_value(assignment.stats).unwrap_or_default(),
        ));

        let title = config.title.clone().unwrap_or_else(|| {
            input_path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "untitled".to_string())
        });
        let metadata = BeatmapMetadata::new(title, config.quantization_grid, classification.mode)
            .with_tempo(tempo.bpm, tempo.source)
            .with_source(input_path.display().to_string(), source_sha256)
            .with_model_path(
                classification
                    .model_path
                    .as_ref()
                    .map(|path| path.display().to_string()),
            );
        let beatmap = assemble(&assignment.hits, metadata);

        // Every output directory must exist before the first file is written
        let targets = std::iter::once(output_path).chain(debug_output_path);
        for path in targets {
            ensure_parent_dir(path).map_err(|source| PipelineError::Output {
                path: path.to_path_buf(),
                source,
            })?;
        }

        stages.record(StageSummary::new(
            "output",
            format!(
                "Writing {} hits to {}",
                beatmap.hits.len(),
                output_path.display()
            ),
        ));
        let trace = debug_output_path.map(|_| {
            let mut trace =
                build_debug_trace(&onsets, &classification, &assignment, &tempo, &beatmap);
            trace.stages = stages.into_entries();
            trace
        });

        write_json(output_path, &beatmap).map_err(|source| PipelineError::Output {
            path: output_path.to_path_buf(),
            source,
        })?;

        let debug_path = match (debug_output_path, trace) {
            (Some(path), Some(trace)) => {
                write_json(path, &trace).map_err(|source| PipelineError::Output {
                    path: path.to_path_buf(),
                    source,
                })?;
                log::info!("Wrote debug trace to {}", path.display());
                Some(path.to_path_buf())
            }
            _ => None,
        };

        Ok(PipelineOutput {
            output_path: output_path.to_path_buf(),
            debug_path,
            hit_count: beatmap.hits.len(),
            classifier_mode: classification.mode,
        })
    }
}

/// One-shot run with the default collaborators
pub fn process_audio_file(
    input_path: &Path,
    output_path: &Path,
    config: &PipelineConfig,
    debug_output_path: Option<&Path>,
) -> Result<PipelineOutput, PipelineError> {
    Pipeline::default().process(input_path, output_path, config, debug_output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DrumSeparator, Onset};
    use crate::beatmap::{Beatmap, DebugTrace};
    use crate::groove::{BpmSource, GridResolution};
    use crate::pipeline::storage::read_json;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::TempDir;

    const RATE: u32 = 22050;

    /// Two seconds of silence with a short noise burst every half second
    fn write_test_wav(path: &Path) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        let mut seed: u32 = 12345;
        for i in 0..(RATE * 2) as usize {
            let pos = i % (RATE as usize / 2);
            let sample = if pos < 1000 {
                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = ((seed >> 16) & 0x7fff) as f32 / 16384.0 - 1.0;
                noise * (1.0 - pos as f32 / 1000.0) * 0.8
            } else {
                0.0
            };
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    /// Fixed onsets regardless of the audio
    struct FixedDetector(Vec<Onset>);

    impl OnsetDetector for FixedDetector {
        fn detect(&self, _samples: &[f32], _sample_rate: u32, _sensitivity: f32) -> Vec<Onset> {
            self.0.clone()
        }
    }

    fn heuristic_config() -> PipelineConfig {
        PipelineConfig {
            use_ml_classifier: false,
            bpm: Some(120.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_nested_output_and_debug_sidecar() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("groove.wav");
        write_test_wav(&input);
        let output = temp_dir.path().join("out").join("maps").join("groove.json");
        let debug = temp_dir.path().join("debug").join("deep").join("trace.json");

        let result = process_audio_file(&input, &output, &heuristic_config(), Some(&debug)).unwrap();

        assert_eq!(result.output_path, output);
        assert_eq!(result.debug_path.as_deref(), Some(debug.as_path()));
        assert_eq!(result.classifier_mode, ClassifierMode::Heuristic);
        assert!(output.exists());
        assert!(debug.exists());

        let beatmap: Beatmap = read_json(&output).unwrap();
        assert_eq!(beatmap.metadata.title, "groove");
        assert_eq!(beatmap.metadata.bpm, Some(120.0));
        assert_eq!(beatmap.metadata.bpm_source, BpmSource::Configured);
        assert_eq!(beatmap.metadata.hit_count, beatmap.hits.len());
        assert_eq!(beatmap.metadata.hit_count, result.hit_count);
        assert!(beatmap.metadata.source_sha256.is_some());
        assert!(beatmap.hits.iter().all(|h| h.lane < 7));

        let trace: DebugTrace = read_json(&debug).unwrap();
        assert_eq!(trace.metadata.beatmap_id, beatmap.metadata.beatmap_id);
        let stage_names: Vec<&str> = trace.stages.iter().map(|s| s.stage.as_str()).collect();
        assert_eq!(
            stage_names,
            vec![
                "ingest",
                "separation",
                "onset_detection",
                "classification",
                "quantization",
                "lane_assignment",
                "output"
            ]
        );
    }

    #[test]
    fn test_no_debug_sidecar_unless_requested() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("groove.wav");
        write_test_wav(&input);
        let output = temp_dir.path().join("nested").join("groove.json");

        let result = process_audio_file(&input, &output, &heuristic_config(), None).unwrap();

        assert!(result.debug_path.is_none());
        assert!(output.exists());
        let entries: Vec<_> = std::fs::read_dir(temp_dir.path().join("nested"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_invalid_config_fails_before_reading() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("never").join("written.json");
        let config = PipelineConfig {
            max_snap_error_ms: -1.0,
            ..heuristic_config()
        };

        // The input does not exist either; config errors must come first
        let result = process_audio_file(
            &temp_dir.path().join("missing.wav"),
            &output,
            &config,
            None,
        );

        assert!(matches!(result, Err(PipelineError::Config(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_input_is_audio_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = process_audio_file(
            &temp_dir.path().join("missing.wav"),
            &temp_dir.path().join("out.json"),
            &heuristic_config(),
            None,
        );
        assert!(matches!(result, Err(PipelineError::Audio(_))));
    }

    #[test]
    fn test_unwritable_output_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("groove.wav");
        write_test_wav(&input);
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let output = blocker.join("out.json");

        let result = process_audio_file(&input, &output, &heuristic_config(), None);

        match result {
            Err(PipelineError::Output { path, .. }) => assert_eq!(path, output),
            other => panic!("expected output error, got {:?}", other),
        }
    }

    #[test]
    fn test_unwritable_debug_path_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("groove.wav");
        write_test_wav(&input);
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let output = temp_dir.path().join("maps").join("out.json");
        let debug = blocker.join("dbg").join("trace.json");

        let result = process_audio_file(&input, &output, &heuristic_config(), Some(&debug));

        match result {
            Err(PipelineError::Output { path, .. }) => assert_eq!(path, debug),
            other => panic!("expected output error, got {:?}", other),
        }
        assert!(!output.exists());
    }

    #[test]
    fn test_default_tempo_is_recorded_with_snapped_hits() {
        let detector = FixedDetector(vec![Onset::new(0.13, 1.0), Onset::new(0.37, 1.0)]);
        let mut pipeline = Pipeline::new(SeparationHandle::default(), Box::new(detector));

        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("groove.wav");
        write_test_wav(&input);
        let output = temp_dir.path().join("out.json");
        let config = PipelineConfig {
            bpm: None,
            ..heuristic_config()
        };

        pipeline.process(&input, &output, &config, None).unwrap();

        let beatmap: Beatmap = read_json(&output).unwrap();
        assert_eq!(beatmap.metadata.bpm_source, BpmSource::Default);
        assert_eq!(beatmap.metadata.bpm, Some(120.0));
        let times: Vec<f64> = beatmap.hits.iter().map(|h| h.time).collect();
        assert_eq!(times, vec![0.125, 0.375]);
    }

    #[test]
    fn test_missing_model_falls_back_to_heuristic() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("groove.wav");
        write_test_wav(&input);
        let output = temp_dir.path().join("out.json");
        let config = PipelineConfig {
            use_ml_classifier: true,
            model_path: Some(temp_dir.path().join("no_model.json")),
            ..heuristic_config()
        };

        let result = process_audio_file(&input, &output, &config, None).unwrap();

        assert_eq!(result.classifier_mode, ClassifierMode::Heuristic);
        let beatmap: Beatmap = read_json(&output).unwrap();
        assert_eq!(beatmap.metadata.classifier_mode, ClassifierMode::Heuristic);
        assert!(beatmap.metadata.model_path.is_none());
    }

    #[test]
    fn test_separation_loads_once_and_can_be_skipped() {
        struct Passthrough;
        impl DrumSeparator for Passthrough {
            fn name(&self) -> &str {
                "passthrough"
            }
            fn separate(
                &mut self,
                samples: &[f32],
                sample_rate: u32,
            ) -> Result<(Vec<f32>, u32), SeparationError> {
                Ok((samples.to_vec(), sample_rate))
            }
        }

        let loads = Rc::new(Cell::new(0));
        let counter = loads.clone();
        let separation = SeparationHandle::new(move || {
            counter.set(counter.get() + 1);
            Ok(Box::new(Passthrough) as Box<dyn DrumSeparator>)
        });
        let detector = FixedDetector(vec![Onset::new(0.0, 1.0), Onset::new(0.5, 1.0)]);
        let mut pipeline = Pipeline::new(separation, Box::new(detector));

        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("groove.wav");
        write_test_wav(&input);

        let skip = PipelineConfig {
            isolate_drums: false,
            ..heuristic_config()
        };
        pipeline
            .process(&input, &temp_dir.path().join("a.json"), &skip, None)
            .unwrap();
        assert_eq!(loads.get(), 0);

        for name in ["b.json", "c.json"] {
            pipeline
                .process(&input, &temp_dir.path().join(name), &heuristic_config(), None)
                .unwrap();
        }
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn test_fixed_onsets_map_through_every_stage() {
        let detector = FixedDetector(vec![
            Onset::new(0.0, 1.0),
            Onset::new(0.5, 1.0),
            Onset::new(1.0, 1.0),
            Onset::new(1.5, 1.0),
        ]);
        let mut pipeline = Pipeline::new(SeparationHandle::default(), Box::new(detector));

        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("groove.wav");
        write_test_wav(&input);
        let output = temp_dir.path().join("out.json");
        let config = PipelineConfig {
            confidence_threshold: 0.0,
            quantization_grid: GridResolution::Quarter,
            ..heuristic_config()
        };

        let result = pipeline.process(&input, &output, &config, None).unwrap();
        assert_eq!(result.hit_count, 4);

        let beatmap: Beatmap = read_json(&output).unwrap();
        let times: Vec<f64> = beatmap.hits.iter().map(|h| h.time).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5]);
        assert!(beatmap.hits.iter().all(|h| (0.0..=1.0).contains(&h.confidence)));
    }

    #[test]
    fn test_drop_unknown_removes_hits() {
        let detector = FixedDetector(vec![Onset::new(0.0, 1.0), Onset::new(0.5, 1.0)]);
        let mut pipeline = Pipeline::new(SeparationHandle::default(), Box::new(detector));

        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("groove.wav");
        write_test_wav(&input);

        // Only perfect scores survive a threshold of 1.0
        let keep = PipelineConfig {
            confidence_threshold: 1.0,
            ..heuristic_config()
        };
        let kept = pipeline
            .process(&input, &temp_dir.path().join("keep.json"), &keep, None)
            .unwrap();
        assert_eq!(kept.hit_count, 2);

        let drop = PipelineConfig {
            drop_unknown: true,
            ..keep
        };
        let dropped = pipeline
            .process(&input, &temp_dir.path().join("drop.json"), &drop, None)
            .unwrap();
        let beatmap: Beatmap = read_json(&temp_dir.path().join("keep.json")).unwrap();
        let unknown = beatmap.hits.iter().filter(|h| h.component == "unknown").count();
        assert_eq!(dropped.hit_count, 2 - unknown);
    }
}
