use langsniff::{
    ClassifierError, DetectorConfig, LabelMapping, LanguageDetector, LoadedModel, ModelLoader,
    Pipeline, ProbabilisticClassifier, TextClassifier,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn setup_detector() -> LanguageDetector {
    let loader = ModelLoader::from_dir(fixture("tiny"));
    LanguageDetector::from_loader(&loader).expect("Failed to load fixture model")
}

/// A scoring pipeline returning canned output, for exercising the ranking contract.
#[derive(Debug)]
struct Canned {
    predicted: usize,
    probabilities: Vec<f32>,
}

impl TextClassifier for Canned {
    fn num_classes(&self) -> usize {
        4
    }

    fn classify(&self, _text: &str) -> Result<usize, ClassifierError> {
        Ok(self.predicted)
    }
}

impl ProbabilisticClassifier for Canned {
    fn score(&self, _text: &str) -> Result<Vec<f32>, ClassifierError> {
        Ok(self.probabilities.clone())
    }
}

fn canned_detector(predicted: usize, probabilities: Vec<f32>) -> LanguageDetector {
    let labels = LabelMapping::new(vec!["Arabic", "English", "French", "Russian"]).unwrap();
    let pipeline = Pipeline::scoring(Canned { predicted, probabilities });
    LanguageDetector::new(Arc::new(LoadedModel::new(pipeline, labels).unwrap()))
}

#[test]
fn test_english_sentence() -> Result<(), Box<dyn std::error::Error>> {
    let detector = setup_detector();
    let detection = detector.detect("The quick brown fox jumps over the lazy dog")?;

    assert_eq!(detection.predicted_label, "English");
    assert_eq!(detection.ranked_confidences.len(), 3);
    assert_eq!(detection.ranked_confidences[0].label, "English");
    assert!(detection.ranked_confidences[0].probability > 0.5);
    Ok(())
}

#[test]
fn test_russian_sentence() -> Result<(), Box<dyn std::error::Error>> {
    let detector = setup_detector();
    let detection = detector.detect("Быстрая коричневая лиса перепрыгивает через ленивую собаку")?;
    assert_eq!(detection.predicted_label, "Russian");
    assert_eq!(detection.ranked_confidences[0].label, "Russian");
    Ok(())
}

#[test]
fn test_ranking_is_sorted_and_bounded() -> Result<(), Box<dyn std::error::Error>> {
    let detector = setup_detector();
    let labels = detector.info().class_labels;

    for text in [
        "The quick brown fox jumps over the lazy dog",
        "Le renard brun rapide saute par-dessus le chien paresseux",
        "速い茶色の狐が怠惰な犬を飛び越えます",
        "zzz",
    ] {
        let detection = detector.detect(text)?;
        assert!(labels.contains(&detection.predicted_label));
        assert!(detection.ranked_confidences.len() <= 3);
        assert_eq!(detection.ranked_confidences[0].label, detection.predicted_label);
        for pair in detection.ranked_confidences.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
        }
        for confidence in &detection.ranked_confidences {
            assert!((0.0..=1.0).contains(&confidence.probability));
        }
    }
    Ok(())
}

#[test]
fn test_empty_input_passes_through() -> Result<(), Box<dyn std::error::Error>> {
    let detector = setup_detector();
    let detection = detector.detect("")?;

    // No features: every class is equally likely and ties fall to the lowest index.
    assert_eq!(detection.predicted_label, "English");
    let ranked: Vec<_> = detection.ranked_confidences.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(ranked, vec!["English", "French", "German"]);
    for confidence in &detection.ranked_confidences {
        assert!((confidence.probability - 0.25).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn test_detection_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let detector = setup_detector();
    let text = "Le renard brun rapide saute par-dessus le chien paresseux";
    assert_eq!(detector.detect(text)?, detector.detect(text)?);
    Ok(())
}

#[test]
fn test_label_only_model() -> Result<(), Box<dyn std::error::Error>> {
    let loader = ModelLoader::from_dir(fixture("label_only"));
    let detector = LanguageDetector::from_loader(&loader)?;
    assert!(!detector.info().supports_scoring);

    let detection = detector.detect("The quick brown fox jumps over the lazy dog")?;
    assert_eq!(detection.predicted_label, "English");
    assert!(detection.ranked_confidences.is_empty());
    assert_eq!(detection.confidence(), None);
    Ok(())
}

#[test]
fn test_input_too_large() -> Result<(), Box<dyn std::error::Error>> {
    let loader = ModelLoader::from_dir(fixture("tiny"));
    let config = DetectorConfig::default().with_max_input_bytes(Some(8));
    let detector = LanguageDetector::with_config(loader.load()?, config)?;

    let err = detector.detect("more than eight bytes").unwrap_err();
    assert!(matches!(err, ClassifierError::InputTooLarge { len: 21, max: 8 }));
    assert!(!err.is_fatal());

    // The cap is inclusive.
    assert!(detector.detect("12345678").is_ok());
    Ok(())
}

#[test]
fn test_top_k_config() -> Result<(), Box<dyn std::error::Error>> {
    let loader = ModelLoader::from_dir(fixture("tiny"));
    let config = DetectorConfig::default().with_top_k(10);
    let detector = LanguageDetector::with_config(loader.load()?, config)?;
    // Never more entries than classes.
    assert_eq!(detector.detect("the")?.ranked_confidences.len(), 4);

    let config = DetectorConfig::default().with_top_k(0);
    assert!(LanguageDetector::with_config(loader.load()?, config).is_err());
    Ok(())
}

#[test]
fn test_unknown_class_index() {
    let detector = canned_detector(9, vec![0.25, 0.25, 0.25, 0.25]);
    let err = detector.detect("anything").unwrap_err();
    assert!(matches!(err, ClassifierError::UnknownClassIndex { index: 9, num_classes: 4 }));
    assert!(err.is_fatal());
}

#[test]
fn test_probabilities_are_not_renormalized() -> Result<(), ClassifierError> {
    let detector = canned_detector(2, vec![0.1, 0.2, 0.4, 0.3]);
    let detection = detector.detect("anything")?;

    let ranked: Vec<_> = detection
        .ranked_confidences
        .iter()
        .map(|c| (c.label.as_str(), c.probability))
        .collect();
    assert_eq!(ranked, vec![("French", 0.4), ("Russian", 0.3), ("English", 0.2)]);
    Ok(())
}

#[test]
fn test_predicted_class_wins_ties() -> Result<(), ClassifierError> {
    let detector = canned_detector(3, vec![0.1, 0.3, 0.3, 0.3]);
    let detection = detector.detect("anything")?;
    let ranked: Vec<_> = detection.ranked_confidences.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(ranked, vec!["Russian", "English", "French"]);
    Ok(())
}

#[test]
fn test_inconsistent_outputs_are_rejected() {
    let cases = vec![
        // Prediction does not rank first
        canned_detector(0, vec![0.1, 0.2, 0.4, 0.3]),
        // Does not sum to one
        canned_detector(0, vec![0.9, 0.2, 0.1, 0.1]),
        // Wrong length
        canned_detector(0, vec![0.5, 0.5]),
        // Outside [0, 1]
        canned_detector(0, vec![1.2, -0.1, -0.05, -0.05]),
    ];
    for detector in cases {
        assert!(matches!(
            detector.detect("anything"),
            Err(ClassifierError::InconsistentOutput(_))
        ));
    }
}

#[test]
fn test_thread_safety() {
    let detector = Arc::new(setup_detector());
    let expected = detector.detect("The quick brown fox jumps over the lazy dog").unwrap();
    let mut handles = vec![];

    for _ in 0..4 {
        let detector = Arc::clone(&detector);
        let expected = expected.clone();
        handles.push(thread::spawn(move || {
            let detection = detector.detect("The quick brown fox jumps over the lazy dog").unwrap();
            assert_eq!(detection, expected);
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_json_output_shape() -> Result<(), Box<dyn std::error::Error>> {
    let detection = setup_detector().detect("the")?;
    let value = serde_json::to_value(&detection)?;
    assert_eq!(value["predicted_label"], "English");
    assert!(value["ranked_confidences"][0]["probability"].is_number());
    Ok(())
}

#[test]
fn test_onnx_estimator_model() -> Result<(), Box<dyn std::error::Error>> {
    let loader = ModelLoader::from_dir(fixture("onnx"));
    let detector = LanguageDetector::from_loader(&loader)?;
    assert!(detector.info().supports_scoring);

    let detection = detector.detect("b")?;
    assert_eq!(detection.predicted_label, "French");
    let ranked: Vec<_> = detection.ranked_confidences.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(ranked, vec!["French", "German", "English"]);
    assert!((detection.ranked_confidences[0].probability - 0.73612).abs() < 1e-4);
    Ok(())
}
