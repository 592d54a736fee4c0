use voxdetect::classifier::{Classifier, WeightSource};
use voxdetect::tensor::ModelInput;
use voxdetect::weights::WeightStore;

/// Optional integration test against a real trained artifact.
///
/// Run locally with:
/// `VOXDETECT_MODEL_PATH=/path/to/voice_classifier.safetensors cargo test -p voxdetect --test trained_model_env -- --nocapture`
#[test]
fn trained_artifact_env_smoke() {
    let Some(path) = std::env::var_os("VOXDETECT_MODEL_PATH") else {
        eprintln!("skipping: VOXDETECT_MODEL_PATH is not set");
        return;
    };

    let store = WeightStore::open(&path).expect("open weights");
    let names = store.names().expect("list tensor names");
    for required in ["conv1.weight", "bn3.running_var", "fc3.bias"] {
        assert!(
            names.iter().any(|n| n == required),
            "missing tensor {required}"
        );
    }

    let classifier = Classifier::try_load(&path).expect("strict load");
    assert!(matches!(
        classifier.weight_source(),
        WeightSource::Trained { .. }
    ));
    assert!(!classifier.is_degraded());

    let result = classifier
        .predict(&ModelInput::zeros())
        .expect("predict on silence");
    assert!((0.0..=1.0).contains(&result.confidence));
}
