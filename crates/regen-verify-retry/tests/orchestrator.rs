use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use regen_verify_retry::{
    GenerationError, GenerationRequest, PromptTemplate, RetryConfig, RetryError, RetryManager,
    RetryOutcome, Reranker, SourceImage, from_fn,
};
use regen_verify_scorer::{InMemoryLoader, LoadError, RasterLoader};
use regen_verify_types::{CandidateId, ErrorLevel, RasterSample};

fn square(background: u8, lo: u32, hi: u32) -> RasterSample {
    let mut data = Vec::with_capacity(128 * 128);
    for y in 0..128u32 {
        for x in 0..128u32 {
            let inside = (lo..hi).contains(&x) && (lo..hi).contains(&y);
            data.push(match (inside, (x / 2 + y / 2) % 2 == 0) {
                (false, _) => background,
                (true, true) => 100,
                (true, false) => 160,
            });
        }
    }
    RasterSample::from_gray(128, 128, data).unwrap()
}

fn flat(size: u32, value: u8) -> RasterSample {
    RasterSample::from_gray(size, size, vec![value; (size * size) as usize]).unwrap()
}

fn source() -> SourceImage {
    SourceImage::new("original.png", square(40, 32, 96))
}

fn manager(config: RetryConfig) -> RetryManager {
    let loader = InMemoryLoader::new()
        .with("good", square(230, 32, 96))
        .with("copy", square(40, 32, 96))
        .with("drifted", square(230, 48, 80))
        .with("blank", flat(128, 230));
    RetryManager::new(config, Reranker::default(), Arc::new(loader)).unwrap()
}

type Log = Arc<Mutex<Vec<GenerationRequest>>>;

/// Replays one scripted response per attempt, repeating the last one.
fn scripted(
    log: Log,
    script: Vec<Result<Vec<&'static str>, &'static str>>,
) -> impl regen_verify_retry::CandidateGenerator {
    from_fn(move |request: GenerationRequest| {
        let log = log.clone();
        let step = script[(request.attempt as usize).min(script.len() - 1)].clone();
        async move {
            log.lock().unwrap().push(request);
            match step {
                Ok(ids) => Ok(ids.into_iter().map(CandidateId::from).collect()),
                Err(message) => Err(GenerationError::failed(message)),
            }
        }
    })
}

fn calls(log: &Log) -> Vec<GenerationRequest> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn first_acceptable_candidate_wins() {
    let log = Log::default();
    let generator = scripted(log.clone(), vec![Ok(vec!["copy", "good", "drifted"])]);

    let outcome = manager(RetryConfig::default())
        .execute_with_retry(&generator, &source(), 60.0, "amber bottle", "ACME")
        .await
        .unwrap();

    assert!(outcome.is_accepted());
    let result = outcome.result();
    assert_eq!(result.url.as_str(), "good");
    assert_eq!(result.original_url, "original.png");
    assert_eq!(result.error_level, ErrorLevel::Ok);
    assert_eq!(result.retry_count, 0);
    assert_eq!(result.strength_used, 60.0);
    assert_eq!(result.generation_mode, PromptTemplate::LightTexture);
    assert!(result.meets_minimum_difference(70.0));

    let requests = calls(&log);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].k, 4);
    assert!(requests[0].prompt.contains("\"amber bottle\""));

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "accepted");
    assert_eq!(json["result"]["errorLevel"], "OK");
    assert_eq!(json["result"]["generationMode"], "light_texture");
}

#[tokio::test]
async fn exhausted_budget_returns_best_effort() {
    let log = Log::default();
    let generator = scripted(log.clone(), vec![Ok(vec!["copy"])]);

    let outcome = manager(RetryConfig::default())
        .execute_with_retry(&generator, &source(), 40.0, "box", "")
        .await
        .unwrap();

    let requests = calls(&log);
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].k, 3);
    let strengths: Vec<f64> = requests.iter().map(|r| r.strength).collect();
    assert_eq!(strengths, vec![40.0, 55.0, 77.5]);
    let templates: Vec<PromptTemplate> = requests.iter().map(|r| r.template).collect();
    assert_eq!(
        templates,
        vec![
            PromptTemplate::LightTexture,
            PromptTemplate::NewBackground,
            PromptTemplate::StrongLighting,
        ]
    );

    let RetryOutcome::ExhaustedBestEffort(result) = outcome else {
        panic!("expected a best-effort result");
    };
    assert_eq!(result.url.as_str(), "copy");
    assert_eq!(result.error_level, ErrorLevel::P1);
    assert_eq!(result.geom_delta, Some(0.0));
    assert!(!result.meets_minimum_difference(70.0));
}

#[tokio::test]
async fn featureless_images_still_yield_best_effort() {
    let log = Log::default();
    let generator = scripted(log.clone(), vec![Ok(vec!["blank"])]);
    let loader = InMemoryLoader::new().with("blank", flat(64, 230));
    let manager =
        RetryManager::new(RetryConfig::default(), Reranker::default(), Arc::new(loader)).unwrap();
    let original = SourceImage::new("plain.png", flat(64, 40));

    let outcome = manager
        .execute_with_retry(&generator, &original, 60.0, "plain card", "")
        .await
        .unwrap();

    assert_eq!(calls(&log).len(), 3);
    let RetryOutcome::ExhaustedBestEffort(result) = outcome else {
        panic!("expected a best-effort result");
    };
    assert_eq!(result.url.as_str(), "blank");
    assert_eq!(result.error_level, ErrorLevel::P1);
    assert_eq!(result.geom_delta, None);
    assert!(result.error_reasons.iter().any(|r| r.contains("Geometry could not be verified")));
}

#[tokio::test]
async fn verified_geometry_is_preferred_for_best_effort() {
    let log = Log::default();
    let generator = scripted(log.clone(), vec![Ok(vec!["blank"]), Ok(vec!["copy"])]);

    let outcome = manager(RetryConfig::default())
        .execute_with_retry(&generator, &source(), 60.0, "box", "")
        .await
        .unwrap();

    let RetryOutcome::ExhaustedBestEffort(result) = outcome else {
        panic!("expected a best-effort result");
    };
    assert_eq!(result.url.as_str(), "copy");
    assert_eq!(result.geom_delta, Some(0.0));
    assert_eq!(result.retry_count, 1);
}

/// Holds every load until a task on the async runtime releases it.
struct GatedLoader {
    inner: InMemoryLoader,
    started: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl RasterLoader for GatedLoader {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn load(&self, id: &CandidateId) -> Result<RasterSample, LoadError> {
        if let Some(started) = self.started.lock().unwrap().take() {
            let _ = started.send(());
        }
        let released = self
            .release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(5));
        if released.is_err() {
            return Err(LoadError::NotFound { id: id.clone() });
        }
        self.inner.load(id)
    }
}

#[tokio::test]
async fn scoring_leaves_the_runtime_free() {
    let (started_tx, started_rx) = tokio::sync::oneshot::channel();
    let (release_tx, release_rx) = mpsc::channel();
    tokio::spawn(async move {
        if started_rx.await.is_ok() {
            let _ = release_tx.send(());
        }
    });

    let loader = GatedLoader {
        inner: InMemoryLoader::new().with("good", square(230, 32, 96)),
        started: Mutex::new(Some(started_tx)),
        release: Mutex::new(release_rx),
    };
    let config = RetryConfig {
        max_retries: 0,
        ..RetryConfig::default()
    };
    let manager = RetryManager::new(config, Reranker::default(), Arc::new(loader)).unwrap();
    let log = Log::default();
    let generator = scripted(log.clone(), vec![Ok(vec!["good"])]);

    let outcome = manager
        .execute_with_retry(&generator, &source(), 60.0, "box", "")
        .await
        .unwrap();

    assert!(outcome.is_accepted());
    assert_eq!(outcome.result().url.as_str(), "good");
}

#[tokio::test]
async fn geometry_drift_backs_off_then_accepts() {
    let log = Log::default();
    let generator = scripted(log.clone(), vec![Ok(vec!["drifted"]), Ok(vec!["good"])]);

    let outcome = manager(RetryConfig::default())
        .execute_with_retry(&generator, &source(), 60.0, "box", "")
        .await
        .unwrap();

    let requests = calls(&log);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].strength, 45.0);
    assert_eq!(requests[1].template, PromptTemplate::LightTexture);

    assert!(outcome.is_accepted());
    assert_eq!(outcome.result().retry_count, 1);
    assert_eq!(outcome.result().strength_used, 45.0);
}

#[tokio::test]
async fn geometry_drift_is_never_best_effort() {
    let log = Log::default();
    let generator = scripted(log.clone(), vec![Ok(vec!["drifted"])]);

    let error = manager(RetryConfig::default())
        .execute_with_retry(&generator, &source(), 30.0, "box", "")
        .await
        .unwrap_err();

    assert!(matches!(error, RetryError::NoViableCandidate { attempts: 3, .. }));
    let strengths: Vec<f64> = calls(&log).iter().map(|r| r.strength).collect();
    assert_eq!(strengths, vec![30.0, 15.0, 10.0]);
}

#[tokio::test]
async fn generator_failures_consume_budget() {
    let log = Log::default();
    let generator = scripted(log.clone(), vec![Err("upstream unavailable")]);

    let error = manager(RetryConfig::default())
        .execute_with_retry(&generator, &source(), 60.0, "box", "")
        .await
        .unwrap_err();

    let RetryError::NoViableCandidate {
        attempts,
        last_failure,
    } = error
    else {
        panic!("expected NoViableCandidate");
    };
    assert_eq!(attempts, 3);
    assert!(last_failure.unwrap().contains("upstream unavailable"));

    let requests = calls(&log);
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.strength == 60.0));
}

#[tokio::test]
async fn empty_and_unloadable_batches_are_recoverable() {
    let log = Log::default();
    let generator = scripted(
        log.clone(),
        vec![Ok(vec![]), Ok(vec!["missing.png"]), Ok(vec!["good"])],
    );

    let outcome = manager(RetryConfig::default())
        .execute_with_retry(&generator, &source(), 60.0, "box", "")
        .await
        .unwrap();

    assert_eq!(calls(&log).len(), 3);
    assert!(outcome.is_accepted());
    assert_eq!(outcome.result().retry_count, 2);
    assert_eq!(outcome.result().generation_mode, PromptTemplate::LightTexture);
}

#[tokio::test]
async fn slow_generation_times_out_as_attempt_failure() {
    let log = Log::default();
    let recorder = log.clone();
    let generator = from_fn(move |request: GenerationRequest| {
        let log = recorder.clone();
        async move {
            let first = request.attempt == 0;
            log.lock().unwrap().push(request);
            if first {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(vec![CandidateId::from("good")])
        }
    });

    let config = RetryConfig {
        generation_timeout_ms: Some(50),
        ..RetryConfig::default()
    };
    let outcome = manager(config)
        .execute_with_retry(&generator, &source(), 60.0, "box", "")
        .await
        .unwrap();

    assert_eq!(calls(&log).len(), 2);
    assert!(outcome.is_accepted());
    assert_eq!(outcome.result().retry_count, 1);
}

#[tokio::test]
async fn zero_retry_budget_runs_once() {
    let log = Log::default();
    let generator = scripted(log.clone(), vec![Ok(vec!["copy"])]);
    let config = RetryConfig {
        max_retries: 0,
        ..RetryConfig::default()
    };

    let outcome = manager(config)
        .execute_with_retry(&generator, &source(), 60.0, "box", "")
        .await
        .unwrap();

    assert_eq!(calls(&log).len(), 1);
    assert!(matches!(outcome, RetryOutcome::ExhaustedBestEffort(_)));
}

#[tokio::test]
async fn non_finite_strength_is_rejected() {
    let log = Log::default();
    let generator = scripted(log.clone(), vec![Ok(vec!["good"])]);

    let error = manager(RetryConfig::default())
        .execute_with_retry(&generator, &source(), f64::NAN, "box", "")
        .await
        .unwrap_err();

    assert!(matches!(error, RetryError::InvalidStrength(_)));
    assert!(calls(&log).is_empty());
}

#[test]
fn invalid_config_fails_at_construction() {
    let config = RetryConfig {
        k_samples_default: 0,
        ..RetryConfig::default()
    };
    let loader = Arc::new(InMemoryLoader::new());
    assert!(RetryManager::new(config, Reranker::default(), loader).is_err());
}
