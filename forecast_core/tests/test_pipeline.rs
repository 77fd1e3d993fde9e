use chrono::{DateTime, Duration, TimeZone, Utc};
use forecast_core::models::{FittedLinearTrend, LinearTrend};
use forecast_core::sink::MemorySink;
use forecast_core::source::MemorySource;
use forecast_core::{
    Document, ForecastError, ForecastModel, PartialMetricPolicy, PredictionRecord, Predictor,
    PredictorConfig, SeriesKey, SinkSchema, TrainingFrame,
};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde_json::json;
use tokio_util::sync::CancellationToken;

const INDEX: &str = "telegram-messages";

fn jan(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
}

/// `count` records spread over Jan 1 with a linear trend per metric
fn series_documents(
    cohort: i64,
    sub_cohort: &str,
    count: usize,
    views_slope: f64,
    forwards_offset: f64,
    seed: u64,
) -> Vec<Document> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();

    (0..count)
        .map(|i| {
            let date = jan(1, 0, 0) + Duration::seconds(576 * i as i64);
            let views = 10.0 + views_slope * i as f64 + noise.sample(&mut rng);
            let forwards = forwards_offset + 0.1 * i as f64 + noise.sample(&mut rng) * 0.1;
            let doc = json!({
                "id": format!("{}-{}", cohort, i),
                "chat_id": cohort,
                "message_id": i,
                "delta": sub_cohort,
                "date": date.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "loading_date": date.to_rfc3339(),
                "views": views,
                "forwards": forwards,
            });
            doc.as_object().cloned().unwrap()
        })
        .collect()
}

fn config(metrics: &[&str]) -> PredictorConfig {
    PredictorConfig {
        metrics: metrics.iter().map(|m| m.to_string()).collect(),
        minimum_records: 100,
        cut_quantile: 0.95,
        step_minutes: 5,
        max_workers: 4,
        ..PredictorConfig::default()
    }
}

fn model() -> LinearTrend {
    LinearTrend::new(0.8).unwrap().with_daily_seasonality(true)
}

fn records_for<'a>(
    records: &'a [PredictionRecord],
    key: &SeriesKey,
) -> Vec<&'a PredictionRecord> {
    records.iter().filter(|r| &r.key() == key).collect()
}

#[tokio::test]
async fn test_round_trip_scenario() {
    let source = MemorySource::new().with_documents(INDEX, series_documents(42, "0-5m", 150, 0.5, 3.0, 7));
    let predictor = Predictor::new(source, model(), config(&["views", "forwards"])).unwrap();

    let report = predictor
        .run(INDEX, jan(1, 0, 0), jan(2, 0, 0), jan(2, 1, 0), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.timeline_len, 13);
    assert!(report.failures.is_empty());
    assert!(report.dropped_groups.is_empty());
    assert!(!report.cancelled);
    assert_eq!(report.records.len(), 13);

    let expected: Vec<DateTime<Utc>> = (0..13).map(|k| jan(2, 0, 0) + Duration::minutes(5 * k)).collect();
    let dates: Vec<DateTime<Utc>> = report.records.iter().map(|r| r.date).collect();
    assert_eq!(dates, expected);

    for record in &report.records {
        assert_eq!(record.key(), SeriesKey::new(42, "0-5m"));
        assert_eq!(record.metrics.len(), 2);
        for forecast in record.metrics.values() {
            assert!(forecast.mean.is_finite());
            assert!(forecast.lower <= forecast.mean && forecast.mean <= forecast.upper);
        }
    }

    // Views grow by 0.5 per record, i.e. about 3.1 per hour
    let first = report.records[0].metrics["views"].mean;
    let last = report.records[12].metrics["views"].mean;
    assert!(last > first);
}

#[tokio::test]
async fn test_empty_input_yields_empty_output() {
    let predictor = Predictor::new(MemorySource::new(), model(), config(&["views"])).unwrap();

    let report = predictor
        .run(INDEX, jan(1, 0, 0), jan(2, 0, 0), jan(2, 1, 0), &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.records.is_empty());
    assert!(report.dropped_groups.is_empty());
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_minimum_count_boundary() {
    let mut documents = series_documents(1, "0-5m", 100, 0.5, 3.0, 1);
    documents.extend(series_documents(2, "0-5m", 99, 0.5, 3.0, 2));
    let source = MemorySource::new().with_documents(INDEX, documents);
    let predictor = Predictor::new(source, model(), config(&["views"])).unwrap();

    let report = predictor
        .run(INDEX, jan(1, 0, 0), jan(2, 0, 0), jan(2, 1, 0), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(records_for(&report.records, &SeriesKey::new(1, "0-5m")).len(), 13);
    assert!(records_for(&report.records, &SeriesKey::new(2, "0-5m")).is_empty());

    assert_eq!(report.dropped_groups.len(), 1);
    let dropped = &report.dropped_groups[0];
    assert_eq!(dropped.key, SeriesKey::new(2, "0-5m"));
    assert_eq!(dropped.count, 99);
    assert!(matches!(
        dropped.to_error(),
        ForecastError::InsufficientGroupSize { count: 99, minimum: 100, .. }
    ));
}

/// Linear trend that refuses frames containing negative values
#[derive(Debug)]
struct RejectNegative(LinearTrend);

impl ForecastModel for RejectNegative {
    type Fitted = FittedLinearTrend;

    fn fit(&self, frame: &TrainingFrame) -> forecast_core::Result<Self::Fitted> {
        if frame.values()?.iter().any(|v| *v < 0.0) {
            return Err(ForecastError::ModelError("negative training values".to_string()));
        }
        self.0.fit(frame)
    }

    fn name(&self) -> &str {
        "reject negative"
    }
}

/// Linear trend that panics on frames containing negative values
#[derive(Debug)]
struct PanicOnNegative(LinearTrend);

impl ForecastModel for PanicOnNegative {
    type Fitted = FittedLinearTrend;

    fn fit(&self, frame: &TrainingFrame) -> forecast_core::Result<Self::Fitted> {
        if frame.values()?.iter().any(|v| *v < 0.0) {
            panic!("negative training values");
        }
        self.0.fit(frame)
    }

    fn name(&self) -> &str {
        "panic on negative"
    }
}

fn two_series_source() -> MemorySource {
    let mut documents = series_documents(1, "0-5m", 120, 0.5, 3.0, 11);
    // Series 2 has negative forwards only
    documents.extend(series_documents(2, "5-10m", 120, 0.25, -50.0, 12));
    MemorySource::new().with_documents(INDEX, documents)
}

#[tokio::test]
async fn test_failure_in_one_unit_leaves_others_untouched() {
    let failing = Predictor::new(two_series_source(), RejectNegative(model()), config(&["views", "forwards"])).unwrap();
    let healthy = Predictor::new(two_series_source(), model(), config(&["views", "forwards"])).unwrap();
    let cancel = CancellationToken::new();

    let with_failure = failing
        .run(INDEX, jan(1, 0, 0), jan(2, 0, 0), jan(2, 1, 0), &cancel)
        .await
        .unwrap();
    let baseline = healthy
        .run(INDEX, jan(1, 0, 0), jan(2, 0, 0), jan(2, 1, 0), &cancel)
        .await
        .unwrap();

    assert_eq!(with_failure.failures.len(), 1);
    assert_eq!(with_failure.failures[0].key, SeriesKey::new(2, "5-10m"));
    assert_eq!(with_failure.failures[0].metric, "forwards");
    assert_eq!(with_failure.records.len(), baseline.records.len());

    for (got, expected) in with_failure.records.iter().zip(&baseline.records) {
        assert_eq!(got.key(), expected.key());
        assert_eq!(got.date, expected.date);

        let mut expected_metrics = expected.metrics.clone();
        if got.key() == SeriesKey::new(2, "5-10m") {
            expected_metrics.remove("forwards");
        }
        assert_eq!(got.metrics, expected_metrics);
    }
}

#[tokio::test]
async fn test_panicking_unit_is_recorded_as_failure() {
    let predictor = Predictor::new(two_series_source(), PanicOnNegative(model()), config(&["views", "forwards"])).unwrap();

    let report = predictor
        .run(INDEX, jan(1, 0, 0), jan(2, 0, 0), jan(2, 1, 0), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, ForecastError::ModelError(_)));
    assert_eq!(report.records.len(), 26);
}

#[tokio::test]
async fn test_drop_group_policy_removes_partial_series() {
    let mut config = config(&["views", "forwards"]);
    config.partial_metric_policy = PartialMetricPolicy::DropGroup;
    let predictor = Predictor::new(two_series_source(), RejectNegative(model()), config).unwrap();

    let report = predictor
        .run(INDEX, jan(1, 0, 0), jan(2, 0, 0), jan(2, 1, 0), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.records.len(), 13);
    assert!(report.records.iter().all(|r| r.key() == SeriesKey::new(1, "0-5m")));
    assert!(report.records.iter().all(|r| r.metrics.len() == 2));
}

#[tokio::test]
async fn test_single_timestamp_series_fails_with_insufficient_training_data() {
    let mut documents = series_documents(5, "0-5m", 120, 0.5, 3.0, 9);
    for doc in &mut documents {
        doc.insert("date".to_string(), json!("2024-01-01T12:00:00"));
    }
    documents.extend(series_documents(6, "0-5m", 120, 0.5, 3.0, 10));
    let source = MemorySource::new().with_documents(INDEX, documents);
    let predictor = Predictor::new(source, model(), config(&["views"])).unwrap();

    let report = predictor
        .run(INDEX, jan(1, 0, 0), jan(2, 0, 0), jan(2, 1, 0), &CancellationToken::new())
        .await
        .unwrap();

    let stuck = SeriesKey::new(5, "0-5m");
    assert_eq!(report.failures.len(), 1);
    match &report.failures[0].error {
        ForecastError::InsufficientTrainingData { key, metric, points } => {
            assert_eq!(key, &stuck);
            assert_eq!(metric, "views");
            assert!(*points > 0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(records_for(&report.records, &stuck).is_empty());
    assert_eq!(records_for(&report.records, &SeriesKey::new(6, "0-5m")).len(), 13);
}

#[tokio::test]
async fn test_cancelled_run_starts_no_units() {
    let predictor = Predictor::new(two_series_source(), model(), config(&["views"])).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = predictor
        .run(INDEX, jan(1, 0, 0), jan(2, 0, 0), jan(2, 1, 0), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ForecastError::Cancelled));

    let documents = series_documents(1, "0-5m", 120, 0.5, 3.0, 3);
    let report = predictor
        .predict_documents(&documents, jan(2, 0, 0), jan(2, 1, 0), &cancel)
        .await
        .unwrap();
    assert!(report.cancelled);
    assert!(report.records.is_empty());
}

#[tokio::test]
async fn test_malformed_document_fails_the_run() {
    let mut documents = series_documents(1, "0-5m", 120, 0.5, 3.0, 4);
    documents[17].remove("delta");
    let source = MemorySource::new().with_documents(INDEX, documents);
    let predictor = Predictor::new(source, model(), config(&["views"])).unwrap();

    let err = predictor
        .run(INDEX, jan(1, 0, 0), jan(2, 0, 0), jan(2, 1, 0), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ForecastError::MalformedRecord { index, field } => {
            assert_eq!(index, 17);
            assert_eq!(field, "delta");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_run_and_store_upserts_rows() {
    let config = config(&["views"]);
    let schema = SinkSchema::for_predictions("telegram_predictions", &config.fields, &config.metrics).unwrap();
    let source = MemorySource::new().with_documents(INDEX, series_documents(42, "0-5m", 150, 0.5, 3.0, 5));
    let predictor = Predictor::new(source, model(), config).unwrap();
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        predictor
            .run_and_store(&sink, &schema, INDEX, jan(1, 0, 0), jan(2, 0, 0), jan(2, 1, 0), &cancel)
            .await
            .unwrap();
    }

    // Second run overwrites the first by key
    let rows = sink.rows("telegram_predictions").await;
    assert_eq!(rows.len(), 13);
    assert!(rows.iter().all(|row| row.contains_key("views_upper")));
}

#[tokio::test]
async fn test_schema_mismatch_fails_before_writing() {
    let config = config(&["views", "forwards"]);
    let schema = SinkSchema::for_predictions("telegram_predictions", &config.fields, &["views".to_string()]).unwrap();
    let source = MemorySource::new().with_documents(INDEX, series_documents(42, "0-5m", 150, 0.5, 3.0, 6));
    let predictor = Predictor::new(source, model(), config).unwrap();
    let sink = MemorySink::new();

    let err = predictor
        .run_and_store(&sink, &schema, INDEX, jan(1, 0, 0), jan(2, 0, 0), jan(2, 1, 0), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ForecastError::SchemaMismatch { table, column } => {
            assert_eq!(table, "telegram_predictions");
            assert!(column.starts_with("forwards"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(sink.rows("telegram_predictions").await.is_empty());
}

#[tokio::test]
async fn test_invalid_window_is_rejected() {
    let predictor = Predictor::new(MemorySource::new(), model(), config(&["views"])).unwrap();

    let err = predictor
        .run(INDEX, jan(2, 0, 0), jan(1, 0, 0), jan(2, 1, 0), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ForecastError::InvalidParameter(_)));
}
