//! Entry point tying a record source, the pipeline and a sink together

use crate::config::PredictorConfig;
use crate::data::{parse_records, Document, RawRecord};
use crate::error::{ForecastError, Result};
use crate::models::ForecastModel;
use crate::pipeline::{
    filter_groups, group_records, merge_forecasts, DroppedGroup, ForecastRunner, FutureTimeline,
    PredictionRecord, UnitFailure,
};
use crate::sink::{PredictionSink, Row, SinkSchema};
use crate::source::{RecordSource, SourceQuery};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Output of one prediction run
#[derive(Debug, Default)]
pub struct PredictionReport {
    pub records: Vec<PredictionRecord>,
    /// Series skipped for having too few records
    pub dropped_groups: Vec<DroppedGroup>,
    /// (series, metric) pairs whose forecast was omitted
    pub failures: Vec<UnitFailure>,
    /// Number of timestamps every series was predicted on
    pub timeline_len: usize,
    pub cancelled: bool,
}

impl PredictionReport {
    /// Flatten every record into sink rows
    pub fn rows(&self, config: &PredictorConfig) -> Vec<Row> {
        self.records
            .iter()
            .map(|record| record.to_row(&config.fields))
            .collect()
    }
}

/// Grabs records and creates predictions for a training window
#[derive(Debug)]
pub struct Predictor<S, M: ForecastModel> {
    source: S,
    model: Arc<M>,
    config: PredictorConfig,
}

impl<S: RecordSource, M: ForecastModel> Predictor<S, M> {
    pub fn new(source: S, model: M, config: PredictorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            model: Arc::new(model),
            config,
        })
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Fetch `[from_date, to_date]` from `index` and predict every series
    /// from `to_date` up to `predict_to`.
    pub async fn run(
        &self,
        index: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        predict_to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PredictionReport> {
        let span = tracing::info_span!(
            "predict",
            index = %index,
            from = %from_date,
            to = %to_date,
            predict_to = %predict_to,
        );

        async move {
            validate_window(from_date, to_date, predict_to)?;
            if cancel.is_cancelled() {
                return Err(ForecastError::Cancelled);
            }

            let query = SourceQuery::new(
                index,
                from_date,
                to_date,
                &self.config.fields,
                &self.config.metrics,
            );
            let documents = self.source.fetch(&query).await?;
            tracing::info!(documents = documents.len(), "fetched training records");

            self.predict_documents(&documents, to_date, predict_to, cancel)
                .await
        }
        .instrument(span)
        .await
    }

    /// [`Predictor::run`], then write the records to `sink`.
    ///
    /// Rows are checked against `schema` before anything is written; a
    /// cancelled run writes the records it completed.
    pub async fn run_and_store<K: PredictionSink>(
        &self,
        sink: &K,
        schema: &SinkSchema,
        index: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        predict_to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PredictionReport> {
        let report = self
            .run(index, from_date, to_date, predict_to, cancel)
            .await?;

        let rows = report.rows(&self.config);
        schema.check_rows(&rows)?;

        if !rows.is_empty() {
            let written = sink.upsert(schema, &rows).await?;
            tracing::info!(table = schema.table(), rows = written, "stored predictions");
        }

        Ok(report)
    }

    /// Parse already-fetched documents and predict on them
    pub async fn predict_documents(
        &self,
        documents: &[Document],
        predict_from: DateTime<Utc>,
        predict_to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PredictionReport> {
        let records = parse_records(documents, &self.config.fields, &self.config.metrics)?;
        self.predict_records(records, predict_from, predict_to, cancel)
            .await
    }

    /// Group, filter, forecast and merge parsed records
    pub async fn predict_records(
        &self,
        records: Vec<RawRecord>,
        predict_from: DateTime<Utc>,
        predict_to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PredictionReport> {
        let timeline =
            FutureTimeline::build(predict_from, predict_to, self.config.step_minutes)?;

        let groups = group_records(records);
        let total_groups = groups.len();
        let filtered = filter_groups(groups, self.config.minimum_records);

        let runner = ForecastRunner::new(
            Arc::clone(&self.model),
            self.config.metrics.clone(),
            self.config.cut_quantile,
            self.config.max_workers,
        );
        let outcome = runner.run(filtered.kept, &timeline, cancel).await?;

        let records = merge_forecasts(
            outcome.forecasts,
            &self.config.metrics,
            self.config.partial_metric_policy,
        );

        tracing::info!(
            horizon_start = %timeline.first(),
            horizon_end = %timeline.last(),
            groups = total_groups,
            dropped_groups = filtered.dropped.len(),
            completed_units = outcome.completed,
            failed_units = outcome.failures.len(),
            records = records.len(),
            cancelled = outcome.cancelled,
            "prediction run finished"
        );

        Ok(PredictionReport {
            records,
            dropped_groups: filtered.dropped,
            failures: outcome.failures,
            timeline_len: timeline.len(),
            cancelled: outcome.cancelled,
        })
    }
}

fn validate_window(
    from_date: DateTime<Utc>,
    to_date: DateTime<Utc>,
    predict_to: DateTime<Utc>,
) -> Result<()> {
    if from_date > to_date {
        return Err(ForecastError::InvalidParameter(format!(
            "Training window starts ({}) after it ends ({})",
            from_date, to_date
        )));
    }
    if predict_to < to_date {
        return Err(ForecastError::InvalidParameter(format!(
            "Prediction horizon ({}) ends before the training window ({})",
            predict_to, to_date
        )));
    }
    Ok(())
}
