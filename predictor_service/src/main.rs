use anyhow::{Context, Result};
use clap::Parser;
use forecast_core::models::LinearTrend;
use forecast_core::{PredictionReport, Predictor, PredictorConfig, RecordSource, SinkSchema};
use predictor_service::{
    load_predictor_config, Args, CsvSource, ElasticSource, MySqlSink, ServiceConfig,
};
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,predictor_service=info,forecast_core=info".into());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let service = ServiceConfig::from_env()?;
    let config = load_predictor_config(args.config.as_deref())?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing running forecasts");
                cancel.cancel();
            }
        });
    }

    let report = match &args.csv {
        Some(path) => execute(CsvSource::new(path), config, &args, &service, &cancel).await?,
        None => {
            let source = ElasticSource::new(
                service.require_elasticsearch_url()?,
                service.elasticsearch_api_key.clone(),
                service.elasticsearch_timeout,
            )?;
            execute(source, config, &args, &service, &cancel).await?
        }
    };

    for dropped in &report.dropped_groups {
        tracing::debug!(error = %dropped.to_error(), "series skipped");
    }
    if report.cancelled {
        tracing::warn!(records = report.records.len(), "run cancelled, output is partial");
    }

    Ok(())
}

async fn execute<S: RecordSource>(
    source: S,
    config: PredictorConfig,
    args: &Args,
    service: &ServiceConfig,
    cancel: &CancellationToken,
) -> Result<PredictionReport> {
    let model = LinearTrend::new(config.interval_width)?
        .with_daily_seasonality(config.daily_seasonality);
    let predictor = Predictor::new(source, model, config)?;

    if args.dry_run {
        let report = predictor
            .run(&args.index, args.from, args.to, args.predict_to, cancel)
            .await?;
        println!("{}", serde_json::to_string_pretty(&report.records)?);
        return Ok(report);
    }

    let schema = SinkSchema::for_predictions(
        service.predictions_table.clone(),
        &predictor.config().fields,
        &predictor.config().metrics,
    )?;
    let sink = MySqlSink::connect(service.require_database_url()?)
        .await
        .context("failed to connect to the predictions database")?;

    let report = predictor
        .run_and_store(
            &sink,
            &schema,
            &args.index,
            args.from,
            args.to,
            args.predict_to,
            cancel,
        )
        .await?;
    Ok(report)
}
