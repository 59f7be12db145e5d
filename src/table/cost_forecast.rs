use chrono::NaiveDate;
use tracing::{debug, error, info, trace};
use crate::data::cost_explorer::{ApiError, ConnectionManager};
use crate::data::types::Granularity;
use crate::data::window::{Clock, ForecastQuery};
use crate::table::{
    with_common_columns, ColumnDef, ColumnSource, ColumnType, KeyColumnQuals, QueryData,
    RowContext, RowSink, TableDef, TransformError,
};

pub const TABLE_NAME: &str = "aws_cost_forecast";

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Missing required qualifier: {0}")]
    MissingQual(&'static str),

    #[error("Failed to establish Cost Explorer session: {0:#}")]
    Session(anyhow::Error),

    #[error("GetCostForecast failed: {0}")]
    Api(#[from] ApiError),

    #[error("Forecast window out of range for {0}")]
    DateOutOfRange(NaiveDate),

    #[error("Failed to map forecast record: {0}")]
    Transform(#[from] TransformError),

    #[error("Failed to emit row: {0:#}")]
    Sink(anyhow::Error),
}

pub fn table_aws_cost_forecast() -> TableDef {
    TableDef {
        name: TABLE_NAME,
        description: "AWS Cost Explorer - Cost Forecast",
        key_columns: &["granularity"],
        columns: with_common_columns(vec![
            ColumnDef {
                name: "granularity",
                description: "",
                column_type: ColumnType::String,
                source: ColumnSource::Qual("granularity"),
            },
            ColumnDef {
                name: "period_start",
                description: "Start timestamp for this cost metric",
                column_type: ColumnType::Timestamp,
                source: ColumnSource::Field("TimePeriod.Start"),
            },
            ColumnDef {
                name: "period_end",
                description: "End timestamp for this cost metric",
                column_type: ColumnType::Timestamp,
                source: ColumnSource::Field("TimePeriod.End"),
            },
            ColumnDef {
                name: "mean_value",
                description: "Average forecasted value",
                column_type: ColumnType::Double,
                source: ColumnSource::Field("MeanValue"),
            },
        ]),
    }
}

/// List forecast rows for the `granularity` qualifier.
///
/// Makes exactly one `GetCostForecast` call. Every record is mapped before the
/// first row reaches the sink, so a failure never leaves a partial result.
/// Returns the number of rows emitted.
pub async fn list_cost_forecast(
    d: &QueryData,
    connections: &dyn ConnectionManager,
    clock: &dyn Clock,
    sink: &mut dyn RowSink,
) -> Result<usize, ForecastError> {
    trace!("list_cost_forecast");

    let svc = connections.cost_explorer().map_err(|err| {
        error!("list_cost_forecast session err={:#}", err);
        ForecastError::Session(err)
    })?;

    let query = build_cost_forecast_query(&d.key_column_quals, clock.today())?;
    let input = query.to_input();

    let output = svc.get_cost_forecast(&input).await.map_err(|err| {
        error!("list_cost_forecast err={}", err);
        ForecastError::Api(err)
    })?;

    if let Some(total) = &output.total {
        debug!(
            "Forecast total {} {} for {}..{}",
            total.amount.as_deref().unwrap_or("?"),
            total.unit.as_deref().unwrap_or(""),
            input.time_period.start,
            input.time_period.end
        );
    }

    let table = table_aws_cost_forecast();
    let ctx = RowContext {
        quals: &d.key_column_quals,
        region: connections.region(),
    };
    let rows = output
        .forecast_results_by_time
        .iter()
        .map(|record| table.row_for(record, &ctx))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            error!("list_cost_forecast transform err={}", err);
            ForecastError::Transform(err)
        })?;

    let count = rows.len();
    for row in rows {
        sink.stream_row(row).map_err(ForecastError::Sink)?;
    }

    info!("Streamed {} {} forecast rows", count, query.granularity);
    Ok(count)
}

pub fn build_cost_forecast_query(
    quals: &KeyColumnQuals,
    today: NaiveDate,
) -> Result<ForecastQuery, ForecastError> {
    let raw = quals
        .get_string_value("granularity")
        .ok_or(ForecastError::MissingQual("granularity"))?;

    ForecastQuery::new(Granularity::parse(raw), today).ok_or(ForecastError::DateOutOfRange(today))
}
