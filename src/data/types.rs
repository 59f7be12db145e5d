use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The only metric requested from the forecast endpoint.
pub const UNBLENDED_COST: &str = "UNBLENDED_COST";

/// Wire date format for `TimePeriod` bounds.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Granularity {
    Monthly,
    Daily,
    /// Passed through to the service as given (uppercased)
    Other(String),
}

impl Granularity {
    /// Normalize a qualifier value. Matching is case-insensitive.
    pub fn parse(value: &str) -> Self {
        let upper = value.to_uppercase();
        match upper.as_str() {
            "MONTHLY" => Granularity::Monthly,
            "DAILY" => Granularity::Daily,
            _ => Granularity::Other(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Granularity::Monthly => "MONTHLY",
            Granularity::Daily => "DAILY",
            Granularity::Other(raw) => raw,
        }
    }

    /// Number of whole months the forecast window reaches past the current month.
    pub fn horizon_months(&self) -> u32 {
        match self {
            Granularity::Daily => 3,
            Granularity::Monthly | Granularity::Other(_) => 12,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DateInterval {
    pub start: String,
    pub end: String,
}

/// Request body for `AWSInsightsIndexService.GetCostForecast`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetCostForecastInput {
    pub time_period: DateInterval,
    pub granularity: String,
    pub metric: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetCostForecastOutput {
    #[serde(default)]
    pub total: Option<MetricValue>,
    #[serde(default)]
    pub forecast_results_by_time: Vec<ForecastRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricValue {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// One forecast-by-time-period entry as returned by the service.
///
/// Serializes back to the same PascalCase shape so column bindings can address
/// fields by their wire path (`TimePeriod.Start`, `MeanValue`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForecastRecord {
    pub time_period: DateInterval,
    #[serde(deserialize_with = "decimal")]
    pub mean_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_interval_lower_bound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_interval_upper_bound: Option<String>,
}

/// Cost Explorer sends amounts as decimal strings; accept plain numbers too.
fn decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Decimal {
        Number(f64),
        Text(String),
    }

    match Decimal::deserialize(deserializer)? {
        Decimal::Number(n) => Ok(n),
        Decimal::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid decimal {:?}: {}", s, e))),
    }
}
