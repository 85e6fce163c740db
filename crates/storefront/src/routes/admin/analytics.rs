//! Sales summary for the back-office dashboard.

use axum::extract::State;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::db::AnalyticsRepository;
use crate::error::{ApiResponse, AppError, Result};
use crate::extract::Query;
use crate::models::AnalyticsSummary;
use crate::state::AppState;

const DEFAULT_RANGE_DAYS: i64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl RangeQuery {
    /// Resolve the range; defaults to the last 30 days.
    fn resolve(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let to = self.to.unwrap_or(now);
        let from = self
            .from
            .unwrap_or_else(|| to - Duration::days(DEFAULT_RANGE_DAYS));
        if from >= to {
            return Err(AppError::BadRequest(
                "from must be before to".to_string(),
            ));
        }
        Ok((from, to))
    }
}

#[instrument(skip(state))]
pub async fn summary(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> Result<ApiResponse<AnalyticsSummary>> {
    let (from, to) = range.resolve(Utc::now())?;
    let summary = AnalyticsRepository::new(state.pool())
        .summary(from, to)
        .await?;
    Ok(ApiResponse::ok(summary))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_range_defaults_to_last_30_days() {
        let now = Utc::now();
        let (from, to) = RangeQuery::default().resolve(now).unwrap();
        assert_eq!(to, now);
        assert_eq!(to - from, Duration::days(30));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let now = Utc::now();
        let range = RangeQuery {
            from: Some(now),
            to: Some(now - Duration::days(1)),
        };
        assert!(range.resolve(now).is_err());
    }
}
