use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use goalboard_core::errors::ApplicationError;
use goalboard_core::{BusinessUnit, GoalAttainment, PerformanceSummary, RealizationMatrix};

use crate::commands::{build_runtime, load_config, open_service, CommandResult, Failure};

#[derive(Debug, Serialize)]
struct AttainmentView {
    goal: Decimal,
    label: String,
    display_percentage: Decimal,
    is_above_goal: bool,
}

impl From<&GoalAttainment> for AttainmentView {
    fn from(attainment: &GoalAttainment) -> Self {
        Self {
            goal: attainment.goal,
            label: attainment.label(),
            display_percentage: attainment.display_percentage,
            is_above_goal: attainment.is_above_goal,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReportRow {
    bu: BusinessUnit,
    name: &'static str,
    months: Vec<Decimal>,
    total: Decimal,
    attainment: AttainmentView,
}

#[derive(Debug, Serialize)]
struct YearReport {
    year: i32,
    rows: Vec<ReportRow>,
    grand_total: Decimal,
    consolidated: AttainmentView,
    skipped_records: usize,
}

fn build_report(matrix: &RealizationMatrix, summary: &PerformanceSummary) -> YearReport {
    let rows = summary
        .business_units
        .iter()
        .map(|performance| ReportRow {
            bu: performance.bu,
            name: performance.bu.display_name(),
            months: matrix.row(performance.bu).to_vec(),
            total: matrix.total_for(performance.bu),
            attainment: AttainmentView::from(&performance.attainment),
        })
        .collect();

    YearReport {
        year: matrix.year(),
        rows,
        grand_total: matrix.grand_total(),
        consolidated: AttainmentView::from(&summary.consolidated),
        skipped_records: matrix.skipped().len(),
    }
}

pub fn run(year: i32) -> CommandResult {
    let config = match load_config("report") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("report") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let (pool, service) = open_service(&config).await?;
        let outcome = match service.matrix(year).await {
            Ok(matrix) => service
                .performance(year, &config.goals)
                .await
                .map(|summary| build_report(&matrix, &summary)),
            Err(error) => Err(error),
        };
        pool.close().await;
        Ok::<_, Failure>(outcome)
    });

    match result {
        Ok(Ok(report)) => {
            let message = format!(
                "{}: realized {} against goal {} ({})",
                report.year,
                report.grand_total,
                report.consolidated.goal,
                report.consolidated.label
            );
            CommandResult::success_with_data("report", message, serde_json::to_value(&report).ok())
        }
        Ok(Err(error)) => {
            let detail = error.to_string();
            let correlation_id = Uuid::new_v4().to_string();
            let interface = ApplicationError::from(error).into_interface(correlation_id.clone());
            CommandResult::failure_with_data(
                "report",
                "store_error",
                interface.user_message(),
                6,
                Some(json!({ "detail": detail, "correlation_id": correlation_id })),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("report", error_class, message, exit_code)
        }
    }
}
