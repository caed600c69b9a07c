use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use goalboard_core::errors::ApplicationError;
use goalboard_core::{BusinessUnit, Month, StoreError};

use crate::commands::{build_runtime, load_config, open_service, CommandResult, Failure};

/// Raw arguments as typed on the command line; parsed before any I/O.
#[derive(Clone, Debug)]
pub struct SetArgs {
    pub bu: String,
    pub month: String,
    pub year: i32,
    pub value: String,
}

struct ParsedCell {
    bu: BusinessUnit,
    month: Month,
    year: i32,
    value: Decimal,
}

fn parse_args(args: &SetArgs) -> Result<ParsedCell, String> {
    let bu = BusinessUnit::from_str(&args.bu).map_err(|error| {
        format!(
            "{error} (expected one of {})",
            BusinessUnit::ALL.map(BusinessUnit::as_str).join("|")
        )
    })?;
    let month = Month::from_str(&args.month)
        .map_err(|error| format!("{error} (expected jan..dez or 1..12)"))?;
    let value = Decimal::from_str(args.value.trim())
        .map_err(|error| format!("value `{}` is not a decimal: {error}", args.value))?;

    Ok(ParsedCell { bu, month, year: args.year, value })
}

pub fn run(args: SetArgs) -> CommandResult {
    let cell = match parse_args(&args) {
        Ok(cell) => cell,
        Err(message) => return CommandResult::failure("set", "invalid_argument", message, 7),
    };
    let config = match load_config("set") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("set") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let (pool, service) = open_service(&config).await?;
        let outcome = service.upsert_cell(cell.bu, cell.month, cell.year, cell.value).await;
        pool.close().await;
        Ok::<_, Failure>(outcome)
    });

    match result {
        Ok(Ok(record)) => CommandResult::success_with_data(
            "set",
            format!("{} {} {} = {}", record.bu, record.month, record.year, record.value),
            serde_json::to_value(&record).ok(),
        ),
        Ok(Err(error)) => store_failure(error),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("set", error_class, message, exit_code)
        }
    }
}

fn store_failure(error: StoreError) -> CommandResult {
    let error_class = match error {
        StoreError::ConstraintViolation(_) => "constraint_violation",
        StoreError::Unavailable(_) => "store_unavailable",
        StoreError::CorruptRecord(_) => "corrupt_record",
    };
    let detail = error.to_string();
    let correlation_id = Uuid::new_v4().to_string();
    let interface = ApplicationError::from(error).into_interface(correlation_id.clone());

    CommandResult::failure_with_data(
        "set",
        error_class,
        interface.user_message(),
        6,
        Some(json!({ "detail": detail, "correlation_id": correlation_id })),
    )
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use goalboard_core::{BusinessUnit, Month, StoreError};

    use super::{parse_args, store_failure, SetArgs};

    fn args(bu: &str, month: &str, value: &str) -> SetArgs {
        SetArgs {
            bu: bu.to_string(),
            month: month.to_string(),
            year: 2026,
            value: value.to_string(),
        }
    }

    #[test]
    fn parses_keys_and_numeric_months() {
        let cell = parse_args(&args("O2_TAX", "3", "350.25")).expect("valid args");
        assert_eq!(cell.bu, BusinessUnit::O2Tax);
        assert_eq!(cell.month, Month::Mar);
        assert_eq!(cell.value, Decimal::new(35025, 2));
    }

    #[test]
    fn unknown_business_unit_lists_the_choices() {
        let message = match parse_args(&args("consultoria", "jan", "1")) {
            Ok(_) => panic!("unknown business unit accepted"),
            Err(message) => message,
        };
        assert!(message.contains("modelo_atual|o2_tax|oxy_hacker|franquia"));
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        assert!(parse_args(&args("franquia", "jan", "lots")).is_err());
        assert!(parse_args(&args("franquia", "13", "1")).is_err());
    }

    #[test]
    fn store_failures_carry_the_user_message() {
        let result = store_failure(StoreError::Unavailable("pool timed out".to_string()));
        let payload: serde_json::Value =
            serde_json::from_str(&result.output).expect("valid payload");

        assert_eq!(result.exit_code, 6);
        assert_eq!(payload["error_class"], "store_unavailable");
        assert_eq!(
            payload["message"],
            "Sales data is temporarily unavailable. Showing the last loaded figures."
        );
        assert!(payload["data"]["correlation_id"].as_str().is_some_and(|id| id.len() == 36));
    }

    #[test]
    fn corrupt_records_are_reported_as_internal() {
        let result = store_failure(StoreError::CorruptRecord(
            "could not decode realization.updated_at: premature end of input".to_string(),
        ));
        let payload: serde_json::Value =
            serde_json::from_str(&result.output).expect("valid payload");

        assert_eq!(result.exit_code, 6);
        assert_eq!(payload["error_class"], "corrupt_record");
        assert_eq!(payload["message"], "An unexpected internal error occurred.");
        assert!(payload["data"]["detail"]
            .as_str()
            .is_some_and(|detail| detail.starts_with("corrupt record:")));
    }
}
