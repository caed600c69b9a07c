use tracing::info;

use crate::commands::{build_runtime, load_config, CommandResult, Failure};
use goalboard_db::{connect_with_config, migrations};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<usize, Failure>(migrations::MIGRATOR.iter().count())
    });

    match result {
        Ok(known) => {
            info!(event_name = "system.migrate.completed", known, "database schema is current");
            CommandResult::success("migrate", format!("applied pending migrations ({known} known)"))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
