use crate::commands::{current_thread_runtime, CommandResult};
use salonbook_core::config::{AppConfig, LoadOptions};
use salonbook_db::{connect_with_config, migrations};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(message) => return CommandResult::failure("migrate", "runtime_init", message, 3),
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let (known, applied) = migrations::status(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<(usize, usize), (&'static str, String, u8)>((known, applied))
    });

    match result {
        Ok((known, applied)) => {
            tracing::info!(
                event_name = "system.migrate.completed",
                known,
                applied,
                "database migrations applied"
            );
            CommandResult::success_with_details(
                "migrate",
                "applied pending migrations",
                Some(serde_json::json!({ "known": known, "applied": applied })),
            )
        }
        Err((error_class, message, exit_code)) => {
            tracing::error!(event_name = "system.migrate.failed", error_class, %message, "migration failed");
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
