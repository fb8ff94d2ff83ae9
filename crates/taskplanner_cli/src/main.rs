//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `taskplanner_core` linkage against a real store.
//! - Print one deterministic status line per profile.

use std::process::ExitCode;
use taskplanner_core::{
    CoreConfig, Database, ProfileService, ServiceError, Session, StatisticsState, StatsService,
};

fn main() -> ExitCode {
    println!("taskplanner_core ping={}", taskplanner_core::ping());
    println!("taskplanner_core version={}", taskplanner_core::core_version());

    let config = match CoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = taskplanner_core::init_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &CoreConfig) -> Result<(), ServiceError> {
    let db = Database::open_with_config(config).map_err(|err| ServiceError::Storage(err.into()))?;
    let session = Session::open(&db)?;
    let profiles = ProfileService::new(&session);

    let all = profiles.list_profiles()?;
    println!("profiles={}", all.len());
    for user in &all {
        println!(
            "profile id={} current={} last_used={}",
            user.id, user.is_current, user.last_used
        );
    }

    match StatsService::from_session(&session).statistics()? {
        StatisticsState::Empty => println!("statistics=empty"),
        StatisticsState::Ready(stats) => println!(
            "statistics total={} completed={} completion_rate={:.2}",
            stats.total_tasks, stats.completed_tasks, stats.completion_rate
        ),
    }

    log::info!(
        "event=cli_run module=cli status=ok profiles={}",
        all.len()
    );
    Ok(())
}
