//! CLI smoke entry point.
//!
//! # Responsibility
//! - Load the current month from the sample backend through the core.
//! - Print one deterministic line per day that has tags.

use chrono::{Datelike, Local};
use daynote_core::{CoreConfig, PageCoordinator, PageRange, SampleStorage};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("daynote: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    config.init_logging().map_err(|err| err.to_string())?;

    let today = Local::now().date_naive();
    let range = PageRange::month(today.year(), today.month()).map_err(|err| err.to_string())?;
    let mut coordinator = PageCoordinator::new(SampleStorage::new(), today);
    let page = coordinator
        .reset_page(range)
        .map_err(|err| err.to_string())?;
    let tags = coordinator.tags();
    log::info!(
        "event=cli_probe module=cli status=ok range={range} records={}",
        page.len()
    );

    println!("daynote_core version={}", daynote_core::core_version());
    println!("page={range} records={}", page.len());
    for date in range.days() {
        let set = page.records_by_date(date);
        if set.is_empty() {
            continue;
        }
        let mut labels = Vec::new();
        for tag in set.all_tags() {
            let name = tags.name(tag).map_err(|err| err.to_string())?;
            let mark = if set.check_all_records_with_tag_complete(tag) {
                "done"
            } else {
                "open"
            };
            labels.push(format!("{name}({}, {mark})", set.num_records_with_tag(tag)));
        }
        println!("{date} {}", labels.join(" "));
    }
    Ok(())
}
