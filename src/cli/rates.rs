use super::ui;
use crate::core::rate::{self, NewRate, RatePatch};
use crate::core::schedule::{self, DailySchedule};
use crate::core::{ExchangeRate, RateSyncEngine, RateUpdate, SyncAction, SyncReport};
use anyhow::{Result, anyhow};
use comfy_table::{Cell, Color};
use tracing::info;

pub fn display_rates(rates: &[ExchangeRate]) -> String {
    if rates.is_empty() {
        return ui::style_text("No foreign exchange rates available", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Name"),
        ui::header_cell("Buy"),
        ui::header_cell("Sell"),
        ui::header_cell("Base"),
        ui::header_cell("Status"),
        ui::header_cell("Last Synced"),
    ]);

    for rate in rates {
        let currency = match &rate.flag {
            Some(flag) => format!("{flag} {}", rate.currency_code),
            None => rate.currency_code.clone(),
        };
        table.add_row(vec![
            Cell::new(currency),
            Cell::new(&rate.display_name),
            ui::rate_cell(rate.buy_rate),
            ui::rate_cell(rate.sell_rate),
            Cell::new(&rate.base_currency_code),
            ui::status_cell(rate.active),
            Cell::new(rate.last_synced_at.format("%Y-%m-%d %H:%M UTC")),
        ]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text("Foreign Exchange Rates", ui::StyleType::Title),
        table
    )
}

pub fn display_updates(updates: &[RateUpdate]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Currency"), ui::header_cell("Action")]);
    for update in updates {
        let action = match update.action {
            SyncAction::Created => Cell::new("created").fg(Color::Green),
            SyncAction::Updated => Cell::new("updated").fg(Color::Yellow),
        };
        table.add_row(vec![Cell::new(&update.currency), action]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text(
            &format!("Synced {} currency rates", updates.len()),
            ui::StyleType::Success
        ),
        table
    )
}

pub async fn run_sync(engine: &RateSyncEngine) -> Result<()> {
    let spinner = ui::new_spinner("Syncing foreign exchange rates...");
    let report = engine.sync_all().await;
    spinner.finish_and_clear();

    match report {
        SyncReport::Synced(updates) => {
            println!("{}", display_updates(&updates));
            Ok(())
        }
        SyncReport::Failed(e) => {
            println!(
                "{}",
                ui::style_text("Rates unavailable, try again later", ui::StyleType::Error)
            );
            Err(anyhow!("Failed to sync foreign exchange rates: {e}"))
        }
    }
}

pub async fn run_list(engine: &RateSyncEngine, all: bool) -> Result<()> {
    let rates = if all {
        engine.list_all().await?
    } else {
        engine.list_public().await?
    };
    println!("{}", display_rates(&rates));
    Ok(())
}

pub async fn run_add(engine: &RateSyncEngine, input: NewRate, default_base: &str) -> Result<()> {
    let created = rate::create_rate(engine.store(), input, default_base).await?;
    info!(currency = %created.currency_code, "Foreign exchange rate created");
    println!("{}", display_rates(std::slice::from_ref(&created)));
    Ok(())
}

pub async fn run_update(
    engine: &RateSyncEngine,
    currency_code: &str,
    patch: RatePatch,
) -> Result<()> {
    let updated = rate::update_rate(engine.store(), currency_code, patch).await?;
    info!(currency = %updated.currency_code, "Foreign exchange rate updated");
    println!("{}", display_rates(std::slice::from_ref(&updated)));
    Ok(())
}

pub async fn run_remove(engine: &RateSyncEngine, currency_code: &str) -> Result<()> {
    rate::delete_rate(engine.store(), currency_code).await?;
    println!(
        "{}",
        ui::style_text(
            &format!("Deleted foreign exchange rate {}", currency_code.to_uppercase()),
            ui::StyleType::Success
        )
    );
    Ok(())
}

pub async fn run_schedule(engine: &RateSyncEngine, daily: &DailySchedule) -> Result<()> {
    tokio::select! {
        _ = schedule::run_daily(engine, daily) => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Scheduler stopped");
            Ok(())
        }
    }
}
