//! The `lexiloop activity` command.

use anyhow::Result;
use chrono::Datelike;
use comfy_table::{Cell, Table};

use lexiloop_core::activity::{check_offset, local_date, ActivityAggregator, ActivitySource};

use super::context::AppContext;
use crate::GlobalArgs;

pub async fn execute(
    global: &GlobalArgs,
    year: Option<i32>,
    month: Option<u32>,
    offset_minutes: i32,
) -> Result<()> {
    let ctx = AppContext::load(global)?;
    check_offset(offset_minutes)?;
    let today = local_date(ctx.clock.now(), offset_minutes);
    let year = year.unwrap_or(today.year());
    let month = month.unwrap_or(today.month());

    let aggregator = ActivityAggregator::new(ctx.store.clone(), ctx.store.clone());
    let calendar = aggregator
        .activity_for_month(&ctx.learner, year, month, offset_minutes)
        .await?;

    if calendar.days.is_empty() {
        println!("No reviews in {year}-{month:02}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Day", "Reviews"]);
    for (day, count) in &calendar.days {
        table.add_row(vec![Cell::new(day), Cell::new(count)]);
    }
    println!("{table}");
    println!("{} review(s) in {year}-{month:02}", calendar.total());
    if calendar.source == ActivitySource::ReviewStateFallback {
        println!("(estimated from review state; repeat reviews of one item are not counted)");
    }
    Ok(())
}
