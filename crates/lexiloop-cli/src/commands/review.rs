//! The `lexiloop review` and `lexiloop preview` commands.

use anyhow::Result;
use comfy_table::{Cell, Table};

use lexiloop_core::grading::RatingScheme;
use lexiloop_core::ReviewError;

use super::context::AppContext;
use crate::GlobalArgs;

pub async fn execute(global: &GlobalArgs, item: String, rating: String, scheme: String) -> Result<()> {
    let scheme: RatingScheme = scheme.parse()?;
    let ctx = AppContext::load(global)?;
    let service = ctx.review_service();

    let outcome = match service.review(&ctx.learner, &item, &rating, scheme).await {
        Ok(outcome) => outcome,
        Err(e @ ReviewError::EventAppend { .. }) => {
            // The new state is already in the store; keep it.
            ctx.persist().await?;
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    ctx.persist().await?;

    println!(
        "Reviewed {} as '{}': ease {:.2} -> {:.2}, next review in {} day(s) ({})",
        item,
        outcome.event.rating,
        outcome.previous.ease,
        outcome.state.ease,
        outcome.state.interval_days,
        outcome.state.due_at.format("%Y-%m-%d %H:%M UTC"),
    );
    Ok(())
}

pub async fn preview(global: &GlobalArgs, item: String, scheme: String) -> Result<()> {
    let scheme: RatingScheme = scheme.parse()?;
    let ctx = AppContext::load(global)?;
    let previews = ctx
        .review_service()
        .preview(&ctx.learner, &item, scheme)
        .await?;

    let mut table = Table::new();
    table.set_header(vec!["Rating", "Interval (days)", "Ease"]);
    for p in &previews {
        table.add_row(vec![
            Cell::new(p.rating),
            Cell::new(p.interval_days),
            Cell::new(format!("{:.2}", p.ease)),
        ]);
    }
    println!("{table}");
    Ok(())
}
