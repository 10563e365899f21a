//! The `lexiloop queue` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use lexiloop_core::model::Scope;
use lexiloop_core::queue::{QueueBuilder, QueueLimits, QueueSource};

use super::context::AppContext;
use crate::GlobalArgs;

pub async fn execute(
    global: &GlobalArgs,
    deck: Option<String>,
    group: Option<(usize, usize)>,
    review_limit: Option<usize>,
    new_limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let ctx = AppContext::load(global)?;

    let scope = match (deck, group) {
        (deck, Some((index, size))) => Scope::Group { deck, index, size },
        (Some(name), None) => Scope::Deck { name },
        (None, None) => Scope::All,
    };
    let defaults = ctx.config.queue_limits();
    let limits = QueueLimits {
        review_limit: review_limit.unwrap_or(defaults.review_limit),
        new_limit: new_limit.unwrap_or(defaults.new_limit),
    };

    let builder = QueueBuilder::new(ctx.store.clone(), ctx.clock.clone());
    if json {
        // Scripts get the failure as a non-zero exit.
        let entries = builder.build(&ctx.learner, &scope, limits).await?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let response = builder.build_or_empty(&ctx.learner, &scope, limits).await;
    if let Some(tag) = &response.error {
        println!("Nothing to review ({tag}).");
        return Ok(());
    }
    let entries = response.entries;
    if entries.is_empty() {
        println!("Nothing to review.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Id", "Term", "Meaning", "Source", "Due", "Interval"]);
    for entry in &entries {
        let source = match entry.source {
            QueueSource::Due => "due",
            QueueSource::New => "new",
            QueueSource::Recent => "recent",
        };
        let (due, interval) = match &entry.state {
            Some(state) => (
                state.due_at.format("%Y-%m-%d").to_string(),
                format!("{}d", state.interval_days),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        table.add_row(vec![
            Cell::new(&entry.item.id),
            Cell::new(&entry.item.term),
            Cell::new(&entry.item.meaning),
            Cell::new(source),
            Cell::new(due),
            Cell::new(interval),
        ]);
    }
    println!("{table}");
    println!("{} item(s)", entries.len());
    Ok(())
}
