//! The `lexiloop add` command.

use anyhow::Result;

use lexiloop_core::traits::ReviewStore;

use super::context::AppContext;
use crate::GlobalArgs;

pub async fn execute(
    global: &GlobalArgs,
    term: String,
    meaning: String,
    deck: Option<String>,
) -> Result<()> {
    let ctx = AppContext::load(global)?;
    let service = ctx.review_service();

    if let Some(name) = &deck {
        if ctx.store.get_deck(&ctx.learner, name).await?.is_none() {
            service.create_deck(&ctx.learner, name).await?;
            println!("Created deck '{name}'");
        }
    }

    let item = service
        .add_item(&ctx.learner, &term, &meaning, deck.as_deref())
        .await?;
    ctx.persist().await?;

    println!("Added '{}' ({})", item.term, item.id);
    Ok(())
}
