//! The `lexiloop daily` and `lexiloop save-daily` commands.

use std::sync::Arc;

use anyhow::{Context, Result};

use lexiloop_core::activity::{check_offset, local_date};
use lexiloop_core::cache::CachedGenerator;
use lexiloop_core::daily::{mark_saved, DailyGuard, DailyRequest};
use lexiloop_core::executor::BoundedExecutor;
use lexiloop_core::model::DailyArtifact;
use lexiloop_core::traits::ContentGenerator;
use lexiloop_providers::create_generator;

use super::context::{resolve_date, AppContext};
use crate::GlobalArgs;

/// Options for `lexiloop daily`.
pub struct DailyArgs {
    pub date: Option<String>,
    pub length: String,
    pub level: String,
    pub terms: Option<String>,
    pub topic: Option<String>,
    pub provider: Option<String>,
    pub offset_minutes: i32,
}

fn guard(ctx: &AppContext, provider: Option<&str>) -> Result<DailyGuard> {
    let name = provider.unwrap_or(&ctx.config.default_provider);
    let provider_config = ctx
        .config
        .providers
        .get(name)
        .with_context(|| format!("provider '{name}' is not configured"))?;

    let mut generator: Arc<dyn ContentGenerator> =
        create_generator(name, provider_config, &ctx.config)?;
    if ctx.config.story_cache_capacity > 0 {
        generator = Arc::new(CachedGenerator::new(generator, ctx.config.story_cache_capacity));
    }
    let executor = BoundedExecutor::new(ctx.config.generation_concurrency)?;

    Ok(DailyGuard::new(
        ctx.store.clone(),
        generator,
        executor,
        ctx.clock.clone(),
        ctx.config.daily_config(),
    ))
}

fn print_artifact(artifact: &DailyArtifact) {
    println!(
        "Daily story for {} ({}, {}){}",
        artifact.date,
        artifact.level,
        artifact.length,
        if artifact.saved { " [saved]" } else { "" }
    );
    println!();
    println!("{}", artifact.text);
    println!();
    println!("{} target item(s)", artifact.target_item_ids.len());
}

pub async fn execute(global: &GlobalArgs, args: DailyArgs) -> Result<()> {
    let ctx = AppContext::load(global)?;
    let request = DailyRequest {
        length: args.length.parse()?,
        level: args.level.parse()?,
        requested_terms: args
            .terms
            .as_deref()
            .map(|t| {
                t.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        topic: args.topic,
    };

    let guard = guard(&ctx, args.provider.as_deref())?;
    let date = resolve_date(args.date.as_deref(), guard.today(args.offset_minutes)?)?;
    let artifact = guard.get_or_create(&ctx.learner, date, &request).await?;
    ctx.persist().await?;

    print_artifact(&artifact);
    Ok(())
}

pub async fn save(global: &GlobalArgs, date: Option<String>, offset_minutes: i32) -> Result<()> {
    let ctx = AppContext::load(global)?;
    check_offset(offset_minutes)?;
    let today = local_date(ctx.clock.now(), offset_minutes);
    let date = resolve_date(date.as_deref(), today)?;

    let artifact = mark_saved(ctx.store.as_ref(), &ctx.learner, date).await?;
    ctx.persist().await?;
    println!("Saved daily story for {}.", artifact.date);
    Ok(())
}
