use super::*;

pub(super) async fn handle_articles(args: &ArticlesArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let feed = ctx.gateway.article_feed();
    let mut updates = feed.subscribe();
    let watcher = tokio::spawn(async move {
        while let Some(state) = updates.recv().await {
            tracing::debug!(
                items = state.items.len(),
                next_page = state.next_page,
                loading = state.loading || state.loading_more,
                "Article feed updated"
            );
        }
    });

    let mut outcome = feed.refresh().await;
    let mut loaded = 1;
    while outcome == LoadOutcome::Loaded && loaded < args.pages && feed.state().has_more {
        outcome = feed.load_more().await;
        loaded += 1;
    }
    let state = feed.state();
    feed.dispose();
    if let Err(err) = watcher.await {
        warn!(error = %err, "Article feed watcher stopped abnormally");
    }

    if outcome == LoadOutcome::Failed {
        let error = state.error.unwrap_or_else(|| "unknown error".to_string());
        if state.items.is_empty() {
            bail!("load articles: {error}");
        }
        warn!(error = %error, "Stopped paging early");
    }
    for article in &state.items {
        let marker = if article.fresh { "*" } else { " " };
        println!(
            "{marker}{:>6}  {}  ({}, {})",
            article.id,
            article.title,
            article.byline(),
            article.nice_date
        );
    }
    println!(
        "{} articles{}",
        state.items.len(),
        if state.has_more { "; more available" } else { "" }
    );
    Ok(())
}

pub(super) async fn handle_banners(ctx: &AppContext) -> anyhow::Result<()> {
    let mut banners = ctx.gateway.banners().await.context("load banners")?;
    banners.sort_by_key(|banner| banner.order);
    if banners.is_empty() {
        println!("No banners");
    }
    for banner in banners {
        println!("{}  {}", banner.title, banner.url);
    }
    Ok(())
}
