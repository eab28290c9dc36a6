use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use reelshop_core::api::ALL_CATEGORIES;
use reelshop_core::constants::api::{CATEGORY_MAX_RETRIES, CATEGORY_RETRY_STEP};
use reelshop_core::{
    ApiClient, FeedConfig, FeedSession, Frame, HttpMediaFetcher, LikedProducts, LoadMore,
    MediaCache, ProductFilters, SearchFilters, SortOrder,
};
use reelshop_model::{EmailAddress, Product, ProductId, SignupOutcome, format_price};

use crate::cli::Command;

const TICK: Duration = Duration::from_millis(50);

/// Options for a headless feed run.
#[derive(Debug, Clone)]
pub struct BrowseOptions {
    pub filters: ProductFilters,
    pub steps: usize,
    pub dwell: Duration,
    pub viewport_height: f32,
    pub swipe: bool,
}

pub async fn execute(command: Command, config: &FeedConfig) -> Result<()> {
    let api = ApiClient::from_config(config).context("Failed to create API client")?;

    match command {
        Command::Browse {
            category,
            video_only,
            sort,
            steps,
            dwell_ms,
            viewport_height,
            swipe,
        } => {
            let filters = ProductFilters {
                category: category.unwrap_or_else(|| ALL_CATEGORIES.to_string()),
                sort_order: sort.into(),
                currency: config.currency.clone(),
                limit: config.page_limit,
                video_only,
                ..ProductFilters::default()
            };
            let options = BrowseOptions {
                filters,
                steps,
                dwell: Duration::from_millis(dwell_ms),
                viewport_height,
                swipe,
            };
            browse(&api, config, options).await
        }
        Command::Search {
            keyword,
            limit,
            sort,
        } => {
            let filters = SearchFilters {
                sort_order: SortOrder::from(sort),
                currency: Some(config.currency.clone()),
                limit,
                ..SearchFilters::default()
            };
            let page = api
                .search_products(&keyword, &filters)
                .await
                .with_context(|| format!("Search for '{}' failed", keyword.trim()))?;
            println!("{} results for '{}'", page.products.len(), keyword.trim());
            print_products(&page.products);
            Ok(())
        }
        Command::Categories => {
            let categories = api
                .fetch_categories_with_retry(CATEGORY_MAX_RETRIES, CATEGORY_RETRY_STEP)
                .await;
            if categories.is_empty() {
                return Err(anyhow!("No categories available"));
            }
            for category in categories {
                println!("{:<32} {:>6}", category.name, category.product_count);
            }
            Ok(())
        }
        Command::Product { id } => {
            let product = api
                .fetch_product(&ProductId::new(id.trim()))
                .await
                .context("Failed to fetch product")?
                .ok_or_else(|| anyhow!("Product {} not found", id.trim()))?;
            print_products(std::slice::from_ref(&product));
            if let Some(url) = product.purchase_url() {
                println!("  {}", url);
            }
            Ok(())
        }
        Command::Liked => {
            let likes = open_likes(config)?;
            let ids: Vec<ProductId> = likes.ids().cloned().collect();
            if ids.is_empty() {
                println!("No liked products yet");
                return Ok(());
            }
            let page = api
                .fetch_products_by_ids(&ids, &config.currency)
                .await
                .context("Failed to fetch liked products")?;
            println!("{} liked products", page.products.len());
            print_products(&page.products);
            Ok(())
        }
        Command::Like { id } => {
            let mut likes = open_likes(config)?;
            let liked = likes
                .toggle(&ProductId::new(id.trim()))
                .context("Failed to save likes")?;
            println!(
                "{} {}",
                if liked { "Liked" } else { "Unliked" },
                id.trim()
            );
            Ok(())
        }
        Command::Subscribe { email } => {
            let signup_url = config
                .signup_url
                .as_deref()
                .ok_or_else(|| anyhow!("No mailing list URL configured (--signup-url)"))?;
            let email = EmailAddress::parse(&email).context("Invalid email")?;
            let outcome = api
                .join_mailing_list(signup_url, &email)
                .await
                .context("Signup failed")?;
            match outcome {
                SignupOutcome::Subscribed => println!("Subscribed {}", email),
                SignupOutcome::AlreadySubscribed => println!("{} is already subscribed", email),
            }
            Ok(())
        }
        Command::Health => {
            let status = api.health_check().await.context("API unreachable")?;
            println!("{}", status);
            Ok(())
        }
    }
}

/// Scroll through the feed one product at a time, letting the prefetcher
/// work while "watching" each product.
pub async fn browse(api: &ApiClient, config: &FeedConfig, options: BrowseOptions) -> Result<()> {
    let first = api
        .fetch_products(&options.filters)
        .await
        .context("Failed to fetch the feed")?;
    if first.is_empty() {
        println!("No products match these filters");
        return Ok(());
    }

    let fetcher = HttpMediaFetcher::new(
        config.request_timeout(),
        config.prefetch.video_probe_bytes,
    )
    .context("Failed to create media fetcher")?;
    let cache = MediaCache::new(Arc::new(fetcher));
    let likes = open_likes(config)?;
    let height = options.viewport_height;

    let mut session = FeedSession::new(cache, config, height, likes);
    session.replace_products(first);
    session.on_intersection(0, 1.0);

    let mut ticker = tokio::time::interval(TICK);
    for _ in 0..options.steps {
        let index = session.current();
        let slides = if options.swipe {
            session.carousel(index).map_or(1, |c| c.len().max(1))
        } else {
            1
        };
        let segment = options.dwell / slides as u32;
        for slide in 0..slides {
            if slide > 0 {
                session.next_slide(index);
            }
            dwell(&mut session, &mut ticker, segment).await;
        }
        report(&session, index);

        let next = index + 1;
        if next >= session.displayed_products().len() && !session.has_more() {
            println!("End of feed");
            break;
        }

        let offset = next as f32 * height;
        let content = session.displayed_products().len() as f32 * height;
        match session.on_scroll(offset, content, Instant::now()) {
            LoadMore::FetchPage(page) => {
                match api.fetch_products(&options.filters.for_page(page)).await {
                    Ok(page) => session.append_page(page),
                    Err(err) => log::warn!("[Browse] could not fetch page {}: {}", page, err),
                }
            }
            LoadMore::Grew(count) => log::debug!("[Browse] feed grew to {} products", count),
            LoadMore::Nothing => {}
        }
        if next >= session.displayed_products().len() {
            println!("End of feed");
            break;
        }

        session.on_intersection(index, 0.0);
        session.on_intersection(next, 1.0);
        dwell(&mut session, &mut ticker, config.prefetch.scroll_settle() + TICK).await;
    }

    let stats = session.cache().stats();
    println!(
        "cache: {} entries, {} loaded, {} failed, {} fetches, {} hits, {} joined, {} bytes",
        stats.entries,
        stats.loaded,
        stats.failed,
        stats.fetches_started,
        stats.hits,
        stats.joined,
        stats.loaded_bytes
    );
    log::debug!("[Browse] scheduler {:?}", session.scheduler().snapshot());
    Ok(())
}

/// Pump load events and ticks for `duration`.
async fn dwell(session: &mut FeedSession, ticker: &mut tokio::time::Interval, duration: Duration) {
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = session.next_event() => match event {
                Some(event) => {
                    session.handle_event(&event);
                }
                None => break,
            },
            _ = ticker.tick() => {
                let report = session.tick(Instant::now());
                for index in report.advanced {
                    log::trace!("[Browse] product {} autoplayed", index);
                }
            }
        }
    }
}

fn report(session: &FeedSession, index: usize) {
    let Some(product) = session.displayed_products().get(index) else {
        return;
    };
    let (loaded, total, frame) = session.carousel(index).map_or((0, 0, "-".to_string()), |c| {
        let frame = match c.frame() {
            Frame::Video { index, .. } => format!("video #{index}"),
            Frame::Image { index, .. } => format!("image #{index}"),
            Frame::Placeholder => "placeholder".to_string(),
        };
        (c.loaded_count(), c.len(), frame)
    });
    let liked = if session.likes().is_liked(&product.product_id) {
        " ♥"
    } else {
        ""
    };

    println!(
        "[{:>3}] {}{} | {} | media {}/{} | showing {}",
        index,
        product.product_title,
        liked,
        price_label(product),
        loaded,
        total,
        frame
    );
}

fn print_products(products: &[Product]) {
    for product in products {
        println!(
            "{:<14} {} | {}",
            product.product_id.as_str(),
            product.product_title,
            price_label(product)
        );
    }
}

fn price_label(product: &Product) -> String {
    let Some((amount, currency)) = product.display_price() else {
        return "no price".to_string();
    };
    let price = format_price(amount, currency);
    match product.discount_percent() {
        discount if discount > 0.0 => format!("{} (-{:.0}%)", price, discount),
        _ => price,
    }
}

fn open_likes(config: &FeedConfig) -> Result<LikedProducts> {
    match config.likes_file() {
        Some(path) => LikedProducts::load(&path)
            .with_context(|| format!("Failed to read likes from {}", path.display())),
        None => Ok(LikedProducts::in_memory()),
    }
}
