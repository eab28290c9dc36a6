use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use reelshop_core::config::{ENV_API_URL, ENV_CURRENCY, ENV_SIGNUP_URL};
use reelshop_core::{FeedConfig, SortOrder};

#[derive(Debug, Parser)]
#[command(name = "reelshop", about = "Headless client for the Reelshop product feed")]
pub struct Cli {
    /// Base URL of the product API
    #[arg(long, global = true, env = ENV_API_URL)]
    pub api_url: Option<String>,

    /// Currency prices are requested in
    #[arg(long, global = true, env = ENV_CURRENCY)]
    pub currency: Option<String>,

    /// Mailing list endpoint
    #[arg(long, global = true, env = ENV_SIGNUP_URL)]
    pub signup_url: Option<String>,

    /// Liked products file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub likes_file: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Asc,
    Desc,
}

impl From<SortArg> for SortOrder {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Asc => SortOrder::Asc,
            SortArg::Desc => SortOrder::Desc,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scroll through the feed, prefetching media as a viewer would
    Browse {
        #[arg(long)]
        category: Option<String>,
        /// Only products with a video
        #[arg(long)]
        video_only: bool,
        #[arg(long, value_enum, default_value = "asc")]
        sort: SortArg,
        /// Products to scroll past
        #[arg(long, default_value_t = 10)]
        steps: usize,
        /// Time spent on each product
        #[arg(long, default_value_t = 1500)]
        dwell_ms: u64,
        #[arg(long, default_value_t = 800.0)]
        viewport_height: f32,
        /// Swipe through each product's gallery instead of waiting for autoplay
        #[arg(long)]
        swipe: bool,
    },
    /// Search products by keyword
    Search {
        keyword: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, value_enum, default_value = "asc")]
        sort: SortArg,
    },
    /// List product categories
    Categories,
    /// Show one product
    Product { id: String },
    /// Show liked products
    Liked,
    /// Toggle the like on a product
    Like { id: String },
    /// Join the mailing list
    Subscribe { email: String },
    /// Check that the API is reachable
    Health,
}

impl Cli {
    /// Layer command line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut FeedConfig) {
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(currency) = &self.currency {
            config.currency = currency.trim().to_ascii_uppercase();
        }
        if let Some(url) = &self.signup_url {
            config.signup_url = Some(url.clone());
        }
        if let Some(path) = &self.likes_file {
            config.likes_path = Some(path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browse_defaults() {
        let cli = Cli::try_parse_from(["reelshop", "browse", "--video-only"]).unwrap();
        match cli.command {
            Command::Browse {
                video_only,
                steps,
                sort,
                swipe,
                ..
            } => {
                assert!(video_only);
                assert_eq!(steps, 10);
                assert_eq!(sort, SortArg::Asc);
                assert!(!swipe);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_override_config() {
        let cli = Cli::try_parse_from([
            "reelshop",
            "search",
            "lamp",
            "--api-url",
            "http://api.test",
            "--currency",
            "eur",
        ])
        .unwrap();

        let mut config = FeedConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.api_base_url, "http://api.test");
        assert_eq!(config.currency, "EUR");
        assert!(matches!(cli.command, Command::Search { ref keyword, .. } if keyword == "lamp"));
    }
}
