use serde::{Deserialize, Serialize};

use reelshop_model::price::DEFAULT_CURRENCY;

pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Query for the main feed endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFilters {
    pub category: String,
    pub sort_order: SortOrder,
    pub currency: String,
    pub limit: u32,
    pub min_price: f64,
    pub max_price: f64,
    pub video_only: bool,
    pub page: u32,
}

impl Default for ProductFilters {
    fn default() -> Self {
        Self {
            category: ALL_CATEGORIES.to_string(),
            sort_order: SortOrder::Asc,
            currency: DEFAULT_CURRENCY.to_string(),
            limit: 100,
            min_price: 0.0,
            max_price: 100_000.0,
            video_only: false,
            page: 1,
        }
    }
}

impl ProductFilters {
    pub fn for_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    pub(crate) fn to_query(&self) -> Vec<(&'static str, String)> {
        let category = if self.category.trim().is_empty() {
            ALL_CATEGORIES.to_string()
        } else {
            self.category.clone()
        };

        vec![
            ("category", category),
            ("sort_order", self.sort_order.as_str().to_string()),
            ("currency", self.currency.clone()),
            ("limit", self.limit.to_string()),
            ("min_price", self.min_price.to_string()),
            ("max_price", self.max_price.to_string()),
            ("JustVideo", u8::from(self.video_only).to_string()),
            ("page", self.page.max(1).to_string()),
        ]
    }
}

/// Query options for keyword search. Unset bounds are left to the server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub sort_order: SortOrder,
    pub currency: Option<String>,
    pub limit: Option<u32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl SearchFilters {
    pub(crate) fn to_query(&self, keyword: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("keyword", keyword.to_string()),
            ("sort_order", self.sort_order.as_str().to_string()),
            (
                "currency",
                self.currency
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            ),
        ];
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(min) = self.min_price {
            query.push(("min_price", min.to_string()));
        }
        if let Some(max) = self.max_price {
            query.push(("max_price", max.to_string()));
        }
        query
    }
}
