//! Product payloads as returned by the feed API.
//!
//! The API is loose about types: ids arrive as numbers or strings, prices and
//! counts as numbers or numeric strings, and the image list either as a bare
//! array or wrapped in `{ "string": [...] }`. Everything is normalized here so
//! the rest of the client never sees those variations.

use serde::{Deserialize, Deserializer, Serialize};

use crate::media::{MediaItem, media_sequence};
use crate::price;

/// Opaque product identifier, normalized to its string form.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        ProductId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        ProductId(value.to_string())
    }
}

impl From<u64> for ProductId {
    fn from(value: u64) -> Self {
        ProductId(value.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let id = match RawId::deserialize(deserializer)? {
            RawId::Text(text) => text.trim().to_string(),
            RawId::Unsigned(n) => n.to_string(),
            RawId::Signed(n) => n.to_string(),
            RawId::Float(n) => format!("{n}"),
        };
        Ok(ProductId(id))
    }
}

/// One product card of the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_title: String,

    #[serde(default, deserialize_with = "loose_number")]
    pub target_sale_price: Option<f64>,
    #[serde(default)]
    pub target_sale_price_currency: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    pub target_original_price: Option<f64>,
    #[serde(default)]
    pub target_original_price_currency: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    pub sale_price: Option<f64>,
    #[serde(default)]
    pub sale_price_currency: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    pub original_price: Option<f64>,
    #[serde(default, deserialize_with = "loose_text")]
    pub discount: Option<String>,

    #[serde(default, deserialize_with = "loose_number")]
    pub evaluate_rate: Option<f64>,
    #[serde(default, deserialize_with = "loose_count")]
    pub lastest_volume: Option<u64>,

    #[serde(default, deserialize_with = "blank_as_none")]
    pub product_video_url: Option<String>,
    #[serde(default, deserialize_with = "image_urls")]
    pub product_small_image_urls: Vec<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub product_main_image_url: Option<String>,

    #[serde(default)]
    pub promotion_link: Option<String>,
    #[serde(default)]
    pub product_detail_url: Option<String>,
    #[serde(default)]
    pub shop_name: Option<String>,
    #[serde(default)]
    pub first_level_category_name: Option<String>,
    #[serde(default)]
    pub second_level_category_name: Option<String>,
}

impl Product {
    /// Minimal product, mostly useful for tests and fixtures.
    pub fn new(id: impl Into<ProductId>, title: impl Into<String>) -> Self {
        Self {
            product_id: id.into(),
            product_title: title.into(),
            target_sale_price: None,
            target_sale_price_currency: None,
            target_original_price: None,
            target_original_price_currency: None,
            sale_price: None,
            sale_price_currency: None,
            original_price: None,
            discount: None,
            evaluate_rate: None,
            lastest_volume: None,
            product_video_url: None,
            product_small_image_urls: Vec::new(),
            product_main_image_url: None,
            promotion_link: None,
            product_detail_url: None,
            shop_name: None,
            first_level_category_name: None,
            second_level_category_name: None,
        }
    }

    pub fn with_video(mut self, url: impl Into<String>) -> Self {
        self.product_video_url = Some(url.into());
        self
    }

    pub fn with_images<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.product_small_image_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_video(&self) -> bool {
        self.product_video_url.is_some()
    }

    /// Carousel sequence for this product.
    ///
    /// Falls back to the main image when the API sent no gallery.
    pub fn media(&self) -> Vec<MediaItem> {
        let images: Vec<&str> = if self.product_small_image_urls.is_empty() {
            self.product_main_image_url.as_deref().into_iter().collect()
        } else {
            self.product_small_image_urls
                .iter()
                .map(String::as_str)
                .collect()
        };
        media_sequence(self.product_video_url.as_deref(), images)
    }

    /// Price to show, preferring the currency-converted target price.
    pub fn display_price(&self) -> Option<(f64, &str)> {
        if let Some(amount) = self.target_sale_price {
            let currency = self
                .target_sale_price_currency
                .as_deref()
                .unwrap_or(price::DEFAULT_CURRENCY);
            return Some((amount, currency));
        }
        self.sale_price.map(|amount| {
            (
                amount,
                self.sale_price_currency
                    .as_deref()
                    .unwrap_or(price::DEFAULT_CURRENCY),
            )
        })
    }

    /// Pre-discount price, if the API sent one.
    pub fn list_price(&self) -> Option<(f64, &str)> {
        if let Some(amount) = self.target_original_price {
            let currency = self
                .target_original_price_currency
                .as_deref()
                .unwrap_or(price::DEFAULT_CURRENCY);
            return Some((amount, currency));
        }
        self.original_price
            .map(|amount| (amount, price::DEFAULT_CURRENCY))
    }

    pub fn discount_percent(&self) -> f64 {
        self.discount
            .as_deref()
            .map(price::parse_percent)
            .unwrap_or(0.0)
    }

    /// Best link to send a shopper to.
    pub fn purchase_url(&self) -> Option<&str> {
        self.promotion_link
            .as_deref()
            .or(self.product_detail_url.as_deref())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseScalar {
    Number(f64),
    Text(String),
    Flag(bool),
}

fn loose_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<LooseScalar>::deserialize(deserializer)? {
        Some(LooseScalar::Number(n)) => Some(n),
        Some(LooseScalar::Text(text)) => price::parse_amount(&text),
        Some(LooseScalar::Flag(_)) | None => None,
    })
}

fn loose_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_number(deserializer)?
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as u64))
}

fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<LooseScalar>::deserialize(deserializer)? {
        Some(LooseScalar::Number(n)) => Some(format!("{n}%")),
        Some(LooseScalar::Text(text)) if !text.trim().is_empty() => {
            Some(text.trim().to_string())
        }
        _ => None,
    })
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawImageUrls {
    List(Vec<String>),
    Wrapped { string: Vec<String> },
    Single(String),
}

fn image_urls<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let urls = match Option::<RawImageUrls>::deserialize(deserializer)? {
        Some(RawImageUrls::List(urls)) => urls,
        Some(RawImageUrls::Wrapped { string }) => string,
        Some(RawImageUrls::Single(url)) => vec![url],
        None => Vec::new(),
    };
    Ok(urls
        .into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaItem;
    use serde_json::json;

    #[test]
    fn accepts_numeric_and_string_ids() {
        let a: Product = serde_json::from_value(json!({"product_id": 1005006})).unwrap();
        let b: Product =
            serde_json::from_value(json!({"product_id": " 1005006 "})).unwrap();
        assert_eq!(a.product_id, b.product_id);
        assert_eq!(a.product_id.as_str(), "1005006");
    }

    #[test]
    fn wrapped_image_list_is_unwrapped() {
        let product: Product = serde_json::from_value(json!({
            "product_id": "p1",
            "product_small_image_urls": {"string": ["a.jpg", "", "b.jpg"]}
        }))
        .unwrap();
        assert_eq!(product.product_small_image_urls, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn numeric_strings_are_parsed() {
        let product: Product = serde_json::from_value(json!({
            "product_id": "p1",
            "target_sale_price": "12.50",
            "target_sale_price_currency": "EUR",
            "evaluate_rate": "96.4%",
            "lastest_volume": "1200",
            "discount": "35%"
        }))
        .unwrap();
        assert_eq!(product.display_price(), Some((12.5, "EUR")));
        assert_eq!(product.evaluate_rate, Some(96.4));
        assert_eq!(product.lastest_volume, Some(1200));
        assert_eq!(product.discount_percent(), 35.0);
    }

    #[test]
    fn media_sequence_puts_video_first() {
        let product: Product = serde_json::from_value(json!({
            "product_id": "p1",
            "product_video_url": "https://cdn/v.mp4",
            "product_small_image_urls": ["https://cdn/a.jpg"]
        }))
        .unwrap();
        assert_eq!(
            product.media(),
            vec![
                MediaItem::video("https://cdn/v.mp4"),
                MediaItem::image("https://cdn/a.jpg"),
            ]
        );
    }

    #[test]
    fn empty_gallery_falls_back_to_main_image() {
        let product: Product = serde_json::from_value(json!({
            "product_id": "p1",
            "product_video_url": "",
            "product_main_image_url": "https://cdn/main.jpg"
        }))
        .unwrap();
        assert!(!product.has_video());
        assert_eq!(product.media(), vec![MediaItem::image("https://cdn/main.jpg")]);
    }
}
