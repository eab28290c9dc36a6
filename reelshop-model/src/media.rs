//! Media items that make up a product carousel.
//!
//! A product's carousel is always `[video?] + images[]`: when the product
//! carries a video it occupies slot zero and the images follow in API order.

use serde::{Deserialize, Serialize};

/// The two kinds of media a carousel can show.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry of a product carousel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "lowercase")]
pub enum MediaItem {
    Video(String),
    Image(String),
}

impl MediaItem {
    pub fn video(url: impl Into<String>) -> Self {
        MediaItem::Video(url.into())
    }

    pub fn image(url: impl Into<String>) -> Self {
        MediaItem::Image(url.into())
    }

    pub fn url(&self) -> &str {
        match self {
            MediaItem::Video(url) | MediaItem::Image(url) => url,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaItem::Video(_) => MediaKind::Video,
            MediaItem::Image(_) => MediaKind::Image,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaItem::Video(_))
    }
}

/// Build a carousel sequence from an optional video and a list of images.
///
/// Blank URLs are skipped; the video (when present) is always first.
pub fn media_sequence<'a>(
    video: Option<&str>,
    images: impl IntoIterator<Item = &'a str>,
) -> Vec<MediaItem> {
    let mut items = Vec::new();
    if let Some(url) = video.map(str::trim).filter(|url| !url.is_empty()) {
        items.push(MediaItem::video(url));
    }
    items.extend(
        images
            .into_iter()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(MediaItem::image),
    );
    items
}

/// Number of leading slots that belong to the first-media tier.
///
/// Image-only carousels lead with their first image. Carousels that open with
/// a video also pull in the first image, which serves as the video's cover
/// frame while it buffers.
pub fn lead_len(items: &[MediaItem]) -> usize {
    match items {
        [] => 0,
        [MediaItem::Video(_), MediaItem::Image(_), ..] => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_leads_the_sequence() {
        let items = media_sequence(Some("v.mp4"), ["a.jpg", "b.jpg"]);
        assert_eq!(
            items,
            vec![
                MediaItem::video("v.mp4"),
                MediaItem::image("a.jpg"),
                MediaItem::image("b.jpg"),
            ]
        );
    }

    #[test]
    fn blank_urls_are_dropped() {
        let items = media_sequence(Some("  "), ["", "a.jpg", " "]);
        assert_eq!(items, vec![MediaItem::image("a.jpg")]);
    }

    #[test]
    fn lead_covers_video_and_cover_frame() {
        let with_video = media_sequence(Some("v.mp4"), ["a.jpg", "b.jpg"]);
        assert_eq!(lead_len(&with_video), 2);

        let video_only = media_sequence(Some("v.mp4"), []);
        assert_eq!(lead_len(&video_only), 1);

        let images = media_sequence(None, ["a.jpg", "b.jpg"]);
        assert_eq!(lead_len(&images), 1);

        assert_eq!(lead_len(&[]), 0);
    }

    #[test]
    fn serializes_as_tagged_union() {
        let json = serde_json::to_value(MediaItem::video("v.mp4")).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "video", "url": "v.mp4"}));
    }
}
