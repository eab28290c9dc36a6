//! Media fetchers: the I/O seam under the shared cache.

use std::io::Cursor;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reelshop_model::{MediaItem, MediaKind};
use reqwest::{Client, StatusCode, header};

use super::handle::MediaPayload;
use crate::constants::prefetch;
use crate::error::MediaError;

/// Fetches the bytes behind a media URL.
///
/// Implementations only perform I/O. De-duplication, state tracking and
/// cancellation live in [`MediaCache`](super::MediaCache) and the scheduler.
#[async_trait]
pub trait MediaFetcher: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, item: &MediaItem) -> Result<MediaPayload, MediaError>;

    fn supports_url(&self, url: &str) -> bool {
        url.starts_with("http://") || url.starts_with("https://")
    }
}

/// HTTP fetcher with connection pooling.
///
/// Images are downloaded in full and their header is decoded to confirm the
/// bytes are a usable picture. Videos are warmed with a ranged request for
/// the leading bytes only.
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: Client,
    video_probe_bytes: u64,
}

impl HttpMediaFetcher {
    pub fn new(timeout: Duration, video_probe_bytes: u64) -> Result<Self, MediaError> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, video_probe_bytes))
    }

    pub fn with_client(client: Client, video_probe_bytes: u64) -> Self {
        Self {
            client,
            video_probe_bytes: video_probe_bytes.max(1),
        }
    }

    async fn fetch_image(&self, url: &str) -> Result<MediaPayload, MediaError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = content_type(&response);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| MediaError::Network(e.to_string()))?;

        let dimensions = probe_dimensions(&bytes)
            .ok_or_else(|| MediaError::Decode(format!("unrecognized image data at {url}")))?;

        log::trace!(
            "[MediaFetcher] image {} ({} bytes, {}x{})",
            url,
            bytes.len(),
            dimensions.0,
            dimensions.1
        );

        Ok(MediaPayload {
            url: url.to_string(),
            kind: MediaKind::Image,
            bytes,
            content_type,
            dimensions: Some(dimensions),
            partial: false,
            fetched_at: Instant::now(),
        })
    }

    async fn fetch_video_head(&self, url: &str) -> Result<MediaPayload, MediaError> {
        let limit = self.video_probe_bytes;
        let mut response = self
            .client
            .get(url)
            .header(header::RANGE, format!("bytes=0-{}", limit - 1))
            .send()
            .await
            .map_err(|e| MediaError::Network(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::PARTIAL_CONTENT && !status.is_success() {
            return Err(MediaError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = content_type(&response);
        let total = response.content_length();

        // Servers that ignore Range send the whole file; stop reading at the limit.
        let mut buffer = BytesMut::new();
        while (buffer.len() as u64) < limit {
            match response
                .chunk()
                .await
                .map_err(|e| MediaError::Network(e.to_string()))?
            {
                Some(chunk) => buffer.extend_from_slice(&chunk),
                None => break,
            }
        }
        buffer.truncate(limit as usize);

        let partial = status == StatusCode::PARTIAL_CONTENT
            || total.is_some_and(|len| len > buffer.len() as u64);

        log::trace!(
            "[MediaFetcher] video head {} ({} bytes, status {})",
            url,
            buffer.len(),
            status
        );

        Ok(MediaPayload {
            url: url.to_string(),
            kind: MediaKind::Video,
            bytes: buffer.freeze(),
            content_type,
            dimensions: None,
            partial,
            fetched_at: Instant::now(),
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, item: &MediaItem) -> Result<MediaPayload, MediaError> {
        let url = item.url();
        if !self.supports_url(url) {
            return Err(MediaError::UnsupportedUrl(url.to_string()));
        }

        match item.kind() {
            MediaKind::Image => self.fetch_image(url).await,
            MediaKind::Video => self.fetch_video_head(url).await,
        }
    }
}

impl Default for HttpMediaFetcher {
    fn default() -> Self {
        Self::with_client(Client::new(), prefetch::VIDEO_PROBE_BYTES)
    }
}

fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Read pixel dimensions from an image header without decoding pixels.
pub fn probe_dimensions(bytes: &Bytes) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes.as_ref()))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([200, 10, 10, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn probe_reads_png_header() {
        let bytes = Bytes::from(tiny_png());
        assert_eq!(probe_dimensions(&bytes), Some((3, 2)));
        assert_eq!(probe_dimensions(&Bytes::from_static(b"not an image")), None);
    }

    #[tokio::test]
    async fn image_fetch_reports_dimensions() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/a.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(tiny_png())
            .create_async()
            .await;

        let fetcher = HttpMediaFetcher::default();
        let url = format!("{}/a.png", server.url());
        let payload = fetcher.fetch(&MediaItem::image(&url)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(payload.kind, MediaKind::Image);
        assert_eq!(payload.dimensions, Some((3, 2)));
        assert_eq!(payload.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn undecodable_image_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/broken.jpg")
            .with_status(200)
            .with_body("<html>not found</html>")
            .create_async()
            .await;

        let fetcher = HttpMediaFetcher::default();
        let url = format!("{}/broken.jpg", server.url());
        let err = fetcher.fetch(&MediaItem::image(&url)).await.unwrap_err();
        assert!(matches!(err, MediaError::Decode(_)));
    }

    #[tokio::test]
    async fn missing_media_reports_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone.jpg")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = HttpMediaFetcher::default();
        let url = format!("{}/gone.jpg", server.url());
        let err = fetcher.fetch(&MediaItem::image(&url)).await.unwrap_err();
        assert!(matches!(err, MediaError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn video_warmup_requests_leading_range() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/clip.mp4")
            .match_header("range", "bytes=0-7")
            .with_status(206)
            .with_header("content-type", "video/mp4")
            .with_body(vec![7u8; 8])
            .create_async()
            .await;

        let fetcher = HttpMediaFetcher::with_client(Client::new(), 8);
        let url = format!("{}/clip.mp4", server.url());
        let payload = fetcher.fetch(&MediaItem::video(&url)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(payload.kind, MediaKind::Video);
        assert_eq!(payload.bytes.len(), 8);
        assert!(payload.partial);
    }

    #[tokio::test]
    async fn video_warmup_truncates_when_range_is_ignored() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/full.mp4")
            .with_status(200)
            .with_body(vec![1u8; 64])
            .create_async()
            .await;

        let fetcher = HttpMediaFetcher::with_client(Client::new(), 16);
        let url = format!("{}/full.mp4", server.url());
        let payload = fetcher.fetch(&MediaItem::video(&url)).await.unwrap();

        assert_eq!(payload.bytes.len(), 16);
        assert!(payload.partial);
    }

    #[tokio::test]
    async fn non_http_urls_are_rejected() {
        let fetcher = HttpMediaFetcher::default();
        let err = fetcher
            .fetch(&MediaItem::image("data:image/png;base64,AAAA"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedUrl(_)));
    }
}
