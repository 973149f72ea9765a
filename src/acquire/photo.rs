use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::acquire::{http_client, AcquisitionError};
use crate::export::links::zillow_search_url;

/// Default pause between properties in batch mode; the listing site
/// throttles aggressive clients.
pub const DEFAULT_FETCH_DELAY: Duration = Duration::from_secs(2);

const ZPID_RETRIES: usize = 2;
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Extensions probed when checking for an already-downloaded photo.
const PHOTO_EXTENSIONS: [&str; 3] = ["jpg", "png", "webp"];

/// One property to fetch a photo for, taken from a result-table row.
#[derive(Debug, Clone)]
pub struct PhotoTarget {
    pub parcel_id: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Downloads one representative photo per property from the listing site.
///
/// Idempotent per parcel: an existing file short-circuits without any
/// network traffic. All failures degrade to `None`.
pub struct PhotoFetcher {
    client: reqwest::blocking::Client,
    output_dir: PathBuf,
    delay: Duration,
}

impl PhotoFetcher {
    /// # Errors
    ///
    /// Returns `AcquisitionError::Io` if the output directory cannot be
    /// created, or an HTTP error if the client cannot be built.
    pub fn new(output_dir: impl Into<PathBuf>, delay: Duration) -> Result<Self, AcquisitionError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            client: http_client()?,
            output_dir,
            delay,
        })
    }

    /// Fetch the photo for one property. Returns the saved file path, the
    /// pre-existing file path, or `None` when the property cannot be found
    /// or downloaded.
    #[must_use]
    pub fn fetch(&self, target: &PhotoTarget) -> Option<PathBuf> {
        if let Some(existing) = self.existing_photo(&target.parcel_id) {
            debug!(parcel = %target.parcel_id, "photo already downloaded");
            return Some(existing);
        }

        let search_url = zillow_search_url(&target.address, &target.city, &target.state, &target.zip)?;

        let zpid = match self.extract_zpid(&search_url) {
            Ok(Some(zpid)) => zpid,
            Ok(None) => {
                warn!(parcel = %target.parcel_id, "property not found on listing site");
                return None;
            }
            Err(error) => {
                warn!(parcel = %target.parcel_id, %error, "zpid extraction failed");
                return None;
            }
        };
        debug!(parcel = %target.parcel_id, %zpid, "found listing");

        let page_url = photo_page_url(&zpid, target)?;
        match self.download_photo(&page_url, &target.parcel_id) {
            Ok(Some(path)) => {
                info!(parcel = %target.parcel_id, path = %path.display(), "photo saved");
                Some(path)
            }
            Ok(None) => {
                warn!(parcel = %target.parcel_id, "no photo found on listing page");
                None
            }
            Err(error) => {
                warn!(parcel = %target.parcel_id, %error, "photo download failed");
                None
            }
        }
    }

    /// Fetch photos for a batch of properties, pausing between successive
    /// downloads. Returns the parcel-to-path map for the successes.
    #[must_use]
    pub fn fetch_batch(&self, targets: &[PhotoTarget]) -> HashMap<String, PathBuf> {
        let mut photos = HashMap::new();
        for (i, target) in targets.iter().enumerate() {
            info!(
                parcel = %target.parcel_id,
                address = %target.address,
                "fetching photo {}/{}",
                i + 1,
                targets.len()
            );
            if let Some(path) = self.fetch(target) {
                photos.insert(target.parcel_id.clone(), path);
            }
            if i + 1 < targets.len() {
                std::thread::sleep(self.delay);
            }
        }
        info!("downloaded {} of {} photos", photos.len(), targets.len());
        photos
    }

    fn existing_photo(&self, parcel_id: &str) -> Option<PathBuf> {
        PHOTO_EXTENSIONS
            .iter()
            .map(|ext| self.output_dir.join(format!("{parcel_id}.{ext}")))
            .find(|path| path.exists())
    }

    /// Mine the property id out of the search results page, with bounded
    /// retries for transient failures.
    fn extract_zpid(&self, search_url: &str) -> Result<Option<String>, AcquisitionError> {
        let mut last_error = None;
        for attempt in 0..ZPID_RETRIES {
            if attempt > 0 {
                std::thread::sleep(RETRY_PAUSE);
            }
            match self.client.get(search_url).send().and_then(|r| r.text()) {
                Ok(body) => return Ok(find_zpid(&body)),
                Err(e) => last_error = Some(e),
            }
        }
        match last_error {
            Some(e) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Download the main gallery photo from the listing page and write it
    /// atomically into the output directory, named by parcel id.
    fn download_photo(
        &self,
        page_url: &str,
        parcel_id: &str,
    ) -> Result<Option<PathBuf>, AcquisitionError> {
        let body = self.client.get(page_url).send()?.text()?;
        let Some(photo_url) = find_photo_url(&body) else {
            return Ok(None);
        };

        // Query params on the CDN URL break the direct fetch
        let photo_url = photo_url.split('?').next().unwrap_or(&photo_url).to_string();
        let bytes = self.client.get(&photo_url).send()?.bytes()?;

        let extension = photo_extension(&photo_url);
        let final_path = self.output_dir.join(format!("{parcel_id}.{extension}"));

        let mut temp = tempfile::NamedTempFile::new_in(&self.output_dir)?;
        temp.write_all(&bytes)?;
        temp.persist(&final_path).map_err(|e| e.error)?;

        Ok(Some(final_path))
    }
}

/// The gallery view of a listing page, which carries the full-size photo.
fn photo_page_url(zpid: &str, target: &PhotoTarget) -> Option<String> {
    let search = zillow_search_url(&target.address, &target.city, &target.state, &target.zip)?;
    let slug = search
        .strip_prefix("https://www.zillow.com/homes/")?
        .strip_suffix("_rb/")?;
    Some(format!(
        "https://www.zillow.com/homedetails/{slug}/{zpid}_zpid/?mmlb=g,0"
    ))
}

/// Three strategies, in order of reliability: embedded JSON, data
/// attributes, and canonical listing links.
fn find_zpid(body: &str) -> Option<String> {
    let patterns = [
        r#""zpid":"(\d+)""#,
        r#"data-zpid="(\d+)""#,
        r"/homedetails/[^/]+/(\d+)_zpid/",
    ];
    for pattern in patterns {
        let re = Regex::new(pattern).unwrap();
        if let Some(captures) = re.captures(body) {
            return Some(captures[1].to_string());
        }
    }
    None
}

/// Prefer the full-size (1280px) rendition; fall back to any CDN photo URL.
fn find_photo_url(body: &str) -> Option<String> {
    let re = Regex::new(r#"https://photos\.zillowstatic\.com/[^"'\s\\]+"#).unwrap();
    let candidates: Vec<&str> = re.find_iter(body).map(|m| m.as_str()).collect();
    candidates
        .iter()
        .find(|url| url.contains("1280"))
        .or_else(|| candidates.first())
        .map(ToString::to_string)
}

fn photo_extension(url: &str) -> &'static str {
    let lower = url.to_lowercase();
    if lower.ends_with(".png") {
        "png"
    } else if lower.ends_with(".webp") {
        "webp"
    } else {
        "jpg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_zpid_strategies() {
        assert_eq!(
            find_zpid(r#"{"props":{"zpid":"44231861"}}"#).as_deref(),
            Some("44231861")
        );
        assert_eq!(
            find_zpid(r#"<article data-zpid="44231861">"#).as_deref(),
            Some("44231861")
        );
        assert_eq!(
            find_zpid(r#"<a href="/homedetails/1118-Raff-Rd-SW-Canton-OH-44710/44231861_zpid/">"#)
                .as_deref(),
            Some("44231861")
        );
        assert_eq!(find_zpid("<html>no listing here</html>"), None);
    }

    #[test]
    fn test_find_photo_url_prefers_full_size() {
        let body = r#"
            <img src="https://photos.zillowstatic.com/fp/abc-cc_ft_384.jpg">
            <img src="https://photos.zillowstatic.com/fp/abc-cc_ft_1280.jpg">
        "#;
        assert_eq!(
            find_photo_url(body).as_deref(),
            Some("https://photos.zillowstatic.com/fp/abc-cc_ft_1280.jpg")
        );

        let small_only = r#"<img src="https://photos.zillowstatic.com/fp/abc_384.jpg">"#;
        assert_eq!(
            find_photo_url(small_only).as_deref(),
            Some("https://photos.zillowstatic.com/fp/abc_384.jpg")
        );
        assert_eq!(find_photo_url("<html></html>"), None);
    }

    #[test]
    fn test_photo_page_url() {
        let target = PhotoTarget {
            parcel_id: "204522".to_string(),
            address: "1118 Raff Rd SW".to_string(),
            city: "Canton".to_string(),
            state: "OH".to_string(),
            zip: "44710".to_string(),
        };
        assert_eq!(
            photo_page_url("44231861", &target).as_deref(),
            Some("https://www.zillow.com/homedetails/1118-Raff-Rd-SW-Canton-OH-44710/44231861_zpid/?mmlb=g,0")
        );
    }

    #[test]
    fn test_photo_extension() {
        assert_eq!(photo_extension("https://x/y.png"), "png");
        assert_eq!(photo_extension("https://x/y.WEBP"), "webp");
        assert_eq!(photo_extension("https://x/y.jpg"), "jpg");
        assert_eq!(photo_extension("https://x/y"), "jpg");
    }

    #[test]
    fn test_fetch_is_idempotent_for_existing_photos() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("204522.jpg");
        std::fs::write(&existing, b"not really a jpeg").unwrap();

        let fetcher = PhotoFetcher::new(dir.path(), Duration::ZERO).unwrap();
        let target = PhotoTarget {
            parcel_id: "204522".to_string(),
            address: "1118 Raff Rd SW".to_string(),
            city: "Canton".to_string(),
            state: "OH".to_string(),
            zip: "44710".to_string(),
        };
        // Must return the existing file without touching the network
        assert_eq!(fetcher.fetch(&target), Some(existing));
    }
}
