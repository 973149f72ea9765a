use regex::Regex;

/// Window id used when no fresh one has been acquired. Session-scoped ids
/// expire, so links built from this one may bounce to the county search page.
pub const DEFAULT_WINDOW_ID: &str = "638981240146803746";

/// Base URL of the county assessment (iasWorld) system.
pub const COUNTY_BASE_URL: &str = "https://iasworld.starkcountyohio.gov/iasworld";

/// Builds per-parcel deep links into the county assessment system.
///
/// The core never constructs or depends on these URLs; they are attached to
/// the `Parcel_ID` column of exported result tables.
#[derive(Debug, Clone)]
pub struct CountyLinks {
    base_url: String,
    window_id: String,
}

impl CountyLinks {
    #[must_use]
    pub fn new(window_id: impl Into<String>) -> Self {
        Self {
            base_url: COUNTY_BASE_URL.to_string(),
            window_id: window_id.into(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Deep link for one parcel. The parcel id appears twice in the query
    /// string (`txtMaskedPin` and `PinValue`) - both are required by the
    /// transaction page.
    #[must_use]
    pub fn parcel_url(&self, parcel_id: &str) -> String {
        format!(
            "{base}/Maintain/Transact.aspx?txtMaskedPin={pin}&selYear=&userYear=&selJur=&chkShowHistory=False&chkShowChanges=&chkShowDeactivated=&PinValue={pin}&pin=&trans_key=&windowId={window}&submitFlag=true&TransPopUp=&ACflag=False&ACflag2=False",
            base = self.base_url,
            pin = parcel_id,
            window = self.window_id,
        )
    }
}

impl Default for CountyLinks {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_ID)
    }
}

/// Listing-site search URL for one property, or `None` if the address, city,
/// or zip is missing.
///
/// The slug strips unit/apartment suffixes and punctuation; zip+4 codes keep
/// only the five-digit prefix. The state falls back to `OH` when blank,
/// matching the county the production exports come from.
#[must_use]
pub fn zillow_search_url(address: &str, city: &str, state: &str, zip: &str) -> Option<String> {
    let address = address.trim();
    let city = city.trim();
    let zip = zip.trim().split('-').next().unwrap_or_default();
    if address.is_empty() || city.is_empty() || zip.is_empty() {
        return None;
    }
    let state = if state.trim().is_empty() { "OH" } else { state.trim() };

    let unit_suffix = Regex::new(r"(?i)\s+(Apt|Unit|#|Suite)\s*[\w-]*$").unwrap();
    let address = unit_suffix.replace(address, "");

    let slug = format!("{}-{}-{}-{}", slugify(&address), slugify(city), state, zip);
    Some(format!("https://www.zillow.com/homes/{slug}_rb/"))
}

fn slugify(text: &str) -> String {
    let punct = Regex::new(r"[^\w\s-]").unwrap();
    let whitespace = Regex::new(r"\s+").unwrap();
    let cleaned = punct.replace_all(text, "");
    whitespace.replace_all(cleaned.trim(), "-").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parcel_url_shape() {
        let links = CountyLinks::new("123456789012345678");
        let url = links.parcel_url("204522");
        assert!(url.starts_with(COUNTY_BASE_URL));
        assert_eq!(url.matches("204522").count(), 2);
        assert!(url.contains("txtMaskedPin=204522"));
        assert!(url.contains("PinValue=204522"));
        assert_eq!(url.matches("windowId=123456789012345678").count(), 1);
    }

    #[test]
    fn test_zillow_url_slug() {
        let url = zillow_search_url("1118 Raff Rd SW", "Canton", "OH", "44710").unwrap();
        assert_eq!(url, "https://www.zillow.com/homes/1118-Raff-Rd-SW-Canton-OH-44710_rb/");
    }

    #[test]
    fn test_zillow_url_strips_unit_and_zip4() {
        let url = zillow_search_url("12 E. Main St Apt 4B", "North Canton", "", "44720-1234").unwrap();
        assert_eq!(
            url,
            "https://www.zillow.com/homes/12-E-Main-St-North-Canton-OH-44720_rb/"
        );
    }

    #[test]
    fn test_zillow_url_requires_address_city_zip() {
        assert!(zillow_search_url("", "Canton", "OH", "44710").is_none());
        assert!(zillow_search_url("1118 Raff Rd", "  ", "OH", "44710").is_none());
        assert!(zillow_search_url("1118 Raff Rd", "Canton", "OH", "").is_none());
    }
}
