use regex::Regex;
use tracing::{info, warn};

use crate::acquire::{http_client, AcquisitionError};
use crate::export::links::COUNTY_BASE_URL;

/// County portal credentials for the authenticated extraction path.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Parcel searched for when probing the transaction page for a redirect.
const PROBE_PARCEL: &str = "204522";

/// Acquire a session-scoped `windowId` for county deep links.
///
/// Tries unauthenticated extraction first (the property search is usually
/// public), then the authenticated path if credentials are given, then the
/// fallback string. Returns `None` only if every method fails and no
/// fallback was provided. Never panics, never propagates network errors.
#[must_use]
pub fn acquire_window_id(
    credentials: Option<&Credentials>,
    fallback: Option<&str>,
) -> Option<String> {
    match extract_public() {
        Ok(Some(id)) => {
            info!(window_id = %id, "extracted windowId without login");
            return Some(id);
        }
        Ok(None) => info!("no windowId visible without login"),
        Err(error) => warn!(%error, "unauthenticated windowId extraction failed"),
    }

    if let Some(creds) = credentials {
        match extract_with_login(creds) {
            Ok(Some(id)) => {
                info!(window_id = %id, "extracted windowId after login");
                return Some(id);
            }
            Ok(None) => warn!("logged in but found no windowId"),
            Err(error) => warn!(%error, "authenticated windowId extraction failed"),
        }
    }

    match fallback {
        Some(id) => {
            info!(window_id = %id, "using fallback windowId");
            Some(id.to_string())
        }
        None => {
            warn!("could not acquire a windowId; deep links need manual entry");
            None
        }
    }
}

/// Unauthenticated path: the search page sometimes embeds a windowId for
/// anonymous sessions.
fn extract_public() -> Result<Option<String>, AcquisitionError> {
    let client = http_client()?;

    // Establish a session cookie first; the search page 302s without one
    client.get(format!("{COUNTY_BASE_URL}/")).send()?;

    let response = client
        .get(format!("{COUNTY_BASE_URL}/PropertySearch.aspx"))
        .send()?;
    if !response.status().is_success() {
        return Err(AcquisitionError::MarkupDrift(format!(
            "search page returned {}",
            response.status()
        )));
    }

    Ok(find_window_id(&response.text()?))
}

/// Authenticated path: log in (replaying the ASP.NET hidden form fields),
/// then mine the search page, its links, and finally a probe redirect.
fn extract_with_login(credentials: &Credentials) -> Result<Option<String>, AcquisitionError> {
    let client = http_client()?;
    let login_url = format!("{COUNTY_BASE_URL}/Login.aspx");

    let login_page = client.get(&login_url).send()?;
    if !login_page.status().is_success() {
        return Err(AcquisitionError::MarkupDrift(format!(
            "login page returned {}",
            login_page.status()
        )));
    }

    // ASP.NET forms require __VIEWSTATE/__EVENTVALIDATION round-tripping
    let mut form = hidden_form_fields(&login_page.text()?);
    form.push(("username".to_string(), credentials.username.clone()));
    form.push(("password".to_string(), credentials.password.clone()));

    let response = client.post(&login_url).form(&form).send()?;
    let landed_on_login = response.url().path().to_lowercase().contains("login");
    if landed_on_login || !response.status().is_success() {
        return Err(AcquisitionError::AuthenticationFailed);
    }

    let search = client
        .get(format!("{COUNTY_BASE_URL}/PropertySearch.aspx"))
        .send()?;
    let body = search.text()?;

    if let Some(id) = find_window_id(&body) {
        return Ok(Some(id));
    }
    if let Some(id) = find_window_id_in_hrefs(&body) {
        return Ok(Some(id));
    }

    // Last resort: a direct property request often redirects to a URL
    // carrying a fresh windowId
    let probe = client
        .get(format!(
            "{COUNTY_BASE_URL}/Maintain/Transact.aspx?txtMaskedPin={PROBE_PARCEL}"
        ))
        .send()?;
    let id = probe
        .url()
        .query_pairs()
        .find(|(key, _)| key == "windowId")
        .map(|(_, value)| value.into_owned());

    Ok(id)
}

/// Mine `windowId=<digits>` or `windowId:<digits>` out of page markup.
/// Window ids are 15-20 digit timestamps.
fn find_window_id(body: &str) -> Option<String> {
    let re = Regex::new(r"windowId[=:](\d{15,20})").unwrap();
    re.captures(body).map(|c| c[1].to_string())
}

/// Scan anchor hrefs for a windowId query parameter.
fn find_window_id_in_hrefs(body: &str) -> Option<String> {
    let href = Regex::new(r#"href\s*=\s*["']([^"']*windowId=[^"']*)["']"#).unwrap();
    let id = Regex::new(r"windowId=(\d{15,20})").unwrap();
    for capture in href.captures_iter(body) {
        if let Some(found) = id.captures(&capture[1]) {
            return Some(found[1].to_string());
        }
    }
    None
}

/// Collect `<input type="hidden" name=... value=...>` pairs from a form page.
fn hidden_form_fields(body: &str) -> Vec<(String, String)> {
    let input = Regex::new(r#"<input[^>]*type\s*=\s*["']hidden["'][^>]*>"#).unwrap();
    let name = Regex::new(r#"name\s*=\s*["']([^"']+)["']"#).unwrap();
    let value = Regex::new(r#"value\s*=\s*["']([^"']*)["']"#).unwrap();

    let mut fields = Vec::new();
    for tag in input.find_iter(body) {
        let tag = tag.as_str();
        if let (Some(n), Some(v)) = (name.captures(tag), value.captures(tag)) {
            fields.push((n[1].to_string(), v[1].to_string()));
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_window_id_in_markup() {
        let body = r#"<script>var target = "Transact.aspx?pin=1&windowId=638981240146803746&x=1";</script>"#;
        assert_eq!(
            find_window_id(body).as_deref(),
            Some("638981240146803746")
        );
        // JSON-ish form too
        assert_eq!(
            find_window_id(r#"{"windowId:638981240146803746"}"#).as_deref(),
            Some("638981240146803746")
        );
        // Too short to be a windowId
        assert_eq!(find_window_id("windowId=12345"), None);
    }

    #[test]
    fn test_find_window_id_in_hrefs() {
        let body = r#"
            <a href="/iasworld/Search.aspx">search</a>
            <a href='/iasworld/Maintain/Transact.aspx?txtMaskedPin=1&windowId=638981240146803746'>parcel</a>
        "#;
        assert_eq!(
            find_window_id_in_hrefs(body).as_deref(),
            Some("638981240146803746")
        );
        assert_eq!(find_window_id_in_hrefs("<a href='/plain'>x</a>"), None);
    }

    #[test]
    fn test_hidden_form_fields() {
        let body = r#"
            <form>
              <input type="hidden" name="__VIEWSTATE" value="abc123" />
              <input type="hidden" name="__EVENTVALIDATION" value="def456" />
              <input type="text" name="username" value="should-not-appear" />
            </form>
        "#;
        let fields = hidden_form_fields(body);
        assert_eq!(
            fields,
            vec![
                ("__VIEWSTATE".to_string(), "abc123".to_string()),
                ("__EVENTVALIDATION".to_string(), "def456".to_string()),
            ]
        );
    }
}
