//! Company name derivation from a source URL or email domain.

use url::Url;

/// Name used when neither the URL nor the email yields a domain.
pub const UNKNOWN_COMPANY: &str = "Unknown";

/// Derive a display company name for a record.
///
/// Uses the second-to-last label of the source URL's host (after dropping a
/// leading `www.`), so `https://www.example-co.com/` becomes `Example Co`.
/// Falls back to the email's domain, then to [`UNKNOWN_COMPANY`].
#[must_use]
pub fn company_name_for(source_url: &str, email: &str) -> String {
    let from_url = Url::parse(source_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string));
    let from_email = email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_string());

    from_url
        .as_deref()
        .and_then(name_from_host)
        .or_else(|| from_email.as_deref().and_then(name_from_host))
        .unwrap_or_else(|| UNKNOWN_COMPANY.to_string())
}

fn name_from_host(host: &str) -> Option<String> {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let label = match labels.len() {
        0 => return None,
        1 => labels[0],
        n => labels[n - 2],
    };

    let name = title_case(&label.replace(['-', '_'], " "));
    (!name.is_empty()).then_some(name)
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
