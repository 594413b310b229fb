use std::sync::OnceLock;

use regex::Regex;

use kolscout_common::ContactInfo;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex")
    })
}

fn social_res() -> &'static [(&'static str, Regex)] {
    static RES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RES.get_or_init(|| {
        // Priority order: the first platform with a match wins the top slot.
        [
            ("twitter.com/", r"(?i)(?:twitter\.com/|x\.com/)([A-Za-z0-9_]{1,15})"),
            ("t.me/", r"(?i)t\.me/([A-Za-z0-9_]{5,32})"),
            ("discord.gg/", r"(?i)discord\.gg/([A-Za-z0-9]+)"),
            ("linkedin.com/in/", r"(?i)linkedin\.com/in/([A-Za-z0-9-]+)"),
        ]
        .into_iter()
        .map(|(prefix, pattern)| (prefix, Regex::new(pattern).expect("social regex")))
        .collect()
    })
}

fn website_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)https?://(?:www\.)?([A-Za-z0-9-]+\.[A-Za-z]{2,}(?:/\S*)?)")
            .expect("website regex")
    })
}

const INVALID_EMAIL_MARKERS: [&str; 4] = ["example.com", "test.com", "noreply", "no-reply"];
const SOCIAL_DOMAINS: [&str; 6] = [
    "twitter.com",
    "x.com",
    "t.me",
    "discord.gg",
    "linkedin.com",
    "youtube.com",
];

/// First plausible email in the text, skipping placeholder domains.
pub fn extract_email(text: &str) -> Option<String> {
    email_re()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .find(|email| {
            let lower = email.to_lowercase();
            !INVALID_EMAIL_MARKERS.iter().any(|marker| lower.contains(marker))
        })
}

/// Social handles as canonical URLs, in platform priority order.
pub fn extract_social(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for (prefix, re) in social_res() {
        if let Some(caps) = re.captures(text) {
            if let Some(handle) = caps.get(1) {
                found.push(format!("{prefix}{}", handle.as_str()));
            }
        }
    }
    found
}

/// First non-social website link in the text.
pub fn extract_website(text: &str) -> Option<String> {
    website_re()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .find(|site| {
            let lower = site.to_lowercase();
            !SOCIAL_DOMAINS.iter().any(|domain| lower.contains(domain))
        })
        .map(|site| format!("https://{site}"))
}

/// Mine free text (bio, about page, commit trailers) for a contact surface.
pub fn derive_contact(texts: &[&str]) -> ContactInfo {
    let joined = texts.join(" ");
    ContactInfo {
        email: extract_email(&joined),
        website: extract_website(&joined),
        social: extract_social(&joined),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_skips_placeholders() {
        assert_eq!(
            extract_email("reach me: noreply@corp.com or jane@studio.io"),
            Some("jane@studio.io".to_string())
        );
        assert_eq!(extract_email("user@example.com only"), None);
    }

    #[test]
    fn social_handles_become_canonical_urls() {
        let social = extract_social("follow https://twitter.com/janedoe and t.me/jane_channel");
        assert_eq!(social[0], "twitter.com/janedoe");
        assert!(social.contains(&"t.me/jane_channel".to_string()));
    }

    #[test]
    fn website_ignores_social_domains() {
        assert_eq!(
            extract_website("see https://twitter.com/jane and https://janedoe.dev/work"),
            Some("https://janedoe.dev/work".to_string())
        );
    }

    #[test]
    fn derive_prefers_email_but_keeps_everything() {
        let contact = derive_contact(&[
            "business: hello@studio.io",
            "https://studio.io and twitter.com/studio_ai",
        ]);
        assert_eq!(contact.primary(), Some("hello@studio.io"));
        assert!(!contact.social.is_empty());
        assert!(contact.website.is_some());
    }

    #[test]
    fn empty_text_yields_empty_contact() {
        let contact = derive_contact(&[""]);
        assert!(contact.is_empty());
        assert_eq!(contact.primary(), None);
    }
}
