//! Coarse URL classification. Learned solutions are scoped by the kind of
//! page they were discovered on, so a selector learned on a login form is
//! not offered on a checkout page.

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Authentication,
    Dashboard,
    Search,
    Settings,
    Checkout,
    Listing,
    #[default]
    Other,
}

impl PageType {
    /// Classification is keyword-based over the URL path and query, checked
    /// in a fixed order so overlapping keywords resolve deterministically.
    pub fn classify(url: &str) -> PageType {
        let (path, query) = match Url::parse(url) {
            Ok(parsed) => (
                parsed.path().to_lowercase(),
                parsed.query().unwrap_or("").to_lowercase(),
            ),
            // Relative paths and bare fragments still classify.
            Err(_) => match url.split_once('?') {
                Some((p, q)) => (p.to_lowercase(), q.to_lowercase()),
                None => (url.to_lowercase(), String::new()),
            },
        };

        const AUTH: [&str; 6] = ["login", "signin", "sign-in", "signup", "register", "auth"];
        const CHECKOUT: [&str; 4] = ["checkout", "cart", "payment", "billing"];
        const SETTINGS: [&str; 4] = ["settings", "preferences", "account", "profile"];
        const SEARCH: [&str; 2] = ["search", "results"];
        const DASHBOARD: [&str; 3] = ["dashboard", "overview", "home"];
        const LISTING: [&str; 4] = ["products", "catalog", "browse", "list"];

        if contains_any(&path, &AUTH) {
            PageType::Authentication
        } else if contains_any(&path, &CHECKOUT) {
            PageType::Checkout
        } else if contains_any(&path, &SETTINGS) {
            PageType::Settings
        } else if contains_any(&path, &SEARCH) || query.starts_with("q=") || query.contains("&q=") {
            PageType::Search
        } else if contains_any(&path, &DASHBOARD) {
            PageType::Dashboard
        } else if contains_any(&path, &LISTING) {
            PageType::Listing
        } else {
            PageType::Other
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
