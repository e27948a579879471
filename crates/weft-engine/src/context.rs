use url::Url;
use weft_common::{PageType, ParamMap};

/// Mutable state threaded through a single flow run.
///
/// The page type is reclassified on every observed navigation so the
/// learned-tier lookup always scopes to the page the step actually runs
/// on, not the page the flow started from.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Dot path of the running flow, e.g. `auth.login`.
    pub flow_path: String,
    pub base_url: String,
    pub current_url: String,
    pub page_type: PageType,
    pub params: ParamMap,
}

impl ExecutionContext {
    pub fn new(
        flow_path: impl Into<String>,
        base_url: impl Into<String>,
        params: ParamMap,
    ) -> Self {
        let base_url = base_url.into();
        ExecutionContext {
            flow_path: flow_path.into(),
            page_type: PageType::classify(&base_url),
            current_url: base_url.clone(),
            base_url,
            params,
        }
    }

    /// Resolve a navigation target against the base URL. Absolute URLs
    /// pass through untouched.
    pub fn absolute_url(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            return target.to_string();
        }
        match Url::parse(&self.base_url).and_then(|base| base.join(target)) {
            Ok(joined) => joined.to_string(),
            Err(_) => format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                target.trim_start_matches('/')
            ),
        }
    }

    /// Record where the browser actually landed.
    pub fn observe_url(&mut self, url: &str) {
        self.current_url = url.to_string();
        self.page_type = PageType::classify(url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(base: &str) -> ExecutionContext {
        ExecutionContext::new("auth.login", base, ParamMap::new())
    }

    #[test]
    fn absolute_url_joins_relative_targets() {
        let ctx = context("https://app.test");
        assert_eq!(ctx.absolute_url("/login"), "https://app.test/login");
        assert_eq!(ctx.absolute_url("login"), "https://app.test/login");
    }

    #[test]
    fn absolute_url_passes_full_urls_through() {
        let ctx = context("https://app.test");
        assert_eq!(
            ctx.absolute_url("https://other.test/page"),
            "https://other.test/page"
        );
    }

    #[test]
    fn observe_url_reclassifies_page_type() {
        let mut ctx = context("https://app.test/login");
        assert_eq!(ctx.page_type, PageType::Authentication);

        ctx.observe_url("https://app.test/dashboard");
        assert_eq!(ctx.current_url, "https://app.test/dashboard");
        assert_eq!(ctx.page_type, PageType::Dashboard);
    }
}
