use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use weft_common::knowledge::{PageContext, Solution, solution_id};
use weft_common::{FlowDefinition, PageType, ParamMap, Step, StepAction, VerifyChecks};
use weft_engine::config::WeftConfig;
use weft_engine::driver::{DriverError, PageDriver};
use weft_engine::interpreter::{FlowError, FlowInterpreter, FlowStatus, StepStatus};
use weft_engine::knowledge::KnowledgeBase;
use weft_engine::library::FlowLibrary;
use weft_engine::resolver::ResolutionTier;

/// A scripted page. Selectors in `working` succeed; `text` feeds
/// text_content. Navigations update the current URL so page-type
/// scoping follows them.
#[derive(Debug, Default)]
struct PageMock {
    pub working: HashSet<String>,
    pub text: HashMap<String, String>,
    pub url: String,
    pub visits: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub attempts: Vec<String>,
}

impl PageMock {
    fn with_working(selectors: &[&str]) -> Self {
        PageMock {
            working: selectors.iter().map(|s| s.to_string()).collect(),
            ..PageMock::default()
        }
    }

    fn try_selector(&mut self, selector: &str) -> Result<(), DriverError> {
        self.attempts.push(selector.to_string());
        if self.working.contains(selector) {
            Ok(())
        } else {
            Err(DriverError::Action {
                selector: selector.to_string(),
                message: "no such element".to_string(),
            })
        }
    }
}

#[async_trait]
impl PageDriver for PageMock {
    async fn launch(&mut self, _headless: bool) -> Result<(), DriverError> {
        Ok(())
    }
    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
    fn is_ready(&self) -> bool {
        true
    }
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        self.visits.push(url.to_string());
        self.url = url.to_string();
        Ok(())
    }
    async fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.url.clone())
    }
    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        self.try_selector(selector)
    }
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.try_selector(selector)?;
        self.typed.push((selector.to_string(), value.to_string()));
        Ok(())
    }
    async fn type_text(&mut self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.try_selector(selector)?;
        self.typed.push((selector.to_string(), value.to_string()));
        Ok(())
    }
    async fn clear(&mut self, selector: &str) -> Result<(), DriverError> {
        self.try_selector(selector)
    }
    async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<(), DriverError> {
        self.try_selector(selector)
    }
    async fn count(&mut self, selector: &str) -> Result<u32, DriverError> {
        Ok(if self.working.contains(selector) { 1 } else { 0 })
    }
    async fn is_visible(&mut self, selector: &str) -> Result<bool, DriverError> {
        Ok(self.working.contains(selector))
    }
    async fn is_enabled(&mut self, selector: &str) -> Result<bool, DriverError> {
        Ok(self.working.contains(selector))
    }
    async fn text_content(&mut self, selector: &str) -> Result<String, DriverError> {
        self.text
            .get(selector)
            .cloned()
            .ok_or_else(|| DriverError::Query {
                selector: selector.to_string(),
                message: "no such element".to_string(),
            })
    }
    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        Ok(vec![1, 2, 3])
    }
}

fn config(base_url: &str) -> WeftConfig {
    WeftConfig {
        base_url: base_url.to_string(),
        ..WeftConfig::default()
    }
}

fn navigate(target: &str) -> Step {
    Step::Navigate {
        target: target.to_string(),
        description: None,
    }
}

fn click(selector: &str) -> Step {
    Step::Click {
        target: selector.to_string(),
        optional: false,
        description: None,
    }
}

fn flow(name: &str, steps: Vec<Step>) -> FlowDefinition {
    FlowDefinition {
        name: name.to_string(),
        steps,
        ..FlowDefinition::default()
    }
}

#[tokio::test]
async fn test_missing_required_param_fails_before_any_step() {
    let mut driver = PageMock::default();
    let mut kb = KnowledgeBase::empty();
    let mut interpreter = FlowInterpreter::new(config("http://app.test"), None);

    let mut login = flow("auth.login", vec![navigate("/login")]);
    login.required_params = vec!["email".to_string()];

    let result = interpreter
        .run(&mut driver, &login, &ParamMap::new(), &mut kb)
        .await;

    assert!(matches!(result, Err(FlowError::MissingParameter(ref p)) if p == "email"));
    assert!(driver.visits.is_empty(), "no step may run before the check");
}

#[tokio::test]
async fn test_config_values_satisfy_required_params() {
    let mut driver = PageMock::with_working(&["#email"]);
    let mut kb = KnowledgeBase::empty();
    let mut cfg = config("http://app.test");
    cfg.test_data
        .insert("email".to_string(), "qa@example.com".to_string());
    let mut interpreter = FlowInterpreter::new(cfg, None);

    let mut login = flow(
        "auth.login",
        vec![
            navigate("/login"),
            Step::Type {
                target: "#email".to_string(),
                value: "{email}".to_string(),
                optional: false,
                description: None,
            },
        ],
    );
    login.required_params = vec!["email".to_string()];

    let report = interpreter
        .run(&mut driver, &login, &ParamMap::new(), &mut kb)
        .await
        .expect("config provides the parameter");

    assert_eq!(report.status, FlowStatus::Passed);
    assert_eq!(
        driver.typed,
        vec![("#email".to_string(), "qa@example.com".to_string())]
    );
}

#[tokio::test]
async fn test_caller_params_override_config() {
    let mut driver = PageMock::with_working(&["#email"]);
    let mut kb = KnowledgeBase::empty();
    let mut cfg = config("http://app.test");
    cfg.test_data
        .insert("email".to_string(), "from-test-data@example.com".to_string());
    cfg.credentials
        .insert("email".to_string(), "from-credentials@example.com".to_string());
    let mut interpreter = FlowInterpreter::new(cfg, None);

    let login = flow(
        "auth.login",
        vec![Step::Type {
            target: "#email".to_string(),
            value: "${email}".to_string(),
            optional: false,
            description: None,
        }],
    );

    let params = ParamMap::from([("email".to_string(), "from-caller@example.com".to_string())]);
    let report = interpreter
        .run(&mut driver, &login, &params, &mut kb)
        .await
        .expect("run starts");

    assert_eq!(report.status, FlowStatus::Passed);
    assert_eq!(driver.typed[0].1, "from-caller@example.com");
}

#[tokio::test]
async fn test_base_url_is_available_as_param() {
    let mut driver = PageMock::default();
    let mut kb = KnowledgeBase::empty();
    let mut interpreter = FlowInterpreter::new(config("http://app.test"), None);

    let home = flow("smoke.home", vec![navigate("{base_url}/status")]);
    let report = interpreter
        .run(&mut driver, &home, &ParamMap::new(), &mut kb)
        .await
        .expect("run starts");

    assert_eq!(report.status, FlowStatus::Passed);
    assert_eq!(driver.visits, vec!["http://app.test/status"]);
}

#[tokio::test]
async fn test_optional_step_failure_continues() {
    let mut driver = PageMock::with_working(&["#go"]);
    let mut kb = KnowledgeBase::empty();
    let mut interpreter = FlowInterpreter::new(config("http://app.test"), None);

    let steps = vec![
        navigate("/"),
        Step::Click {
            target: "#promo-dismiss".to_string(),
            optional: true,
            description: None,
        },
        click("#go"),
    ];
    let report = interpreter
        .run(&mut driver, &flow("smoke.home", steps), &ParamMap::new(), &mut kb)
        .await
        .expect("run starts");

    assert_eq!(report.status, FlowStatus::Passed);
    assert_eq!(report.steps.len(), 3);
    assert_eq!(report.steps[1].status, StepStatus::Skipped);
    assert!(report.steps[1].error.is_some());
    assert_eq!(report.steps[2].status, StepStatus::Passed);
    assert!(report.failed_step.is_none());
}

#[tokio::test]
async fn test_required_step_failure_halts_flow() {
    let mut driver = PageMock::default();
    let mut kb = KnowledgeBase::empty();
    let mut interpreter = FlowInterpreter::new(config("http://app.test"), None);

    let steps = vec![navigate("/"), click("#gone"), click("#after")];
    let report = interpreter
        .run(&mut driver, &flow("smoke.home", steps), &ParamMap::new(), &mut kb)
        .await
        .expect("step failures stay inside the report");

    assert_eq!(report.status, FlowStatus::Failed);
    assert_eq!(report.steps.len(), 2, "later steps never ran");
    assert_eq!(report.failed_step, Some(1));
    assert!(!driver.attempts.contains(&"#after".to_string()));
    let error = report.error.expect("failure carries the cause");
    assert!(error.to_lowercase().contains("all strategies failed"));
}

#[tokio::test]
async fn test_click_on_missing_selector_without_knowledge_fails() {
    let mut driver = PageMock::default();
    let mut kb = KnowledgeBase::empty();
    let mut interpreter = FlowInterpreter::new(config("http://app.test"), None);

    let steps = vec![navigate("/login"), click("#missing")];
    let report = interpreter
        .run(&mut driver, &flow("auth.login", steps), &ParamMap::new(), &mut kb)
        .await
        .expect("run starts");

    assert_eq!(report.status, FlowStatus::Failed);
    assert_eq!(report.failed_step, Some(1));
    assert!(kb.is_empty(), "nothing was learned");
    assert!(
        report
            .error
            .unwrap()
            .to_lowercase()
            .contains("all strategies failed")
    );
}

#[tokio::test]
async fn test_learned_entry_heals_whole_flow() {
    let mut driver = PageMock::with_working(&["button:has-text('Login')"]);
    let mut kb = KnowledgeBase::empty();
    let mut solution = Solution::learned(
        StepAction::Click,
        "#missing",
        "button:has-text('Login')",
        PageContext {
            url: "http://app.test/login".to_string(),
            page_type: PageType::Authentication,
        },
    );
    solution.confidence = 0.78;
    kb.insert(solution);

    let mut interpreter = FlowInterpreter::new(config("http://app.test"), None);
    let steps = vec![navigate("/login"), click("#missing")];
    let report = interpreter
        .run(&mut driver, &flow("auth.login", steps), &ParamMap::new(), &mut kb)
        .await
        .expect("run starts");

    assert_eq!(report.status, FlowStatus::Passed);
    assert_eq!(report.steps[1].tier, Some(ResolutionTier::Learned));

    let id = solution_id(StepAction::Click, "#missing");
    let solution = kb.get(&id).expect("entry survives");
    assert_eq!(solution.confidence, 0.80);
    assert_eq!(solution.success_count, 2);
}

#[tokio::test]
async fn test_navigation_rescopes_page_type_for_lookup() {
    // The entry was learned on a dashboard page. The flow starts from a
    // neutral base URL, so the entry only applies if navigation updated
    // the page type.
    let mut driver = PageMock::with_working(&[".dash-menu"]);
    let mut kb = KnowledgeBase::empty();
    let mut solution = Solution::learned(
        StepAction::Click,
        "#menu",
        ".dash-menu",
        PageContext {
            url: "http://app.test/dashboard".to_string(),
            page_type: PageType::Dashboard,
        },
    );
    solution.confidence = 0.78;
    kb.insert(solution);

    let mut interpreter = FlowInterpreter::new(config("http://app.test"), None);
    let steps = vec![navigate("/dashboard"), click("#menu")];
    let report = interpreter
        .run(&mut driver, &flow("nav.menu", steps), &ParamMap::new(), &mut kb)
        .await
        .expect("run starts");

    assert_eq!(report.status, FlowStatus::Passed);
    assert_eq!(report.steps[1].tier, Some(ResolutionTier::Learned));
}

#[tokio::test]
async fn test_wait_without_selector_sleeps() {
    let mut driver = PageMock::default();
    let mut kb = KnowledgeBase::empty();
    let mut interpreter = FlowInterpreter::new(config("http://app.test"), None);

    let steps = vec![
        navigate("/"),
        Step::Wait {
            target: None,
            ms: Some(10),
            timeout_ms: None,
            optional: false,
            description: None,
        },
    ];
    let report = interpreter
        .run(&mut driver, &flow("smoke.pause", steps), &ParamMap::new(), &mut kb)
        .await
        .expect("run starts");

    assert_eq!(report.status, FlowStatus::Passed);
    assert_eq!(report.steps[1].action, StepAction::Wait);
    assert_eq!(report.steps[1].tier, None, "plain sleeps bypass the resolver");
    assert!(driver.attempts.is_empty());
}

#[tokio::test]
async fn test_verify_contains_checks_element_text() {
    let mut passing = PageMock::with_working(&[".banner"]);
    passing
        .text
        .insert(".banner".to_string(), "Welcome back".to_string());
    let mut kb = KnowledgeBase::empty();
    let mut interpreter = FlowInterpreter::new(config("http://app.test"), None);

    let verify = Step::Verify {
        target: ".banner".to_string(),
        checks: VerifyChecks {
            contains: Some("Welcome".to_string()),
            ..VerifyChecks::default()
        },
        optional: false,
        description: None,
    };
    let steps = vec![navigate("/"), verify.clone()];
    let report = interpreter
        .run(&mut passing, &flow("smoke.banner", steps), &ParamMap::new(), &mut kb)
        .await
        .expect("run starts");
    assert_eq!(report.status, FlowStatus::Passed);
    assert_eq!(report.steps[1].tier, Some(ResolutionTier::Direct));

    let mut failing = PageMock::with_working(&[".banner"]);
    failing
        .text
        .insert(".banner".to_string(), "Goodbye".to_string());
    let steps = vec![navigate("/"), verify];
    let report = interpreter
        .run(&mut failing, &flow("smoke.banner", steps), &ParamMap::new(), &mut kb)
        .await
        .expect("run starts");
    assert_eq!(report.status, FlowStatus::Failed);
    assert_eq!(report.failed_step, Some(1));
}

#[tokio::test]
async fn test_run_path_reports_unknown_flow() {
    let mut driver = PageMock::default();
    let mut kb = KnowledgeBase::empty();
    let mut interpreter = FlowInterpreter::new(config("http://app.test"), None);
    let library = FlowLibrary::new();

    let result = interpreter
        .run_path(&mut driver, &library, "auth.login", &ParamMap::new(), &mut kb)
        .await;

    assert!(matches!(result, Err(FlowError::NotFound(ref p)) if p == "auth.login"));
}
