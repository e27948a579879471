//! Exercises the driver against a real Chromium when one is available.
//! Each test bails out quietly if the browser cannot launch, so the
//! suite still passes on machines without Chromium installed.

use serial_test::serial;
use std::time::Duration;
use weft_engine::PageDriver;
use weft_headless::HeadlessDriver;

const PAGE: &str = "<html><head><title>Fixture</title></head><body>\
<h1 id='title'>Fixture</h1>\
<button id='go'>Start run</button>\
<input id='name' type='text'/>\
<ul><li class='row'>one</li><li class='row'>two</li></ul>\
<button id='hidden-btn' style='display:none'>Ghost</button>\
<button id='off' disabled>Off</button>\
</body></html>";

async fn launched() -> Option<HeadlessDriver> {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::INFO)
        .try_init()
        .ok();

    let mut driver = HeadlessDriver::new();
    match driver.launch(true).await {
        Ok(()) => Some(driver),
        Err(e) => {
            eprintln!("Skipping: browser launch failed (is Chromium installed?): {}", e);
            None
        }
    }
}

#[tokio::test]
#[serial]
async fn drives_a_static_page() {
    let Some(mut driver) = launched().await else {
        return;
    };

    let url = format!("data:text/html,{}", PAGE);
    driver.goto(&url).await.expect("navigation failed");

    assert_eq!(driver.count(".row").await.expect("count failed"), 2);
    assert!(driver.is_visible("#go").await.expect("is_visible failed"));
    assert!(!driver.is_visible("#hidden-btn").await.expect("is_visible failed"));
    assert!(!driver.is_enabled("#off").await.expect("is_enabled failed"));
    assert!(driver.is_enabled("#go").await.expect("is_enabled failed"));

    driver.fill("#name", "weft").await.expect("fill failed");
    driver.type_text("#name", "!").await.expect("type failed");
    let value = driver
        .evaluate("document.querySelector('#name').value")
        .await
        .expect("evaluate failed");
    assert_eq!(value, serde_json::json!("weft!"));

    driver.clear("#name").await.expect("clear failed");
    let value = driver
        .evaluate("document.querySelector('#name').value")
        .await
        .expect("evaluate failed");
    assert_eq!(value, serde_json::json!(""));

    assert!(driver.click("#missing").await.is_err());

    let shot = driver.screenshot().await.expect("screenshot failed");
    assert!(!shot.is_empty());

    driver.close().await.expect("close failed");
}

#[tokio::test]
#[serial]
async fn text_selectors_resolve() {
    let Some(mut driver) = launched().await else {
        return;
    };

    let url = format!("data:text/html,{}", PAGE);
    driver.goto(&url).await.expect("navigation failed");

    assert_eq!(
        driver
            .count("button:has-text('Start run')")
            .await
            .expect("count failed"),
        1
    );
    assert_eq!(driver.count("text=Start run").await.expect("count failed"), 1);
    driver.click("text=Start run").await.expect("click failed");

    assert_eq!(
        driver.text_content("#title").await.expect("text failed"),
        "Fixture"
    );

    driver.close().await.expect("close failed");
}

#[tokio::test]
#[serial]
async fn wait_for_respects_the_deadline() {
    let Some(mut driver) = launched().await else {
        return;
    };

    let url = format!("data:text/html,{}", PAGE);
    driver.goto(&url).await.expect("navigation failed");

    driver
        .wait_for("#go", Duration::from_secs(2))
        .await
        .expect("wait_for failed");

    let missing = driver.wait_for("#never", Duration::from_millis(300)).await;
    assert!(missing.is_err());

    driver.close().await.expect("close failed");
}
