mod support;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use httest::http::ClientFactory;
use httest::load::{self, LoadOptions};
use httest::sinks::LiveLog;
use httest::suite::{self, Session, Suite};
use httest::test::{Status, Test};

use support::{StubResponse, spawn_stub_or_skip};

fn test_from_json(value: serde_json::Value) -> Result<Test, String> {
    serde_json::from_value(value).map_err(|err| err.to_string())
}

fn suite_from_json(value: serde_json::Value) -> Result<Suite, String> {
    serde_json::from_value(value).map_err(|err| err.to_string())
}

fn plain_session() -> Result<Session, String> {
    Session::new(&ClientFactory::default(), false, BTreeMap::new())
        .map_err(|err| err.to_string())
}

#[tokio::test]
async fn passing_test_with_status_and_body_checks() -> Result<(), String> {
    let Some(server) = spawn_stub_or_skip(StubResponse {
        body: "Hello World".to_owned(),
        ..StubResponse::default()
    })?
    else {
        return Ok(());
    };
    let declared = test_from_json(serde_json::json!({
        "Name": "hello",
        "Request": {"URL": server.url},
        "Checks": [
            {"Check": "StatusCode", "Expect": 200},
            {"Check": "Body", "Contains": "Hello"}
        ]
    }))?;
    let session = plain_session()?;
    let result = suite::run_test(&session, &declared).await;
    assert_eq!(result.status, Status::Pass);
    assert_eq!(result.checks.len(), 2);
    assert!(result.checks.iter().all(|check| check.status == Status::Pass));
    assert_eq!(result.tries, 1);
    Ok(())
}

#[tokio::test]
async fn failing_status_short_circuits_remaining_checks() -> Result<(), String> {
    let Some(server) = spawn_stub_or_skip(StubResponse {
        status: 404,
        body: "not here".to_owned(),
        ..StubResponse::default()
    })?
    else {
        return Ok(());
    };
    let declared = test_from_json(serde_json::json!({
        "Name": "missing",
        "Request": {"URL": server.url},
        "Checks": [
            {"Check": "StatusCode", "Expect": 200},
            {"Check": "Body", "Contains": "Hello"}
        ]
    }))?;
    let session = plain_session()?;
    let result = suite::run_test(&session, &declared).await;
    assert_eq!(result.status, Status::Fail);
    assert_eq!(
        result.checks.first().map(|check| check.status),
        Some(Status::Fail)
    );
    assert_eq!(
        result.checks.get(1).map(|check| check.status),
        Some(Status::Skipped)
    );
    Ok(())
}

#[tokio::test]
async fn unreachable_host_is_an_error_with_skipped_checks() -> Result<(), String> {
    let declared = test_from_json(serde_json::json!({
        "Name": "refused",
        "Request": {"URL": "http://127.0.0.1:9/", "Timeout": "2s"},
        "Checks": [
            {"Check": "StatusCode", "Expect": 200},
            {"Check": "Body", "Contains": "x"}
        ]
    }))?;
    let session = plain_session()?;
    let result = suite::run_test(&session, &declared).await;
    assert_eq!(result.status, Status::Error);
    assert!(result.error.is_some());
    assert_eq!(result.checks.len(), 2);
    assert!(
        result
            .checks
            .iter()
            .all(|check| check.status == Status::Skipped)
    );
    Ok(())
}

#[tokio::test]
async fn poll_retries_until_exhaustion() -> Result<(), String> {
    let Some(server) = spawn_stub_or_skip(StubResponse {
        status: 500,
        ..StubResponse::default()
    })?
    else {
        return Ok(());
    };
    let declared = test_from_json(serde_json::json!({
        "Name": "flaky",
        "Request": {"URL": server.url},
        "Checks": [{"Check": "StatusCode", "Expect": 200}],
        "Poll": {"Max": 3, "Sleep": "20ms"}
    }))?;
    let session = plain_session()?;
    let result = suite::run_test(&session, &declared).await;
    assert_eq!(result.status, Status::Fail);
    assert_eq!(result.tries, 3);
    assert!(result.full_duration >= Duration::from_millis(40));
    assert_eq!(server.hits(), 3);
    Ok(())
}

#[tokio::test]
async fn disabled_test_makes_no_network_calls() -> Result<(), String> {
    let Some(server) = spawn_stub_or_skip(StubResponse::default())? else {
        return Ok(());
    };
    let declared = test_from_json(serde_json::json!({
        "Name": "off",
        "Request": {"URL": server.url},
        "Poll": {"Max": -1}
    }))?;
    let session = plain_session()?;
    let result = suite::run_test(&session, &declared).await;
    assert_eq!(result.status, Status::Skipped);
    assert_eq!(server.hits(), 0);
    Ok(())
}

#[tokio::test]
async fn failing_setup_aborts_main_and_teardown() -> Result<(), String> {
    let Some(server) = spawn_stub_or_skip(StubResponse {
        status: 500,
        ..StubResponse::default()
    })?
    else {
        return Ok(());
    };
    let declared = suite_from_json(serde_json::json!({
        "Name": "aborting",
        "Setup": [{
            "Name": "failing-setup",
            "Request": {"URL": server.url},
            "Checks": [{"Check": "StatusCode", "Expect": 200}]
        }],
        "Main": [{
            "Name": "never-runs",
            "Request": {"URL": server.url}
        }],
        "Teardown": [{
            "Name": "also-never-runs",
            "Request": {"URL": server.url}
        }]
    }))?;
    let session = declared
        .session(&ClientFactory::default(), &BTreeMap::new())
        .map_err(|err| err.to_string())?;
    let result = declared.execute(&session).await;
    assert_eq!(result.status, Status::Fail);
    assert_eq!(
        result.main.first().map(|test| test.status),
        Some(Status::NotRun)
    );
    assert_eq!(
        result.teardown.first().map(|test| test.status),
        Some(Status::NotRun)
    );
    // only the setup request went out
    assert_eq!(server.hits(), 1);
    Ok(())
}

#[tokio::test]
async fn teardown_never_escalates_suite_status() -> Result<(), String> {
    let Some(good) = spawn_stub_or_skip(StubResponse::default())? else {
        return Ok(());
    };
    let Some(bad) = spawn_stub_or_skip(StubResponse {
        status: 500,
        ..StubResponse::default()
    })?
    else {
        return Ok(());
    };
    let declared = suite_from_json(serde_json::json!({
        "Name": "teardown-fails",
        "Main": [{
            "Name": "ok",
            "Request": {"URL": good.url},
            "Checks": [{"Check": "StatusCode", "Expect": 200}]
        }],
        "Teardown": [{
            "Name": "cleanup",
            "Request": {"URL": bad.url},
            "Checks": [{"Check": "StatusCode", "Expect": 200}]
        }]
    }))?;
    let session = declared
        .session(&ClientFactory::default(), &BTreeMap::new())
        .map_err(|err| err.to_string())?;
    let result = declared.execute(&session).await;
    assert_eq!(result.status, Status::Pass);
    assert_eq!(
        result.teardown.first().map(|test| test.status),
        Some(Status::Fail)
    );
    Ok(())
}

#[tokio::test]
async fn extraction_chains_variables_between_tests() -> Result<(), String> {
    let Some(issuer) = spawn_stub_or_skip(StubResponse {
        body: "token=sesame42 granted".to_owned(),
        ..StubResponse::default()
    })?
    else {
        return Ok(());
    };
    let Some(echo) = spawn_stub_or_skip(StubResponse {
        echo_request: true,
        ..StubResponse::default()
    })?
    else {
        return Ok(());
    };
    let declared = suite_from_json(serde_json::json!({
        "Name": "chaining",
        "Main": [
            {
                "Name": "issue-token",
                "Request": {"URL": issuer.url},
                "Checks": [{"Check": "StatusCode", "Expect": 200}],
                "DataExtraction": {
                    "TOKEN": {"Extractor": "Body", "Regexp": "token=(\\w+)"}
                }
            },
            {
                "Name": "use-token",
                "Request": {
                    "URL": echo.url,
                    "Header": {"Authorization": ["Bearer {{TOKEN}}"]}
                },
                "Checks": [
                    {"Check": "StatusCode", "Expect": 200},
                    {"Check": "Body", "Contains": "Bearer sesame42"}
                ]
            }
        ]
    }))?;
    let session = declared
        .session(&ClientFactory::default(), &BTreeMap::new())
        .map_err(|err| err.to_string())?;
    let result = declared.execute(&session).await;
    assert_eq!(result.status, Status::Pass);
    Ok(())
}

#[tokio::test]
async fn keep_cookies_shares_the_jar_across_tests() -> Result<(), String> {
    let Some(server) = spawn_stub_or_skip(StubResponse {
        set_cookie: Some("session=abc123; Path=/".to_owned()),
        echo_request: true,
        ..StubResponse::default()
    })?
    else {
        return Ok(());
    };
    let declared = suite_from_json(serde_json::json!({
        "Name": "cookies",
        "KeepCookies": true,
        "Main": [
            {
                "Name": "first",
                "Request": {"URL": server.url},
                "Checks": [{"Check": "SetCookie", "Name": "session", "Value": "abc123"}]
            },
            {
                "Name": "second",
                "Request": {"URL": server.url},
                "Checks": [{"Check": "Body", "Contains": "session=abc123"}]
            }
        ]
    }))?;
    let session = declared
        .session(&ClientFactory::default(), &BTreeMap::new())
        .map_err(|err| err.to_string())?;
    let result = declared.execute(&session).await;
    assert_eq!(result.status, Status::Pass);
    Ok(())
}

#[tokio::test]
async fn concurrent_main_preserves_declaration_order() -> Result<(), String> {
    let Some(server) = spawn_stub_or_skip(StubResponse {
        delay: Duration::from_millis(10),
        ..StubResponse::default()
    })?
    else {
        return Ok(());
    };
    let names: Vec<String> = (0..8).map(|index| format!("worker-{index}")).collect();
    let main: Vec<serde_json::Value> = names
        .iter()
        .map(|name| {
            serde_json::json!({
                "Name": name,
                "Request": {"URL": server.url},
                "Checks": [{"Check": "StatusCode", "Expect": 200}]
            })
        })
        .collect();
    let declared = suite_from_json(serde_json::json!({"Name": "parallel", "Main": main}))?;
    let session = Arc::new(
        declared
            .session(&ClientFactory::default(), &BTreeMap::new())
            .map_err(|err| err.to_string())?,
    );
    let result = declared.execute_concurrent(&session, 4).await;
    assert_eq!(result.status, Status::Pass);
    let reported: Vec<&str> = result
        .main
        .iter()
        .map(|test| test.name.as_str())
        .collect();
    let expected: Vec<&str> = names.iter().map(String::as_str).collect();
    assert_eq!(reported, expected);
    Ok(())
}

#[tokio::test]
async fn throughput_load_records_every_dispatch() -> Result<(), String> {
    let Some(server) = spawn_stub_or_skip(StubResponse {
        delay: Duration::from_millis(5),
        ..StubResponse::default()
    })?
    else {
        return Ok(());
    };
    let declared = suite_from_json(serde_json::json!({
        "Name": "steady",
        "Main": [{
            "Name": "ping",
            "Request": {"URL": server.url},
            "Checks": [{"Check": "StatusCode", "Expect": 200}]
        }]
    }))?;
    let session = Arc::new(
        declared
            .session(&ClientFactory::default(), &BTreeMap::new())
            .map_err(|err| err.to_string())?,
    );
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let log_path = dir.path().join("live.csv");
    let mut live_log = LiveLog::create(&log_path).map_err(|err| err.to_string())?;

    let options = LoadOptions {
        rate: 200.0,
        duration: Duration::from_secs(30),
        uniform: true,
        count: 20,
        ..LoadOptions::default()
    };
    let report = load::run_load(
        &[declared],
        &[session],
        &options,
        Some(&mut live_log),
        None,
    )
    .await
    .map_err(|err| err.to_string())?;

    assert_eq!(report.dispatched, 20);
    let counts = report.aggregate.counts();
    assert_eq!(counts.pass, 20);
    assert_eq!(counts.failed(), 0);
    assert!(report.aborted.is_none());
    let summary = report.aggregate.summary(report.elapsed);
    // the stub sleeps 5ms per request; p50 must sit near that floor
    assert!(summary.latency.p50_ms >= 4);
    assert!(summary.latency.p50_ms < 1_000);

    let written = std::fs::read_to_string(&log_path).map_err(|err| err.to_string())?;
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 21);
    assert_eq!(
        lines.first().copied(),
        Some("id,started_ms,duration_ms,full_ms,status,conc_tot,conc_own,error")
    );
    Ok(())
}

#[tokio::test]
async fn error_rate_breaker_aborts_the_load() -> Result<(), String> {
    let Some(server) = spawn_stub_or_skip(StubResponse {
        status: 500,
        ..StubResponse::default()
    })?
    else {
        return Ok(());
    };
    let declared = suite_from_json(serde_json::json!({
        "Name": "broken",
        "Main": [{
            "Name": "always-fails",
            "Request": {"URL": server.url},
            "Checks": [{"Check": "StatusCode", "Expect": 200}]
        }]
    }))?;
    let session = Arc::new(
        declared
            .session(&ClientFactory::default(), &BTreeMap::new())
            .map_err(|err| err.to_string())?,
    );
    let options = LoadOptions {
        rate: 500.0,
        duration: Duration::from_secs(30),
        uniform: true,
        count: 200,
        max_error_rate: 0.1,
        ..LoadOptions::default()
    };
    let report = load::run_load(&[declared], &[session], &options, None, None)
        .await
        .map_err(|err| err.to_string())?;
    assert!(report.aborted.is_some());
    assert!(report.dispatched < 200);
    assert_eq!(report.status(), Status::Error);
    Ok(())
}

#[tokio::test]
async fn concurrency_mode_completes_the_requested_count() -> Result<(), String> {
    let Some(server) = spawn_stub_or_skip(StubResponse {
        delay: Duration::from_millis(5),
        ..StubResponse::default()
    })?
    else {
        return Ok(());
    };
    let declared = suite_from_json(serde_json::json!({
        "Name": "fixed-level",
        "Main": [{
            "Name": "ping",
            "Request": {"URL": server.url},
            "Checks": [{"Check": "StatusCode", "Expect": 200}]
        }]
    }))?;
    let session = Arc::new(
        declared
            .session(&ClientFactory::default(), &BTreeMap::new())
            .map_err(|err| err.to_string())?,
    );
    let options = LoadOptions {
        duration: Duration::from_secs(30),
        count: 12,
        concurrency: Some(4),
        ..LoadOptions::default()
    };
    let report = load::run_load(&[declared], &[session], &options, None, None)
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(report.dispatched, 12);
    assert_eq!(report.aggregate.counts().pass, 12);
    Ok(())
}
