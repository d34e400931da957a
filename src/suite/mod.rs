//! Suite orchestration: Setup/Main/Teardown control flow, the shared
//! cookie jar and variable scope, and bounded-concurrency Main
//! execution.


use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::Client;
use reqwest::cookie::Jar;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::warn;

use crate::check::CheckRegistry;
use crate::error::AppResult;
use crate::extract::ExtractorRegistry;
use crate::http::ClientFactory;
use crate::test::{self, Status, Test, TestResult};
use crate::vars;

/// An ordered Setup/Main/Teardown grouping of tests sharing cookies and
/// variables. If any Setup test does not pass, Main and Teardown are
/// skipped entirely. Teardown outcomes are reported but never escalate
/// the suite status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Suite {
    pub name: String,
    pub description: String,
    /// Share one cookie jar across all tests of this suite.
    pub keep_cookies: bool,
    /// Strip checks from Main and Teardown tests before running.
    pub omit_checks: bool,
    pub setup: Vec<Test>,
    pub main: Vec<Test>,
    pub teardown: Vec<Test>,
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteResult {
    pub name: String,
    /// max(Setup status, Main status); Teardown excluded.
    pub status: Status,
    pub duration: Duration,
    pub setup: Vec<TestResult>,
    pub main: Vec<TestResult>,
    pub teardown: Vec<TestResult>,
}

/// Shared execution context for one suite run: HTTP clients with the
/// cookie jar attached iff KeepCookies, the plugin registries, and the
/// live variable scope.
pub struct Session {
    client: Client,
    redirect_client: Client,
    pub checks: CheckRegistry,
    pub extractors: ExtractorRegistry,
    variables: RwLock<BTreeMap<String, String>>,
}

impl Session {
    /// # Errors
    ///
    /// Client construction.
    pub fn new(
        factory: &ClientFactory,
        keep_cookies: bool,
        variables: BTreeMap<String, String>,
    ) -> AppResult<Self> {
        let jar = keep_cookies.then(|| Arc::new(Jar::default()));
        let client = factory.build(false, jar.clone())?;
        let redirect_client = factory.build(true, jar)?;
        Ok(Self {
            client,
            redirect_client,
            checks: CheckRegistry::with_builtins(),
            extractors: ExtractorRegistry::with_builtins(),
            variables: RwLock::new(variables),
        })
    }

    /// Snapshot of the current variable scope.
    #[must_use]
    pub fn variables(&self) -> BTreeMap<String, String> {
        self.variables
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Extraction write-back. Under concurrent Main execution the last
    /// write wins; ordering between sibling tests is undefined.
    pub fn bind_variables(&self, values: &BTreeMap<String, String>) {
        if values.is_empty() {
            return;
        }
        if let Ok(mut guard) = self.variables.write() {
            for (name, value) in values {
                guard.insert(name.clone(), value.clone());
            }
        }
    }

    const fn client_for(&self, follow_redirects: bool) -> &Client {
        if follow_redirects {
            &self.redirect_client
        } else {
            &self.client
        }
    }
}

/// Execute one declarative test inside `session`: applies the skip rule
/// (`Poll.Max < 0`), prepares (Bogus on any preparation failure), runs
/// the poll loop, and binds extracted variables back into the session
/// scope on a pass.
pub async fn run_test(session: &Session, test: &Test) -> TestResult {
    if test.disabled() {
        return TestResult::skipped(&test.name);
    }
    let scope = session.variables();
    let prepared = match test::prepare(test, &scope, &session.checks, &session.extractors) {
        Ok(prepared) => prepared,
        Err(err) => return TestResult::bogus(&test.name, err.to_string()),
    };
    let client = session.client_for(prepared.follow_redirects());
    let result = prepared.run(client).await;
    if result.status == Status::Pass {
        session.bind_variables(&result.extractions);
    }
    result
}

fn stripped(test: &Test) -> Test {
    let mut bare = test.clone();
    bare.checks.clear();
    bare
}

impl Suite {
    /// Build the session for one run of this suite. `overrides` are the
    /// higher-priority variable sources (command line, variable files);
    /// suite variables fill the gaps and test defaults come last at
    /// preparation time.
    ///
    /// # Errors
    ///
    /// Client construction.
    pub fn session(
        &self,
        factory: &ClientFactory,
        overrides: &BTreeMap<String, String>,
    ) -> AppResult<Session> {
        let variables = vars::merge(&[overrides, &self.variables]);
        Session::new(factory, self.keep_cookies, variables)
    }

    /// Sequential execution: Setup in order, stopping at the first
    /// non-passing test (Main and Teardown then stay NotRun), Main in
    /// order, and Teardown afterwards whatever Main produced.
    pub async fn execute(&self, session: &Session) -> SuiteResult {
        let started = Instant::now();
        let (setup, setup_status, aborted) = self.run_setup(session).await;
        if aborted {
            return self.aborted_result(setup, setup_status, started.elapsed());
        }
        let (main, main_status) = self.run_list(session, &self.main).await;
        let (teardown, _teardown_status) = self.run_list(session, &self.teardown).await;
        SuiteResult {
            name: self.name.clone(),
            status: setup_status.max(main_status),
            duration: started.elapsed(),
            setup,
            main,
            teardown,
        }
    }

    /// Like [`execute`](Self::execute) but Main tests run under a
    /// bounded worker pool. Results keep declaration order regardless of
    /// completion order, and a failing test never cancels its siblings.
    /// Extraction writes from concurrent tests race: last write wins.
    pub async fn execute_concurrent(
        &self,
        session: &Arc<Session>,
        max_concurrent: usize,
    ) -> SuiteResult {
        let started = Instant::now();
        let (setup, setup_status, aborted) = self.run_setup(session).await;
        if aborted {
            return self.aborted_result(setup, setup_status, started.elapsed());
        }

        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut handles = Vec::with_capacity(self.main.len());
        for declared in &self.main {
            let candidate = if self.omit_checks {
                stripped(declared)
            } else {
                declared.clone()
            };
            let session = Arc::clone(session);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                run_test(&session, &candidate).await
            }));
        }

        let mut main = Vec::with_capacity(handles.len());
        let mut main_status = Status::NotRun;
        for (index, handle) in handles.into_iter().enumerate() {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => {
                    warn!("Main test task failed: {}", err);
                    let name = self
                        .main
                        .get(index)
                        .map(|declared| declared.name.clone())
                        .unwrap_or_default();
                    TestResult::errored(&name, err.to_string())
                }
            };
            main_status = main_status.max(result.status);
            main.push(result);
        }

        let (teardown, _teardown_status) = self.run_list(session, &self.teardown).await;
        SuiteResult {
            name: self.name.clone(),
            status: setup_status.max(main_status),
            duration: started.elapsed(),
            setup,
            main,
            teardown,
        }
    }

    async fn run_setup(&self, session: &Session) -> (Vec<TestResult>, Status, bool) {
        let mut results = Vec::with_capacity(self.setup.len());
        let mut status = Status::NotRun;
        for declared in &self.setup {
            let result = run_test(session, declared).await;
            let outcome = result.status;
            status = status.max(outcome);
            results.push(result);
            if outcome > Status::Pass {
                for rest in self.setup.iter().skip(results.len()) {
                    results.push(TestResult::not_run(&rest.name));
                }
                return (results, status, true);
            }
        }
        (results, status, false)
    }

    async fn run_list(&self, session: &Session, tests: &[Test]) -> (Vec<TestResult>, Status) {
        let mut results = Vec::with_capacity(tests.len());
        let mut status = Status::NotRun;
        for declared in tests {
            let result = if self.omit_checks {
                run_test(session, &stripped(declared)).await
            } else {
                run_test(session, declared).await
            };
            status = status.max(result.status);
            results.push(result);
        }
        (results, status)
    }

    fn aborted_result(
        &self,
        setup: Vec<TestResult>,
        setup_status: Status,
        duration: Duration,
    ) -> SuiteResult {
        SuiteResult {
            name: self.name.clone(),
            status: setup_status,
            duration,
            setup,
            main: self
                .main
                .iter()
                .map(|declared| TestResult::not_run(&declared.name))
                .collect(),
            teardown: self
                .teardown
                .iter()
                .map(|declared| TestResult::not_run(&declared.name))
                .collect(),
        }
    }
}
