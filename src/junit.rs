use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::path::Path;

use crate::test::TbTests;
use crate::{TbError, TbResult};

pub(crate) fn create_junit_xml(tests: &TbTests, suite_name: &str, path: &Path) -> TbResult<()> {
    let mut test_cases = Vec::new();

    for t in tests.iter() {
        let tc = match t.result.as_ref() {
            Some(Ok(_)) => TestCaseBuilder::success(&t.name, Duration::seconds_f64(t.time_secs)),
            Some(Err(e)) => TestCaseBuilder::failure(
                &t.name,
                Duration::seconds_f64(t.time_secs),
                "failure",
                &e.to_string(),
            ),
            None => TestCaseBuilder::failure(
                &t.name,
                Duration::seconds_f64(0.0),
                "failure",
                "test did not run",
            ),
        }
        .build();
        test_cases.push(tc);
    }

    let test_suite = TestSuiteBuilder::new(suite_name)
        .add_testcases(test_cases)
        .build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    let file = std::fs::File::create(path)?;
    report
        .write_xml(file)
        .map_err(|e| TbError::Report(e.to_string()))
}
