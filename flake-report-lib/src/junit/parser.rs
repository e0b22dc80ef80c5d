use super::{TestCase, TestOutcome, TestSuiteResult};
use crate::Result;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Parse one JUnit XML document.
///
/// Both `<testsuites>` documents and documents with a bare `<testsuite>` root are accepted. Test cases of all
/// nested suites end up in the one returned [`TestSuiteResult`], which is named after the outermost element
/// carrying a `name` attribute.
pub fn parse(data: &[u8]) -> Result<TestSuiteResult> {
    let mut reader = Reader::from_reader(data);
    let mut builder = SuiteBuilder::default();
    let mut buf = Vec::new();
    let mut depth = 0_usize;

    loop {
        let position = reader.buffer_position();
        match reader
            .read_event_into(&mut buf)
            .into_app_err_with(|| format!("malformed JUnit XML near byte {position}"))?
        {
            Event::Start(element) => {
                depth += 1;
                builder.open(&element, false)?;
            }
            Event::Empty(element) => builder.open(&element, true)?,
            Event::End(element) => {
                depth = depth.saturating_sub(1);
                builder.close(element.local_name().as_ref());
            }
            Event::Eof => break,
            _ => {}
        }

        buf.clear();
    }

    // The reader reports a cut-off document as a clean end of input.
    if depth > 0 || builder.current.is_some() {
        return Err(app_err!("truncated JUnit document: {depth} element(s) left open at end of input"));
    }

    builder.finish()
}

#[derive(Debug, Default)]
struct SuiteBuilder {
    saw_suite: bool,
    name: Option<String>,
    cases: Vec<TestCase>,
    current: Option<TestCase>,
}

impl SuiteBuilder {
    fn open(&mut self, element: &BytesStart<'_>, is_empty: bool) -> Result<()> {
        match element.local_name().as_ref() {
            b"testsuites" | b"testsuite" => {
                self.saw_suite = true;
                if self.name.is_none() {
                    self.name = attribute(element, "name")?;
                }
            }
            b"testcase" => {
                let case = parse_test_case(element)?;
                if is_empty {
                    self.cases.push(case);
                } else {
                    self.current = Some(case);
                }
            }
            b"failure" => self.escalate(TestOutcome::Failed),
            b"error" => self.escalate(TestOutcome::Errored),
            b"skipped" => self.escalate(TestOutcome::Skipped),
            _ => {}
        }

        Ok(())
    }

    fn close(&mut self, local_name: &[u8]) {
        if local_name == b"testcase"
            && let Some(case) = self.current.take()
        {
            self.cases.push(case);
        }
    }

    fn escalate(&mut self, outcome: TestOutcome) {
        if let Some(case) = self.current.as_mut() {
            case.outcome = case.outcome.max(outcome);
        }
    }

    fn finish(self) -> Result<TestSuiteResult> {
        if !self.saw_suite {
            return Err(app_err!("document contains no testsuite element"));
        }

        Ok(TestSuiteResult::new(self.name.unwrap_or_default(), self.cases))
    }
}

fn parse_test_case(element: &BytesStart<'_>) -> Result<TestCase> {
    let name = attribute(element, "name")?.into_app_err("testcase element without a name attribute")?;

    Ok(TestCase {
        name,
        classname: attribute(element, "classname")?,
        duration: attribute(element, "time")?.as_deref().map_or(Duration::ZERO, parse_seconds),
        outcome: TestOutcome::Passed,
    })
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let Some(attr) = element
        .try_get_attribute(name)
        .into_app_err_with(|| format!("invalid '{name}' attribute"))?
    else {
        return Ok(None);
    };

    let value = attr
        .unescape_value()
        .into_app_err_with(|| format!("invalid value for '{name}' attribute"))?;

    Ok(Some(value.into_owned()))
}

/// Some producers write thousands separators into `time`; anything unparsable counts as zero.
fn parse_seconds(value: &str) -> Duration {
    value
        .replace(',', "")
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(Duration::ZERO)
}
