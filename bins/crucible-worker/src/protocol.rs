//! Parser for the `TEST_CASE_RESULT:` lines the generated harness emits.
//!
//! Wire format, one line per test case:
//!
//! ```text
//! TEST_CASE_RESULT: <index>,<actualOutput>,<durationMs>,<errorInfo>
//! ```
//!
//! The serialized output may itself contain commas, so tokenization uses
//! positions, not a split: the index ends at the first comma, the errorInfo
//! starts after the last comma, the duration sits between the last two
//! commas, and everything in between is the output.

pub const RESULT_PREFIX: &str = "TEST_CASE_RESULT:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestLine {
    pub index: usize,
    pub output: Option<String>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub error_type: Option<String>,
}

/// Scan a raw execution log and return one entry per test index. Lines
/// without the prefix are ignored (they are only log noise). When a
/// misbehaving harness emits more than one line for an index, the FIRST
/// one wins.
pub fn parse_log(raw: &str) -> Vec<TestLine> {
    let mut seen: Vec<usize> = Vec::new();
    let mut results: Vec<TestLine> = Vec::new();
    for line in raw.lines() {
        if let Some(parsed) = parse_line(line) {
            if seen.contains(&parsed.index) {
                continue;
            }
            seen.push(parsed.index);
            results.push(parsed);
        }
    }
    results
}

/// Parse a single line. Returns None when the line is not a result line or
/// carries no attributable index.
pub fn parse_line(line: &str) -> Option<TestLine> {
    let payload = line.strip_prefix(RESULT_PREFIX)?.trim_start();

    let first_comma = payload.find(',')?;
    let index: usize = payload[..first_comma].trim().parse().ok()?;
    let rest = &payload[first_comma + 1..];

    let Some(last_comma) = rest.rfind(',') else {
        // Not enough fields to recover output or duration.
        return Some(parse_error(index, rest));
    };
    let error_info = &rest[last_comma + 1..];
    let head = &rest[..last_comma];
    let Some(second_last) = head.rfind(',') else {
        return Some(parse_error(index, head));
    };
    let duration_token = head[second_last + 1..].trim();
    let output = decode_output(&head[..second_last]);

    let Ok(duration_ms) = duration_token.parse::<u64>() else {
        return Some(TestLine {
            index,
            output,
            duration_ms: 0,
            error: Some(format!("unparseable duration: {}", duration_token)),
            error_type: Some("ParseError".to_string()),
        });
    };

    let (error, error_type) = decode_error_info(error_info);
    Some(TestLine {
        index,
        output,
        duration_ms,
        error,
        error_type,
    })
}

fn parse_error(index: usize, remainder: &str) -> TestLine {
    TestLine {
        index,
        output: decode_output(remainder),
        duration_ms: 0,
        error: Some("malformed result line".to_string()),
        error_type: Some("ParseError".to_string()),
    }
}

/// Empty output or the literal `null` decodes to a null output value.
fn decode_output(raw: &str) -> Option<String> {
    if raw.is_empty() || raw == "null" {
        None
    } else {
        Some(raw.to_string())
    }
}

/// `TypeName: message` when a colon is present; otherwise the whole payload
/// is both type and message.
fn decode_error_info(raw: &str) -> (Option<String>, Option<String>) {
    if raw.is_empty() {
        return (None, None);
    }
    match raw.split_once(':') {
        Some((ty, msg)) => (
            Some(msg.trim_start().to_string()),
            Some(ty.trim().to_string()),
        ),
        None => (Some(raw.to_string()), Some(raw.to_string())),
    }
}

/// Encode a tuple back into a wire line. Used by tests to assert the
/// round-trip property; the real emitters live in the generated harness.
#[cfg(test)]
fn encode_line(index: usize, output: Option<&str>, duration_ms: u64, error_info: &str) -> String {
    format!(
        "{} {},{},{},{}",
        RESULT_PREFIX,
        index,
        output.unwrap_or(""),
        duration_ms,
        error_info
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_success_line() {
        let line = "TEST_CASE_RESULT: 0,[0,1],12,";
        let parsed = parse_line(line).unwrap();
        assert_eq!(parsed.index, 0);
        assert_eq!(parsed.output.as_deref(), Some("[0,1]"));
        assert_eq!(parsed.duration_ms, 12);
        assert!(parsed.error.is_none());
        assert!(parsed.error_type.is_none());
    }

    #[test]
    fn commas_inside_output_survive() {
        let line = "TEST_CASE_RESULT: 3,[[1,2],[3,4]],7,";
        let parsed = parse_line(line).unwrap();
        assert_eq!(parsed.index, 3);
        assert_eq!(parsed.output.as_deref(), Some("[[1,2],[3,4]]"));
        assert_eq!(parsed.duration_ms, 7);
    }

    #[test]
    fn error_info_splits_on_first_colon() {
        let line =
            "TEST_CASE_RESULT: 1,,3,ArrayIndexOutOfBoundsException: Index 0 out of bounds for length 0";
        let parsed = parse_line(line).unwrap();
        assert_eq!(parsed.output, None);
        assert_eq!(
            parsed.error_type.as_deref(),
            Some("ArrayIndexOutOfBoundsException")
        );
        assert_eq!(
            parsed.error.as_deref(),
            Some("Index 0 out of bounds for length 0")
        );
    }

    #[test]
    fn error_info_without_colon_is_both_fields() {
        let line = "TEST_CASE_RESULT: 2,,5,StackOverflowError";
        let parsed = parse_line(line).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("StackOverflowError"));
        assert_eq!(parsed.error_type.as_deref(), Some("StackOverflowError"));
    }

    #[test]
    fn literal_null_output_decodes_to_none() {
        let parsed = parse_line("TEST_CASE_RESULT: 0,null,4,").unwrap();
        assert_eq!(parsed.output, None);
    }

    #[test]
    fn garbage_duration_becomes_parse_error() {
        let parsed = parse_line("TEST_CASE_RESULT: 0,[1],abc,").unwrap();
        assert_eq!(parsed.duration_ms, 0);
        assert_eq!(parsed.error_type.as_deref(), Some("ParseError"));
        assert_eq!(parsed.output.as_deref(), Some("[1]"));
    }

    #[test]
    fn non_result_lines_are_ignored() {
        assert!(parse_line("some stray stdout").is_none());
        assert!(parse_line("WARNING: TEST_CASE_RESULT should appear").is_none());
        assert!(parse_line("TEST_CASE_RESULT: notanumber,x,1,").is_none());
    }

    #[test]
    fn log_scan_keeps_first_line_per_index() {
        let raw = "\
hello from user code
TEST_CASE_RESULT: 0,[0,1],12,
TEST_CASE_RESULT: 0,[9,9],99,
TEST_CASE_RESULT: 1,42,3,
";
        let parsed = parse_log(raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].index, 0);
        assert_eq!(parsed[0].output.as_deref(), Some("[0,1]"));
        assert_eq!(parsed[1].index, 1);
        assert_eq!(parsed[1].output.as_deref(), Some("42"));
    }

    #[test]
    fn fake_line_in_exception_message_cannot_steal_an_index() {
        // A user throw whose message embeds a fake line only wins if it is
        // printed before the harness's own line for that index; the parser
        // then keeps whichever came first, deterministically.
        let raw = "\
TEST_CASE_RESULT: 0,[1],2,
TEST_CASE_RESULT: 0,,0,RuntimeException: TEST_CASE_RESULT: 0,evil,1,
";
        let parsed = parse_log(raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].output.as_deref(), Some("[1]"));
    }

    #[test]
    fn encode_then_parse_recovers_tuple() {
        let cases: Vec<(usize, Option<&str>, u64, &str)> = vec![
            (0, Some("[0,1]"), 12, ""),
            (1, None, 0, "TypeError: bad input"),
            (7, Some("[[1,2],[3]]"), 250, ""),
            (3, Some("\"a,b\""), 1, ""),
        ];
        for (index, output, duration, error_info) in cases {
            let line = encode_line(index, output, duration, error_info);
            let parsed = parse_line(&line).unwrap();
            assert_eq!(parsed.index, index);
            assert_eq!(parsed.output.as_deref(), output);
            assert_eq!(parsed.duration_ms, duration);
            if error_info.is_empty() {
                assert!(parsed.error.is_none());
            }
        }
    }
}
