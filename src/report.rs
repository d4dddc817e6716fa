// Copyright 2022 F4PGA Authors
// Licensed under the Apache License, Version 2.0.

//! Extraction of results from finished toolchain runs.
//!
//! [`parse_timing_report`] reads a Vivado `report_timing` style report and returns the
//! achieved and requested frequency of every clock group. [`parse_cell_stats`] reads the
//! statistics printed by Yosys and returns the count of every cell type.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_till, take_till1},
    character::complete::{char as nom_char, digit0, digit1, multispace0, multispace1},
    combinator::{all_consuming, map_res, opt, recognize},
    sequence::{preceded, terminated, tuple},
    IResult,
};
use nom_locate::LocatedSpan;
use serde::Serialize;
use thiserror::Error;

// Alias Span for brevity.
type Span<'a> = LocatedSpan<&'a str>;

/// Location of a parsing error in a report.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ErrLoc {
    /// Line number where parsing error occurred.
    pub line: usize,
    /// Column number where parsing error occurred.
    pub col: usize,
}

impl<'a> From<Span<'a>> for ErrLoc {
    fn from(span: Span<'a>) -> Self {
        ErrLoc { line: span.location_line() as usize, col: span.get_column() }
    }
}

impl std::fmt::Display for ErrLoc {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "L{}:{}", self.line, self.col)
    }
}

/// Report scanning error.
///
/// Malformed numeric fields are never skipped or defaulted; the whole scan fails
/// with the location of the offending text.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ReportError {
    #[error("Could not parse nanoseconds for '{1}' at {0}")]
    InvalidNumber(ErrLoc, String),
    #[error("Missing value for '{1}' at {0}")]
    MissingValue(ErrLoc, String),
    #[error("Data path delay of zero at {0}")]
    ZeroDelay(ErrLoc),
    #[error("Timing block for group '{1}' ending at {0} has no requirement")]
    MissingRequirement(ErrLoc, String),
    #[error("Expected a cell name and count at {0}")]
    MalformedCellLine(ErrLoc),
    #[error("Could not read {path:?}: {kind}")]
    Io { path: PathBuf, kind: std::io::ErrorKind },
}

/// Timing results for one clock group.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClockTiming {
    /// Achieved frequency in MHz.
    pub actual: f64,

    /// Requested frequency in MHz.
    pub requested: f64,

    /// Whether the achieved frequency reaches the requested one.
    pub met: bool,

    /// Worst slack violation in ns per path type, keyed `<path type>_violation`
    /// with the path type lower-cased, e.g. `setup_violation`.
    #[serde(flatten)]
    pub violations: BTreeMap<String, f64>,
}

impl ClockTiming {
    /// Violation recorded for `path_type`, such as "setup" or "hold".
    pub fn violation(&self, path_type: &str) -> Option<f64> {
        self.violations.get(&violation_key(path_type)).copied()
    }
}

fn violation_key(path_type: &str) -> String {
    format!("{}_violation", path_type.to_lowercase())
}

/// Consume one line and its newline, returning the line.
fn report_line(input: Span) -> IResult<Span, Span> {
    terminated(take_till(|c: char| c == '\n'), opt(nom_char('\n')))(input)
}

/// Iterator over the lines of a report, keeping their locations.
struct Lines<'a> {
    rest: Span<'a>,
}

impl<'a> Lines<'a> {
    fn new(input: &'a str) -> Self {
        Lines { rest: Span::new(input) }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = Span<'a>;

    fn next(&mut self) -> Option<Span<'a>> {
        if self.rest.fragment().is_empty() {
            return None;
        }
        let (rest, line) = report_line(self.rest).ok()?;
        self.rest = rest;
        Some(line)
    }
}

/// Line contents without a trailing carriage return.
fn text<'a>(line: &Span<'a>) -> &'a str {
    let fragment: &'a str = *line.fragment();
    fragment.trim_end_matches('\r')
}

/// Parse a `Label: value` line.
///
/// Returns the label and the value, which runs up to the next colon if there is one.
fn labelled_field(input: Span) -> IResult<Span, (Span, Span)> {
    tuple((
        take_till(|c: char| c == ':'),
        preceded(nom_char(':'), take_till(|c: char| c == ':')),
    ))(input)
}

/// Parse a whitespace-delimited word, skipping leading whitespace.
fn word(input: Span) -> IResult<Span, Span> {
    preceded(multispace0, take_till1(|c: char| c.is_whitespace()))(input)
}

fn sign(input: Span) -> IResult<Span, Option<char>> {
    opt(alt((nom_char('+'), nom_char('-'))))(input)
}

/// Parse a signed real number.
///
/// The mantissa is `digits[.[digits]]` or `.digits`, optionally followed by an exponent
/// `e[+-]digits`. Unconstrained paths report `inf`, so infinities and NaN are accepted
/// in any case.
fn real(input: Span) -> IResult<Span, f64> {
    map_res(
        recognize(
            tuple((
                sign,
                alt((
                    recognize(tuple((digit1, opt(preceded(nom_char('.'), digit0))))),
                    recognize(preceded(nom_char('.'), digit1)),
                    tag_no_case("infinity"),
                    tag_no_case("inf"),
                    tag_no_case("nan"),
                )),
                opt(tuple((alt((nom_char('E'), nom_char('e'))), sign, digit1))),
            ))
        ),
        |float_str: Span| float_str.fragment().parse::<f64>()
    )(input)
}

/// Parse a time in nanoseconds, with or without its `ns` unit.
fn nanoseconds(input: Span) -> IResult<Span, f64> {
    all_consuming(terminated(real, opt(tag("ns"))))(input)
}

/// Read the first word of a field value as nanoseconds.
fn field_ns(value: Span, field: &str) -> Result<f64, ReportError> {
    let (_, token) =
        word(value).map_err(|_| ReportError::MissingValue(value.into(), field.to_string()))?;
    nanoseconds(token)
        .map(|(_, ns)| ns)
        .map_err(|_| ReportError::InvalidNumber(token.into(), field.to_string()))
}

/// A timing block ends on a line whose second field is a dashed rule.
fn is_block_end(line: &str) -> bool {
    line.split_whitespace().nth(1).map_or(false, |field| field.starts_with("----"))
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum ScanState {
    Scanning,
    InBlock,
}

/// Fields seen so far. Values carry over from one block to the next.
#[derive(Default)]
struct PathFields {
    group: String,
    requirement: String,
    freq: f64,
    requested: Option<f64>,
    path_type: Option<String>,
    violation: f64,
}

impl PathFields {
    /// Record the block ending at `end` into `clocks`.
    ///
    /// Returns false when the block does not time a path of its own clock group,
    /// in which case nothing is recorded.
    fn record(
        &mut self,
        end: Span,
        clocks: &mut BTreeMap<String, ClockTiming>,
    ) -> Result<bool, ReportError> {
        if !self.requirement.split_whitespace().any(|token| token == self.group) {
            log::debug!("{}: discarding timing block for group '{}'", ErrLoc::from(end), self.group);
            return Ok(false);
        }

        match clocks.get_mut(&self.group) {
            None => {
                let requested = self
                    .requested
                    .ok_or_else(|| ReportError::MissingRequirement(end.into(), self.group.clone()))?;
                let mut timing = ClockTiming {
                    actual: self.freq,
                    requested,
                    met: self.freq >= requested,
                    violations: BTreeMap::new(),
                };
                if let Some(path_type) = self.path_type.take() {
                    timing.violations.insert(violation_key(&path_type), self.violation);
                }
                clocks.insert(self.group.clone(), timing);
            }
            Some(timing) => {
                if let Some(path_type) = &self.path_type {
                    timing.violations.insert(violation_key(path_type), self.violation);
                }
            }
        }
        Ok(true)
    }

    fn update(&mut self, line: Span) -> Result<(), ReportError> {
        let (label, value) = match labelled_field(line) {
            Ok((_, field)) => field,
            Err(_) => return Ok(()),
        };
        match label.fragment().trim() {
            "Data Path Delay" => {
                let delay = field_ns(value, "Data Path Delay")?;
                if delay == 0.0 {
                    return Err(ReportError::ZeroDelay(value.into()));
                }
                self.freq = 1e9 / delay;
            }
            "Path Group" => {
                self.group = value.fragment().trim().to_string();
            }
            "Requirement" => {
                self.requirement = value.fragment().trim().to_string();
                let requirement = field_ns(value, "Requirement")?;
                if requirement != 0.0 {
                    self.requested = Some(1e9 / requirement);
                }
            }
            "Path Type" => {
                let (_, path_type) = word(value)
                    .map_err(|_| ReportError::MissingValue(value.into(), "Path Type".to_string()))?;
                self.path_type = Some(path_type.fragment().to_string());
            }
            _ => (),
        }
        Ok(())
    }
}

/// Convert to MHz, rounded to 3 decimals the way decimal formatting rounds, so exact
/// binary ties such as 976.5625 go to the even digit.
fn to_mhz(hz: f64) -> f64 {
    let mhz = hz / 1e6;
    format!("{:.3}", mhz).parse().unwrap_or(mhz)
}

/// Extract per-clock-group timing results from a timing report.
///
/// Each timing block starts at a `Slack` line and ends at a dashed rule. Only blocks
/// whose path group appears in their requirement are recorded. The first such block of
/// a group sets its achieved and requested frequency, and later blocks only add their
/// path type's slack violation. Frequencies are returned in MHz rounded to 3 decimals.
pub fn parse_timing_report(report: &str) -> Result<BTreeMap<String, ClockTiming>, ReportError> {
    log::debug!("scanning timing report of {} lines", bytecount::count(report.as_bytes(), b'\n'));

    let mut state = ScanState::Scanning;
    let mut fields = PathFields::default();
    let mut clocks = BTreeMap::new();

    for line in Lines::new(report) {
        let content = text(&line);

        if content.starts_with("Slack") {
            fields.violation = if content.contains("(MET)") {
                0.0
            } else {
                let (_, (_, value)) = labelled_field(line)
                    .map_err(|_| ReportError::MissingValue(line.into(), "Slack".to_string()))?;
                field_ns(value, "Slack")?
            };
            state = ScanState::InBlock;
        }

        if state == ScanState::Scanning {
            continue;
        }

        if is_block_end(content) {
            state = ScanState::Scanning;
            if !fields.record(line, &mut clocks)? {
                continue;
            }
        }

        fields.update(line)?;
    }

    for timing in clocks.values_mut() {
        timing.actual = to_mhz(timing.actual);
        timing.requested = to_mhz(timing.requested);
    }
    Ok(clocks)
}

/// Parse a `<cell> <count>` line.
fn cell_count(input: Span) -> IResult<Span, (Span, Span)> {
    all_consuming(terminated(
        tuple((word, preceded(multispace1, word))),
        multispace0,
    ))(input)
}

/// Extract cell counts from the statistics section of a Yosys log.
///
/// Nothing is read before the first "Printing statistics" line. After it, every line
/// following a "Number of cells" line is a cell and its count, up to the next blank line.
pub fn parse_cell_stats(log_text: &str) -> Result<BTreeMap<String, String>, ReportError> {
    let mut cells = BTreeMap::new();
    let mut in_stats = false;
    let mut in_cells = false;

    for line in Lines::new(log_text) {
        let content = text(&line);
        in_stats = in_stats || content.contains("Printing statistics");
        if !in_stats {
            continue;
        }

        let blank = content.trim().is_empty();
        if in_cells && !blank {
            let (_, (cell, count)) =
                cell_count(line).map_err(|_| ReportError::MalformedCellLine(line.into()))?;
            cells.insert(cell.fragment().to_string(), count.fragment().to_string());
        }
        // A blank line stops capture until the next "Number of cells" line.
        in_cells = (in_cells || content.contains("Number of cells")) && !blank;
    }

    Ok(cells)
}

fn read_report(path: &Path) -> Result<String, ReportError> {
    std::fs::read_to_string(path)
        .map_err(|e| ReportError::Io { path: path.to_path_buf(), kind: e.kind() })
}

/// Read and scan a timing report file, see [`parse_timing_report`].
pub fn parse_timing_report_file(
    path: impl AsRef<Path>,
) -> Result<BTreeMap<String, ClockTiming>, ReportError> {
    parse_timing_report(&read_report(path.as_ref())?)
}

/// Read and scan a Yosys log file, see [`parse_cell_stats`].
pub fn parse_cell_stats_file(path: impl AsRef<Path>) -> Result<BTreeMap<String, String>, ReportError> {
    parse_cell_stats(&read_report(path.as_ref())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assert that parsing the input $i with the parser $p
    /// produces the remaining output $r and the output $o.
    macro_rules! assert_parse {
        ($p:expr, $i:expr, $r:expr, $o:expr) => {
            match $p(Span::new($i)) {
                Ok((rem, out)) => {
                    assert_eq!(rem.fragment(), &$r);
                    assert_eq!(out, $o);
                }
                Err(e) => panic!("Parse failure: {:?}", e),
            }
        };
    }

    /// A setup path of `clk` that misses timing by half a nanosecond.
    const SETUP_BLOCK: &str = "\
Timing Report

Slack (VIOLATED) :        -0.500ns  (required time - arrival time)
  Source:                 counter_reg[0]/C
  Destination:            counter_reg[31]/D
  Path Group:             clk
  Path Type:              Setup (Max at Slow Process Corner)
  Requirement:            10.000ns  (clk rise@10.000ns - clk rise@0.000ns)
  Data Path Delay:        4.000ns  (logic 1.200ns (30.000%)  route 2.800ns (70.000%))

    Location             Delay type                Incr(ns)  Path(ns)    Netlist Resource(s)
  -------------------------------------------------------------------    -------------------
                         (clock clk rise edge)        0.000     0.000 r
";

    /// A hold path of `clk`, with a zero requirement.
    const HOLD_BLOCK: &str = "\
Slack (MET) :             0.150ns  (arrival time - required time)
  Path Group:             clk
  Path Type:              Hold (Min at Fast Process Corner)
  Requirement:            0.000ns  (clk rise@0.000ns - clk rise@0.000ns)
  Data Path Delay:        0.400ns  (logic 0.100ns (25.000%)  route 0.300ns (75.000%))
  -------------------------------------------------------------------    -------------------
";

    #[test]
    fn test_report_line() {
        assert_parse!(report_line, "abc\ndef", "def", s("abc"));
        assert_parse!(report_line, "last", "", s("last"));
    }

    fn s(text: &str) -> Span {
        Span::new(text)
    }

    #[test]
    fn test_lines_locations() {
        let lines: Vec<(u32, &str)> =
            Lines::new("a\r\n\nb").map(|l| (l.location_line(), text(&l))).collect();
        assert_eq!(lines, vec![(1, "a"), (2, ""), (3, "b")]);
    }

    #[test]
    fn test_nanoseconds() {
        assert_parse!(nanoseconds, "4.000ns", "", 4.0);
        assert_parse!(nanoseconds, "-0.500ns", "", -0.5);
        assert_parse!(nanoseconds, "10", "", 10.0);
        assert_parse!(nanoseconds, "1.5e1ns", "", 15.0);
        assert_parse!(nanoseconds, ".5ns", "", 0.5);
        assert_parse!(nanoseconds, "5.", "", 5.0);
        assert_parse!(nanoseconds, "inf", "", f64::INFINITY);
        assert_parse!(nanoseconds, "-INFns", "", f64::NEG_INFINITY);
        assert_parse!(nanoseconds, "+Infinity", "", f64::INFINITY);
        assert!(nanoseconds(s("NaN")).unwrap().1.is_nan());
        assert!(nanoseconds(s("4.0ps")).is_err());
        assert!(nanoseconds(s("ns")).is_err());
        assert!(nanoseconds(s(".")).is_err());
        assert!(nanoseconds(s("1e")).is_err());
        assert!(nanoseconds(s("infinite")).is_err());
    }

    #[test]
    fn test_labelled_field() {
        let (_, (label, value)) = labelled_field(s("  Path Group:   clk")).unwrap();
        assert_eq!(label.fragment().trim(), "Path Group");
        assert_eq!(value.fragment().trim(), "clk");

        let (_, (_, value)) = labelled_field(s("Source: a:b")).unwrap();
        assert_eq!(*value.fragment(), " a");
        assert!(labelled_field(s("no colon here")).is_err());
    }

    #[test]
    fn test_is_block_end() {
        assert!(is_block_end("  ---------------    -----------"));
        assert!(is_block_end("Location ------"));
        assert!(!is_block_end("-------------------"));
        assert!(!is_block_end("  Path Group: --- clk"));
    }

    #[test]
    fn test_setup_block() {
        let clocks = parse_timing_report(SETUP_BLOCK).unwrap();
        assert_eq!(clocks.len(), 1);
        let clk = &clocks["clk"];
        assert_eq!(clk.actual, 250.0);
        assert_eq!(clk.requested, 100.0);
        // Decided by frequency alone, whatever the slack says.
        assert!(clk.met);
        assert_eq!(clk.violation("setup"), Some(-0.5));
        assert_eq!(clk.violation("hold"), None);

        let json = serde_json::to_value(&clocks).unwrap();
        assert_eq!(json, serde_json::json!({
            "clk": {"actual": 250.0, "requested": 100.0, "met": true, "setup_violation": -0.5}
        }));
    }

    #[test]
    fn test_later_block_adds_violation() {
        let report = format!("{SETUP_BLOCK}{HOLD_BLOCK}");
        let clk = &parse_timing_report(&report).unwrap()["clk"];
        // The hold block neither changes frequencies nor the zero requirement.
        assert_eq!(clk.actual, 250.0);
        assert_eq!(clk.requested, 100.0);
        assert_eq!(clk.violation("setup"), Some(-0.5));
        assert_eq!(clk.violation("hold"), Some(0.0));
    }

    #[test]
    fn test_unmet_frequency() {
        let report = SETUP_BLOCK.replace("4.000ns  (logic", "12.500ns  (logic");
        let clk = &parse_timing_report(&report).unwrap()["clk"];
        assert_eq!(clk.actual, 80.0);
        assert!(!clk.met);
    }

    #[test]
    fn test_rounding() {
        let report = SETUP_BLOCK
            .replace("4.000ns  (logic", "3.000ns  (logic")
            .replace("10.000ns  (clk", "7.000ns  (clk");
        let clk = &parse_timing_report(&report).unwrap()["clk"];
        assert_eq!(clk.actual, 333.333);
        assert_eq!(clk.requested, 142.857);
    }

    #[test]
    fn test_rounding_ties_to_even() {
        // 1e9 / 1.024ns is exactly 976.5625 MHz.
        let report = SETUP_BLOCK
            .replace("4.000ns  (logic", "1.024ns  (logic")
            .replace("10.000ns  (clk", "1.024ns  (clk");
        let clk = &parse_timing_report(&report).unwrap()["clk"];
        assert_eq!(clk.actual, 976.562);
        assert_eq!(clk.requested, 976.562);

        let report = SETUP_BLOCK.replace("4.000ns  (logic", "5.120ns  (logic");
        assert_eq!(parse_timing_report(&report).unwrap()["clk"].actual, 195.312);
    }

    #[test]
    fn test_unconstrained_block() {
        let unconstrained = "\
Slack:                    inf
  Source:                 rst_in
  Destination:            rst_sync_reg/D
  Path Group:             (none)
  Path Type:              Max at Slow Process Corner
  Data Path Delay:        5.000ns  (logic 1.000ns (20.000%)  route 4.000ns (80.000%))
  -------------------------------------------------------------------    -------------------
";
        assert!(parse_timing_report(unconstrained).unwrap().is_empty());

        for report in [format!("{unconstrained}{SETUP_BLOCK}"), format!("{SETUP_BLOCK}{unconstrained}")] {
            let clocks = parse_timing_report(&report).unwrap();
            assert_eq!(clocks.keys().collect::<Vec<_>>(), vec!["clk"]);
            assert_eq!(clocks["clk"].actual, 250.0);
            assert_eq!(clocks["clk"].requested, 100.0);
            assert_eq!(clocks["clk"].violation("setup"), Some(-0.5));
        }
    }

    #[test]
    fn test_inter_clock_block_discarded() {
        let report = SETUP_BLOCK.replace("Path Group:             clk", "Path Group:             clk_b");
        assert!(parse_timing_report(&report).unwrap().is_empty());
    }

    #[test]
    fn test_lines_outside_blocks_ignored() {
        let report = "Data Path Delay: bogus\nPath Group: clk\n  ----  ----\n";
        assert!(parse_timing_report(report).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_number() {
        let report = SETUP_BLOCK.replace("4.000ns  (logic", "four  (logic");
        assert_eq!(
            parse_timing_report(&report),
            Err(ReportError::InvalidNumber(ErrLoc { line: 9, col: 27 }, "Data Path Delay".into()))
        );
    }

    #[test]
    fn test_report_error_display() {
        let loc = ErrLoc { line: 3, col: 27 };
        assert_eq!(
            ReportError::InvalidNumber(loc, "Slack".into()).to_string(),
            "Could not parse nanoseconds for 'Slack' at L3:27"
        );
        assert_eq!(
            ReportError::MissingValue(loc, "Path Type".into()).to_string(),
            "Missing value for 'Path Type' at L3:27"
        );
        assert_eq!(ReportError::ZeroDelay(loc).to_string(), "Data path delay of zero at L3:27");
        assert_eq!(
            ReportError::MissingRequirement(loc, "clk".into()).to_string(),
            "Timing block for group 'clk' ending at L3:27 has no requirement"
        );
        assert_eq!(
            ReportError::MalformedCellLine(loc).to_string(),
            "Expected a cell name and count at L3:27"
        );
    }

    #[test]
    fn test_zero_delay() {
        let report = SETUP_BLOCK.replace("4.000ns  (logic", "0.000ns  (logic");
        assert!(matches!(parse_timing_report(&report), Err(ReportError::ZeroDelay(_))));
    }

    #[test]
    fn test_hold_without_requirement() {
        assert_eq!(
            parse_timing_report(HOLD_BLOCK),
            Err(ReportError::MissingRequirement(ErrLoc { line: 6, col: 1 }, "clk".into()))
        );
    }

    #[test]
    fn test_cell_stats() {
        let log = "\
Number of cells: 999
BOGUS 1

Printing statistics.
=== top ===
   Number of cells:                160
     LUT4 120
     DFF 40
";
        let cells = parse_cell_stats(log).unwrap();
        let expected: BTreeMap<String, String> =
            [("LUT4", "120"), ("DFF", "40")].iter().map(|(c, n)| (c.to_string(), n.to_string())).collect();
        assert_eq!(cells, expected);
    }

    #[test]
    fn test_cell_stats_blank_line_stops_capture() {
        let log = "\
Printing statistics.
   Number of cells:  3
     SB_LUT4  2

     SB_DFF   1
   Number of cells:  1
     SB_CARRY 1
";
        let cells = parse_cell_stats(log).unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells["SB_LUT4"], "2");
        assert_eq!(cells["SB_CARRY"], "1");
        assert!(!cells.contains_key("SB_DFF"));
    }

    #[test]
    fn test_cell_stats_malformed() {
        let log = "Printing statistics.\nNumber of cells: 2\n  Chip area: 12.5 um\n";
        assert_eq!(
            parse_cell_stats(log),
            Err(ReportError::MalformedCellLine(ErrLoc { line: 3, col: 1 }))
        );
    }

    #[test]
    fn test_report_files() {
        let dir = tempfile::tempdir().unwrap();
        let timing = dir.path().join("timing.rpt");
        std::fs::write(&timing, SETUP_BLOCK).unwrap();
        assert_eq!(parse_timing_report_file(&timing).unwrap()["clk"].requested, 100.0);

        let missing = dir.path().join("yosys.log");
        assert_eq!(
            parse_cell_stats_file(&missing),
            Err(ReportError::Io { path: missing.clone(), kind: std::io::ErrorKind::NotFound })
        );
    }
}
