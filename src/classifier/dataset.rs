//! Training data ingestion
//!
//! Reads labeled chat messages from CSV. Columns are resolved by header
//! name and every context column is optional. Malformed cells fall back to
//! 0 / 0.0 / false; rows whose label is not literally `0` or `1` are
//! skipped without error.
//!
//! Message cells may hold raw chat lines. Formatting codes (`§x`) and a
//! leading `sender: ` prefix are removed, and the mod's own
//! `[ScamScreener]` status lines are skipped.

use super::{TrainError, TrainResult};
use regex::Regex;
use std::sync::OnceLock;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Chat channel a message arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    Pm,
    Party,
    Public,
    #[default]
    Unknown,
}

impl Channel {
    /// Case-insensitive parse; anything unrecognised is `Unknown`
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "pm" => Self::Pm,
            "party" => Self::Party,
            "public" => Self::Public,
            _ => Self::Unknown,
        }
    }
}

/// Context signals recorded alongside a message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageContext {
    pub pushes_external_platform: bool,
    pub demands_upfront_payment: bool,
    pub requests_sensitive_data: bool,
    pub claims_middleman_without_proof: bool,
    pub too_good_to_be_true: bool,
    pub repeated_contact_attempts: i64,
    pub is_spam: bool,
    pub asks_for_stuff: bool,
    pub advertising: bool,
    pub intent_offer: bool,
    pub intent_rep: bool,
    pub intent_redirect: bool,
    pub intent_instruction: bool,
    pub intent_payment: bool,
    pub intent_anchor: bool,
    pub funnel_step_index: i64,
    pub funnel_sequence_score: f64,
    pub funnel_full_chain: bool,
    pub funnel_partial_chain: bool,
    /// Delay since the sender's previous message, in milliseconds
    pub delta_ms: i64,
    pub channel: Channel,
    pub rule_hits: i64,
    pub similarity_hits: i64,
    pub behavior_hits: i64,
    pub trend_hits: i64,
    pub funnel_hits: i64,
}

/// One labeled training row
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub message: String,
    pub context: MessageContext,
    /// Primary label, 0 or 1
    pub label: u8,
    /// Explicit funnel label from the `funnel_label` column, if present and valid
    pub funnel_label: Option<u8>,
    pub sample_weight: f64,
}

impl TrainingExample {
    pub fn new(message: impl Into<String>, label: u8, context: MessageContext) -> Self {
        Self {
            message: message.into(),
            context,
            label,
            funnel_label: None,
            sample_weight: 1.0,
        }
    }
}

/// Funnel label derived from the context when no explicit label is usable
pub fn derive_funnel_label(ctx: &MessageContext) -> u8 {
    let positive = ctx.funnel_full_chain
        || ctx.funnel_partial_chain
        || ctx.funnel_step_index > 0
        || ctx.funnel_sequence_score > 0.0
        || ctx.funnel_hits > 0;
    u8::from(positive)
}

/// Where the funnel head's training targets came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunnelLabelSource {
    /// The `funnel_label` column
    Explicit,
    /// Derived from the funnel context signals
    Derived,
    /// Derived labels were single-class; primary labels used instead
    PrimaryFallback,
}

impl fmt::Display for FunnelLabelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Explicit => "explicit funnel_label column",
            Self::Derived => "derived from funnel signals",
            Self::PrimaryFallback => "primary labels (fallback)",
        };
        f.write_str(s)
    }
}

/// Funnel-head training targets
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelTargets {
    pub labels: Vec<f64>,
    pub source: FunnelLabelSource,
}

/// All usable rows of one training file
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub examples: Vec<TrainingExample>,
    /// Rows dropped because the label was not `0` / `1` (or the row was unreadable)
    pub skipped_rows: usize,
    /// Whether the file had a `funnel_label` column
    pub has_funnel_label_column: bool,
}

impl TrainingSet {
    /// Load a training CSV from disk
    pub fn load(path: &Path) -> TrainResult<Self> {
        if !path.exists() {
            return Err(TrainError::MissingTrainingFile(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse training rows from any CSV source with a header row
    pub fn from_reader<R: Read>(reader: R) -> TrainResult<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let columns = ColumnMap::new(csv.headers()?);
        let mut set = TrainingSet {
            has_funnel_label_column: columns.has("funnel_label"),
            ..Default::default()
        };

        for (line, result) in csv.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    debug!("Skipping unreadable row {}: {}", line + 2, e);
                    set.skipped_rows += 1;
                    continue;
                }
            };

            let row = Row {
                record: &record,
                columns: &columns,
            };
            match row.to_example() {
                Ok(example) => set.examples.push(example),
                Err(reason) => {
                    debug!("Skipping row {}: {}", line + 2, reason);
                    set.skipped_rows += 1;
                }
            }
        }

        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn labels(&self) -> Vec<f64> {
        self.examples.iter().map(|e| f64::from(e.label)).collect()
    }

    pub fn sample_weights(&self) -> Vec<f64> {
        self.examples.iter().map(|e| e.sample_weight).collect()
    }

    pub fn positives(&self) -> usize {
        self.examples.iter().filter(|e| e.label == 1).count()
    }

    /// True when the primary labels contain both classes
    pub fn has_both_labels(&self) -> bool {
        has_both_classes(self.examples.iter().map(|e| e.label))
    }

    /// Pick the funnel-head targets: explicit column, then derived labels,
    /// then primary labels. `None` when none of them has both classes.
    pub fn funnel_targets(&self) -> Option<FunnelTargets> {
        let explicit: Option<Vec<u8>> = if self.has_funnel_label_column {
            self.examples.iter().map(|e| e.funnel_label).collect()
        } else {
            None
        };
        if let Some(labels) = explicit.filter(|l| has_both_classes(l.iter().copied())) {
            return Some(FunnelTargets {
                labels: labels.into_iter().map(f64::from).collect(),
                source: FunnelLabelSource::Explicit,
            });
        }

        let derived: Vec<u8> = self
            .examples
            .iter()
            .map(|e| derive_funnel_label(&e.context))
            .collect();
        if has_both_classes(derived.iter().copied()) {
            return Some(FunnelTargets {
                labels: derived.into_iter().map(f64::from).collect(),
                source: FunnelLabelSource::Derived,
            });
        }

        if self.has_both_labels() {
            return Some(FunnelTargets {
                labels: self.labels(),
                source: FunnelLabelSource::PrimaryFallback,
            });
        }
        None
    }

    pub fn stats(&self) -> DatasetStats {
        let positives = self.positives();
        let funnel = self.funnel_targets();
        DatasetStats {
            usable_rows: self.len(),
            skipped_rows: self.skipped_rows,
            positives,
            negatives: self.len() - positives,
            funnel_positives: funnel
                .as_ref()
                .map(|t| t.labels.iter().filter(|&&l| l > 0.5).count()),
            funnel_source: funnel.map(|t| t.source),
        }
    }
}

fn has_both_classes(labels: impl Iterator<Item = u8>) -> bool {
    let (mut zero, mut one) = (false, false);
    for label in labels {
        match label {
            0 => zero = true,
            _ => one = true,
        }
        if zero && one {
            return true;
        }
    }
    false
}

/// Header name -> column index
struct ColumnMap {
    index: HashMap<String, usize>,
}

impl ColumnMap {
    fn new(headers: &csv::StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim_start_matches('\u{feff}').trim().to_string(), i))
            .collect();
        Self { index }
    }

    fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

struct Row<'a> {
    record: &'a csv::StringRecord,
    columns: &'a ColumnMap,
}

impl Row<'_> {
    fn cell(&self, name: &str) -> &str {
        self.columns
            .index
            .get(name)
            .and_then(|&i| self.record.get(i))
            .unwrap_or("")
    }

    fn flag(&self, name: &str) -> bool {
        parse_flag(self.cell(name))
    }

    fn int(&self, name: &str) -> i64 {
        parse_int(self.cell(name))
    }

    fn to_example(&self) -> Result<TrainingExample, SkipReason> {
        let label = parse_label(self.cell("label")).ok_or(SkipReason::Label)?;
        let message = clean_message(self.cell("message")).ok_or(SkipReason::StatusLine)?;

        let context = MessageContext {
            pushes_external_platform: self.flag("pushes_external_platform"),
            demands_upfront_payment: self.flag("demands_upfront_payment"),
            requests_sensitive_data: self.flag("requests_sensitive_data"),
            claims_middleman_without_proof: self.flag("claims_middleman_without_proof"),
            too_good_to_be_true: self.flag("too_good_to_be_true"),
            repeated_contact_attempts: self.int("repeated_contact_attempts"),
            is_spam: self.flag("is_spam"),
            asks_for_stuff: self.flag("asks_for_stuff"),
            advertising: self.flag("advertising"),
            intent_offer: self.flag("intent_offer"),
            intent_rep: self.flag("intent_rep"),
            intent_redirect: self.flag("intent_redirect"),
            intent_instruction: self.flag("intent_instruction"),
            intent_payment: self.flag("intent_payment"),
            intent_anchor: self.flag("intent_anchor"),
            funnel_step_index: self.int("funnel_step_index"),
            funnel_sequence_score: parse_float(self.cell("funnel_sequence_score")),
            funnel_full_chain: self.flag("funnel_full_chain"),
            funnel_partial_chain: self.flag("funnel_partial_chain"),
            delta_ms: self.int("delta_ms"),
            channel: Channel::parse(self.cell("channel")),
            rule_hits: self.int("rule_hits"),
            similarity_hits: self.int("similarity_hits"),
            behavior_hits: self.int("behavior_hits"),
            trend_hits: self.int("trend_hits"),
            funnel_hits: self.int("funnel_hits"),
        };

        Ok(TrainingExample {
            message,
            context,
            label,
            funnel_label: parse_label(self.cell("funnel_label")),
            sample_weight: parse_sample_weight(self.cell("sample_weight")),
        })
    }
}

/// Why a row was left out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    Label,
    StatusLine,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label => f.write_str("label is not 0/1"),
            Self::StatusLine => f.write_str("status line of the mod itself"),
        }
    }
}

const STATUS_LINE_PREFIX: &str = "[ScamScreener]";

fn color_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("§.").expect("static color code pattern"))
}

fn chat_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^.*?([A-Za-z0-9_]{3,16})\s*:\s*(.+)$").expect("static chat line pattern")
    })
}

/// Chat text of a message cell: `§x` codes stripped, surrounding whitespace
/// trimmed and a `sender: ` prefix cut. `None` for `[ScamScreener]` lines.
pub fn clean_message(raw: &str) -> Option<String> {
    let stripped = color_code_pattern().replace_all(raw, "");
    let stripped = stripped.trim();
    if stripped.starts_with(STATUS_LINE_PREFIX) {
        return None;
    }
    let text = chat_line_pattern()
        .captures(stripped)
        .and_then(|caps| caps.get(2))
        .map_or(stripped, |body| body.as_str().trim());
    Some(text.to_string())
}

/// `Some(0)` / `Some(1)` for the literal strings `"0"` / `"1"`, else `None`
pub fn parse_label(raw: &str) -> Option<u8> {
    match raw {
        "0" => Some(0),
        "1" => Some(1),
        _ => None,
    }
}

/// Boolean cell: blank is false, `true`/`yes` are true, otherwise an
/// integer greater than zero. Anything unparsable is false.
pub fn parse_flag(raw: &str) -> bool {
    let value = raw.trim();
    if value.is_empty() {
        return false;
    }
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes") {
        return true;
    }
    value.parse::<i64>().map(|n| n > 0).unwrap_or(false)
}

pub fn parse_int(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}

pub fn parse_float(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Sample weight cell; missing, malformed, negative or non-finite means 1.0
pub fn parse_sample_weight(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|w| w.is_finite() && *w >= 0.0)
        .unwrap_or(1.0)
}

/// Summary of a loaded training file
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub usable_rows: usize,
    pub skipped_rows: usize,
    pub positives: usize,
    pub negatives: usize,
    pub funnel_positives: Option<usize>,
    pub funnel_source: Option<FunnelLabelSource>,
}

impl fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = |n: usize| {
            if self.usable_rows > 0 {
                n as f64 / self.usable_rows as f64 * 100.0
            } else {
                0.0
            }
        };
        writeln!(f, "Training Data Statistics:")?;
        writeln!(f, "  Usable rows:  {}", self.usable_rows)?;
        writeln!(f, "  Skipped rows: {}", self.skipped_rows)?;
        writeln!(f, "  Positive:     {} ({:.1}%)", self.positives, pct(self.positives))?;
        writeln!(f, "  Negative:     {} ({:.1}%)", self.negatives, pct(self.negatives))?;
        match (self.funnel_positives, self.funnel_source) {
            (Some(n), Some(source)) => {
                write!(f, "  Funnel:       {} positive ({:.1}%), {}", n, pct(n), source)
            }
            _ => write!(f, "  Funnel:       no usable labels (single class)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(csv: &str) -> TrainingSet {
        TrainingSet::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_flag() {
        assert!(!parse_flag(""));
        assert!(!parse_flag("   "));
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" yes "));
        assert!(parse_flag("2"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("-1"));
        assert!(!parse_flag("no"));
        assert!(!parse_flag("1.5"));
    }

    #[test]
    fn test_parse_numbers_fall_back() {
        assert_eq!(parse_int(" 4 "), 4);
        assert_eq!(parse_int("four"), 0);
        assert_eq!(parse_float("2.5"), 2.5);
        assert_eq!(parse_float("NaN"), 0.0);
        assert_eq!(parse_float("x"), 0.0);
        assert_eq!(parse_sample_weight(""), 1.0);
        assert_eq!(parse_sample_weight("0.25"), 0.25);
        assert_eq!(parse_sample_weight("-3"), 1.0);
        assert_eq!(parse_sample_weight("inf"), 1.0);
    }

    #[test]
    fn test_channel_parse() {
        assert_eq!(Channel::parse("PM"), Channel::Pm);
        assert_eq!(Channel::parse("Party"), Channel::Party);
        assert_eq!(Channel::parse(" public "), Channel::Public);
        assert_eq!(Channel::parse("guild"), Channel::Unknown);
        assert_eq!(Channel::parse(""), Channel::Unknown);
    }

    #[test]
    fn test_label_must_be_literal() {
        assert_eq!(parse_label("0"), Some(0));
        assert_eq!(parse_label("1"), Some(1));
        for raw in [" 1", "1 ", "01", "1.0", "", "2", "true"] {
            assert_eq!(parse_label(raw), None, "{raw:?}");
        }

        let set = load("message,label\nhello,\" 1\"\nbye,0\n");
        assert_eq!(set.len(), 1);
        assert_eq!(set.skipped_rows, 1);
    }

    #[test]
    fn test_clean_message() {
        assert_eq!(clean_message("§cSteve§r: §apay now").as_deref(), Some("pay now"));
        assert_eq!(
            clean_message("[Party] Alex_99 : send the gold").as_deref(),
            Some("send the gold")
        );
        assert_eq!(clean_message("  just text  ").as_deref(), Some("just text"));
        assert_eq!(clean_message("").as_deref(), Some(""));
        assert_eq!(clean_message("§6[ScamScreener] risk: high"), None);
    }

    #[test]
    fn test_status_lines_are_skipped() {
        let set = load(
            "message,label\n\
             \"[ScamScreener] flagged Steve\",1\n\
             \"Steve: pay now\",1\n",
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.skipped_rows, 1);
        assert_eq!(set.examples[0].message, "pay now");
    }

    #[test]
    fn test_rows_with_other_labels_are_skipped() {
        let set = load(
            "message,label\n\
             hello,0\n\
             pay now,1\n\
             what,2\n\
             blank,\n\
             yes,true\n",
        );
        assert_eq!(set.len(), 2);
        assert_eq!(set.skipped_rows, 3);
        assert_eq!(set.positives(), 1);
    }

    #[test]
    fn test_columns_resolved_by_name_and_optional() {
        let set = load(
            "channel,label,repeated_contact_attempts,message,is_spam,delta_ms\n\
             Party,1,4,\"pay, now\",yes,oops\n\
             pm,0\n",
        );
        assert_eq!(set.len(), 2);

        let first = &set.examples[0];
        assert_eq!(first.message, "pay, now");
        assert_eq!(first.context.channel, Channel::Party);
        assert_eq!(first.context.repeated_contact_attempts, 4);
        assert!(first.context.is_spam);
        assert_eq!(first.context.delta_ms, 0);
        assert_eq!(first.sample_weight, 1.0);

        let second = &set.examples[1];
        assert_eq!(second.message, "");
        assert_eq!(second.context.channel, Channel::Pm);
        assert!(!second.context.is_spam);
    }

    #[test]
    fn test_derive_funnel_label() {
        assert_eq!(derive_funnel_label(&MessageContext::default()), 0);
        for ctx in [
            MessageContext { funnel_full_chain: true, ..Default::default() },
            MessageContext { funnel_partial_chain: true, ..Default::default() },
            MessageContext { funnel_step_index: 1, ..Default::default() },
            MessageContext { funnel_sequence_score: 0.5, ..Default::default() },
            MessageContext { funnel_hits: 2, ..Default::default() },
        ] {
            assert_eq!(derive_funnel_label(&ctx), 1, "{ctx:?}");
        }
    }

    #[test]
    fn test_funnel_targets_prefers_explicit_column() {
        let set = load(
            "message,label,funnel_label,funnel_hits\n\
             a,1,0,3\n\
             b,0,1,0\n",
        );
        let targets = set.funnel_targets().unwrap();
        assert_eq!(targets.source, FunnelLabelSource::Explicit);
        assert_eq!(targets.labels, vec![0.0, 1.0]);
    }

    #[test]
    fn test_funnel_targets_derives_when_column_unusable() {
        // one blank funnel_label makes the column unusable
        let set = load(
            "message,label,funnel_label,funnel_hits\n\
             a,1,1,3\n\
             b,0,,0\n",
        );
        let targets = set.funnel_targets().unwrap();
        assert_eq!(targets.source, FunnelLabelSource::Derived);
        assert_eq!(targets.labels, vec![1.0, 0.0]);
    }

    #[test]
    fn test_funnel_targets_fall_back_to_primary() {
        let set = load("message,label\na,1\nb,0\n");
        let targets = set.funnel_targets().unwrap();
        assert_eq!(targets.source, FunnelLabelSource::PrimaryFallback);
        assert_eq!(targets.labels, vec![1.0, 0.0]);

        let single = load("message,label\na,1\nb,1\n");
        assert!(single.funnel_targets().is_none());
    }

    #[test]
    fn test_stats_display() {
        let set = load("message,label\na,1\nb,0\nc,0\nd,x\n");
        let stats = set.stats();
        assert_eq!(stats.usable_rows, 3);
        assert_eq!(stats.skipped_rows, 1);
        assert_eq!(stats.positives, 1);
        assert_eq!(stats.negatives, 2);
        assert_eq!(stats.funnel_positives, Some(1));
        let text = stats.to_string();
        assert!(text.contains("Usable rows:  3"));
        assert!(text.contains("primary labels"));
    }
}
