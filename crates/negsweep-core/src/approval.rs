//! Human-in-the-loop approval of flagged terms.
//!
//! Nothing reaches an exclusion list without passing [`approve`]. The policy
//! decides which flags survive; the output always follows the order of the
//! flagged list and never repeats a term.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::term::{ApprovedTerm, FlagSource, FlaggedTerm};

/// Line-oriented prompt channel used by [`ApprovalPolicy::Interactive`].
///
/// Reads are async so a run can be cancelled while a prompt is waiting.
#[async_trait]
pub trait LineChannel: Send {
    async fn write_text(&mut self, text: &str) -> io::Result<()>;

    /// One line without its terminator, or `None` at end of input.
    async fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Prompts on stdout and reads stdin.
///
/// Stdin is read on a dedicated thread that is started on the first read.
/// Dropping a pending read leaves that thread blocked, which does not hold
/// up runtime shutdown.
#[derive(Debug, Default)]
pub struct StdioChannel {
    lines: Option<mpsc::Receiver<io::Result<String>>>,
}

impl StdioChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lines(&mut self) -> &mut mpsc::Receiver<io::Result<String>> {
        self.lines.get_or_insert_with(|| {
            let (tx, rx) = mpsc::channel(1);
            std::thread::spawn(move || loop {
                let mut buf = String::new();
                let line = match io::stdin().lock().read_line(&mut buf) {
                    Ok(0) => break,
                    Ok(_) => Ok(buf),
                    Err(err) => Err(err),
                };
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            });
            rx
        })
    }
}

#[async_trait]
impl LineChannel for StdioChannel {
    async fn write_text(&mut self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()
    }

    async fn read_line(&mut self) -> io::Result<Option<String>> {
        match self.lines().recv().await {
            Some(line) => Ok(Some(line?.trim_end_matches(&['\r', '\n'][..]).to_string())),
            None => Ok(None),
        }
    }
}

/// Channel fed from a fixed list of replies; keeps everything written to it.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    replies: VecDeque<String>,
    output: String,
}

impl ScriptedChannel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            output: String::new(),
        }
    }

    /// Everything written so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

#[async_trait]
impl LineChannel for ScriptedChannel {
    async fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.output.push_str(text);
        Ok(())
    }

    async fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.replies.pop_front())
    }
}

/// How flagged terms get approved.
pub enum ApprovalPolicy {
    /// Zero-based indices into the flagged list. Out-of-range entries are ignored.
    Automatic(Vec<usize>),
    /// Approve every flag.
    All,
    /// Approve only deterministic disqualifier flags.
    AutoRuleOnly,
    /// Show the numbered list and read one reply.
    Interactive(Box<dyn LineChannel>),
}

impl ApprovalPolicy {
    pub fn none() -> Self {
        ApprovalPolicy::Automatic(Vec::new())
    }

    pub fn interactive(channel: impl LineChannel + 'static) -> Self {
        ApprovalPolicy::Interactive(Box::new(channel))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApprovalPolicy::Automatic(_) => "automatic",
            ApprovalPolicy::All => "all",
            ApprovalPolicy::AutoRuleOnly => "auto_rule_only",
            ApprovalPolicy::Interactive(_) => "interactive",
        }
    }
}

impl fmt::Debug for ApprovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalPolicy::Automatic(indices) => {
                f.debug_tuple("Automatic").field(indices).finish()
            }
            other => f.write_str(other.label()),
        }
    }
}

/// A parsed approval reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    /// Zero-based, ascending, no repeats.
    Indices(Vec<usize>),
}

/// Parse `all` or a comma list of one-based numbers.
///
/// Tokens that are not positive integers are dropped, so garbage input
/// selects nothing. Shared by the interactive prompt and `--approve 1,3`.
pub fn parse_selection(input: &str) -> Selection {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return Selection::All;
    }
    let indices: BTreeSet<usize> = input
        .split(',')
        .filter_map(|token| token.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1)
        .map(|n| n - 1)
        .collect();
    Selection::Indices(indices.into_iter().collect())
}

/// Apply `policy` to `flagged`.
pub async fn approve(flagged: &[FlaggedTerm], policy: &mut ApprovalPolicy) -> Vec<ApprovedTerm> {
    if flagged.is_empty() {
        return Vec::new();
    }

    let selected: BTreeSet<usize> = match policy {
        ApprovalPolicy::Automatic(indices) => indices.iter().copied().collect(),
        ApprovalPolicy::All => (0..flagged.len()).collect(),
        ApprovalPolicy::AutoRuleOnly => flagged
            .iter()
            .enumerate()
            .filter(|(_, f)| f.source == FlagSource::AutoRule)
            .map(|(i, _)| i)
            .collect(),
        ApprovalPolicy::Interactive(channel) => match prompt(flagged, channel.as_mut()).await {
            Ok(Selection::All) => (0..flagged.len()).collect(),
            Ok(Selection::Indices(indices)) => indices.into_iter().collect(),
            Err(err) => {
                warn!(error = %err, "approval prompt failed, approving nothing");
                BTreeSet::new()
            }
        },
    };

    let approved: Vec<ApprovedTerm> = flagged
        .iter()
        .enumerate()
        .filter(|(i, _)| selected.contains(i))
        .map(|(_, f)| ApprovedTerm::from(f.clone()))
        .collect();
    debug!(
        policy = policy.label(),
        flagged = flagged.len(),
        approved = approved.len(),
        "approval complete"
    );
    approved
}

async fn prompt(flagged: &[FlaggedTerm], channel: &mut dyn LineChannel) -> io::Result<Selection> {
    channel.write_text(&render_listing(flagged)).await?;
    channel
        .write_text("Approve which terms? (e.g. 1,3 or 'all'; blank for none): ")
        .await?;
    Ok(match channel.read_line().await? {
        Some(line) => parse_selection(&line),
        None => Selection::Indices(Vec::new()),
    })
}

/// Numbered listing shown to the reviewer, starting at 1.
pub fn render_listing(flagged: &[FlaggedTerm]) -> String {
    let mut out = String::from("Flagged search terms:\n");
    for (i, term) in flagged.iter().enumerate() {
        let source = match term.source {
            FlagSource::AutoRule => "rule",
            FlagSource::AiModel => "ai",
        };
        out.push_str(&format!(
            "{:>3}. {} [{}/{}] '{}': {}\n",
            i + 1,
            term.search_term,
            term.category,
            source,
            term.matched_keyword,
            term.reason
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::FlagCategory;

    fn flag(term: &str, source: FlagSource) -> FlaggedTerm {
        FlaggedTerm {
            search_term: term.to_string(),
            matched_keyword: term.to_string(),
            reason: "test".to_string(),
            category: FlagCategory::Irrelevant,
            source,
        }
    }

    fn flagged() -> Vec<FlaggedTerm> {
        vec![
            flag("a", FlagSource::AutoRule),
            flag("b", FlagSource::AiModel),
            flag("c", FlagSource::AutoRule),
        ]
    }

    fn terms(approved: &[ApprovedTerm]) -> Vec<&str> {
        approved.iter().map(|a| a.search_term.as_str()).collect()
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection(" ALL "), Selection::All);
        assert_eq!(parse_selection("3, 1,x,1,0"), Selection::Indices(vec![0, 2]));
        assert_eq!(parse_selection(""), Selection::Indices(vec![]));
        assert_eq!(parse_selection("-2"), Selection::Indices(vec![]));
    }

    #[tokio::test]
    async fn test_automatic_keeps_flagged_order_and_ignores_out_of_range() {
        let mut policy = ApprovalPolicy::Automatic(vec![2, 0, 2, 9]);
        let approved = approve(&flagged(), &mut policy).await;
        assert_eq!(terms(&approved), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_all_and_auto_rule_only() {
        assert_eq!(terms(&approve(&flagged(), &mut ApprovalPolicy::All).await), vec!["a", "b", "c"]);
        assert_eq!(
            terms(&approve(&flagged(), &mut ApprovalPolicy::AutoRuleOnly).await),
            vec!["a", "c"]
        );
        assert!(approve(&flagged(), &mut ApprovalPolicy::none()).await.is_empty());
    }

    #[tokio::test]
    async fn test_interactive_reads_one_line() {
        let mut policy = ApprovalPolicy::interactive(ScriptedChannel::new(["2, 3", "1"]));
        let approved = approve(&flagged(), &mut policy).await;
        assert_eq!(terms(&approved), vec!["b", "c"]);

        // The second reply is still queued for the next account.
        let approved = approve(&flagged(), &mut policy).await;
        assert_eq!(terms(&approved), vec!["a"]);
    }

    #[tokio::test]
    async fn test_interactive_all_and_end_of_input() {
        let mut policy = ApprovalPolicy::interactive(ScriptedChannel::new(["All"]));
        assert_eq!(approve(&flagged(), &mut policy).await.len(), 3);
        assert!(approve(&flagged(), &mut policy).await.is_empty());
    }

    #[tokio::test]
    async fn test_interactive_invalid_reply_approves_nothing() {
        let mut policy = ApprovalPolicy::interactive(ScriptedChannel::new(["yes please"]));
        assert!(approve(&flagged(), &mut policy).await.is_empty());
    }

    #[tokio::test]
    async fn test_listing_is_numbered_from_one() {
        let mut channel = ScriptedChannel::new(["1"]);
        prompt(&flagged(), &mut channel).await.unwrap();
        assert!(channel.output().contains("  1. a [irrelevant/rule]"));
        assert!(channel.output().contains("  2. b [irrelevant/ai]"));
        assert_eq!(channel.remaining(), 0);
    }

    #[tokio::test]
    async fn test_empty_flagged_does_not_prompt() {
        let mut policy = ApprovalPolicy::interactive(ScriptedChannel::new(["all"]));
        assert!(approve(&[], &mut policy).await.is_empty());
        // The reply was not consumed.
        assert_eq!(approve(&flagged(), &mut policy).await.len(), 3);
    }
}
