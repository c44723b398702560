//! These structs provide the CLI interface for the splitsync CLI.

use crate::model::{Amount, DateRange, KindFilter, TransactionKind};
use crate::Result;
use anyhow::bail;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// splitsync: compose split transactions offline, sync them with your ledger server.
///
/// The purpose of this program is to stage multi-leg "split" transactions in a local
/// datastore while offline, submit each staged group to your personal-finance ledger
/// server as one atomic write, and mirror the server's transactions into the local
/// datastore for fast date-range reports and search.
///
/// You will need a ledger server and a pre-acquired API token for it. Run `splitsync
/// init` once to set up the data directory.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// This is the first command you should run. Decide what directory you want to
    /// store data in and pass it as --splitsync-home (default $HOME/splitsync), then
    /// provide the base URL of your ledger server and the path to a file holding your
    /// API token. The token file is copied into the data directory's secrets folder.
    Init(InitArgs),
    /// Stage one leg of a split transaction in the local draft area.
    ///
    /// Staging is purely local and works offline. All legs staged under the same
    /// --master-id become one group when submitted.
    Stage(StageArgs),
    /// Submit the staged group for a master id to the ledger server as one transaction.
    ///
    /// If the server is unreachable the group is kept locally and queued for `retry`;
    /// that is not an error. If the server rejects the group, the draft stays intact so
    /// you can correct and resubmit.
    Submit(SubmitArgs),
    /// Re-attempt every queued submission that previously failed to reach the server.
    Retry,
    /// List the submissions queued for retry.
    Pending,
    /// Refresh the local mirror from the server for a date range and kind.
    ///
    /// Without --start/--end the entire mirror is replaced; a database backup is taken
    /// first.
    Refresh(RefreshArgs),
    /// Aggregate reports (counts, sums, distinct names) over the mirrored transactions.
    Report(ReportArgs),
    /// Delete a transaction on the server and reconcile the local copy.
    Delete(DeleteArgs),
    /// Search transactions by description text.
    Search(SearchArgs),
    /// List the attachments of a transaction, refreshing the local rows from the server
    /// when it is reachable.
    Attachments(AttachmentsArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where splitsync data and configuration is held. Defaults to
    /// ~/splitsync
    #[arg(long, env = "SPLITSYNC_HOME", default_value_t = default_splitsync_home())]
    splitsync_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, splitsync_home: PathBuf) -> Self {
        Self {
            log_level,
            splitsync_home: splitsync_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn splitsync_home(&self) -> &DisplayPath {
        &self.splitsync_home
    }
}

/// Args for the `splitsync init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The base URL of your ledger server, e.g. https://ledger.example.com
    #[arg(long)]
    server_url: String,

    /// The path to a file holding your API token. This file will be copied to the
    /// default secrets location in the main data directory.
    #[arg(long)]
    token_file: PathBuf,
}

impl InitArgs {
    pub fn new(server_url: impl Into<String>, token_file: impl Into<PathBuf>) -> Self {
        Self {
            server_url: server_url.into(),
            token_file: token_file.into(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn token_file(&self) -> &Path {
        &self.token_file
    }
}

/// Args for the `splitsync stage` command.
#[derive(Debug, Parser, Clone)]
pub struct StageArgs {
    /// The client-generated id correlating all legs of one not-yet-submitted group.
    #[arg(long)]
    master_id: i64,

    /// The kind of this leg.
    #[arg(long)]
    kind: TransactionKind,

    /// The amount of this leg, e.g. 12.50
    #[arg(long)]
    amount: Amount,

    /// A description of this leg.
    #[arg(long)]
    description: String,

    /// The date of this leg, e.g. 2026-08-05
    #[arg(long)]
    date: NaiveDate,

    /// The time of day, e.g. 14:30. Midnight when omitted.
    #[arg(long)]
    time: Option<String>,

    /// The source account name.
    #[arg(long)]
    source: Option<String>,

    /// The destination account name.
    #[arg(long)]
    destination: String,

    /// The currency code, e.g. USD
    #[arg(long)]
    currency: String,

    /// The category name.
    #[arg(long)]
    category: Option<String>,

    /// The budget name.
    #[arg(long)]
    budget: Option<String>,

    /// The bill name.
    #[arg(long)]
    bill: Option<String>,

    /// The piggy bank name.
    #[arg(long)]
    piggy_bank: Option<String>,

    /// Comma-separated free-text tags.
    #[arg(long)]
    tags: Option<String>,

    /// Free-text notes.
    #[arg(long)]
    notes: Option<String>,

    /// A locally-staged attachment URI; may be given multiple times. Uploads happen
    /// after the group is committed.
    #[arg(long = "attach")]
    attachments: Vec<String>,
}

impl StageArgs {
    pub fn new(
        master_id: i64,
        kind: TransactionKind,
        amount: Amount,
        description: impl Into<String>,
        date: NaiveDate,
        destination: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            master_id,
            kind,
            amount,
            description: description.into(),
            date,
            time: None,
            source: None,
            destination: destination.into(),
            currency: currency.into(),
            category: None,
            budget: None,
            bill: None,
            piggy_bank: None,
            tags: None,
            notes: None,
            attachments: Vec::new(),
        }
    }

    pub fn master_id(&self) -> i64 {
        self.master_id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn budget(&self) -> Option<&str> {
        self.budget.as_deref()
    }

    pub fn bill(&self) -> Option<&str> {
        self.bill.as_deref()
    }

    pub fn piggy_bank(&self) -> Option<&str> {
        self.piggy_bank.as_deref()
    }

    pub fn tags(&self) -> Option<&str> {
        self.tags.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn attachments(&self) -> &[String] {
        &self.attachments
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Args for the `splitsync submit` command.
#[derive(Debug, Parser, Clone)]
pub struct SubmitArgs {
    /// The master id whose staged legs should be submitted as one group.
    #[arg(long)]
    master_id: i64,

    /// The user-visible title of the transaction group.
    #[arg(long)]
    title: String,
}

impl SubmitArgs {
    pub fn new(master_id: i64, title: impl Into<String>) -> Self {
        Self {
            master_id,
            title: title.into(),
        }
    }

    pub fn master_id(&self) -> i64 {
        self.master_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

/// The date-range/kind window shared by refresh and the report subcommands.
#[derive(Debug, Parser, Clone, Default)]
pub struct WindowArgs {
    /// The first day of the window, e.g. 2026-08-01. Requires --end.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// The last day of the window (inclusive), e.g. 2026-08-31. Requires --start.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Restrict to one transaction kind.
    #[arg(long, default_value_t = KindFilter::All)]
    kind: KindFilter,
}

impl WindowArgs {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>, kind: KindFilter) -> Self {
        Self { start, end, kind }
    }

    pub fn kind(&self) -> KindFilter {
        self.kind
    }

    /// The date range, or `None` for an unscoped window. Giving only one bound is an
    /// error.
    pub fn range(&self) -> Result<Option<DateRange>> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => {
                if end < start {
                    bail!("--end must not be before --start");
                }
                Ok(Some(DateRange::new(start, end)))
            }
            (None, None) => Ok(None),
            _ => bail!("--start and --end must be given together"),
        }
    }
}

/// Args for the `splitsync refresh` command.
#[derive(Debug, Parser, Clone)]
pub struct RefreshArgs {
    #[clap(flatten)]
    window: WindowArgs,
}

impl RefreshArgs {
    pub fn new(window: WindowArgs) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &WindowArgs {
        &self.window
    }
}

/// Args for the `splitsync report` command.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    #[command(subcommand)]
    report: ReportSubcommand,
}

impl ReportArgs {
    pub fn new(report: ReportSubcommand) -> Self {
        Self { report }
    }

    pub fn report(&self) -> &ReportSubcommand {
        &self.report
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ReportSubcommand {
    /// The number of mirrored transactions in the window.
    Count {
        #[clap(flatten)]
        window: WindowArgs,
    },
    /// The sum of one currency's transactions in the window.
    SumCurrency {
        #[clap(flatten)]
        window: WindowArgs,
        /// The currency code to sum, e.g. USD
        #[arg(long)]
        currency: String,
    },
    /// The sum of the transactions carrying a tag, in one currency.
    SumTag {
        #[clap(flatten)]
        window: WindowArgs,
        #[arg(long)]
        currency: String,
        /// The tag to match.
        #[arg(long)]
        tag: String,
    },
    /// The sum of the transactions assigned to a budget, in one currency.
    SumBudget {
        #[clap(flatten)]
        window: WindowArgs,
        #[arg(long)]
        currency: String,
        /// The budget to match.
        #[arg(long)]
        budget: String,
    },
    /// The distinct categories in the window with their sums.
    Categories {
        #[clap(flatten)]
        window: WindowArgs,
        #[arg(long)]
        currency: String,
    },
    /// The distinct budgets in the window with their sums.
    Budgets {
        #[clap(flatten)]
        window: WindowArgs,
        #[arg(long)]
        currency: String,
    },
    /// The distinct account names in the window.
    Accounts {
        #[clap(flatten)]
        window: WindowArgs,
    },
}

/// Args for the `splitsync delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The journal id of the transaction to delete.
    #[arg(long)]
    id: i64,
}

impl DeleteArgs {
    pub fn new(id: i64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> i64 {
        self.id
    }
}

/// Args for the `splitsync attachments` command.
#[derive(Debug, Parser, Clone)]
pub struct AttachmentsArgs {
    /// The journal id whose attachments should be listed.
    #[arg(long)]
    id: i64,
}

impl AttachmentsArgs {
    pub fn new(id: i64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> i64 {
        self.id
    }
}

/// Args for the `splitsync search` command.
#[derive(Debug, Parser, Clone)]
pub struct SearchArgs {
    /// The text to look for in transaction descriptions.
    #[arg(long)]
    query: String,
}

impl SearchArgs {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

fn default_splitsync_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("splitsync"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --splitsync-home or SPLITSYNC_HOME instead of relying on the \
                default splitsync home directory. If you continue using the program right now, \
                you may have problems!",
            );
            PathBuf::from("splitsync")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
