use clap::Parser;
use std::path::PathBuf;

/// Default path of the backlog workbook (sheet 0 = backorder, sheet 1 = shipment).
pub const DEFAULT_BACKLOG_PATH: &str = "ASI_Daily_Backlog.xlsx";

/// Default path of the planning workbook (wide forecast table).
pub const DEFAULT_PLANNING_PATH: &str = "Planning.xlsx";

/// Default path of the lead-time workbook (SKU ↔ ST Model cross-reference).
pub const DEFAULT_LEAD_TIME_PATH: &str = "Lead_Time.xlsx";

// https://stackoverflow.com/questions/74068168/clap-rs-not-printing-colors-during-help
fn get_styles() -> clap::builder::Styles {
    let cyan = anstyle::Color::Ansi(anstyle::AnsiColor::Cyan);
    let green = anstyle::Color::Ansi(anstyle::AnsiColor::Green);
    let yellow = anstyle::Color::Ansi(anstyle::AnsiColor::Yellow);

    clap::builder::Styles::styled()
        .placeholder(anstyle::Style::new().fg_color(Some(yellow)))
        .usage(anstyle::Style::new().fg_color(Some(cyan)).bold())
        .header(
            anstyle::Style::new()
                .fg_color(Some(cyan))
                .bold()
                .underline(),
        )
        .literal(anstyle::Style::new().fg_color(Some(green)))
}

// https://docs.rs/clap/latest/clap/struct.Command.html#method.help_template
const APPLET_TEMPLATE: &str = "\
{before-help}
{about-with-newline}
{usage-heading} {usage}

{all-args}
{after-help}";

const EX1: &str = r#" backlog-view"#;
const EX2: &str = r#" backlog-view -b data/ASI_Daily_Backlog.xlsx"#;
const EX3: &str = r#" backlog-view -b backlog.xlsx -p planning.xlsx -l lead_time.xlsx"#;
const EX4: &str = r#" RUST_LOG=debug backlog-view"#;

/// Command-line arguments for the Backlog View application.
///
/// The three workbook paths are environment-specific configuration; every
/// other aspect of the dashboard (filters, selections) lives in the UI.
#[derive(Parser, Debug, Clone)]
#[command(
    // Read from `Cargo.toml`.
    author, version, about,
    long_about = None,
    next_line_help = true,
    help_template = APPLET_TEMPLATE,
    styles=get_styles(),
    after_help = format!("EXAMPLES:\n{EX1}\n{EX2}\n{EX3}\n{EX4}")
)]
pub struct Arguments {
    /// Path to the backlog workbook. [Default: ASI_Daily_Backlog.xlsx]
    #[arg(
        short = 'b',
        long,
        value_name = "FILE_PATH",
        default_value = DEFAULT_BACKLOG_PATH,
        help = "Path to the daily backlog workbook",
        long_help = "Path to the daily backlog workbook.\n\
        Sheet 0 holds the backorder records, sheet 1 the shipment records."
    )]
    pub backlog: PathBuf,

    /// Path to the planning workbook. [Default: Planning.xlsx]
    #[arg(
        short = 'p',
        long,
        value_name = "FILE_PATH",
        default_value = DEFAULT_PLANNING_PATH,
        help = "Path to the planning workbook",
        long_help = "Path to the planning workbook: one wide sheet with\n\
        'Product ST Model Num', 'Key Figure' and month/quarter columns."
    )]
    pub planning: PathBuf,

    /// Path to the lead-time workbook. [Default: Lead_Time.xlsx]
    #[arg(
        short = 'l',
        long = "lead-time",
        value_name = "FILE_PATH",
        default_value = DEFAULT_LEAD_TIME_PATH,
        help = "Path to the lead-time workbook",
        long_help = "Path to the lead-time workbook: the SKU to ST MODEL\n\
        cross-reference table, also carrying the ETA and Note columns."
    )]
    pub lead_time: PathBuf,
}

impl Arguments {
    /// Build `Arguments` struct.
    pub fn build() -> Arguments {
        Arguments::parse()
    }
}

//----------------------------------------------------------------------------//
//                                   Tests                                    //
//----------------------------------------------------------------------------//
