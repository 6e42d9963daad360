use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use inkpad_core::models::Priority;
use inkpad_core::NoteType;

#[derive(Parser)]
#[command(name = "inkpad")]
#[command(about = "Markdown, rich-text and todo notes synced through Supabase")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name for backend and auth configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List notes by group
    #[command(alias = "ls")]
    List {
        /// Only show notes in this group (id, prefix, name or "ungrouped")
        #[arg(short, long, value_name = "GROUP")]
        group: Option<String>,
        /// Number of notes to show per section
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a note with its tasks
    Show {
        /// Note ID or unique ID prefix
        id: String,
        /// Strip rich-text markup from the content
        #[arg(long)]
        plain: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a new note
    #[command(alias = "add")]
    New {
        /// Note type; fixed once created
        #[arg(short = 't', long = "type", value_enum, default_value_t = NoteKind::Markdown)]
        kind: NoteKind,
        /// Note title
        #[arg(long)]
        title: Option<String>,
        /// Group id, prefix or name
        #[arg(short, long, value_name = "GROUP")]
        group: Option<String>,
        /// Initial content; one task per line for todo notes
        content: Vec<String>,
    },
    /// Edit note content in $EDITOR
    Edit {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Change a note title
    Rename {
        /// Note ID or unique ID prefix
        id: String,
        /// New title
        title: Vec<String>,
    },
    /// Delete a note
    #[command(alias = "rm")]
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Move a note to a group, or to "ungrouped"
    Move {
        /// Note ID or unique ID prefix
        id: String,
        /// Group id, prefix or name, or "ungrouped"
        target: String,
    },
    /// Manage tasks inside a note
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage groups
    Group {
        #[command(subcommand)]
        command: GroupCommands,
    },
    /// Upload an image and append it to a note
    Upload {
        /// Note ID or unique ID prefix
        id: String,
        /// Image file (jpg, jpeg, png, gif or webp)
        path: PathBuf,
    },
    /// Show pending and completed tasks across notes
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow remote changes until interrupted
    Watch {
        /// Reload the whole collection on every change instead of patching rows
        #[arg(long)]
        refetch: bool,
    },
    /// Export notes
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Authenticate CLI profile with Supabase
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum NoteKind {
    Markdown,
    #[value(alias = "rich-text", alias = "html")]
    Richtext,
    Todo,
}

impl From<NoteKind> for NoteType {
    fn from(kind: NoteKind) -> Self {
        match kind {
            NoteKind::Markdown => Self::Markdown,
            NoteKind::Richtext => Self::RichText,
            NoteKind::Todo => Self::Todo,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(priority: PriorityArg) -> Self {
        match priority {
            PriorityArg::Low => Self::Low,
            PriorityArg::Medium => Self::Medium,
            PriorityArg::High => Self::High,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for inkpad_core::export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Append a task to a note
    Add {
        /// Note ID or unique ID prefix
        note: String,
        /// Task text; defaults to "New task" due today
        text: Vec<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        due: Option<String>,
        /// Task priority
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
    },
    /// Flip a task between done and pending
    Toggle {
        /// Note ID or unique ID prefix
        note: String,
        /// Task ID prefix or 1-based position
        task: String,
    },
    /// Change task fields
    Set {
        /// Note ID or unique ID prefix
        note: String,
        /// Task ID prefix or 1-based position
        task: String,
        /// New task text
        #[arg(long)]
        text: Option<String>,
        /// Due date (YYYY-MM-DD); an empty value clears it
        #[arg(long, value_name = "DATE")]
        due: Option<String>,
        /// Task priority
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
        /// Mark done or pending
        #[arg(long)]
        done: Option<bool>,
    },
    /// Remove a task from a note
    Remove {
        /// Note ID or unique ID prefix
        note: String,
        /// Task ID prefix or 1-based position
        task: String,
    },
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// List groups with note counts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a group
    Add {
        /// Group name
        name: String,
        /// Hex display color
        #[arg(long, default_value = inkpad_core::models::DEFAULT_GROUP_COLOR)]
        color: String,
    },
    /// Rename or recolor a group
    Rename {
        /// Group id, prefix or name
        group: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New hex color
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a group; its notes become ungrouped
    Delete {
        /// Group id, prefix or name
        group: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Storage bucket for uploaded images
        #[arg(long, value_name = "BUCKET")]
        image_bucket: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile config
    Show {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Login with Supabase email/password and store session in keychain
    Login {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Supabase account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Create a Supabase account for this profile
    Signup {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show auth status for profile
    Status {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Logout profile and clear stored session
    Logout {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}
