use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use quire::{parser::parse_date, search::SearchFilters};

#[derive(Debug, Parser)]
#[command(
    name = "quire",
    about = "Browse and search a directory of Markdown documents"
)]
pub struct Cli {
    /// Content directory (defaults to $QUIRE_CONTENT_DIR, then the XDG
    /// data directory)
    #[arg(long, global = true)]
    pub content_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List published documents, newest first
    List(ListArgs),
    /// Print one document
    Show(ShowArgs),
    /// Full-text search over published documents
    Search(SearchArgs),
    /// Search document titles only
    Titles(QueryArgs),
    /// Suggest completions for a partial query
    Suggest(QueryArgs),
    /// Tag usage counts
    Tags(OutputArgs),
    /// Category usage counts
    Categories(OutputArgs),
    /// Content statistics
    Stats(OutputArgs),
    /// List drafts
    Drafts(OutputArgs),
    /// Publish a draft
    Publish(SlugArgs),
    /// Turn a published document back into a draft
    Unpublish(SlugArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct OutputArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct SlugArgs {
    pub slug: String,
}

// -- List --

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Only documents with this tag
    #[arg(short, long, conflicts_with = "category")]
    pub tag: Option<String>,

    /// Only documents in this category
    #[arg(short, long)]
    pub category: Option<String>,

    /// Only featured documents
    #[arg(long, conflicts_with_all = ["tag", "category"])]
    pub featured: bool,

    /// Maximum number of documents (0 for all)
    #[arg(short = 'n', long, default_value = "0")]
    pub count: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Show --

#[derive(Debug, Parser)]
pub struct ShowArgs {
    pub slug: String,

    /// Also look up drafts
    #[arg(long)]
    pub draft: bool,

    /// Print the rendered HTML instead of the source body
    #[arg(long)]
    pub html: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Return every matching document
    #[arg(long)]
    pub all: bool,

    /// Return this page of results (1-based) instead of the top N
    #[arg(long)]
    pub page: Option<usize>,

    /// Only documents with one of these tags
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Only documents in one of these categories
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Only documents published on or after this date
    #[arg(long, value_parser = parse_date_arg)]
    pub from: Option<DateTime<Utc>>,

    /// Only documents published on or before this date
    #[arg(long, value_parser = parse_date_arg)]
    pub to: Option<DateTime<Utc>>,

    /// Only featured documents
    #[arg(long)]
    pub featured: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    /// Filters built from the flags, or `None` when no flag narrows the
    /// search.
    pub fn filters(&self) -> Option<SearchFilters> {
        let filters = SearchFilters {
            tags: self.tags.clone(),
            categories: self.categories.clone(),
            date_from: self.from,
            date_to: self.to,
            only_featured: self.featured,
        };
        let narrowed = !filters.tags.is_empty()
            || !filters.categories.is_empty()
            || filters.date_from.is_some()
            || filters.date_to.is_some()
            || filters.only_featured;
        narrowed.then_some(filters)
    }

    pub fn limit(&self) -> usize {
        if self.all { 0 } else { self.count }
    }
}

fn parse_date_arg(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_date(raw).ok_or_else(|| format!("unrecognized date {raw:?}"))
}

#[derive(Debug, Parser)]
pub struct QueryArgs {
    pub query: String,

    /// Maximum number of results (0 for all)
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "quire",
            &mut std::io::stdout(),
        );
    }
}
