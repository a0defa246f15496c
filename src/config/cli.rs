//! Command-line surface for the `agora` binary.

use std::fmt;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};

use crate::application::query::{QueryOptions, SortOrder};

/// Command-line arguments for the Agora binary.
#[derive(Debug, Parser)]
#[command(name = "agora", version, about = "Agora entity service operator CLI")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "AGORA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Check database connectivity.
    Health,
    /// Fetch one entity by id.
    Get(GetArgs),
    /// Search an entity table by its searchable fields.
    Search(SearchArgs),
    /// List entities related to one entity through a junction table.
    Related(RelatedArgs),
}

/// Settings overrides accepted before or after the subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT", global = true)]
    pub database_max_connections: Option<u32>,

    /// Toggle the entity cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_enabled: Option<bool>,

    /// Override the default cache TTL.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS", global = true)]
    pub cache_ttl_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    #[arg(value_enum)]
    pub entity: EntityKind,

    pub id: String,
}

#[derive(Debug, Args, Clone)]
pub struct SearchArgs {
    #[arg(value_enum)]
    pub entity: EntityKind,

    /// Case-insensitive substring; empty lists everything.
    #[arg(default_value = "")]
    pub query: String,

    /// Search these columns instead of the entity's defaults.
    #[arg(long = "field", value_name = "COLUMN")]
    pub fields: Vec<String>,

    /// Include soft-deleted rows.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub include_deleted: bool,

    #[command(flatten)]
    pub listing: ListingArgs,
}

#[derive(Debug, Args, Clone)]
pub struct RelatedArgs {
    #[arg(value_enum)]
    pub entity: EntityKind,

    pub id: String,

    #[arg(value_enum)]
    pub relation: RelationKind,

    #[command(flatten)]
    pub listing: ListingArgs,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ListingArgs {
    /// 1-based page number.
    #[arg(long, value_name = "N")]
    pub page: Option<u32>,

    #[arg(long = "page-size", value_name = "N")]
    pub page_size: Option<u32>,

    #[arg(long = "sort-by", value_name = "COLUMN")]
    pub sort_by: Option<String>,

    #[arg(long = "sort-order", value_enum, value_name = "ORDER")]
    pub sort_order: Option<SortOrderArg>,
}

impl ListingArgs {
    pub fn to_query(&self) -> QueryOptions {
        QueryOptions {
            page: self.page,
            page_size: self.page_size,
            sort_by: self.sort_by.clone(),
            sort_order: self.sort_order.map(SortOrder::from),
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EntityKind {
    #[value(alias = "organizacion")]
    Organizations,
    #[value(alias = "proyecto")]
    Projects,
    #[value(alias = "tema")]
    Themes,
    #[value(alias = "persona")]
    People,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Organizations => "organizations",
            Self::Projects => "projects",
            Self::Themes => "themes",
            Self::People => "people",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RelationKind {
    Themes,
    Projects,
    Organizations,
    Authors,
}

impl RelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Themes => "themes",
            Self::Projects => "projects",
            Self::Organizations => "organizations",
            Self::Authors => "authors",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SortOrderArg {
    Asc,
    Desc,
}

impl From<SortOrderArg> for SortOrder {
    fn from(arg: SortOrderArg) -> Self {
        match arg {
            SortOrderArg::Asc => SortOrder::Asc,
            SortOrderArg::Desc => SortOrder::Desc,
        }
    }
}
