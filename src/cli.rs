use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

/// studio-notify, notification feed client for the Studio platform
#[derive(Parser)]
#[command(name = "studio-notify", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect the push channel and tail the live feed
    Watch,

    /// List notifications, paginated
    List {
        #[arg(short, long, default_value = "0")]
        page: u32,
        #[arg(short, long)]
        size: Option<u32>,
        #[arg(long, default_value = "createdAt")]
        sort_by: String,
        #[arg(long, value_enum, default_value = "desc")]
        sort_direction: SortDirectionArg,
        /// Only unread entries
        #[arg(long)]
        unread: bool,
    },

    /// Show the most recent notifications
    Recent {
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Show the server-computed unread count
    UnreadCount,

    /// Mark one notification as read
    MarkRead { id: Uuid },

    /// Mark every notification as read
    MarkAllRead {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete one notification
    Delete {
        id: Uuid,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortDirectionArg {
    Asc,
    Desc,
}

impl From<SortDirectionArg> for studio_notify::api::SortDirection {
    fn from(value: SortDirectionArg) -> Self {
        match value {
            SortDirectionArg::Asc => Self::Asc,
            SortDirectionArg::Desc => Self::Desc,
        }
    }
}
