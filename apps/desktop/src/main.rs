use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use client_core::{
    boards::BoardList,
    drag::{begin_drag, complete_drop, DropTarget},
    BoardSession, BoardSnapshot, EntityStore, HttpEntityStore, MutationRequest,
};
use shared::{
    domain::{BoardId, ColumnId, ItemId},
    order::DropHalf,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, env = "KANBAN_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    /// Identity token issued by `tools issue-token`.
    #[arg(long, env = "KANBAN_TOKEN")]
    token: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Boards,
    NewBoard {
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    DeleteBoard {
        board_id: i64,
    },
    Show {
        board_id: i64,
    },
    RenameBoard {
        board_id: i64,
        name: String,
    },
    AddColumn {
        board_id: i64,
        name: String,
    },
    RenameColumn {
        board_id: i64,
        column_id: String,
        name: String,
    },
    AddCard {
        board_id: i64,
        column_id: String,
        title: String,
    },
    /// Drop a card above or below another card, or at the end of a column.
    MoveCard {
        board_id: i64,
        card_id: String,
        #[arg(long, conflicts_with_all = ["after", "to_column"])]
        before: Option<String>,
        #[arg(long, conflicts_with = "to_column")]
        after: Option<String>,
        #[arg(long)]
        to_column: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let store = Arc::new(HttpEntityStore::connect(&args.server_url, args.token).await?);
    let owner = store.account().id.clone();
    info!(account = %store.account().email, "signed in");

    match args.command {
        Command::Boards => {
            let list = BoardList::load(store.as_ref(), &owner).await?;
            for board in list.visible() {
                println!("{}\t{}\t{}", board.id, board.name, board.color);
            }
        }
        Command::NewBoard { name, color } => {
            let board = store.create_board(&name, color.as_deref(), &owner).await?;
            println!("created board {} ({})", board.id, board.name);
        }
        Command::DeleteBoard { board_id } => {
            let mut list = BoardList::load(store.as_ref(), &owner).await?;
            list.delete(store.as_ref(), &owner, BoardId(board_id)).await?;
            println!("deleted board {board_id}; {} left", list.visible().len());
        }
        Command::Show { board_id } => {
            let session = open(&store, board_id).await?;
            render(&session.optimistic());
        }
        Command::RenameBoard { board_id, name } => {
            let mut session = open(&store, board_id).await?;
            apply(&mut session, &store, MutationRequest::RenameBoard { name }).await?;
        }
        Command::AddColumn { board_id, name } => {
            let mut session = open(&store, board_id).await?;
            apply(&mut session, &store, MutationRequest::CreateColumn { name }).await?;
        }
        Command::RenameColumn {
            board_id,
            column_id,
            name,
        } => {
            let mut session = open(&store, board_id).await?;
            let request = MutationRequest::RenameColumn {
                column_id: ColumnId(column_id),
                name,
            };
            apply(&mut session, &store, request).await?;
        }
        Command::AddCard {
            board_id,
            column_id,
            title,
        } => {
            let mut session = open(&store, board_id).await?;
            let request = MutationRequest::CreateCard {
                column_id: ColumnId(column_id),
                title,
                order: None,
            };
            apply(&mut session, &store, request).await?;
        }
        Command::MoveCard {
            board_id,
            card_id,
            before,
            after,
            to_column,
        } => {
            let mut session = open(&store, board_id).await?;
            let target = match (before, after, to_column) {
                (Some(item_id), _, _) => DropTarget::Card {
                    item_id: ItemId(item_id),
                    half: DropHalf::Top,
                },
                (_, Some(item_id), _) => DropTarget::Card {
                    item_id: ItemId(item_id),
                    half: DropHalf::Bottom,
                },
                (_, _, Some(column_id)) => DropTarget::EmptyColumn(ColumnId(column_id)),
                (None, None, None) => {
                    return Err(anyhow!("one of --before, --after or --to-column is required"))
                }
            };

            let view = session.optimistic();
            let card = view
                .item(&ItemId(card_id.clone()))
                .ok_or_else(|| anyhow!("card {card_id} is not on board {board_id}"))?;
            let request = complete_drop(&view, &begin_drag(card), target)?;
            apply(&mut session, &store, request).await?;
        }
    }

    Ok(())
}

async fn open(store: &Arc<HttpEntityStore>, board_id: i64) -> Result<BoardSession> {
    let session = BoardSession::open(store.as_ref(), store.clone(), BoardId(board_id)).await?;
    Ok(session)
}

async fn apply(
    session: &mut BoardSession,
    store: &Arc<HttpEntityStore>,
    request: MutationRequest,
) -> Result<()> {
    if session.dispatch(store.as_ref(), request).await?.is_none() {
        println!("nothing to change");
    }
    render(&session.optimistic());
    Ok(())
}

fn render(board: &BoardSnapshot) {
    println!("{} (board {})", board.name, board.id);
    for column in &board.columns {
        println!("  {} [{}]", column.name, column.id);
        if column.items.is_empty() {
            println!("    (empty)");
        }
        for item in &column.items {
            println!("    - {} [{}] @{}", item.title, item.id, item.order);
        }
    }
}
