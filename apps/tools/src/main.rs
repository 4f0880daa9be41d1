use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::board_view::compose;
use server_api::{
    session::{mint_token, SessionConfig},
    ApiContext,
};
use shared::{
    domain::{AccountId, BoardId},
    error::ApiException,
};
use storage::Storage;

/// Admin tasks against the board database: provisioning accounts and issuing
/// identity tokens for them.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/kanban.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateAccount {
        email: String,
    },
    IssueToken {
        email: String,
        #[arg(long, env = "APP__SESSION_SECRET", default_value = "dev-session-secret")]
        secret: String,
        #[arg(long, default_value_t = 7 * 24 * 3600)]
        ttl_seconds: i64,
    },
    CreateBoard {
        email: String,
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    ListBoards {
        email: String,
    },
    ShowBoard {
        email: String,
        board_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let api = ApiContext { storage };

    match cli.command {
        Command::CreateAccount { email } => {
            let account = server_api::create_account(&api, &email)
                .await
                .map_err(ApiException::from)?;
            println!("created account_id={} email={}", account.id, account.email);
        }
        Command::IssueToken {
            email,
            secret,
            ttl_seconds,
        } => {
            let owner = account_id(&api, &email).await?;
            let token = mint_token(
                &SessionConfig {
                    secret,
                    ttl_seconds,
                },
                &owner,
            )
            .context("failed to sign token")?;
            println!("{token}");
        }
        Command::CreateBoard { email, name, color } => {
            let owner = account_id(&api, &email).await?;
            let board = server_api::create_board(&api, &owner, &name, color.as_deref())
                .await
                .map_err(ApiException::from)?;
            println!("created board_id={} name={}", board.id, board.name);
        }
        Command::ListBoards { email } => {
            let owner = account_id(&api, &email).await?;
            for board in server_api::list_boards(&api, &owner)
                .await
                .map_err(ApiException::from)?
            {
                println!("{}\t{}\t{}", board.id, board.name, board.color);
            }
        }
        Command::ShowBoard { email, board_id } => {
            let owner = account_id(&api, &email).await?;
            let payload = server_api::get_board(&api, &owner, BoardId(board_id))
                .await
                .map_err(ApiException::from)?;
            let board = compose(&payload);
            println!("{} ({})", board.name, board.id);
            for column in &board.columns {
                println!("  [{}] {} @{}", column.id, column.name, column.order);
                for item in &column.items {
                    println!("    - [{}] {} @{}", item.id, item.title, item.order);
                }
            }
        }
    }

    Ok(())
}

async fn account_id(api: &ApiContext, email: &str) -> Result<AccountId> {
    let account = api
        .storage
        .account_by_email(email)
        .await?
        .ok_or_else(|| anyhow!("no account with email {email}"))?;
    Ok(account.id)
}
