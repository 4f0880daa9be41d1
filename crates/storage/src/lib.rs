use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::Path,
    str::FromStr,
    time::Duration,
};

use shared::{
    domain::{Account, AccountId, BoardId, ColumnId, ItemId},
    protocol::ItemMutation,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredBoard {
    pub board_id: BoardId,
    pub account_id: AccountId,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredColumn {
    pub column_id: ColumnId,
    pub board_id: BoardId,
    pub name: String,
    pub order: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub item_id: ItemId,
    pub board_id: BoardId,
    pub column_id: ColumnId,
    pub title: String,
    pub content: Option<String>,
    pub order: f64,
}

/// A board with everything on it. Columns come back sorted by order, items in
/// insertion order; callers sort items for display.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBoardContents {
    pub board: StoredBoard,
    pub columns: Vec<StoredColumn>,
    pub items: Vec<StoredItem>,
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const OWNED_BOARDS: &str = "SELECT id FROM boards WHERE account_id = ?";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_account(&self, email: &str) -> Result<Account> {
        let email = normalize_email(email);
        let account_id = AccountId::generate();
        sqlx::query("INSERT INTO accounts (id, email) VALUES (?, ?)")
            .bind(account_id.as_str())
            .bind(&email)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to create account for '{email}'"))?;
        Ok(Account {
            id: account_id,
            email,
        })
    }

    pub async fn account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT id, email FROM accounts WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Account {
            id: AccountId(r.get::<String, _>(0)),
            email: r.get::<String, _>(1),
        }))
    }

    pub async fn account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT id, email FROM accounts WHERE id = ?")
            .bind(account_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Account {
            id: AccountId(r.get::<String, _>(0)),
            email: r.get::<String, _>(1),
        }))
    }

    pub async fn list_boards_for_account(&self, account_id: &AccountId) -> Result<Vec<StoredBoard>> {
        let rows = sqlx::query(
            "SELECT id, account_id, name, color, created_at
             FROM boards
             WHERE account_id = ?
             ORDER BY id ASC",
        )
        .bind(account_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(board_from_row).collect())
    }

    pub async fn create_board(
        &self,
        account_id: &AccountId,
        name: &str,
        color: &str,
    ) -> Result<StoredBoard> {
        let row = sqlx::query(
            "INSERT INTO boards (account_id, name, color) VALUES (?, ?, ?)
             RETURNING id, account_id, name, color, created_at",
        )
        .bind(account_id.as_str())
        .bind(name)
        .bind(color)
        .fetch_one(&self.pool)
        .await
        .context("failed to create board")?;
        Ok(board_from_row(&row))
    }

    /// Deletes the board with its columns and items. `false` when the board
    /// does not exist or belongs to someone else.
    pub async fn delete_board(&self, board_id: BoardId, account_id: &AccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM boards WHERE id = ? AND account_id = ?")
            .bind(board_id.0)
            .bind(account_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn board_for_account(
        &self,
        board_id: BoardId,
        account_id: &AccountId,
    ) -> Result<Option<StoredBoard>> {
        let row = sqlx::query(
            "SELECT id, account_id, name, color, created_at
             FROM boards
             WHERE id = ? AND account_id = ?",
        )
        .bind(board_id.0)
        .bind(account_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(board_from_row))
    }

    pub async fn load_board(
        &self,
        board_id: BoardId,
        account_id: &AccountId,
    ) -> Result<Option<StoredBoardContents>> {
        let Some(board) = self.board_for_account(board_id, account_id).await? else {
            return Ok(None);
        };

        let column_rows = sqlx::query(
            "SELECT id, board_id, name, sort_order
             FROM board_columns
             WHERE board_id = ?
             ORDER BY sort_order ASC, rowid ASC",
        )
        .bind(board_id.0)
        .fetch_all(&self.pool)
        .await?;

        let item_rows = sqlx::query(
            "SELECT id, board_id, column_id, title, content, sort_order
             FROM items
             WHERE board_id = ?
             ORDER BY rowid ASC",
        )
        .bind(board_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(StoredBoardContents {
            board,
            columns: column_rows.iter().map(column_from_row).collect(),
            items: item_rows.iter().map(item_from_row).collect(),
        }))
    }

    pub async fn update_board_name(
        &self,
        board_id: BoardId,
        account_id: &AccountId,
        name: &str,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE boards SET name = ? WHERE id = ? AND account_id = ?")
            .bind(name)
            .bind(board_id.0)
            .bind(account_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Appends a column after the existing ones (`order = count + 1`).
    ///
    /// Ownership check, count and insert are one statement, so concurrent
    /// creates on a board serialize on the write lock instead of racing a
    /// read lock upgrade.
    pub async fn create_column(
        &self,
        board_id: BoardId,
        account_id: &AccountId,
        name: &str,
    ) -> Result<Option<StoredColumn>> {
        let column_id = ColumnId::generate();
        let order: Option<f64> = sqlx::query_scalar(
            "INSERT INTO board_columns (id, board_id, name, sort_order)
             SELECT ?, b.id, ?,
                    (SELECT COUNT(*) FROM board_columns c WHERE c.board_id = b.id) + 1
             FROM boards b
             WHERE b.id = ? AND b.account_id = ?
             RETURNING sort_order",
        )
        .bind(column_id.as_str())
        .bind(name)
        .bind(board_id.0)
        .bind(account_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("failed to insert column")?;

        Ok(order.map(|order| StoredColumn {
            column_id,
            board_id,
            name: name.to_string(),
            order,
        }))
    }

    pub async fn update_column_name(
        &self,
        column_id: &ColumnId,
        account_id: &AccountId,
        name: &str,
    ) -> Result<bool> {
        let result = sqlx::query(&format!(
            "UPDATE board_columns SET name = ? WHERE id = ? AND board_id IN ({OWNED_BOARDS})"
        ))
        .bind(name)
        .bind(column_id.as_str())
        .bind(account_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Writes the item row in one statement. Without `mutation.id` a fresh id
    /// is minted; with one, the row is created under that id or replaced
    /// whole when it already sits on an owned board. Returns `None` when the
    /// target column is not on an owned `board_id`, or when the id belongs to
    /// another account's item.
    pub async fn upsert_item(
        &self,
        board_id: BoardId,
        account_id: &AccountId,
        mutation: &ItemMutation,
    ) -> Result<Option<ItemId>> {
        let item_id = mutation.id.clone().unwrap_or_else(ItemId::generate);
        let written: Option<String> = sqlx::query_scalar(&format!(
            "INSERT INTO items (id, board_id, column_id, title, content, sort_order)
             SELECT ?, c.board_id, c.id, ?, NULL, ?
             FROM board_columns c
             INNER JOIN boards b ON b.id = c.board_id
             WHERE c.id = ? AND b.id = ? AND b.account_id = ?
             ON CONFLICT(id) DO UPDATE SET
                 board_id = excluded.board_id,
                 column_id = excluded.column_id,
                 sort_order = excluded.sort_order,
                 title = excluded.title
             WHERE items.board_id IN ({OWNED_BOARDS})
             RETURNING id"
        ))
        .bind(item_id.as_str())
        .bind(&mutation.title)
        .bind(mutation.order)
        .bind(mutation.column_id.as_str())
        .bind(board_id.0)
        .bind(account_id.as_str())
        .bind(account_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("failed to write item")?;

        Ok(written.map(ItemId))
    }
}

fn board_from_row(r: &SqliteRow) -> StoredBoard {
    StoredBoard {
        board_id: BoardId(r.get::<i64, _>(0)),
        account_id: AccountId(r.get::<String, _>(1)),
        name: r.get::<String, _>(2),
        color: r.get::<String, _>(3),
        created_at: r.get::<DateTime<Utc>, _>(4),
    }
}

fn column_from_row(r: &SqliteRow) -> StoredColumn {
    StoredColumn {
        column_id: ColumnId(r.get::<String, _>(0)),
        board_id: BoardId(r.get::<i64, _>(1)),
        name: r.get::<String, _>(2),
        order: r.get::<f64, _>(3),
    }
}

fn item_from_row(r: &SqliteRow) -> StoredItem {
    StoredItem {
        item_id: ItemId(r.get::<String, _>(0)),
        board_id: BoardId(r.get::<i64, _>(1)),
        column_id: ColumnId(r.get::<String, _>(2)),
        title: r.get::<String, _>(3),
        content: r.get::<Option<String>, _>(4),
        order: r.get::<f64, _>(5),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// File databases get their directory created; memory and non-sqlite urls
/// are left alone.
fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    if database_url.starts_with("sqlite::memory:") {
        return Ok(());
    }
    let Some(rest) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };
    let file = Path::new(rest.split_once('?').map_or(rest, |(file, _)| file));
    match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .with_context(|| format!("creating database directory {}", dir.display())),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
