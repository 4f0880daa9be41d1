use std::{
    env, fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use shared::{
    domain::{AccountId, BoardId, ItemId},
    protocol::ItemMutation,
};
use storage::Storage;

const WRITERS: usize = 8;

fn scratch_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    env::temp_dir().join(format!("kanban_{label}_{nanos}"))
}

async fn file_storage(root: &Path) -> (Storage, AccountId, BoardId) {
    let db_file = root.join("boards.db");
    let url = format!("sqlite://{}", db_file.to_string_lossy().replace('\\', "/"));
    let storage = Storage::new(&url).await.expect("db");
    let owner = storage
        .create_account("owner@example.com")
        .await
        .expect("owner");
    let board = storage
        .create_board(&owner.id, "Busy", "#ff0000")
        .await
        .expect("board");
    (storage, owner.id, board.board_id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_column_creates_all_land_with_distinct_orders() {
    let root = scratch_dir("concurrent_columns");
    let (storage, owner, board) = file_storage(&root).await;

    let tasks: Vec<_> = (0..WRITERS)
        .map(|n| {
            let storage = storage.clone();
            let owner = owner.clone();
            tokio::spawn(async move {
                storage
                    .create_column(board, &owner, &format!("Column {n}"))
                    .await
            })
        })
        .collect();

    let mut orders = Vec::new();
    for task in tasks {
        let column = task
            .await
            .expect("join")
            .expect("create column")
            .expect("owned");
        orders.push(column.order);
    }
    orders.sort_by(f64::total_cmp);
    let expected: Vec<f64> = (1..=WRITERS).map(|n| n as f64).collect();
    assert_eq!(orders, expected);

    drop(storage);
    fs::remove_dir_all(root).expect("cleanup");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_card_moves_all_succeed_and_last_write_wins() {
    let root = scratch_dir("concurrent_moves");
    let (storage, owner, board) = file_storage(&root).await;
    let from = storage
        .create_column(board, &owner, "From")
        .await
        .expect("column")
        .expect("owned");
    let to = storage
        .create_column(board, &owner, "To")
        .await
        .expect("column")
        .expect("owned");

    let mut cards = Vec::new();
    for n in 0..WRITERS {
        let id = storage
            .upsert_item(
                board,
                &owner,
                &ItemMutation {
                    id: None,
                    column_id: from.column_id.clone(),
                    order: (n + 1) as f64,
                    title: format!("card {n}"),
                },
            )
            .await
            .expect("upsert")
            .expect("created");
        cards.push(id);
    }

    let moves: Vec<_> = cards
        .iter()
        .enumerate()
        .map(|(n, id)| {
            let storage = storage.clone();
            let owner = owner.clone();
            let mutation = ItemMutation {
                id: Some(id.clone()),
                column_id: to.column_id.clone(),
                order: (n + 1) as f64,
                title: format!("card {n}"),
            };
            tokio::spawn(async move { storage.upsert_item(board, &owner, &mutation).await })
        })
        .collect();
    for task in moves {
        task.await.expect("join").expect("move").expect("owned");
    }

    // Rapid successive moves of one card: every write is accepted.
    let hot: ItemId = cards[0].clone();
    let storm: Vec<_> = (0..WRITERS)
        .map(|n| {
            let storage = storage.clone();
            let owner = owner.clone();
            let mutation = ItemMutation {
                id: Some(hot.clone()),
                column_id: from.column_id.clone(),
                order: 10.0 + n as f64,
                title: "card 0".into(),
            };
            tokio::spawn(async move { storage.upsert_item(board, &owner, &mutation).await })
        })
        .collect();
    for task in storm {
        task.await.expect("join").expect("move").expect("owned");
    }

    let contents = storage
        .load_board(board, &owner)
        .await
        .expect("load")
        .expect("owned");
    assert_eq!(contents.items.len(), WRITERS);
    let in_to = contents
        .items
        .iter()
        .filter(|item| item.column_id == to.column_id)
        .count();
    assert_eq!(in_to, WRITERS - 1);
    let hot_row = contents
        .items
        .iter()
        .find(|item| item.item_id == hot)
        .expect("hot card");
    assert_eq!(hot_row.column_id, from.column_id);
    assert!(hot_row.order >= 10.0);

    drop(storage);
    fs::remove_dir_all(root).expect("cleanup");
}
