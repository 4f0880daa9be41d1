//! Optimistic mutation dispatch for one open board.
//!
//! `begin` applies a mutation to the local view synchronously and hands back
//! the store call that confirms it. Calls own everything they need, so any
//! number can be in flight and they may finish in any order. `settle` records
//! each outcome; `refresh` replaces the confirmed snapshot wholesale.
//!
//! A mutation that names a provisional column or card whose create is still in
//! flight is held back until the create confirms, then released with the
//! canonical id.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    sync::Arc,
};

use shared::{
    domain::{AccountId, BoardId, ColumnId, ItemId, PROVISIONAL_PREFIX},
    order::{append_after, FIRST_ORDER},
    protocol::ItemMutation,
};
use tracing::{debug, info, warn};

use crate::{
    board_view::compose,
    error::{MutationError, StoreError},
    reducer::{derive, Mutation},
    snapshot::BoardSnapshot,
    transport::EntityStore,
    IdentityProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(pub u64);

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    OptimisticApplied,
    Confirmed,
    Failed,
}

/// What a caller asks for. Ids may be canonical or provisional.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRequest {
    CreateColumn {
        name: String,
    },
    RenameColumn {
        column_id: ColumnId,
        name: String,
    },
    /// `order: None` appends after the column's current last card.
    CreateCard {
        column_id: ColumnId,
        title: String,
        order: Option<f64>,
    },
    MoveCard {
        item_id: ItemId,
        title: String,
        target_column_id: ColumnId,
        order: f64,
    },
    RenameBoard {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum StoreOp {
    CreateColumn { name: String },
    RenameColumn { column_id: ColumnId, name: String },
    UpsertItem(ItemMutation),
    RenameBoard { name: String },
}

/// A pending store request, detached from the session that issued it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    mutation_id: MutationId,
    board_id: BoardId,
    owner: AccountId,
    op: StoreOp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    Column(ColumnId),
    Item(ItemId),
    Applied,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub mutation_id: MutationId,
    pub result: Result<Confirmation, StoreError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The request would not change anything; nothing was recorded.
    Unchanged,
    Issued(StoreCall),
    /// Applied locally; the store call waits for a provisional create.
    Deferred(MutationId),
}

impl StoreCall {
    pub fn mutation_id(&self) -> MutationId {
        self.mutation_id
    }

    pub fn kind(&self) -> &'static str {
        match &self.op {
            StoreOp::CreateColumn { .. } => "create_column",
            StoreOp::RenameColumn { .. } => "rename_column",
            StoreOp::UpsertItem(item) if item.id.is_none() => "create_card",
            StoreOp::UpsertItem(_) => "move_card",
            StoreOp::RenameBoard { .. } => "rename_board",
        }
    }

    pub async fn execute<S>(self, store: &S) -> CallOutcome
    where
        S: EntityStore + ?Sized,
    {
        let owner = &self.owner;
        let result = match &self.op {
            StoreOp::CreateColumn { name } => store
                .create_column(self.board_id, name, owner)
                .await
                .map(|column| Confirmation::Column(column.id)),
            StoreOp::RenameColumn { column_id, name } => store
                .update_column_name(column_id, name, owner)
                .await
                .map(|()| Confirmation::Applied),
            StoreOp::UpsertItem(item) => store
                .upsert_item(item, owner, self.board_id)
                .await
                .map(Confirmation::Item),
            StoreOp::RenameBoard { name } => store
                .update_board_name(self.board_id, name, owner)
                .await
                .map(|()| Confirmation::Applied),
        };
        CallOutcome {
            mutation_id: self.mutation_id,
            result,
        }
    }

    fn referenced_ids(&self) -> Vec<&str> {
        match &self.op {
            StoreOp::CreateColumn { .. } | StoreOp::RenameBoard { .. } => Vec::new(),
            StoreOp::RenameColumn { column_id, .. } => vec![column_id.as_str()],
            StoreOp::UpsertItem(item) => {
                let mut ids = vec![item.column_id.as_str()];
                ids.extend(item.id.as_ref().map(ItemId::as_str));
                ids
            }
        }
    }

    fn waits_on_provisional(&self) -> bool {
        self.referenced_ids()
            .iter()
            .any(|id| id.starts_with(PROVISIONAL_PREFIX))
    }

    fn rewrite(&mut self, aliases: &HashMap<String, String>) {
        match &mut self.op {
            StoreOp::CreateColumn { .. } | StoreOp::RenameBoard { .. } => {}
            StoreOp::RenameColumn { column_id, .. } => rewrite_id(&mut column_id.0, aliases),
            StoreOp::UpsertItem(item) => {
                rewrite_id(&mut item.column_id.0, aliases);
                if let Some(id) = item.id.as_mut() {
                    rewrite_id(&mut id.0, aliases);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct PendingMutation {
    id: MutationId,
    mutation: Mutation,
    state: MutationState,
}

impl PendingMutation {
    /// Provisional id this mutation creates, while it is still provisional.
    fn created_id(&self) -> Option<&str> {
        let id = match &self.mutation {
            Mutation::CreateColumn { id, .. } => id.as_str(),
            Mutation::CreateCard { id, .. } => id.as_str(),
            _ => return None,
        };
        id.starts_with(PROVISIONAL_PREFIX).then_some(id)
    }
}

pub struct BoardSession {
    board_id: BoardId,
    identity: Arc<dyn IdentityProvider>,
    confirmed: BoardSnapshot,
    pending: Vec<PendingMutation>,
    deferred: Vec<StoreCall>,
    /// provisional id -> canonical id, for both columns and cards.
    aliases: HashMap<String, String>,
    /// Provisional ids whose create failed.
    abandoned: HashSet<String>,
    next_provisional: u64,
    next_mutation: u64,
}

impl BoardSession {
    pub fn new(identity: Arc<dyn IdentityProvider>, confirmed: BoardSnapshot) -> Self {
        Self {
            board_id: confirmed.id,
            identity,
            confirmed,
            pending: Vec::new(),
            deferred: Vec::new(),
            aliases: HashMap::new(),
            abandoned: HashSet::new(),
            next_provisional: 1,
            next_mutation: 1,
        }
    }

    pub async fn open<S>(
        store: &S,
        identity: Arc<dyn IdentityProvider>,
        board_id: BoardId,
    ) -> Result<Self, MutationError>
    where
        S: EntityStore + ?Sized,
    {
        let owner = identity
            .current_user_id()
            .ok_or(MutationError::Unauthenticated)?;
        let payload = store.get_board(board_id, &owner).await?;
        info!(board_id = board_id.0, "board session opened");
        Ok(Self::new(identity, compose(&payload)))
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    pub fn confirmed(&self) -> &BoardSnapshot {
        &self.confirmed
    }

    /// The confirmed snapshot with every recorded mutation folded on top.
    pub fn optimistic(&self) -> BoardSnapshot {
        derive(&self.confirmed, self.pending.iter().map(|p| &p.mutation))
    }

    pub fn state_of(&self, id: MutationId) -> Option<MutationState> {
        self.pending.iter().find(|p| p.id == id).map(|p| p.state)
    }

    /// Mutations still waiting on the store, including deferred ones.
    pub fn in_flight(&self) -> usize {
        self.pending
            .iter()
            .filter(|p| p.state == MutationState::OptimisticApplied)
            .count()
    }

    pub fn deferred(&self) -> usize {
        self.deferred.len()
    }

    pub fn canonical_id(&self, provisional: &str) -> Option<&str> {
        self.aliases.get(provisional).map(String::as_str)
    }

    pub fn begin(&mut self, request: MutationRequest) -> Result<Dispatch, MutationError> {
        let owner = self
            .identity
            .current_user_id()
            .ok_or(MutationError::Unauthenticated)?;
        let view = self.optimistic();

        let (mutation, op) = match request {
            MutationRequest::CreateColumn { name } => {
                let name = required(&name, "column name")?;
                let id = ColumnId::provisional(self.next_provisional());
                (
                    Mutation::CreateColumn {
                        id,
                        name: name.clone(),
                    },
                    StoreOp::CreateColumn { name },
                )
            }
            MutationRequest::RenameColumn { column_id, name } => {
                let name = required(&name, "column name")?;
                let column_id = ColumnId(self.resolve(column_id.0, "column")?);
                if view.column(&column_id).is_some_and(|c| c.name == name) {
                    debug!(column_id = %column_id, "rename to current name skipped");
                    return Ok(Dispatch::Unchanged);
                }
                (
                    Mutation::RenameColumn {
                        column_id: column_id.clone(),
                        name: name.clone(),
                    },
                    StoreOp::RenameColumn { column_id, name },
                )
            }
            MutationRequest::CreateCard {
                column_id,
                title,
                order,
            } => {
                let title = required(&title, "card title")?;
                let column_id = ColumnId(self.resolve(column_id.0, "column")?);
                let order = match order {
                    Some(order) => finite(order)?,
                    None => append_after(view.column(&column_id).and_then(|c| c.last_order())),
                };
                let id = ItemId::provisional(self.next_provisional());
                (
                    Mutation::CreateCard {
                        id,
                        column_id: column_id.clone(),
                        title: title.clone(),
                        order,
                    },
                    StoreOp::UpsertItem(ItemMutation {
                        id: None,
                        column_id,
                        order,
                        title,
                    }),
                )
            }
            MutationRequest::MoveCard {
                item_id,
                title,
                target_column_id,
                order,
            } => {
                let title = required(&title, "card title")?;
                let order = finite(order)?;
                let item_id = ItemId(self.resolve(item_id.0, "card")?);
                let target_column_id = ColumnId(self.resolve(target_column_id.0, "column")?);
                let target_is_empty = view
                    .column(&target_column_id)
                    .is_some_and(|c| c.items.iter().all(|item| item.id == item_id));
                let order = if target_is_empty { FIRST_ORDER } else { order };
                (
                    Mutation::MoveCard {
                        item_id: item_id.clone(),
                        title: title.clone(),
                        target_column_id: target_column_id.clone(),
                        order,
                    },
                    StoreOp::UpsertItem(ItemMutation {
                        id: Some(item_id),
                        column_id: target_column_id,
                        order,
                        title,
                    }),
                )
            }
            MutationRequest::RenameBoard { name } => {
                let name = required(&name, "board name")?;
                if view.name == name {
                    debug!(board_id = self.board_id.0, "rename to current name skipped");
                    return Ok(Dispatch::Unchanged);
                }
                (
                    Mutation::RenameBoard { name: name.clone() },
                    StoreOp::RenameBoard { name },
                )
            }
        };

        let id = MutationId(self.next_mutation);
        self.next_mutation += 1;
        self.pending.push(PendingMutation {
            id,
            mutation,
            state: MutationState::OptimisticApplied,
        });

        let call = StoreCall {
            mutation_id: id,
            board_id: self.board_id,
            owner,
            op,
        };
        info!(
            board_id = self.board_id.0,
            mutation_id = %id,
            kind = call.kind(),
            "mutation applied optimistically"
        );

        if call.waits_on_provisional() {
            debug!(mutation_id = %id, "store call deferred until provisional create confirms");
            self.deferred.push(call);
            return Ok(Dispatch::Deferred(id));
        }
        Ok(Dispatch::Issued(call))
    }

    /// Records a store outcome. Returns calls released by a confirmed create.
    pub fn settle(&mut self, outcome: CallOutcome) -> Vec<StoreCall> {
        let Some(index) = self
            .pending
            .iter()
            .position(|p| p.id == outcome.mutation_id)
        else {
            warn!(mutation_id = %outcome.mutation_id, "outcome for unknown mutation ignored");
            return Vec::new();
        };
        if self.pending[index].state != MutationState::OptimisticApplied {
            warn!(mutation_id = %outcome.mutation_id, "mutation already settled");
            return Vec::new();
        }

        let created = self.pending[index].created_id().map(str::to_owned);
        match outcome.result {
            Ok(confirmation) => {
                self.pending[index].state = MutationState::Confirmed;
                info!(
                    board_id = self.board_id.0,
                    mutation_id = %outcome.mutation_id,
                    "mutation confirmed"
                );
                let Some(provisional) = created else {
                    return Vec::new();
                };
                let canonical = match confirmation {
                    Confirmation::Column(id) => id.0,
                    Confirmation::Item(id) => id.0,
                    Confirmation::Applied => {
                        warn!(
                            mutation_id = %outcome.mutation_id,
                            "create confirmed without an id; dependents fail"
                        );
                        self.abandoned.insert(provisional);
                        self.fail_orphaned_deferred();
                        return Vec::new();
                    }
                };
                debug!(%provisional, %canonical, "provisional id superseded");
                self.aliases.insert(provisional, canonical);
                self.rewrite_pending();
                self.release_deferred()
            }
            Err(error) => {
                self.pending[index].state = MutationState::Failed;
                warn!(
                    board_id = self.board_id.0,
                    mutation_id = %outcome.mutation_id,
                    code = ?error.code,
                    error = %error.message,
                    "mutation failed; view stays stale until the next refresh"
                );
                if let Some(provisional) = created {
                    self.abandoned.insert(provisional);
                    self.fail_orphaned_deferred();
                }
                Vec::new()
            }
        }
    }

    /// Replaces the confirmed snapshot and forgets settled mutations.
    pub async fn refresh<S>(&mut self, store: &S) -> Result<(), MutationError>
    where
        S: EntityStore + ?Sized,
    {
        let owner = self
            .identity
            .current_user_id()
            .ok_or(MutationError::Unauthenticated)?;
        let payload = store.get_board(self.board_id, &owner).await?;
        self.confirmed = compose(&payload);

        let before = self.pending.len();
        self.pending
            .retain(|p| p.state == MutationState::OptimisticApplied);
        debug!(
            board_id = self.board_id.0,
            dropped = before - self.pending.len(),
            in_flight = self.pending.len(),
            "confirmed snapshot refreshed"
        );
        Ok(())
    }

    /// Begin, confirm (with any calls that releases), then refresh.
    ///
    /// Returns `None` when the request changed nothing.
    pub async fn dispatch<S>(
        &mut self,
        store: &S,
        request: MutationRequest,
    ) -> Result<Option<MutationId>, MutationError>
    where
        S: EntityStore + ?Sized,
    {
        let call = match self.begin(request)? {
            Dispatch::Unchanged => return Ok(None),
            Dispatch::Deferred(id) => return Ok(Some(id)),
            Dispatch::Issued(call) => call,
        };

        let mutation_id = call.mutation_id();
        let mut failure = None;
        let mut queue = VecDeque::from([call]);
        while let Some(call) = queue.pop_front() {
            let outcome = call.execute(store).await;
            if outcome.mutation_id == mutation_id {
                if let Err(error) = &outcome.result {
                    failure = Some(error.clone());
                }
            }
            queue.extend(self.settle(outcome));
        }

        if let Some(error) = failure {
            return Err(error.into());
        }
        self.refresh(store).await?;
        Ok(Some(mutation_id))
    }

    fn next_provisional(&mut self) -> u64 {
        let seq = self.next_provisional;
        self.next_provisional += 1;
        seq
    }

    /// Maps a requested id to the one to use: canonical when known, the
    /// provisional id itself while its create is in flight.
    fn resolve(&self, id: String, kind: &str) -> Result<String, MutationError> {
        if !id.starts_with(PROVISIONAL_PREFIX) {
            return Ok(id);
        }
        if let Some(canonical) = self.aliases.get(&id) {
            return Ok(canonical.clone());
        }
        if self.abandoned.contains(&id) {
            return Err(MutationError::NotFoundOrForbidden(format!(
                "{kind} {id} was never created"
            )));
        }
        let in_flight = self.pending.iter().any(|p| {
            p.state == MutationState::OptimisticApplied && p.created_id() == Some(id.as_str())
        });
        if in_flight {
            return Ok(id);
        }
        Err(MutationError::Validation(format!("unknown provisional {kind} id {id}")))
    }

    fn rewrite_pending(&mut self) {
        for pending in &mut self.pending {
            for id in pending.mutation.column_ids_mut() {
                rewrite_id(&mut id.0, &self.aliases);
            }
            for id in pending.mutation.item_ids_mut() {
                rewrite_id(&mut id.0, &self.aliases);
            }
        }
    }

    fn release_deferred(&mut self) -> Vec<StoreCall> {
        let mut released = Vec::new();
        for mut call in std::mem::take(&mut self.deferred) {
            call.rewrite(&self.aliases);
            if call.waits_on_provisional() {
                self.deferred.push(call);
            } else {
                debug!(mutation_id = %call.mutation_id, kind = call.kind(), "deferred call released");
                released.push(call);
            }
        }
        released
    }

    /// Fails deferred calls that wait on an abandoned create, transitively.
    fn fail_orphaned_deferred(&mut self) {
        loop {
            let (orphaned, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.deferred)
                .into_iter()
                .partition(|call| {
                    call.referenced_ids()
                        .iter()
                        .any(|id| self.abandoned.contains(*id))
                });
            self.deferred = waiting;
            if orphaned.is_empty() {
                return;
            }

            for call in orphaned {
                let Some(pending) = self.pending.iter_mut().find(|p| p.id == call.mutation_id) else {
                    continue;
                };
                pending.state = MutationState::Failed;
                warn!(
                    mutation_id = %call.mutation_id,
                    kind = call.kind(),
                    "deferred mutation failed: the entity it depends on was never created"
                );
                if let Some(created) = pending.created_id().map(str::to_owned) {
                    self.abandoned.insert(created);
                }
            }
        }
    }
}

fn required(value: &str, field: &str) -> Result<String, MutationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MutationError::Validation(format!("missing {field}")));
    }
    Ok(trimmed.to_string())
}

fn finite(order: f64) -> Result<f64, MutationError> {
    if !order.is_finite() {
        return Err(MutationError::Validation("order must be a finite number".into()));
    }
    Ok(order)
}

fn rewrite_id(id: &mut String, aliases: &HashMap<String, String>) {
    if let Some(canonical) = aliases.get(id.as_str()) {
        id.clone_from(canonical);
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
