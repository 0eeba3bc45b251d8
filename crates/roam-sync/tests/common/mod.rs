#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use roam_sync::{
    ConnectionApi, EventBus, LocalCache, RemoteError, Session, SessionSlot, SyncContext,
};
use roam_types::{ConnectionId, ConnectionRecord, ConnectionStatus, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    All(UserId),
    Buddies(UserId),
    Incoming(UserId),
    Create { from: UserId, to: UserId },
    Respond { id: ConnectionId, status: ConnectionStatus },
    Delete(ConnectionId),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::Respond { .. } | Self::Delete(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    All,
    Create,
    Respond,
    Delete,
}

/// Pauses the next call of an operation until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
struct FakeState {
    records: Vec<ConnectionRecord>,
    next_id: u64,
    calls: Vec<Call>,
    failures: HashMap<Op, VecDeque<RemoteError>>,
    /// Error returned by the next create *after* it has been committed.
    lost_create_response: Option<RemoteError>,
    gates: HashMap<Op, Arc<Gate>>,
}

/// In-memory remote store. Enforces one record per user pair, like the
/// real backend: a rejected record must be deleted before re-requesting.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, sender: &str, receiver: &str, status: ConnectionStatus) -> ConnectionId {
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state);
        state.records.push(record(id.clone(), sender.into(), receiver.into(), status));
        id
    }

    pub fn fail_next(&self, op: Op, err: RemoteError) {
        let mut state = self.state.lock().unwrap();
        state.failures.entry(op).or_default().push_back(err);
    }

    pub fn lose_next_create_response(&self, err: RemoteError) {
        self.state.lock().unwrap().lost_create_response = Some(err);
    }

    pub fn gate(&self, op: Op) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.state.lock().unwrap().gates.insert(op, gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutation_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn records(&self) -> Vec<ConnectionRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn active_between(&self, a: &str, b: &str) -> usize {
        let (a, b) = (UserId::from(a), UserId::from(b));
        self.records()
            .iter()
            .filter(|r| r.involves_pair(&a, &b) && r.status.is_active())
            .count()
    }

    /// Records the call, then applies any injected failure or gate.
    async fn enter(&self, op: Op, call: Call) -> Result<(), RemoteError> {
        let (failure, gate) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            let failure = state.failures.get_mut(&op).and_then(VecDeque::pop_front);
            (failure, state.gates.remove(&op))
        };

        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn list(&self, me: &UserId, keep: impl Fn(&ConnectionRecord) -> bool) -> Vec<ConnectionRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| (&r.sender_id == me || &r.receiver_id == me) && keep(r))
            .cloned()
            .collect()
    }
}

fn next_id(state: &mut FakeState) -> ConnectionId {
    state.next_id += 1;
    ConnectionId::new(format!("c{}", state.next_id))
}

fn record(id: ConnectionId, sender: UserId, receiver: UserId, status: ConnectionStatus) -> ConnectionRecord {
    ConnectionRecord {
        id,
        sender_id: sender,
        receiver_id: receiver,
        status,
        created_at: None,
        updated_at: None,
        sender: None,
        receiver: None,
    }
}

#[async_trait]
impl ConnectionApi for FakeRemote {
    async fn all(&self, session: &Session) -> Result<Vec<ConnectionRecord>, RemoteError> {
        self.enter(Op::All, Call::All(session.user_id.clone())).await?;
        Ok(self.list(&session.user_id, |_| true))
    }

    async fn buddies(&self, session: &Session) -> Result<Vec<ConnectionRecord>, RemoteError> {
        self.state.lock().unwrap().calls.push(Call::Buddies(session.user_id.clone()));
        Ok(self.list(&session.user_id, |r| r.status == ConnectionStatus::Accepted))
    }

    async fn incoming(&self, session: &Session) -> Result<Vec<ConnectionRecord>, RemoteError> {
        self.state.lock().unwrap().calls.push(Call::Incoming(session.user_id.clone()));
        let me = session.user_id.clone();
        Ok(self.list(&session.user_id, |r| {
            r.status == ConnectionStatus::Pending && r.receiver_id == me
        }))
    }

    async fn create(
        &self,
        session: &Session,
        receiver: &UserId,
    ) -> Result<ConnectionId, RemoteError> {
        let me = session.user_id.clone();
        self.enter(Op::Create, Call::Create { from: me.clone(), to: receiver.clone() })
            .await?;

        let mut state = self.state.lock().unwrap();
        if state.records.iter().any(|r| r.involves_pair(&me, receiver)) {
            return Err(RemoteError::status(409, "Connection already exists"));
        }
        let id = next_id(&mut state);
        state
            .records
            .push(record(id.clone(), me, receiver.clone(), ConnectionStatus::Pending));

        match state.lost_create_response.take() {
            Some(err) => Err(err),
            None => Ok(id),
        }
    }

    async fn respond(
        &self,
        session: &Session,
        id: &ConnectionId,
        status: ConnectionStatus,
    ) -> Result<(), RemoteError> {
        self.enter(Op::Respond, Call::Respond { id: id.clone(), status }).await?;

        let mut state = self.state.lock().unwrap();
        let record = state
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| RemoteError::status(404, "Connection not found"))?;
        if record.receiver_id != session.user_id {
            return Err(RemoteError::status(400, "Only the receiver can respond"));
        }
        if record.status != ConnectionStatus::Pending {
            return Err(RemoteError::status(400, "Connection is not pending"));
        }
        record.status = status;
        Ok(())
    }

    async fn delete(&self, session: &Session, id: &ConnectionId) -> Result<(), RemoteError> {
        self.enter(Op::Delete, Call::Delete(id.clone())).await?;

        let mut state = self.state.lock().unwrap();
        let pos = state
            .records
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| RemoteError::status(404, "Connection not found"))?;
        let me = &session.user_id;
        let record = &state.records[pos];
        if &record.sender_id != me && &record.receiver_id != me {
            return Err(RemoteError::status(400, "Not a party to this connection"));
        }
        state.records.remove(pos);
        Ok(())
    }
}

/// A context for `user` sharing `remote` and `bus` with other test users.
pub fn context_for(remote: &Arc<FakeRemote>, bus: &EventBus, user: &str) -> SyncContext {
    context_with_cache(remote, bus, user, LocalCache::in_memory())
}

pub fn context_with_cache(
    remote: &Arc<FakeRemote>,
    bus: &EventBus,
    user: &str,
    cache: LocalCache,
) -> SyncContext {
    let session = Arc::new(SessionSlot::new(Some(Session::new(user, format!("token-{}", user)))));
    SyncContext::new(remote.clone(), bus.clone(), cache, session)
        .with_transition_delay(Duration::ZERO)
}

pub fn anonymous_context(remote: &Arc<FakeRemote>, bus: &EventBus) -> SyncContext {
    SyncContext::new(
        remote.clone(),
        bus.clone(),
        LocalCache::in_memory(),
        Arc::new(SessionSlot::anonymous()),
    )
}
