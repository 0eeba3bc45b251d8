use tracing::{debug, info, warn};

use roam_types::api::ConnectionInfo;
use roam_types::{
    ConnectionEvent, ConnectionId, ConnectionRecord, ConnectionStatus, ConnectionViewState,
    Direction, UserId, UserSummary,
};

use crate::context::SyncContext;
use crate::error::{FailureKind, RemoteError, SyncError};
use crate::optimistic::perform_optimistic;
use crate::outcome::ActionOutcome;
use crate::session::Session;
use crate::view_model::ConnectionViewModel;

const CONNECT_FAILED: &str = "Could not send connection request";
const RESPOND_FAILED: &str = "Could not update connection request";
const REMOVE_FAILED: &str = "Could not remove connection";
const LIMIT_REACHED: &str = "Connection request limit reached. Upgrade to send more.";

/// Answer to an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub fn status(self) -> ConnectionStatus {
        match self {
            Self::Accept => ConnectionStatus::Accepted,
            Self::Reject => ConnectionStatus::Rejected,
        }
    }
}

/// A listed connection, resolved against the local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEntry {
    pub counterpart: UserId,
    pub profile: Option<UserSummary>,
    pub info: ConnectionInfo,
    pub record: ConnectionRecord,
}

impl ConnectionEntry {
    fn from_record(record: ConnectionRecord, me: &UserId) -> Option<Self> {
        Some(Self {
            counterpart: record.counterpart_of(me)?.clone(),
            profile: record.counterpart_profile(me).cloned(),
            info: ConnectionInfo::from_record(&record, me)?,
            record,
        })
    }
}

/// Runs connection-mutating actions: optimistic local update, remote call,
/// then confirm or roll back, fanning the result out over the event bus.
#[derive(Clone)]
pub struct ActionCoordinator {
    ctx: SyncContext,
}

impl ActionCoordinator {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// Send a connection request to the view's counterpart.
    pub async fn connect(&self, vm: &ConnectionViewModel) -> ActionOutcome {
        let Some(session) = self.ctx.session() else {
            info!("Connect attempted without a session");
            return ActionOutcome::LoginRequired;
        };
        let me = session.user_id.clone();
        let counterpart = vm.counterpart().clone();

        if me == counterpart {
            return ActionOutcome::SelfConnection;
        }
        let Some(_guard) = vm.begin_action() else {
            debug!("Connect to {} ignored: action already in flight", counterpart);
            return ActionOutcome::Ignored;
        };

        let current = vm.state();
        if let Some(status) = current.status.filter(|s| s.is_active()) {
            debug!("Connect to {} skipped: connection is {}", counterpart, status);
            return ActionOutcome::AlreadyActive(status);
        }

        if let (Some(ConnectionStatus::Rejected), Some(rejected_id)) =
            (current.status, current.connection_id.clone())
        {
            info!("Clearing rejected connection {} with {} before re-requesting", rejected_id, counterpart);
            if let Err(e) = self.ctx.api.delete(&session, &rejected_id).await {
                warn!("Failed to clear rejected connection {}: {}", rejected_id, e);
                return self.settle_failure(vm, &me, e, CONNECT_FAILED).await;
            }
            vm.apply(ConnectionViewState::empty());
            self.ctx.bus.notify_removed(&me, &counterpart, Some(rejected_id));
            self.ctx.cache.clear(&counterpart);

            if !self.ctx.transition_delay.is_zero() {
                tokio::time::sleep(self.ctx.transition_delay).await;
            }
        }

        let optimistic =
            ConnectionViewState::optimistic(ConnectionStatus::Pending, Direction::Sent, None);

        perform_optimistic(
            || {
                vm.apply(optimistic.clone());
                self.ctx
                    .bus
                    .publish(&me, ConnectionEvent::from_state(counterpart.clone(), &optimistic));
            },
            self.ctx.api.create(&session, &counterpart),
            |id: ConnectionId| {
                let confirmed = ConnectionViewState::confirmed(
                    ConnectionStatus::Pending,
                    Direction::Sent,
                    Some(id.clone()),
                );
                vm.apply(confirmed.clone());
                self.publish_to_both(&me, &counterpart, &confirmed);
                self.ctx.cache.save(&counterpart, &confirmed);
                info!("Connection request {} to {} confirmed", id, counterpart);
                ActionOutcome::Sent(id)
            },
            |err| self.roll_back_connect(vm, &me, err),
        )
        .await
    }

    async fn roll_back_connect(
        &self,
        vm: &ConnectionViewModel,
        me: &UserId,
        err: RemoteError,
    ) -> ActionOutcome {
        let counterpart = vm.counterpart();
        warn!("Connection request to {} failed: {}", counterpart, err);

        vm.apply(ConnectionViewState::empty());
        self.ctx.bus.notify_removed(me, counterpart, None);
        self.ctx.cache.clear(counterpart);

        self.settle_failure(vm, me, err, CONNECT_FAILED).await
    }

    /// Accept or reject the incoming request `connection_id`.
    pub async fn respond(
        &self,
        vm: &ConnectionViewModel,
        connection_id: Option<ConnectionId>,
        decision: Decision,
    ) -> ActionOutcome {
        let Some(session) = self.ctx.session() else {
            info!("Respond attempted without a session");
            return ActionOutcome::LoginRequired;
        };
        let Some(connection_id) = connection_id else {
            debug!("Respond ignored: no connection id");
            return ActionOutcome::Ignored;
        };
        let Some(_guard) = vm.begin_action() else {
            debug!("Respond to {} ignored: action already in flight", connection_id);
            return ActionOutcome::Ignored;
        };

        let me = session.user_id.clone();
        let counterpart = vm.counterpart().clone();
        let status = decision.status();
        let optimistic =
            ConnectionViewState::optimistic(status, Direction::Received, Some(connection_id.clone()));

        perform_optimistic(
            || {
                vm.apply(optimistic.clone());
                self.ctx
                    .bus
                    .publish(&me, ConnectionEvent::from_state(counterpart.clone(), &optimistic));
            },
            self.ctx.api.respond(&session, &connection_id, status),
            |()| {
                let confirmed = ConnectionViewState::confirmed(
                    status,
                    Direction::Received,
                    Some(connection_id.clone()),
                );
                vm.apply(confirmed.clone());
                self.publish_to_both(&me, &counterpart, &confirmed);

                match status {
                    ConnectionStatus::Accepted => self.ctx.cache.clear(&counterpart),
                    _ => self.ctx.cache.save(&counterpart, &confirmed),
                }
                info!("Connection {} with {} is now {}", connection_id, counterpart, status);
                ActionOutcome::Responded(status)
            },
            |err| {
                warn!("Responding to connection {} failed: {}", connection_id, err);
                self.settle_failure(vm, &me, err, RESPOND_FAILED)
            },
        )
        .await
    }

    /// Delete the current connection: withdraw a sent request or sever an
    /// accepted one.
    pub async fn remove(&self, vm: &ConnectionViewModel) -> ActionOutcome {
        let Some(session) = self.ctx.session() else {
            info!("Remove attempted without a session");
            return ActionOutcome::LoginRequired;
        };
        let Some(connection_id) = vm.state().connection_id else {
            debug!("Remove ignored: no known connection with {}", vm.counterpart());
            return ActionOutcome::Ignored;
        };
        let Some(_guard) = vm.begin_action() else {
            return ActionOutcome::Ignored;
        };

        let me = session.user_id.clone();
        let counterpart = vm.counterpart().clone();

        perform_optimistic(
            || {
                vm.apply(ConnectionViewState::empty());
                self.ctx
                    .bus
                    .notify_removed(&me, &counterpart, Some(connection_id.clone()));
            },
            self.ctx.api.delete(&session, &connection_id),
            |()| {
                self.ctx
                    .bus
                    .notify_removed(&counterpart, &me, Some(connection_id.clone()));
                self.ctx.cache.clear(&counterpart);
                info!("Connection {} with {} removed", connection_id, counterpart);
                ActionOutcome::Removed
            },
            |err| {
                warn!("Removing connection {} failed: {}", connection_id, err);
                self.settle_failure(vm, &me, err, REMOVE_FAILED)
            },
        )
        .await
    }

    /// Accepted connections of the local user.
    pub async fn buddies(&self) -> Result<Vec<ConnectionEntry>, SyncError> {
        let session = self.ctx.session().ok_or(SyncError::LoginRequired)?;
        let records = self.ctx.api.buddies(&session).await?;
        Ok(entries(records, &session, |r| r.status == ConnectionStatus::Accepted))
    }

    /// Pending requests addressed to the local user.
    pub async fn incoming_requests(&self) -> Result<Vec<ConnectionEntry>, SyncError> {
        let session = self.ctx.session().ok_or(SyncError::LoginRequired)?;
        let records = self.ctx.api.incoming(&session).await?;
        let me = session.user_id.clone();
        Ok(entries(records, &session, |r| {
            r.status == ConnectionStatus::Pending && r.receiver_id == me
        }))
    }

    /// Re-fetch authoritative state after a failed action and tell the
    /// local user's other surfaces about it.
    async fn settle_failure(
        &self,
        vm: &ConnectionViewModel,
        me: &UserId,
        err: RemoteError,
        generic: &str,
    ) -> ActionOutcome {
        let kind = err.kind();
        let state = vm.reconcile(&self.ctx).await;
        if vm.is_mounted() {
            self.ctx
                .bus
                .publish(me, ConnectionEvent::from_state(vm.counterpart().clone(), &state));
        }

        match kind {
            FailureKind::Conflict => {
                info!("Conflict with {} reconciled to {:?}", vm.counterpart(), state.status);
                ActionOutcome::Reconciled(state)
            }
            FailureKind::QuotaExceeded => {
                ActionOutcome::UpgradeRequired(server_message(&err).unwrap_or(LIMIT_REACHED).to_string())
            }
            FailureKind::Unauthenticated => {
                info!("Session rejected by the server; login required");
                ActionOutcome::LoginRequired
            }
            FailureKind::Transient => ActionOutcome::Failed(generic.to_string()),
        }
    }

    fn publish_to_both(&self, me: &UserId, counterpart: &UserId, state: &ConnectionViewState) {
        self.ctx
            .bus
            .publish(me, ConnectionEvent::from_state(counterpart.clone(), state));

        let mirrored = ConnectionViewState {
            direction: state.direction.map(Direction::flip),
            ..state.clone()
        };
        self.ctx
            .bus
            .publish(counterpart, ConnectionEvent::from_state(me.clone(), &mirrored));
    }
}

fn entries(
    records: Vec<ConnectionRecord>,
    session: &Session,
    keep: impl Fn(&ConnectionRecord) -> bool,
) -> Vec<ConnectionEntry> {
    records
        .into_iter()
        .filter(|r| keep(r))
        .filter_map(|r| ConnectionEntry::from_record(r, &session.user_id))
        .collect()
}

fn server_message(err: &RemoteError) -> Option<&str> {
    match err {
        RemoteError::Status { message, .. } if !message.trim().is_empty() => Some(message.as_str()),
        _ => None,
    }
}
