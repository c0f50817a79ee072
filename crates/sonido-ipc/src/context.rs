//! The IPC context: message queue and topology registry behind one lock.
//!
//! [`IpcContext`] is built once at boot and shared by reference between the
//! IPC task, the transport's completion interrupt, and every core. Each public
//! method takes the context lock (interrupts disabled on the calling core),
//! does a bounded amount of work, commits the state if it changed, and
//! releases. No method calls another lock-taking method while holding it.
//!
//! Requests that target an object owned by another core are not executed
//! locally: the lock is dropped and the request is forwarded to the owner,
//! which reports [`Outcome::Forwarded`].

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use sonido_platform::{CoreId, Platform};

use crate::config::{ConfigError, IpcConfig};
use crate::dai::DaiConfig;
use crate::driver::DriverRegistry;
use crate::error::IpcError;
use crate::lock::IpcLock;
use crate::message::{MessageId, MessagePool, alloc_payload};
use crate::queue::PendingQueue;
use crate::registry::{
    BufferSpec, ComponentSpec, ComponentState, ConnectSpec, Direction, EntryKind, PipelineSpec,
    Registry, SnapshotEntry,
};
use crate::transport::HostTransport;

/// Where a routed request was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Executed on the calling core.
    Local,
    /// Forwarded to the owning core.
    Forwarded(CoreId),
}

/// What [`IpcContext::send_message`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the transport immediately.
    Sent,
    /// Appended to (or already waiting in) the pending queue.
    Queued,
}

/// Result of [`IpcContext::configure_dai`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaiConfigReport {
    /// DAI components configured on the calling core.
    pub configured: usize,
    /// Cores the configuration was forwarded to.
    pub forwarded: Vec<CoreId>,
}

struct IpcState<T> {
    messages: MessagePool,
    pending: PendingQueue,
    registry: Registry,
    transport: T,
}

/// Control-plane state of the firmware.
pub struct IpcContext<P: Platform, T: HostTransport> {
    platform: P,
    config: IpcConfig,
    drivers: DriverRegistry,
    state: IpcLock<IpcState<T>>,
}

/// Logs a failed request.
#[inline]
fn rejected<R>(op: &'static str, result: Result<R, IpcError>) -> Result<R, IpcError> {
    #[cfg(feature = "tracing")]
    if let Err(err) = &result {
        tracing::error!("{op}: {err}");
    }
    #[cfg(not(feature = "tracing"))]
    let _ = op;
    result
}

impl<P: Platform, T: HostTransport> IpcContext<P, T> {
    /// Creates a context with the built-in component drivers.
    pub fn new(platform: P, transport: T, config: IpcConfig) -> Result<Self, ConfigError> {
        Self::with_drivers(platform, transport, config, DriverRegistry::new())
    }

    /// Creates a context with a custom driver registry.
    pub fn with_drivers(
        platform: P,
        transport: T,
        config: IpcConfig,
        drivers: DriverRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let reserve = |_err| ConfigError::Allocation(config.max_messages);
        let state = IpcState {
            messages: MessagePool::with_capacity(config.max_messages).map_err(reserve)?,
            pending: PendingQueue::with_capacity(config.max_messages).map_err(reserve)?,
            registry: Registry::new(),
            transport,
        };
        Ok(Self {
            platform,
            config,
            drivers,
            state: IpcLock::new(state),
        })
    }

    /// Returns the platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Returns the configuration.
    pub fn config(&self) -> &IpcConfig {
        &self.config
    }

    /// Returns the driver registry.
    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    // ------------------------------------------------------------------
    // Message queue
    // ------------------------------------------------------------------

    /// Allocates a message with a zeroed payload of `size` bytes.
    ///
    /// The payload is allocated before the lock is taken.
    pub fn create_message(&self, header: u32, size: usize) -> Result<MessageId, IpcError> {
        if size > self.config.max_message_size {
            return rejected("msg_init", Err(IpcError::AllocationFailure));
        }
        let payload = rejected("msg_init", alloc_payload(size))?;

        let mut guard = self.state.lock(&self.platform);
        rejected("msg_init", guard.messages.insert(header, payload))
    }

    /// Frees a message, unlinking it from the pending queue first.
    ///
    /// `None`, stale, and already freed handles are ignored.
    pub fn free_message(&self, id: Option<MessageId>) {
        let Some(id) = id else {
            return;
        };
        let mut guard = self.state.lock(&self.platform);
        if !guard.messages.contains(id) {
            return;
        }
        let state = &mut *guard;
        state.pending.remove(id);
        state.messages.remove(id);
    }

    /// Copies `data` into the message payload, then sends or queues it.
    ///
    /// A high-priority message goes straight to an idle transport. Everything
    /// else joins the tail of the pending queue; a message already queued
    /// keeps its place with the refreshed payload. A queued message whose
    /// high-priority send is refused moves to the head of the queue.
    pub fn send_message(
        &self,
        id: MessageId,
        data: Option<&[u8]>,
        high_priority: bool,
    ) -> Result<Delivery, IpcError> {
        let mut guard = self.state.lock(&self.platform);
        let result = Self::send_locked(&mut guard, id, data, high_priority);
        rejected("msg_send", result)
    }

    /// Hands the oldest pending message to the transport.
    ///
    /// Returns the handle sent, or `None` if nothing is pending or the
    /// transport is still busy. A message the transport refuses goes back to
    /// the head of the queue.
    pub fn drain_pending(&self) -> Result<Option<MessageId>, IpcError> {
        let mut guard = self.state.lock(&self.platform);
        if guard.pending.is_empty() || guard.transport.is_busy() {
            return Ok(None);
        }

        let state = &mut *guard;
        while let Some(id) = state.pending.pop_front() {
            let Some(msg) = state.messages.get(id) else {
                continue;
            };
            if let Err(err) = state.transport.send(msg) {
                state.pending.push_front(id);
                return rejected("msg_drain", Err(err.into()));
            }
            #[cfg(feature = "tracing")]
            tracing::debug!("msg_drain: sent {id}, {} left", state.pending.len());
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Number of queued messages.
    pub fn pending_count(&self) -> usize {
        self.state.lock(&self.platform).pending.len()
    }

    /// Returns true if `id` is waiting in the pending queue.
    pub fn is_pending(&self, id: MessageId) -> bool {
        self.state.lock(&self.platform).pending.contains(id)
    }

    /// Number of live messages, queued or not.
    pub fn message_count(&self) -> usize {
        self.state.lock(&self.platform).messages.len()
    }

    /// Returns the header of a live message.
    pub fn message_header(&self, id: MessageId) -> Option<u32> {
        self.state
            .lock(&self.platform)
            .messages
            .get(id)
            .map(|m| m.header())
    }

    /// Returns a copy of a live message's payload.
    pub fn message_payload(&self, id: MessageId) -> Option<Vec<u8>> {
        self.state
            .lock(&self.platform)
            .messages
            .get(id)
            .map(|m| m.payload().to_vec())
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    /// Creates a component and its driver.
    pub fn create_component(&self, spec: &ComponentSpec) -> Result<(), IpcError> {
        rejected("comp_new", self.check_placement(spec.core))?;
        let mut guard = self.state.lock(&self.platform);
        let result = guard
            .registry
            .create_component(spec, &self.drivers, &self.platform);
        #[cfg(feature = "tracing")]
        if result.is_ok() {
            tracing::debug!(
                "comp_new: {} {} in pipeline {} on {}",
                spec.comp_type(),
                spec.id,
                spec.pipeline_id,
                spec.core
            );
        }
        rejected("comp_new", result)
    }

    /// Creates a buffer.
    pub fn create_buffer(&self, spec: &BufferSpec) -> Result<(), IpcError> {
        rejected("buffer_new", self.check_placement(spec.core))?;
        let mut guard = self.state.lock(&self.platform);
        let result = guard
            .registry
            .create_buffer(spec, self.config.max_buffer_size);
        #[cfg(feature = "tracing")]
        if result.is_ok() {
            tracing::debug!("buffer_new: {} ({} bytes) in pipeline {}", spec.id, spec.size, spec.pipeline_id);
        }
        rejected("buffer_new", result)
    }

    /// Creates a pipeline.
    pub fn create_pipeline(&self, spec: &PipelineSpec) -> Result<(), IpcError> {
        rejected("pipeline_new", self.check_placement(spec.core))?;
        let mut guard = self.state.lock(&self.platform);
        let result = guard.registry.create_pipeline(spec);
        #[cfg(feature = "tracing")]
        if result.is_ok() {
            tracing::debug!("pipeline_new: {} as pipeline {} on {}", spec.id, spec.pipeline_id, spec.core);
        }
        rejected("pipeline_new", result)
    }

    /// Validates a pipeline's graph and records its endpoints.
    pub fn complete_pipeline(&self, id: u32) -> Result<Outcome, IpcError> {
        let result = self.run_on_owner(
            |registry| registry.pipeline_owner(id),
            |registry, _| registry.complete_pipeline(id),
        );
        #[cfg(feature = "tracing")]
        if matches!(result, Ok(Outcome::Local)) {
            tracing::debug!("pipeline_complete: {id}");
        }
        rejected("pipeline_complete", result)
    }

    /// Connects a component and a buffer. Runs on the component's core.
    pub fn connect(&self, spec: ConnectSpec) -> Result<Outcome, IpcError> {
        let result = self.run_on_owner(
            |registry| registry.plan_connect(spec).map(|plan| plan.owner),
            |registry, platform| registry.connect(spec, platform),
        );
        #[cfg(feature = "tracing")]
        if matches!(result, Ok(Outcome::Local)) {
            tracing::debug!("connect: {} -> {}", spec.source_id, spec.sink_id);
        }
        rejected("connect", result)
    }

    /// Frees a component in the `Ready` state.
    pub fn free_component(&self, id: u32) -> Result<Outcome, IpcError> {
        let result = self.run_on_owner(
            |registry| registry.owner_of(id, EntryKind::Component),
            |registry, _| registry.free_component(id),
        );
        #[cfg(feature = "tracing")]
        if matches!(result, Ok(Outcome::Local)) {
            tracing::debug!("comp_free: {id}");
        }
        rejected("comp_free", result)
    }

    /// Frees a buffer unless both its ends are running.
    pub fn free_buffer(&self, id: u32) -> Result<Outcome, IpcError> {
        let result = self.run_on_owner(
            |registry| registry.owner_of(id, EntryKind::Buffer),
            |registry, _| registry.free_buffer(id),
        );
        #[cfg(feature = "tracing")]
        if matches!(result, Ok(Outcome::Local)) {
            tracing::debug!("buffer_free: {id}");
        }
        rejected("buffer_free", result)
    }

    /// Frees a pipeline according to the configured
    /// [`PipelineFreePolicy`](crate::PipelineFreePolicy).
    pub fn free_pipeline(&self, id: u32) -> Result<Outcome, IpcError> {
        let policy = self.config.pipeline_free_policy;
        let result = self.run_on_owner(
            |registry| registry.owner_of(id, EntryKind::Pipeline),
            |registry, _| registry.free_pipeline(id, policy),
        );
        #[cfg(feature = "tracing")]
        if matches!(result, Ok(Outcome::Local)) {
            tracing::debug!("pipeline_free: {id} ({policy:?})");
        }
        rejected("pipeline_free", result)
    }

    /// Moves a component to a new lifecycle state.
    ///
    /// Called by the scheduler on the core that runs the component.
    pub fn set_component_state(&self, id: u32, state: ComponentState) -> Result<(), IpcError> {
        let mut guard = self.state.lock(&self.platform);
        let result = guard.registry.set_component_state(id, state);
        rejected("comp_state", result)
    }

    /// Applies an interface configuration to every matching DAI component.
    ///
    /// DAIs on the calling core are configured directly. On the primary core,
    /// the request is also forwarded once to every other core that owns a
    /// matching DAI. Fails with [`IpcError::UnknownTarget`] when nothing
    /// matched anywhere.
    pub fn configure_dai(&self, config: &DaiConfig) -> Result<DaiConfigReport, IpcError> {
        let current = self.platform.current_core();
        let matched = {
            let mut guard = self.state.lock(&self.platform);
            guard.registry.configure_dai(config, current)
        };

        let result = matched.and_then(|matches| {
            let remote = if current.is_primary() { matches.remote } else { 0 };
            if matches.configured == 0 && remote == 0 {
                return Err(IpcError::UnknownTarget {
                    dai_type: config.dai_type,
                    dai_index: config.dai_index,
                });
            }

            let mut forwarded = Vec::new();
            for index in (0..32_u16).filter(|i| remote & (1 << i) != 0) {
                let core = CoreId::new(index);
                self.forward(core)?;
                forwarded.push(core);
            }
            Ok(DaiConfigReport {
                configured: matches.configured,
                forwarded,
            })
        });
        #[cfg(feature = "tracing")]
        if let Ok(report) = &result {
            tracing::debug!(
                "dai_config: {} index {}: {} local, forwarded to {:?}",
                config.dai_type,
                config.dai_index,
                report.configured,
                report.forwarded
            );
        }
        rejected("dai_config", result)
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Returns a copy of entry `id`.
    pub fn lookup_by_id(&self, id: u32) -> Option<SnapshotEntry> {
        self.state
            .lock(&self.platform)
            .registry
            .get(id)
            .map(|e| e.snapshot())
    }

    /// Returns the first entry of `kind` in `pipeline_id`, in creation order.
    pub fn lookup_by_pipeline_id(&self, kind: EntryKind, pipeline_id: u32) -> Option<SnapshotEntry> {
        self.state
            .lock(&self.platform)
            .registry
            .first_in_pipeline(kind, pipeline_id)
            .map(|e| e.snapshot())
    }

    /// Returns the component at the `direction` end of a pipeline.
    ///
    /// `Upstream` finds the source endpoint, `Downstream` the sink endpoint.
    pub fn lookup_pipeline_endpoint(
        &self,
        pipeline_id: u32,
        direction: Direction,
    ) -> Option<SnapshotEntry> {
        let guard = self.state.lock(&self.platform);
        guard
            .registry
            .endpoint(pipeline_id, direction)
            .and_then(|id| guard.registry.get(id))
            .map(|e| e.snapshot())
    }

    /// Resolves the pipeline id of entry `id` given a raw kind discriminant.
    pub fn pipeline_id_of_raw(&self, kind: u16, id: u32) -> Result<u32, IpcError> {
        let kind = EntryKind::from_raw(kind)?;
        let guard = self.state.lock(&self.platform);
        let entry = guard.registry.get(id).ok_or(IpcError::UnknownId(id))?;
        if entry.kind() != kind {
            return Err(IpcError::TypeMismatch {
                id,
                found: entry.kind(),
            });
        }
        Ok(entry.pipeline_id())
    }

    /// Number of registry entries.
    pub fn entry_count(&self) -> usize {
        self.state.lock(&self.platform).registry.len()
    }

    /// Returns a copy of every entry, in creation order.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        self.state
            .lock(&self.platform)
            .registry
            .iter()
            .map(|e| e.snapshot())
            .collect()
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    /// Runs `op` under the lock if the calling core owns the target,
    /// otherwise releases the lock and forwards.
    fn run_on_owner(
        &self,
        owner_of: impl FnOnce(&Registry) -> Result<CoreId, IpcError>,
        op: impl FnOnce(&mut Registry, &P) -> Result<(), IpcError>,
    ) -> Result<Outcome, IpcError> {
        let mut guard = self.state.lock(&self.platform);
        let owner = owner_of(&guard.registry)?;
        if !self.platform.is_current(owner) {
            drop(guard);
            return self.forward(owner);
        }
        op(&mut guard.registry, &self.platform)?;
        Ok(Outcome::Local)
    }

    fn send_locked(
        state: &mut IpcState<T>,
        id: MessageId,
        data: Option<&[u8]>,
        high_priority: bool,
    ) -> Result<Delivery, IpcError> {
        let msg = state
            .messages
            .get_mut(id)
            .ok_or(IpcError::UnknownMessage(id))?;
        if let Some(data) = data {
            msg.write_payload(data);
        }

        if high_priority && !state.transport.is_busy() {
            let was_queued = state.pending.remove(id);
            if let Err(err) = state.transport.send(msg) {
                if was_queued {
                    state.pending.push_front(id);
                }
                return Err(err.into());
            }
            #[cfg(feature = "tracing")]
            tracing::debug!("msg_send: {id} sent immediately");
            return Ok(Delivery::Sent);
        }

        state.pending.push_back(id);
        Ok(Delivery::Queued)
    }

    /// Objects may only be placed on the first `core_count` cores.
    fn check_placement(&self, core: CoreId) -> Result<(), IpcError> {
        if core.index() >= self.config.core_count {
            return Err(IpcError::CoreDisabled(core));
        }
        Ok(())
    }

    fn forward(&self, owner: CoreId) -> Result<Outcome, IpcError> {
        if !self.platform.is_core_enabled(owner) {
            return Err(IpcError::CoreDisabled(owner));
        }
        self.platform.forward_to_core(owner)?;
        #[cfg(feature = "tracing")]
        tracing::debug!("forward: request handed to {owner}");
        Ok(Outcome::Forwarded(owner))
    }
}
