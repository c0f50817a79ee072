//! Property-based tests for the sonido-ipc registry and message queue.
//!
//! Random sequences of topology requests, issued from one or two simulated
//! cores, must never leave duplicate ids or dangling connections behind.

use std::collections::HashSet;

use proptest::prelude::*;
use sonido_ipc::{
    BufferSpec, ComponentParams, ComponentSpec, ConnectSpec, Delivery, IpcConfig, IpcContext,
    IpcError, PipelineFreePolicy, PipelineSpec, RecordingTransport, SnapshotDetail,
    SnapshotEntry,
};
use sonido_platform::{CoreId, HostPlatform};

type Ctx = IpcContext<HostPlatform, RecordingTransport>;

#[derive(Debug, Clone)]
enum Op {
    Pipeline { id: u32, pipeline_id: u32 },
    Component { id: u32, pipeline_id: u32 },
    Buffer { id: u32, pipeline_id: u32 },
    Connect { source: u32, sink: u32 },
    FreeComponent(u32),
    FreeBuffer(u32),
    FreePipeline(u32),
}

fn op() -> impl Strategy<Value = Op> {
    let id = 1_u32..24;
    let pipeline_id = 1_u32..4;
    prop_oneof![
        1 => (id.clone(), pipeline_id.clone())
            .prop_map(|(id, pipeline_id)| Op::Pipeline { id, pipeline_id }),
        3 => (id.clone(), pipeline_id.clone())
            .prop_map(|(id, pipeline_id)| Op::Component { id, pipeline_id }),
        3 => (id.clone(), pipeline_id)
            .prop_map(|(id, pipeline_id)| Op::Buffer { id, pipeline_id }),
        4 => (id.clone(), id.clone()).prop_map(|(source, sink)| Op::Connect { source, sink }),
        1 => id.clone().prop_map(Op::FreeComponent),
        1 => id.clone().prop_map(Op::FreeBuffer),
        1 => id.prop_map(Op::FreePipeline),
    ]
}

fn context(cores: u16, policy: PipelineFreePolicy) -> Ctx {
    let (transport, _probe) = RecordingTransport::new();
    let config = IpcConfig::default().with_pipeline_free_policy(policy);
    IpcContext::new(HostPlatform::new(cores), transport, config).unwrap()
}

/// Issues `op` from `core`. Failures are expected and ignored.
fn apply(ctx: &Ctx, core: CoreId, op: &Op) {
    match *op {
        Op::Pipeline { id, pipeline_id } => {
            let _ = ctx.create_pipeline(&PipelineSpec::new(id, pipeline_id, core));
        }
        Op::Component { id, pipeline_id } => {
            let params = ComponentParams::Volume { channels: 2 };
            let _ = ctx.create_component(&ComponentSpec::new(id, core, pipeline_id, params));
        }
        Op::Buffer { id, pipeline_id } => {
            let _ = ctx.create_buffer(&BufferSpec::new(id, core, pipeline_id, 128));
        }
        Op::Connect { source, sink } => {
            let _ = ctx.connect(ConnectSpec::new(source, sink));
        }
        Op::FreeComponent(id) => {
            let _ = ctx.free_component(id);
        }
        Op::FreeBuffer(id) => {
            let _ = ctx.free_buffer(id);
        }
        Op::FreePipeline(id) => {
            let _ = ctx.free_pipeline(id);
        }
    }
}

/// Checks that ids are unique and every reference resolves both ways.
fn check_consistent(entries: &[SnapshotEntry]) -> Result<(), TestCaseError> {
    let mut ids = HashSet::new();
    for entry in entries {
        prop_assert!(ids.insert(entry.id), "duplicate id {}", entry.id);
    }

    let find = |id: u32| entries.iter().find(|e| e.id == id).map(|e| &e.detail);
    let pipelines: HashSet<u32> = entries
        .iter()
        .filter_map(|e| match e.detail {
            SnapshotDetail::Pipeline { pipeline_id, .. } => Some(pipeline_id),
            _ => None,
        })
        .collect();

    for entry in entries {
        match &entry.detail {
            SnapshotDetail::Component {
                pipeline_id,
                upstream,
                downstream,
                ..
            } => {
                prop_assert!(pipelines.contains(pipeline_id), "component {} orphaned", entry.id);
                for &buf in upstream {
                    prop_assert!(
                        matches!(find(buf), Some(SnapshotDetail::Buffer { sink: Some(s), .. }) if *s == entry.id),
                        "component {} lists input {} which does not feed it",
                        entry.id,
                        buf
                    );
                }
                for &buf in downstream {
                    prop_assert!(
                        matches!(find(buf), Some(SnapshotDetail::Buffer { source: Some(s), .. }) if *s == entry.id),
                        "component {} lists output {} it does not produce",
                        entry.id,
                        buf
                    );
                }
            }
            SnapshotDetail::Buffer {
                pipeline_id,
                source,
                sink,
                ..
            } => {
                prop_assert!(pipelines.contains(pipeline_id), "buffer {} orphaned", entry.id);
                if let Some(comp) = *source {
                    prop_assert!(
                        matches!(find(comp), Some(SnapshotDetail::Component { downstream, .. }) if downstream.contains(&entry.id)),
                        "buffer {} names missing producer {}",
                        entry.id,
                        comp
                    );
                }
                if let Some(comp) = *sink {
                    prop_assert!(
                        matches!(find(comp), Some(SnapshotDetail::Component { upstream, .. }) if upstream.contains(&entry.id)),
                        "buffer {} names missing consumer {}",
                        entry.id,
                        comp
                    );
                }
            }
            SnapshotDetail::Pipeline { .. } => {}
        }
    }
    Ok(())
}

fn policy() -> impl Strategy<Value = PipelineFreePolicy> {
    prop_oneof![Just(PipelineFreePolicy::Reject), Just(PipelineFreePolicy::Cascade)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Any sequence of requests from one core leaves a consistent registry.
    #[test]
    fn single_core_registry_stays_consistent(
        ops in prop::collection::vec(op(), 1..80),
        policy in policy(),
    ) {
        let ctx = context(1, policy);
        for op in &ops {
            apply(&ctx, CoreId::PRIMARY, op);
            check_consistent(&ctx.snapshot())?;
        }
    }

    /// Freeing an absent id fails with `UnknownId` and changes nothing.
    #[test]
    fn free_absent_id_is_noop(
        ops in prop::collection::vec(op(), 0..40),
        absent in 100_u32..200,
    ) {
        let ctx = context(1, PipelineFreePolicy::Cascade);
        for op in &ops {
            apply(&ctx, CoreId::PRIMARY, op);
        }
        let before = ctx.snapshot();

        prop_assert!(matches!(ctx.free_component(absent), Err(IpcError::UnknownId(id)) if id == absent));
        prop_assert!(matches!(ctx.free_buffer(absent), Err(IpcError::UnknownId(id)) if id == absent));
        prop_assert!(matches!(ctx.free_pipeline(absent), Err(IpcError::UnknownId(id)) if id == absent));
        prop_assert_eq!(ctx.snapshot(), before);
    }

    /// Queued messages reach the transport in send order; priority messages
    /// sent to an idle transport go out as they are sent.
    #[test]
    fn queue_preserves_send_order(
        messages in prop::collection::vec((any::<u32>(), any::<bool>()), 1..32),
    ) {
        let (transport, probe) = RecordingTransport::new();
        let ctx = IpcContext::new(HostPlatform::new(1), transport, IpcConfig::default()).unwrap();

        for &(header, high_priority) in &messages {
            let id = ctx.create_message(header, 4).unwrap();
            if ctx.send_message(id, None, high_priority).unwrap() == Delivery::Sent {
                probe.complete();
            }
        }
        while ctx.drain_pending().unwrap().is_some() {
            probe.complete();
        }

        let expected: Vec<u32> = messages
            .iter()
            .filter(|(_, p)| *p)
            .chain(messages.iter().filter(|(_, p)| !*p))
            .map(|&(h, _)| h)
            .collect();
        prop_assert_eq!(probe.sent_headers(), expected);
        prop_assert_eq!(ctx.pending_count(), 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Two cores issuing requests concurrently, serialized only by the
    /// context lock, never corrupt the registry.
    #[test]
    fn two_cores_registry_stays_consistent(
        core0_ops in prop::collection::vec(op(), 1..60),
        core1_ops in prop::collection::vec(op(), 1..60),
        policy in policy(),
    ) {
        let ctx = context(2, policy);

        std::thread::scope(|s| {
            for (core, ops) in [(CoreId::PRIMARY, &core0_ops), (CoreId::new(1), &core1_ops)] {
                let ctx = &ctx;
                s.spawn(move || {
                    HostPlatform::enter_core(core);
                    for op in ops {
                        apply(ctx, core, op);
                    }
                    assert!(!HostPlatform::irqs_disabled());
                });
            }
        });

        check_consistent(&ctx.snapshot())?;
        let stats = ctx.platform().stats();
        prop_assert_eq!(stats.irq_saves, stats.irq_restores);
    }
}
