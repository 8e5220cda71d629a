//! # Dispatch Benchmarks
//!
//! Request handling through a published service: the raw dispatcher, a full
//! client round trip, and the registry lookups every reverse call performs.

use crate::fixtures::Harness;
use criterion::{black_box, BenchmarkId, Criterion};
use devauth_service::{CallbackKey, CallbackRegistry};
use devauth_transport::{CallerInfo, MessageParcel};
use devauth_types::framing::write_request;
use devauth_types::{
    CallbackFns, CallbackType, DevAuthHooks, HookId, MethodId, ParamTag, ParamWriter, DEV_AUTH_CALL_REQUEST,
    DEVICE_AUTH_INTERFACE_TOKEN,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("benchmark runtime")
}

fn check_access_parcel() -> MessageParcel {
    let mut writer = ParamWriter::new();
    let _ = writer
        .push_i32(ParamTag::OsAccountId, 0)
        .and_then(|w| w.push_str(ParamTag::AppId, "svc.demo"))
        .and_then(|w| w.push_str(ParamTag::GroupId, "g1"));
    let frame = write_request(MethodId::CheckAccessToGroup.as_i32(), writer.count(), writer.as_bytes())
        .unwrap_or_default();
    MessageParcel::new(DEVICE_AUTH_INTERFACE_TOKEN, CallerInfo::default(), frame)
}

pub fn bench_dispatcher(c: &mut Criterion) {
    let rt = runtime();
    let h = Harness::start().expect("service harness");
    let dispatcher = Arc::clone(h.service.dispatcher());
    let parcel = check_access_parcel();
    let mut group = c.benchmark_group("dispatch");

    group.bench_function("dispatch_check_access", |b| {
        let dispatcher = &dispatcher;
        let parcel = &parcel;
        let gm = &h.group_manager;
        b.to_async(&rt).iter(|| async move {
            let reply = dispatcher.dispatch(DEV_AUTH_CALL_REQUEST, parcel).await;
            gm.clear_calls();
            black_box(reply.is_ok())
        })
    });

    let mut overstated = check_access_parcel();
    if let Some(count) = overstated.data.get_mut(8) {
        *count = count.wrapping_add(1);
    }
    group.bench_function("dispatch_rejected_count", |b| {
        let dispatcher = &dispatcher;
        let parcel = &overstated;
        b.to_async(&rt)
            .iter(|| async move { black_box(dispatcher.dispatch(DEV_AUTH_CALL_REQUEST, parcel).await.is_err()) })
    });

    group.finish();
}

pub fn bench_client_round_trip(c: &mut Criterion) {
    let rt = runtime();
    let h = Harness::start().expect("service harness");
    let client = h.client();
    let mut group = c.benchmark_group("client");

    group.bench_function("get_trusted_devices", |b| {
        let client = &client;
        let gm = &h.group_manager;
        b.to_async(&rt).iter(|| async move {
            let devices = client.get_trusted_devices(0, "svc.demo", "g1").await;
            gm.clear_calls();
            black_box(devices.map(|d| d.count))
        })
    });

    group.finish();
}

pub fn bench_registry_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");
    let hooks = DevAuthHooks {
        on_finish: HookId::new(1),
        ..Default::default()
    };

    for records in [1usize, 16, 64] {
        let registry = CallbackRegistry::new(records, records);
        for i in 0..records {
            let _ = registry.add_or_replace(
                CallbackKey::app(&format!("svc.app{i}")),
                CallbackType::DevAuth,
                CallbackFns::DeviceAuth(hooks),
            );
        }
        let last = CallbackKey::app(&format!("svc.app{}", records - 1));
        group.bench_with_input(BenchmarkId::new("lookup_last", records), &last, |b, key| {
            b.iter(|| black_box(registry.contains(key, CallbackType::DevAuth)))
        });
    }

    group.finish();
}
