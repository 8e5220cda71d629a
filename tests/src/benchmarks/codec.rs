//! # Wire Codec Benchmarks
//!
//! Every call stages up to eight parameters and every received request is
//! decoded against its declared count, so both sides run once per call.

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use devauth_types::framing::{read_request, write_request};
use devauth_types::{MethodId, ParamList, ParamTag, ParamWriter, MAX_PARAM_SLOTS};
use rand::Rng;

fn random_json(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let body: String = (0..len).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect();
    format!("{{\"groupName\":\"{body}\"}}")
}

/// The parameter set of a typical group mutation.
fn stage_group_op(params: &str) -> ParamWriter {
    let mut writer = ParamWriter::new();
    let staged = writer
        .push_i32(ParamTag::OsAccountId, 100)
        .and_then(|w| w.push_i64(ParamTag::ReqId, 42))
        .and_then(|w| w.push_str(ParamTag::AppId, "svc.demo"))
        .and_then(|w| w.push_str(ParamTag::CreateParams, params));
    black_box(staged.is_ok());
    writer
}

pub fn bench_param_staging(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec-staging");

    for size in [16, 256, 4096] {
        let params = random_json(size);
        group.throughput(Throughput::Bytes(params.len() as u64));
        group.bench_with_input(BenchmarkId::new("stage_group_op", size), &params, |b, params| {
            b.iter(|| black_box(stage_group_op(params).count()))
        });
    }

    group.finish();
}

pub fn bench_counted_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec-decode");

    for size in [16, 256, 4096] {
        let (body, count) = stage_group_op(&random_json(size)).into_parts();
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::new("decode_counted", size), &body, |b, body| {
            b.iter(|| {
                let params = ParamList::decode_counted(body, count, MAX_PARAM_SLOTS);
                black_box(params.map(|p| p.len()).unwrap_or_default())
            })
        });
    }

    // Worst case for the count check: the declared count overstates the body.
    let (body, count) = stage_group_op("{}").into_parts();
    group.bench_function("decode_count_mismatch", |b| {
        b.iter(|| black_box(ParamList::decode_counted(&body, count + 1, MAX_PARAM_SLOTS).is_err()))
    });

    group.finish();
}

pub fn bench_request_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec-framing");
    let (body, count) = stage_group_op(&random_json(256)).into_parts();
    let method = MethodId::CreateGroup.as_i32();

    group.bench_function("write_request", |b| {
        b.iter(|| black_box(write_request(method, count, &body).map(|f| f.len())))
    });

    let frame = write_request(method, count, &body).unwrap_or_default();
    group.bench_function("read_request", |b| {
        b.iter(|| black_box(read_request(&frame).map(|(header, body)| (header.param_count, body.len()))))
    });

    group.finish();
}
