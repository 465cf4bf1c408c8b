//! Benchmarks for command template expansion
//!
//! Tests performance of placeholder expansion and argument splitting.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use diskforged_tools::template::{display_command, split_posix, split_windows, Placeholder};
use diskforged_tools::TemplateContext;
use std::path::Path;

/// Default read template
const TEMPLATE_READ: &str =
    "{reader} read --drive={drive} --tracks={tracks} --revs={revs} {capture}";

/// Default convert template
const TEMPLATE_CONVERT: &str = "{converter} {capture} {outbase} -o=EDSK";

/// Template written against the legacy names
const TEMPLATE_LEGACY: &str =
    "{gw} read --drive={drive} --tracks={tracks} --revs={revs} {scp} && {sugar} {scp} {dsk}";

/// Template with no placeholders (baseline)
const TEMPLATE_NO_VARS: &str = "gw read --drive=0 --tracks=c=0-79:h=0-1 --revs=5 disk.scp";

/// Template with escaped braces and quoting
const TEMPLATE_QUOTED: &str =
    "{reader} read --format={{ibm.720}} \"--tracks={tracks}\" \"{capture}\"";

fn create_context() -> TemplateContext {
    TemplateContext::new()
        .with_path(Placeholder::Reader, Path::new("/usr/local/bin/gw"))
        .with_path(
            Placeholder::Converter,
            Path::new("/home/user/SugarConvDsk/SugarConvDsk"),
        )
        .with_path(
            Placeholder::Capture,
            Path::new("/home/user/Desktop/TatungBytes_20240131_101500.scp"),
        )
        .with_path(
            Placeholder::OutBase,
            Path::new("/home/user/Desktop/TatungBytes_20240131_101500"),
        )
        .with_value(Placeholder::Drive, "0")
        .with_value(Placeholder::Tracks, "c=0-39:h=0")
        .with_value(Placeholder::Revs, "3")
}

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand");

    let ctx = create_context();

    for (name, template) in [
        ("no_vars", TEMPLATE_NO_VARS),
        ("read", TEMPLATE_READ),
        ("convert", TEMPLATE_CONVERT),
        ("legacy", TEMPLATE_LEGACY),
        ("quoted", TEMPLATE_QUOTED),
    ] {
        group.throughput(Throughput::Bytes(template.len() as u64));
        group.bench_with_input(BenchmarkId::new("template", name), &template, |b, t| {
            b.iter(|| ctx.expand(black_box(t)));
        });
    }

    group.finish();
}

fn bench_expand_args(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_args");

    let ctx = create_context();

    group.bench_with_input(
        BenchmarkId::new("template", "read"),
        &TEMPLATE_READ,
        |b, template| {
            b.iter(|| ctx.expand_args(black_box(template)));
        },
    );

    group.bench_with_input(
        BenchmarkId::new("template", "quoted"),
        &TEMPLATE_QUOTED,
        |b, template| {
            b.iter(|| ctx.expand_args(black_box(template)));
        },
    );

    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");

    let posix = "/usr/local/bin/gw read --drive=0 '--tracks=c=0-39:h=0' \"/home/user/My Disks/a.scp\"";
    let windows = r#"C:\tools\gw.exe read --drive=0 --tracks=c=0-39:h=0 "C:\Users\me\My Disks\a.scp""#;

    group.bench_function("posix", |b| b.iter(|| split_posix(black_box(posix))));
    group.bench_function("windows", |b| b.iter(|| split_windows(black_box(windows))));

    group.finish();
}

fn bench_display_command(c: &mut Criterion) {
    let argv: Vec<String> = create_context().expand_args(TEMPLATE_QUOTED).unwrap_or_default();

    c.bench_function("display_command", |b| {
        b.iter(|| display_command(black_box(&argv)))
    });
}

fn bench_context_creation(c: &mut Criterion) {
    c.bench_function("context_creation", |b| b.iter(create_context));
}

criterion_group!(
    benches,
    bench_expand,
    bench_expand_args,
    bench_split,
    bench_display_command,
    bench_context_creation,
);
criterion_main!(benches);
