use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use liteorm::{ColumnInfo, ColumnType, Condition, Record, Schema, Select, Table};

/// A table with an integer key and `n` text columns.
fn wide_table(n: usize) -> Table {
    let mut builder = Schema::builder("bench").primary("id", ColumnType::Integer);
    for i in 0..n {
        builder = builder.column(format!("col{i}"), ColumnInfo::sized(ColumnType::NVarChar, 64));
    }
    Table::new(builder.build().expect("valid bench schema"))
}

fn bench_condition_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/condition_render");

    for n in [1, 5, 10, 50] {
        let cond = (0..n).fold(Condition::new(), |cond, i| {
            cond.equals([(format!("col{i}"), i as i64)])
                .or()
                .group(|g| g.contains([(format!("col{i}"), "x'y")]))
        });
        group.bench_with_input(BenchmarkId::from_parameter(n), &cond, |b, cond| {
            b.iter(|| black_box(cond.sql()));
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/select");

    for n in [1, 10, 50] {
        let table = wide_table(n);
        let select = Select::new()
            .filter(|c| c.in_list([("id", 0..100i64)]))
            .limit(10);
        group.bench_with_input(BenchmarkId::from_parameter(n), &select, |b, select| {
            b.iter(|| black_box(table.select_sql(select)));
        });
    }

    group.finish();
}

fn bench_insert_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/insert_many");
    let table = wide_table(5);

    for rows in [10, 100, 1000] {
        let records: Vec<Record> = (0..rows)
            .map(|i| {
                (0..5).fold(Record::new().with("id", i as i64), |r, c| {
                    r.with(format!("col{c}"), format!("value {i}'{c}"))
                })
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(rows), &records, |b, records| {
            b.iter(|| black_box(table.insert_many_sql(records)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_condition_render,
    bench_select,
    bench_insert_many
);
criterion_main!(benches);
