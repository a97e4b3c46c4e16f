use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;

use densematch_3d::overlap::overlap_ratio;
use densematch_3d::pointcloud::PointCloud;
use densematch_3d::pose::Pose;
use densematch_3d::spatial::{build_index, query_matches};

fn random_points(num_points: usize) -> Vec<[f64; 3]> {
    let mut rng = rand::rng();
    (0..num_points)
        .map(|_| {
            [
                rng.random_range(0.0..2.0),
                rng.random_range(0.0..2.0),
                rng.random_range(0.0..2.0),
            ]
        })
        .collect()
}

fn bench_query_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_matches");

    for num_points in [1000, 10000, 100000].iter() {
        group.throughput(criterion::Throughput::Elements(*num_points as u64));
        let parameter_string = format!("{}", num_points);

        let source = random_points(*num_points);
        let target = random_points(*num_points);
        let Ok(index) = build_index(&target) else {
            continue;
        };
        let transform = Pose::from_translation(&[0.01, 0.0, 0.0]);

        for k_cap in [None, Some(1)] {
            group.bench_with_input(
                BenchmarkId::new(format!("k_cap_{k_cap:?}"), &parameter_string),
                &(&index, &source),
                |b, i| {
                    let (index, source) = (i.0, i.1);
                    b.iter(|| {
                        black_box(query_matches(index, source, &transform, 0.05, k_cap))
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_overlap_ratio(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlap_ratio");

    for num_points in [10000, 100000].iter() {
        group.throughput(criterion::Throughput::Elements(*num_points as u64));
        let parameter_string = format!("{}", num_points);

        let cloud0 = PointCloud::from_points(random_points(*num_points));
        let cloud1 = PointCloud::from_points(random_points(*num_points));

        for voxel_size in [0.025, 0.05] {
            group.bench_with_input(
                BenchmarkId::new(format!("voxel_{voxel_size}"), &parameter_string),
                &(&cloud0, &cloud1),
                |b, i| {
                    let (cloud0, cloud1) = (i.0, i.1);
                    b.iter(|| {
                        black_box(overlap_ratio(cloud0, cloud1, &Pose::IDENTITY, voxel_size))
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_query_matches, bench_overlap_ratio);
criterion_main!(benches);
