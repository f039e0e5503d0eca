//! Throughput benchmark for a full event's worth of carrier propagation.

use apx_core::field::{FieldGrid, FieldStore, MappingPolicy, PadPotential, WeightingPotential};
use apx_core::geometry::{CarrierType, PixelDetectorModel, Point3D};
use apx_core::physics::{DetrappingModel, ImpactIonizationModel, MobilityModel, RecombinationModel, TrappingModel};
use apx_core::propagator::{propagate_event, DepositedCharge, PropagatorConfig, PropagatorModels};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn event_deposits(count: usize) -> Vec<DepositedCharge> {
    (0..count)
        .map(|i| {
            let x = (i as f64 % 10.0) * 0.004;
            DepositedCharge {
                local_position: Point3D::new(x, 0.0, -0.1),
                global_position: Point3D::new(x, 0.0, -0.1),
                carrier_type: if i % 2 == 0 { CarrierType::Electron } else { CarrierType::Hole },
                charge: 80,
                local_time: 0.0,
                global_time: 0.0,
            }
        })
        .collect()
}

fn propagate_event_benchmark(c: &mut Criterion) {
    let electric = FieldGrid::<3>::new((2, 2, 2), (1.0, 1.0, 0.3), MappingPolicy::Sensor, vec![0.0; 24].into_iter().enumerate().map(|(i, _)| if i % 3 == 2 { -5.0 } else { 0.0 }).collect()).unwrap();
    let field = FieldStore::new(electric, WeightingPotential::Analytic(PadPotential::new((0.05, 0.05), 0.3)));
    let detector = PixelDetectorModel::new((0.05, 0.05), (50, 50), 0.3, (0.03, 0.03));
    let models = PropagatorModels {
        mobility: MobilityModel::JacoboniCanali,
        recombination: RecombinationModel::ShockleyReadHall,
        trapping: TrappingModel::None,
        detrapping: DetrappingModel::None,
        impact_ionization: ImpactIonizationModel::None,
    };
    let config = PropagatorConfig { t_integration: 10.0, charge_per_step: 10, use_adaptive_rk: true, ..Default::default() };
    let deposits = event_deposits(50);

    c.bench_function("propagate_event_50_deposits", |b| {
        b.iter(|| black_box(propagate_event(black_box(&deposits), &field, &detector, &models, &config, 42)))
    });
}

criterion_group!(benches, propagate_event_benchmark);
criterion_main!(benches);
