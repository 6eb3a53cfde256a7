// tests/resource_properties.rs
//
// Property coverage for the usage accounting: whatever sequence of records,
// releases and sweeps a pool sees, the tracked total must equal the sum of
// the usages it still holds, and the TTL index must stay consistent with
// the usage table.

use chrono::{Duration, Utc};
use proptest::prelude::*;

use resource_admission::models::{Resource, ResourceUsage};

#[derive(Debug, Clone)]
enum Op {
    /// Record a usage with the given id suffix, units and optional TTL.
    Record(u8, f64, Option<i64>),
    /// Release the usage with the given id suffix.
    Clear(u8),
    /// Sweep at now + the given offset in seconds.
    Sweep(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8, 1.0f64..5.0, prop::option::of(1i64..30)).prop_map(|(id, units, ttl)| {
            Op::Record(id, units, ttl)
        }),
        (0u8..8).prop_map(Op::Clear),
        (0i64..60).prop_map(Op::Sweep),
    ]
}

proptest! {
    #[test]
    fn accounting_stays_consistent(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let base = Utc::now();
        let mut res = Resource::new("cgrates.org", "RL1");

        for op in ops {
            match op {
                Op::Record(id, units, ttl) => {
                    let usage = ResourceUsage {
                        tenant: "cgrates.org".to_string(),
                        id: format!("u{}", id),
                        expiry_time: None,
                        units,
                    };
                    // duplicates are legitimately rejected, ignore them
                    let _ = res.record_usage(usage, ttl.map(Duration::seconds), base);
                }
                Op::Clear(id) => {
                    let _ = res.clear_usage(&format!("u{}", id));
                }
                Op::Sweep(offset) => {
                    res.remove_expired(base + Duration::seconds(offset));
                }
            }

            // cached total always equals the recomputed sum
            let expected: f64 = res.usages.values().map(|u| u.units).sum();
            prop_assert!((res.total_usage() - expected).abs() < 1e-9);

            // every TTL index entry points at a usage that carries an expiry
            for id in &res.ttl_idx {
                let usage = res.usages.get(id);
                prop_assert!(usage.is_some());
                prop_assert!(usage.unwrap().expiry_time.is_some());
            }
            // and every usage with an expiry is indexed exactly once
            for (id, usage) in &res.usages {
                if usage.expiry_time.is_some() {
                    prop_assert_eq!(res.ttl_idx.iter().filter(|i| *i == id).count(), 1);
                }
            }
        }
    }
}
