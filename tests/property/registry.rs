//! Property-based tests for the frame registry

use framenav::frame::{ReplicatedState, Representation};
use framenav::registry::FrameRegistry;
use framenav::types::FrameId;
use proptest::prelude::*;
use std::collections::HashSet;

/// Test that identifiers and tree handles stay unique under register/unregister churn
#[test]
fn test_handles_stay_unique_under_churn() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &proptest::collection::vec((0u32..16, any::<bool>()), 0..80),
            |ops| {
                let mut registry = FrameRegistry::new();
                let mut seen_handles = HashSet::new();
                for (id, register) in ops {
                    let id = FrameId(id);
                    if register {
                        let was_present = registry.contains(id);
                        let result = registry.register(
                            id,
                            Representation::placeholder(ReplicatedState::default()),
                        );
                        prop_assert_eq!(result.is_err(), was_present);
                        if let Ok(handle) = result {
                            prop_assert!(seen_handles.insert(handle));
                            prop_assert_eq!(registry.lookup_handle(handle), Some(id));
                        }
                    } else if let Some(entry) = registry.unregister(id) {
                        prop_assert_eq!(registry.lookup_handle(entry.handle()), None);
                        prop_assert!(!registry.contains(id));
                    }
                }
                prop_assert_eq!(registry.ids().len(), registry.len());
                Ok(())
            },
        )
        .unwrap();
}
