//! Property-based tests for the mode/tier invariant
//!
//! These tests verify:
//! - `mode ∈ allowed_modes(tier)` holds after every operation, for any
//!   sequence of switch/confirm/cancel requests
//! - A denied switch never mutates the mode
//! - At most one pending switch exists, and it tracks the latest request

mod common;

use std::sync::Arc;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use common::{test_principal, MockConfigProvider};
use meridian_core::{AccessConfig, AccessController, EventBus, SwitchOutcome};
use meridian_store::MemoryStore;
use meridian_types::{Mode, Tier};

// ============================================================================
// Strategies
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Op {
    Switch { target: Mode, confirm: bool },
    Confirm,
    Cancel,
    Upgrade(Tier),
}

fn arb_mode() -> impl Strategy<Value = Mode> {
    prop_oneof![Just(Mode::Lite), Just(Mode::Pro), Just(Mode::Advanced)]
}

fn arb_tier() -> impl Strategy<Value = Tier> {
    prop_oneof![Just(Tier::Basic), Just(Tier::Pro), Just(Tier::Premium)]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (arb_mode(), any::<bool>())
            .prop_map(|(target, confirm)| Op::Switch { target, confirm }),
        2 => Just(Op::Confirm),
        1 => Just(Op::Cancel),
        1 => arb_tier().prop_map(Op::Upgrade),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Property: the mode/tier invariant survives any operation sequence
    #[test]
    fn prop_mode_stays_within_tier(
        tier in arb_tier(),
        ops in prop::collection::vec(arb_op(), 1..40),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        let result: Result<(), TestCaseError> = rt.block_on(async {
            let provider = Arc::new(MockConfigProvider::with_tier(tier));
            let controller = AccessController::new(
                AccessConfig::default(),
                Arc::clone(&provider),
                Arc::new(MemoryStore::new()),
                EventBus::new(),
            );
            controller.load_configuration(&test_principal(tier)).await;

            for op in &ops {
                let mode_before = controller.mode();
                match *op {
                    Op::Switch { target, confirm } => {
                        match controller.switch_mode(target, confirm) {
                            SwitchOutcome::UpgradeRequired { required_tier, .. } => {
                                // A denied switch never mutates the mode
                                prop_assert_eq!(controller.mode(), mode_before);
                                prop_assert!(required_tier.level() > controller.tier().level());
                            }
                            SwitchOutcome::ConfirmationRequired => {
                                // The pending switch tracks the latest request
                                prop_assert_eq!(
                                    controller.pending_switch().unwrap().target,
                                    target
                                );
                                prop_assert_eq!(controller.mode(), mode_before);
                            }
                            SwitchOutcome::Switched => {
                                prop_assert_eq!(controller.mode(), target);
                                prop_assert!(controller.pending_switch().is_none());
                            }
                            SwitchOutcome::NoOp | SwitchOutcome::Busy => {}
                        }
                    }
                    Op::Confirm => {
                        if let SwitchOutcome::UpgradeRequired { .. } =
                            controller.confirm_switch()
                        {
                            prop_assert_eq!(controller.mode(), mode_before);
                        }
                        prop_assert!(controller.pending_switch().is_none());
                    }
                    Op::Cancel => {
                        controller.cancel_switch();
                        prop_assert!(controller.pending_switch().is_none());
                        prop_assert_eq!(controller.mode(), mode_before);
                    }
                    Op::Upgrade(new_tier) => {
                        let _ = controller.upgrade_tier(new_tier).await;
                    }
                }

                // The invariant holds at every observable instant
                prop_assert!(
                    controller.tier_definition().allows(controller.mode()),
                    "mode {} escaped tier {}",
                    controller.mode(),
                    controller.tier()
                );
            }
            Ok(())
        });
        result?;
    }
}
