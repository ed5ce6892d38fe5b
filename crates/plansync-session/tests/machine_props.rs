//! State machine laws over arbitrary event sequences

use plansync_session::{SyncEffect, SyncEvent, SyncMachine, SyncState};
use proptest::prelude::*;

fn arb_events() -> impl Strategy<Value = Vec<SyncEvent>> {
    prop::collection::vec(prop::sample::select(SyncEvent::ALL.to_vec()), 0..64)
}

proptest! {
    #[test]
    fn external_change_while_saving_never_transitions(auto_reload: bool, events in arb_events()) {
        let mut machine = SyncMachine::new(auto_reload);
        for event in events {
            let before = machine.state();
            let t = machine.handle(event);
            if before == SyncState::Saving && matches!(event, SyncEvent::ExternalChange(_)) {
                prop_assert!(t.is_noop());
            }
        }
    }

    #[test]
    fn at_most_one_save_in_flight(auto_reload: bool, events in arb_events()) {
        let mut machine = SyncMachine::new(auto_reload);
        let mut in_flight = false;
        for event in events {
            let t = machine.handle(event);
            if t.effects.contains(&SyncEffect::BeginSave) {
                prop_assert!(!in_flight);
                prop_assert_eq!(t.to, SyncState::Saving);
                in_flight = true;
            }
            if t.from == SyncState::Saving && t.to != SyncState::Saving {
                in_flight = false;
            }
            prop_assert_eq!(in_flight, machine.state() == SyncState::Saving);
        }
    }

    #[test]
    fn local_edit_is_never_dropped(auto_reload: bool, events in arb_events()) {
        let mut machine = SyncMachine::new(auto_reload);
        for event in events {
            let t = machine.handle(event);
            if event == SyncEvent::LocalEdit {
                prop_assert!(matches!(t.to, SyncState::Dirty | SyncState::Saving));
                if t.to == SyncState::Saving {
                    prop_assert!(machine.has_unsaved_edits());
                }
            }
        }
    }

    #[test]
    fn successful_reload_is_clean(auto_reload: bool, events in arb_events()) {
        let mut machine = SyncMachine::new(auto_reload);
        for event in events {
            let before = machine.state();
            let t = machine.handle(event);
            if event == SyncEvent::ReloadSucceeded && before != SyncState::Saving {
                prop_assert_eq!(t.to, SyncState::Clean);
            }
            if before == SyncState::Saving {
                prop_assert!(!t.effects.iter().any(|e| matches!(e, SyncEffect::Reload(_))));
            }
        }
    }

    #[test]
    fn reload_failure_is_a_no_op(auto_reload: bool, events in arb_events()) {
        let mut machine = SyncMachine::new(auto_reload);
        for event in events {
            machine.handle(event);
        }
        prop_assert!(machine.handle(SyncEvent::ReloadFailed).is_noop());
    }
}
