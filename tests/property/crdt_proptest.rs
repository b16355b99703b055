//! P1 (convergence) and P2 (idempotence) from the CRDT engine's
//! invariants: arbitrary interleavings of the same updates land on the
//! same content, and re-delivering an update changes nothing.

use proptest::prelude::*;
use roomsync::backend::crdt::CrdtEngine;

fn words() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-zA-Z]{1,8}", 1..6)
}

proptest! {
    #[test]
    fn convergence_is_independent_of_delivery_order(words in words()) {
        let mut replicas: Vec<CrdtEngine> = (0..words.len())
            .map(|i| CrdtEngine::new(&format!("replica-{i}")))
            .collect();

        let updates: Vec<Vec<u8>> = replicas
            .iter_mut()
            .zip(&words)
            .map(|(replica, word)| {
                replica.insert_local(0, word);
                replica.encode_full_state()
            })
            .collect();

        // Replica 0 applies updates in forward order, replica 1 (if it
        // exists) applies them in reverse. Both must still converge.
        for update in &updates {
            replicas[0].apply_update(update).unwrap();
        }
        let forward_content = replicas[0].content();

        let mut reverse_replica = CrdtEngine::new("reverse");
        for update in updates.iter().rev() {
            reverse_replica.apply_update(update).unwrap();
        }

        prop_assert_eq!(forward_content, reverse_replica.content());
    }

    #[test]
    fn reapplying_an_update_does_not_change_content(word in "[a-zA-Z]{1,12}") {
        let mut source = CrdtEngine::new("source");
        source.insert_local(0, &word);
        let update = source.encode_full_state();

        let mut target = CrdtEngine::new("target");
        target.apply_update(&update).unwrap();
        let once = target.content();

        target.apply_update(&update).unwrap();
        prop_assert_eq!(target.content(), once);
    }
}
