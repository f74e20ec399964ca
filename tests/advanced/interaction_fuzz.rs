#![cfg(feature = "advanced-tests")]
//! Property-based tests interleaving sends, completions and inbound requests.
//!
//! A simple model tracks which local exchanges are still open and which
//! inbound message ids were already seen; the matcher's tables and duplicate
//! flags must agree with it after every random interleaving.

use std::{collections::HashSet, sync::Arc};

use coap_matcher::{
    Code,
    DeduplicatorKind,
    Exchange,
    Matcher,
    MatcherConfig,
    Message,
    MessageType,
    Origin,
    Token,
};
use coap_matcher_testing::{con_get, other_peer, peer};
use proptest::prelude::*;
use rstest::rstest;

#[derive(Debug, Clone)]
enum Action {
    Send,
    Complete(usize),
    Inbound { id: u8, other: bool },
}

#[derive(Default)]
struct Outcome {
    open: usize,
    sizes: (usize, usize, usize),
    fresh_inbound: usize,
    distinct_inbound: usize,
}

fn run_actions(actions: &[Action]) -> Outcome {
    let config = MatcherConfig::builder()
        .use_random_id_start(false)
        .deduplicator(DeduplicatorKind::MarkAndSweep)
        .build()
        .expect("valid configuration");
    let matcher = Matcher::new(config);
    let mut local: Vec<Arc<Exchange>> = Vec::new();
    let mut seen = HashSet::new();
    let mut fresh_inbound = 0;

    for action in actions {
        match action {
            Action::Send => {
                let n = u32::try_from(local.len()).expect("few sends");
                let request = Arc::new(
                    Message::request(MessageType::Con, Code::GET)
                        .with_token(Token::new(n.to_be_bytes().to_vec()).expect("4-byte token"))
                        .with_destination(peer()),
                );
                let exchange = Arc::new(Exchange::new(Arc::clone(&request), Origin::Local));
                matcher.send_request(&exchange, &request);
                local.push(exchange);
            }
            Action::Complete(pick) => {
                if !local.is_empty() {
                    local[pick % local.len()].set_complete();
                }
            }
            Action::Inbound { id, other } => {
                let message = con_get(u16::from(*id), &[*id]);
                let message = if *other {
                    message.with_source(other_peer())
                } else {
                    message
                };
                let message = Arc::new(message);
                matcher.receive_request(&message).expect("request is keyable");
                seen.insert((*id, *other));
                if !message.is_duplicate() {
                    fresh_inbound += 1;
                }
            }
        }
    }

    Outcome {
        open: local.iter().filter(|exchange| !exchange.is_complete()).count(),
        sizes: matcher.table_sizes(),
        fresh_inbound,
        distinct_inbound: seen.len(),
    }
}

fn check(actions: &[Action]) {
    let outcome = run_actions(actions);
    assert_eq!(outcome.sizes, (outcome.open, outcome.open, 0));
    assert_eq!(outcome.fresh_inbound, outcome.distinct_inbound);
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Send),
        any::<usize>().prop_map(Action::Complete),
        (0u8..8, any::<bool>()).prop_map(|(id, other)| Action::Inbound { id, other }),
    ]
}

proptest! {
    #[test]
    fn tables_track_open_exchanges(actions in proptest::collection::vec(action_strategy(), 0..64)) {
        let outcome = run_actions(&actions);
        prop_assert_eq!(outcome.sizes, (outcome.open, outcome.open, 0));
        prop_assert_eq!(outcome.fresh_inbound, outcome.distinct_inbound);
    }
}

#[rstest]
#[case::empty(Vec::new())]
#[case::complete_before_send(vec![Action::Complete(0), Action::Send])]
#[case::double_complete(vec![Action::Send, Action::Complete(0), Action::Complete(0), Action::Send])]
#[case::same_id_both_peers(vec![
    Action::Inbound { id: 1, other: false },
    Action::Inbound { id: 1, other: true },
    Action::Inbound { id: 1, other: false },
])]
fn boundary_cases(#[case] actions: Vec<Action>) { check(&actions); }
