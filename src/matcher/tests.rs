//! Unit tests for the matcher's send and receive paths.

use std::{net::SocketAddr, sync::Arc};

use rstest::{fixture, rstest};

use super::Matcher;
use crate::{
    config::{DeduplicatorKind, MatcherConfig},
    error::MatchError,
    exchange::{Exchange, Origin},
    key::{KeyId, KeyToken, KeyUri},
    message::{BlockOption, Code, Message, MessageType, Token},
    observe::ObserveRelation,
};

fn peer() -> SocketAddr { "192.0.2.1:5683".parse().expect("valid address") }

fn other_peer() -> SocketAddr { "192.0.2.2:5683".parse().expect("valid address") }

fn token(bytes: &[u8]) -> Token { Token::new(bytes.to_vec()).expect("short token") }

#[fixture]
fn matcher() -> Matcher {
    let config = MatcherConfig::builder()
        .use_random_id_start(false)
        .build()
        .expect("valid configuration");
    Matcher::new(config)
}

/// Send a confirmable GET as a new local exchange.
fn send_local(matcher: &Matcher, id: Option<u16>, token_bytes: &[u8]) -> Arc<Exchange> {
    let mut request = Message::request(MessageType::Con, Code::GET)
        .with_token(token(token_bytes))
        .with_destination(peer());
    if let Some(id) = id {
        request = request.with_id(id);
    }
    let request = Arc::new(request);
    let exchange = Arc::new(Exchange::new(Arc::clone(&request), Origin::Local));
    matcher.send_request(&exchange, &request);
    exchange
}

fn inbound_get(id: u16, source: SocketAddr) -> Arc<Message> {
    Arc::new(
        Message::request(MessageType::Con, Code::GET)
            .with_id(id)
            .with_source(source)
            .with_uri("/big"),
    )
}

#[rstest]
fn piggy_backed_response_resolves_and_completion_purges(matcher: Matcher) {
    let exchange = send_local(&matcher, Some(5), &[0xab]);
    assert_eq!(matcher.table_sizes(), (1, 1, 0));

    let response = Arc::new(
        Message::response(MessageType::Ack, Code::CONTENT)
            .with_id(5)
            .with_token(token(&[0xab]))
            .with_source(peer()),
    );
    let found = matcher
        .receive_response(&response)
        .expect("response is keyable")
        .expect("response should match");
    assert!(Arc::ptr_eq(&found, &exchange));
    assert!(!response.is_duplicate());
    assert!(matcher.find_by_id(&KeyId::local(5)).is_none());

    assert!(exchange.set_complete());
    assert!(matcher.find_by_token(&KeyToken::new(token(&[0xab]))).is_none());
    assert_eq!(matcher.table_sizes(), (0, 0, 0));
}

#[rstest]
fn repeated_response_is_flagged_duplicate(matcher: Matcher) {
    let exchange = send_local(&matcher, Some(5), &[0xab]);
    let ack = || {
        Arc::new(
            Message::response(MessageType::Ack, Code::CONTENT)
                .with_id(5)
                .with_token(token(&[0xab]))
                .with_source(peer()),
        )
    };

    let first = ack();
    matcher.receive_response(&first).expect("keyable");
    let second = ack();
    let found = matcher
        .receive_response(&second)
        .expect("keyable")
        .expect("duplicate still resolves");
    assert!(Arc::ptr_eq(&found, &exchange));
    assert!(!first.is_duplicate());
    assert!(second.is_duplicate());
}

#[rstest]
fn separate_response_retransmitted_after_completion_is_duplicate(matcher: Matcher) {
    let exchange = send_local(&matcher, Some(20), &[0x01, 0x02]);
    let response = || {
        Arc::new(
            Message::response(MessageType::Con, Code::CONTENT)
                .with_id(500)
                .with_token(token(&[0x01, 0x02]))
                .with_source(peer()),
        )
    };

    let first = response();
    assert!(matcher.receive_response(&first).expect("keyable").is_some());
    exchange.set_complete();

    let again = response();
    let found = matcher
        .receive_response(&again)
        .expect("keyable")
        .expect("deduplicator remembers the exchange");
    assert!(Arc::ptr_eq(&found, &exchange));
    assert!(again.is_duplicate());
}

#[rstest]
fn unmatched_responses_resolve_to_nothing(matcher: Matcher) {
    let stray_ack = Arc::new(
        Message::response(MessageType::Ack, Code::CONTENT)
            .with_id(77)
            .with_token(token(&[0xee])),
    );
    let stray_con = Arc::new(
        Message::response(MessageType::Con, Code::CONTENT)
            .with_id(78)
            .with_token(token(&[0xee]))
            .with_source(peer()),
    );
    assert!(matcher.receive_response(&stray_ack).expect("keyable").is_none());
    assert!(matcher.receive_response(&stray_con).expect("keyable").is_none());
    assert!(!stray_con.is_duplicate());
}

#[rstest]
fn retransmitted_request_returns_first_exchange(matcher: Matcher) {
    let first = inbound_get(7, peer());
    let second = inbound_get(7, peer());

    let exchange = matcher.receive_request(&first).expect("keyable");
    let again = matcher.receive_request(&second).expect("keyable");
    assert!(Arc::ptr_eq(&exchange, &again));
    assert!(!first.is_duplicate());
    assert!(second.is_duplicate());
    assert_eq!(exchange.origin(), Origin::Remote);
}

#[rstest]
fn same_id_from_different_peers_is_not_a_duplicate(matcher: Matcher) {
    let a = matcher.receive_request(&inbound_get(7, peer())).expect("keyable");
    let request = inbound_get(7, other_peer());
    let b = matcher.receive_request(&request).expect("keyable");
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!request.is_duplicate());
}

#[rstest]
fn noop_deduplicator_never_reports_duplicates() {
    let config = MatcherConfig::builder()
        .deduplicator(DeduplicatorKind::Noop)
        .build()
        .expect("valid configuration");
    let matcher = Matcher::new(config);
    let first = matcher.receive_request(&inbound_get(7, peer())).expect("keyable");
    let request = inbound_get(7, peer());
    let second = matcher.receive_request(&request).expect("keyable");
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!request.is_duplicate());
}

#[rstest]
fn ids_come_from_the_counter_when_absent(matcher: Matcher) {
    let first = send_local(&matcher, None, &[0x01]);
    let second = send_local(&matcher, None, &[0x02]);
    let explicit = send_local(&matcher, Some(900), &[0x03]);

    let id = |exchange: &Arc<Exchange>| exchange.current_request().and_then(|r| r.id());
    assert_eq!(id(&first), Some(0));
    assert_eq!(id(&second), Some(1));
    assert_eq!(id(&explicit), Some(900));
    assert!(matcher.find_by_id(&KeyId::local(1)).is_some());
}

#[rstest]
fn message_ids_wrap_around(matcher: Matcher) {
    for _ in 0..u16::MAX {
        matcher.next_id();
    }
    assert_eq!(matcher.next_id(), u16::MAX);
    assert_eq!(matcher.next_id(), 0);
}

#[rstest]
fn empty_ack_consumes_the_id_entry(matcher: Matcher) {
    let exchange = send_local(&matcher, Some(9), &[0x09]);
    let ack = Message::empty(MessageType::Ack).with_id(9).with_source(peer());

    let found = matcher
        .receive_empty_message(&ack)
        .expect("keyable")
        .expect("ACK should match");
    assert!(Arc::ptr_eq(&found, &exchange));
    assert!(matcher.receive_empty_message(&ack).expect("keyable").is_none());
    // The token entry stays until the response arrives.
    assert_eq!(matcher.table_sizes(), (0, 1, 0));
}

#[rstest]
fn messages_without_keys_are_rejected(matcher: Matcher) {
    let no_id = Message::empty(MessageType::Rst);
    assert_eq!(
        matcher.receive_empty_message(&no_id).map(|_| ()),
        Err(MatchError::MissingId {
            kind: MessageType::Rst
        })
    );

    let no_source = Arc::new(Message::request(MessageType::Non, Code::GET).with_id(3));
    assert_eq!(
        matcher.receive_request(&no_source).map(|_| ()),
        Err(MatchError::MissingSource {
            kind: MessageType::Non,
            id: 3
        })
    );

    let no_uri = Arc::new(
        Message::request(MessageType::Con, Code::PUT)
            .with_id(4)
            .with_source(peer())
            .with_block1(BlockOption::new(0, true, 6)),
    );
    assert_eq!(
        matcher.receive_request(&no_uri).map(|_| ()),
        Err(MatchError::MissingUri)
    );
}

#[rstest]
fn block2_response_without_destination_leaves_tables_untouched(matcher: Matcher) {
    let exchange = matcher.receive_request(&inbound_get(10, peer())).expect("keyable");
    let response = Message::response(MessageType::Con, Code::CONTENT)
        .with_block2(BlockOption::new(0, true, 6))
        .with_last(false);

    let result = matcher.send_response(&exchange, &response);
    assert!(matches!(
        result,
        Err(MatchError::MissingDestination {
            kind: MessageType::Con,
            ..
        })
    ));
    assert_eq!(matcher.table_sizes(), (0, 0, 0));
}

#[rstest]
fn block1_requests_continue_the_ongoing_exchange(matcher: Matcher) {
    let block = |id: u16, num: u32, more: bool| {
        Arc::new(
            Message::request(MessageType::Con, Code::PUT)
                .with_id(id)
                .with_source(peer())
                .with_uri("/upload")
                .with_block1(BlockOption::new(num, more, 6)),
        )
    };

    let exchange = matcher.receive_request(&block(1, 0, true)).expect("keyable");
    let key = KeyUri::new("/upload", peer());
    assert!(matcher.find_ongoing(&key).is_some());

    for (id, num, more) in [(2, 1, true), (3, 2, false)] {
        let request = block(id, num, more);
        let next = matcher.receive_request(&request).expect("keyable");
        assert!(Arc::ptr_eq(&next, &exchange));
        assert!(!request.is_duplicate());
        exchange.set_current_request(Some(request));
    }

    exchange.set_complete();
    assert!(matcher.find_ongoing(&key).is_none());
}

#[rstest]
fn block1_response_alone_releases_the_transfer(matcher: Matcher) {
    let first = Arc::new(
        Message::request(MessageType::Con, Code::PUT)
            .with_id(1)
            .with_source(peer())
            .with_uri("/upload")
            .with_block1(BlockOption::new(0, true, 6)),
    );
    let exchange = matcher.receive_request(&first).expect("keyable");
    let key = KeyUri::new("/upload", peer());
    assert!(matcher.find_ongoing(&key).is_some());

    exchange.set_current_request(Some(Arc::new(
        Message::request(MessageType::Con, Code::PUT)
            .with_id(2)
            .with_source(peer())
            .with_uri("/upload"),
    )));
    exchange.set_current_response(Some(Arc::new(
        Message::response(MessageType::Ack, Code::CHANGED)
            .with_id(2)
            .with_block1(BlockOption::new(1, false, 6)),
    )));
    exchange.set_complete();
    assert!(matcher.find_ongoing(&key).is_none());
}

#[rstest]
fn block2_transfer_spans_several_requests(matcher: Matcher) {
    let exchange = matcher.receive_request(&inbound_get(10, peer())).expect("keyable");
    let key = KeyUri::new("/big", peer());

    let first = Arc::new(
        Message::response(MessageType::Ack, Code::CONTENT)
            .with_id(10)
            .with_destination(peer())
            .with_block2(BlockOption::new(0, true, 6))
            .with_last(false),
    );
    exchange.set_current_response(Some(Arc::clone(&first)));
    matcher.send_response(&exchange, &first).expect("keyable");
    assert!(matcher.find_ongoing(&key).is_some());
    assert!(!exchange.is_complete());

    let second_request = Arc::new(
        Message::request(MessageType::Con, Code::GET)
            .with_id(11)
            .with_source(peer())
            .with_uri("/big")
            .with_block2(BlockOption::new(1, false, 6)),
    );
    let continued = matcher.receive_request(&second_request).expect("keyable");
    assert!(Arc::ptr_eq(&continued, &exchange));
    exchange.set_current_request(Some(second_request));

    let second = Arc::new(
        Message::response(MessageType::Non, Code::CONTENT)
            .with_id(300)
            .with_destination(peer())
            .with_block2(BlockOption::new(1, true, 6))
            .with_last(false),
    );
    exchange.set_current_response(Some(Arc::clone(&second)));
    matcher.send_response(&exchange, &second).expect("keyable");
    assert!(matcher.find_by_id(&KeyId::local(300)).is_some());

    let third_request = Arc::new(
        Message::request(MessageType::Con, Code::GET)
            .with_id(12)
            .with_source(peer())
            .with_uri("/big")
            .with_block2(BlockOption::new(2, false, 6)),
    );
    let continued = matcher.receive_request(&third_request).expect("keyable");
    assert!(Arc::ptr_eq(&continued, &exchange));
    // The superseded NON block left the id table.
    assert!(matcher.find_by_id(&KeyId::local(300)).is_none());
    exchange.set_current_request(Some(third_request));

    let last = Arc::new(
        Message::response(MessageType::Ack, Code::CONTENT)
            .with_id(12)
            .with_destination(peer())
            .with_block2(BlockOption::new(2, false, 6)),
    );
    exchange.set_current_response(Some(Arc::clone(&last)));
    matcher.send_response(&exchange, &last).expect("keyable");
    assert!(exchange.is_complete());
    assert_eq!(matcher.table_sizes(), (0, 0, 0));
}

#[rstest]
fn confirmable_notification_supersedes_pending_ones(matcher: Matcher) {
    let request = Arc::new(
        Message::request(MessageType::Con, Code::GET)
            .with_id(30)
            .with_source(peer())
            .with_uri("/obs")
            .with_observe(0),
    );
    let exchange = matcher.receive_request(&request).expect("keyable");
    let relation = Arc::new(ObserveRelation::new(peer(), "/obs"));
    relation.set_established(true);
    exchange.set_relation(Some(Arc::clone(&relation)));

    for (id, sequence) in [(100, 1), (101, 2)] {
        let notification = Arc::new(
            Message::response(MessageType::Non, Code::CONTENT)
                .with_id(id)
                .with_destination(peer())
                .with_observe(sequence)
                .with_last(false),
        );
        relation.add_notification(Arc::clone(&notification));
        exchange.set_current_response(Some(Arc::clone(&notification)));
        matcher.send_response(&exchange, &notification).expect("keyable");
    }
    assert_eq!(matcher.table_sizes(), (2, 0, 0));

    let confirmable = Arc::new(
        Message::response(MessageType::Con, Code::CONTENT)
            .with_id(102)
            .with_destination(peer())
            .with_observe(3)
            .with_last(false),
    );
    exchange.set_current_response(Some(Arc::clone(&confirmable)));
    matcher.send_response(&exchange, &confirmable).expect("keyable");
    assert!(matcher.find_by_id(&KeyId::local(100)).is_none());
    assert!(matcher.find_by_id(&KeyId::local(101)).is_none());
    assert!(matcher.find_by_id(&KeyId::local(102)).is_some());
    assert_eq!(relation.pending_notifications(), 0);

    exchange.set_complete();
    assert_eq!(matcher.table_sizes(), (0, 0, 0));
}

#[rstest]
#[case::non(MessageType::Non, true)]
#[case::ack(MessageType::Ack, true)]
#[case::con(MessageType::Con, false)]
fn only_confirmable_responses_keep_the_exchange_open(
    matcher: Matcher,
    #[case] kind: MessageType,
    #[case] completes: bool,
) {
    let exchange = matcher.receive_request(&inbound_get(40, peer())).expect("keyable");
    let response = Arc::new(
        Message::response(kind, Code::CONTENT)
            .with_id(41)
            .with_destination(peer()),
    );
    exchange.set_current_response(Some(Arc::clone(&response)));
    matcher.send_response(&exchange, &response).expect("keyable");
    assert_eq!(exchange.is_complete(), completes);
    if completes {
        assert_eq!(matcher.table_sizes(), (0, 0, 0));
    } else {
        assert!(matcher.find_by_id(&KeyId::local(41)).is_some());
    }
}

#[rstest]
fn outbound_reset_completes_the_exchange(matcher: Matcher) {
    let exchange = matcher.receive_request(&inbound_get(50, peer())).expect("keyable");
    let ack = Message::empty(MessageType::Ack).with_id(50);
    matcher.send_empty_message(Some(&exchange), &ack);
    assert!(!exchange.is_complete());

    let rst = Message::empty(MessageType::Rst).with_id(50);
    matcher.send_empty_message(Some(&exchange), &rst);
    assert!(exchange.is_complete());
    matcher.send_empty_message(None, &rst);
}

#[rstest]
fn cleanup_spares_entries_rebound_to_a_newer_exchange(matcher: Matcher) {
    let older = send_local(&matcher, Some(3), &[0x0a]);
    let newer = send_local(&matcher, Some(3), &[0x0b]);

    older.set_complete();
    let bound = matcher
        .find_by_id(&KeyId::local(3))
        .expect("newer exchange keeps the id");
    assert!(Arc::ptr_eq(&bound, &newer));
    assert!(matcher.find_by_token(&KeyToken::new(token(&[0x0b]))).is_some());
}

#[rstest]
fn sending_for_a_completed_exchange_leaves_no_entries(matcher: Matcher) {
    let request = Arc::new(
        Message::request(MessageType::Con, Code::GET)
            .with_id(60)
            .with_token(token(&[0x60])),
    );
    let exchange = Arc::new(Exchange::new(Arc::clone(&request), Origin::Local));
    exchange.set_complete();

    matcher.send_request(&exchange, &request);
    assert_eq!(matcher.table_sizes(), (0, 0, 0));
}

#[rstest]
fn tracking_registers_a_single_listener(matcher: Matcher) {
    let exchange = send_local(&matcher, Some(70), &[0x70]);
    let request = exchange.current_request().expect("request present");
    matcher.send_request(&exchange, &request);
    assert_eq!(exchange.pending_listeners(), 1);
}

#[rstest]
fn clear_forgets_everything(matcher: Matcher) {
    send_local(&matcher, Some(80), &[0x80]);
    let request = inbound_get(81, peer());
    matcher.receive_request(&request).expect("keyable");

    matcher.clear();
    assert_eq!(matcher.table_sizes(), (0, 0, 0));
    let again = inbound_get(81, peer());
    matcher.receive_request(&again).expect("keyable");
    assert!(!again.is_duplicate());
}
