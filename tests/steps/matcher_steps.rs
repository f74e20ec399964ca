//! Steps for matcher behavioural tests.
use coap_matcher::{Code, Message, MessageType};
use coap_matcher_testing::{con_get, empty, peer};
use cucumber::{given, then, when};

use crate::world::{MatcherWorld, hex_token};

#[given("an endpoint with deterministic message ids")]
fn given_endpoint(world: &mut MatcherWorld) { world.start(); }

#[when(expr = "a confirmable GET with token {string} is sent")]
fn when_get_sent(world: &mut MatcherWorld, token: String) { world.send_get(hex_token(&token)); }

#[when(expr = "a confirmable GET with id {int} arrives {int} times")]
fn when_get_arrives(world: &mut MatcherWorld, id: u16, times: usize) {
    for _ in 0..times {
        world.receive(con_get(id, &[0x42]));
    }
}

#[when(expr = "a piggy-backed response with id {int} and token {string} arrives")]
fn when_ack_arrives(world: &mut MatcherWorld, id: u16, token: String) {
    world.receive(
        Message::response(MessageType::Ack, Code::CONTENT)
            .with_id(id)
            .with_token(hex_token(&token))
            .with_source(peer()),
    );
}

#[when(expr = "an empty ACK with id {int} arrives")]
fn when_empty_ack_arrives(world: &mut MatcherWorld, id: u16) {
    world.receive(empty(MessageType::Ack, id));
}

#[when(expr = "a confirmable response with id {int} and token {string} arrives {int} times")]
fn when_con_response_arrives(world: &mut MatcherWorld, id: u16, token: String, times: usize) {
    for _ in 0..times {
        world.receive(
            Message::response(MessageType::Con, Code::CONTENT)
                .with_id(id)
                .with_token(hex_token(&token))
                .with_source(peer()),
        );
    }
}

#[then(expr = "the request carries message id {int}")]
fn then_request_id(world: &mut MatcherWorld, id: u16) {
    let request = world.exchange().current_request().expect("request present");
    assert_eq!(request.id(), Some(id));
}

#[then(expr = "{int} response is delivered")]
fn then_responses_delivered(world: &mut MatcherWorld, count: usize) {
    assert_eq!(world.recorder().delivered_responses().len(), count);
}

#[then(expr = "{int} request is delivered")]
fn then_requests_delivered(world: &mut MatcherWorld, count: usize) {
    assert_eq!(world.recorder().delivered_requests().len(), count);
}

#[then("the second copy is flagged duplicate")]
fn then_second_duplicate(world: &mut MatcherWorld) {
    let inbound = world.inbound();
    assert!(!inbound[0].is_duplicate());
    assert!(inbound[1].is_duplicate());
}

#[then(expr = "{int} ACKs with id {int} were sent")]
fn then_acks_sent(world: &mut MatcherWorld, count: usize, id: u16) {
    let acks = world.recorder().sent_of(MessageType::Ack);
    assert_eq!(acks.iter().filter(|ack| ack.id() == Some(id)).count(), count);
}

#[then("the exchange is complete")]
fn then_complete(world: &mut MatcherWorld) { assert!(world.exchange().is_complete()); }

#[then("the matcher tables are empty")]
fn then_tables_empty(world: &mut MatcherWorld) {
    assert_eq!(world.endpoint().matcher().table_sizes(), (0, 0, 0));
}
