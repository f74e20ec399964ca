#![cfg(all(feature = "advanced-tests", loom))]
//! Concurrency tests for exchange completion using loom.
//!
//! These tests exercise the completion signal without Tokio. `loom` explores
//! interleavings to ensure every listener runs exactly once, whether it is
//! registered before, during or after completion.

use coap_matcher::{Code, Exchange, Message, MessageType, Origin};
use loom::{
    model,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

fn exchange() -> std::sync::Arc<Exchange> {
    let request = Message::request(MessageType::Con, Code::GET).with_id(1);
    std::sync::Arc::new(Exchange::new(std::sync::Arc::new(request), Origin::Local))
}

#[test]
fn listener_racing_completion_runs_once() {
    model(|| {
        let exchange = exchange();
        let fired = Arc::new(AtomicUsize::new(0));

        let completer = {
            let exchange = std::sync::Arc::clone(&exchange);
            thread::spawn(move || exchange.set_complete())
        };
        let subscriber = {
            let exchange = std::sync::Arc::clone(&exchange);
            let fired = Arc::clone(&fired);
            thread::spawn(move || {
                exchange.on_complete(move |_| {
                    fired.fetch_add(1, Ordering::SeqCst);
                });
            })
        };

        assert!(completer.join().expect("completer panicked"));
        subscriber.join().expect("subscriber panicked");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn racing_completions_have_one_winner() {
    model(|| {
        let exchange = exchange();
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let fired = Arc::clone(&fired);
            exchange.on_complete(move |_| {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        let first = {
            let exchange = std::sync::Arc::clone(&exchange);
            thread::spawn(move || exchange.set_complete())
        };
        let second = exchange.set_complete();
        let first = first.join().expect("completer panicked");

        assert!(first ^ second, "exactly one call completes the exchange");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    });
}
