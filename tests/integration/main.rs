//! Protocol-level scenario tests wiring a real `Reconciler` against a real
//! `Replica` through an in-process mock `Transport` — no sockets, since
//! the protocol's correctness doesn't depend on them.

mod scenarios;
