//! A trusting placeholder for the durable-state collaborator.
//!
//! The actual Axe/Social application state (wallets, fees, the validation
//! rules a real deployment enforces) is out of scope here (spec §1: "the
//! wallet/vault" is an external collaborator) — this accepts every action
//! and tracks nothing, the same role `PassAll`/`MockDurable` play in the
//! library crates' own tests, just under a name that says what it's for
//! in a running binary.

use axe_types::{Blocker, DurableState, Mutations};

#[derive(Clone, Default)]
pub struct NoopMutations;

impl Mutations for NoopMutations {
    fn merge(&mut self, _other: &Self) {}
}

pub struct TrustingValidator;

impl Blocker for TrustingValidator {
    type Mutations = NoopMutations;

    fn validate(&mut self, _action: &[u8]) -> bool {
        true
    }

    fn mutations(&self) -> NoopMutations {
        NoopMutations
    }
}

#[derive(Clone, Default)]
pub struct TrustingState;

impl DurableState for TrustingState {
    type Mutations = NoopMutations;
    type Blocker = TrustingValidator;

    fn validator(&self, _pending: &[NoopMutations]) -> TrustingValidator {
        TrustingValidator
    }

    fn incorporate(&mut self, _mutations: &NoopMutations) {}

    fn recover(&mut self) {}

    fn checksum_epoch(&self) -> u64 {
        0
    }
}
