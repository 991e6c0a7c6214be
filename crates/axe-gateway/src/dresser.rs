//! The optional action-rewriting hook (spec §4.H, SPEC_FULL §2 "Gateway
//! dresser"), grounded on `topos/gateway.go: GatewayConfig.Dresser`.
//!
//! A dresser rewrites a client-submitted action before it is forwarded
//! upstream — e.g. wrapping a bare action with the gateway's own wallet/fee
//! and signature. Absent one, actions pass through unchanged.

pub type DresserFn = dyn Fn(Vec<u8>) -> Vec<u8> + Send + Sync;
