//! Derived Chain Engine (spec §4.D) — the core of the core.
//!
//! Holds the current Live block, a bounded window of recent
//! non-incorporated blocks, a durable state at `state_epoch`, and the
//! current validator. A single exclusive lock serializes every
//! state-machine transition; I/O (network sends during `sync`) happens
//! only after the relevant data has been copied out from under the lock
//! (spec §5).

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use axe_codec::{BlockHeaderFrame, CommitFrame, Frame, SealFrame};
use axe_telemetry::{
    ACTIONS_REJECTED, ACTIONS_VALIDATED, BLOCKS_COMMITTED, BLOCKS_INCORPORATED, LIVE_EPOCH, ROLLBACKS,
};
use axe_types::{ActionBlock, BlockHeader, BlockStatus, Blocker, DurableState, Hash, Mutations};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Sink an engine `sync` call writes frames to, in order, ending with a
/// `ready` signal (spec §4.D `sync`, §4.F "cached-connection shim").
#[async_trait]
pub trait SyncSink: Send + Sync {
    async fn send_direct(&self, frame: Frame);
    async fn ready(&self);
}

type TransformFn = dyn Fn(&[u8]) -> Vec<u8> + Send + Sync;

struct EngineState<S: DurableState> {
    /// Epoch of the current (or most recently created) Live block.
    epoch: u64,
    validator: S::Blocker,
    transform: Option<Arc<TransformFn>>,
    state: S,
    state_epoch: u64,
    last_commit_epoch: u64,
    /// Sliding window of recent, non-incorporated blocks (spec §3
    /// "Recent-blocks window"), bounded to `keep_n` entries and to blocks
    /// not yet incorporated (invariant I6).
    window: VecDeque<ActionBlock<S::Mutations>>,
    keep_n: usize,
}

/// The four-phase derived-block lifecycle state machine.
pub struct ChainEngine<S: DurableState> {
    inner: Mutex<EngineState<S>>,
}

impl<S: DurableState> ChainEngine<S> {
    pub fn new(state: S, epoch: u64, keep_n_blocks: usize) -> Self {
        let validator = state.validator(&[]);
        ChainEngine {
            inner: Mutex::new(EngineState {
                epoch,
                validator,
                transform: None,
                state,
                state_epoch: epoch,
                last_commit_epoch: epoch,
                window: VecDeque::new(),
                keep_n: keep_n_blocks,
            }),
        }
    }

    pub fn with_transform(self, transform: Arc<TransformFn>) -> Self {
        self.inner.lock().transform = Some(transform);
        self
    }

    pub fn live_epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    pub fn state_epoch(&self) -> u64 {
        self.inner.lock().state_epoch
    }

    pub fn last_commit_epoch(&self) -> u64 {
        self.inner.lock().last_commit_epoch
    }

    /// Applies the configured transform (if any) and consults the current
    /// validator. An empty transform result means "drop" (spec §4.D).
    pub fn validate(&self, action: &[u8]) -> bool {
        let mut inner = self.inner.lock();
        let transformed = match &inner.transform {
            Some(f) => f(action),
            None => action.to_vec(),
        };
        if transformed.is_empty() {
            return false;
        }
        let accepted = inner.validator.validate(&transformed);
        if accepted {
            ACTIONS_VALIDATED.inc();
        } else {
            ACTIONS_REJECTED.inc();
        }
        accepted
    }

    /// Appends `action` to the Live block's action array, after validating
    /// it (possibly through the transform).
    pub fn append(&self, action: &[u8]) -> bool {
        if !self.validate(action) {
            return false;
        }
        let mut inner = self.inner.lock();
        let transformed = match &inner.transform {
            Some(f) => f(action),
            None => action.to_vec(),
        };
        let epoch = inner.epoch;
        match find_mut(&mut inner.window, epoch) {
            Some(live) if live.status == BlockStatus::Live => {
                live.actions.append(&transformed);
                true
            }
            _ => false,
        }
    }

    /// Advances the live epoch to `header.epoch`, rebuilding the validator
    /// from the mutation snapshots of every Committed block at or before
    /// `last_commit_epoch` (spec §4.D `newBlock`).
    pub fn new_block(&self, header: BlockHeader) -> Result<u64, EngineError> {
        let mut inner = self.inner.lock();
        if header.epoch != inner.epoch + 1 {
            return Err(EngineError::NonSequentialNewBlock {
                expected: inner.epoch + 1,
                got: header.epoch,
            });
        }
        if let Some(prev) = inner.window.back() {
            if prev.status == BlockStatus::Live {
                return Err(EngineError::InvariantViolation {
                    detail: format!("previous live block {} was never closed", prev.epoch),
                });
            }
        }

        let mut mutations = Vec::new();
        for block in inner.window.iter() {
            if block.epoch <= inner.last_commit_epoch {
                match (&block.status, &block.mutations) {
                    (BlockStatus::Commit, Some(m)) => mutations.push(m.clone()),
                    _ => {
                        return Err(EngineError::InvariantViolation {
                            detail: format!(
                                "block {} is not committed at or before last_commit_epoch {}",
                                block.epoch, inner.last_commit_epoch
                            ),
                        });
                    }
                }
            }
        }

        let validator = inner.state.validator(&mutations);
        inner.validator = validator;
        inner.epoch = header.epoch;
        inner.window.push_back(ActionBlock::new(header));
        prune_to_capacity(&mut inner);
        LIVE_EPOCH.set(header.epoch as f64);
        debug!(epoch = header.epoch, "new live block");
        Ok(header.epoch)
    }

    /// Live -> Done: no new actions, awaiting seal.
    pub fn close_block(&self, epoch: u64) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        let block = find_mut(&mut inner.window, epoch).ok_or(EngineError::BlockNotFound {
            operation: "close_block",
            epoch,
        })?;
        if block.status != BlockStatus::Live {
            return Err(EngineError::WrongStatus {
                operation: "close_block",
                epoch,
                status: block.status,
            });
        }
        block.status = BlockStatus::Done;
        Ok(())
    }

    /// Live/Done -> Sealed. Returns the action-array hash, freezing the
    /// block's mutations snapshot from the current validator.
    pub fn seal_block(&self, epoch: u64) -> Result<Hash, EngineError> {
        let mut inner = self.inner.lock();
        let mutations_snapshot = inner.validator.mutations();
        let block = find_mut(&mut inner.window, epoch).ok_or(EngineError::BlockNotFound {
            operation: "seal_block",
            epoch,
        })?;
        if block.status != BlockStatus::Live && block.status != BlockStatus::Done {
            return Err(EngineError::WrongStatus {
                operation: "seal_block",
                epoch,
                status: block.status,
            });
        }
        block.status = BlockStatus::Sealed;
        block.mutations = Some(mutations_snapshot);
        Ok(block.actions.hash())
    }

    /// Sealed -> Commit. Returns the subset of `invalidated` that was
    /// actually present among the block's actions (spec §4.D, P3).
    pub fn commit_block(
        &self,
        epoch: u64,
        invalidated: Vec<Hash>,
    ) -> Result<Vec<Hash>, EngineError> {
        let mut inner = self.inner.lock();
        let block = find_mut(&mut inner.window, epoch).ok_or(EngineError::BlockNotFound {
            operation: "commit_block",
            epoch,
        })?;
        if block.status != BlockStatus::Sealed {
            return Err(EngineError::WrongStatus {
                operation: "commit_block",
                epoch,
                status: block.status,
            });
        }
        let present: Vec<Hash> = invalidated
            .into_iter()
            .filter(|h| block.actions.iter().any(|action| axe_types::hash_bytes(action) == *h))
            .collect();
        block.invalidated = present.clone();
        block.status = BlockStatus::Commit;
        if epoch > inner.last_commit_epoch {
            inner.last_commit_epoch = epoch;
        }
        BLOCKS_COMMITTED.inc();
        Ok(present)
    }

    /// Commit -> incorporated. Applies the block's mutations to durable
    /// state and advances `state_epoch`. A missing block is a plain error
    /// (spec §9.a): we never dereference a block before confirming it
    /// exists.
    pub fn incorporate(&self, epoch: u64) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if epoch != inner.state_epoch + 1 {
            return Err(EngineError::NonSequentialIncorporate {
                epoch,
                state_epoch: inner.state_epoch,
            });
        }
        let block = find_mut(&mut inner.window, epoch).ok_or(EngineError::BlockNotFound {
            operation: "incorporate",
            epoch,
        })?;
        if block.status != BlockStatus::Commit {
            return Err(EngineError::WrongStatus {
                operation: "incorporate",
                epoch,
                status: block.status,
            });
        }
        let mutations = block
            .mutations
            .clone()
            .expect("Commit status implies a captured mutations snapshot");
        inner.state.incorporate(&mutations);
        inner.state_epoch = epoch;
        inner.window.retain(|b| b.epoch > inner.state_epoch);
        BLOCKS_INCORPORATED.inc();
        Ok(())
    }

    /// Truncates the recent window to blocks at or before `target_epoch`
    /// and recomputes `last_commit_epoch` from what remains.
    pub fn rollback(&self, target_epoch: u64) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if target_epoch <= inner.state_epoch {
            return Err(EngineError::RollbackBeforeState {
                target: target_epoch,
                state_epoch: inner.state_epoch,
            });
        }
        if !inner.window.iter().any(|b| b.epoch == target_epoch) {
            return Err(EngineError::BlockNotFound {
                operation: "rollback",
                epoch: target_epoch,
            });
        }
        inner.window.retain(|b| b.epoch <= target_epoch);
        inner.last_commit_epoch = inner
            .window
            .iter()
            .filter(|b| b.status == BlockStatus::Commit)
            .map(|b| b.epoch)
            .max()
            .unwrap_or(inner.state_epoch);
        inner.epoch = target_epoch;
        LIVE_EPOCH.set(target_epoch as f64);
        ROLLBACKS.inc();
        Ok(())
    }

    /// Reverts durable state to its checksum, then re-merges the mutation
    /// snapshots of recent blocks from `checksum_epoch + 1` through
    /// `target_epoch` (spec §4.D `recover`).
    pub fn recover(&self, target_epoch: u64) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        let checksum_epoch = inner.state.checksum_epoch();
        if target_epoch < checksum_epoch || target_epoch > inner.state_epoch {
            return Err(EngineError::RecoverOutOfRange {
                target: target_epoch,
                checksum_epoch,
                state_epoch: inner.state_epoch,
            });
        }
        let mut merged: Option<S::Mutations> = None;
        for block in inner.window.iter() {
            if block.epoch <= checksum_epoch || block.epoch > target_epoch {
                continue;
            }
            let m = block.mutations.clone().ok_or(EngineError::WrongStatus {
                operation: "recover",
                epoch: block.epoch,
                status: block.status,
            })?;
            match &mut merged {
                None => merged = Some(m),
                Some(acc) => acc.merge(&m),
            }
        }
        inner.state.recover();
        if let Some(m) = merged {
            inner.state.incorporate(&m);
        }
        inner.state_epoch = target_epoch;
        inner.last_commit_epoch = target_epoch;
        inner.window.retain(|b| b.epoch > target_epoch);
        Ok(())
    }

    /// Emits, to `sink`, the ordered frames for every recent block with
    /// epoch strictly greater than `from_epoch`, then a snapshot of the
    /// Live block, then marks `sink` ready for the broadcast feed.
    ///
    /// Copies the window and Live block out under the lock; all I/O
    /// happens afterward, so broadcast cannot block validation (spec §5).
    pub async fn sync<C: SyncSink>(&self, sink: &C, from_epoch: u64) {
        let (history, live, live_epoch) = {
            let inner = self.inner.lock();
            let history: Vec<_> = inner
                .window
                .iter()
                .filter(|b| b.epoch > from_epoch && b.epoch < inner.epoch)
                .cloned()
                .collect();
            let live = inner.window.iter().find(|b| b.epoch == inner.epoch).cloned();
            (history, live, inner.epoch)
        };

        for block in &history {
            for frame in block_to_frames(block) {
                sink.send_direct(frame).await;
            }
        }
        if let Some(live) = &live {
            for frame in block_to_frames(live) {
                sink.send_direct(frame).await;
            }
        } else {
            warn!(live_epoch, "sync: no live block snapshot to send");
        }
        sink.ready().await;
    }
}

fn find_mut<M>(window: &mut VecDeque<ActionBlock<M>>, epoch: u64) -> Option<&mut ActionBlock<M>> {
    window.iter_mut().find(|b| b.epoch == epoch)
}

fn prune_to_capacity<S: DurableState>(inner: &mut EngineState<S>) {
    while inner.window.len() > inner.keep_n {
        inner.window.pop_front();
    }
}

/// Builds the NewBlock/ActionArray/[SealBlock]/[CommitBlock] frame
/// sequence for one recent block (spec §4.D `sync`). Seal/commit
/// signatures are zero-filled: `ActionBlock` does not retain the
/// originally-signed wire bytes (spec §3 lists no signature field), and
/// signing is an external collaborator (spec §1).
fn block_to_frames<M>(block: &ActionBlock<M>) -> Vec<Frame> {
    let mut frames = vec![Frame::NewBlock(BlockHeaderFrame {
        epoch: block.epoch,
        checkpoint_epoch: block.checkpoint_epoch,
        checkpoint_hash: block.origin,
        proposer: [0u8; 32],
    })];
    frames.push(Frame::ActionArray(block.actions.clone()));
    if block.status >= BlockStatus::Sealed {
        frames.push(Frame::SealBlock(SealFrame {
            epoch: block.epoch,
            hash: block.actions.hash(),
            signature: [0u8; 64],
        }));
    }
    if block.status >= BlockStatus::Commit {
        frames.push(Frame::CommitBlock(CommitFrame {
            epoch: block.epoch,
            invalidated: block.invalidated.clone(),
            publisher: [0u8; 32],
            signature: [0u8; 64],
        }));
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use axe_types::Hash;
    use std::sync::Mutex as StdMutex;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Counter(i64);

    impl Mutations for Counter {
        fn merge(&mut self, other: &Self) {
            self.0 += other.0;
        }
    }

    struct AllowAll {
        accumulated: i64,
    }

    impl Blocker for AllowAll {
        type Mutations = Counter;
        fn validate(&mut self, action: &[u8]) -> bool {
            if action == b"reject" {
                return false;
            }
            self.accumulated += 1;
            true
        }
        fn mutations(&self) -> Counter {
            Counter(self.accumulated)
        }
    }

    #[derive(Clone)]
    struct MockDurable {
        checkpoint: u64,
        recovered: Arc<StdMutex<u64>>,
    }

    impl DurableState for MockDurable {
        type Mutations = Counter;
        type Blocker = AllowAll;

        fn validator(&self, pending: &[Counter]) -> AllowAll {
            AllowAll {
                accumulated: pending.iter().map(|m| m.0).sum(),
            }
        }
        fn incorporate(&mut self, _mutations: &Counter) {}
        fn recover(&mut self) {
            *self.recovered.lock().unwrap() += 1;
        }
        fn checksum_epoch(&self) -> u64 {
            self.checkpoint
        }
    }

    fn engine_at(epoch: u64) -> ChainEngine<MockDurable> {
        ChainEngine::new(
            MockDurable {
                checkpoint: 0,
                recovered: Arc::new(StdMutex::new(0)),
            },
            epoch,
            16,
        )
    }

    fn header(epoch: u64) -> BlockHeader {
        BlockHeader {
            epoch,
            checkpoint_epoch: 0,
            checkpoint_hash: Hash::ZERO,
            proposer: [1u8; 32],
        }
    }

    /// Seed scenario 1 (spec §8): lifecycle happy path.
    #[test]
    fn lifecycle_seals_commits_and_incorporates() {
        let engine = engine_at(0);
        engine.new_block(header(1)).unwrap();
        assert!(engine.append(b"a1"));
        assert!(engine.append(b"a2"));
        assert!(engine.append(b"a3"));

        let mut expected = axe_types::ActionArray::new();
        expected.append(b"a1");
        expected.append(b"a2");
        expected.append(b"a3");

        let hash = engine.seal_block(1).unwrap();
        assert_eq!(hash, expected.hash());

        let removed = engine.commit_block(1, vec![]).unwrap();
        assert!(removed.is_empty());

        engine.incorporate(1).unwrap();
        assert_eq!(engine.state_epoch(), 1);
    }

    #[test]
    fn seal_twice_fails_not_live_or_done() {
        let engine = engine_at(0);
        engine.new_block(header(1)).unwrap();
        engine.seal_block(1).unwrap();
        let err = engine.seal_block(1).unwrap_err();
        assert!(matches!(err, EngineError::WrongStatus { .. }));
    }

    #[test]
    fn commit_filters_invalidated_to_present_hashes() {
        let engine = engine_at(0);
        engine.new_block(header(1)).unwrap();
        engine.append(b"a1");
        engine.seal_block(1).unwrap();
        let present = axe_types::hash_bytes(b"a1");
        let absent = Hash::from_bytes([9u8; 32]);
        let removed = engine.commit_block(1, vec![present, absent]).unwrap();
        assert_eq!(removed, vec![present]);
    }

    #[test]
    fn incorporate_requires_commit_status() {
        let engine = engine_at(0);
        engine.new_block(header(1)).unwrap();
        let err = engine.incorporate(1).unwrap_err();
        assert!(matches!(err, EngineError::BlockNotFound { .. }) || matches!(err, EngineError::WrongStatus { .. }));
    }

    #[test]
    fn missing_block_incorporate_is_plain_error() {
        let engine = engine_at(5);
        let err = engine.incorporate(6).unwrap_err();
        assert_eq!(
            err,
            EngineError::BlockNotFound {
                operation: "incorporate",
                epoch: 6
            }
        );
    }

    /// Seed scenario 3 (spec §8): rollback retains the window through the
    /// target epoch and `new_block` resumes at `target + 1`.
    #[test]
    fn rollback_retains_through_target_and_resumes_after() {
        let engine = engine_at(0);
        for e in 1..=5u64 {
            engine.new_block(header(e)).unwrap();
            engine.seal_block(e).unwrap();
            engine.commit_block(e, vec![]).unwrap();
        }
        engine.incorporate(1).unwrap();
        engine.incorporate(2).unwrap();
        engine.incorporate(3).unwrap();
        assert_eq!(engine.state_epoch(), 3);

        engine.rollback(4).unwrap();
        assert_eq!(engine.last_commit_epoch(), 4);
        let next = engine.new_block(header(5)).unwrap();
        assert_eq!(next, 5);
    }

    #[test]
    fn rollback_at_or_before_state_epoch_fails() {
        let engine = engine_at(0);
        engine.new_block(header(1)).unwrap();
        engine.seal_block(1).unwrap();
        engine.commit_block(1, vec![]).unwrap();
        engine.incorporate(1).unwrap();
        let err = engine.rollback(1).unwrap_err();
        assert!(matches!(err, EngineError::RollbackBeforeState { .. }));
    }

    #[test]
    fn new_block_rejects_non_sequential_epoch() {
        let engine = engine_at(0);
        let err = engine.new_block(header(2)).unwrap_err();
        assert_eq!(
            err,
            EngineError::NonSequentialNewBlock { expected: 1, got: 2 }
        );
    }

    #[test]
    fn new_block_rejects_still_live_predecessor() {
        let engine = engine_at(0);
        engine.new_block(header(1)).unwrap();
        let err = engine.new_block(header(2)).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));
    }

    struct RecordingSink {
        frames: StdMutex<Vec<Frame>>,
        readied: StdMutex<bool>,
    }

    #[async_trait]
    impl SyncSink for RecordingSink {
        async fn send_direct(&self, frame: Frame) {
            self.frames.lock().unwrap().push(frame);
        }
        async fn ready(&self) {
            *self.readied.lock().unwrap() = true;
        }
    }

    #[tokio::test]
    async fn sync_emits_history_then_live_then_ready() {
        let engine = engine_at(0);
        engine.new_block(header(1)).unwrap();
        engine.append(b"x");
        engine.seal_block(1).unwrap();
        engine.commit_block(1, vec![]).unwrap();
        engine.new_block(header(2)).unwrap();
        engine.append(b"y");

        let sink = RecordingSink {
            frames: StdMutex::new(Vec::new()),
            readied: StdMutex::new(false),
        };
        engine.sync(&sink, 0).await;

        let frames = sink.frames.lock().unwrap();
        assert!(matches!(frames[0], Frame::NewBlock(ref h) if h.epoch == 1));
        assert!(*sink.readied.lock().unwrap());
    }
}
