//! Per-key mutual exclusion.
//!
//! The registry hands out exclusive ownership of byte keys to blocking
//! callers, in arrival order. Its own map is guarded by a mutex separate
//! from the per-key slots, and an entry lives only while some caller holds
//! or waits for it.

use crate::config::Config;
use crate::context::Context;
use crate::{Error, Result};
use log::{trace, warn};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

pub struct LockRegistry {
    slots: Mutex<HashMap<Vec<u8>, Tracked>>,
    closed: AtomicBool,
    next_ticket: AtomicU64,
    poll_interval: Duration,
}

struct Tracked {
    slot: Arc<Slot>,
    // holder plus waiters
    refs: usize,
}

struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

#[derive(Default)]
struct SlotState {
    holder: Option<u64>,
    // holder owns a KeyGuard rather than a bare lock
    guarded: bool,
    queue: VecDeque<u64>,
}

/// Ownership of one key, released on drop.
pub struct KeyGuard<'a> {
    registry: &'a LockRegistry,
    key: Vec<u8>,
    slot: Arc<Slot>,
    ticket: u64,
}

impl LockRegistry {
    pub fn new() -> LockRegistry {
        LockRegistry::with_poll_interval(Config::default().lock_poll_interval)
    }

    pub fn open(config: &Config) -> LockRegistry {
        LockRegistry::with_poll_interval(config.lock_poll_interval)
    }

    pub fn with_poll_interval(poll_interval: Duration) -> LockRegistry {
        LockRegistry {
            slots: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            next_ticket: AtomicU64::new(0),
            poll_interval,
        }
    }

    /// Blocks until `key` is owned by the caller or `ctx` is done.
    pub fn lock(&self, ctx: &Context, key: &[u8]) -> Result<()> {
        let (_, _) = self.wait_for(ctx, key, false)?;
        Ok(())
    }

    /// Releases `key`.
    ///
    /// Releasing a tracked key nobody holds is a no-op. Releasing a key this
    /// registry is not tracking, or one owned by a live `KeyGuard` (such as
    /// the one held by a running `Store::edit`), is a `LockContract` error.
    pub fn unlock(&self, _ctx: &Context, key: &[u8]) -> Result<()> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            match slots.get(key) {
                Some(tracked) => tracked.slot.clone(),
                None => {
                    if self.closed.load(Ordering::SeqCst) {
                        return Ok(());
                    }
                    return Err(Error::LockContract { key: key.to_vec() });
                }
            }
        };
        self.release(key, &slot, None)
    }

    /// Like `lock`, but ownership ends when the guard is dropped.
    pub fn acquire(&self, ctx: &Context, key: &[u8]) -> Result<KeyGuard<'_>> {
        let (slot, ticket) = self.wait_for(ctx, key, true)?;
        Ok(KeyGuard {
            registry: self,
            key: key.to_vec(),
            slot,
            ticket,
        })
    }

    /// Releases every held lock, wakes all waiters with `LockRegistryClosed`
    /// and refuses further locks.
    pub fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut forced = 0;
        for tracked in slots.values() {
            let mut state = tracked
                .slot
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if state.holder.take().is_some() {
                forced += 1;
            }
            state.guarded = false;
            drop(state);
            tracked.slot.ready.notify_all();
        }
        slots.clear();
        if forced > 0 {
            warn!("lock registry closed with {} locks still held", forced);
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of keys currently held or waited for.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn wait_for(&self, ctx: &Context, key: &[u8], guarded: bool) -> Result<(Arc<Slot>, u64)> {
        if self.is_closed() {
            return Err(Error::LockRegistryClosed);
        }
        ctx.err()?;

        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            match slots.entry(key.to_vec()) {
                Entry::Occupied(mut e) => {
                    let tracked = e.get_mut();
                    tracked.refs += 1;
                    tracked.slot.clone()
                }
                Entry::Vacant(e) => {
                    let slot = Arc::new(Slot {
                        state: Mutex::new(SlotState::default()),
                        ready: Condvar::new(),
                    });
                    e.insert(Tracked {
                        slot: slot.clone(),
                        refs: 1,
                    });
                    slot
                }
            }
        };

        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let mut state = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.queue.push_back(ticket);
        loop {
            let abort = if self.is_closed() {
                Some(Error::LockRegistryClosed)
            } else if state.holder.is_none() && state.queue.front() == Some(&ticket) {
                state.queue.pop_front();
                state.holder = Some(ticket);
                state.guarded = guarded;
                trace!("lock granted for {:?}", key);
                break;
            } else {
                ctx.err().err()
            };

            if let Some(err) = abort {
                state.queue.retain(|t| *t != ticket);
                drop(state);
                slot.ready.notify_all();
                self.forget(key, &slot);
                return Err(err);
            }

            let wait = match ctx.remaining() {
                Some(left) => left.min(self.poll_interval),
                None => self.poll_interval,
            };
            state = slot
                .ready
                .wait_timeout(state, wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(state);
        Ok((slot, ticket))
    }

    // Clears the holder (only if it is `ticket`, when given) and drops the
    // caller's interest in the key. Without a ticket, a guarded holder is
    // left alone.
    fn release(&self, key: &[u8], slot: &Arc<Slot>, ticket: Option<u64>) -> Result<()> {
        let released = {
            let mut state = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
            match (state.holder, ticket) {
                (Some(held), Some(t)) if held != t => false,
                (Some(_), None) if state.guarded => {
                    return Err(Error::LockContract { key: key.to_vec() });
                }
                (Some(_), _) => {
                    state.holder = None;
                    state.guarded = false;
                    true
                }
                (None, _) => false,
            }
        };
        if released {
            slot.ready.notify_all();
            self.forget(key, slot);
            trace!("lock released for {:?}", key);
        }
        Ok(())
    }

    fn forget(&self, key: &[u8], slot: &Arc<Slot>) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let remove = match slots.get_mut(key) {
            Some(tracked) if Arc::ptr_eq(&tracked.slot, slot) => {
                tracked.refs -= 1;
                tracked.refs == 0
            }
            _ => false,
        };
        if remove {
            slots.remove(key);
        }
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        LockRegistry::new()
    }
}

impl<'a> KeyGuard<'a> {
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl<'a> Drop for KeyGuard<'a> {
    fn drop(&mut self) {
        let _ = self
            .registry
            .release(&self.key, &self.slot, Some(self.ticket));
    }
}
