//! Scratch arena: a single per-frame byte region carved into typed,
//! lifetime-disciplined borrows (§ 5, § 9).
//!
//! The source codec hand-computes byte offsets into a raw pointer and
//! relies on carvings aliasing across non-overlapping lifetimes within a
//! stage. This is re-architected per § 9 as an explicit stack allocator: a
//! stage calls [`ScratchArena::alloc_i16`]/[`alloc_i32`] to reserve a typed
//! region and gets back a [`Handle16`]/[`Handle32`] token, then indexes
//! through [`ScratchArena::get_i16`]/[`get_i32`] to borrow it. Reserving via
//! a token rather than returning a live slice lets a stage hold several
//! non-overlapping carvings at once without fighting the borrow checker.
//! [`ScratchArena::checkpoint`]/[`restore`] release everything allocated
//! since a saved high-water mark — the explicit equivalent of the source's
//! aliased carvings. No allocation happens on the hot path once the arena's
//! backing buffer is sized; `alloc_*` only move cursors over existing
//! storage.

use crate::error::{CodecError, Result};

/// A `Checkpoint` is a high-water mark the arena can be [`ScratchArena::restore`]d
/// to, releasing every allocation made after it.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    i16_len: usize,
    i32_len: usize,
}

/// Token referencing an `i16` carving. Only valid against the arena that
/// issued it, and only until that arena is restored past the checkpoint in
/// effect when the handle was created.
#[derive(Debug, Clone, Copy)]
pub struct Handle16 {
    start: usize,
    len: usize,
}

impl Handle16 {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Token referencing an `i32` carving.
#[derive(Debug, Clone, Copy)]
pub struct Handle32 {
    start: usize,
    len: usize,
}

impl Handle32 {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Per-frame scratch storage, sized once at codec open per
/// `(frame_length, fs_idx)` and reused every frame.
pub struct ScratchArena {
    i16_pool: Vec<i16>,
    i32_pool: Vec<i32>,
    i16_cursor: usize,
    i32_cursor: usize,
}

impl ScratchArena {
    /// Allocate backing storage sized for `i16_capacity` mantissas and
    /// `i32_capacity` accumulator-width mantissas. Sizing is a function of
    /// `(frame_length, fs_idx)` per § 5; callers compute these once at open.
    pub fn with_capacity(i16_capacity: usize, i32_capacity: usize) -> Self {
        Self {
            i16_pool: vec![0; i16_capacity],
            i32_pool: vec![0; i32_capacity],
            i16_cursor: 0,
            i32_cursor: 0,
        }
    }

    /// Release every carving; call once at the top of each frame.
    pub fn reset(&mut self) {
        self.i16_cursor = 0;
        self.i32_cursor = 0;
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            i16_len: self.i16_cursor,
            i32_len: self.i32_cursor,
        }
    }

    /// Release every allocation made since `checkpoint`, allowing the
    /// released bytes to be reused by a later, non-overlapping carving
    /// within the same stage. Handles issued after `checkpoint` must not be
    /// used again once this is called.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.i16_cursor = checkpoint.i16_len;
        self.i32_cursor = checkpoint.i32_len;
    }

    /// Reserve `len` `i16` mantissas and zero them.
    pub fn alloc_i16(&mut self, len: usize) -> Result<Handle16> {
        let end = self.i16_cursor + len;
        if end > self.i16_pool.len() {
            return Err(CodecError::ScratchExhausted {
                requested: len,
                available: self.i16_pool.len() - self.i16_cursor,
            });
        }
        let start = self.i16_cursor;
        self.i16_pool[start..end].iter_mut().for_each(|v| *v = 0);
        self.i16_cursor = end;
        Ok(Handle16 { start, len })
    }

    /// Reserve `len` `i32` mantissas and zero them.
    pub fn alloc_i32(&mut self, len: usize) -> Result<Handle32> {
        let end = self.i32_cursor + len;
        if end > self.i32_pool.len() {
            return Err(CodecError::ScratchExhausted {
                requested: len,
                available: self.i32_pool.len() - self.i32_cursor,
            });
        }
        let start = self.i32_cursor;
        self.i32_pool[start..end].iter_mut().for_each(|v| *v = 0);
        self.i32_cursor = end;
        Ok(Handle32 { start, len })
    }

    pub fn get_i16(&self, h: Handle16) -> &[i16] {
        &self.i16_pool[h.start..h.start + h.len]
    }

    pub fn get_i16_mut(&mut self, h: Handle16) -> &mut [i16] {
        &mut self.i16_pool[h.start..h.start + h.len]
    }

    pub fn get_i32(&self, h: Handle32) -> &[i32] {
        &self.i32_pool[h.start..h.start + h.len]
    }

    pub fn get_i32_mut(&mut self, h: Handle32) -> &mut [i32] {
        &mut self.i32_pool[h.start..h.start + h.len]
    }
}
