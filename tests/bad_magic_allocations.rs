//! A container with the wrong magic is rejected before the loader allocates.

mod common;

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use dcb_loader::{LoadError, LoadOptions, ModuleLoader};

use common::*;

struct CountingAlloc;

static ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static COUNTING: Cell<bool> = const { Cell::new(false) };
}

fn note_allocation() {
    if COUNTING.try_with(Cell::get).unwrap_or(false) {
        ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    }
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        note_allocation();
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        note_allocation();
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        note_allocation();
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

#[test]
fn bad_magic_is_rejected_without_allocating() {
    let loader = ModuleLoader::new(LoadOptions::new().with_sources(false));
    let mut bytes = game_image().encode();
    bytes[0] ^= 0xFF;
    let source = Cursor::new(bytes);
    let host = say_host();

    COUNTING.with(|flag| flag.set(true));
    let result = loader.load(source, 0, &host);
    COUNTING.with(|flag| flag.set(false));

    let allocations = ALLOCATIONS.load(Ordering::Relaxed);
    assert!(matches!(result, Err(LoadError::BadMagic { .. })), "got {result:?}");
    assert_eq!(allocations, 0, "header rejection must not touch the heap");
}
