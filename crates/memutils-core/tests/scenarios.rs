//! Integration test: end-to-end allocation scenarios.
//!
//! Each test drives the public API only: allocators of every strategy,
//! views, arenas and the failure modes callers are expected to handle.

use memutils_core::{
    Allocator, AllocatorConfig, Arena, Fit, Growth, MemoryError, MisusePolicy, StrategyKind,
};

fn bump(region_size: usize, growth: Growth) -> Allocator {
    Allocator::new(
        AllocatorConfig::new(StrategyKind::Bump)
            .with_region_size(region_size)
            .with_growth(growth),
    )
    .unwrap()
}

// ── Growth ──────────────────────────────────────────────────────────

#[test]
fn fixed_bump_runs_out_of_memory() {
    let mut a = bump(4096, Growth::Fixed);
    a.allocate(100, 1).unwrap();
    let err = a.allocate(4000, 1).unwrap_err();
    assert_eq!(
        err,
        MemoryError::OutOfMemory {
            requested: 4000,
            capacity: 4096
        }
    );
    assert_eq!(a.stats().regions, 1);
}

#[test]
fn growable_bump_acquires_second_region() {
    let mut a = bump(4096, Growth::Growable);
    a.allocate(100, 1).unwrap();
    let v = a.allocate(4000, 1).unwrap();
    assert_eq!(v.len(), 4000);
    assert_eq!(v.span().region(), 1);
    let s = a.stats();
    assert_eq!(s.regions, 2);
    assert_eq!(s.capacity_bytes, 8192);
}

#[test]
#[cfg(target_pointer_width = "64")]
fn growable_allocator_reports_failed_growth() {
    let mut a = bump(4096, Growth::Growable);
    let err = a.allocate(1 << 60, 1).unwrap_err();
    assert_eq!(
        err,
        MemoryError::OutOfMemory {
            requested: 1 << 60,
            capacity: 4096
        }
    );
    // Too large to describe as a region at all.
    assert_eq!(
        a.allocate(usize::MAX, 1).unwrap_err(),
        MemoryError::OutOfMemory {
            requested: usize::MAX,
            capacity: 4096
        }
    );
    let s = a.stats();
    assert_eq!(s.regions, 1);
    assert_eq!(s.capacity_bytes, 4096);
    // The allocator is still usable after a failed growth step.
    assert_eq!(a.allocate(64, 8).unwrap().len(), 64);
}

#[test]
fn growth_works_for_every_strategy() {
    for strategy in [
        StrategyKind::Bump,
        StrategyKind::FreeList { fit: Fit::First },
        StrategyKind::FreeList { fit: Fit::Best },
        StrategyKind::pooled(),
    ] {
        let mut a = Allocator::new(
            AllocatorConfig::new(strategy)
                .with_region_size(4096)
                .with_growth(Growth::Growable),
        )
        .unwrap();
        let mut views = Vec::new();
        for i in 0..64u64 {
            let mut v = a.allocate(1000, 8).unwrap();
            v.write_u64(0, i).unwrap();
            views.push(v);
        }
        for (i, v) in views.iter().enumerate() {
            assert_eq!(v.read_u64(0).unwrap(), i as u64, "{strategy}");
        }
        assert!(a.stats().regions > 1, "{strategy}");
    }
}

// ── Typed access ────────────────────────────────────────────────────

#[test]
fn u64_round_trip_and_bounds() {
    let mut a = Allocator::new(AllocatorConfig::default()).unwrap();
    let mut v = a.allocate(16, 8).unwrap();
    v.write_u64(8, 0x0123_4567_89AB_CDEF).unwrap();
    assert_eq!(v.read_u64(8).unwrap(), 0x0123_4567_89AB_CDEF);
    assert_eq!(
        v.read_u64(12).unwrap_err(),
        MemoryError::OutOfBounds {
            offset: 12,
            len: 8,
            bound: 16
        }
    );
}

#[test]
fn alignment_holds_on_absolute_address() {
    for strategy in [
        StrategyKind::Bump,
        StrategyKind::FreeList { fit: Fit::Best },
        StrategyKind::pooled(),
    ] {
        let mut a = Allocator::new(AllocatorConfig::new(strategy)).unwrap();
        for align in [1usize, 2, 4, 8, 16, 32, 64, 128, 256] {
            let _pad = a.allocate(3, 1).unwrap();
            let v = a.allocate(24, align).unwrap();
            assert_eq!(v.address().unwrap() % align, 0, "{strategy} align {align}");
        }
    }
}

// ── Free-list reuse ─────────────────────────────────────────────────

#[test]
fn free_list_reuses_freed_span() {
    let mut a = Allocator::new(AllocatorConfig::new(StrategyKind::FreeList { fit: Fit::First }))
        .unwrap();
    let va = a.allocate(64, 8).unwrap();
    let _vb = a.allocate(64, 8).unwrap();
    let span_a = va.span();
    a.free(span_a).unwrap();
    let vc = a.allocate(64, 8).unwrap();
    assert_eq!(vc.span().region(), span_a.region());
    assert_eq!(vc.span().offset(), span_a.offset());
    assert_eq!(vc.span().len(), span_a.len());
    // The old view does not alias the new allocation.
    assert_eq!(va.read_u8(0).unwrap_err(), MemoryError::UseAfterFree);
    assert!(vc.is_live());
}

// ── Misuse ──────────────────────────────────────────────────────────

#[test]
fn double_free_is_detected_for_every_strategy() {
    for strategy in [
        StrategyKind::Bump,
        StrategyKind::FreeList { fit: Fit::First },
        StrategyKind::pooled(),
    ] {
        let mut a = Allocator::new(AllocatorConfig::new(strategy)).unwrap();
        let v = a.allocate(32, 8).unwrap();
        a.free(v.span()).unwrap();
        assert_eq!(a.free(v.span()).unwrap_err(), MemoryError::DoubleFree, "{strategy}");
    }
}

#[test]
fn freeing_foreign_span_is_rejected() {
    let mut a = Allocator::new(AllocatorConfig::default()).unwrap();
    let mut b = Allocator::new(AllocatorConfig::default()).unwrap();
    let v = b.allocate(32, 8).unwrap();
    let err = a.free(v.span()).unwrap_err();
    assert_eq!(
        err,
        MemoryError::ForeignSpan {
            expected: a.id(),
            found: b.id()
        }
    );
    b.free(v.span()).unwrap();
}

#[test]
fn trust_policy_still_detects_use_after_free() {
    let mut a = Allocator::new(AllocatorConfig::default().with_misuse(MisusePolicy::Trust))
        .unwrap();
    let v = a.allocate(8, 8).unwrap();
    a.free(v.span()).unwrap();
    assert!(a.free(v.span()).is_ok());
    assert_eq!(v.read_u64(0).unwrap_err(), MemoryError::UseAfterFree);
}

// ── Use after free ──────────────────────────────────────────────────

#[test]
fn use_after_free_reset_close_and_drop() {
    let mut a = Allocator::new(AllocatorConfig::default()).unwrap();

    let freed = a.allocate(8, 8).unwrap();
    a.free(freed.span()).unwrap();
    assert_eq!(freed.read_u64(0).unwrap_err(), MemoryError::UseAfterFree);

    let before_reset = a.allocate(8, 8).unwrap();
    a.reset().unwrap();
    assert_eq!(before_reset.read_u64(0).unwrap_err(), MemoryError::UseAfterFree);

    let before_close = a.allocate(8, 8).unwrap();
    a.close();
    assert_eq!(before_close.read_u64(0).unwrap_err(), MemoryError::UseAfterFree);

    let mut b = Allocator::new(AllocatorConfig::default()).unwrap();
    let before_drop = b.allocate(8, 8).unwrap();
    drop(b);
    assert_eq!(before_drop.read_u64(0).unwrap_err(), MemoryError::UseAfterFree);
}

// ── Arenas ──────────────────────────────────────────────────────────

#[test]
fn arena_double_close_is_noop() {
    let mut arena = Arena::create(AllocatorConfig::default()).unwrap();
    let views: Vec<_> = (0..10).map(|_| arena.allocate(16, 8).unwrap()).collect();
    assert_eq!(arena.allocation_count(), 10);
    arena.close();
    for v in &views {
        assert_eq!(v.read_u64(0).unwrap_err(), MemoryError::UseAfterFree);
    }
    arena.close();
    assert!(arena.is_closed());
    assert_eq!(arena.allocate(16, 8).unwrap_err(), MemoryError::UseAfterFree);
}

#[test]
fn region_release_is_exactly_once() {
    let mut r = memutils_core::Region::acquire(128).unwrap();
    assert!(!r.is_released());
    r.release().unwrap();
    assert_eq!(r.release().unwrap_err(), MemoryError::DoubleRelease);
    assert_eq!(r.address_of(0).unwrap_err(), MemoryError::UseAfterFree);
}
