use std::{
    ptr::NonNull,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use amudai_large_memory::{
    DEFAULT_ALIGNMENT, ImportedAllocation, LargeMemory, LargeMemoryManager, LargeMemoryOwner,
    ManagerState, MemoryAllocator, NativeMemoryAllocator, ReadOnlyLargeMemory,
    align::is_ptr_aligned,
};

/// Allocates 16 bytes, writes through a span, then disposes twice.
#[test]
fn test_allocate_write_dispose_twice() {
    let allocator = NativeMemoryAllocator::new();
    let mut manager = allocator.allocate_native(16).unwrap();
    {
        let span = manager.span().unwrap();
        assert_eq!(span.len(), 16);
        assert!(span.iter().all(|&b| b == 0));
        assert!(is_ptr_aligned(span.as_ptr(), DEFAULT_ALIGNMENT));
    }

    manager.span_mut().unwrap()[5] = 0xFF;
    assert_eq!(
        manager.span().unwrap().to_vec(),
        [0, 0, 0, 0, 0, 0xFF, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
    );

    manager.dispose();
    assert_eq!(manager.state(), ManagerState::Released);
    manager.dispose();
    assert_eq!(allocator.statistics().releases(), 1);
    drop(manager);
    assert_eq!(allocator.statistics().releases(), 1);
    assert_eq!(allocator.statistics().live_allocations(), 0);
}

/// One raw allocation aliased by three managers: the free happens on the fourth release.
#[test]
fn test_imported_allocation_shared_by_three_managers() {
    let mut storage = vec![1u8; 96];
    let ptr = NonNull::new(storage.as_mut_ptr()).unwrap();
    let frees = Arc::new(AtomicUsize::new(0));
    let import = ImportedAllocation::new({
        let frees = frees.clone();
        move || {
            frees.fetch_add(1, Ordering::SeqCst);
        }
    });

    let managers = (0..3)
        .map(|i| unsafe { import.add_memory(ptr, i * 32, 32) }.unwrap())
        .collect::<Vec<_>>();
    assert_eq!(import.reference_count(), 4);

    let memories = managers
        .into_iter()
        .map(|m| LargeMemory::from_manager(Arc::new(m) as Arc<dyn LargeMemoryManager<u8>>))
        .collect::<Vec<_>>();
    assert!(memories.iter().all(|m| m.len() == 32));

    let mut memories = memories.into_iter();
    for released in 1..=3 {
        drop(memories.next());
        assert_eq!(import.reference_count(), 4 - released);
        assert_eq!(frees.load(Ordering::SeqCst), 0);
    }
    import.release();
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}

#[test]
fn test_memory_over_allocated_buffer() {
    let allocator = NativeMemoryAllocator::with_alignment(128).unwrap();
    let mut owner = LargeMemoryOwner::allocate(&allocator, 1024).unwrap();
    {
        let mut span = owner.span_mut().unwrap();
        for (i, b) in span.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
    }

    let memory = owner.memory().clone();
    let window = memory.slice(100, 50).unwrap().slice(10, 5).unwrap();
    assert_eq!(window.offset(), 110);
    assert_eq!(window.to_vec().unwrap(), vec![110, 111, 112, 113, 114]);

    let read_only = ReadOnlyLargeMemory::from(window.clone());
    let handle = read_only.pin().unwrap();
    assert_eq!(unsafe { *handle.as_ptr() }, 110);
    drop(handle);

    assert!(!owner.dispose());
    drop(read_only);
    drop(window);
    assert_eq!(allocator.statistics().live_allocations(), 1);
    drop(memory);
    assert_eq!(allocator.statistics().live_allocations(), 0);
}

#[test]
fn test_memory_structural_equality_over_managers() {
    let allocator = NativeMemoryAllocator::new();
    let memory = LargeMemory::from_manager(allocator.allocate(64).unwrap());
    let other = LargeMemory::from_manager(allocator.allocate(64).unwrap());
    assert_eq!(memory.slice(8, 8).unwrap(), memory.slice(8, 8).unwrap());
    assert_ne!(memory.slice(8, 8).unwrap(), other.slice(8, 8).unwrap());
    assert_eq!(memory.to_vec().unwrap(), other.to_vec().unwrap());
}

#[test]
fn test_random_slicing_against_allocated_buffer() {
    fastrand::seed(90_210);
    let allocator = NativeMemoryAllocator::new();
    let mut memory = LargeMemory::from_manager(allocator.allocate(4096).unwrap());
    memory
        .span_mut()
        .unwrap()
        .iter_mut()
        .enumerate()
        .for_each(|(i, b)| *b = i as u8);
    let expected = memory.to_vec().unwrap();

    for _ in 0..1000 {
        let a = fastrand::u64(0..=4096);
        let b = fastrand::u64(0..=4096 - a);
        let c = fastrand::u64(0..=b);
        let d = fastrand::u64(0..=b - c);
        let slice = memory.slice(a, b).unwrap().slice(c, d).unwrap();
        let start = (a + c) as usize;
        assert_eq!(
            slice.span().unwrap().as_slice(),
            &expected[start..start + d as usize]
        );
        assert!(
            memory
                .slice(a, b)
                .unwrap()
                .slice(c, b - c + 1)
                .unwrap_err()
                .is_out_of_range()
        );
    }
    drop(memory);
    assert_eq!(allocator.statistics().live_allocations(), 0);
}
