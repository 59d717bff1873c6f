mod common;

use common::{Machine, RAM_BASE, booted, pa, va};
use kernel_vmem::{DirIndex, MapError, PageEntryBits, PdEntryKind, Region, TableIndex};

fn rw() -> PageEntryBits {
    PageEntryBits::new().with_writable(true)
}

#[test]
fn release_large_page_then_map_single_page() {
    let (mut m, mut vmm) = booted();

    vmm.unmap_large(va(0x0040_0000)).unwrap();
    assert_eq!(vmm.region(va(0x0040_0000)), Region::Unmapped);
    assert!(vmm.translate(va(0x0040_0000)).is_none());

    vmm.map(va(0x0040_0000), pa(0x0050_0000), rw(), &mut m.frames)
        .unwrap();

    let (p, flags) = vmm.translate(va(0x0040_0000)).unwrap();
    assert_eq!(p.as_u32(), 0x0050_0000);
    assert_eq!(flags.into_bits(), 0x3, "exactly present and writable");
    assert_eq!(vmm.region(va(0x0040_0000)), Region::TableBacked);

    // The rest of the old large page stays unmapped.
    assert!(vmm.translate(va(0x0040_1000)).is_none());
    assert!(vmm.translate(va(0x007F_F000)).is_none());

    let entries: Vec<_> = vmm.table_entries(DirIndex::new(1)).unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, TableIndex::new(0));
    assert_eq!(entries[0].1.raw(), 0x0050_0003);
    assert_eq!(m.frames.allocs, 3);
}

#[test]
fn map_inside_large_page_is_refused() {
    let (mut m, mut vmm) = booted();

    let err = vmm
        .map(va(0x0040_0000), pa(0x0050_0000), rw(), &mut m.frames)
        .unwrap_err();
    assert_eq!(err, MapError::InvalidTranslationRequest(va(0x0040_0000)));

    // Large mapping unchanged, nothing allocated, nothing invalidated.
    let (p, flags) = vmm.translate(va(0x0040_0000)).unwrap();
    assert_eq!(p.as_u32(), 0x0040_0000);
    assert!(flags.large_page());
    assert_eq!(m.frames.allocs, 2);
    assert!(m.invalidations().is_empty());
}

#[test]
fn map_into_self_map_window_is_refused() {
    let (mut m, mut vmm) = booted();
    for v in [0xFFC0_0000, 0xFFC0_1000, 0xFFFF_F000] {
        assert_eq!(
            vmm.map(va(v), pa(0x0050_0000), rw(), &mut m.frames),
            Err(MapError::InvalidTranslationRequest(va(v)))
        );
    }
    assert_eq!(
        vmm.unmap_large(va(0xFFFF_F000)),
        Err(MapError::InvalidTranslationRequest(va(0xFFFF_F000)))
    );
    assert_eq!(vmm.region(va(0xFFFF_F000)), Region::SelfMap);
}

#[test]
fn map_in_low_table_reuses_boot_table() {
    let (mut m, mut vmm) = booted();
    let flags = PageEntryBits::new().with_user_access(true);
    vmm.map(va(0x0000_3000), pa(0x0070_0000), flags, &mut m.frames)
        .unwrap();

    let (p, got) = vmm.translate(va(0x0000_3ABC)).unwrap();
    assert_eq!(p.as_u32(), 0x0070_0ABC);
    assert!(got.present() && got.user_access() && !got.writable());
    assert_eq!(m.frames.allocs, 2);

    // Neighbours keep their identity mapping.
    assert_eq!(vmm.translate(va(0x0000_2000)).unwrap().0.as_u32(), 0x2000);
    assert_eq!(vmm.translate(va(0x0000_4000)).unwrap().0.as_u32(), 0x4000);
}

#[test]
fn page_table_is_created_once_per_region() {
    let (mut m, mut vmm) = booted();
    vmm.unmap_large(va(0x0080_0000)).unwrap();

    vmm.map(va(0x0080_0000), pa(0x0010_0000), rw(), &mut m.frames)
        .unwrap();
    vmm.map(va(0x0080_5000), pa(0x0010_1000), rw(), &mut m.frames)
        .unwrap();
    vmm.map(va(0x00BF_F000), pa(0x0010_2000), rw(), &mut m.frames)
        .unwrap();
    assert_eq!(m.frames.allocs, 3);

    match vmm.directory_entry(DirIndex::new(2)) {
        Some(PdEntryKind::NextPageTable(table, pde)) => {
            assert_eq!(table.base().as_u32(), RAM_BASE + 2 * 0x1000);
            assert!(pde.present() && pde.writable() && pde.user());
            assert!(m.frames.is_live(table));
        }
        other => panic!("slot 2: {other:?}"),
    }

    let count = vmm.table_entries(DirIndex::new(2)).unwrap().count();
    assert_eq!(count, 3, "fresh table must start zeroed");
}

#[test]
fn new_table_window_is_invalidated_before_use() {
    let (mut m, mut vmm) = booted();
    vmm.unmap_large(va(0x00C0_0000)).unwrap();
    vmm.map(va(0x00C0_1000), pa(0x0020_0000), rw(), &mut m.frames)
        .unwrap();

    let inv = m.invalidations();
    assert_eq!(
        inv,
        vec![
            0x00C0_0000, // large page released
            0xFFC0_3000, // window page of slot 3 after linking the table
            0x00C0_1000, // the mapped page
        ]
    );
    assert_eq!(m.cpu.borrow().cr3_loads, 1, "no full flush");
}

#[test]
fn remap_overwrites_and_invalidates() {
    let (mut m, mut vmm) = booted();
    vmm.map(va(0x0000_5000), pa(0x0030_0000), rw(), &mut m.frames)
        .unwrap();
    vmm.map(va(0x0000_5000), pa(0x0031_0000), rw(), &mut m.frames)
        .unwrap();

    assert_eq!(vmm.translate(va(0x0000_5000)).unwrap().0.as_u32(), 0x0031_0000);
    assert_eq!(m.invalidations(), vec![0x5000, 0x5000]);
}

#[test]
fn unmap_is_idempotent() {
    let (mut m, mut vmm) = booted();
    vmm.map(va(0x0000_6000), pa(0x0030_0000), rw(), &mut m.frames)
        .unwrap();

    vmm.unmap(va(0x0000_6123));
    assert!(vmm.translate(va(0x0000_6000)).is_none());
    let after_first = m.invalidations();
    assert_eq!(after_first.last(), Some(&0x6000));

    vmm.unmap(va(0x0000_6000));
    assert!(vmm.translate(va(0x0000_6000)).is_none());
    assert_eq!(m.invalidations(), after_first, "second unmap changes nothing");
    assert_eq!(m.frames.frees, 0);
}

#[test]
fn unmap_ignores_large_and_absent_regions() {
    let (_m, mut vmm) = booted();

    vmm.unmap(va(0x0040_0000));
    assert_eq!(vmm.translate(va(0x0040_0000)).unwrap().0.as_u32(), 0x0040_0000);

    vmm.unmap_large(va(0x0100_0000)).unwrap();
    vmm.unmap(va(0x0100_0000));
    assert_eq!(vmm.region(va(0x0100_0000)), Region::Unmapped);

    vmm.unmap(va(0xFFFF_F000));
    assert_eq!(vmm.translate(va(0xFFFF_F000)).unwrap().0.as_u32(), RAM_BASE);
}

#[test]
fn unmap_never_frees_the_page_table() {
    let (mut m, mut vmm) = booted();
    vmm.unmap_large(va(0x0040_0000)).unwrap();
    vmm.map(va(0x0040_0000), pa(0x0050_0000), rw(), &mut m.frames)
        .unwrap();
    vmm.unmap(va(0x0040_0000));

    assert_eq!(vmm.region(va(0x0040_0000)), Region::TableBacked);
    assert_eq!(vmm.table_entries(DirIndex::new(1)).unwrap().count(), 0);
    assert_eq!(m.frames.frees, 0);
    assert_eq!(m.frames.live_count(), 3);
}

#[test]
fn unmap_large_rules() {
    let (_m, mut vmm) = booted();

    assert_eq!(
        vmm.unmap_large(va(0x0000_1000)),
        Err(MapError::InvalidTranslationRequest(va(0x0000_1000)))
    );
    assert_eq!(vmm.region(va(0)), Region::TableBacked);

    vmm.unmap_large(va(0x0123_4567)).unwrap();
    assert_eq!(vmm.region(va(0x0100_0000)), Region::Unmapped);
    // Already absent.
    vmm.unmap_large(va(0x0100_0000)).unwrap();
}

#[test]
fn table_allocation_failure_leaves_region_absent() {
    let mut m = Machine::with_limit(8, 2);
    let mut vmm = m.boot().unwrap();

    vmm.unmap_large(va(0x0140_0000)).unwrap();
    let err = vmm
        .map(va(0x0140_0000), pa(0x0050_0000), rw(), &mut m.frames)
        .unwrap_err();
    assert_eq!(err, MapError::AllocationExhausted);
    assert_eq!(vmm.region(va(0x0140_0000)), Region::Unmapped);
    assert!(vmm.directory_entry(DirIndex::new(5)).is_none());
}

#[test]
fn map_drops_address_bits_from_flags() {
    let (mut m, mut vmm) = booted();
    let flags = PageEntryBits::from_bits(0xDEAD_B000 | 0x2);
    vmm.map(va(0x0000_7000), pa(0x0034_5000), flags, &mut m.frames)
        .unwrap();

    let (p, got) = vmm.translate(va(0x0000_7000)).unwrap();
    assert_eq!(p.as_u32(), 0x0034_5000);
    assert_eq!(got.into_bits(), 0x3);
}

#[test]
fn map_keeps_bit_7_as_pat_in_a_small_page() {
    let (mut m, mut vmm) = booted();
    let flags = PageEntryBits::new().with_writable(true).with_large_page(true);
    vmm.map(va(0x0000_8000), pa(0x0060_0000), flags, &mut m.frames)
        .unwrap();

    let (p, got) = vmm.translate(va(0x0000_8123)).unwrap();
    assert_eq!(p.as_u32(), 0x0060_0123);
    assert_eq!(got.into_bits(), 0x83);
    assert!(got.contains(flags));

    // Still a 4 KiB leaf in the boot table; neighbours are untouched.
    assert_eq!(vmm.region(va(0x0000_8000)), Region::TableBacked);
    assert_eq!(vmm.translate(va(0x0000_9000)).unwrap().0.as_u32(), 0x9000);
}

#[test]
fn map_range_crosses_into_large_page_and_stops() {
    let (mut m, mut vmm) = booted();
    let err = vmm
        .map_range(va(0x003F_E000), pa(0x0090_0000), 0x3000, rw(), &mut m.frames)
        .unwrap_err();
    assert_eq!(err, MapError::InvalidTranslationRequest(va(0x0040_0000)));

    assert_eq!(vmm.translate(va(0x003F_E000)).unwrap().0.as_u32(), 0x0090_0000);
    assert_eq!(vmm.translate(va(0x003F_F000)).unwrap().0.as_u32(), 0x0090_1000);
    assert_eq!(vmm.translate(va(0x0040_0000)).unwrap().0.as_u32(), 0x0040_0000);
}

#[test]
fn map_range_and_unmap_range_round_partial_pages() {
    let (mut m, mut vmm) = booted();
    vmm.unmap_large(va(0x0200_0000)).unwrap();

    // 0x1801 bytes starting mid-page touch three pages.
    vmm.map_range(va(0x0200_0800), pa(0x0060_0000), 0x1801, rw(), &mut m.frames)
        .unwrap();
    let mapped: Vec<_> = vmm
        .table_entries(DirIndex::new(8))
        .unwrap()
        .map(|(i, e)| (i.as_usize(), e.raw()))
        .collect();
    assert_eq!(
        mapped,
        vec![(0, 0x0060_0003), (1, 0x0060_1003), (2, 0x0060_2003)]
    );

    vmm.unmap_range(va(0x0200_0FFF), 0x1001);
    let left: Vec<_> = vmm
        .table_entries(DirIndex::new(8))
        .unwrap()
        .map(|(i, _)| i.as_usize())
        .collect();
    assert_eq!(left, vec![2]);
}

#[test]
fn map_range_past_four_gib_is_refused() {
    let (mut m, mut vmm) = booted();
    vmm.unmap_large(va(0xFF80_0000)).unwrap();
    let err = vmm
        .map_range(va(0xFFBF_F000), pa(0xFFFF_F000), 0x2000, rw(), &mut m.frames)
        .unwrap_err();
    assert_eq!(err, MapError::InvalidTranslationRequest(va(0xFFBF_F000)));

    // The first page fit below 4 GiB on both sides.
    assert_eq!(vmm.translate(va(0xFFBF_F000)).unwrap().0.as_u32(), 0xFFFF_F000);
}

#[test]
fn entry_for_without_allocator_reports_absent_tables() {
    let (_m, mut vmm) = booted();
    vmm.unmap_large(va(0x0300_0000)).unwrap();
    assert_eq!(vmm.entry_for(va(0x0300_0000), None).map(|e| e.is_some()), Ok(false));
    assert_eq!(vmm.entry_for(va(0x0000_2000), None).map(|e| e.is_some()), Ok(true));
}
