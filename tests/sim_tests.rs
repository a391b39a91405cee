#![cfg(feature = "std")]

use nxp_flashalgo::algo::{status_code, verify_code};
use nxp_flashalgo::target::{Call, CallKind};
use nxp_flashalgo::{FlashAlgorithm, PartDB, Programmer, SimTarget, Status, VerifyMismatch};

const ID_256K: u32 = 0x8844_5101;
const ID_512K: u32 = 0x8854_5102;

fn algo_512k() -> FlashAlgorithm<SimTarget> {
    let mut algo = FlashAlgorithm::new(SimTarget::new(ID_512K, 512 * 1024));
    algo.init(0, 12_000_000, 1).unwrap();
    algo.target_mut().take_calls();
    algo
}

#[test]
fn init_classifies_flash_size() {
    let mut algo = FlashAlgorithm::new(SimTarget::new(ID_256K, 256 * 1024));
    assert_eq!(algo.topology().top_sector(), 15);
    assert_eq!(status_code(algo.init(0, 0, 2)), 0);
    assert_eq!(algo.topology().top_sector(), 7);

    let mut algo = FlashAlgorithm::new(SimTarget::new(ID_512K, 512 * 1024));
    assert_eq!(status_code(algo.init(0, 0, 2)), 0);
    assert_eq!(algo.topology().top_sector(), 15);
    assert_eq!(status_code(algo.uninit(2)), 0);
}

#[test]
fn init_refreshes_core_clock() {
    let target = SimTarget::new(ID_512K, 512 * 1024).with_core_clock(96_000_000);
    let mut algo = FlashAlgorithm::new(target);
    assert_eq!(algo.core_clock().khz(), 12_000);
    algo.init(0, 0, 1).unwrap();
    assert_eq!(algo.core_clock().khz(), 96_000);
}

#[test]
fn erase_chip_covers_all_sectors() {
    let mut algo = algo_512k();
    algo.target_mut().flash_mut()[0x7_0000] = 0;
    assert_eq!(status_code(algo.erase_chip()), 0);
    assert_eq!(
        algo.target().calls(),
        &[
            Call::Prepare { start: 0, end: 15 },
            Call::Erase { start: 0, end: 15 },
        ]
    );
    assert!(algo.target().flash().iter().all(|&b| b == 0xff));
}

#[test]
fn erase_chip_on_small_part_stops_at_sector_7() {
    let mut algo = FlashAlgorithm::new(SimTarget::new(ID_256K, 256 * 1024));
    algo.init(0, 0, 1).unwrap();
    assert_eq!(status_code(algo.erase_chip()), 0);
    assert_eq!(algo.target().calls()[1], Call::Erase { start: 0, end: 7 });
}

#[test]
fn erase_chip_before_init_uses_default_topology() {
    let mut algo = FlashAlgorithm::new(SimTarget::new(ID_512K, 512 * 1024));
    assert_eq!(status_code(algo.erase_chip()), 0);
    assert_eq!(algo.target().calls()[0], Call::Prepare { start: 0, end: 15 });
}

#[test]
fn erase_chip_returns_erase_failure() {
    let mut algo = algo_512k();
    algo.target_mut().inject_fault(CallKind::Erase, 3, Status::Busy);
    assert_eq!(status_code(algo.erase_chip()), 11);
    assert_eq!(algo.target().calls().len(), 2);
}

#[test]
fn erase_chip_stops_on_prepare_failure() {
    let mut algo = algo_512k();
    algo.target_mut()
        .inject_fault(CallKind::Prepare, 0, Status::CodeReadProtectionEnabled);
    assert_eq!(status_code(algo.erase_chip()), 19);
    assert_eq!(algo.target().calls(), &[Call::Prepare { start: 0, end: 15 }]);
}

#[test]
fn erase_sector_sequence() {
    let mut algo = algo_512k();
    let addr = 5 * 0x8000 + 0x1234;
    algo.target_mut().flash_mut()[5 * 0x8000] = 0;
    assert_eq!(status_code(algo.erase_sector(addr)), 0);
    assert_eq!(
        algo.target().calls(),
        &[
            Call::Prepare { start: 5, end: 5 },
            Call::Erase { start: 5, end: 5 },
            Call::BlankCheck { start: 5, end: 5 },
        ]
    );
    assert_eq!(algo.target().flash()[5 * 0x8000], 0xff);
}

#[test]
fn erase_sector_reports_blank_check_result() {
    let mut algo = algo_512k();
    algo.target_mut()
        .inject_fault(CallKind::BlankCheck, 5, Status::SectorNotBlank);
    assert_eq!(status_code(algo.erase_sector(5 * 0x8000)), 8);
    assert_eq!(algo.target().calls().len(), 3);
}

#[test]
fn erase_sector_short_circuits() {
    let mut algo = algo_512k();
    algo.target_mut().inject_fault(CallKind::Erase, 2, Status::Busy);
    assert_eq!(status_code(algo.erase_sector(0x1_0000)), 11);
    assert_eq!(
        algo.target().calls(),
        &[
            Call::Prepare { start: 2, end: 2 },
            Call::Erase { start: 2, end: 2 },
        ]
    );
}

#[test]
fn erase_sector_out_of_range_is_rejected_by_iap() {
    let mut algo = FlashAlgorithm::new(SimTarget::new(ID_256K, 256 * 1024));
    algo.init(0, 0, 1).unwrap();
    assert_eq!(status_code(algo.erase_sector(0x4_0000)), 7);
}

#[test]
fn program_page_sequence() {
    let mut algo = algo_512k();
    let addr = 2 * 0x8000 + 0x300;
    let page: Vec<u8> = (0..=255u8).collect();
    assert_eq!(status_code(algo.program_page(addr, 256, &page)), 0);
    assert_eq!(
        algo.target().calls(),
        &[
            Call::Prepare { start: 2, end: 2 },
            Call::Copy { dst: addr, len: 256 },
        ]
    );
    assert_eq!(&algo.target().flash()[addr as usize..addr as usize + 256], &page[..]);
}

#[test]
fn program_page_skips_copy_when_prepare_fails() {
    let mut algo = algo_512k();
    algo.target_mut()
        .inject_fault(CallKind::Prepare, 2, Status::InvalidSector);
    assert_eq!(status_code(algo.program_page(0x1_0000, 256, &[0u8; 256])), 7);
    assert_eq!(algo.target().calls(), &[Call::Prepare { start: 2, end: 2 }]);
}

#[test]
fn program_page_passes_copy_status_through() {
    let mut algo = algo_512k();
    // unaligned destination
    assert_eq!(status_code(algo.program_page(0x10, 256, &[0u8; 256])), 3);
    // size the ROM does not accept
    assert_eq!(status_code(algo.program_page(0x100, 100, &[0u8; 256])), 6);
}

#[test]
fn verify_reports_end_or_first_mismatch() {
    let mut algo = algo_512k();
    let data: Vec<u8> = (0..600u32).map(|i| (i * 7) as u8).collect();
    algo.target_mut().flash_mut()[0x1000..0x1000 + 600].copy_from_slice(&data);

    assert_eq!(algo.verify(0x1000, 600, &data), Ok(0x1000 + 600));
    assert_eq!(verify_code(algo.verify(0x1000, 600, &data)), 0x1258);

    algo.target_mut().flash_mut()[0x1000 + 300] ^= 0x01;
    assert_eq!(
        algo.verify(0x1000, 600, &data),
        Err(VerifyMismatch { address: 0x1000 + 300 })
    );
    // only the first `size` bytes are compared
    assert_eq!(algo.verify(0x1000, 300, &data), Ok(0x1000 + 300));
}

#[test]
fn verify_with_short_buffer_or_unmapped_range() {
    let mut algo = algo_512k();
    let data = [0xffu8; 16];
    assert_eq!(verify_code(algo.verify(0, 32, &data)), 16);
    assert_eq!(verify_code(algo.verify(0x7_fff8, 16, &data)), 0x7_fff8);
}

#[test]
fn blank_check_compares_pattern() {
    let mut algo = algo_512k();
    assert_eq!(status_code(algo.blank_check(0, 0x8_0000, 0xff)), 0);
    assert_eq!(status_code(algo.blank_check(0, 16, 0x00)), 1);

    algo.target_mut().flash_mut()[0x4321] = 0x7f;
    assert_eq!(status_code(algo.blank_check(0x4000, 0x400, 0xff)), 1);
    assert_eq!(status_code(algo.blank_check(0x4322, 0x100, 0xff)), 0);
    match algo.blank_check(0x4000, 0x400, 0xff) {
        Err(nxp_flashalgo::AlgoError::NotBlank { address, found }) => {
            assert_eq!(address, 0x4321);
            assert_eq!(found, 0x7f);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(status_code(algo.blank_check(0x7_ff00, 0x200, 0xff)), 1);
}

#[test]
fn programmer_round_trip() {
    let target = SimTarget::new(ID_512K, 512 * 1024);
    let mut programmer = Programmer::new(target);
    let image: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();

    let mut last = 0;
    programmer.flash(0x8000, &image, |n| last = n).unwrap();
    assert_eq!(last, image.len());
    programmer.verify(0x8000, &image).unwrap();
    programmer.blank_check(0, 0x8000).unwrap();

    let sim = programmer.into_target();
    assert_eq!(&sim.flash()[0x8000..0x8000 + image.len()], &image[..]);
    // tail of the last page is padded
    assert_eq!(sim.flash()[0x8000 + image.len()], 0xff);
    let erased: Vec<Call> = sim
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Erase { .. }))
        .copied()
        .collect();
    assert_eq!(
        erased,
        vec![Call::Erase { start: 1, end: 1 }, Call::Erase { start: 2, end: 2 }]
    );
}

#[test]
fn programmer_rejects_bad_requests() {
    let mut programmer = Programmer::new(SimTarget::new(ID_256K, 256 * 1024));
    assert!(programmer.flash(0x10, &[0u8; 16], |_| ()).is_err());
    assert!(programmer.flash(0x3_ff00, &[0u8; 512], |_| ()).is_err());
    assert!(programmer.flash(0, &[], |_| ()).is_err());
}

#[test]
fn programmer_surfaces_status_code() {
    let mut target = SimTarget::new(ID_512K, 512 * 1024);
    target.inject_fault(CallKind::Copy, 0, Status::Busy);
    let mut programmer = Programmer::new(target);
    let err = programmer.flash(0, &[0u8; 256], |_| ()).unwrap_err();
    assert!(err.to_string().contains("status 11"), "{}", err);
}

#[test]
fn programmer_verify_mismatch() {
    let mut programmer = Programmer::new(SimTarget::new(ID_512K, 512 * 1024));
    programmer.flash(0, &[0x11u8; 256], |_| ()).unwrap();
    let err = programmer.verify(0, &[0x11, 0x11, 0x22]).unwrap_err();
    assert!(err.to_string().contains("0x00000002"), "{}", err);
}

#[test]
fn programmer_info_and_erase() {
    let db = PartDB::load().unwrap();
    let part = db.find_by_name("LPC54101J256").unwrap();
    let mut target = SimTarget::for_part(&part);
    target.flash_mut()[0x100] = 0;
    let mut programmer = Programmer::new(target);
    programmer.dump_info(&db).unwrap();
    assert_eq!(programmer.algorithm().topology().top_sector(), 7);
    programmer.erase_chip().unwrap();
    programmer.blank_check(0, part.flash_size).unwrap();
}

#[test]
fn programmer_blank_check_range() {
    let mut programmer = Programmer::new(SimTarget::new(ID_256K, 256 * 1024));
    programmer.blank_check(0x3_ff00, 0x100).unwrap();
    assert!(programmer.blank_check(0x4_0000, 0).is_err());
    assert!(programmer.blank_check(0x100, 0).is_err());
    let err = programmer.blank_check(0x3_ff00, 0x200).unwrap_err();
    assert!(err.to_string().contains("256KiB"), "{}", err);
    assert!(programmer.blank_check(0x4_0000, 0x100).is_err());
}

#[test]
fn image_file_round_trip() {
    let path = std::env::temp_dir().join(format!("nxp-flashalgo-{}.bin", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let mut target = SimTarget::new(ID_256K, 256 * 1024);
    target.load_image_file(&path).unwrap();
    assert!(target.flash().iter().all(|&b| b == 0xff));

    let mut programmer = Programmer::new(target);
    programmer.flash(0, &[0xa5u8; 300], |_| ()).unwrap();
    programmer.into_target().save_image_file(&path).unwrap();

    let mut reloaded = SimTarget::new(ID_256K, 256 * 1024);
    reloaded.load_image_file(&path).unwrap();
    assert_eq!(&reloaded.flash()[..300], &[0xa5u8; 300][..]);
    assert_eq!(reloaded.flash()[300], 0xff);
    std::fs::remove_file(&path).unwrap();
}
