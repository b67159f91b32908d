// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! End-to-end scenarios for the I/O manager against the scripted bus.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use cmio_core::{initialize, AoMode, IoManager};
use cmio_modbus::frame::registers_to_f32;
use cmio_modbus::FunctionCode;
use cmio_tests::common::mocks::{FakeBus, FakeCard};
use cmio_tests::common::test_io_config;

fn manager_on(bus: &FakeBus) -> IoManager {
    IoManager::new(test_io_config(bus))
}

fn registers_of(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

// =============================================================================
// Discovery
// =============================================================================

#[tokio::test]
async fn test_add_card_auto_detects_io4040() {
    let bus = FakeBus::new().with_card(1, FakeCard::io4040().with_serial_number("CM0001"));
    let manager = manager_on(&bus);

    let card = manager.add_card("/dev/x", 1, None).await.unwrap();

    assert_eq!(card.module, "IO4040");
    assert_eq!(card.last.digital_in.len(), 4);
    assert_eq!(card.last.digital_out.len(), 4);
    assert!(card.last.analog_in.is_empty());
    assert_eq!(card.last.serial_number, "CM0001");
    assert_eq!(card.last.baud_rate, 9600);

    // The probe tried 8 discrete inputs before falling back to 4.
    let di_probes = bus.requests_for(FunctionCode::ReadDiscreteInputs);
    assert_eq!(di_probes[0].quantity, 8);
    assert_eq!(di_probes[1].quantity, 4);
}

#[tokio::test]
async fn test_add_card_rejects_unknown_counts() {
    // An empty slave answers nothing; a slave with unmatched counts is not
    // registrable either way.
    let bus = FakeBus::new();
    let manager = manager_on(&bus);

    let error = manager.add_card("/dev/x", 3, None).await.unwrap_err();
    assert!(error.to_string().contains("unable to detect module"));
    assert!(manager.get_all_cards().is_empty());
}

#[tokio::test]
async fn test_add_card_explicit_module_skips_probe() {
    let bus = FakeBus::new().with_card(2, FakeCard::io0080());
    let manager = manager_on(&bus);

    let card = manager.add_card("/dev/x", 2, Some("IO0080")).await.unwrap();
    assert_eq!(card.module, "IO0080");

    // No probe traffic: discrete-input reads never happen for this model.
    assert!(bus.requests_for(FunctionCode::ReadDiscreteInputs).is_empty());
}

#[tokio::test]
async fn test_initialize_sweeps_bus_and_starts_cycle() {
    let bus = FakeBus::new()
        .with_card(1, FakeCard::io4040())
        .with_card(3, FakeCard::io0404());
    let mut core = initialize(test_io_config(&bus)).await;

    let cards = core.manager.get_all_cards();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].slave_id, 1);
    assert_eq!(cards[1].slave_id, 3);
    assert!(core.cycle.is_some());

    core.shutdown().await;
}

#[tokio::test]
async fn test_initialize_without_cards_skips_cycle() {
    let bus = FakeBus::new();
    let core = initialize(test_io_config(&bus)).await;

    assert!(core.manager.get_all_cards().is_empty());
    assert!(core.cycle.is_none());
}

// =============================================================================
// Registry
// =============================================================================

#[tokio::test]
async fn test_ids_are_monotonic_and_snapshots_sorted() {
    let bus = FakeBus::new()
        .with_card(1, FakeCard::io4040())
        .with_card(2, FakeCard::io4040())
        .with_card(3, FakeCard::io4040());
    let manager = manager_on(&bus);

    for slave in 1..=3 {
        manager.add_card("/dev/x", slave, None).await.unwrap();
    }

    let ids: Vec<String> = manager.get_all_cards().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);

    assert!(manager.remove_card("2"));
    assert!(!manager.remove_card("2"));

    let ids: Vec<String> = manager.get_all_cards().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["1", "3"]);
}

#[tokio::test]
async fn test_rediscover_regenerates_ids() {
    let bus = FakeBus::new().with_card(1, FakeCard::io4040());
    let mut core = initialize(test_io_config(&bus)).await;

    core.manager.remove_card("1");
    let cards = core.rediscover(test_io_config(&bus), None).await;

    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].id, "1");
    assert!(core.cycle.is_some());

    core.shutdown().await;
}

// =============================================================================
// Write batching
// =============================================================================

#[tokio::test]
async fn test_unchanged_do_write_is_elided() {
    let bus = FakeBus::new().with_card(1, FakeCard::io4040());
    let manager = manager_on(&bus);
    let card = manager.add_card("/dev/x", 1, None).await.unwrap();
    bus.clear_requests();

    manager.queue_write_do(&card.id, 1, false).unwrap();
    manager.process_write_queue().await;

    // One result, ok, and no coil frame touched the bus.
    assert!(bus.requests_for(FunctionCode::WriteMultipleCoils).is_empty());
    assert!(bus.requests_for(FunctionCode::WriteSingleCoil).is_empty());
}

#[tokio::test]
async fn test_unchanged_write_reports_skip() {
    let bus = FakeBus::new().with_card(1, FakeCard::io4040());
    let manager = manager_on(&bus);
    let card = manager.add_card("/dev/x", 1, None).await.unwrap();
    bus.clear_requests();

    let results = manager
        .process_batch_write(vec![cmio_core::WriteOp::digital_out(&card.id, 1, false)])
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].index, 0);
    assert!(!results[0].is_error());
    assert_eq!(results[0].message.as_deref(), Some("value unchanged, skipped"));
    assert!(bus.requests().is_empty());
}

#[tokio::test]
async fn test_do_writes_coalesce_into_one_frame() {
    let bus = FakeBus::new().with_card(1, FakeCard::io4040());
    let manager = manager_on(&bus);
    let card = manager.add_card("/dev/x", 1, None).await.unwrap();
    bus.clear_requests();

    manager.queue_write_do(&card.id, 0, true).unwrap();
    manager.queue_write_do(&card.id, 3, true).unwrap();
    manager.process_write_queue().await;

    let frames = bus.requests_for(FunctionCode::WriteMultipleCoils);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].address, 0);
    assert_eq!(frames[0].quantity, 4);
    assert_eq!(frames[0].data, vec![0b0000_1001]);

    // The device really ended up with the coalesced pattern.
    let device = bus.card(1).unwrap();
    assert_eq!(device.digital_out, vec![true, false, false, true]);
}

#[tokio::test]
async fn test_ao_writes_coalesce_over_register_pairs() {
    let bus = FakeBus::new().with_card(1, FakeCard::io0404());
    let manager = manager_on(&bus);
    let card = manager.add_card("/dev/x", 1, None).await.unwrap();
    bus.clear_requests();

    manager.queue_write_ao(&card.id, 1, 2500.0).unwrap();
    manager.queue_write_ao(&card.id, 3, 7000.0).unwrap();
    manager.process_write_queue().await;

    let frames = bus.requests_for(FunctionCode::WriteMultipleRegisters);
    assert_eq!(frames.len(), 1);
    // Window [1, 3] starts at register 2 and spans 3 channels = 6 registers.
    assert_eq!(frames[0].address, 2);
    assert_eq!(frames[0].quantity, 6);

    let device = bus.card(1).unwrap();
    assert_eq!(device.analog_out, vec![0.0, 2500.0, 0.0, 7000.0]);
}

#[tokio::test]
async fn test_ao_mode_writes_stay_single_frames() {
    let bus = FakeBus::new().with_card(1, FakeCard::io0404());
    let manager = manager_on(&bus);
    let card = manager.add_card("/dev/x", 1, None).await.unwrap();
    bus.clear_requests();

    let results = manager
        .process_batch_write(vec![
            cmio_core::WriteOp::ao_mode(&card.id, 0, AoMode::Current4To20Ma),
            cmio_core::WriteOp::ao_mode(&card.id, 1, AoMode::Current4To20Ma),
        ])
        .await;

    assert!(results.iter().all(|r| !r.is_error()));
    let frames = bus.requests_for(FunctionCode::WriteSingleRegister);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].address, 0x0190);
    assert_eq!(frames[1].address, 0x0191);

    let device = bus.card(1).unwrap();
    assert_eq!(device.ao_modes, vec![0x0004, 0x0004, 0x0001, 0x0001]);
}

#[tokio::test]
async fn test_batch_results_preserve_caller_order() {
    let bus = FakeBus::new().with_card(1, FakeCard::io4040());
    let manager = manager_on(&bus);
    let card = manager.add_card("/dev/x", 1, None).await.unwrap();

    let results = manager
        .process_batch_write(vec![
            cmio_core::WriteOp::digital_out(&card.id, 0, true),
            cmio_core::WriteOp::digital_out("99", 0, true),
            cmio_core::WriteOp::digital_out(&card.id, 9, true),
        ])
        .await;

    assert_eq!(results.len(), 3);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.index, i);
    }
    assert!(!results[0].is_error());
    assert_eq!(results[1].message.as_deref(), Some("card not found"));
    assert_eq!(results[2].message.as_deref(), Some("index out of range"));
}

#[tokio::test]
async fn test_queue_validation_rejects_bad_targets() {
    let bus = FakeBus::new().with_card(1, FakeCard::io4040());
    let manager = manager_on(&bus);
    let card = manager.add_card("/dev/x", 1, None).await.unwrap();

    assert!(manager.queue_write_do("99", 0, true).is_err());
    assert!(manager.queue_write_do(&card.id, 4, true).is_err());
    // IO4040 has no analog outputs at all.
    assert!(manager.queue_write_ao(&card.id, 0, 1.0).is_err());
    assert!(manager
        .queue_write_ao_type(&card.id, 0, AoMode::Voltage0To10V)
        .is_err());
}

// =============================================================================
// Safe state
// =============================================================================

#[tokio::test]
async fn test_safe_state_covers_every_card() {
    let bus = FakeBus::new()
        .with_card(1, FakeCard::io0404().with_ao_modes(&[0x0004, 0x0001, 0x0004, 0x0004]))
        .with_card(2, {
            let mut card = FakeCard::io0080();
            card.digital_out = vec![true; 8];
            card
        });
    let manager = manager_on(&bus);
    manager.add_card("/dev/x", 1, None).await.unwrap();
    manager.add_card("/dev/x", 2, None).await.unwrap();
    bus.clear_requests();

    manager.write_all_outputs_to_safe_state().await.unwrap();

    // IO0080: exactly one coil frame, all 8 bits off.
    let coil_frames = bus.requests_for(FunctionCode::WriteMultipleCoils);
    assert_eq!(coil_frames.len(), 1);
    assert_eq!(coil_frames[0].slave, 2);
    assert_eq!(coil_frames[0].address, 0);
    assert_eq!(coil_frames[0].quantity, 8);
    assert_eq!(coil_frames[0].data, vec![0x00]);

    // IO0404: one register frame at AO base, per-channel values by mode.
    let register_frames = bus.requests_for(FunctionCode::WriteMultipleRegisters);
    assert_eq!(register_frames.len(), 1);
    assert_eq!(register_frames[0].slave, 1);
    assert_eq!(register_frames[0].address, 0);
    assert_eq!(register_frames[0].quantity, 8);

    let registers = registers_of(&register_frames[0].data);
    let values: Vec<f32> = registers
        .chunks_exact(2)
        .map(|pair| registers_to_f32(pair).unwrap())
        .collect();
    assert_eq!(values, vec![4000.0, 0.0, 4000.0, 4000.0]);

    let device = bus.card(2).unwrap();
    assert_eq!(device.digital_out, vec![false; 8]);
}

#[tokio::test]
async fn test_safe_state_attempts_all_cards_despite_failure() {
    // Card "1" points at a slave that is not on the bus; card "2" must
    // still be driven safe, and the first error is returned.
    let bus = FakeBus::new().with_card(2, {
        let mut card = FakeCard::io0080();
        card.digital_out = vec![true; 8];
        card
    });
    let manager = manager_on(&bus);
    manager.add_card("/dev/x", 2, Some("IO0080")).await.unwrap();
    manager.add_card("/dev/x", 7, Some("IO0080")).await.unwrap();
    bus.clear_requests();

    let result = manager.write_all_outputs_to_safe_state().await;
    assert!(result.is_err());

    let device = bus.card(2).unwrap();
    assert_eq!(device.digital_out, vec![false; 8]);
}

// =============================================================================
// Reboot and full reads
// =============================================================================

#[tokio::test]
async fn test_reboot_triggers_full_read_on_next_cycle() {
    let bus = FakeBus::new().with_card(1, FakeCard::io0404().with_serial_number("CM0001"));
    let manager = manager_on(&bus);
    let card = manager.add_card("/dev/x", 1, None).await.unwrap();
    assert_eq!(card.last.serial_number, "CM0001");

    // Fast reads preserve identity fields even when the device changes.
    bus.with_card_mut(1, |device| device.serial_number = "CM0002".to_string());
    manager.read_all_and_process_writes().await;
    let card = manager.get_card(&card.id).unwrap();
    assert_eq!(card.last.serial_number, "CM0001");
    assert_eq!(card.last.ao_type.len(), 4);

    // Reboot: the magic frame goes out immediately.
    bus.clear_requests();
    manager.reboot_card(&card.id).await.unwrap();
    let frames = bus.requests_for(FunctionCode::WriteSingleRegister);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].address, 0x0010);
    assert_eq!(frames[0].data, vec![0xFF, 0x00]);
    assert_eq!(bus.card(1).unwrap().reboots, 1);

    // The next pass is a full read: identity fields are re-fetched.
    manager.read_all_and_process_writes().await;
    let card = manager.get_card(&card.id).unwrap();
    assert_eq!(card.last.serial_number, "CM0002");
}

#[tokio::test]
async fn test_read_error_sets_error_and_preserves_state() {
    let bus = FakeBus::new().with_card(1, FakeCard::io4040());
    let manager = manager_on(&bus);
    let card = manager.add_card("/dev/x", 1, None).await.unwrap();
    assert!(card.last.error.is_empty());

    // A card registered against an absent slave times out on every read.
    let ghost = manager.add_card("/dev/x", 9, Some("IO4040")).await.unwrap();
    manager.read_all_and_process_writes().await;

    let ghost = manager.get_card(&ghost.id).unwrap();
    assert!(ghost.last.error.contains("timeout"));

    // The healthy card keeps reading cleanly.
    let card = manager.get_card(&card.id).unwrap();
    assert!(card.last.error.is_empty());
    assert_eq!(card.last.digital_in.len(), 4);
}

// =============================================================================
// State-change callback
// =============================================================================

#[tokio::test]
async fn test_state_change_callback_fires_once_per_cycle() {
    let bus = FakeBus::new().with_card(1, FakeCard::io4040());
    let manager = manager_on(&bus);
    let card = manager.add_card("/dev/x", 1, None).await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let calls = calls.clone();
        let seen = seen.clone();
        manager.set_state_change_callback(Arc::new(move |cards| {
            calls.fetch_add(1, Ordering::SeqCst);
            *seen.lock() = cards;
        }));
    }

    // No change: no callback.
    manager.read_all_and_process_writes().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Flip a digital input: exactly one callback with the fresh snapshot.
    bus.with_card_mut(1, |device| device.digital_in[2] = true);
    manager.read_all_and_process_writes().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    {
        let snapshot = seen.lock();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, card.id);
        assert!(snapshot[0].last.digital_in[2]);
    }

    // Stable again: no further callbacks.
    manager.read_all_and_process_writes().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ai_change_fires_callback() {
    let bus = FakeBus::new().with_card(1, FakeCard::io0440());
    let manager = manager_on(&bus);
    manager.add_card("/dev/x", 1, None).await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    {
        let calls = calls.clone();
        manager.set_state_change_callback(Arc::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        }));
    }

    bus.with_card_mut(1, |device| device.analog_in[0] = 1234.5);
    manager.read_all_and_process_writes().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Write-after-read interleaving
// =============================================================================

#[tokio::test]
async fn test_writes_enqueued_mid_cycle_flush_in_that_cycle() {
    let bus = FakeBus::new().with_card(1, FakeCard::io4040());
    let manager = manager_on(&bus);
    let card = manager.add_card("/dev/x", 1, None).await.unwrap();
    bus.clear_requests();

    manager.queue_write_do(&card.id, 2, true).unwrap();
    manager.read_all_and_process_writes().await;

    let frames = bus.requests_for(FunctionCode::WriteMultipleCoils);
    assert_eq!(frames.len(), 1);
    assert!(bus.card(1).unwrap().digital_out[2]);

    // A second cycle with an empty queue issues no further write frames.
    bus.clear_requests();
    manager.read_all_and_process_writes().await;
    assert!(bus.requests_for(FunctionCode::WriteMultipleCoils).is_empty());
}
