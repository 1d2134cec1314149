// SPDX-License-Identifier: GPL-3.0-only

//! Manager-level routing of commands and block events.

mod support;

use support::{TestEnv, disk_added, disk_removed, partition_added, sys_prefix};
use volmgr_contracts::VolumeError;
use volmgr_service::VolumeManager;
use volmgr_service::config::{ServiceConfig, VolumeEntry};
use volmgr_types::{BroadcastCode, DeviceId, VolumeState};

fn entry(label: &str) -> VolumeEntry {
    VolumeEntry {
        label: label.to_string(),
        mount_point: format!("/storage/{label}").into(),
        sys_path: sys_prefix(label),
        partition: None,
        encryptable: false,
        nonremovable: false,
        debug: false,
    }
}

fn manager(env: &TestEnv, volumes: Vec<VolumeEntry>) -> VolumeManager {
    let config = ServiceConfig {
        primary_mount_point: Some("/storage/sdcard0".into()),
        state_file: "/run/volmgr/state".into(),
        layout: env.layout.clone(),
        volumes,
    };
    let mut manager = VolumeManager::from_config(config, env.deps());
    manager.start();
    manager
}

#[tokio::test]
async fn start_moves_volumes_out_of_init() {
    let env = TestEnv::new();
    let manager = manager(&env, vec![entry("sdcard0"), entry("usbdisk")]);

    let volumes = manager.list();
    assert_eq!(volumes.len(), 2);
    assert!(volumes.iter().all(|v| v.state == VolumeState::NoMedia));
    assert_eq!(env.broadcaster.count_code(BroadcastCode::VolumeStateChange), 2);
}

#[tokio::test]
async fn unknown_labels_are_rejected() {
    let env = TestEnv::new();
    let mut manager = manager(&env, vec![entry("usbdisk")]);

    let err = manager.mount_volume("nosuch").await.expect_err("unknown");
    assert!(matches!(err, VolumeError::UnknownVolume(_)));
}

#[tokio::test]
async fn events_for_unmanaged_devices_are_rejected() {
    let env = TestEnv::new();
    let mut manager = manager(&env, vec![entry("usbdisk")]);

    let event = disk_added("other", DeviceId::new(8, 0), 0);
    let err = manager
        .dispatch_block_event(&event)
        .await
        .expect_err("unmatched");
    assert!(matches!(err, VolumeError::UnsupportedEvent));
}

#[tokio::test]
async fn insertion_broadcasts_and_idles_the_volume() {
    let env = TestEnv::new();
    let mut manager = manager(&env, vec![entry("usbdisk")]);

    manager
        .dispatch_block_event(&disk_added("usbdisk", DeviceId::new(8, 0), 0))
        .await
        .expect("dispatch");

    assert_eq!(env.broadcaster.count_code(BroadcastCode::VolumeDiskInserted), 1);
    assert_eq!(manager.list()[0].state, VolumeState::Idle);
}

#[tokio::test]
async fn partitioned_media_holds_pending_until_complete() {
    let env = TestEnv::new();
    let mut manager = manager(&env, vec![entry("usbdisk")]);

    manager
        .dispatch_block_event(&disk_added("usbdisk", DeviceId::new(8, 0), 2))
        .await
        .expect("disk");
    assert_eq!(manager.list()[0].state, VolumeState::Pending);

    manager
        .dispatch_block_event(&partition_added("usbdisk", DeviceId::new(8, 1), 1))
        .await
        .expect("first partition");
    assert_eq!(manager.list()[0].state, VolumeState::Pending);

    manager
        .dispatch_block_event(&partition_added("usbdisk", DeviceId::new(8, 2), 2))
        .await
        .expect("second partition");
    assert_eq!(manager.list()[0].state, VolumeState::Idle);
}

#[tokio::test]
async fn mount_requested_while_pending_is_retried_on_idle() {
    let env = TestEnv::new();
    let mut manager = manager(&env, vec![entry("usbdisk")]);

    manager
        .dispatch_block_event(&disk_added("usbdisk", DeviceId::new(8, 0), 1))
        .await
        .expect("disk");

    let err = manager.mount_volume("usbdisk").await.expect_err("pending");
    assert!(matches!(err, VolumeError::Busy));

    manager
        .dispatch_block_event(&partition_added("usbdisk", DeviceId::new(8, 1), 1))
        .await
        .expect("partition");

    // The latched mount ran once the volume went idle.
    assert_eq!(manager.list()[0].state, VolumeState::Mounted);
    assert_eq!(env.fs.mount_calls.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn bad_removal_unmounts_and_goes_no_media() {
    let env = TestEnv::new();
    let mut manager = manager(&env, vec![entry("usbdisk")]);

    manager
        .dispatch_block_event(&disk_added("usbdisk", DeviceId::new(8, 0), 1))
        .await
        .expect("disk");
    manager
        .dispatch_block_event(&partition_added("usbdisk", DeviceId::new(8, 1), 1))
        .await
        .expect("partition");
    manager.mount_volume("usbdisk").await.expect("mount");
    assert_eq!(manager.list()[0].state, VolumeState::Mounted);

    manager
        .dispatch_block_event(&disk_removed("usbdisk", DeviceId::new(8, 0)))
        .await
        .expect("removal");

    assert_eq!(env.broadcaster.count_code(BroadcastCode::VolumeDiskRemoved), 1);
    assert_eq!(env.broadcaster.count_code(BroadcastCode::VolumeBadRemoval), 1);
    let volumes = manager.list();
    assert_eq!(volumes[0].state, VolumeState::NoMedia);
    assert_eq!(volumes[0].mounted_device, None);
}

#[tokio::test]
async fn clean_removal_skips_the_bad_removal_broadcast() {
    let env = TestEnv::new();
    let mut manager = manager(&env, vec![entry("usbdisk")]);

    manager
        .dispatch_block_event(&disk_added("usbdisk", DeviceId::new(8, 0), 0))
        .await
        .expect("disk");
    manager
        .dispatch_block_event(&disk_removed("usbdisk", DeviceId::new(8, 0)))
        .await
        .expect("removal");

    assert_eq!(env.broadcaster.count_code(BroadcastCode::VolumeDiskRemoved), 1);
    assert_eq!(env.broadcaster.count_code(BroadcastCode::VolumeBadRemoval), 0);
    assert_eq!(manager.list()[0].state, VolumeState::NoMedia);
}
