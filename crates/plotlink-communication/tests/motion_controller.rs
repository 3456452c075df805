mod common;

use common::{eventually, next_event, MockOpener};
use plotlink_communication::{ConnectionManager, FixedPort, MotionController, SharedSelection};
use plotlink_core::{CommandError, Error, LinkEvent, PortId};
use plotlink_settings::{BoundsPolicy, Config, MachineSettings};
use std::sync::Arc;

fn controller(opener: &MockOpener, machine: MachineSettings) -> MotionController {
    let manager = Arc::new(ConnectionManager::with_opener(
        &Config::default(),
        Arc::new(opener.clone()),
    ));
    MotionController::new(manager, Arc::new(FixedPort(PortId::from("COM3"))), machine).unwrap()
}

#[tokio::test]
async fn test_commands_open_lazily_and_reuse() {
    let opener = MockOpener::default();
    let controller = controller(&opener, MachineSettings::default());
    let mut rx = controller.manager().subscribe();

    controller.move_to(100, 200).unwrap();
    controller.stop().unwrap();
    controller.set_power(Some(3)).unwrap();
    controller.set_speed(None).unwrap();
    controller.set_zero(0, 0).unwrap();

    for _ in 0..5 {
        next_event(&mut rx, |e| matches!(e, LinkEvent::CommandSent { .. })).await;
    }

    assert_eq!(opener.opens(), 1);
    assert_eq!(
        opener.link.written(),
        vec![
            "G0 X100 Y200\n",
            "M0\n",
            "M98 R3\n",
            "M99 R600\n",
            "G92 X0 Y0\n"
        ]
    );
}

#[tokio::test]
async fn test_no_port_selected() {
    let opener = MockOpener::default();
    let manager = Arc::new(ConnectionManager::with_opener(
        &Config::default(),
        Arc::new(opener.clone()),
    ));
    let selection = Arc::new(SharedSelection::new());
    let controller =
        MotionController::new(manager, selection.clone(), MachineSettings::default()).unwrap();

    let err = controller.stop().unwrap_err();
    assert!(matches!(err, Error::Command(CommandError::NoPortSelected)));
    assert_eq!(opener.opens(), 0);

    selection.select("COM5");
    controller.stop().unwrap();
    assert!(controller.manager().is_open(&PortId::from("COM5")));
}

#[tokio::test]
async fn test_out_of_range_is_rejected_before_open() {
    let opener = MockOpener::default();
    let controller = controller(&opener, MachineSettings::default());

    let err = controller.move_to(60_000, 10).unwrap_err();
    assert!(matches!(
        err,
        Error::Command(CommandError::OutOfRange { axis: 'X', .. })
    ));
    assert!(controller.set_power(Some(7)).is_err());
    assert!(controller.set_speed(Some(0)).is_err());
    assert_eq!(opener.opens(), 0);
}

#[tokio::test]
async fn test_clamp_policy() {
    let opener = MockOpener::default();
    let machine = MachineSettings {
        bounds_policy: BoundsPolicy::Clamp,
        ..MachineSettings::default()
    };
    let controller = controller(&opener, machine);
    let mut rx = controller.manager().subscribe();

    controller.move_to(60_000, -4).unwrap();
    next_event(&mut rx, |e| matches!(e, LinkEvent::CommandSent { .. })).await;

    assert_eq!(opener.link.written(), vec!["G0 X55000 Y0\n"]);
}

#[tokio::test]
async fn test_zero_on_open_runs_first() {
    let opener = MockOpener::default();
    let machine = MachineSettings {
        zero_on_open: Some((0, 0)),
        ..MachineSettings::default()
    };
    let controller = controller(&opener, machine);

    controller.move_to(10, 10).unwrap();
    controller.move_to(20, 20).unwrap();
    eventually(|| opener.link.written().len() == 3).await;

    assert_eq!(
        opener.link.written(),
        vec!["G92 X0 Y0\n", "G0 X10 Y10\n", "G0 X20 Y20\n"]
    );
}

#[tokio::test]
async fn test_close_selected_port() {
    let opener = MockOpener::default();
    let controller = controller(&opener, MachineSettings::default());
    let port = PortId::from("COM3");

    controller.stop().unwrap();
    assert!(controller.manager().is_open(&port));

    controller.close().unwrap();
    assert!(!controller.manager().is_open(&port));

    controller.stop().unwrap();
    assert_eq!(opener.opens(), 2);
}

#[tokio::test]
async fn test_zero_on_open_is_range_checked() {
    let opener = MockOpener::default();
    let manager = Arc::new(ConnectionManager::with_opener(
        &Config::default(),
        Arc::new(opener.clone()),
    ));
    let machine = MachineSettings {
        zero_on_open: Some((99_999, 0)),
        ..MachineSettings::default()
    };

    let result = MotionController::new(
        manager.clone(),
        Arc::new(FixedPort(PortId::from("COM3"))),
        machine,
    );
    assert!(matches!(
        result,
        Err(Error::Command(CommandError::OutOfRange { axis: 'X', .. }))
    ));
    assert!(manager.clear_on_open().is_none());
}

#[tokio::test]
async fn test_zero_on_open_is_clamped() {
    let opener = MockOpener::default();
    let machine = MachineSettings {
        bounds_policy: BoundsPolicy::Clamp,
        zero_on_open: Some((99_999, 0)),
        ..MachineSettings::default()
    };
    let controller = controller(&opener, machine);

    controller.stop().unwrap();
    controller.close().unwrap();

    assert_eq!(opener.link.written(), vec!["G92 X55000 Y0\n", "M0\n"]);
}
