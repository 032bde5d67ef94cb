//! Grace-period scenarios: countdown states driving `Timeout` back into the
//! machine through a late-bound dispatcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use warden_core::{AlarmState, Signal};
use warden_fsm::{CountdownTimer, Dispatcher, MemoryStateStore, StateDef, StateMachine};

const GRACE: Duration = Duration::from_secs(30);

struct Harness {
    machine: Arc<StateMachine>,
    store: MemoryStateStore,
    slot: Arc<Mutex<Option<CountdownTimer>>>,
    expiries: Arc<AtomicUsize>,
    alerts: Arc<AtomicUsize>,
}

fn countdown_state(
    dispatcher: &Dispatcher,
    slot: &Arc<Mutex<Option<CountdownTimer>>>,
    expiries: &Arc<AtomicUsize>,
) -> StateDef {
    let dispatcher = dispatcher.clone();
    let start_slot = Arc::clone(slot);
    let stop_slot = Arc::clone(slot);
    let expiries = Arc::clone(expiries);

    StateDef::new()
        .on_entry(move || {
            let dispatcher = dispatcher.clone();
            let expiries = Arc::clone(&expiries);
            let timer = CountdownTimer::start(GRACE, move || {
                expiries.fetch_add(1, Ordering::SeqCst);
                dispatcher.dispatch(Signal::Timeout);
            });
            *start_slot.lock().unwrap() = Some(timer);
            Ok(())
        })
        .on_exit(move || {
            if let Some(timer) = stop_slot.lock().unwrap().take() {
                timer.stop();
            }
            Ok(())
        })
}

fn harness(initial: AlarmState) -> Harness {
    let dispatcher = Dispatcher::new();
    let store = MemoryStateStore::new(initial);
    let slot = Arc::new(Mutex::new(None));
    let expiries = Arc::new(AtomicUsize::new(0));
    let alerts = Arc::new(AtomicUsize::new(0));
    let alert_count = Arc::clone(&alerts);

    let machine = StateMachine::builder()
        .with_store(store.clone())
        .with_dispatcher(dispatcher.clone())
        .state(
            AlarmState::DisarmedCountdown,
            countdown_state(&dispatcher, &slot, &expiries),
        )
        .state(
            AlarmState::ArmedCountdown,
            countdown_state(&dispatcher, &slot, &expiries),
        )
        .state(
            AlarmState::Triggered,
            StateDef::new().on_entry(move || {
                alert_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .build()
        .unwrap();

    Harness {
        machine,
        store,
        slot,
        expiries,
        alerts,
    }
}

#[tokio::test(start_paused = true)]
async fn test_disarm_within_grace_period_cancels_countdown() {
    let h = harness(AlarmState::Disarmed);

    assert!(h.machine.dispatch(Signal::Arm));
    assert_eq!(h.machine.current_state(), AlarmState::DisarmedCountdown);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.machine.dispatch(Signal::Disarm));
    assert!(h.slot.lock().unwrap().is_none());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.machine.current_state(), AlarmState::Disarmed);
    assert_eq!(h.expiries.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.store.saves(),
        vec![AlarmState::DisarmedCountdown, AlarmState::Disarmed]
    );
}

#[tokio::test(start_paused = true)]
async fn test_arming_countdown_expires_into_armed() {
    let h = harness(AlarmState::Disarmed);

    h.machine.dispatch(Signal::Arm);
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(h.machine.current_state(), AlarmState::Armed);
    assert_eq!(h.expiries.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_trigger_fires_intruder_alert_once() {
    let h = harness(AlarmState::Armed);

    assert!(h.machine.dispatch(Signal::Trigger));
    assert_eq!(h.machine.current_state(), AlarmState::ArmedCountdown);

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(h.machine.current_state(), AlarmState::ArmedCountdown);
    assert_eq!(h.alerts.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.machine.current_state(), AlarmState::Triggered);
    assert_eq!(h.alerts.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.alerts.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.current(), Some(AlarmState::Triggered));
}

#[tokio::test(start_paused = true)]
async fn test_rearm_during_alarm_countdown_returns_to_armed() {
    let h = harness(AlarmState::Armed);

    h.machine.dispatch(Signal::Trigger);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.machine.dispatch(Signal::Arm));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.machine.current_state(), AlarmState::Armed);
    assert_eq!(h.alerts.load(Ordering::SeqCst), 0);
}
