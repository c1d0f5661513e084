use std::rc::Rc;
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use fuzzvm_common::{H256, U256, types::{ChainConfig, Receipt}};
use fuzzvm_watchdog::{WatchDog, WatchdogKind, Watcher};

use super::helpers::*;
use crate::{
    config::VmConfig,
    db::{InMemoryStateDb, StateDb},
    environment::Environment,
    errors::ExceptionalHalt,
    interpreter::Interpreter,
    vm::VM,
};

fn armed_watchdog(sink: Arc<RecordingSink>, db: &InMemoryStateDb) -> Arc<WatchDog> {
    let watchdog = Arc::new(WatchDog::new(WatchdogKind::General, sink));
    let interpreter = Rc::new(ScriptedInterpreter::new());
    let mut db = db.clone();
    let vm = make_vm(&mut db, &interpreter);
    assert!(
        watchdog
            .watch(&vm, &call_tx(contract(), U256::zero()))
            .expect("watch")
    );
    watchdog
}

#[test]
fn storage_writes_feed_the_diff() {
    let code = bytecode(1);
    let interpreter = Rc::new(ScriptedInterpreter::new().with_script(
        &code,
        vec![
            Step::Store(1, 7),
            Step::Store(1, 8),
            Step::Store(2, 5),
            Step::Store(2, 0),
        ],
    ));
    let mut db = make_test_db(&[(contract(), code)]);
    let watchdog = armed_watchdog(RecordingSink::new(), &db);

    let watchers: Vec<Arc<dyn Watcher>> = vec![watchdog.clone()];
    let mut vm = make_vm(&mut db, &interpreter).with_watchers(watchers);
    vm.call(sender(), contract(), Bytes::new(), TEST_GAS, U256::zero())
        .expect("call");

    let diff = watchdog.storage_diff().expect("armed");
    assert_eq!(diff.before().get(&slot(1)), Some(&H256::zero()));
    assert_eq!(diff.after().get(&slot(1)), Some(&slot(8)));
    // Slot 2 ended where it started.
    assert_eq!(diff.before().get(&slot(2)), Some(&H256::zero()));
    assert_eq!(diff.after().get(&slot(2)), None);
}

#[test]
fn rewriting_a_written_value_keeps_the_change() {
    let code = bytecode(1);
    let interpreter = Rc::new(ScriptedInterpreter::new().with_script(
        &code,
        vec![Step::Store(1, 1), Step::Store(1, 1)],
    ));
    let mut db = make_test_db(&[(contract(), code)]);
    let watchdog = armed_watchdog(RecordingSink::new(), &db);

    let watchers: Vec<Arc<dyn Watcher>> = vec![watchdog.clone()];
    let mut vm = make_vm(&mut db, &interpreter).with_watchers(watchers);
    vm.call(sender(), contract(), Bytes::new(), TEST_GAS, U256::zero())
        .expect("call");

    let diff = watchdog.storage_diff().expect("armed");
    assert_eq!(diff.before().get(&slot(1)), Some(&H256::zero()));
    assert_eq!(diff.after().get(&slot(1)), Some(&slot(1)));
}

#[test]
fn rewriting_an_unchanged_slot_reports_no_change() {
    let code = bytecode(1);
    let interpreter = Rc::new(
        ScriptedInterpreter::new().with_script(&code, vec![Step::Store(1, 1)]),
    );
    let mut db = make_test_db(&[(contract(), code)]);
    db.set_state(contract(), slot(1), slot(1)).expect("seed slot");
    db.commit();
    let watchdog = armed_watchdog(RecordingSink::new(), &db);

    let watchers: Vec<Arc<dyn Watcher>> = vec![watchdog.clone()];
    let mut vm = make_vm(&mut db, &interpreter).with_watchers(watchers);
    vm.call(sender(), contract(), Bytes::new(), TEST_GAS, U256::zero())
        .expect("call");

    let diff = watchdog.storage_diff().expect("armed");
    assert_eq!(diff.before().get(&slot(1)), Some(&slot(1)));
    assert!(diff.after().is_empty());
}

#[test]
fn failing_nested_frame_sets_the_throw_flag() {
    let outer = bytecode(1);
    let inner = bytecode(2);
    let interpreter = Rc::new(
        ScriptedInterpreter::new()
            .with_script(
                &outer,
                vec![
                    Step::Trace("outer"),
                    Step::Call {
                        to: other(),
                        gas: 1000,
                        value: U256::zero(),
                    },
                ],
            )
            .with_script(&inner, vec![Step::Fail(ExceptionalHalt::StackUnderflow.into())]),
    );
    let mut db = make_test_db(&[(contract(), outer), (other(), inner)]);
    let sink = RecordingSink::new();
    let watchdog = armed_watchdog(sink.clone(), &db);

    let watchers: Vec<Arc<dyn Watcher>> = vec![watchdog.clone()];
    let mut vm = make_vm(&mut db, &interpreter).with_watchers(watchers);
    let outcome = vm
        .call(sender(), contract(), Bytes::new(), TEST_GAS, U256::zero())
        .expect("call");
    assert!(outcome.is_success());

    let receipt = Receipt::new(tx_hash(), true, 1000, 1000);
    let report = watchdog.end(&vm, &receipt).expect("end").expect("report");
    assert!(report.has_throw);
    assert_eq!(report.trace, vec!["outer".to_string()]);
    assert_eq!(sink.reports().len(), 1);
}

#[test]
fn concurrent_vms_only_touch_their_own_transaction() {
    let code = bytecode(1);
    let db = make_test_db(&[(contract(), code.clone())]);
    let watchdog = armed_watchdog(RecordingSink::new(), &db);

    // Thread 0 runs the armed transaction, the others run foreign ones.
    let handles: Vec<_> = (0..4u64)
        .map(|n| {
            let watchdog = watchdog.clone();
            let code = code.clone();
            let mut db = db.clone();
            thread::spawn(move || {
                let interpreter: Rc<dyn Interpreter> = Rc::new(
                    ScriptedInterpreter::new().with_script(
                        &code,
                        vec![Step::Trace("write"), Step::Store(10 + n, n + 1)],
                    ),
                );
                let tx_hash = if n == 0 {
                    tx_hash()
                } else {
                    H256::from_low_u64_be(0x1000 + n)
                };
                let env = Environment {
                    tx_hash: Some(tx_hash),
                    ..make_test_env()
                };
                let watchers: Vec<Arc<dyn Watcher>> = vec![watchdog];
                let mut vm = VM::new(
                    env,
                    &mut db,
                    ChainConfig::all_forks_active(1),
                    VmConfig::default(),
                    interpreter,
                )
                .with_watchers(watchers);
                vm.call(sender(), contract(), Bytes::new(), TEST_GAS, U256::zero())
                    .expect("call");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }

    let diff = watchdog.storage_diff().expect("still armed");
    assert_eq!(diff.before().len(), 1);
    assert_eq!(diff.after().get(&slot(10)), Some(&slot(1)));
    assert!(watchdog.is_watching(tx_hash()));
}
