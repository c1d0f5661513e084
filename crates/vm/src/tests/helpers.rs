//! Shared fixtures for dispatcher tests.
//!
//! Contracts are driven by [`ScriptedInterpreter`]: each bytecode maps to a
//! list of [`Step`]s instead of real opcodes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use fuzzvm_common::{
    Address, H256, U256,
    types::{ChainConfig, Code, Transaction, TxKind},
    utils::keccak,
};
use fuzzvm_watchdog::{DeliveryError, ReportSink, TraceReport};
use rustc_hash::FxHashMap;

use crate::{
    account::Account,
    call_frame::CallFrame,
    call_tracer::CallTracer,
    config::VmConfig,
    db::{InMemoryStateDb, SnapshotId, StateDb},
    environment::Environment,
    errors::{DatabaseError, ExceptionalHalt, TxResult, VMError},
    interpreter::Interpreter,
    vm::VM,
};

/// Standard gas budget for root calls.
pub const TEST_GAS: u64 = 1_000_000;

/// Standard contract address.
pub const CONTRACT_ADDR: u64 = 0x42;

/// Second contract, for nested calls.
pub const OTHER_ADDR: u64 = 0x43;

/// Standard sender address.
pub const SENDER_ADDR: u64 = 0x100;

pub const SENDER_BALANCE: u64 = 1_000_000;

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn sender() -> Address {
    addr(SENDER_ADDR)
}

pub fn contract() -> Address {
    addr(CONTRACT_ADDR)
}

pub fn other() -> Address {
    addr(OTHER_ADDR)
}

pub fn slot(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

pub fn tx_hash() -> H256 {
    H256::from_low_u64_be(0xabc)
}

/// Distinct non-empty bytecode per tag; only its hash matters.
pub fn bytecode(tag: u8) -> Bytes {
    Bytes::from(vec![0x60, tag, 0x00])
}

/// One scripted action of a contract.
#[derive(Debug, Clone)]
pub enum Step {
    /// `SSTORE slot(key) = slot(value)` in the frame's storage.
    Store(u64, u64),
    UseGas(u64),
    Trace(&'static str),
    Call { to: Address, gas: u64, value: U256 },
    CallCode { to: Address, gas: u64, value: U256 },
    DelegateCall { to: Address, gas: u64 },
    Create { code: Bytes, gas: u64, value: U256 },
    /// Trip the VM's own cancellation flag.
    Cancel,
    Return(Bytes),
    Fail(VMError),
    Panic(&'static str),
}

/// Interpreter that replays [`Step`]s keyed by code hash.
///
/// Every frame it enters and the result of every nested primitive are
/// recorded for inspection. Bytecode without a script runs as a no-op.
#[derive(Default)]
pub struct ScriptedInterpreter {
    scripts: FxHashMap<H256, Vec<Step>>,
    frames: RefCell<Vec<CallFrame>>,
    nested_results: RefCell<Vec<TxResult>>,
    created: RefCell<Vec<Address>>,
}

impl ScriptedInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, code: &Bytes, steps: Vec<Step>) -> Self {
        self.scripts.insert(keccak(code), steps);
        self
    }

    pub fn frames(&self) -> Vec<CallFrame> {
        self.frames.borrow().clone()
    }

    pub fn nested_results(&self) -> Vec<TxResult> {
        self.nested_results.borrow().clone()
    }

    pub fn created(&self) -> Vec<Address> {
        self.created.borrow().clone()
    }

    /// Move up to `gas` from the frame into a subcall budget.
    fn reserve(frame: &mut CallFrame, gas: u64) -> u64 {
        let gas = gas.min(frame.gas_remaining);
        frame.gas_remaining -= gas;
        gas
    }
}

impl Interpreter for ScriptedInterpreter {
    fn run(
        &self,
        vm: &mut VM<'_>,
        frame: &mut CallFrame,
        _input: &Bytes,
    ) -> Result<Bytes, VMError> {
        self.frames.borrow_mut().push(frame.clone());
        let Some(steps) = self.scripts.get(&frame.bytecode.hash) else {
            return Ok(Bytes::new());
        };

        for step in steps {
            match step {
                Step::Store(key, value) => vm.sstore(frame, slot(*key), slot(*value))?,
                Step::UseGas(gas) => {
                    if !frame.use_gas(*gas) {
                        return Err(ExceptionalHalt::OutOfGas.into());
                    }
                }
                Step::Trace(note) => vm.write_trace(note),
                Step::Call { to, gas, value } => {
                    let gas = Self::reserve(frame, *gas);
                    let outcome = vm.call(frame.to, *to, Bytes::new(), gas, *value)?;
                    frame.gas_remaining += outcome.gas_left;
                    self.nested_results.borrow_mut().push(outcome.result);
                }
                Step::CallCode { to, gas, value } => {
                    let gas = Self::reserve(frame, *gas);
                    let outcome = vm.call_code(frame.to, *to, Bytes::new(), gas, *value)?;
                    frame.gas_remaining += outcome.gas_left;
                    self.nested_results.borrow_mut().push(outcome.result);
                }
                Step::DelegateCall { to, gas } => {
                    let gas = Self::reserve(frame, *gas);
                    let outcome = vm.delegate_call(frame, *to, Bytes::new(), gas)?;
                    frame.gas_remaining += outcome.gas_left;
                    self.nested_results.borrow_mut().push(outcome.result);
                }
                Step::Create { code, gas, value } => {
                    let gas = Self::reserve(frame, *gas);
                    let outcome = vm.create(frame.to, code.clone(), gas, *value)?;
                    frame.gas_remaining += outcome.gas_left;
                    self.created.borrow_mut().push(outcome.address);
                    self.nested_results.borrow_mut().push(outcome.result);
                }
                Step::Cancel => vm.cancel(),
                Step::Return(output) => return Ok(output.clone()),
                Step::Fail(err) => return Err(err.clone()),
                Step::Panic(message) => panic!("{message}"),
            }
        }
        Ok(Bytes::new())
    }
}

/// Database with a funded sender and the given contracts, each with zero
/// balance.
pub fn make_test_db(contracts: &[(Address, Bytes)]) -> InMemoryStateDb {
    let mut db = InMemoryStateDb::new();
    db.insert_account(sender(), Account::with_balance(U256::from(SENDER_BALANCE)));
    for (address, code) in contracts {
        db.insert_account(
            *address,
            Account::new(
                U256::zero(),
                Code::from_bytecode(code.clone()),
                1,
                FxHashMap::default(),
            ),
        );
    }
    db
}

/// [`InMemoryStateDb`] whose balance reads start failing after a budget.
pub struct FlakyBalanceDb {
    pub inner: InMemoryStateDb,
    balance_reads_left: Cell<usize>,
}

impl FlakyBalanceDb {
    pub fn new(inner: InMemoryStateDb, balance_reads: usize) -> Self {
        Self {
            inner,
            balance_reads_left: Cell::new(balance_reads),
        }
    }
}

impl StateDb for FlakyBalanceDb {
    fn exist(&self, address: Address) -> Result<bool, DatabaseError> {
        self.inner.exist(address)
    }

    fn create_account(&mut self, address: Address) -> Result<(), DatabaseError> {
        self.inner.create_account(address)
    }

    fn get_balance(&self, address: Address) -> Result<U256, DatabaseError> {
        let left = self.balance_reads_left.get();
        if left == 0 {
            return Err(DatabaseError::Custom("balance backend down".to_string()));
        }
        self.balance_reads_left.set(left - 1);
        self.inner.get_balance(address)
    }

    fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), DatabaseError> {
        self.inner.add_balance(address, amount)
    }

    fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), DatabaseError> {
        self.inner.sub_balance(address, amount)
    }

    fn get_nonce(&self, address: Address) -> Result<u64, DatabaseError> {
        self.inner.get_nonce(address)
    }

    fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), DatabaseError> {
        self.inner.set_nonce(address, nonce)
    }

    fn get_code(&self, address: Address) -> Result<Code, DatabaseError> {
        self.inner.get_code(address)
    }

    fn get_code_hash(&self, address: Address) -> Result<H256, DatabaseError> {
        self.inner.get_code_hash(address)
    }

    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), DatabaseError> {
        self.inner.set_code(address, code)
    }

    fn get_state(&self, address: Address, key: H256) -> Result<H256, DatabaseError> {
        self.inner.get_state(address, key)
    }

    fn set_state(
        &mut self,
        address: Address,
        key: H256,
        value: H256,
    ) -> Result<(), DatabaseError> {
        self.inner.set_state(address, key, value)
    }

    fn snapshot(&mut self) -> SnapshotId {
        self.inner.snapshot()
    }

    fn revert_to_snapshot(&mut self, snapshot: SnapshotId) -> Result<(), DatabaseError> {
        self.inner.revert_to_snapshot(snapshot)
    }
}

/// Environment bound to [`tx_hash`].
pub fn make_test_env() -> Environment {
    Environment {
        origin: sender(),
        tx_hash: Some(tx_hash()),
        block_number: 100,
        block_gas_limit: TEST_GAS,
        ..Default::default()
    }
}

pub fn make_vm<'a>(
    db: &'a mut InMemoryStateDb,
    interpreter: &Rc<ScriptedInterpreter>,
) -> VM<'a> {
    make_vm_with(
        db,
        interpreter,
        ChainConfig::all_forks_active(1),
        VmConfig::default(),
    )
}

pub fn make_vm_with<'a>(
    db: &'a mut InMemoryStateDb,
    interpreter: &Rc<ScriptedInterpreter>,
    chain_config: ChainConfig,
    config: VmConfig,
) -> VM<'a> {
    let interpreter: Rc<dyn Interpreter> = interpreter.clone();
    VM::new(make_test_env(), db, chain_config, config, interpreter)
        .with_tracer(CallTracer::new())
}

/// Every fork active except Homestead and EIP-158.
pub fn frontier() -> ChainConfig {
    ChainConfig {
        chain_id: 1,
        homestead_block: None,
        eip158_block: None,
    }
}

/// Call transaction bound to [`tx_hash`].
pub fn call_tx(to: Address, value: U256) -> Transaction {
    Transaction {
        hash: tx_hash(),
        from: sender(),
        to: TxKind::Call(to),
        value,
        gas_limit: TEST_GAS,
        ..Default::default()
    }
}

/// Creation transaction bound to [`tx_hash`].
pub fn create_tx(init_code: Bytes) -> Transaction {
    Transaction {
        hash: tx_hash(),
        from: sender(),
        to: TxKind::Create,
        gas_limit: TEST_GAS,
        data: init_code,
        ..Default::default()
    }
}

/// Keeps every delivered report in memory.
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<TraceReport>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reports(&self) -> Vec<TraceReport> {
        self.reports.lock().expect("sink lock").clone()
    }
}

impl ReportSink for RecordingSink {
    fn deliver(&self, report: &TraceReport) -> Result<(), DeliveryError> {
        self.reports.lock().expect("sink lock").push(report.clone());
        Ok(())
    }
}
