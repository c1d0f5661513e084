use std::rc::Rc;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bytes::Bytes;
use fuzzvm_common::{
    Address, H256, U256,
    evm::calculate_create_address,
    types::{ChainConfig, Code, Rules},
};
use fuzzvm_watchdog::{BalanceSource, WatchdogError, Watcher};
use tracing::debug;

use crate::{
    call_frame::CallFrame,
    call_tracer::CallTracer,
    config::VmConfig,
    constants::{CREATE_DATA_GAS, MAX_CODE_SIZE},
    db::{SnapshotId, StateDb},
    environment::Environment,
    errors::{CallOutcome, CreateOutcome, ExceptionalHalt, InternalError, TxResult, VMError},
    interpreter::Interpreter,
    precompiles::{PrecompileSet, run_precompile},
};

/// Thread-safe trigger for a VM's cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Message-call dispatcher.
///
/// One instance executes one root call tree, single-threaded. Nested calls
/// re-enter the VM through the [`Interpreter`], which receives `&mut VM`.
pub struct VM<'a> {
    env: Environment,
    pub db: &'a mut dyn StateDb,
    /// Fork rules for `env.block_number`, resolved once.
    rules: Rules,
    config: VmConfig,
    interpreter: Rc<dyn Interpreter>,
    precompiles: PrecompileSet,
    /// Number of interpreter frames currently running.
    pub depth: usize,
    abort: Arc<AtomicBool>,
    watchers: Vec<Arc<dyn Watcher>>,
    pub tracer: CallTracer,
}

impl<'a> VM<'a> {
    pub fn new(
        env: Environment,
        db: &'a mut dyn StateDb,
        chain_config: ChainConfig,
        config: VmConfig,
        interpreter: Rc<dyn Interpreter>,
    ) -> Self {
        let rules = chain_config.rules(env.block_number);
        Self {
            env,
            db,
            rules,
            config,
            interpreter,
            precompiles: PrecompileSet::standard(),
            depth: 0,
            abort: Arc::new(AtomicBool::new(false)),
            watchers: Vec::new(),
            tracer: CallTracer::disabled(),
        }
    }

    pub fn with_precompiles(mut self, precompiles: PrecompileSet) -> Self {
        self.precompiles = precompiles;
        self
    }

    /// Watchers fed by storage writes, trace lines and failing frames.
    pub fn with_watchers(mut self, watchers: Vec<Arc<dyn Watcher>>) -> Self {
        self.watchers = watchers;
        self
    }

    pub fn with_tracer(mut self, tracer: CallTracer) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn precompiles(&self) -> &PrecompileSet {
        &self.precompiles
    }

    /// Execute the code at `to` with `input`, transferring `value` from
    /// `caller`.
    pub fn call(
        &mut self,
        caller: Address,
        to: Address,
        input: Bytes,
        gas: u64,
        value: U256,
    ) -> Result<CallOutcome, VMError> {
        if let Some(outcome) = self.check_preconditions(caller, gas, Some(value))? {
            return Ok(outcome);
        }

        let snapshot = self.db.snapshot();
        let setup = self.enter_call(caller, to, input.clone(), gas, value);
        let Some(frame) = self.rollback_on_error(snapshot, setup)? else {
            // Nothing was touched, the snapshot is simply dropped.
            return Ok(CallOutcome::success(gas, Bytes::new()));
        };

        debug!("Call to Contract/Account@{to:#x}");
        self.tracer
            .on_call(caller, to, value, gas, &input, self.depth);
        self.execute_frame(snapshot, frame, &input)
    }

    /// Execute the code at `code_address` on `caller`'s own account.
    ///
    /// No account is created and no value moves, but `caller` must still be
    /// able to afford `value`.
    pub fn call_code(
        &mut self,
        caller: Address,
        code_address: Address,
        input: Bytes,
        gas: u64,
        value: U256,
    ) -> Result<CallOutcome, VMError> {
        if let Some(outcome) = self.check_preconditions(caller, gas, Some(value))? {
            return Ok(outcome);
        }

        let snapshot = self.db.snapshot();
        let code = self.db.get_code(code_address).map_err(VMError::from);
        let bytecode = self.rollback_on_error(snapshot, code)?;
        let frame = CallFrame::new(
            caller,
            caller,
            code_address,
            bytecode,
            value,
            input.clone(),
            gas,
            self.depth,
        );

        debug!("CallCode to Contract/Account@{code_address:#x}");
        self.tracer
            .on_call_code(caller, code_address, value, gas, &input, self.depth);
        self.execute_frame(snapshot, frame, &input)
    }

    /// Execute the code at `code_address` in `parent`'s context: its storage,
    /// its sender and its value. Balances are never checked nor moved.
    pub fn delegate_call(
        &mut self,
        parent: &CallFrame,
        code_address: Address,
        input: Bytes,
        gas: u64,
    ) -> Result<CallOutcome, VMError> {
        if let Some(outcome) = self.check_preconditions(parent.to, gas, None)? {
            return Ok(outcome);
        }

        let snapshot = self.db.snapshot();
        let code = self.db.get_code(code_address).map_err(VMError::from);
        let bytecode = self.rollback_on_error(snapshot, code)?;
        let frame = CallFrame::new(
            parent.to,
            parent.to,
            code_address,
            bytecode,
            U256::zero(),
            input.clone(),
            gas,
            self.depth,
        )
        .as_delegate(parent);

        debug!("DelegateCall to Contract/Account@{code_address:#x}");
        self.tracer
            .on_delegate_call(parent.to, code_address, gas, &input, self.depth);
        self.execute_frame(snapshot, frame, &input)
    }

    /// Deploy a contract whose runtime code is whatever `code` returns.
    ///
    /// The caller's nonce is bumped before the snapshot, so it stays bumped
    /// even when the creation reverts.
    pub fn create(
        &mut self,
        caller: Address,
        code: Bytes,
        gas: u64,
        value: U256,
    ) -> Result<CreateOutcome, VMError> {
        if let Some(outcome) = self.check_preconditions(caller, gas, Some(value))? {
            return Ok(CreateOutcome {
                result: outcome.result,
                gas_left: outcome.gas_left,
                output: Bytes::new(),
                address: Address::zero(),
            });
        }

        let nonce = self.db.get_nonce(caller)?;
        let next_nonce = nonce.checked_add(1).ok_or(InternalError::Overflow)?;
        self.db.set_nonce(caller, next_nonce)?;

        let snapshot = self.db.snapshot();
        let address = calculate_create_address(caller, nonce);
        let setup = self.enter_create(caller, address, code, gas, value);
        let mut frame = self.rollback_on_error(snapshot, setup)?;

        debug!("Create Contract@{address:#x}");
        self.tracer
            .on_create(caller, address, value, gas, self.depth);

        let (output, mut error) = match self.run_frame(&mut frame, &Bytes::new()) {
            Ok(output) => (output, None),
            Err(err) if err.should_propagate() => {
                self.db.revert_to_snapshot(snapshot)?;
                self.tracer.on_close(0, frame.depth, Some(&err));
                return Err(err);
            }
            Err(err) => (Bytes::new(), Some(err)),
        };

        let max_code_size_exceeded = output.len() > MAX_CODE_SIZE;
        if error.is_none() && !max_code_size_exceeded {
            let deposit_gas = u64::try_from(output.len())
                .unwrap_or(u64::MAX)
                .saturating_mul(CREATE_DATA_GAS);
            if frame.use_gas(deposit_gas) {
                let stored = self.db.set_code(address, output.clone()).map_err(VMError::from);
                self.rollback_on_error(snapshot, stored)?;
            } else {
                error = Some(VMError::CodeStoreOutOfGas);
            }
        }

        // Before Homestead a creation that cannot pay for its code keeps its
        // state changes and its gas, only the code is not stored.
        let should_revert = max_code_size_exceeded
            || error
                .as_ref()
                .is_some_and(|err| self.rules.is_homestead || *err != VMError::CodeStoreOutOfGas);
        if should_revert {
            frame.consume_all_gas();
            self.db.revert_to_snapshot(snapshot)?;
        }

        self.tracer
            .on_close(frame.gas_remaining, frame.depth, error.as_ref());

        let output = if error.is_some() || max_code_size_exceeded {
            Bytes::new()
        } else {
            output
        };
        let result = match error {
            Some(err) => {
                debug!("Create Contract@{address:#x} failed: {err}");
                self.flag_throw();
                TxResult::Revert(err)
            }
            None => TxResult::Success,
        };

        Ok(CreateOutcome {
            result,
            gas_left: frame.gas_remaining,
            output,
            address,
        })
    }

    /// Write `value` to `key` in the frame's storage, reporting the slot's
    /// previous and new value to every watcher.
    pub fn sstore(&mut self, frame: &CallFrame, key: H256, value: H256) -> Result<(), VMError> {
        let current = self.db.get_state(frame.to, key)?;
        if let Some(tx_hash) = self.env.tx_hash {
            for watcher in &self.watchers {
                watcher.record_storage(tx_hash, key, current);
                watcher.record_storage(tx_hash, key, value);
            }
        }
        self.db.set_state(frame.to, key, value)?;
        Ok(())
    }

    pub fn sload(&self, frame: &CallFrame, key: H256) -> Result<H256, VMError> {
        Ok(self.db.get_state(frame.to, key)?)
    }

    /// Append a line to the trace of every watcher armed for this transaction.
    pub fn write_trace(&self, note: &str) {
        if let Some(tx_hash) = self.env.tx_hash {
            for watcher in &self.watchers {
                watcher.write_trace(tx_hash, note);
            }
        }
    }

    pub fn block_hash(&self, block_number: u64) -> H256 {
        (self.env.get_hash)(block_number)
    }

    /// Ask the running interpreter to stop. Safe to call from any thread
    /// through [`VM::cancel_handle`].
    pub fn cancel(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.abort.clone())
    }

    pub fn is_cancelled(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Early exits shared by every primitive. They hand the gas back untouched
    /// and never take a snapshot. `value` is `None` for delegate calls, which
    /// skip the balance check.
    fn check_preconditions(
        &self,
        caller: Address,
        gas: u64,
        value: Option<U256>,
    ) -> Result<Option<CallOutcome>, VMError> {
        if self.config.no_recursion && self.depth > 0 {
            return Ok(Some(CallOutcome::success(gas, Bytes::new())));
        }
        if self.depth > self.config.max_call_depth {
            return Ok(Some(CallOutcome::revert(VMError::DepthExceeded, gas)));
        }
        if let Some(value) = value {
            if !(self.env.can_transfer)(&*self.db, caller, value)? {
                return Ok(Some(CallOutcome::revert(VMError::InsufficientBalance, gas)));
            }
        }
        Ok(None)
    }

    /// Account creation and value transfer for `call`. `None` means the call
    /// would only create an empty account, which EIP-158 prunes anyway.
    fn enter_call(
        &mut self,
        caller: Address,
        to: Address,
        input: Bytes,
        gas: u64,
        value: U256,
    ) -> Result<Option<CallFrame>, VMError> {
        if !self.db.exist(to)? {
            if !self.precompiles.contains(&to) && self.rules.is_eip158 && value.is_zero() {
                return Ok(None);
            }
            self.db.create_account(to)?;
        }
        (self.env.transfer)(&mut *self.db, caller, to, value)?;

        let bytecode = self.db.get_code(to)?;
        Ok(Some(CallFrame::new(
            caller, to, to, bytecode, value, input, gas, self.depth,
        )))
    }

    fn enter_create(
        &mut self,
        caller: Address,
        address: Address,
        code: Bytes,
        gas: u64,
        value: U256,
    ) -> Result<CallFrame, VMError> {
        self.db.create_account(address)?;
        if self.rules.is_eip158 {
            self.db.set_nonce(address, 1)?;
        }
        (self.env.transfer)(&mut *self.db, caller, address, value)?;

        Ok(CallFrame::new(
            caller,
            address,
            address,
            Code::from_bytecode(code),
            value,
            Bytes::new(),
            gas,
            self.depth,
        ))
    }

    /// Run a call frame and resolve its snapshot.
    fn execute_frame(
        &mut self,
        snapshot: SnapshotId,
        mut frame: CallFrame,
        input: &Bytes,
    ) -> Result<CallOutcome, VMError> {
        match self.run_frame(&mut frame, input) {
            Ok(output) => {
                self.tracer
                    .on_close(frame.gas_remaining, frame.depth, None);
                Ok(CallOutcome::success(frame.gas_remaining, output))
            }
            Err(err) => {
                frame.consume_all_gas();
                self.db.revert_to_snapshot(snapshot)?;
                self.tracer.on_close(0, frame.depth, Some(&err));
                if err.should_propagate() {
                    return Err(err);
                }
                debug!("Frame for {:#x} failed: {err}", frame.code_address);
                self.flag_throw();
                Ok(CallOutcome::revert(err, 0))
            }
        }
    }

    /// Precompile fast path first, interpreter otherwise.
    fn run_frame(&mut self, frame: &mut CallFrame, input: &Bytes) -> Result<Bytes, VMError> {
        if let Some(precompile) = self.precompiles.get(&frame.code_address) {
            return run_precompile(precompile, frame, input);
        }
        if frame.bytecode.is_empty() {
            return Ok(Bytes::new());
        }
        if self.is_cancelled() {
            return Err(ExceptionalHalt::Cancelled.into());
        }

        let interpreter = Rc::clone(&self.interpreter);
        self.depth = self.depth.checked_add(1).ok_or(InternalError::Overflow)?;
        let result = interpreter.run(self, frame, input);
        self.depth = self.depth.checked_sub(1).ok_or(InternalError::Underflow)?;
        result
    }

    /// Roll back to `snapshot` if `result` is an error, then pass it on.
    fn rollback_on_error<T>(
        &mut self,
        snapshot: SnapshotId,
        result: Result<T, VMError>,
    ) -> Result<T, VMError> {
        if result.is_err() {
            self.db.revert_to_snapshot(snapshot)?;
        }
        result
    }

    fn flag_throw(&self) {
        if let Some(tx_hash) = self.env.tx_hash {
            for watcher in &self.watchers {
                watcher.throw_error(tx_hash);
            }
        }
    }
}

impl BalanceSource for VM<'_> {
    fn balance_of(&self, address: Address) -> Result<U256, WatchdogError> {
        self.db
            .get_balance(address)
            .map_err(|e| WatchdogError::State(e.to_string()))
    }
}
