use bytes::Bytes;
use fuzzvm_common::{Address, H256, U256, types::Code};
use rustc_hash::FxHashMap;

use crate::account::Account;
use crate::db::{SnapshotId, StateDb};
use crate::errors::DatabaseError;

/// Undo record for one state mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum JournalEntry {
    AccountCreated {
        address: Address,
        previous: Option<Account>,
    },
    BalanceChanged {
        address: Address,
        previous: U256,
    },
    NonceChanged {
        address: Address,
        previous: u64,
    },
    CodeChanged {
        address: Address,
        previous: Code,
    },
    StorageChanged {
        address: Address,
        key: H256,
        previous: Option<H256>,
    },
}

/// Journaled account store.
///
/// A snapshot is the journal length at the time it was taken; reverting pops
/// entries past it and applies them in reverse order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateDb {
    accounts: FxHashMap<Address, Account>,
    journal: Vec<JournalEntry>,
}

impl InMemoryStateDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: impl IntoIterator<Item = (Address, Account)>) -> Self {
        Self {
            accounts: accounts.into_iter().collect(),
            journal: Vec::new(),
        }
    }

    /// Seed an account outside of the journal.
    pub fn insert_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn accounts(&self) -> &FxHashMap<Address, Account> {
        &self.accounts
    }

    /// Forget every undo record. Snapshots taken before are invalidated.
    pub fn commit(&mut self) {
        self.journal.clear();
    }

    /// Account at `address`, created and journaled on first touch.
    fn account_mut(&mut self, address: Address) -> &mut Account {
        if !self.accounts.contains_key(&address) {
            self.journal.push(JournalEntry::AccountCreated {
                address,
                previous: None,
            });
        }
        self.accounts.entry(address).or_default()
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::AccountCreated { address, previous } => match previous {
                Some(account) => {
                    self.accounts.insert(address, account);
                }
                None => {
                    self.accounts.remove(&address);
                }
            },
            JournalEntry::BalanceChanged { address, previous } => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    account.balance = previous;
                }
            }
            JournalEntry::NonceChanged { address, previous } => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    account.nonce = previous;
                }
            }
            JournalEntry::CodeChanged { address, previous } => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    account.code = previous;
                }
            }
            JournalEntry::StorageChanged {
                address,
                key,
                previous,
            } => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    match previous {
                        Some(value) => {
                            account.storage.insert(key, value);
                        }
                        None => {
                            account.storage.remove(&key);
                        }
                    }
                }
            }
        }
    }
}

impl StateDb for InMemoryStateDb {
    fn exist(&self, address: Address) -> Result<bool, DatabaseError> {
        Ok(self.accounts.contains_key(&address))
    }

    fn create_account(&mut self, address: Address) -> Result<(), DatabaseError> {
        let previous = self.accounts.get(&address).cloned();
        let balance = previous
            .as_ref()
            .map(|account| account.balance)
            .unwrap_or_default();
        self.journal
            .push(JournalEntry::AccountCreated { address, previous });
        self.accounts.insert(address, Account::with_balance(balance));
        Ok(())
    }

    fn get_balance(&self, address: Address) -> Result<U256, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .map(|account| account.balance)
            .unwrap_or_default())
    }

    fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), DatabaseError> {
        let previous = self.get_balance(address)?;
        let balance = previous.checked_add(amount).ok_or_else(|| {
            DatabaseError::Custom(format!("balance overflow for {address:#x}"))
        })?;
        self.account_mut(address).balance = balance;
        self.journal
            .push(JournalEntry::BalanceChanged { address, previous });
        Ok(())
    }

    fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), DatabaseError> {
        let previous = self.get_balance(address)?;
        let balance = previous.checked_sub(amount).ok_or_else(|| {
            DatabaseError::Custom(format!("balance underflow for {address:#x}"))
        })?;
        self.account_mut(address).balance = balance;
        self.journal
            .push(JournalEntry::BalanceChanged { address, previous });
        Ok(())
    }

    fn get_nonce(&self, address: Address) -> Result<u64, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .map(|account| account.nonce)
            .unwrap_or_default())
    }

    fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), DatabaseError> {
        let account = self.account_mut(address);
        let previous = account.nonce;
        account.nonce = nonce;
        self.journal
            .push(JournalEntry::NonceChanged { address, previous });
        Ok(())
    }

    fn get_code(&self, address: Address) -> Result<Code, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .map(|account| account.code.clone())
            .unwrap_or_default())
    }

    fn get_code_hash(&self, address: Address) -> Result<H256, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .map(|account| account.code.hash)
            .unwrap_or_default())
    }

    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), DatabaseError> {
        let account = self.account_mut(address);
        let previous = std::mem::replace(&mut account.code, Code::from_bytecode(code));
        self.journal
            .push(JournalEntry::CodeChanged { address, previous });
        Ok(())
    }

    fn get_state(&self, address: Address, key: H256) -> Result<H256, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .and_then(|account| account.storage.get(&key).copied())
            .unwrap_or_default())
    }

    fn set_state(
        &mut self,
        address: Address,
        key: H256,
        value: H256,
    ) -> Result<(), DatabaseError> {
        let account = self.account_mut(address);
        let previous = account.storage.insert(key, value);
        self.journal.push(JournalEntry::StorageChanged {
            address,
            key,
            previous,
        });
        Ok(())
    }

    fn snapshot(&mut self) -> SnapshotId {
        self.journal.len()
    }

    fn revert_to_snapshot(&mut self, snapshot: SnapshotId) -> Result<(), DatabaseError> {
        if snapshot > self.journal.len() {
            return Err(DatabaseError::InvalidSnapshot(snapshot));
        }
        while self.journal.len() > snapshot {
            if let Some(entry) = self.journal.pop() {
                self.undo(entry);
            }
        }
        Ok(())
    }
}
