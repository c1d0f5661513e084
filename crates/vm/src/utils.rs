use fuzzvm_common::{Address, U256};

use crate::db::StateDb;
use crate::errors::DatabaseError;

/// Default transfer predicate: the sender's balance covers `value`.
pub fn can_transfer(db: &dyn StateDb, from: Address, value: U256) -> Result<bool, DatabaseError> {
    Ok(db.get_balance(from)? >= value)
}

/// Default transfer action.
pub fn transfer(
    db: &mut dyn StateDb,
    from: Address,
    to: Address,
    value: U256,
) -> Result<(), DatabaseError> {
    db.sub_balance(from, value)?;
    db.add_balance(to, value)
}
