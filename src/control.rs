// Control plane: pause switch and privileged operators
//
// The owner grants or revokes privileged operators. The owner and any
// privileged operator can pause and resume routing; a paused router rejects
// every routing call before touching state.
//
// Numan Thabit 2025 Nov

use alloy_primitives::Address;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::errors::RouteError;

#[derive(Debug, Clone)]
pub struct RouteGate {
    owner: Address,
    privileged: HashSet<Address>,
    paused: bool,
}

impl RouteGate {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            privileged: HashSet::new(),
            paused: false,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_privileged(&self, who: Address) -> bool {
        who == self.owner || self.privileged.contains(&who)
    }

    pub fn ensure_open(&self) -> Result<(), RouteError> {
        if self.paused {
            return Err(RouteError::Paused);
        }
        Ok(())
    }

    pub fn ensure_owner(&self, caller: Address) -> Result<(), RouteError> {
        if caller != self.owner {
            return Err(RouteError::NotPrivileged(caller));
        }
        Ok(())
    }

    pub fn set_privilege(&mut self, caller: Address, user: Address, privileged: bool) -> Result<(), RouteError> {
        self.ensure_owner(caller)?;
        if privileged {
            self.privileged.insert(user);
        } else {
            self.privileged.remove(&user);
        }
        debug!(user = %user, privileged, "privilege updated");
        Ok(())
    }

    pub fn pause(&mut self, caller: Address) -> Result<(), RouteError> {
        self.set_paused(caller, true)
    }

    pub fn resume(&mut self, caller: Address) -> Result<(), RouteError> {
        self.set_paused(caller, false)
    }

    fn set_paused(&mut self, caller: Address, paused: bool) -> Result<(), RouteError> {
        if !self.is_privileged(caller) {
            return Err(RouteError::NotPrivileged(caller));
        }
        self.paused = paused;
        info!(by = %caller, paused, "router pause state changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileged_operator_can_pause_but_not_grant() {
        let owner = Address::repeat_byte(1);
        let operator = Address::repeat_byte(2);
        let stranger = Address::repeat_byte(3);
        let mut gate = RouteGate::new(owner);

        assert_eq!(gate.pause(operator).unwrap_err(), RouteError::NotPrivileged(operator));
        gate.set_privilege(owner, operator, true).unwrap();
        gate.pause(operator).unwrap();
        assert_eq!(gate.ensure_open().unwrap_err(), RouteError::Paused);
        assert_eq!(
            gate.set_privilege(operator, stranger, true).unwrap_err(),
            RouteError::NotPrivileged(operator)
        );

        gate.set_privilege(owner, operator, false).unwrap();
        assert!(gate.resume(operator).is_err());
        gate.resume(owner).unwrap();
        gate.ensure_open().unwrap();
    }
}
