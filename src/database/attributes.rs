use crate::core::error::{Error, ErrorKind, Result};

const READ_ONLY: u32 = 1 << 0;
const ONLINE: u32 = 1 << 1;
const RECOVERY_FULL: u32 = 1 << 2;
const SUPER_USER_MODE: u32 = 1 << 3;
const SLAVE_STARTED: u32 = 1 << 4;
const UNMOUNTED: u32 = 1 << 5;

/// The database attribute flag bits, in the order exposed through the log
/// (spec §6.4). `master_url` rides alongside the bits since `START/STOP
/// SLAVE` and `SET TO MASTER` both touch it together with `slave_started`.
#[derive(Debug, Clone, Default)]
pub struct DatabaseAttributes {
    bits: u32,
    pub master_url: Option<String>,
}

impl DatabaseAttributes {
    pub fn read_only(&self) -> bool {
        self.bits & READ_ONLY != 0
    }
    pub fn online(&self) -> bool {
        self.bits & ONLINE != 0
    }
    pub fn recovery_full(&self) -> bool {
        self.bits & RECOVERY_FULL != 0
    }
    pub fn super_user_mode(&self) -> bool {
        self.bits & SUPER_USER_MODE != 0
    }
    pub fn slave_started(&self) -> bool {
        self.bits & SLAVE_STARTED != 0
    }
    pub fn unmounted(&self) -> bool {
        self.bits & UNMOUNTED != 0
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    fn set(&mut self, bit: u32, value: bool) {
        if value {
            self.bits |= bit;
        } else {
            self.bits &= !bit;
        }
    }

    /// `ALTER DATABASE ... SET { READ ONLY | READ WRITE | ONLINE | OFFLINE
    /// | RECOVERY FULL | RECOVERY CHECKPOINT | SUPER USER | MULTI USER |
    /// TO MASTER } | { START | STOP } SLAVE` (spec §4.9.5, §6.5).
    pub fn alter(&mut self, change: AttributeChange) -> Result<()> {
        if self.slave_started() && !matches!(change, AttributeChange::SetToMaster) {
            return Err(Error::new(ErrorKind::NotSupported, "slave databases cannot have other attributes altered".into()));
        }
        match change {
            AttributeChange::ReadOnly(v) => {
                if v && self.slave_started() {
                    return Err(Error::new(ErrorKind::NotSupported, "read-only slave cannot discard its log".into()));
                }
                self.set(READ_ONLY, v);
            }
            AttributeChange::Online(v) => self.set(ONLINE, v),
            AttributeChange::RecoveryFull(v) => self.set(RECOVERY_FULL, v),
            AttributeChange::SuperUserMode(v) => self.set(SUPER_USER_MODE, v),
            AttributeChange::Unmounted(v) => self.set(UNMOUNTED, v),
            AttributeChange::StartSlave => {
                if self.master_url.is_none() {
                    return Err(Error::new(ErrorKind::BadArgument, "START SLAVE requires a non-empty master_url".into()));
                }
                self.set(SLAVE_STARTED, true);
            }
            AttributeChange::StopSlave => self.set(SLAVE_STARTED, false),
            AttributeChange::SetToMaster => {
                self.master_url = None;
                self.set(SLAVE_STARTED, false);
            }
            AttributeChange::SetMasterUrl(url) => self.master_url = Some(url),
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum AttributeChange {
    ReadOnly(bool),
    Online(bool),
    RecoveryFull(bool),
    SuperUserMode(bool),
    Unmounted(bool),
    StartSlave,
    StopSlave,
    SetToMaster,
    SetMasterUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_slave_requires_master_url() {
        let mut attrs = DatabaseAttributes::default();
        assert!(attrs.alter(AttributeChange::StartSlave).is_err());
        attrs.alter(AttributeChange::SetMasterUrl("tcp://x".into())).unwrap();
        assert!(attrs.alter(AttributeChange::StartSlave).is_ok());
        assert!(attrs.slave_started());
    }

    #[test]
    fn set_to_master_clears_url_and_slave_started() {
        let mut attrs = DatabaseAttributes::default();
        attrs.alter(AttributeChange::SetMasterUrl("tcp://x".into())).unwrap();
        attrs.alter(AttributeChange::StartSlave).unwrap();
        attrs.alter(AttributeChange::SetToMaster).unwrap();
        assert!(!attrs.slave_started());
        assert!(attrs.master_url.is_none());
    }

    #[test]
    fn slave_database_rejects_other_alters() {
        let mut attrs = DatabaseAttributes::default();
        attrs.alter(AttributeChange::SetMasterUrl("tcp://x".into())).unwrap();
        attrs.alter(AttributeChange::StartSlave).unwrap();
        assert!(attrs.alter(AttributeChange::Online(true)).is_err());
    }
}
