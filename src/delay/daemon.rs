use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Sender};

use crate::delay::index::DelayIndexFile;

/// Background merge worker (spec §6.3's `isAsyncMerge`): consumes merge
/// signals off a bounded queue and drives a `DelayIndexFile` through
/// `begin_merge`/`drive_merge_to_completion` whenever the signalled unit is
/// still past its threshold by the time the worker gets to it. Dropping the
/// daemon closes the queue and joins the worker thread.
pub struct MergeDaemon {
    sender: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MergeDaemon {
    pub fn spawn(index: Arc<Mutex<DelayIndexFile>>) -> Self {
        let (sender, receiver) = bounded(1);
        let handle = thread::spawn(move || {
            while receiver.recv().is_ok() {
                let mut guard = index.lock().expect("merge daemon: index lock poisoned");
                if guard.should_merge() && guard.begin_merge().is_ok() {
                    let _ = guard.drive_merge_to_completion();
                }
            }
        });
        MergeDaemon { sender: Some(sender), handle: Some(handle) }
    }

    /// Clones the notify side of the queue so a `DelayIndexFile` can wake
    /// this worker from `insert`/`expunge` via `set_merge_notifier`.
    pub fn sender(&self) -> Sender<()> {
        self.sender.as_ref().expect("daemon sender taken").clone()
    }

    /// Wakes the worker if it's idle. The queue holds at most one pending
    /// signal; a send that finds it full is dropped rather than queued,
    /// since the worker hasn't caught up to the last one yet.
    pub fn notify(&self) {
        if let Some(sender) = &self.sender {
            let _ = sender.try_send(());
        }
    }
}

impl Drop for MergeDaemon {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;
    use crate::core::config::InvertedConfig;
    use crate::core::types::RowId;
    use std::time::Duration;

    fn tok(text: &str, pos: u32) -> Token {
        Token::new(text.to_string(), pos, 0)
    }

    #[test]
    fn daemon_drains_a_notify_and_merges() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = InvertedConfig::default();
        config.insert_merge_tuple_size = 2;
        let index = Arc::new(Mutex::new(DelayIndexFile::create(dir.path(), false, false, config).unwrap()));

        let daemon = MergeDaemon::spawn(index.clone());
        index.lock().unwrap().set_merge_notifier(daemon.sender());

        index.lock().unwrap().insert(RowId(1), &[tok("apple", 0)]).unwrap();
        index.lock().unwrap().insert(RowId(2), &[tok("apple", 0)]).unwrap();

        let mut waited = Duration::ZERO;
        loop {
            if index.lock().unwrap().proceeding() == crate::delay::info::Proceeding::Idle
                && index.lock().unwrap().big.doc_id_for_row(RowId(1)).unwrap().is_some()
            {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
            waited += Duration::from_millis(20);
            if waited > Duration::from_secs(2) {
                panic!("merge daemon never folded the insert side into big");
            }
        }
    }
}
